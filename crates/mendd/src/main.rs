//! mendd — the mend daemon.
//!
//! Assembles the self-healing loop from a `mend.toml`:
//! - System state (in memory, or redb under `[state] data_dir`)
//! - Notification client (signed webhook, or log-only)
//! - One agent per endpoint + the loop controller
//!
//! # Usage
//!
//! ```text
//! mendd init --endpoint portal=http://localhost:3000
//! mendd run --config mend.toml [--log-json]
//! mendd check --config mend.toml
//! ```

mod daemon;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,mendd=debug,mend=debug";

#[derive(Parser)]
#[command(name = "mendd", version, about = "mend self-healing endpoint monitor")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the monitor until interrupted.
    Run {
        /// Path to the configuration file.
        #[arg(short, long, default_value = "mend.toml")]
        config: PathBuf,
    },

    /// Run one iteration and exit. Exits 1 if any endpoint is still unhealthy.
    Check {
        #[arg(short, long, default_value = "mend.toml")]
        config: PathBuf,
    },

    /// Write a starter configuration file.
    Init {
        /// Where to write it.
        #[arg(short, long, default_value = "mend.toml")]
        config: PathBuf,

        /// Endpoint as `name=url`. Repeatable.
        #[arg(short, long = "endpoint", value_name = "NAME=URL")]
        endpoints: Vec<String>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run { config } => {
            daemon::run(&config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { config } => {
            let all_healthy = daemon::check(&config).await?;
            Ok(if all_healthy {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Command::Init { config, endpoints } => {
            daemon::init(&config, &endpoints)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
