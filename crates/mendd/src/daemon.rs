//! Process lifecycle: assembly, startup/shutdown/crash events, signals.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, bail};
use tokio::sync::watch;
use tracing::{error, info, warn};

use mend_agent::{LoopController, assemble};
use mend_core::MendConfig;
use mend_notify::{Event, EventKind, Notifier};
use mend_state::{ReportStore, SystemState};

const DB_FILE: &str = "mend.redb";

struct Daemon {
    controller: Arc<LoopController>,
    notifier: Arc<dyn Notifier>,
}

impl Daemon {
    fn build(config_path: &Path) -> anyhow::Result<Self> {
        let config = MendConfig::from_file(config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;
        config.validate()?;

        let state = open_state(&config)?;
        let notifier = mend_notify::from_settings(&config.notify_settings()?)?;
        let controller = Arc::new(assemble(&config, state, notifier.clone())?);
        info!(
            config = %config_path.display(),
            endpoints = controller.agents().len(),
            "mend assembled"
        );
        Ok(Self { controller, notifier })
    }

    async fn send(&self, event: Event) {
        if let Err(e) = self.notifier.notify(&event).await {
            warn!(event = event.name(), error = %e, "notification failed");
        }
    }

    async fn endpoint_ids(&self) -> Vec<String> {
        let mut ids = Vec::with_capacity(self.controller.agents().len());
        for agent in self.controller.agents() {
            ids.push(agent.id().await);
        }
        ids
    }
}

fn open_state(config: &MendConfig) -> anyhow::Result<SystemState> {
    match config.data_dir() {
        Some(dir) => {
            std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
            let path = dir.join(DB_FILE);
            let store = ReportStore::open(&path)?;
            info!(path = %path.display(), reports = store.len(), "report log opened");
            Ok(SystemState::new(store)?)
        }
        None => {
            info!("no data_dir configured, report log kept in memory");
            Ok(SystemState::in_memory()?)
        }
    }
}

/// Run until SIGINT/SIGTERM. A controller fault is reported as a crash
/// and returned as an error.
pub async fn run(config_path: &Path) -> anyhow::Result<()> {
    let daemon = Daemon::build(config_path)?;
    let started = Instant::now();

    daemon
        .send(
            Event::new(EventKind::ProcessStartup)
                .with("endpoints", daemon.endpoint_ids().await)
                .with("pid", std::process::id())
                .with("version", env!("CARGO_PKG_VERSION")),
        )
        .await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut controller = tokio::spawn(Arc::clone(&daemon.controller).run(shutdown_rx));

    tokio::select! {
        signal = shutdown_signal() => {
            info!(%signal, "shutdown signal received");
            let _ = shutdown_tx.send(true);
            if let Err(e) = (&mut controller).await {
                warn!(error = %e, "controller did not stop cleanly");
            }

            let counters = daemon.controller.state().counters();
            daemon
                .send(
                    Event::new(EventKind::ProcessShutdown)
                        .with("signal", signal)
                        .with("uptime_secs", started.elapsed().as_secs())
                        .with("total_checks", counters.total_checks)
                        .with("successful_fixes", counters.successful_fixes)
                        .with("failed_fixes", counters.failed_fixes)
                        .with("total_reports", counters.total_reports),
                )
                .await;
            info!("mend stopped");
            Ok(())
        }
        joined = &mut controller => {
            let message = match joined {
                Ok(Ok(())) => "controller exited unexpectedly".to_string(),
                Ok(Err(e)) => e.to_string(),
                Err(e) => format!("controller task failed: {e}"),
            };
            error!(error = %message, "loop controller fault");
            daemon
                .send(
                    Event::new(EventKind::ProcessCrash)
                        .with("error", message.as_str())
                        .with("uptime_secs", started.elapsed().as_secs()),
                )
                .await;
            bail!(message)
        }
    }
}

/// One iteration. Returns whether every endpoint ended healthy.
pub async fn check(config_path: &Path) -> anyhow::Result<bool> {
    let daemon = Daemon::build(config_path)?;
    let summary = daemon
        .controller
        .run_iteration()
        .await
        .context("iteration did not run")?;

    for agent in daemon.controller.agents() {
        let endpoint = agent.endpoint().await;
        let verdict = if endpoint.healthy { "healthy" } else { "unhealthy" };
        println!("{:<20} {:<10} {}", endpoint.id, verdict, endpoint.url);
    }
    println!(
        "{} healthy, {} unhealthy, {} fix report(s)",
        summary.healthy,
        summary.unhealthy,
        daemon.controller.state().counters().total_reports
    );
    Ok(summary.unhealthy == 0)
}

/// Write a starter `mend.toml`. Refuses to overwrite.
pub fn init(config_path: &Path, endpoints: &[String]) -> anyhow::Result<()> {
    if config_path.exists() {
        bail!("{} already exists", config_path.display());
    }

    let mut pairs = Vec::with_capacity(endpoints.len());
    for raw in endpoints {
        let Some((name, url)) = raw.split_once('=') else {
            bail!("endpoint must be NAME=URL, got {raw:?}");
        };
        pairs.push((name.trim(), url.trim()));
    }
    if pairs.is_empty() {
        pairs.push(("main", "http://localhost:3000"));
    }

    let config = MendConfig::scaffold(&pairs);
    config.validate()?;
    std::fs::write(config_path, config.to_toml_string()?)
        .with_context(|| format!("writing {}", config_path.display()))?;
    println!("wrote {}", config_path.display());
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM, using ctrl-c only");
            let _ = tokio::signal::ctrl_c().await;
            return "SIGINT";
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = term.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}
