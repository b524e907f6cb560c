//! mend.toml configuration parser.
//!
//! Every section is optional except `[endpoints]`. The raw file maps onto
//! [`MendConfig`]; accessor methods resolve each section into a settings
//! struct with defaults applied and durations parsed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::IssueKind;

/// Environment variable overriding `[notify] url`.
pub const ENV_NOTIFY_URL: &str = "MEND_NOTIFY_URL";
/// Environment variable overriding `[notify] secret`.
pub const ENV_NOTIFY_SECRET: &str = "MEND_NOTIFY_SECRET";

/// Errors found while validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no endpoints configured")]
    NoEndpoints,

    #[error("endpoint {id}: unsupported url {url:?} (expected http:// or https://)")]
    BadEndpointUrl { id: String, url: String },

    #[error("{key}: cannot parse duration {value:?}")]
    BadDuration { key: &'static str, value: String },

    #[error("{key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MendConfig {
    /// Endpoint name → URL.
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
    #[serde(rename = "loop")]
    pub schedule: Option<LoopConfig>,
    pub probe: Option<ProbeConfig>,
    pub project: Option<ProjectConfig>,
    pub remedy: Option<RemedyConfig>,
    pub notify: Option<NotifyConfig>,
    pub state: Option<StateConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoopConfig {
    pub interval: Option<String>,
    pub summary_interval: Option<String>,
    pub settle_delay: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub timeout: Option<String>,
    pub min_body_bytes: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub root: Option<PathBuf>,
    pub build_dir: Option<String>,
    pub manifest: Option<String>,
    pub dependency_dir: Option<String>,
    pub config_files: Option<Vec<String>>,
    pub router_file: Option<String>,
    pub router_pattern: Option<String>,
    pub component_paths: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemedyConfig {
    pub fix_timeout: Option<String>,
    pub build_command: Option<String>,
    pub install_command: Option<String>,
    pub restart_command: Option<String>,
    pub scaffold: Option<Vec<ScaffoldFile>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub url: Option<String>,
    pub secret: Option<String>,
    pub timeout: Option<String>,
    pub max_retries: Option<u32>,
    pub retry_backoff: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateConfig {
    /// Directory for the on-disk report log. In-memory when unset.
    pub data_dir: Option<PathBuf>,
}

/// A file a remediation action writes when it is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaffoldFile {
    /// Which issue kind this file repairs.
    pub kind: IssueKind,
    /// Path relative to the project root.
    pub path: String,
    pub content: String,
}

// ── Resolved settings ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    pub interval: Duration,
    pub summary_interval: Duration,
    pub settle_delay: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSettings {
    pub timeout: Duration,
    /// A body must be strictly longer than this to count as healthy.
    pub min_body_bytes: usize,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            min_body_bytes: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSettings {
    pub root: PathBuf,
    pub build_dir: String,
    pub manifest: String,
    pub dependency_dir: String,
    pub config_files: Vec<String>,
    pub router_file: String,
    pub router_pattern: String,
    pub component_paths: Vec<String>,
}

impl ProjectSettings {
    /// Defaults rooted at `root`.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            build_dir: "dist".to_string(),
            manifest: "package.json".to_string(),
            dependency_dir: "node_modules".to_string(),
            config_files: strings(&["vite.config.js", "tsconfig.json", ".env"]),
            router_file: "src/App.tsx".to_string(),
            router_pattern: "BrowserRouter|Routes".to_string(),
            component_paths: strings(&["src/components/dashboard", "src/pages", "src/App.tsx"]),
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemedySettings {
    pub root: PathBuf,
    pub fix_timeout: Duration,
    pub build_command: String,
    pub install_command: String,
    pub restart_command: String,
    pub scaffolds: Vec<ScaffoldFile>,
}

impl RemedySettings {
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fix_timeout: Duration::from_secs(60),
            build_command: "npm run build".to_string(),
            install_command: "npm install".to_string(),
            restart_command: "npm run dev".to_string(),
            scaffolds: default_scaffolds(),
        }
    }

    /// Scaffold files registered for one issue kind.
    pub fn scaffolds_for<'a>(&'a self, kind: &'a IssueKind) -> impl Iterator<Item = &'a ScaffoldFile> {
        self.scaffolds.iter().filter(move |s| &s.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotifySettings {
    /// Sink URL. `None` disables delivery.
    pub url: Option<String>,
    pub secret: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub user_agent: String,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            url: None,
            secret: String::new(),
            timeout: Duration::from_secs(10),
            max_retries: 0,
            retry_backoff: Duration::from_secs(1),
            user_agent: format!("mend/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl MendConfig {
    /// Load from a TOML file and apply environment overrides.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: MendConfig = toml::from_str(&content)?;
        config.apply_overrides(
            std::env::var(ENV_NOTIFY_URL).ok(),
            std::env::var(ENV_NOTIFY_SECRET).ok(),
        );
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Override the notification sink and secret (from the environment).
    pub fn apply_overrides(&mut self, url: Option<String>, secret: Option<String>) {
        if url.is_none() && secret.is_none() {
            return;
        }
        let notify = self.notify.get_or_insert_with(NotifyConfig::default);
        if let Some(url) = url {
            notify.url = Some(url);
        }
        if let Some(secret) = secret {
            notify.secret = Some(secret);
        }
    }

    /// Check everything that can be checked before the loop starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        for (id, url) in &self.endpoints {
            if !is_http_url(url) {
                return Err(ConfigError::BadEndpointUrl {
                    id: id.clone(),
                    url: url.clone(),
                });
            }
        }

        let schedule = self.loop_settings()?;
        if schedule.interval.is_zero() || schedule.summary_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "loop",
                reason: "intervals must be non-zero".to_string(),
            });
        }
        self.probe_settings()?;
        self.remedy_settings()?;

        let notify = self.notify_settings()?;
        if let Some(url) = &notify.url {
            if !is_http_url(url) {
                return Err(ConfigError::Invalid {
                    key: "notify.url",
                    reason: format!("unsupported url {url:?}"),
                });
            }
        }
        Ok(())
    }

    pub fn loop_settings(&self) -> Result<LoopSettings, ConfigError> {
        let cfg = self.schedule.clone().unwrap_or_default();
        Ok(LoopSettings {
            interval: duration_or("loop.interval", &cfg.interval, Duration::from_secs(30))?,
            summary_interval: duration_or(
                "loop.summary_interval",
                &cfg.summary_interval,
                Duration::from_secs(10),
            )?,
            settle_delay: duration_or("loop.settle_delay", &cfg.settle_delay, Duration::from_secs(5))?,
        })
    }

    pub fn probe_settings(&self) -> Result<ProbeSettings, ConfigError> {
        let cfg = self.probe.clone().unwrap_or_default();
        let defaults = ProbeSettings::default();
        Ok(ProbeSettings {
            timeout: duration_or("probe.timeout", &cfg.timeout, defaults.timeout)?,
            min_body_bytes: cfg.min_body_bytes.unwrap_or(defaults.min_body_bytes),
        })
    }

    pub fn project_root(&self) -> PathBuf {
        self.project
            .as_ref()
            .and_then(|p| p.root.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn project_settings(&self) -> ProjectSettings {
        let cfg = self.project.clone().unwrap_or_default();
        let mut settings = ProjectSettings::rooted_at(self.project_root());
        if let Some(v) = cfg.build_dir {
            settings.build_dir = v;
        }
        if let Some(v) = cfg.manifest {
            settings.manifest = v;
        }
        if let Some(v) = cfg.dependency_dir {
            settings.dependency_dir = v;
        }
        if let Some(v) = cfg.config_files {
            settings.config_files = v;
        }
        if let Some(v) = cfg.router_file {
            settings.router_file = v;
        }
        if let Some(v) = cfg.router_pattern {
            settings.router_pattern = v;
        }
        if let Some(v) = cfg.component_paths {
            settings.component_paths = v;
        }
        settings
    }

    pub fn remedy_settings(&self) -> Result<RemedySettings, ConfigError> {
        let cfg = self.remedy.clone().unwrap_or_default();
        let mut settings = RemedySettings::rooted_at(self.project_root());
        settings.fix_timeout = duration_or("remedy.fix_timeout", &cfg.fix_timeout, settings.fix_timeout)?;
        if let Some(v) = cfg.build_command {
            settings.build_command = v;
        }
        if let Some(v) = cfg.install_command {
            settings.install_command = v;
        }
        if let Some(v) = cfg.restart_command {
            settings.restart_command = v;
        }
        if let Some(v) = cfg.scaffold {
            settings.scaffolds = v;
        }
        Ok(settings)
    }

    pub fn notify_settings(&self) -> Result<NotifySettings, ConfigError> {
        let cfg = self.notify.clone().unwrap_or_default();
        let defaults = NotifySettings::default();
        Ok(NotifySettings {
            url: cfg.url.filter(|u| !u.trim().is_empty()),
            secret: cfg.secret.unwrap_or_default(),
            timeout: duration_or("notify.timeout", &cfg.timeout, defaults.timeout)?,
            max_retries: cfg.max_retries.unwrap_or(defaults.max_retries),
            retry_backoff: duration_or("notify.retry_backoff", &cfg.retry_backoff, defaults.retry_backoff)?,
            user_agent: cfg.user_agent.unwrap_or(defaults.user_agent),
        })
    }

    pub fn data_dir(&self) -> Option<PathBuf> {
        self.state.as_ref().and_then(|s| s.data_dir.clone())
    }

    /// Scaffold a minimal mend.toml.
    pub fn scaffold(endpoints: &[(&str, &str)]) -> Self {
        MendConfig {
            endpoints: endpoints
                .iter()
                .map(|(id, url)| (id.to_string(), url.to_string()))
                .collect(),
            schedule: Some(LoopConfig {
                interval: Some("30s".to_string()),
                summary_interval: Some("10s".to_string()),
                settle_delay: Some("5s".to_string()),
            }),
            probe: Some(ProbeConfig {
                timeout: Some("10s".to_string()),
                min_body_bytes: Some(100),
            }),
            project: None,
            remedy: None,
            notify: None,
            state: None,
        }
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
///
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim().parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

fn duration_or(
    key: &'static str,
    value: &Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => parse_duration(raw).ok_or_else(|| ConfigError::BadDuration {
            key,
            value: raw.clone(),
        }),
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Scaffold files written when configuration, routing, or component
/// checks fail and nothing was configured under `[[remedy.scaffold]]`.
pub fn default_scaffolds() -> Vec<ScaffoldFile> {
    vec![
        ScaffoldFile {
            kind: IssueKind::Configuration,
            path: "vite.config.js".to_string(),
            content: r#"import { defineConfig } from 'vite'
import react from '@vitejs/plugin-react'

export default defineConfig({
  plugins: [react()],
  server: { port: 3000, host: true },
})
"#
            .to_string(),
        },
        ScaffoldFile {
            kind: IssueKind::Configuration,
            path: "tsconfig.json".to_string(),
            content: r#"{
  "compilerOptions": {
    "target": "ES2020",
    "lib": ["ES2020", "DOM", "DOM.Iterable"],
    "module": "ESNext",
    "moduleResolution": "bundler",
    "jsx": "react-jsx",
    "strict": true,
    "skipLibCheck": true,
    "noEmit": true
  },
  "include": ["src"]
}
"#
            .to_string(),
        },
        ScaffoldFile {
            kind: IssueKind::Routing,
            path: "src/App.tsx".to_string(),
            content: r#"import { BrowserRouter, Routes, Route } from 'react-router-dom';
import Dashboard from './components/dashboard/Dashboard';

export default function App() {
  return (
    <BrowserRouter>
      <Routes>
        <Route path="/" element={<Dashboard />} />
      </Routes>
    </BrowserRouter>
  );
}
"#
            .to_string(),
        },
        ScaffoldFile {
            kind: IssueKind::Components,
            path: "src/components/dashboard/Dashboard.tsx".to_string(),
            content: r#"export default function Dashboard() {
  return (
    <div className="dashboard">
      <h1>Dashboard</h1>
    </div>
  );
}
"#
            .to_string(),
        },
    ]
}
