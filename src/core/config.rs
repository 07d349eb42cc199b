use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::effective::{GateSettings, ToolLimits};
use crate::core::error::{ResolverError, ResolverResult};
use crate::core::http::APP_USER_AGENT;
use crate::core::maven::{InterpolationPolicy, MAVEN_CENTRAL};

const APP_DIR_NAME: &str = "coordinate-resolver";
const CONFIG_FILE: &str = "config.json";

/// Overrides `effective_pom.redis_url` when set.
pub const REDIS_URL_ENV: &str = "COORDINATE_RESOLVER_REDIS_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub registry_url: String,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    /// Applied to descriptions, homepages and SCM URLs.
    pub interpolation: InterpolationPolicy,
    pub effective_pom: EffectivePomConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectivePomConfig {
    pub enabled: bool,
    pub max_concurrent: u32,
    pub max_wait_secs: u64,
    pub poll_interval_ms: u64,
    pub ticket_ttl_secs: u64,
    pub tool_timeout_secs: u64,
    pub tool_program: String,
    pub niceness: i32,
    pub memory_limit_mb: u32,
    pub redis_url: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            registry_url: MAVEN_CENTRAL.to_string(),
            user_agent: APP_USER_AGENT.to_string(),
            http_timeout_secs: 30,
            interpolation: InterpolationPolicy::default(),
            effective_pom: EffectivePomConfig::default(),
        }
    }
}

impl Default for EffectivePomConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_concurrent: 2,
            max_wait_secs: 60,
            poll_interval_ms: 500,
            ticket_ttl_secs: 180,
            tool_timeout_secs: 120,
            tool_program: "mvn".to_string(),
            niceness: 10,
            memory_limit_mb: 512,
            redis_url: None,
        }
    }
}

impl ResolverConfig {
    /// Read `path`, or the per-user config file when `path` is `None`.
    /// A missing default file yields the defaults; a missing explicit one is an error.
    pub fn load(path: Option<&Path>) -> ResolverResult<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    debug!("No config file, using defaults");
                    Self::default()
                }
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ResolverResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| ResolverError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> ResolverResult<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| ResolverError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| ResolverError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn validate(&self) -> ResolverResult<()> {
        if !self.registry_url.starts_with("http") {
            return Err(ResolverError::Config(format!(
                "registry_url must be an HTTP URL, got {:?}",
                self.registry_url
            )));
        }
        if self.effective_pom.enabled && self.effective_pom.max_concurrent == 0 {
            return Err(ResolverError::Config(
                "effective_pom.max_concurrent must be at least 1".into(),
            ));
        }
        // An expired counter while tools still run would admit past the ceiling.
        if self.effective_pom.enabled
            && self.effective_pom.ticket_ttl_secs <= self.effective_pom.tool_timeout_secs
        {
            return Err(ResolverError::Config(format!(
                "effective_pom.ticket_ttl_secs ({}) must exceed tool_timeout_secs ({})",
                self.effective_pom.ticket_ttl_secs, self.effective_pom.tool_timeout_secs
            )));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Environment first, then the file.
    pub fn redis_url(&self) -> Option<String> {
        std::env::var(REDIS_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.effective_pom.redis_url.clone())
    }

    pub fn gate_settings(&self) -> GateSettings {
        let e = &self.effective_pom;
        GateSettings {
            enabled: e.enabled,
            max_concurrent: e.max_concurrent,
            max_wait: Duration::from_secs(e.max_wait_secs),
            poll_interval: Duration::from_millis(e.poll_interval_ms),
            ticket_ttl: Duration::from_secs(e.ticket_ttl_secs),
        }
    }

    pub fn tool_limits(&self) -> ToolLimits {
        ToolLimits {
            timeout: Duration::from_secs(self.effective_pom.tool_timeout_secs),
            niceness: self.effective_pom.niceness,
            memory_limit_mb: self.effective_pom.memory_limit_mb,
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join(APP_DIR_NAME).join(CONFIG_FILE))
}
