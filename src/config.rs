//! Service configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;

use crate::{
    diff::{DiffEngine, LabelConfig},
    runtime::handle::RuntimeConfig,
    snapshot::DEFAULT_DISPLAY_LIMIT,
};

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held an unparsable value.
    #[error("invalid value for {var}: {value:?}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },

    /// A referenced file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The label override file is not valid JSON for the label table.
    #[error("invalid label file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Runtime settings for the undo service and its HTTP surface.
///
/// | Env Var                             | Default        |
/// |-------------------------------------|----------------|
/// | `CMS_UNDO_HOST`                     | `0.0.0.0`      |
/// | `CMS_UNDO_PORT`                     | `3000`         |
/// | `CMS_UNDO_DATABASE`                 | `cms_undo.db`  |
/// | `CMS_UNDO_SESSION_LIFETIME_MINUTES` | `120`          |
/// | `CMS_UNDO_DISPLAY_LIMIT`            | `80`           |
/// | `CMS_UNDO_LABELS_PATH`              | unset          |
/// | `CMS_UNDO_PURGE_INTERVAL_SECS`      | `300`          |
/// | `CMS_UNDO_COMMAND_QUEUE`            | `256`          |
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Idle time after which a session's undo state is gone.
    pub session_lifetime: TimeDelta,
    /// Character cap for displayed change values.
    pub display_limit: usize,
    /// Optional JSON file with label overrides.
    pub labels_path: Option<PathBuf>,
    /// How often expired sessions are swept.
    pub purge_interval: Duration,
    /// Bound of the service command queue.
    pub command_queue_bound: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_path: PathBuf::from("cms_undo.db"),
            session_lifetime: TimeDelta::minutes(120),
            display_limit: DEFAULT_DISPLAY_LIMIT,
            labels_path: None,
            purge_interval: Duration::from_secs(300),
            command_queue_bound: 256,
        }
    }
}

impl ServiceConfig {
    /// Reads the process environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = lookup("CMS_UNDO_HOST").unwrap_or(defaults.host);
        let port = parse_or(&lookup, "CMS_UNDO_PORT", defaults.port)?;
        let database_path = lookup("CMS_UNDO_DATABASE")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);
        let lifetime_minutes: i64 = parse_or(
            &lookup,
            "CMS_UNDO_SESSION_LIFETIME_MINUTES",
            defaults.session_lifetime.num_minutes(),
        )?;
        let session_lifetime =
            TimeDelta::try_minutes(lifetime_minutes).filter(|d| *d > TimeDelta::zero()).ok_or(
                ConfigError::Invalid {
                    var: "CMS_UNDO_SESSION_LIFETIME_MINUTES",
                    value: lifetime_minutes.to_string(),
                },
            )?;
        let display_limit = parse_or(&lookup, "CMS_UNDO_DISPLAY_LIMIT", defaults.display_limit)?;
        let labels_path = lookup("CMS_UNDO_LABELS_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let purge_secs = parse_or(
            &lookup,
            "CMS_UNDO_PURGE_INTERVAL_SECS",
            defaults.purge_interval.as_secs(),
        )?;
        let command_queue_bound =
            parse_or(&lookup, "CMS_UNDO_COMMAND_QUEUE", defaults.command_queue_bound)?;
        if command_queue_bound == 0 {
            return Err(ConfigError::Invalid {
                var: "CMS_UNDO_COMMAND_QUEUE",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            host,
            port,
            database_path,
            session_lifetime,
            display_limit,
            labels_path,
            purge_interval: Duration::from_secs(purge_secs),
            command_queue_bound,
        })
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Label table, with overrides applied when a file is configured.
    pub fn label_config(&self) -> Result<LabelConfig, ConfigError> {
        match &self.labels_path {
            Some(path) => LabelConfig::builtin_with_overrides(path),
            None => Ok(LabelConfig::builtin()),
        }
    }

    /// Diff engine built from the label table and display limit.
    pub fn diff_engine(&self) -> Result<DiffEngine, ConfigError> {
        Ok(DiffEngine::new(self.label_config()?).with_display_limit(self.display_limit))
    }

    /// Settings for the service task.
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            command_queue_bound: self.command_queue_bound,
            purge_interval: self.purge_interval,
            ..RuntimeConfig::default()
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let cfg = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.bind_addr(), "0.0.0.0:3000");
        assert_eq!(cfg.session_lifetime, TimeDelta::minutes(120));
        assert_eq!(cfg.display_limit, 80);
        assert!(cfg.labels_path.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = ServiceConfig::from_lookup(lookup(&[
            ("CMS_UNDO_PORT", "8080"),
            ("CMS_UNDO_SESSION_LIFETIME_MINUTES", "30"),
            ("CMS_UNDO_DISPLAY_LIMIT", "40"),
            ("CMS_UNDO_DATABASE", "/tmp/x.db"),
        ]))
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.session_lifetime, TimeDelta::minutes(30));
        assert_eq!(cfg.diff_engine().unwrap().display_limit(), 40);
        assert_eq!(cfg.database_path, PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn bad_numbers_are_reported() {
        let err = ServiceConfig::from_lookup(lookup(&[("CMS_UNDO_PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "CMS_UNDO_PORT", .. }));

        let err = ServiceConfig::from_lookup(lookup(&[("CMS_UNDO_SESSION_LIFETIME_MINUTES", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
