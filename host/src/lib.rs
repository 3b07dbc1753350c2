pub mod interfaces;
pub mod server;

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::interfaces::{HostError, HostResult};
use zkpool_coordinator::CoordinatorConfig;
use zkpool_lib::OrderBy;

fn default_endpoint() -> String {
    "0.0.0.0:8555".to_string()
}

fn default_collection_time() -> u64 {
    5
}

fn default_order_session() -> String {
    "ASC".to_string()
}

fn default_max_failed_sessions() -> usize {
    128
}

fn default_max_log() -> usize {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Default, Clone, Serialize, Deserialize, Debug, Parser)]
#[command(
    name = "zkpool",
    about = "The zkpool prover coordinator",
    long_about = None
)]
#[serde(default)]
pub struct Cli {
    #[arg(long, require_equals = true, default_value = "0.0.0.0:8555")]
    #[serde(default = "default_endpoint")]
    /// Listen address for the prover transport and debug API
    /// [default: 0.0.0.0:8555]
    pub endpoint: String,

    #[arg(long, require_equals = true)]
    /// Verifier endpoint; leave unset to disable proof verification
    pub verifier_endpoint: Option<String>,

    #[arg(long, require_equals = true, default_value = "5")]
    #[serde(default = "default_collection_time")]
    /// Per-session proof collection window, in minutes
    pub collection_time_minutes: u64,

    #[arg(long, require_equals = true, default_value = "ASC")]
    #[serde(default = "default_order_session")]
    /// Ordering when fetching unassigned tasks (ASC or DESC)
    pub order_session: String,

    #[arg(long, require_equals = true)]
    /// Path of the sqlite task database; unset keeps tasks in memory
    pub sqlite_path: Option<PathBuf>,

    #[arg(long, require_equals = true, default_value = "128")]
    #[serde(default = "default_max_failed_sessions")]
    /// Upper bound on retained failed-session snapshots
    pub max_failed_sessions: usize,

    #[arg(long, require_equals = true)]
    /// Path to a JSON config file; command line flags override its contents
    pub config_path: Option<PathBuf>,

    #[arg(long, require_equals = true)]
    /// Directory for JSON log files; unset logs to stdout only
    pub log_path: Option<PathBuf>,

    #[arg(long, require_equals = true, default_value = "7")]
    #[serde(default = "default_max_log")]
    pub max_log: usize,

    #[arg(long, require_equals = true, env = "RUST_LOG", default_value = "info")]
    #[serde(default = "default_log_level")]
    /// Set the log level
    pub log_level: String,
}

impl Cli {
    /// Read the options from a file and merge it with the current options.
    pub fn merge_from_file(&mut self) -> HostResult<()> {
        let Some(config_path) = &self.config_path else {
            return Ok(());
        };
        let file = std::fs::File::open(config_path)?;
        let reader = std::io::BufReader::new(file);
        let mut config: Value = serde_json::from_reader(reader)?;
        let this = serde_json::to_value(&self)?;
        merge(&mut config, &this);

        *self = serde_json::from_value(config)?;
        Ok(())
    }

    pub fn coordinator_config(&self) -> HostResult<CoordinatorConfig> {
        let order_session: OrderBy = self
            .order_session
            .parse()
            .map_err(HostError::InvalidOption)?;
        Ok(CoordinatorConfig {
            collection_time: Duration::from_secs(self.collection_time_minutes * 60),
            order_session,
            max_failed_sessions: self.max_failed_sessions,
            ..CoordinatorConfig::default()
        })
    }
}

/// Merges two json's together, overwriting `a` with the values of `b`
fn merge(a: &mut Value, b: &Value) {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => {
            for (k, v) in b {
                merge(a.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
        (a, b) if !b.is_null() => *a = b.clone(),
        // If b is null, just keep a (which means do nothing).
        _ => {}
    }
}

/// Read the command line arguments and overlay them on the config file.
pub fn parse_opts() -> HostResult<Cli> {
    let mut opts = Cli::parse();
    opts.merge_from_file()?;
    Ok(opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefers_non_null_overrides() {
        let mut config = serde_json::json!({
            "endpoint": "0.0.0.0:9999",
            "order_session": "DESC",
        });
        let overrides = serde_json::json!({
            "endpoint": "127.0.0.1:8555",
            "order_session": null,
        });
        merge(&mut config, &overrides);
        assert_eq!(config["endpoint"], "127.0.0.1:8555");
        assert_eq!(config["order_session"], "DESC");
    }

    #[test]
    fn test_coordinator_config_rejects_bad_order() {
        let cli = Cli {
            order_session: "sideways".to_string(),
            ..Cli::default()
        };
        assert!(cli.coordinator_config().is_err());
    }

    #[test]
    fn test_coordinator_config_conversion() {
        let cli = Cli {
            collection_time_minutes: 2,
            order_session: "DESC".to_string(),
            ..Cli::default()
        };
        let cfg = cli.coordinator_config().unwrap();
        assert_eq!(cfg.collection_time, Duration::from_secs(120));
        assert_eq!(cfg.order_session, OrderBy::Desc);
    }
}
