//! Runtime configuration (§4.12): a closed `clap::Parser` schema with
//! the `RVC_` prefix and double-underscore group hierarchy. Unknown
//! flags/env keys are rejected by clap itself.

use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;

/// rvcd - RV-C-over-CAN bridge daemon
#[derive(Parser, Debug, Clone)]
#[command(name = "rvcd")]
#[command(about = "Bridges RV-C-over-CAN traffic to REST/WebSocket clients")]
pub struct Config {
    /// HTTP/WS bind host
    #[arg(long, env = "RVC_SERVER__HOST", default_value = "0.0.0.0")]
    pub server_host: String,

    /// HTTP/WS bind port
    #[arg(long, env = "RVC_SERVER__PORT", default_value = "8080")]
    pub server_port: u16,

    /// Path to the spec catalog JSON document (C1)
    #[arg(long, env = "RVC_CATALOG_PATH")]
    pub catalog_path: PathBuf,

    /// Path to the device mapping JSON document (C2)
    #[arg(long, env = "RVC_MAPPING_PATH")]
    pub mapping_path: PathBuf,

    /// Logical CAN interface names this daemon may route traffic onto
    #[arg(long, env = "RVC_CAN__INTERFACES", value_delimiter = ',')]
    pub can_interfaces: Vec<String>,

    /// JSON object mapping logical interface name -> physical interface
    /// name, e.g. {"house":"can0","chassis":"can1"}
    #[arg(long, env = "RVC_CAN__INTERFACE_MAPPINGS")]
    pub can_interface_mappings: String,

    /// This bridge's own RV-C/J1939 source address, used when encoding
    /// outbound control frames.
    #[arg(long, env = "RVC_CAN__SOURCE_ADDRESS", default_value = "128")]
    pub can_source_address: u8,

    /// Bounded parallelism for bulk control requests (§4.5)
    #[arg(long, env = "RVC_BULK__CONCURRENCY", default_value = "16")]
    pub bulk_concurrency: usize,

    /// Per-command submission timeout, in seconds (§5)
    #[arg(long, env = "RVC_COMMAND__TIMEOUT_SECS", default_value = "5")]
    pub command_timeout_secs: u64,

    /// Overall bulk-control deadline, in seconds (§5)
    #[arg(long, env = "RVC_BULK__TIMEOUT_SECS", default_value = "30")]
    pub bulk_timeout_secs: u64,

    /// Per-feature stop timeout, in seconds (§4.9)
    #[arg(long, env = "RVC_FEATURES__STOP_TIMEOUT_SECS", default_value = "10")]
    pub feature_stop_timeout_secs: u64,

    /// Feature names to start disabled; dependents are pruned with
    /// `disabled_due_to_dependency` (§4.9, scenario 6).
    #[arg(long, env = "RVC_FEATURES__DISABLED", value_delimiter = ',')]
    pub disabled_features: Vec<String>,

    /// Log level filter, passed straight to `tracing_subscriber::EnvFilter`.
    #[arg(long, env = "RVC_LOGGING__LEVEL", default_value = "info")]
    pub logging_level: String,

    /// `pretty` or `json`
    #[arg(long, env = "RVC_LOGGING__LOG_FORMAT", default_value = "pretty")]
    pub logging_log_format: String,
}

impl Config {
    /// Parse `can_interface_mappings` into a typed map.
    pub fn interface_mappings(&self) -> anyhow::Result<HashMap<String, String>> {
        let mappings: HashMap<String, String> = serde_json::from_str(&self.can_interface_mappings)
            .map_err(|err| anyhow::anyhow!("RVC_CAN__INTERFACE_MAPPINGS is not a valid JSON object: {err}"))?;
        Ok(mappings)
    }

    /// Cross-check interface mappings against `can_interfaces` (§4.12).
    /// A `SPEC_INVALID`-class fatal startup error on mismatch.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.can_interfaces.is_empty() {
            anyhow::bail!("RVC_CAN__INTERFACES must name at least one physical interface");
        }

        let mappings = self.interface_mappings()?;
        if mappings.is_empty() {
            anyhow::bail!("RVC_CAN__INTERFACE_MAPPINGS must bind at least one logical name");
        }

        for (logical, physical) in &mappings {
            if !self.can_interfaces.contains(physical) {
                anyhow::bail!(
                    "interface mapping {logical:?} -> {physical:?} references a physical interface \
                     not present in RVC_CAN__INTERFACES ({:?})",
                    self.can_interfaces
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            server_host: "0.0.0.0".into(),
            server_port: 8080,
            catalog_path: "catalog.json".into(),
            mapping_path: "mapping.json".into(),
            can_interfaces: vec!["can0".into(), "can1".into()],
            can_interface_mappings: r#"{"house":"can0","chassis":"can1"}"#.into(),
            can_source_address: 0x80,
            bulk_concurrency: 16,
            command_timeout_secs: 5,
            bulk_timeout_secs: 30,
            feature_stop_timeout_secs: 10,
            disabled_features: Vec::new(),
            logging_level: "info".into(),
            logging_log_format: "pretty".into(),
        }
    }

    #[test]
    fn accepts_mappings_whose_physical_names_are_all_configured() {
        base_config().validate().unwrap();
    }

    #[test]
    fn rejects_mapping_referencing_unconfigured_physical_interface() {
        let mut config = base_config();
        config.can_interface_mappings = r#"{"house":"can0","generator":"can9"}"#.into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_interface_list() {
        let mut config = base_config();
        config.can_interfaces = Vec::new();
        assert!(config.validate().is_err());
    }
}
