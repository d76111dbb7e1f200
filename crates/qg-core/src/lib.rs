//! Part Verification Core Workflow Engine
//!
//! This crate provides the verification workflow that sits between a station
//! reader and the line's monitoring: bind a vehicle, verify parts against it,
//! classify compatibility, and raise alerts when verification cannot happen.

pub mod models;
pub mod reference;
pub mod sink;
pub mod workflow;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use models::{
    AlertEvent, Configuration, OutcomeKind, Part, TripleField, Vehicle, Verdict,
    VerificationOutcome,
};
pub use reference::{PartCatalog, ReferenceData, VehicleRegistry};
pub use sink::{AlertSink, MemoryAlertSink, OutcomeSink, RecentOutcomes, TracingSink};
pub use workflow::{
    classify, ScanSession, Stage, StageKind, StationStats, VerificationEngine, WorkflowError,
    WorkflowResult,
};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Which alerts the engine raises beyond the mandatory scan-failure alert
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertPolicy {
    /// Raise an error alert for every mismatch, not only when installation is blocked
    pub emit_alert_on_mismatch: bool,
}

/// Station configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Station identifier carried on every alert
    pub station_id: String,
    /// Human readable station name
    pub station_name: String,
    /// Operator currently signed in
    pub operator: Option<String>,
    /// Upper bound on a single reader acquisition (milliseconds)
    pub acquire_timeout_ms: u64,
    pub alert_policy: AlertPolicy,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            station_id: "ST001".to_string(),
            station_name: "Part Verification".to_string(),
            operator: None,
            acquire_timeout_ms: 5_000,
            alert_policy: AlertPolicy::default(),
        }
    }
}

impl StationConfig {
    pub fn acquire_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.station_id.trim().is_empty() {
            return Err(CoreError::Config("station_id must not be empty".to_string()));
        }
        if self.acquire_timeout_ms == 0 {
            return Err(CoreError::Config(
                "acquire_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Severity levels for alerts
///
/// The engine raises `Error` and `Critical`. `Info` and `Warning` are left for
/// other publishers sharing the same alert sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_config_defaults() {
        let config = StationConfig::default();
        assert_eq!(config.station_id, "ST001");
        assert!(!config.alert_policy.emit_alert_on_mismatch);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_station_config_partial_json() {
        let config: StationConfig = serde_json::from_str(
            r#"{"station_id": "ST002", "alert_policy": {"emit_alert_on_mismatch": true}}"#,
        )
        .unwrap();
        assert_eq!(config.station_id, "ST002");
        assert_eq!(config.acquire_timeout_ms, 5_000);
        assert!(config.alert_policy.emit_alert_on_mismatch);
    }

    #[test]
    fn test_station_config_validation() {
        let config = StationConfig {
            acquire_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Error);
        assert_eq!(Severity::Critical.to_string(), "critical");
    }
}
