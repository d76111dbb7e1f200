//! Scan acquisition for the part verification gate
//!
//! This crate abstracts the physical act of reading a vehicle VIN or a part
//! barcode at a station. A read either produces an identifier string or fails;
//! no image or barcode decoding happens here.

pub mod scripted;
pub mod simulated;

pub use scripted::ScriptedScanner;
pub use simulated::{SimulatedScanner, SimulatorConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type ScanResult<T> = Result<T, ScanError>;

/// What the operator is pointing the reader at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanKind {
    Vehicle,
    Part,
}

impl fmt::Display for ScanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanKind::Vehicle => write!(f, "vehicle"),
            ScanKind::Part => write!(f, "part"),
        }
    }
}

/// How an identifier entered the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntrySource {
    Scanned,
    Manual,
}

/// An identifier obtained from a reader or typed by the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub kind: ScanKind,
    pub value: String,
    pub source: EntrySource,
}

impl Identifier {
    pub fn scanned(kind: ScanKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            source: EntrySource::Scanned,
        }
    }

    pub fn manual(kind: ScanKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            source: EntrySource::Manual,
        }
    }
}

/// Why a physical read produced nothing usable
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanFailureReason {
    #[error("{kind} code could not be decoded")]
    Unreadable {
        kind: ScanKind,
        /// Identifier the reader was aimed at, when the hardware knows it
        attempted: Option<String>,
    },

    #[error("{kind} read timed out after {after_ms} ms")]
    TimedOut { kind: ScanKind, after_ms: u64 },

    #[error("Reader unavailable: {0}")]
    DeviceUnavailable(String),
}

impl ScanFailureReason {
    pub fn attempted(&self) -> Option<&str> {
        match self {
            ScanFailureReason::Unreadable { attempted, .. } => attempted.as_deref(),
            _ => None,
        }
    }
}

/// A manually entered identifier that the registry or catalog does not know
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind} '{identifier}' not found")]
pub struct NotFoundReason {
    pub kind: ScanKind,
    pub identifier: String,
}

/// Existence check against the vehicle registry / part catalog
pub trait IdentifierLookup: Send + Sync {
    fn contains(&self, kind: ScanKind, identifier: &str) -> bool;
}

/// A reader attached to a station
#[async_trait]
pub trait ScanAdapter: Send + Sync {
    /// Adapter name, used in logs
    fn name(&self) -> &str;

    /// Perform one physical read. Dropping the returned future cancels it.
    async fn acquire(&self, kind: ScanKind) -> Result<Identifier, ScanFailureReason>;

    /// Accept typed input in place of a physical read
    fn acquire_manual(
        &self,
        kind: ScanKind,
        raw: &str,
        lookup: &dyn IdentifierLookup,
    ) -> Result<Identifier, NotFoundReason> {
        let value = raw.trim();
        if value.is_empty() || !lookup.contains(kind, value) {
            tracing::debug!("Manual {} entry '{}' rejected", kind, value);
            return Err(NotFoundReason {
                kind,
                identifier: value.to_string(),
            });
        }
        Ok(Identifier::manual(kind, value))
    }
}

/// Run one acquisition, converting an expired deadline into a scan failure
pub async fn acquire_with_timeout<A>(
    adapter: &A,
    kind: ScanKind,
    timeout: Duration,
) -> Result<Identifier, ScanFailureReason>
where
    A: ScanAdapter + ?Sized,
{
    match tokio::time::timeout(timeout, adapter.acquire(kind)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                "{} read on '{}' exceeded {} ms",
                kind,
                adapter.name(),
                timeout.as_millis()
            );
            Err(ScanFailureReason::TimedOut {
                kind,
                after_ms: timeout.as_millis() as u64,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Known(Vec<&'static str>);

    impl IdentifierLookup for Known {
        fn contains(&self, _kind: ScanKind, identifier: &str) -> bool {
            self.0.contains(&identifier)
        }
    }

    struct Stalled;

    #[async_trait]
    impl ScanAdapter for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn acquire(&self, _kind: ScanKind) -> Result<Identifier, ScanFailureReason> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Identifier::scanned(ScanKind::Part, "never"))
        }
    }

    #[test]
    fn test_manual_entry_trims_and_resolves() {
        let lookup = Known(vec!["GS-SLA-AMB-SL-002"]);
        let id = Stalled
            .acquire_manual(ScanKind::Part, "  GS-SLA-AMB-SL-002 ", &lookup)
            .unwrap();
        assert_eq!(id.value, "GS-SLA-AMB-SL-002");
        assert_eq!(id.source, EntrySource::Manual);
    }

    #[test]
    fn test_manual_entry_unknown_or_blank() {
        let lookup = Known(vec!["GS-SLA-AMB-SL-002"]);
        let err = Stalled
            .acquire_manual(ScanKind::Part, "XX-000", &lookup)
            .unwrap_err();
        assert_eq!(err.identifier, "XX-000");
        assert_eq!(err.to_string(), "part 'XX-000' not found");

        assert!(Stalled.acquire_manual(ScanKind::Part, "   ", &lookup).is_err());
    }

    #[tokio::test]
    async fn test_timeout_becomes_scan_failure() {
        let result = acquire_with_timeout(&Stalled, ScanKind::Vehicle, Duration::from_millis(20)).await;
        assert_eq!(
            result,
            Err(ScanFailureReason::TimedOut {
                kind: ScanKind::Vehicle,
                after_ms: 20
            })
        );
    }

    #[test]
    fn test_failure_reason_display() {
        let reason = ScanFailureReason::Unreadable {
            kind: ScanKind::Part,
            attempted: Some("DH-KUS-STY-WH-001".into()),
        };
        assert_eq!(reason.to_string(), "part code could not be decoded");
        assert_eq!(reason.attempted(), Some("DH-KUS-STY-WH-001"));
    }
}
