//! Two-stage verification workflow: bind a vehicle, then verify parts

pub mod classify;
pub mod engine;

pub use classify::classify;
pub use engine::VerificationEngine;

use crate::models::{OutcomeKind, Vehicle, VerificationOutcome};
use chrono::{DateTime, Utc};
use qg_scan::{NotFoundReason, ScanFailureReason};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("No vehicle bound to the session")]
    PrecursorMissing,

    #[error("Cannot {action} while the session is {stage}")]
    InvalidTransition {
        action: &'static str,
        stage: StageKind,
    },

    #[error("Vehicle scan failed: {0}")]
    ScanFailed(ScanFailureReason),

    #[error(transparent)]
    NotFound(#[from] NotFoundReason),
}

impl WorkflowError {
    /// What the operator should do next
    pub fn prompt(&self) -> &'static str {
        match self {
            WorkflowError::PrecursorMissing => "Scan the vehicle VIN first",
            WorkflowError::InvalidTransition { .. } => {
                "Finish the current verification or start over with a new vehicle"
            }
            WorkflowError::ScanFailed(_) => "Retry the scan or enter the VIN manually",
            WorkflowError::NotFound(_) => "Check the identifier and enter it again",
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Stage tag without the payload, for errors and display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageKind {
    Idle,
    VehicleBound,
    Verified(OutcomeKind),
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Idle => write!(f, "idle"),
            StageKind::VehicleBound => write!(f, "waiting for a part"),
            StageKind::Verified(kind) => write!(f, "verified ({})", kind),
        }
    }
}

/// Where a session is in its lifecycle. The vehicle is carried by the stage,
/// so an outcome can never exist without one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    Idle,
    VehicleBound {
        vehicle: Vehicle,
    },
    Verified {
        outcome: VerificationOutcome,
        installation_blocked: bool,
    },
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::Idle => StageKind::Idle,
            Stage::VehicleBound { .. } => StageKind::VehicleBound,
            Stage::Verified { outcome, .. } => StageKind::Verified(outcome.kind()),
        }
    }

    pub fn vehicle(&self) -> Option<&Vehicle> {
        match self {
            Stage::Idle => None,
            Stage::VehicleBound { vehicle } => Some(vehicle),
            Stage::Verified { outcome, .. } => Some(&outcome.vehicle),
        }
    }

    pub fn outcome(&self) -> Option<&VerificationOutcome> {
        match self {
            Stage::Verified { outcome, .. } => Some(outcome),
            _ => None,
        }
    }

    pub fn installation_blocked(&self) -> bool {
        matches!(
            self,
            Stage::Verified {
                installation_blocked: true,
                ..
            }
        )
    }
}

/// One vehicle at one station
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    stage: Stage,
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            stage: Stage::Idle,
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn vehicle(&self) -> Option<&Vehicle> {
        self.stage.vehicle()
    }

    pub fn outcome(&self) -> Option<&VerificationOutcome> {
        self.stage.outcome()
    }

    pub(crate) fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    pub(crate) fn stage_mut(&mut self) -> &mut Stage {
        &mut self.stage
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Station counters, kept across sessions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationStats {
    pub vehicles_bound: usize,
    pub matches: usize,
    pub mismatches: usize,
    pub scan_failures: usize,
    pub manual_entries: usize,
    pub alerts_raised: usize,
    pub installations_blocked: usize,
}

impl StationStats {
    pub fn verifications(&self) -> usize {
        self.matches + self.mismatches + self.scan_failures
    }

    pub(crate) fn record(&mut self, kind: OutcomeKind) {
        match kind {
            OutcomeKind::Match => self.matches += 1,
            OutcomeKind::Mismatch => self.mismatches += 1,
            OutcomeKind::ScanFailure => self.scan_failures += 1,
        }
    }
}
