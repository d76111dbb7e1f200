//! Verification workflow engine

use super::{classify, ScanSession, Stage, StageKind, StationStats, WorkflowError, WorkflowResult};
use crate::models::{AlertEvent, OutcomeKind, Part, Vehicle, Verdict, VerificationOutcome};
use crate::reference::{PartCatalog, VehicleRegistry};
use crate::sink::{AlertSink, OutcomeSink, TracingSink};
use crate::{CoreResult, Severity, StationConfig};
use qg_scan::{
    acquire_with_timeout, EntrySource, Identifier, IdentifierLookup, NotFoundReason, ScanAdapter,
    ScanKind,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs the verification workflow for a single station.
///
/// Every transition takes `&mut self`, so one engine serializes its session.
/// Reader acquisitions are awaited before any state changes; dropping an
/// in-flight call leaves the session as it was.
pub struct VerificationEngine<A, R>
where
    A: ScanAdapter,
    R: VehicleRegistry + PartCatalog + IdentifierLookup,
{
    config: StationConfig,
    adapter: A,
    reference: R,
    alerts: Arc<dyn AlertSink>,
    outcomes: Arc<dyn OutcomeSink>,
    session: ScanSession,
    stats: StationStats,
}

impl<A, R> VerificationEngine<A, R>
where
    A: ScanAdapter,
    R: VehicleRegistry + PartCatalog + IdentifierLookup,
{
    pub fn new(
        config: StationConfig,
        adapter: A,
        reference: R,
        alerts: Arc<dyn AlertSink>,
    ) -> CoreResult<Self> {
        config.validate()?;
        info!(
            "Station {} ({}) ready with {} reader, operator {}",
            config.station_id,
            config.station_name,
            adapter.name(),
            config.operator.as_deref().unwrap_or("unassigned")
        );

        Ok(Self {
            config,
            adapter,
            reference,
            alerts,
            outcomes: Arc::new(TracingSink),
            session: ScanSession::new(),
            stats: StationStats::default(),
        })
    }

    /// Send outcomes somewhere other than the log
    pub fn with_outcome_sink(mut self, outcomes: Arc<dyn OutcomeSink>) -> Self {
        self.outcomes = outcomes;
        self
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn reference(&self) -> &R {
        &self.reference
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn stage(&self) -> &Stage {
        self.session.stage()
    }

    pub fn stage_kind(&self) -> StageKind {
        self.session.stage().kind()
    }

    pub fn stats(&self) -> &StationStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = StationStats::default();
    }

    /// Read a VIN and bind the vehicle. Only legal with no vehicle bound.
    pub async fn scan_vehicle(&mut self) -> WorkflowResult<Vehicle> {
        self.require_idle("scan a vehicle")?;

        let read = acquire_with_timeout(
            &self.adapter,
            ScanKind::Vehicle,
            self.config.acquire_timeout(),
        )
        .await;

        match read {
            Ok(identifier) => self.bind_vehicle(&identifier),
            Err(reason) => {
                warn!("Vehicle scan failed at {}: {}", self.config.station_id, reason);
                Err(WorkflowError::ScanFailed(reason))
            }
        }
    }

    /// Bind a vehicle from a typed VIN
    pub fn enter_vehicle_manually(&mut self, raw: &str) -> WorkflowResult<Vehicle> {
        self.require_idle("enter a vehicle")?;

        let identifier = self
            .adapter
            .acquire_manual(ScanKind::Vehicle, raw, &self.reference)?;
        let vehicle = self.bind_vehicle(&identifier)?;
        self.stats.manual_entries += 1;
        Ok(vehicle)
    }

    /// Read a part barcode and verify it against the bound vehicle.
    ///
    /// An unreadable code is an outcome (`ScanFailure`), not an error. A code
    /// that reads but is not in the catalog is a `NotFound` error and leaves
    /// the session waiting for a part.
    pub async fn scan_part(&mut self) -> WorkflowResult<VerificationOutcome> {
        let vehicle = self.require_awaiting_part("scan a part")?.clone();

        let read = acquire_with_timeout(
            &self.adapter,
            ScanKind::Part,
            self.config.acquire_timeout(),
        )
        .await;

        match read {
            Ok(identifier) => {
                let part = self.resolve_part(&identifier)?;
                let verdict = classify(&vehicle, &part);
                Ok(self.record(vehicle, verdict, EntrySource::Scanned))
            }
            Err(reason) => {
                let verdict = Verdict::ScanFailure {
                    part_id: reason.attempted().map(str::to_string),
                    reason,
                };
                Ok(self.record(vehicle, verdict, EntrySource::Scanned))
            }
        }
    }

    /// Verify a typed part ID, bypassing the reader.
    ///
    /// Accepted while waiting for a part or after a scan failure.
    pub fn enter_part_manually(&mut self, raw: &str) -> WorkflowResult<VerificationOutcome> {
        let vehicle = match self.session.stage() {
            Stage::Idle => return Err(WorkflowError::PrecursorMissing),
            Stage::VehicleBound { vehicle } => vehicle.clone(),
            Stage::Verified { outcome, .. } if outcome.kind() == OutcomeKind::ScanFailure => {
                outcome.vehicle.clone()
            }
            stage => {
                return Err(WorkflowError::InvalidTransition {
                    action: "enter a part",
                    stage: stage.kind(),
                })
            }
        };

        let identifier = self
            .adapter
            .acquire_manual(ScanKind::Part, raw, &self.reference)?;
        let part = self.resolve_part(&identifier)?;
        self.stats.manual_entries += 1;

        let verdict = classify(&vehicle, &part);
        Ok(self.record(vehicle, verdict, EntrySource::Manual))
    }

    /// After a match, wait for the next part on the same vehicle
    pub fn scan_next_part(&mut self) -> WorkflowResult<()> {
        self.rebind_after(OutcomeKind::Match, "scan the next part")
    }

    /// After a scan failure, wait for another attempt at the part
    pub fn retry_scan_part(&mut self) -> WorkflowResult<()> {
        self.rebind_after(OutcomeKind::ScanFailure, "retry the part scan")
    }

    /// Escalate a mismatch to the supervisor and hold the installation
    pub fn block_installation(&mut self) -> WorkflowResult<AlertEvent> {
        let station = self.config.station_id.clone();
        let alert = match self.session.stage_mut() {
            Stage::Idle => return Err(WorkflowError::PrecursorMissing),
            Stage::Verified {
                outcome,
                installation_blocked,
            } if outcome.kind() == OutcomeKind::Mismatch && !*installation_blocked => {
                *installation_blocked = true;
                let part_id = outcome.verdict.part_id().unwrap_or_default();
                AlertEvent::new(
                    Severity::Error,
                    "Installation Blocked",
                    format!(
                        "Installation blocked for part {} on {}. Supervisor notified.",
                        part_id, outcome.vehicle.vin
                    ),
                    &station,
                )
                .with_vin(&outcome.vehicle.vin)
                .with_part(outcome.verdict.part_id())
            }
            stage => {
                return Err(WorkflowError::InvalidTransition {
                    action: "block installation",
                    stage: stage.kind(),
                })
            }
        };

        self.stats.installations_blocked += 1;
        info!("Installation blocked at {}", station);
        Ok(self.raise(alert))
    }

    /// Discard the vehicle and any outcome. Legal from every stage.
    pub fn reset(&mut self) {
        debug!(
            "Resetting session {} ({})",
            self.session.id,
            self.session.stage().kind()
        );
        self.session = ScanSession::new();
    }

    fn require_idle(&self, action: &'static str) -> WorkflowResult<()> {
        match self.session.stage() {
            Stage::Idle => Ok(()),
            stage => Err(WorkflowError::InvalidTransition {
                action,
                stage: stage.kind(),
            }),
        }
    }

    fn require_awaiting_part(&self, action: &'static str) -> WorkflowResult<&Vehicle> {
        match self.session.stage() {
            Stage::Idle => Err(WorkflowError::PrecursorMissing),
            Stage::VehicleBound { vehicle } => Ok(vehicle),
            stage => Err(WorkflowError::InvalidTransition {
                action,
                stage: stage.kind(),
            }),
        }
    }

    fn rebind_after(&mut self, expected: OutcomeKind, action: &'static str) -> WorkflowResult<()> {
        let vehicle = match self.session.stage() {
            Stage::Idle => return Err(WorkflowError::PrecursorMissing),
            Stage::Verified { outcome, .. } if outcome.kind() == expected => outcome.vehicle.clone(),
            stage => {
                return Err(WorkflowError::InvalidTransition {
                    action,
                    stage: stage.kind(),
                })
            }
        };

        debug!("Awaiting part for {}", vehicle.vin);
        self.session.set_stage(Stage::VehicleBound { vehicle });
        Ok(())
    }

    fn bind_vehicle(&mut self, identifier: &Identifier) -> WorkflowResult<Vehicle> {
        let vehicle = self
            .reference
            .resolve_vehicle(&identifier.value)
            .ok_or_else(|| NotFoundReason {
                kind: ScanKind::Vehicle,
                identifier: identifier.value.clone(),
            })?;

        info!(
            "Vehicle {} bound at {}: {}",
            vehicle.vin,
            self.config.station_id,
            vehicle.configuration()
        );
        self.stats.vehicles_bound += 1;
        self.session.set_stage(Stage::VehicleBound {
            vehicle: vehicle.clone(),
        });
        Ok(vehicle)
    }

    fn resolve_part(&self, identifier: &Identifier) -> WorkflowResult<Part> {
        match self.reference.resolve_part(&identifier.value) {
            Some(part) => Ok(part),
            None => {
                warn!("Part {} is not in the catalog", identifier.value);
                Err(WorkflowError::NotFound(NotFoundReason {
                    kind: ScanKind::Part,
                    identifier: identifier.value.clone(),
                }))
            }
        }
    }

    /// Store a new outcome, publish it and raise whatever alert policy demands
    fn record(
        &mut self,
        vehicle: Vehicle,
        verdict: Verdict,
        source: EntrySource,
    ) -> VerificationOutcome {
        let outcome = VerificationOutcome::new(vehicle, verdict, source);
        self.stats.record(outcome.kind());

        match &outcome.verdict {
            Verdict::Match { part, .. } => {
                info!("{} verified for {}", part.id, outcome.vehicle.vin);
            }
            Verdict::Mismatch {
                part, diverging, ..
            } => {
                warn!(
                    "{} does not fit {} ({} fields differ)",
                    part.id,
                    outcome.vehicle.vin,
                    diverging.len()
                );
                if self.config.alert_policy.emit_alert_on_mismatch {
                    let alert = AlertEvent::new(
                        Severity::Error,
                        "Part Mismatch Detected",
                        outcome.summary(),
                        &self.config.station_id,
                    )
                    .with_vin(&outcome.vehicle.vin)
                    .with_part(Some(&part.id));
                    self.raise(alert);
                }
            }
            Verdict::ScanFailure { part_id, reason } => {
                let message = match part_id {
                    Some(id) => format!("Barcode scanning failed for part {}: {}", id, reason),
                    None => format!("Barcode scanning failed: {}", reason),
                };
                let alert = AlertEvent::new(
                    Severity::Critical,
                    "Barcode Read Failed",
                    message,
                    &self.config.station_id,
                )
                .with_vin(&outcome.vehicle.vin)
                .with_part(part_id.as_deref());
                self.raise(alert);
            }
        }

        self.outcomes.publish(&outcome);
        self.session.set_stage(Stage::Verified {
            outcome: outcome.clone(),
            installation_blocked: false,
        });
        outcome
    }

    fn raise(&mut self, alert: AlertEvent) -> AlertEvent {
        let alert = alert.with_operator(self.config.operator.as_deref());
        self.stats.alerts_raised += 1;
        self.alerts.publish(alert.clone());
        alert
    }
}
