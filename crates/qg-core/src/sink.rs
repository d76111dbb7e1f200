//! Consumers of verification events
//!
//! The engine publishes and moves on: sinks are fire-and-forget and own any
//! retention, acknowledgement or resolution of what they receive.

use crate::models::{AlertEvent, VerificationOutcome};
use crate::Severity;
use std::collections::VecDeque;
use std::sync::Mutex;
use uuid::Uuid;

pub trait AlertSink: Send + Sync {
    fn publish(&self, alert: AlertEvent);
}

pub trait OutcomeSink: Send + Sync {
    fn publish(&self, outcome: &VerificationOutcome);
}

/// Writes alerts and outcomes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AlertSink for TracingSink {
    fn publish(&self, alert: AlertEvent) {
        match alert.severity {
            Severity::Critical | Severity::Error => tracing::error!(
                "[{}] {} at {}: {}",
                alert.severity,
                alert.title,
                alert.station,
                alert.message
            ),
            Severity::Warning => tracing::warn!("{} at {}: {}", alert.title, alert.station, alert.message),
            Severity::Info => tracing::info!("{} at {}: {}", alert.title, alert.station, alert.message),
        }
    }
}

impl OutcomeSink for TracingSink {
    fn publish(&self, outcome: &VerificationOutcome) {
        tracing::info!("{}", outcome.summary());
    }
}

/// An alert held by the in-memory monitor
#[derive(Debug, Clone)]
pub struct TrackedAlert {
    pub alert: AlertEvent,
    pub resolved: bool,
}

/// Collects alerts for a monitoring view
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    alerts: Mutex<Vec<TrackedAlert>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every alert received, oldest first
    pub fn alerts(&self) -> Vec<AlertEvent> {
        self.lock().iter().map(|t| t.alert.clone()).collect()
    }

    /// Unresolved alerts, most severe first
    pub fn active(&self) -> Vec<AlertEvent> {
        let mut active: Vec<AlertEvent> = self
            .lock()
            .iter()
            .filter(|t| !t.resolved)
            .map(|t| t.alert.clone())
            .collect();
        active.sort_by(|a, b| b.severity.cmp(&a.severity));
        active
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Mark an alert resolved; false if it is unknown
    pub fn resolve(&self, id: Uuid) -> bool {
        let mut alerts = self.lock();
        match alerts.iter_mut().find(|t| t.alert.id == id) {
            Some(tracked) => {
                tracked.resolved = true;
                true
            }
            None => false,
        }
    }

    /// Drop resolved alerts, returning how many were removed
    pub fn clear_resolved(&self) -> usize {
        let mut alerts = self.lock();
        let before = alerts.len();
        alerts.retain(|t| !t.resolved);
        before - alerts.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TrackedAlert>> {
        self.alerts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl AlertSink for MemoryAlertSink {
    fn publish(&self, alert: AlertEvent) {
        self.lock().push(TrackedAlert {
            alert,
            resolved: false,
        });
    }
}

/// Bounded list of the latest outcomes, newest first
#[derive(Debug)]
pub struct RecentOutcomes {
    capacity: usize,
    outcomes: Mutex<VecDeque<VerificationOutcome>>,
}

impl RecentOutcomes {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            outcomes: Mutex::new(VecDeque::new()),
        }
    }

    pub fn snapshot(&self) -> Vec<VerificationOutcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn latest(&self) -> Option<VerificationOutcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .front()
            .cloned()
    }
}

impl Default for RecentOutcomes {
    fn default() -> Self {
        Self::new(5)
    }
}

impl OutcomeSink for RecentOutcomes {
    fn publish(&self, outcome: &VerificationOutcome) {
        let mut outcomes = self.outcomes.lock().unwrap_or_else(|e| e.into_inner());
        outcomes.push_front(outcome.clone());
        outcomes.truncate(self.capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Configuration, Part, Vehicle, Verdict};
    use qg_scan::EntrySource;

    fn alert(severity: Severity) -> AlertEvent {
        AlertEvent::new(severity, "Test", "message".to_string(), "ST001")
    }

    fn outcome(part_id: &str) -> VerificationOutcome {
        let part = Part::new(part_id, "Part", Configuration::new("Kodiaq", "L&K", "Lava Blue"));
        VerificationOutcome::new(
            Vehicle::new("KOD23BL001236", "Kodiaq", "L&K", "Lava Blue"),
            Verdict::Match {
                scanned_as: part.expected.clone(),
                part,
            },
            EntrySource::Scanned,
        )
    }

    #[test]
    fn test_memory_sink_resolve_and_clear() {
        let sink = MemoryAlertSink::new();
        sink.publish(alert(Severity::Error));
        sink.publish(alert(Severity::Critical));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.active()[0].severity, Severity::Critical);

        let first = sink.alerts()[0].id;
        assert!(sink.resolve(first));
        assert!(!sink.resolve(Uuid::new_v4()));
        assert_eq!(sink.active().len(), 1);

        assert_eq!(sink.clear_resolved(), 1);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_recent_outcomes_bounded() {
        let recent = RecentOutcomes::new(2);
        recent.publish(&outcome("A"));
        recent.publish(&outcome("B"));
        recent.publish(&outcome("C"));

        let ids: Vec<_> = recent
            .snapshot()
            .iter()
            .map(|o| o.verdict.part_id().unwrap_or_default().to_string())
            .collect();
        assert_eq!(ids, vec!["C", "B"]);
        assert_eq!(recent.latest().unwrap().verdict.part_id(), Some("C"));
    }
}
