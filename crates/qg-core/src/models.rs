//! Vehicles, parts, verification outcomes and alerts

use crate::Severity;
use chrono::{DateTime, Utc};
use qg_scan::{EntrySource, ScanFailureReason};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Compatibility triple shared by vehicles and parts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Configuration {
    pub model: String,
    pub variant: String,
    pub color: String,
}

impl Configuration {
    pub fn new(model: &str, variant: &str, color: &str) -> Self {
        Self {
            model: model.to_string(),
            variant: variant.to_string(),
            color: color.to_string(),
        }
    }

    pub fn field(&self, field: TripleField) -> &str {
        match field {
            TripleField::Model => &self.model,
            TripleField::Variant => &self.variant,
            TripleField::Color => &self.color,
        }
    }

    /// Fields where `other` differs, in model, variant, color order
    pub fn diverging_from(&self, other: &Configuration) -> Vec<TripleField> {
        TripleField::ALL
            .into_iter()
            .filter(|field| self.field(*field) != other.field(*field))
            .collect()
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} / {}", self.model, self.variant, self.color)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TripleField {
    Model,
    Variant,
    Color,
}

impl TripleField {
    pub const ALL: [TripleField; 3] = [TripleField::Model, TripleField::Variant, TripleField::Color];
}

impl fmt::Display for TripleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripleField::Model => write!(f, "model"),
            TripleField::Variant => write!(f, "variant"),
            TripleField::Color => write!(f, "color"),
        }
    }
}

/// A vehicle as known to the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub vin: String,
    pub model: String,
    pub variant: String,
    pub color: String,
}

impl Vehicle {
    pub fn new(vin: &str, model: &str, variant: &str, color: &str) -> Self {
        Self {
            vin: vin.to_string(),
            model: model.to_string(),
            variant: variant.to_string(),
            color: color.to_string(),
        }
    }

    pub fn configuration(&self) -> Configuration {
        Configuration::new(&self.model, &self.variant, &self.color)
    }
}

/// A part as known to the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// Opaque key, conventionally `<category>-<model>-<variant>-<color>-<seq>`
    pub id: String,
    pub name: String,
    /// Vehicle configuration the part is built for
    pub expected: Configuration,
}

impl Part {
    pub fn new(id: &str, name: &str, expected: Configuration) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            expected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeKind {
    Match,
    Mismatch,
    ScanFailure,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Match => write!(f, "match"),
            OutcomeKind::Mismatch => write!(f, "mismatch"),
            OutcomeKind::ScanFailure => write!(f, "scan failure"),
        }
    }
}

/// Result of checking one part against the bound vehicle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    Match {
        part: Part,
        scanned_as: Configuration,
    },
    Mismatch {
        part: Part,
        /// Triple read off the part
        scanned_as: Configuration,
        /// Never empty
        diverging: Vec<TripleField>,
    },
    ScanFailure {
        /// Identifier the reader was aimed at, if known
        part_id: Option<String>,
        reason: ScanFailureReason,
    },
}

impl Verdict {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Verdict::Match { .. } => OutcomeKind::Match,
            Verdict::Mismatch { .. } => OutcomeKind::Mismatch,
            Verdict::ScanFailure { .. } => OutcomeKind::ScanFailure,
        }
    }

    pub fn part(&self) -> Option<&Part> {
        match self {
            Verdict::Match { part, .. } | Verdict::Mismatch { part, .. } => Some(part),
            Verdict::ScanFailure { .. } => None,
        }
    }

    pub fn part_id(&self) -> Option<&str> {
        match self {
            Verdict::Match { part, .. } | Verdict::Mismatch { part, .. } => Some(&part.id),
            Verdict::ScanFailure { part_id, .. } => part_id.as_deref(),
        }
    }

    pub fn diverging(&self) -> &[TripleField] {
        match self {
            Verdict::Mismatch { diverging, .. } => diverging,
            _ => &[],
        }
    }
}

/// An immutable verification record for one part at one vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub id: Uuid,
    pub vehicle: Vehicle,
    pub verdict: Verdict,
    pub source: EntrySource,
    pub recorded_at: DateTime<Utc>,
}

impl VerificationOutcome {
    pub fn new(vehicle: Vehicle, verdict: Verdict, source: EntrySource) -> Self {
        Self {
            id: Uuid::new_v4(),
            vehicle,
            verdict,
            source,
            recorded_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        self.verdict.kind()
    }

    /// One-line operator summary; mismatches spell out each diverging field
    pub fn summary(&self) -> String {
        match &self.verdict {
            Verdict::Match { part, .. } => format!(
                "VERIFIED: {} ({}) fits {} {}",
                part.name,
                part.id,
                self.vehicle.vin,
                self.vehicle.configuration()
            ),
            Verdict::Mismatch {
                part,
                scanned_as,
                diverging,
            } => {
                let expected = self.vehicle.configuration();
                let fields: Vec<String> = diverging
                    .iter()
                    .map(|field| {
                        format!(
                            "{} expected '{}' scanned '{}'",
                            field,
                            expected.field(*field),
                            scanned_as.field(*field)
                        )
                    })
                    .collect();
                format!(
                    "MISMATCH: {} ({}) on {}: {}",
                    part.name,
                    part.id,
                    self.vehicle.vin,
                    fields.join("; ")
                )
            }
            Verdict::ScanFailure { part_id, reason } => format!(
                "SCAN FAILED{} on {}: {}. Retry the scan or enter the part ID manually",
                part_id
                    .as_deref()
                    .map(|id| format!(" for {}", id))
                    .unwrap_or_default(),
                self.vehicle.vin,
                reason
            ),
        }
    }
}

/// Notification for the line's monitoring consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: Uuid,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub station: String,
    pub vin: Option<String>,
    pub part_id: Option<String>,
    /// Operator signed in at the station when the alert was raised
    #[serde(default)]
    pub operator: Option<String>,
    pub raised_at: DateTime<Utc>,
}

impl AlertEvent {
    pub fn new(severity: Severity, title: &str, message: String, station: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            severity,
            title: title.to_string(),
            message,
            station: station.to_string(),
            vin: None,
            part_id: None,
            operator: None,
            raised_at: Utc::now(),
        }
    }

    pub fn with_vin(mut self, vin: &str) -> Self {
        self.vin = Some(vin.to_string());
        self
    }

    pub fn with_part(mut self, part_id: Option<&str>) -> Self {
        self.part_id = part_id.map(str::to_string);
        self
    }

    pub fn with_operator(mut self, operator: Option<&str>) -> Self {
        self.operator = operator.map(str::to_string);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qg_scan::ScanKind;

    fn slavia() -> Vehicle {
        Vehicle::new("SLA23SL001235", "Slavia", "Ambition", "Brilliant Silver")
    }

    #[test]
    fn test_diverging_fields_in_order() {
        let vehicle = Configuration::new("Slavia", "Ambition", "Brilliant Silver");
        let part = Configuration::new("Kushaq", "Style", "Candy White");
        assert_eq!(
            vehicle.diverging_from(&part),
            vec![TripleField::Model, TripleField::Variant, TripleField::Color]
        );

        let variant_only = Configuration::new("Slavia", "Style", "Brilliant Silver");
        assert_eq!(vehicle.diverging_from(&variant_only), vec![TripleField::Variant]);
        assert!(vehicle.diverging_from(&vehicle.clone()).is_empty());
    }

    #[test]
    fn test_mismatch_summary_names_fields() {
        let part = Part::new(
            "GS-SLA-STY-SL-009",
            "Gear Shift Lever",
            Configuration::new("Slavia", "Style", "Brilliant Silver"),
        );
        let outcome = VerificationOutcome::new(
            slavia(),
            Verdict::Mismatch {
                scanned_as: part.expected.clone(),
                part,
                diverging: vec![TripleField::Variant],
            },
            EntrySource::Scanned,
        );
        let summary = outcome.summary();
        assert!(summary.starts_with("MISMATCH"));
        assert!(summary.contains("variant expected 'Ambition' scanned 'Style'"));
        assert!(!summary.contains("model expected"));
    }

    #[test]
    fn test_scan_failure_summary_prompts_recovery() {
        let outcome = VerificationOutcome::new(
            slavia(),
            Verdict::ScanFailure {
                part_id: Some("GS-SLA-AMB-SL-002".into()),
                reason: ScanFailureReason::Unreadable {
                    kind: ScanKind::Part,
                    attempted: Some("GS-SLA-AMB-SL-002".into()),
                },
            },
            EntrySource::Scanned,
        );
        assert_eq!(outcome.kind(), OutcomeKind::ScanFailure);
        assert_eq!(outcome.verdict.part_id(), Some("GS-SLA-AMB-SL-002"));
        assert!(outcome.summary().contains("enter the part ID manually"));
    }

    #[test]
    fn test_verdict_serializes_with_kind_tag() {
        let part = Part::new(
            "GS-SLA-AMB-SL-002",
            "Gear Shift Lever",
            Configuration::new("Slavia", "Ambition", "Brilliant Silver"),
        );
        let verdict = Verdict::Match {
            scanned_as: part.expected.clone(),
            part,
        };
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["kind"], "match");
        assert_eq!(json["scanned_as"]["variant"], "Ambition");
    }
}
