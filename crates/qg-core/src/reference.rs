//! Reference data: the vehicle registry and the part catalog

use crate::models::{Configuration, Part, Vehicle};
use crate::{CoreError, CoreResult};
use qg_scan::{IdentifierLookup, ScanKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub trait VehicleRegistry: Send + Sync {
    fn resolve_vehicle(&self, vin: &str) -> Option<Vehicle>;
}

pub trait PartCatalog: Send + Sync {
    fn resolve_part(&self, part_id: &str) -> Option<Part>;
}

#[derive(Deserialize)]
struct ReferenceFile {
    #[serde(default)]
    vehicles: Vec<Vehicle>,
    #[serde(default)]
    parts: Vec<Part>,
}

/// In-memory registry and catalog, indexed by identifier
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReferenceData {
    vehicles: Vec<Vehicle>,
    parts: Vec<Part>,
    #[serde(skip)]
    vehicle_index: HashMap<String, usize>,
    #[serde(skip)]
    part_index: HashMap<String, usize>,
}

impl ReferenceData {
    pub fn new(vehicles: Vec<Vehicle>, parts: Vec<Part>) -> CoreResult<Self> {
        let mut vehicle_index = HashMap::new();
        for (i, vehicle) in vehicles.iter().enumerate() {
            if vehicle.vin.trim().is_empty() {
                return Err(CoreError::Config(format!("vehicle #{} has an empty VIN", i)));
            }
            if vehicle_index.insert(vehicle.vin.clone(), i).is_some() {
                return Err(CoreError::Config(format!("duplicate VIN {}", vehicle.vin)));
            }
        }

        let mut part_index = HashMap::new();
        for (i, part) in parts.iter().enumerate() {
            if part.id.trim().is_empty() {
                return Err(CoreError::Config(format!("part #{} has an empty id", i)));
            }
            if part_index.insert(part.id.clone(), i).is_some() {
                return Err(CoreError::Config(format!("duplicate part id {}", part.id)));
            }
        }

        Ok(Self {
            vehicles,
            parts,
            vehicle_index,
            part_index,
        })
    }

    /// Parse `{"vehicles": [...], "parts": [...]}`
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let file: ReferenceFile = serde_json::from_str(json)?;
        Self::new(file.vehicles, file.parts)
    }

    pub fn from_path(path: &Path) -> CoreResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let data = Self::from_json_str(&json)?;
        tracing::info!(
            "Loaded {} vehicles and {} parts from {}",
            data.vehicles.len(),
            data.parts.len(),
            path.display()
        );
        Ok(data)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Showroom line-up used by the station demo
    pub fn demo() -> Self {
        let vehicles = vec![
            Vehicle::new("SKU23WH001234", "Kushaq", "Style", "Candy White"),
            Vehicle::new("SLA23SL001235", "Slavia", "Ambition", "Brilliant Silver"),
            Vehicle::new("KOD23BL001236", "Kodiaq", "L&K", "Lava Blue"),
        ];
        let parts = vec![
            Part::new(
                "DH-KUS-STY-WH-001",
                "Door Handle - Chrome",
                Configuration::new("Kushaq", "Style", "Candy White"),
            ),
            Part::new(
                "GS-SLA-AMB-SL-002",
                "Gear Shift Lever",
                Configuration::new("Slavia", "Ambition", "Brilliant Silver"),
            ),
            Part::new(
                "OR-KOD-LK-BL-003",
                "ORVM Assembly",
                Configuration::new("Kodiaq", "L&K", "Lava Blue"),
            ),
            Part::new(
                "CC-KUS-STY-WH-004",
                "Centre Console",
                Configuration::new("Kushaq", "Style", "Candy White"),
            ),
        ];

        // Identifiers above are unique and non-empty
        Self::new(vehicles, parts).unwrap_or_default()
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }
}

impl VehicleRegistry for ReferenceData {
    fn resolve_vehicle(&self, vin: &str) -> Option<Vehicle> {
        self.vehicle_index.get(vin).map(|i| self.vehicles[*i].clone())
    }
}

impl PartCatalog for ReferenceData {
    fn resolve_part(&self, part_id: &str) -> Option<Part> {
        self.part_index.get(part_id).map(|i| self.parts[*i].clone())
    }
}

impl IdentifierLookup for ReferenceData {
    fn contains(&self, kind: ScanKind, identifier: &str) -> bool {
        match kind {
            ScanKind::Vehicle => self.vehicle_index.contains_key(identifier),
            ScanKind::Part => self.part_index.contains_key(identifier),
        }
    }
}
