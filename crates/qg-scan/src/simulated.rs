//! Simulated station reader
//!
//! Stands in for the camera/barcode hardware. Each read waits a fixed latency,
//! picks an identifier from the configured pool and fails with a configurable
//! probability. Decisions come from a seeded SHA-256 roll so a given seed
//! always replays the same sequence of reads.

use crate::{Identifier, ScanAdapter, ScanError, ScanFailureReason, ScanKind, ScanResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Time a single read takes (milliseconds)
    pub latency_ms: u64,
    /// Probability in [0, 1] that a read cannot be decoded
    pub failure_rate: f64,
    /// Seed for the deterministic roll
    pub seed: u64,
    /// VINs the reader may see
    pub vehicle_pool: Vec<String>,
    /// Part ids the reader may see
    pub part_pool: Vec<String>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            latency_ms: 1500,
            failure_rate: 1.0 / 3.0,
            seed: 0,
            vehicle_pool: Vec::new(),
            part_pool: Vec::new(),
        }
    }
}

pub struct SimulatedScanner {
    config: SimulatorConfig,
    draws: AtomicU64,
}

impl SimulatedScanner {
    pub fn new(config: SimulatorConfig) -> ScanResult<Self> {
        if !config.failure_rate.is_finite() || !(0.0..=1.0).contains(&config.failure_rate) {
            return Err(ScanError::Config(format!(
                "failure_rate must be within [0, 1], got {}",
                config.failure_rate
            )));
        }

        Ok(Self {
            config,
            draws: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Number of reads performed so far
    pub fn draws(&self) -> u64 {
        self.draws.load(Ordering::Relaxed)
    }

    fn pool(&self, kind: ScanKind) -> &[String] {
        match kind {
            ScanKind::Vehicle => &self.config.vehicle_pool,
            ScanKind::Part => &self.config.part_pool,
        }
    }

    fn roll(&self, draw: u64, salt: &[u8]) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(self.config.seed.to_le_bytes());
        hasher.update(draw.to_le_bytes());
        hasher.update(salt);
        let digest = hasher.finalize();

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Decide the result of read number `draw` without waiting
    fn decide(&self, kind: ScanKind, draw: u64) -> Result<Identifier, ScanFailureReason> {
        let pool = self.pool(kind);
        if pool.is_empty() {
            return Err(ScanFailureReason::DeviceUnavailable(format!(
                "no {} codes in view",
                kind
            )));
        }

        let index = (self.roll(draw, b"pick") % pool.len() as u64) as usize;
        let value = &pool[index];

        // Top 53 bits give a uniform value in [0, 1)
        let unit = (self.roll(draw, b"fail") >> 11) as f64 / (1u64 << 53) as f64;
        if unit < self.config.failure_rate {
            return Err(ScanFailureReason::Unreadable {
                kind,
                attempted: Some(value.clone()),
            });
        }

        Ok(Identifier::scanned(kind, value.clone()))
    }
}

#[async_trait]
impl ScanAdapter for SimulatedScanner {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn acquire(&self, kind: ScanKind) -> Result<Identifier, ScanFailureReason> {
        tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;

        let draw = self.draws.fetch_add(1, Ordering::Relaxed);
        let result = self.decide(kind, draw);
        match &result {
            Ok(id) => tracing::debug!("Simulated {} read #{}: {}", kind, draw, id.value),
            Err(reason) => tracing::debug!("Simulated {} read #{} failed: {}", kind, draw, reason),
        }
        result
    }
}
