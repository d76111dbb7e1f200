//! Scripted reader that replays a fixed sequence of reads

use crate::{Identifier, ScanAdapter, ScanFailureReason, ScanKind};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Replays queued results in order. Once the script runs dry every read
/// reports the reader as unavailable.
pub struct ScriptedScanner {
    script: Mutex<VecDeque<Result<Identifier, ScanFailureReason>>>,
    latency: Duration,
}

impl ScriptedScanner {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue a successful read
    pub fn then_read(self, kind: ScanKind, value: &str) -> Self {
        self.push(Ok(Identifier::scanned(kind, value)));
        self
    }

    /// Queue an undecodable read of `attempted`
    pub fn then_unreadable(self, kind: ScanKind, attempted: Option<&str>) -> Self {
        self.push(Err(ScanFailureReason::Unreadable {
            kind,
            attempted: attempted.map(str::to_string),
        }));
        self
    }

    pub fn push(&self, result: Result<Identifier, ScanFailureReason>) {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        script.push_back(result);
    }

    /// Reads still queued
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for ScriptedScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScanAdapter for ScriptedScanner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn acquire(&self, kind: ScanKind) -> Result<Identifier, ScanFailureReason> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match next {
            // The script decides what was in view; the requested kind is stamped on
            Some(Ok(mut id)) => {
                id.kind = kind;
                Ok(id)
            }
            Some(Err(reason)) => Err(reason),
            None => Err(ScanFailureReason::DeviceUnavailable(
                "script exhausted".to_string(),
            )),
        }
    }
}
