//! Prioritized resource cleanup
//!
//! Caches, prefetched media, and other reclaimable resources register a
//! cleaner with a priority. When memory pressure crosses a band the
//! coordinator runs the matching subset and reports what each cleaner
//! freed. Passes are best-effort: one cleaner failing never blocks the
//! rest.

use crate::types::{CleanupPriority, CleanupResult, MemoryPressure};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// A reclaimable resource owner
#[async_trait]
pub trait ResourceCleaner: Send + Sync {
    /// Name used in results and diagnostics
    fn name(&self) -> &str;

    /// Release what can be released; returns bytes freed
    async fn cleanup(&self) -> anyhow::Result<u64>;
}

struct RegisteredCleaner {
    cleaner: Arc<dyn ResourceCleaner>,
    priority: CleanupPriority,
}

/// Runs registered cleaners in response to memory pressure transitions
///
/// Reactions are deduplicated by pressure value: a repeated `Warning`
/// sample does nothing until the pressure actually changes.
pub struct ResourceCleanupCoordinator {
    cleaners: Vec<RegisteredCleaner>,
    last_pressure: Option<MemoryPressure>,
    results_tx: broadcast::Sender<Vec<CleanupResult>>,
}

impl ResourceCleanupCoordinator {
    pub fn new() -> Self {
        let (results_tx, _) = broadcast::channel(16);
        Self {
            cleaners: Vec::new(),
            last_pressure: None,
            results_tx,
        }
    }

    /// Register a cleaner; registration order is invocation order
    pub fn register(&mut self, cleaner: Arc<dyn ResourceCleaner>, priority: CleanupPriority) {
        self.cleaners.push(RegisteredCleaner { cleaner, priority });
    }

    /// Number of registered cleaners
    pub fn cleaner_count(&self) -> usize {
        self.cleaners.len()
    }

    /// Subscribe to per-pass result batches
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<CleanupResult>> {
        self.results_tx.subscribe()
    }

    /// React to a pressure sample
    ///
    /// Returns the batch when a pass ran, `None` for duplicate pressure
    /// values or `Normal` pressure.
    pub async fn handle_pressure(
        &mut self,
        pressure: MemoryPressure,
    ) -> Option<Vec<CleanupResult>> {
        if self.last_pressure == Some(pressure) {
            return None;
        }
        self.last_pressure = Some(pressure);

        match pressure {
            MemoryPressure::Critical => Some(self.cleanup_all().await),
            MemoryPressure::Warning => Some(self.cleanup_up_to(CleanupPriority::Medium).await),
            MemoryPressure::Normal => None,
        }
    }

    /// Run every registered cleaner regardless of priority
    pub async fn cleanup_all(&self) -> Vec<CleanupResult> {
        self.run_pass(None).await
    }

    /// Run cleaners whose priority is at or below `max_priority`
    pub async fn cleanup_up_to(&self, max_priority: CleanupPriority) -> Vec<CleanupResult> {
        self.run_pass(Some(max_priority)).await
    }

    async fn run_pass(&self, max_priority: Option<CleanupPriority>) -> Vec<CleanupResult> {
        let mut results = Vec::new();

        for entry in &self.cleaners {
            if let Some(max) = max_priority {
                if entry.priority > max {
                    continue;
                }
            }

            let name = entry.cleaner.name().to_string();
            let result = match entry.cleaner.cleanup().await {
                Ok(bytes_freed) => CleanupResult::succeeded(name, bytes_freed),
                Err(error) => {
                    warn!(cleaner = %entry.cleaner.name(), %error, "cleaner failed");
                    CleanupResult::failed(name, error.to_string())
                }
            };
            results.push(result);
        }

        let total_freed: u64 = results.iter().map(|r| r.bytes_freed).sum();
        info!(
            cleaners = results.len(),
            total_freed, "cleanup pass complete"
        );

        let _ = self.results_tx.send(results.clone());
        results
    }

    /// Forget the last seen pressure, for reuse across sessions
    pub fn reset(&mut self) {
        self.last_pressure = None;
    }
}

impl Default for ResourceCleanupCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
