// AgentDeck Engine — Update Engine
//
// Detects upstream changes to installed resources and applies them.
//
// Module layout:
//   resolver   — lookup with default-branch fallback
//   detector   — per-resource verdict (unchanged / updated / deleted / failed)
//   scheduler  — bounded batch runner, check batches, progress events
//   executor   — fetch → SSOT → record → app sync, single and batch
//   repair     — baseline capture for records without a fingerprint

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;

use crate::atoms::constants::MAX_CONCURRENT_REQUESTS;
use crate::atoms::types::UpdateEvent;
use crate::engine::github::RemoteRepo;
use crate::engine::ssot::SsotStore;
use crate::engine::store::ResourceStore;
use crate::engine::sync::ConfigSink;

pub mod detector;
pub mod executor;
pub mod repair;
pub mod resolver;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub struct UpdateEngine {
    pub(crate) remote: Arc<dyn RemoteRepo>,
    pub(crate) store: Arc<dyn ResourceStore>,
    pub(crate) ssot: Arc<SsotStore>,
    pub(crate) sink: Arc<dyn ConfigSink>,
    /// Shared by every batch this engine runs.
    pub(crate) semaphore: Arc<Semaphore>,
    events: Option<UnboundedSender<UpdateEvent>>,
}

impl UpdateEngine {
    pub fn new(
        remote: Arc<dyn RemoteRepo>,
        store: Arc<dyn ResourceStore>,
        ssot: Arc<SsotStore>,
        sink: Arc<dyn ConfigSink>,
    ) -> Self {
        UpdateEngine {
            remote,
            store,
            ssot,
            sink,
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS)),
            events: None,
        }
    }

    /// Send progress events to `tx`. A dropped receiver is ignored.
    pub fn with_events(mut self, tx: UnboundedSender<UpdateEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub(crate) fn emit(&self, event: UpdateEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}
