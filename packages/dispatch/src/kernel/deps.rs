//! Dispatch dependencies for effects and actions (using traits for testability)
//!
//! Both store adapters implement every `Base*` trait; the container hands each
//! concern out as its own trait object so tests can swap a single one (e.g. a
//! recording registry) without touching the rest.

use std::sync::Arc;

use super::memory_store::MemoryStore;
use super::postgres_store::PgStore;
use super::request_locks::RequestLocks;
use super::traits::{
    BaseDispatchStore, BaseDonorDirectory, BaseDonorRegistry, BaseGeoIndex, BaseMatchLedger,
    BaseRequestStore,
};
use crate::config::DispatchSettings;

#[derive(Clone)]
pub struct DispatchDeps {
    pub geo_index: Arc<dyn BaseGeoIndex>,
    pub registry: Arc<dyn BaseDonorRegistry>,
    pub ledger: Arc<dyn BaseMatchLedger>,
    pub requests: Arc<dyn BaseRequestStore>,
    pub dispatches: Arc<dyn BaseDispatchStore>,
    pub donors: Arc<dyn BaseDonorDirectory>,
    pub locks: RequestLocks,
    pub settings: DispatchSettings,
}

impl DispatchDeps {
    pub fn in_memory(store: Arc<MemoryStore>, settings: DispatchSettings) -> Self {
        Self {
            geo_index: store.clone(),
            registry: store.clone(),
            ledger: store.clone(),
            requests: store.clone(),
            dispatches: store.clone(),
            donors: store,
            locks: RequestLocks::new(),
            settings,
        }
    }

    pub fn postgres(store: PgStore, settings: DispatchSettings) -> Self {
        let store = Arc::new(store);
        Self {
            geo_index: store.clone(),
            registry: store.clone(),
            ledger: store.clone(),
            requests: store.clone(),
            dispatches: store.clone(),
            donors: store,
            locks: RequestLocks::new(),
            settings,
        }
    }

    /// Replaces the donor registry, keeping every other collaborator.
    pub fn with_registry(mut self, registry: Arc<dyn BaseDonorRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn BaseMatchLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn with_dispatches(mut self, dispatches: Arc<dyn BaseDispatchStore>) -> Self {
        self.dispatches = dispatches;
        self
    }
}
