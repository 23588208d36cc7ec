//! # Checkpost Core
//!
//! Core business logic for patient check-in and check-out at a clinical facility.
//!
//! A person arrives, a *visit* is opened for them, and the visit is routed to one
//! or more check-post services by opening one *encounter* per service. Staff
//! complete encounters as the person is seen; checking the visit out completes
//! whatever is still pending and closes the visit.
//!
//! This crate contains:
//! - the record model and a transactional record store ([`store`])
//! - repositories for persons, services, encounters and visits ([`repositories`])
//! - read-side views assembled from those records ([`views`])
//!
//! **No API concerns**: HTTP servers, request parsing and process configuration
//! belong in `api-rest`, the CLI and the workspace binary.

pub mod config;
pub mod constants;
pub mod error;
pub mod model;
pub mod paging;
pub mod repositories;
pub mod store;
pub mod views;

pub use config::{page_size_from_env_value, CoreConfig};
pub use error::{CheckpostError, CheckpostResult, EntityKind};
pub use model::{
    Encounter, EncounterId, EncounterStatus, Person, PersonId, Service, ServiceId, Visit,
    VisitId, VisitState,
};
pub use repositories::encounters::EncounterTracker;
pub use repositories::persons::{PersonDirectory, StorePersonDirectory};
pub use repositories::services::{ServiceCatalog, StoreServiceCatalog};
pub use repositories::visits::VisitLifecycleManager;
pub use store::RecordStore;
pub use views::VisitQueryAssembler;

use std::sync::Arc;

/// Every core service wired to one shared [`RecordStore`].
///
/// Binaries build this once from their resolved [`CoreConfig`] and hand out
/// references to the individual services.
#[derive(Clone)]
pub struct CheckpostService {
    cfg: Arc<CoreConfig>,
    store: Arc<RecordStore>,
    persons: StorePersonDirectory,
    catalog: StoreServiceCatalog,
    encounters: EncounterTracker,
    visits: VisitLifecycleManager,
    queries: VisitQueryAssembler,
}

impl CheckpostService {
    /// Opens the store described by `cfg` and seeds the service catalog from
    /// the configured services file, if any.
    ///
    /// # Errors
    ///
    /// Returns `CheckpostError` if the store cannot be opened or the services
    /// file cannot be loaded.
    pub fn new(cfg: Arc<CoreConfig>) -> CheckpostResult<Self> {
        let store = Arc::new(RecordStore::from_config(&cfg)?);
        if !store.is_persistent() {
            tracing::warn!("no data directory configured; records are kept in memory only");
        }
        let svc = Self::with_store(cfg.clone(), store);

        if let Some(file) = cfg.services_file() {
            svc.catalog.load_from_yaml(file)?;
        }
        Ok(svc)
    }

    /// An in-memory instance with default configuration.
    pub fn in_memory() -> Self {
        Self::with_store(
            Arc::new(CoreConfig::in_memory()),
            Arc::new(RecordStore::in_memory()),
        )
    }

    fn with_store(cfg: Arc<CoreConfig>, store: Arc<RecordStore>) -> Self {
        let persons = StorePersonDirectory::new(store.clone());
        let catalog = StoreServiceCatalog::new(store.clone());
        let visits = VisitLifecycleManager::new(
            store.clone(),
            Arc::new(persons.clone()),
            Arc::new(catalog.clone()),
        );

        Self {
            cfg,
            encounters: EncounterTracker::new(store.clone()),
            queries: VisitQueryAssembler::new(store.clone()),
            store,
            persons,
            catalog,
            visits,
        }
    }

    pub fn cfg(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn persons(&self) -> &StorePersonDirectory {
        &self.persons
    }

    pub fn catalog(&self) -> &StoreServiceCatalog {
        &self.catalog
    }

    pub fn encounters(&self) -> &EncounterTracker {
        &self.encounters
    }

    pub fn visits(&self) -> &VisitLifecycleManager {
        &self.visits
    }

    pub fn queries(&self) -> &VisitQueryAssembler {
        &self.queries
    }
}
