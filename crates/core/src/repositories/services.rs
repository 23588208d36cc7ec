//! Service catalog: the check-post services a visit can be routed to.
//!
//! Catalog entries are reference data. An encounter copies the service *code*
//! when it is opened, so later catalog edits never rewrite history.

use crate::error::{CheckpostError, CheckpostResult, EntityKind};
use crate::model::{Service, ServiceId};
use crate::store::RecordStore;
use checkpost_types::NonEmptyText;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Lookup the visit lifecycle depends on.
pub trait ServiceCatalog: Send + Sync {
    fn find_by_id(&self, id: ServiceId) -> CheckpostResult<Service>;
}

/// One entry of a services seed file.
///
/// ```yaml
/// - code: OPD
///   label: Out-patient department
/// - code: PHARMACY
///   label: Pharmacy
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServiceSeed {
    code: NonEmptyText,
    label: NonEmptyText,
}

/// [`ServiceCatalog`] backed by the record store.
#[derive(Clone, Debug)]
pub struct StoreServiceCatalog {
    store: Arc<RecordStore>,
}

impl StoreServiceCatalog {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    pub fn register(&self, code: &str, label: &str) -> CheckpostResult<Service> {
        let code = NonEmptyText::new(code)?;
        let label = NonEmptyText::new(label)?;

        let service = self.store.transaction(|tables| {
            Ok(tables.insert_service_with(|id| Service { id, code, label }))
        })?;

        tracing::info!("registered service {} ({})", service.code, service.id);
        Ok(service)
    }

    /// Every catalog entry in id order.
    pub fn list(&self) -> CheckpostResult<Vec<Service>> {
        self.store
            .read(|tables| tables.services().cloned().collect())
    }

    /// Seeds the catalog from a YAML list of `{code, label}` entries.
    ///
    /// Codes already present in the catalog are skipped, so the same file can be
    /// loaded on every start against a persisted store. All new entries are added
    /// in one transaction.
    ///
    /// # Arguments
    ///
    /// - `path`: A YAML file holding a sequence of `{code, label}` mappings.
    ///
    /// # Returns
    ///
    /// How many entries were added.
    ///
    /// # Errors
    ///
    /// - `StoreRead` if the file cannot be read.
    /// - `InvalidInput` naming the failing path if an entry is malformed or has a
    ///   blank code or label.
    pub fn load_from_yaml(&self, path: &Path) -> CheckpostResult<usize> {
        let raw = fs::read_to_string(path).map_err(CheckpostError::StoreRead)?;
        let deserializer = serde_yaml::Deserializer::from_str(&raw);
        let seeds: Vec<ServiceSeed> = serde_path_to_error::deserialize(deserializer)
            .map_err(|err| {
                CheckpostError::InvalidInput(format!(
                    "services file {} invalid at {}: {}",
                    path.display(),
                    err.path(),
                    err.inner()
                ))
            })?;

        let added = self.store.transaction(|tables| {
            let mut added = 0;
            for seed in seeds {
                if tables.services().any(|s| s.code == seed.code) {
                    continue;
                }
                tables.insert_service_with(|id| Service {
                    id,
                    code: seed.code,
                    label: seed.label,
                });
                added += 1;
            }
            Ok(added)
        })?;

        tracing::info!("loaded {} services from {}", added, path.display());
        Ok(added)
    }
}

impl ServiceCatalog for StoreServiceCatalog {
    fn find_by_id(&self, id: ServiceId) -> CheckpostResult<Service> {
        self.store
            .read(|tables| tables.service(id).cloned())?
            .ok_or_else(|| CheckpostError::not_found(EntityKind::Service, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn catalog() -> StoreServiceCatalog {
        StoreServiceCatalog::new(Arc::new(RecordStore::in_memory()))
    }

    #[test]
    fn test_register_and_find() {
        let catalog = catalog();
        let opd = catalog
            .register("OPD", "Out-patient department")
            .expect("register should succeed");

        let found = catalog.find_by_id(opd.id).expect("find should succeed");
        assert_eq!(found.code.as_str(), "OPD");
        assert_eq!(catalog.list().unwrap().len(), 1);
    }

    #[test]
    fn test_find_missing_names_the_id() {
        let err = catalog()
            .find_by_id(ServiceId(404))
            .expect_err("lookup should fail");
        assert_eq!(err.to_string(), "no service found with id 404");
    }

    #[test]
    fn test_register_rejects_blank_code() {
        assert!(matches!(
            catalog().register("  ", "Nothing"),
            Err(CheckpostError::Text(_))
        ));
    }

    #[test]
    fn test_load_from_yaml_skips_known_codes() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let file = temp_dir.path().join("services.yaml");
        fs::write(
            &file,
            "- code: OPD\n  label: Out-patient department\n- code: PHARMACY\n  label: Pharmacy\n",
        )
        .expect("should write services file");

        let catalog = catalog();
        catalog.register("OPD", "Existing").unwrap();

        let added = catalog.load_from_yaml(&file).expect("load should succeed");
        assert_eq!(added, 1);

        let again = catalog.load_from_yaml(&file).expect("reload should succeed");
        assert_eq!(again, 0);

        let codes: Vec<String> = catalog
            .list()
            .unwrap()
            .into_iter()
            .map(|s| s.code.into_inner())
            .collect();
        assert_eq!(codes, vec!["OPD", "PHARMACY"]);
    }

    #[test]
    fn test_load_from_yaml_reports_bad_entries() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let file = temp_dir.path().join("services.yaml");
        fs::write(&file, "- code: OPD\n  colour: red\n").expect("should write services file");

        let err = catalog()
            .load_from_yaml(&file)
            .expect_err("load should fail");
        assert!(matches!(err, CheckpostError::InvalidInput(_)));
    }
}
