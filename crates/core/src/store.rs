//! The record store.
//!
//! All persons, services, visits and encounters live in one set of [`Tables`]
//! behind a mutex. Reads borrow the live tables; writes go through
//! [`RecordStore::transaction`], which runs against a working copy and swaps it
//! in only when the closure succeeds (and, for a file-backed store, only once the
//! snapshot has been written). A failure anywhere inside a transaction therefore
//! leaves no trace, and because the lock is held for the whole closure, writes are
//! serialised: two check-ins for the same person cannot both pass the open-visit
//! check.
//!
//! ## Snapshot layout
//!
//! ```text
//! <data_dir>/
//!   records.yaml        # all tables and id sequences
//!   records.yaml.tmp    # transient, renamed over records.yaml on commit
//! ```

use crate::config::CoreConfig;
use crate::constants::{SNAPSHOT_FILENAME, SNAPSHOT_TMP_FILENAME};
use crate::error::{CheckpostError, CheckpostResult};
use crate::model::{
    Encounter, EncounterId, EncounterStatus, Person, PersonId, Service, ServiceId, Visit,
    VisitId,
};
use checkpost_types::CheckpointTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Fields of a visit that the caller decides; the store assigns ids.
#[derive(Clone, Debug)]
pub(crate) struct NewVisit {
    pub person_id: PersonId,
    pub facility_id: i64,
    pub start: CheckpointTime,
}

/// Fields of an encounter that the caller decides; the store assigns ids and status.
#[derive(Clone, Debug)]
pub(crate) struct NewEncounter {
    pub person_id: PersonId,
    pub visit_id: VisitId,
    pub facility_id: i64,
    pub service_code: String,
    pub encounter_date: CheckpointTime,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Sequences {
    person: i64,
    service: i64,
    visit: i64,
    encounter: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// Every table of the store. Records are keyed (and therefore ordered) by id,
/// which is also creation order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tables {
    #[serde(default)]
    persons: BTreeMap<PersonId, Person>,
    #[serde(default)]
    services: BTreeMap<ServiceId, Service>,
    #[serde(default)]
    visits: BTreeMap<VisitId, Visit>,
    #[serde(default)]
    encounters: BTreeMap<EncounterId, Encounter>,
    #[serde(default)]
    sequences: Sequences,
}

// ============================================================================
// READS
// ============================================================================

impl Tables {
    pub fn person(&self, id: PersonId) -> Option<&Person> {
        self.persons.get(&id)
    }

    pub fn persons(&self) -> impl Iterator<Item = &Person> {
        self.persons.values()
    }

    pub fn service(&self, id: ServiceId) -> Option<&Service> {
        self.services.get(&id)
    }

    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    pub fn visit(&self, id: VisitId) -> Option<&Visit> {
        self.visits.get(&id)
    }

    pub fn visits(&self) -> impl Iterator<Item = &Visit> {
        self.visits.values()
    }

    pub fn encounter(&self, id: EncounterId) -> Option<&Encounter> {
        self.encounters.get(&id)
    }

    /// The person's open visit, archived or not.
    pub fn open_visit_for(&self, person_id: PersonId) -> Option<&Visit> {
        self.visits
            .values()
            .find(|v| v.person_id == person_id && v.is_open())
    }

    /// Encounters of a visit in creation order.
    pub fn encounters_for_visit(&self, visit_id: VisitId) -> Vec<&Encounter> {
        self.encounters
            .values()
            .filter(|e| e.visit_id == visit_id)
            .collect()
    }

    /// Non-archived encounters of a person in creation order.
    pub fn encounters_for_person(&self, person_id: PersonId) -> Vec<&Encounter> {
        self.encounters
            .values()
            .filter(|e| e.person_id == person_id && !e.archived)
            .collect()
    }
}

// ============================================================================
// WRITES (only reachable inside a transaction)
// ============================================================================

impl Tables {
    pub(crate) fn insert_person_with(&mut self, build: impl FnOnce(PersonId) -> Person) -> Person {
        let id = PersonId(next_id(&mut self.sequences.person));
        let person = build(id);
        self.persons.insert(id, person.clone());
        person
    }

    pub(crate) fn person_mut(&mut self, id: PersonId) -> Option<&mut Person> {
        self.persons.get_mut(&id)
    }

    pub(crate) fn insert_service_with(
        &mut self,
        build: impl FnOnce(ServiceId) -> Service,
    ) -> Service {
        let id = ServiceId(next_id(&mut self.sequences.service));
        let service = build(id);
        self.services.insert(id, service.clone());
        service
    }

    /// Inserts an open visit, failing closed if the person already has one.
    pub(crate) fn insert_visit(&mut self, new: NewVisit) -> CheckpostResult<Visit> {
        if self.open_visit_for(new.person_id).is_some() {
            return Err(CheckpostError::Conflict {
                person_id: new.person_id.0,
            });
        }

        let id = VisitId(next_id(&mut self.sequences.visit));
        let visit = Visit {
            id,
            uuid: Uuid::new_v4().to_string(),
            person_id: new.person_id,
            facility_id: new.facility_id,
            start: new.start,
            end: None,
            archived: false,
        };
        self.visits.insert(id, visit.clone());
        Ok(visit)
    }

    /// Overwrites an existing visit, keeping the one-open-visit-per-person rule.
    pub(crate) fn replace_visit(&mut self, visit: Visit) -> CheckpostResult<()> {
        if !self.visits.contains_key(&visit.id) {
            return Err(CheckpostError::not_found(
                crate::error::EntityKind::Visit,
                visit.id,
            ));
        }

        if visit.is_open() {
            let clash = self
                .visits
                .values()
                .any(|v| v.id != visit.id && v.person_id == visit.person_id && v.is_open());
            if clash {
                return Err(CheckpostError::Conflict {
                    person_id: visit.person_id.0,
                });
            }
        }

        self.visits.insert(visit.id, visit);
        Ok(())
    }

    pub(crate) fn insert_encounter(&mut self, new: NewEncounter) -> Encounter {
        let id = EncounterId(next_id(&mut self.sequences.encounter));
        let encounter = Encounter {
            id,
            uuid: Uuid::new_v4().to_string(),
            person_id: new.person_id,
            visit_id: new.visit_id,
            facility_id: new.facility_id,
            service_code: new.service_code,
            encounter_date: new.encounter_date,
            status: EncounterStatus::Pending,
            archived: false,
        };
        self.encounters.insert(id, encounter.clone());
        encounter
    }

    pub(crate) fn encounter_mut(&mut self, id: EncounterId) -> Option<&mut Encounter> {
        self.encounters.get_mut(&id)
    }

    pub(crate) fn encounters_for_visit_mut(
        &mut self,
        visit_id: VisitId,
    ) -> impl Iterator<Item = &mut Encounter> {
        self.encounters
            .values_mut()
            .filter(move |e| e.visit_id == visit_id)
    }
}

// ============================================================================
// RECORD STORE
// ============================================================================

/// Transactional holder of [`Tables`], optionally persisted as a YAML snapshot.
#[derive(Debug)]
pub struct RecordStore {
    tables: Mutex<Tables>,
    snapshot_path: Option<PathBuf>,
}

impl RecordStore {
    /// A store that keeps records for the lifetime of the process only.
    pub fn in_memory() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            snapshot_path: None,
        }
    }

    /// Opens (or creates) a file-backed store in `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns `CheckpostError` if:
    /// - the directory cannot be created ([`CheckpostError::StoreWrite`])
    /// - an existing snapshot cannot be read ([`CheckpostError::StoreRead`])
    /// - an existing snapshot does not match the schema ([`CheckpostError::SnapshotSchema`])
    pub fn open(data_dir: &Path) -> CheckpostResult<Self> {
        fs::create_dir_all(data_dir).map_err(CheckpostError::StoreWrite)?;

        let snapshot_path = data_dir.join(SNAPSHOT_FILENAME);
        let tables = if snapshot_path.is_file() {
            let raw = fs::read_to_string(&snapshot_path).map_err(CheckpostError::StoreRead)?;
            parse_snapshot(&raw)?
        } else {
            Tables::default()
        };

        tracing::debug!("opened record store at {}", snapshot_path.display());

        Ok(Self {
            tables: Mutex::new(tables),
            snapshot_path: Some(snapshot_path),
        })
    }

    /// Builds the store described by `cfg`.
    pub fn from_config(cfg: &CoreConfig) -> CheckpostResult<Self> {
        match cfg.data_dir() {
            Some(dir) => Self::open(dir),
            None => Ok(Self::in_memory()),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.snapshot_path.is_some()
    }

    /// Runs a read-only query against the live tables.
    pub fn read<T>(&self, query: impl FnOnce(&Tables) -> T) -> CheckpostResult<T> {
        let tables = self.lock()?;
        Ok(query(&tables))
    }

    /// Runs `work` as one atomic unit.
    ///
    /// The closure sees a private copy of the tables. Its changes become visible
    /// to other callers only if it returns `Ok` and, for a file-backed store, the
    /// snapshot write succeeds; otherwise they are discarded.
    ///
    /// Collaborators that take the store lock themselves (the person directory,
    /// the service catalog) must be called before entering a transaction.
    pub fn transaction<T>(
        &self,
        work: impl FnOnce(&mut Tables) -> CheckpostResult<T>,
    ) -> CheckpostResult<T> {
        let mut live = self.lock()?;
        let mut working = live.clone();

        let out = work(&mut working)?;

        if let Some(path) = &self.snapshot_path {
            write_snapshot(path, &working)?;
        }

        *live = working;
        Ok(out)
    }

    fn lock(&self) -> CheckpostResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| CheckpostError::StorePoisoned)
    }
}

fn parse_snapshot(raw: &str) -> CheckpostResult<Tables> {
    let deserializer = serde_yaml::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, Tables>(deserializer).map_err(|err| {
        let path = err.path().to_string();
        let path = if path.is_empty() { "<root>".to_string() } else { path };
        CheckpostError::SnapshotSchema(format!("at {path}: {}", err.into_inner()))
    })
}

fn write_snapshot(path: &Path, tables: &Tables) -> CheckpostResult<()> {
    let yaml = serde_yaml::to_string(tables).map_err(CheckpostError::YamlSerialization)?;
    let tmp = path.with_file_name(SNAPSHOT_TMP_FILENAME);
    fs::write(&tmp, yaml).map_err(CheckpostError::StoreWrite)?;
    fs::rename(&tmp, path).map_err(CheckpostError::StoreWrite)?;
    Ok(())
}
