//! Encounter tracking.
//!
//! An encounter is one routing of a person, within a visit, to one service.
//! Encounters start `PENDING` and only ever advance to `COMPLETED`, either one
//! at a time ([`EncounterTracker::complete_encounter`]) or all at once when the
//! visit is checked out. They are never deleted.
//!
//! The fan-out and sweep operations take the transaction's [`Tables`] directly
//! so that they commit, or roll back, together with the visit write that drives
//! them.

use crate::error::{CheckpostError, CheckpostResult, EntityKind};
use crate::model::{Encounter, EncounterId, Person, PersonId, Visit, VisitId};
use crate::store::{NewEncounter, RecordStore, Tables};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct EncounterTracker {
    store: Arc<RecordStore>,
}

impl EncounterTracker {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Opens a `PENDING` encounter for `service_code` under `visit`.
    ///
    /// The encounter takes the visit's start time as its date and the visit's
    /// facility. There is no duplicate check: the same code twice yields two
    /// encounters.
    pub(crate) fn open_encounter(
        tables: &mut Tables,
        person: &Person,
        visit: &Visit,
        service_code: &str,
    ) -> Encounter {
        let encounter = tables.insert_encounter(NewEncounter {
            person_id: person.id,
            visit_id: visit.id,
            facility_id: visit.facility_id,
            service_code: service_code.to_string(),
            encounter_date: visit.start,
        });
        tracing::info!(
            "opened encounter {} ({}) for visit {}",
            encounter.id,
            encounter.service_code,
            visit.id
        );
        encounter
    }

    /// Advances every `PENDING` encounter of the visit to `COMPLETED`.
    ///
    /// Encounters in any other status are left untouched. Returns how many changed.
    pub(crate) fn complete_all_pending(tables: &mut Tables, visit_id: VisitId) -> usize {
        tables
            .encounters_for_visit_mut(visit_id)
            .map(|encounter| encounter.complete())
            .filter(|changed| *changed)
            .count()
    }

    /// Completes a single encounter. Completing an already completed encounter is a no-op.
    pub fn complete_encounter(&self, id: EncounterId) -> CheckpostResult<Encounter> {
        self.store.transaction(|tables| {
            let encounter = tables
                .encounter_mut(id)
                .ok_or_else(|| CheckpostError::not_found(EntityKind::Encounter, id))?;
            if encounter.complete() {
                tracing::info!("completed encounter {}", id);
            }
            Ok(encounter.clone())
        })
    }

    pub fn encounters_for_visit(&self, visit_id: VisitId) -> CheckpostResult<Vec<Encounter>> {
        self.store.read(|tables| {
            tables
                .encounters_for_visit(visit_id)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// Non-archived encounters of a person, in creation order.
    pub fn encounters_for_person(&self, person_id: PersonId) -> CheckpostResult<Vec<Encounter>> {
        self.store.read(|tables| {
            tables
                .encounters_for_person(person_id)
                .into_iter()
                .cloned()
                .collect()
        })
    }
}
