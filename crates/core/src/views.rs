//! Read-side views over visits and encounters.
//!
//! [`VisitQueryAssembler`] never mutates. Its associated functions take a
//! borrowed [`Tables`] so that a write operation can assemble its response from
//! the same transaction it committed, and its methods take a read lock for
//! standalone queries.
//!
//! Two different "statuses" appear in these views and must not be confused:
//! - `VisitRes::status` is the visit lifecycle (`OPEN` until checked out, then `CLOSED`)
//! - `VisitDetailRes::status` is the status of the one encounter the detail was
//!   built for; `VisitDetailRes::service_summary` aggregates the whole visit
//!   (`PENDING` if any encounter is still pending, else `COMPLETED`)

use crate::error::{CheckpostError, CheckpostResult, EntityKind};
use crate::model::{Encounter, EncounterStatus, Person, PersonId, Visit, VisitId};
use crate::paging::paginate;
use crate::store::{RecordStore, Tables};
use api_shared::{EncounterRes, PageRes, PersonRes, VisitDetailRes, VisitRes};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct VisitQueryAssembler {
    store: Arc<RecordStore>,
}

impl VisitQueryAssembler {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// A visit with every encounter routed under it.
    pub(crate) fn visit_res(tables: &Tables, visit: &Visit) -> VisitRes {
        VisitRes {
            id: visit.id.0,
            uuid: visit.uuid.clone(),
            person_id: visit.person_id.0,
            facility_id: visit.facility_id,
            check_in_date: visit.start.to_string(),
            check_out_date: visit.end.map(|end| end.to_string()),
            archived: visit.archived,
            status: visit.state().as_str().to_string(),
            encounters: sibling_encounters(tables, visit.id),
        }
    }

    /// The detail view of one encounter: its own status plus every sibling
    /// encounter of its visit. `None` if the encounter's visit is missing.
    pub(crate) fn detail_res(tables: &Tables, encounter: &Encounter) -> Option<VisitDetailRes> {
        let visit = tables.visit(encounter.visit_id)?;
        let siblings = tables.encounters_for_visit(visit.id);
        let summary = if siblings.iter().any(|e| e.is_pending()) {
            EncounterStatus::Pending
        } else {
            EncounterStatus::Completed
        };

        Some(VisitDetailRes {
            id: visit.id.0,
            person_id: encounter.person_id.0,
            encounter_id: encounter.id.0,
            service: encounter.service_code.clone(),
            status: encounter.status.as_str().to_string(),
            service_summary: summary.as_str().to_string(),
            check_in_date: visit.start.to_string(),
            check_out_date: visit.end.map(|end| end.to_string()),
            encounters: siblings.into_iter().map(Encounter::to_res).collect(),
        })
    }

    pub fn visit(&self, visit_id: VisitId) -> CheckpostResult<VisitRes> {
        self.store
            .read(|tables| {
                tables
                    .visit(visit_id)
                    .map(|visit| Self::visit_res(tables, visit))
            })?
            .ok_or_else(|| CheckpostError::not_found(EntityKind::Visit, visit_id))
    }

    /// Every non-archived visit in id order.
    pub fn visits(&self) -> CheckpostResult<Vec<VisitRes>> {
        self.store.read(|tables| {
            tables
                .visits()
                .filter(|v| !v.archived)
                .map(|v| Self::visit_res(tables, v))
                .collect()
        })
    }

    /// One detail per non-archived encounter of the person, in creation order.
    ///
    /// An unknown person yields an empty list rather than an error.
    pub fn visit_details_for_person(
        &self,
        person_id: PersonId,
    ) -> CheckpostResult<Vec<VisitDetailRes>> {
        self.store.read(|tables| {
            if tables.person(person_id).is_none() {
                return Vec::new();
            }
            tables
                .encounters_for_person(person_id)
                .into_iter()
                .filter_map(|e| Self::detail_res(tables, e))
                .collect()
        })
    }

    /// Persons with an open, non-archived visit, paged.
    pub fn checked_in_persons(
        &self,
        page: usize,
        page_size: usize,
    ) -> CheckpostResult<PageRes<PersonRes>> {
        let persons = self.store.read(|tables| {
            tables
                .persons()
                .filter(|p| listed_open_visit(tables, p.id).is_some())
                .map(Person::to_res)
                .collect::<Vec<_>>()
        })?;
        paginate(persons, page, page_size)
    }

    /// Persons with an open, non-archived visit that still has a pending
    /// encounter for `service_code`.
    pub fn checked_in_by_service(&self, service_code: &str) -> CheckpostResult<Vec<PersonRes>> {
        let service_code = service_code.trim();
        self.store.read(|tables| {
            tables
                .persons()
                .filter(|p| {
                    listed_open_visit(tables, p.id).is_some_and(|visit| {
                        tables
                            .encounters_for_visit(visit.id)
                            .iter()
                            .any(|e| e.is_pending() && e.service_code == service_code)
                    })
                })
                .map(Person::to_res)
                .collect()
        })
    }
}

/// The person's open visit unless it is archived. An archived open visit still
/// blocks a new check-in but is kept out of listings.
fn listed_open_visit(tables: &Tables, person_id: PersonId) -> Option<&Visit> {
    tables.open_visit_for(person_id).filter(|v| !v.archived)
}

fn sibling_encounters(tables: &Tables, visit_id: VisitId) -> Vec<EncounterRes> {
    tables
        .encounters_for_visit(visit_id)
        .into_iter()
        .map(Encounter::to_res)
        .collect()
}
