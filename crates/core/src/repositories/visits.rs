//! Visit lifecycle.
//!
//! A visit is one clinical episode of one person:
//!
//! ```text
//!   check-in ──► OPEN (end unset) ──check-out──► CLOSED (end set)
//! ```
//!
//! `archived` is a separate flag: archiving hides a visit from listings, and any
//! update clears it again. There is no way back from `CLOSED` to `OPEN` through
//! the lifecycle operations.
//!
//! ## Invariants
//!
//! - A person has at most one open visit. The check and the insert run inside
//!   one store transaction, and the store's visit insert rejects a second open
//!   visit on its own, so concurrent check-ins for the same person cannot both
//!   succeed.
//! - Check-in is atomic: the visit and all of its encounters commit together or
//!   not at all.
//! - Every encounter references the same person as its visit.
//!
//! Person and service lookups go through the injected [`PersonDirectory`] and
//! [`ServiceCatalog`] *before* a transaction starts; both take the store lock.

use crate::error::{CheckpostError, CheckpostResult, EntityKind};
use crate::model::{Person, PersonId, Service, ServiceId, VisitId};
use crate::repositories::encounters::EncounterTracker;
use crate::repositories::persons::PersonDirectory;
use crate::repositories::services::ServiceCatalog;
use crate::store::{NewVisit, RecordStore};
use crate::views::VisitQueryAssembler;
use api_shared::{CheckInReq, CreateVisitReq, UpdateVisitReq, VisitRes};
use checkpost_types::CheckpointTime;
use std::sync::Arc;

/// Orchestrates visit creation, check-in fan-out, check-out and archival.
#[derive(Clone)]
pub struct VisitLifecycleManager {
    store: Arc<RecordStore>,
    persons: Arc<dyn PersonDirectory>,
    services: Arc<dyn ServiceCatalog>,
    queries: VisitQueryAssembler,
}

impl VisitLifecycleManager {
    pub fn new(
        store: Arc<RecordStore>,
        persons: Arc<dyn PersonDirectory>,
        services: Arc<dyn ServiceCatalog>,
    ) -> Self {
        Self {
            queries: VisitQueryAssembler::new(store.clone()),
            store,
            persons,
            services,
        }
    }

    /// Opens a visit for a person and routes it to each requested service.
    ///
    /// One `PENDING` encounter is opened per entry of `service_ids`, in order
    /// (a repeated id yields a repeated encounter). The check-in time is parsed
    /// from `yyyy-MM-dd HH:mm`; when absent or blank the current time is used.
    ///
    /// # Errors
    ///
    /// Returns `CheckpostError` if:
    /// - the person does not exist ([`CheckpostError::NotFound`])
    /// - the person already has an open visit ([`CheckpostError::Conflict`])
    /// - any service id does not exist ([`CheckpostError::NotFound`], naming the id)
    /// - the check-in time is malformed ([`CheckpostError::InvalidTimestamp`])
    ///
    /// The checks run in that order. Nothing is written when any of these occur.
    pub fn create_visit(&self, req: &CreateVisitReq) -> CheckpostResult<VisitRes> {
        let person = self.persons.find_by_id(PersonId(req.person_id))?;
        self.open_visit(&person, &req.service_ids, req.check_in_date.as_deref())
    }

    /// Check-in: opens the visit and routes it to the services of both the visit
    /// request and the check-in request.
    ///
    /// The visit's own service list is routed exactly as given, repeats
    /// included. An extra service id is added only when the visit list does not
    /// already name it, and fan-out happens in a single pass.
    pub fn check_in(&self, req: &CheckInReq) -> CheckpostResult<VisitRes> {
        let person = self.persons.find_by_id(PersonId(req.visit.person_id))?;

        let mut service_ids = req.visit.service_ids.clone();
        for id in &req.service_ids {
            if !service_ids.contains(id) {
                service_ids.push(*id);
            }
        }

        self.open_visit(&person, &service_ids, req.visit.check_in_date.as_deref())
    }

    fn open_visit(
        &self,
        person: &Person,
        service_ids: &[i64],
        check_in_date: Option<&str>,
    ) -> CheckpostResult<VisitRes> {
        // An open visit outranks an unknown service; checked again under the lock.
        if let Some(open) = self.store.read(|t| t.open_visit_for(person.id).map(|v| v.id))? {
            return Err(reject_check_in(person.id, open));
        }

        let services = self.resolve_services(service_ids)?;
        let start = match check_in_date.map(str::trim).filter(|d| !d.is_empty()) {
            Some(raw) => CheckpointTime::parse(raw)?,
            None => CheckpointTime::now(),
        };

        let res = self.store.transaction(|tables| {
            if let Some(open) = tables.open_visit_for(person.id) {
                return Err(reject_check_in(person.id, open.id));
            }

            let visit = tables.insert_visit(NewVisit {
                person_id: person.id,
                facility_id: person.facility_id,
                start,
            })?;

            for service in &services {
                EncounterTracker::open_encounter(tables, person, &visit, service.code.as_str());
            }

            Ok(VisitQueryAssembler::visit_res(tables, &visit))
        })?;

        tracing::info!(
            "opened visit {} for person {} with {} encounter(s)",
            res.id,
            person.id,
            res.encounters.len()
        );
        Ok(res)
    }

    fn resolve_services(&self, service_ids: &[i64]) -> CheckpostResult<Vec<Service>> {
        service_ids
            .iter()
            .map(|id| self.services.find_by_id(ServiceId(*id)))
            .collect()
    }

    /// Closes a visit: every `PENDING` encounter becomes `COMPLETED` and the end
    /// time is set.
    ///
    /// The end time is the current time, but never earlier than the start. Checking
    /// out a visit that is already closed keeps its original end time and only
    /// sweeps encounters that are still pending.
    ///
    /// # Arguments
    ///
    /// * `visit_id` - The visit to close.
    ///
    /// # Errors
    ///
    /// Returns `CheckpostError::NotFound` if no visit has this id.
    pub fn check_out(&self, visit_id: VisitId) -> CheckpostResult<()> {
        let completed = self.store.transaction(|tables| {
            let mut visit = tables
                .visit(visit_id)
                .cloned()
                .ok_or_else(|| CheckpostError::not_found(EntityKind::Visit, visit_id))?;

            let completed = EncounterTracker::complete_all_pending(tables, visit.id);

            if visit.end.is_none() {
                visit.end = Some(CheckpointTime::now().max(visit.start));
                tables.replace_visit(visit)?;
            }
            Ok(completed)
        })?;

        tracing::info!(
            "checked out visit {} ({} encounter(s) completed)",
            visit_id,
            completed
        );
        Ok(())
    }

    /// Overwrites the mutable fields of a visit and clears its archived flag.
    ///
    /// - `personId` moves the visit, and its encounters, to another person and
    ///   copies that person's facility
    /// - `checkInDate` / `checkOutDate` replace the start and end times
    ///
    /// # Errors
    ///
    /// Returns `CheckpostError` if:
    /// - the visit or the new person does not exist ([`CheckpostError::NotFound`])
    /// - a date is malformed ([`CheckpostError::InvalidTimestamp`])
    /// - the end would precede the start ([`CheckpostError::InvalidInput`])
    /// - the change would give a person two open visits ([`CheckpostError::Conflict`])
    pub fn update_visit(&self, visit_id: VisitId, req: &UpdateVisitReq) -> CheckpostResult<VisitRes> {
        let new_person = req
            .person_id
            .map(|id| self.persons.find_by_id(PersonId(id)))
            .transpose()?;
        let start = parse_optional(req.check_in_date.as_deref())?;
        let end = parse_optional(req.check_out_date.as_deref())?;

        let res = self.store.transaction(|tables| {
            let mut visit = tables
                .visit(visit_id)
                .cloned()
                .ok_or_else(|| CheckpostError::not_found(EntityKind::Visit, visit_id))?;

            if let Some(person) = &new_person {
                visit.person_id = person.id;
                visit.facility_id = person.facility_id;
                for encounter in tables.encounters_for_visit_mut(visit.id) {
                    encounter.person_id = person.id;
                }
            }
            if let Some(start) = start {
                visit.start = start;
            }
            if let Some(end) = end {
                visit.end = Some(end);
            }
            if visit.end.is_some_and(|end| end < visit.start) {
                return Err(CheckpostError::InvalidInput(
                    "check-out date cannot precede check-in date".into(),
                ));
            }
            visit.archived = false;

            tables.replace_visit(visit.clone())?;
            Ok(VisitQueryAssembler::visit_res(tables, &visit))
        })?;

        tracing::info!("updated visit {}", visit_id);
        Ok(res)
    }

    /// Hides a visit from listings. Archiving twice is harmless.
    pub fn archive_visit(&self, visit_id: VisitId) -> CheckpostResult<()> {
        self.store.transaction(|tables| {
            let mut visit = tables
                .visit(visit_id)
                .cloned()
                .ok_or_else(|| CheckpostError::not_found(EntityKind::Visit, visit_id))?;
            visit.archived = true;
            tables.replace_visit(visit)
        })?;

        tracing::info!("archived visit {}", visit_id);
        Ok(())
    }

    /// A visit with its encounters, archived or not.
    pub fn get_visit(&self, visit_id: VisitId) -> CheckpostResult<VisitRes> {
        self.queries.visit(visit_id)
    }

    /// Every non-archived visit with its encounters.
    pub fn list_visits(&self) -> CheckpostResult<Vec<VisitRes>> {
        self.queries.visits()
    }
}

fn reject_check_in(person_id: PersonId, open: VisitId) -> CheckpostError {
    tracing::warn!(
        "rejected check-in for person {}: visit {} is still open",
        person_id,
        open
    );
    CheckpostError::Conflict {
        person_id: person_id.0,
    }
}

fn parse_optional(raw: Option<&str>) -> CheckpostResult<Option<CheckpointTime>> {
    raw.map(str::trim)
        .filter(|d| !d.is_empty())
        .map(CheckpointTime::parse)
        .transpose()
        .map_err(CheckpostError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EncounterStatus;
    use crate::CheckpostService;
    use api_shared::CreatePersonReq;

    struct Fixture {
        svc: CheckpostService,
        person: i64,
        services: Vec<i64>,
    }

    fn fixture() -> Fixture {
        let svc = CheckpostService::in_memory();
        let person = svc
            .persons()
            .register(CreatePersonReq {
                facility_id: 3,
                first_name: "Ada".into(),
                surname: "Obi".into(),
                ..Default::default()
            })
            .expect("register should succeed");
        let services = ["OPD", "LAB", "PHARMACY"]
            .iter()
            .map(|code| svc.catalog().register(code, code).unwrap().id.0)
            .collect();
        Fixture {
            svc,
            person: person.id.0,
            services,
        }
    }

    fn visit_req(person: i64, services: &[i64]) -> CreateVisitReq {
        CreateVisitReq {
            person_id: person,
            service_ids: services.to_vec(),
            check_in_date: None,
        }
    }

    fn visit_count(svc: &CheckpostService) -> usize {
        svc.store().read(|t| t.visits().count()).unwrap()
    }

    #[test]
    fn test_create_visit_opens_one_pending_encounter_per_service() {
        let f = fixture();
        let visits = f.svc.visits();

        let res = visits
            .create_visit(&visit_req(f.person, &f.services))
            .expect("create should succeed");

        assert_eq!(res.status, "OPEN");
        assert_eq!(res.check_out_date, None);
        assert_eq!(res.facility_id, 3, "facility copied from person");
        let codes: Vec<&str> = res.encounters.iter().map(|e| e.service_code.as_str()).collect();
        assert_eq!(codes, vec!["OPD", "LAB", "PHARMACY"]);
        for encounter in &res.encounters {
            assert_eq!(encounter.status, "PENDING");
            assert_eq!(encounter.person_id, f.person);
            assert_eq!(encounter.visit_id, res.id);
            assert_eq!(encounter.encounter_date, res.check_in_date);
        }
    }

    #[test]
    fn test_create_visit_uses_supplied_check_in_date() {
        let f = fixture();
        let mut req = visit_req(f.person, &f.services[..1]);
        req.check_in_date = Some("2024-03-01 09:30".into());

        let res = f.svc.visits().create_visit(&req).unwrap();
        assert_eq!(res.check_in_date, "2024-03-01 09:30");
    }

    #[test]
    fn test_create_visit_rejects_malformed_date() {
        let f = fixture();
        let mut req = visit_req(f.person, &f.services);
        req.check_in_date = Some("01/03/2024".into());

        let err = f.svc.visits().create_visit(&req).expect_err("should fail");
        assert!(matches!(err, CheckpostError::InvalidTimestamp(_)));
        assert_eq!(visit_count(&f.svc), 0);
    }

    #[test]
    fn test_second_open_visit_conflicts() {
        let f = fixture();
        let visits = f.svc.visits();
        visits.create_visit(&visit_req(f.person, &f.services[..1])).unwrap();

        let err = visits
            .create_visit(&visit_req(f.person, &f.services[1..]))
            .expect_err("second visit should conflict");
        assert!(matches!(err, CheckpostError::Conflict { person_id } if person_id == f.person));
        assert_eq!(visit_count(&f.svc), 1);
    }

    #[test]
    fn test_unknown_person_is_not_found() {
        let f = fixture();
        let err = f
            .svc
            .visits()
            .create_visit(&visit_req(999, &f.services))
            .expect_err("should fail");
        assert!(matches!(
            err,
            CheckpostError::NotFound {
                entity: EntityKind::Person,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_service_writes_nothing() {
        let f = fixture();
        let err = f
            .svc
            .visits()
            .create_visit(&visit_req(f.person, &[f.services[0], 77]))
            .expect_err("should fail");

        assert_eq!(err.to_string(), "no service found with id 77");
        assert_eq!(visit_count(&f.svc), 0);
        let encounters = f
            .svc
            .encounters()
            .encounters_for_person(PersonId(f.person))
            .unwrap();
        assert!(encounters.is_empty(), "no partial fan-out");
    }

    #[test]
    fn test_open_visit_conflict_wins_over_unknown_service() {
        let f = fixture();
        let visits = f.svc.visits();
        visits.create_visit(&visit_req(f.person, &f.services[..1])).unwrap();

        let err = visits
            .create_visit(&visit_req(f.person, &[999]))
            .expect_err("second visit should conflict");
        assert!(matches!(err, CheckpostError::Conflict { person_id } if person_id == f.person));
    }

    #[test]
    fn test_check_in_keeps_repeats_within_the_visit_list() {
        let f = fixture();
        let opd = f.services[0];
        let req = CheckInReq {
            visit: visit_req(f.person, &[opd, opd]),
            service_ids: vec![],
        };

        let res = f.svc.visits().check_in(&req).expect("check-in should succeed");
        let codes: Vec<&str> = res.encounters.iter().map(|e| e.service_code.as_str()).collect();
        assert_eq!(codes, vec!["OPD", "OPD"], "same as create_visit with the same list");
    }

    #[test]
    fn test_check_in_routes_each_service_once() {
        let f = fixture();
        let req = CheckInReq {
            visit: visit_req(f.person, &[f.services[0], f.services[1]]),
            service_ids: vec![f.services[1], f.services[2]],
        };

        let res = f.svc.visits().check_in(&req).expect("check-in should succeed");
        let codes: Vec<&str> = res.encounters.iter().map(|e| e.service_code.as_str()).collect();
        assert_eq!(codes, vec!["OPD", "LAB", "PHARMACY"]);
    }

    #[test]
    fn test_check_out_completes_encounters_and_closes_visit() {
        let f = fixture();
        let visits = f.svc.visits();
        let opened = visits
            .create_visit(&visit_req(f.person, &f.services[..2]))
            .unwrap();

        visits.check_out(VisitId(opened.id)).expect("check-out should succeed");

        let closed = visits.get_visit(VisitId(opened.id)).unwrap();
        assert_eq!(closed.status, "CLOSED");
        let end = closed.check_out_date.clone().expect("end should be set");
        assert!(
            CheckpointTime::parse(&end).unwrap()
                >= CheckpointTime::parse(&closed.check_in_date).unwrap()
        );
        assert!(closed.encounters.iter().all(|e| e.status == "COMPLETED"));
    }

    #[test]
    fn test_check_out_is_idempotent() {
        let f = fixture();
        let visits = f.svc.visits();
        let opened = visits.create_visit(&visit_req(f.person, &f.services)).unwrap();

        visits.check_out(VisitId(opened.id)).unwrap();
        let first = visits.get_visit(VisitId(opened.id)).unwrap();
        visits.check_out(VisitId(opened.id)).unwrap();
        let second = visits.get_visit(VisitId(opened.id)).unwrap();

        assert_eq!(first, second);
        assert!(second.encounters.iter().all(|e| e.status == "COMPLETED"));
    }

    #[test]
    fn test_check_out_never_ends_before_start() {
        let f = fixture();
        let visits = f.svc.visits();
        let mut req = visit_req(f.person, &f.services[..1]);
        req.check_in_date = Some("2999-01-01 08:00".into());
        let opened = visits.create_visit(&req).unwrap();

        visits.check_out(VisitId(opened.id)).unwrap();

        let closed = visits.get_visit(VisitId(opened.id)).unwrap();
        assert_eq!(closed.check_out_date.as_deref(), Some("2999-01-01 08:00"));
    }

    #[test]
    fn test_check_out_missing_visit_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.svc.visits().check_out(VisitId(5)),
            Err(CheckpostError::NotFound {
                entity: EntityKind::Visit,
                ..
            })
        ));
    }

    #[test]
    fn test_check_out_leaves_completed_encounters_alone() {
        let f = fixture();
        let visits = f.svc.visits();
        let opened = visits.create_visit(&visit_req(f.person, &f.services)).unwrap();
        let first = opened.encounters[0].id;
        f.svc
            .encounters()
            .complete_encounter(crate::model::EncounterId(first))
            .unwrap();

        visits.check_out(VisitId(opened.id)).unwrap();

        let encounters = f
            .svc
            .encounters()
            .encounters_for_visit(VisitId(opened.id))
            .unwrap();
        assert!(encounters
            .iter()
            .all(|e| e.status == EncounterStatus::Completed));
    }

    #[test]
    fn test_archive_hides_from_list_but_not_get() {
        let f = fixture();
        let visits = f.svc.visits();
        let opened = visits.create_visit(&visit_req(f.person, &f.services)).unwrap();

        visits.archive_visit(VisitId(opened.id)).unwrap();
        visits.archive_visit(VisitId(opened.id)).expect("archive is idempotent");

        assert!(visits.list_visits().unwrap().is_empty());
        let fetched = visits.get_visit(VisitId(opened.id)).unwrap();
        assert!(fetched.archived);
    }

    #[test]
    fn test_update_unarchives_visit() {
        let f = fixture();
        let visits = f.svc.visits();
        let opened = visits.create_visit(&visit_req(f.person, &f.services)).unwrap();
        visits.archive_visit(VisitId(opened.id)).unwrap();

        let updated = visits
            .update_visit(VisitId(opened.id), &UpdateVisitReq::default())
            .expect("update should succeed");

        assert!(!updated.archived);
        let listed: Vec<i64> = visits.list_visits().unwrap().iter().map(|v| v.id).collect();
        assert_eq!(listed, vec![opened.id]);
    }

    #[test]
    fn test_update_rejects_end_before_start() {
        let f = fixture();
        let visits = f.svc.visits();
        let mut req = visit_req(f.person, &f.services);
        req.check_in_date = Some("2024-03-01 09:30".into());
        let opened = visits.create_visit(&req).unwrap();

        let err = visits
            .update_visit(
                VisitId(opened.id),
                &UpdateVisitReq {
                    check_out_date: Some("2024-03-01 09:00".into()),
                    ..Default::default()
                },
            )
            .expect_err("should fail");
        assert!(matches!(err, CheckpostError::InvalidInput(_)));
    }

    #[test]
    fn test_update_moves_encounters_with_person() {
        let f = fixture();
        let other = f
            .svc
            .persons()
            .register(CreatePersonReq {
                facility_id: 9,
                first_name: "Bola".into(),
                surname: "Ade".into(),
                ..Default::default()
            })
            .unwrap();
        let visits = f.svc.visits();
        let opened = visits.create_visit(&visit_req(f.person, &f.services)).unwrap();

        let updated = visits
            .update_visit(
                VisitId(opened.id),
                &UpdateVisitReq {
                    person_id: Some(other.id.0),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.person_id, other.id.0);
        assert_eq!(updated.facility_id, 9);
        assert!(updated.encounters.iter().all(|e| e.person_id == other.id.0));
    }

    #[test]
    fn test_update_cannot_give_person_two_open_visits() {
        let f = fixture();
        let other = f
            .svc
            .persons()
            .register(CreatePersonReq {
                facility_id: 3,
                first_name: "Bola".into(),
                surname: "Ade".into(),
                ..Default::default()
            })
            .unwrap();
        let visits = f.svc.visits();
        let mine = visits.create_visit(&visit_req(f.person, &f.services)).unwrap();
        visits.create_visit(&visit_req(other.id.0, &f.services)).unwrap();

        let err = visits
            .update_visit(
                VisitId(mine.id),
                &UpdateVisitReq {
                    person_id: Some(other.id.0),
                    ..Default::default()
                },
            )
            .expect_err("should conflict");
        assert!(matches!(err, CheckpostError::Conflict { .. }));
    }

    #[test]
    fn test_full_visit_cycle_for_one_person() {
        let f = fixture();
        let visits = f.svc.visits();

        let first = visits
            .create_visit(&visit_req(f.person, &f.services[..2]))
            .unwrap();
        assert_eq!(first.encounters.len(), 2);
        assert!(first.encounters.iter().all(|e| e.status == "PENDING"));

        visits.check_out(VisitId(first.id)).unwrap();
        let closed = visits.get_visit(VisitId(first.id)).unwrap();
        assert!(closed.check_out_date.is_some());
        assert!(closed.encounters.iter().all(|e| e.status == "COMPLETED"));

        let second = visits
            .create_visit(&visit_req(f.person, &f.services[2..]))
            .expect("a closed visit does not block a new one");
        assert_eq!(second.encounters.len(), 1);
        assert_eq!(second.encounters[0].status, "PENDING");
        assert_eq!(second.encounters[0].service_code, "PHARMACY");
    }

    #[test]
    fn test_concurrent_check_ins_open_exactly_one_visit() {
        let f = fixture();
        let visits = f.svc.visits();
        let req = visit_req(f.person, &f.services);

        let results: Vec<CheckpostResult<VisitRes>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| visits.create_visit(&req)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("thread should not panic"))
                .collect()
        });

        let ok = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(CheckpostError::Conflict { .. })))
            .count();
        assert_eq!(ok, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(visit_count(&f.svc), 1);
    }
}
