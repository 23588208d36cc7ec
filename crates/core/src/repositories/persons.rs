//! Person directory.
//!
//! Owns identity records. Visits only ever need [`PersonDirectory::find_by_id`]
//! and [`PersonDirectory::find_by_nin`]; everything else here (registration,
//! paged search, duplicate hospital-number reporting) serves the surrounding
//! patient workflows.
//!
//! National-id numbers and hospital numbers are meant to be unique per facility,
//! but nothing rejects a duplicate on write. Duplicates are surfaced after the
//! fact by [`StorePersonDirectory::duplicate_hospital_numbers`] and the `*_exists`
//! checks that a registration form calls before submitting.

use crate::constants::{DATE_OF_BIRTH_FORMAT, MATCH_ALL};
use crate::error::{CheckpostError, CheckpostResult, EntityKind};
use crate::model::{Person, PersonId};
use crate::paging::paginate;
use crate::store::RecordStore;
use api_shared::{CreatePersonReq, PageRes, PersonRes};
use checkpost_types::NonEmptyText;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;

/// Lookups the visit lifecycle depends on.
pub trait PersonDirectory: Send + Sync {
    fn find_by_id(&self, id: PersonId) -> CheckpostResult<Person>;

    /// Finds a person by national-id number. With duplicates, the earliest registered wins.
    fn find_by_nin(&self, nin: &str) -> CheckpostResult<Person>;
}

/// [`PersonDirectory`] backed by the record store.
#[derive(Clone, Debug)]
pub struct StorePersonDirectory {
    store: Arc<RecordStore>,
}

impl StorePersonDirectory {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Registers a new person.
    ///
    /// # Arguments
    ///
    /// * `req` - Identity fields; blank optional fields are stored as absent
    ///
    /// # Returns
    ///
    /// The stored [`Person`] with its newly assigned id.
    ///
    /// # Errors
    ///
    /// Returns `CheckpostError` if:
    /// - first name or surname is blank ([`CheckpostError::Text`])
    /// - the date of birth is not `yyyy-MM-dd` ([`CheckpostError::InvalidInput`])
    pub fn register(&self, req: CreatePersonReq) -> CheckpostResult<Person> {
        let fields = PersonFields::parse(req)?;

        let person = self
            .store
            .transaction(|tables| Ok(tables.insert_person_with(|id| fields.into_person(id, false))))?;

        tracing::info!("registered person {}", person.id);
        Ok(person)
    }

    /// Overwrites every identity field of an existing person.
    ///
    /// The archived flag is left as it is. Validation is the same as for
    /// [`register`](Self::register).
    pub fn update(&self, id: PersonId, req: CreatePersonReq) -> CheckpostResult<Person> {
        let fields = PersonFields::parse(req)?;

        let person = self.store.transaction(|tables| {
            let person = tables
                .person_mut(id)
                .ok_or_else(|| CheckpostError::not_found(EntityKind::Person, id))?;
            *person = fields.into_person(id, person.archived);
            Ok(person.clone())
        })?;

        tracing::info!("updated person {}", id);
        Ok(person)
    }

    /// Logical delete: the person drops out of search and duplicate reports but
    /// stays retrievable by id. Archiving twice is harmless.
    pub fn archive(&self, id: PersonId) -> CheckpostResult<()> {
        self.store.transaction(|tables| {
            let person = tables
                .person_mut(id)
                .ok_or_else(|| CheckpostError::not_found(EntityKind::Person, id))?;
            person.archived = true;
            Ok(())
        })?;

        tracing::info!("archived person {}", id);
        Ok(())
    }

    /// Free-text search over non-archived persons, one page at a time.
    ///
    /// `None`, a blank string or `*` match everyone. Otherwise the query is a
    /// case-insensitive substring of a name, the hospital number or the NIN.
    pub fn search(
        &self,
        query: Option<&str>,
        page: usize,
        page_size: usize,
    ) -> CheckpostResult<PageRes<PersonRes>> {
        let needle = query
            .map(str::trim)
            .filter(|q| !q.is_empty() && *q != MATCH_ALL)
            .map(str::to_lowercase);

        let matches = self.store.read(|tables| {
            tables
                .persons()
                .filter(|p| !p.archived)
                .filter(|p| needle.as_deref().map_or(true, |n| matches_query(p, n)))
                .map(Person::to_res)
                .collect::<Vec<_>>()
        })?;

        paginate(matches, page, page_size)
    }

    /// Finds a person by hospital number. With duplicates, the earliest registered wins.
    pub fn find_by_hospital_number(&self, hospital_number: &str) -> CheckpostResult<Person> {
        let hospital_number = hospital_number.trim();
        self.store
            .read(|tables| {
                tables
                    .persons()
                    .find(|p| p.hospital_number.as_deref() == Some(hospital_number))
                    .cloned()
            })?
            .ok_or_else(|| CheckpostError::not_found(EntityKind::Person, hospital_number))
    }

    pub fn nin_exists(&self, nin: &str) -> CheckpostResult<bool> {
        let nin = nin.trim();
        self.store
            .read(|tables| tables.persons().any(|p| p.nin.as_deref() == Some(nin)))
    }

    pub fn hospital_number_exists(&self, hospital_number: &str) -> CheckpostResult<bool> {
        let hospital_number = hospital_number.trim();
        self.store.read(|tables| {
            tables
                .persons()
                .any(|p| p.hospital_number.as_deref() == Some(hospital_number))
        })
    }

    /// Non-archived persons whose hospital number is shared with at least one
    /// other non-archived person, ordered by hospital number and then id.
    ///
    /// # Arguments
    ///
    /// * `page` - Zero-based page number
    /// * `page_size` - Records per page, must be greater than zero
    ///
    /// # Returns
    ///
    /// One page of the report in the shared paging envelope.
    pub fn duplicate_hospital_numbers(
        &self,
        page: usize,
        page_size: usize,
    ) -> CheckpostResult<PageRes<PersonRes>> {
        let duplicates = self.store.read(|tables| {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for number in tables
                .persons()
                .filter(|p| !p.archived)
                .filter_map(|p| p.hospital_number.as_deref())
            {
                *counts.entry(number).or_default() += 1;
            }

            let mut duplicates: Vec<&Person> = tables
                .persons()
                .filter(|p| !p.archived)
                .filter(|p| {
                    p.hospital_number
                        .as_deref()
                        .is_some_and(|n| counts.get(n).copied().unwrap_or(0) > 1)
                })
                .collect();
            duplicates.sort_by(|a, b| {
                a.hospital_number
                    .cmp(&b.hospital_number)
                    .then(a.id.cmp(&b.id))
            });
            duplicates.into_iter().map(Person::to_res).collect::<Vec<_>>()
        })?;

        paginate(duplicates, page, page_size)
    }
}

/// Validated identity fields shared by registration and update.
struct PersonFields {
    facility_id: i64,
    first_name: NonEmptyText,
    other_name: Option<String>,
    surname: NonEmptyText,
    sex: Option<String>,
    date_of_birth: Option<NaiveDate>,
    nin: Option<String>,
    hospital_number: Option<String>,
}

impl PersonFields {
    fn parse(req: CreatePersonReq) -> CheckpostResult<Self> {
        let date_of_birth = req
            .date_of_birth
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| {
                NaiveDate::parse_from_str(d, DATE_OF_BIRTH_FORMAT).map_err(|_| {
                    CheckpostError::InvalidInput(format!(
                        "date of birth '{d}' must be formatted yyyy-MM-dd"
                    ))
                })
            })
            .transpose()?;

        Ok(Self {
            facility_id: req.facility_id,
            first_name: NonEmptyText::new(&req.first_name)?,
            other_name: non_blank(req.other_name),
            surname: NonEmptyText::new(&req.surname)?,
            sex: non_blank(req.sex),
            date_of_birth,
            nin: non_blank(req.nin),
            hospital_number: non_blank(req.hospital_number),
        })
    }

    fn into_person(self, id: PersonId, archived: bool) -> Person {
        Person {
            id,
            facility_id: self.facility_id,
            first_name: self.first_name,
            other_name: self.other_name,
            surname: self.surname,
            sex: self.sex,
            date_of_birth: self.date_of_birth,
            nin: self.nin,
            hospital_number: self.hospital_number,
            archived,
        }
    }
}

impl PersonDirectory for StorePersonDirectory {
    fn find_by_id(&self, id: PersonId) -> CheckpostResult<Person> {
        tracing::debug!("looking up person {}", id);
        self.store
            .read(|tables| tables.person(id).cloned())?
            .ok_or_else(|| CheckpostError::not_found(EntityKind::Person, id))
    }

    fn find_by_nin(&self, nin: &str) -> CheckpostResult<Person> {
        let nin = nin.trim();
        self.store
            .read(|tables| {
                tables
                    .persons()
                    .find(|p| p.nin.as_deref() == Some(nin))
                    .cloned()
            })?
            .ok_or_else(|| CheckpostError::not_found(EntityKind::Person, nin))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn matches_query(person: &Person, needle: &str) -> bool {
    let fields = [
        Some(person.first_name.as_str()),
        person.other_name.as_deref(),
        Some(person.surname.as_str()),
        person.hospital_number.as_deref(),
        person.nin.as_deref(),
    ];
    fields
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_req(first: &str, surname: &str) -> CreatePersonReq {
        CreatePersonReq {
            facility_id: 1,
            first_name: first.into(),
            surname: surname.into(),
            ..Default::default()
        }
    }

    fn directory() -> StorePersonDirectory {
        StorePersonDirectory::new(Arc::new(RecordStore::in_memory()))
    }

    #[test]
    fn test_register_and_find_by_id() {
        let dir = directory();
        let mut req = person_req(" Ada ", "Obi");
        req.date_of_birth = Some("1990-01-15".into());
        req.nin = Some("  ".into());

        let person = dir.register(req).expect("register should succeed");
        assert_eq!(person.first_name.as_str(), "Ada");
        assert_eq!(person.nin, None, "blank NIN should be dropped");
        assert_eq!(
            person.date_of_birth,
            NaiveDate::from_ymd_opt(1990, 1, 15)
        );

        let found = dir.find_by_id(person.id).expect("find should succeed");
        assert_eq!(found, person);
    }

    #[test]
    fn test_register_rejects_blank_names_and_bad_dates() {
        let dir = directory();
        assert!(matches!(
            dir.register(person_req("", "Obi")),
            Err(CheckpostError::Text(_))
        ));

        let mut req = person_req("Ada", "Obi");
        req.date_of_birth = Some("15/01/1990".into());
        assert!(matches!(
            dir.register(req),
            Err(CheckpostError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_find_by_id_missing_is_not_found() {
        let err = directory()
            .find_by_id(PersonId(99))
            .expect_err("lookup should fail");
        assert!(matches!(
            err,
            CheckpostError::NotFound {
                entity: EntityKind::Person,
                ..
            }
        ));
    }

    #[test]
    fn test_find_by_nin_returns_earliest_registration() {
        let dir = directory();
        let mut first = person_req("Ada", "Obi");
        first.nin = Some("NIN-1".into());
        let mut second = person_req("Bola", "Obi");
        second.nin = Some("NIN-1".into());
        let first = dir.register(first).unwrap();
        dir.register(second).unwrap();

        let found = dir.find_by_nin(" NIN-1 ").expect("find should succeed");
        assert_eq!(found.id, first.id);
        assert!(dir.nin_exists("NIN-1").unwrap());
        assert!(!dir.nin_exists("NIN-2").unwrap());
        assert!(dir.find_by_nin("NIN-2").is_err());
    }

    #[test]
    fn test_search_pages_all_persons() {
        let dir = directory();
        for i in 0..25 {
            dir.register(person_req(&format!("Person{i}"), "Test")).unwrap();
        }

        let page0 = dir.search(Some("*"), 0, 10).unwrap();
        let page1 = dir.search(None, 1, 10).unwrap();
        let page2 = dir.search(Some(""), 2, 10).unwrap();

        assert_eq!(page0.records.len(), 10);
        assert_eq!(page1.records.len(), 10);
        assert_eq!(page2.records.len(), 5);
        assert_eq!(page2.total_pages, 3);
        assert_eq!(page2.total_records, 25);
        assert_eq!(page0.records[0].first_name, "Person0");
    }

    #[test]
    fn test_search_matches_names_and_numbers_case_insensitively() {
        let dir = directory();
        let mut ada = person_req("Ada", "Obi");
        ada.hospital_number = Some("HN-100".into());
        dir.register(ada).unwrap();
        dir.register(person_req("Bola", "Adamu")).unwrap();
        dir.register(person_req("Chidi", "Eze")).unwrap();

        let by_name = dir.search(Some("ADA"), 0, 10).unwrap();
        assert_eq!(by_name.total_records, 2, "Ada and Adamu");

        let by_number = dir.search(Some("hn-1"), 0, 10).unwrap();
        assert_eq!(by_number.total_records, 1);
        assert_eq!(by_number.records[0].first_name, "Ada");
    }

    #[test]
    fn test_duplicate_hospital_numbers() {
        let dir = directory();
        for (name, number) in [("A", "HN-2"), ("B", "HN-1"), ("C", "HN-2"), ("D", "HN-3")] {
            let mut req = person_req(name, "Test");
            req.hospital_number = Some(number.into());
            dir.register(req).unwrap();
        }
        dir.register(person_req("E", "NoNumber")).unwrap();

        let dupes = dir.duplicate_hospital_numbers(0, 10).unwrap();
        let names: Vec<&str> = dupes.records.iter().map(|p| p.first_name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
        assert_eq!(dupes.total_records, 2);
        assert_eq!(dupes.total_pages, 1);

        let second = dir.duplicate_hospital_numbers(1, 1).unwrap();
        assert_eq!(second.records[0].first_name, "C");

        assert!(dir.hospital_number_exists("HN-3").unwrap());
        assert!(!dir.hospital_number_exists("HN-9").unwrap());
        assert_eq!(
            dir.find_by_hospital_number("HN-2").unwrap().first_name.as_str(),
            "A"
        );
        assert!(dir.find_by_hospital_number("HN-9").is_err());
    }

    #[test]
    fn test_update_overwrites_fields_and_keeps_id() {
        let dir = directory();
        let person = dir.register(person_req("Ada", "Obi")).unwrap();

        let mut req = person_req("Adaeze", "Obi");
        req.hospital_number = Some("HN-5".into());
        let updated = dir.update(person.id, req).expect("update should succeed");

        assert_eq!(updated.id, person.id);
        assert_eq!(updated.first_name.as_str(), "Adaeze");
        assert_eq!(dir.find_by_id(person.id).unwrap(), updated);

        assert!(matches!(
            dir.update(PersonId(99), person_req("X", "Y")),
            Err(CheckpostError::NotFound { .. })
        ));
        assert!(matches!(
            dir.update(person.id, person_req(" ", "Obi")),
            Err(CheckpostError::Text(_))
        ));
    }

    #[test]
    fn test_archived_person_leaves_search_and_duplicate_report() {
        let dir = directory();
        let mut first = person_req("Ada", "Obi");
        first.hospital_number = Some("HN-1".into());
        let first = dir.register(first).unwrap();
        let mut second = person_req("Bola", "Obi");
        second.hospital_number = Some("HN-1".into());
        dir.register(second).unwrap();
        assert_eq!(dir.duplicate_hospital_numbers(0, 10).unwrap().total_records, 2);

        dir.archive(first.id).expect("archive should succeed");
        dir.archive(first.id).expect("archive is idempotent");

        let found = dir.search(Some("obi"), 0, 10).unwrap();
        assert_eq!(found.total_records, 1);
        assert_eq!(found.records[0].first_name, "Bola");
        assert_eq!(dir.duplicate_hospital_numbers(0, 10).unwrap().total_records, 0);
        assert!(dir.find_by_id(first.id).unwrap().archived, "still retrievable by id");

        let updated = dir.update(first.id, person_req("Ada", "Obi")).unwrap();
        assert!(updated.archived, "update keeps the archived flag");
    }
}
