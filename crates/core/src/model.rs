//! Record types held by the store.
//!
//! - [`Person`]: identity record, owned by the person directory
//! - [`Service`]: a routable check-post destination, owned by the service catalog
//! - [`Visit`]: one open-to-close clinical episode of a person
//! - [`Encounter`]: one routing of a person, within a visit, to one service
//!
//! Visits and encounters are never physically deleted; the `archived` flag is
//! a logical delete that hides a record from default listings only.

use api_shared::{EncounterRes, PersonRes, ServiceRes};
use checkpost_types::{CheckpointTime, NonEmptyText};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Sequential person identifier.
    PersonId
);
record_id!(
    /// Sequential service catalog identifier.
    ServiceId
);
record_id!(
    /// Sequential visit identifier.
    VisitId
);
record_id!(
    /// Sequential encounter identifier.
    EncounterId
);

// ============================================================================
// PERSON
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub facility_id: i64,
    pub first_name: NonEmptyText,
    pub other_name: Option<String>,
    pub surname: NonEmptyText,
    pub sex: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    /// National identification number. Not unique-checked on write.
    pub nin: Option<String>,
    /// Facility hospital number. Not unique-checked on write.
    pub hospital_number: Option<String>,
    pub archived: bool,
}

impl Person {
    pub fn to_res(&self) -> PersonRes {
        PersonRes {
            id: self.id.0,
            facility_id: self.facility_id,
            first_name: self.first_name.to_string(),
            other_name: self.other_name.clone(),
            surname: self.surname.to_string(),
            sex: self.sex.clone(),
            date_of_birth: self.date_of_birth.map(|d| d.to_string()),
            nin: self.nin.clone(),
            hospital_number: self.hospital_number.clone(),
            archived: self.archived,
        }
    }
}

// ============================================================================
// SERVICE
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub code: NonEmptyText,
    pub label: NonEmptyText,
}

impl Service {
    pub fn to_res(&self) -> ServiceRes {
        ServiceRes {
            id: self.id.0,
            code: self.code.to_string(),
            label: self.label.to_string(),
        }
    }
}

// ============================================================================
// VISIT
// ============================================================================

/// Lifecycle of a visit. `Open` → `Closed` is the only transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisitState {
    Open,
    Closed,
}

impl VisitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitState::Open => "OPEN",
            VisitState::Closed => "CLOSED",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub id: VisitId,
    pub uuid: String,
    pub person_id: PersonId,
    pub facility_id: i64,
    pub start: CheckpointTime,
    pub end: Option<CheckpointTime>,
    pub archived: bool,
}

impl Visit {
    /// A visit is open from check-in until its end timestamp is set.
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    pub fn state(&self) -> VisitState {
        if self.is_open() {
            VisitState::Open
        } else {
            VisitState::Closed
        }
    }
}

// ============================================================================
// ENCOUNTER
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EncounterStatus {
    Pending,
    Completed,
}

impl EncounterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncounterStatus::Pending => "PENDING",
            EncounterStatus::Completed => "COMPLETED",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encounter {
    pub id: EncounterId,
    pub uuid: String,
    pub person_id: PersonId,
    pub visit_id: VisitId,
    pub facility_id: i64,
    /// Copied from the catalog when the encounter is opened.
    pub service_code: String,
    pub encounter_date: CheckpointTime,
    pub status: EncounterStatus,
    pub archived: bool,
}

impl Encounter {
    /// Advances `PENDING` to `COMPLETED`. Returns whether the status changed.
    pub fn complete(&mut self) -> bool {
        match self.status {
            EncounterStatus::Pending => {
                self.status = EncounterStatus::Completed;
                true
            }
            EncounterStatus::Completed => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == EncounterStatus::Pending
    }

    pub fn to_res(&self) -> EncounterRes {
        EncounterRes {
            id: self.id.0,
            uuid: self.uuid.clone(),
            person_id: self.person_id.0,
            visit_id: self.visit_id.0,
            facility_id: self.facility_id,
            service_code: self.service_code.clone(),
            encounter_date: self.encounter_date.to_string(),
            status: self.status.as_str().to_string(),
            archived: self.archived,
        }
    }
}
