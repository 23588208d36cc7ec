//! Request and response bodies.
//!
//! Every body is serialised in camelCase. Timestamps travel as strings in the
//! `yyyy-MM-dd HH:mm` format; statuses travel as their upper-case names
//! (`PENDING`, `COMPLETED`, `OPEN`, `CLOSED`).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

// ============================================================================
// VISITS
// ============================================================================

/// Opens a visit for a person and routes it to the listed services.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateVisitReq {
    pub person_id: i64,
    #[serde(default)]
    pub service_ids: Vec<i64>,
    /// `yyyy-MM-dd HH:mm`; the current time is used when absent.
    #[serde(default)]
    pub check_in_date: Option<String>,
}

/// Check-in: a visit request plus the services to route the person to.
///
/// Services listed in both `visit.serviceIds` and `serviceIds` are routed once.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckInReq {
    pub visit: CreateVisitReq,
    #[serde(default)]
    pub service_ids: Vec<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVisitReq {
    #[serde(default)]
    pub person_id: Option<i64>,
    #[serde(default)]
    pub check_in_date: Option<String>,
    #[serde(default)]
    pub check_out_date: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EncounterRes {
    pub id: i64,
    pub uuid: String,
    pub person_id: i64,
    pub visit_id: i64,
    pub facility_id: i64,
    pub service_code: String,
    pub encounter_date: String,
    pub status: String,
    pub archived: bool,
}

/// A visit together with every encounter routed under it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitRes {
    pub id: i64,
    pub uuid: String,
    pub person_id: i64,
    pub facility_id: i64,
    pub check_in_date: String,
    pub check_out_date: Option<String>,
    pub archived: bool,
    /// `OPEN` while the check-out date is unset, `CLOSED` afterwards.
    pub status: String,
    pub encounters: Vec<EncounterRes>,
}

/// One encounter seen in the context of its whole visit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitDetailRes {
    /// Visit id.
    pub id: i64,
    pub person_id: i64,
    pub encounter_id: i64,
    /// Service code of the queried encounter.
    pub service: String,
    /// Status of the queried encounter only.
    pub status: String,
    /// `PENDING` if any encounter of the visit is pending, else `COMPLETED`.
    pub service_summary: String,
    pub check_in_date: String,
    pub check_out_date: Option<String>,
    pub encounters: Vec<EncounterRes>,
}

// ============================================================================
// PERSONS AND SERVICES
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePersonReq {
    pub facility_id: i64,
    pub first_name: String,
    #[serde(default)]
    pub other_name: Option<String>,
    pub surname: String,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub nin: Option<String>,
    #[serde(default)]
    pub hospital_number: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersonRes {
    pub id: i64,
    pub facility_id: i64,
    pub first_name: String,
    pub other_name: Option<String>,
    pub surname: String,
    pub sex: Option<String>,
    pub date_of_birth: Option<String>,
    pub nin: Option<String>,
    pub hospital_number: Option<String>,
    pub archived: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRes {
    pub id: i64,
    pub code: String,
    pub label: String,
}

/// Body of the hospital-number existence check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HospitalNumberReq {
    pub hospital_number: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExistsRes {
    pub exists: bool,
}

// ============================================================================
// PAGING
// ============================================================================

/// Paging envelope shared by every listing endpoint.
///
/// `totalPages` is `ceil(totalRecords / pageSize)`; `currentPage` is zero-based.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[aliases(PersonPageRes = PageRes<PersonRes>)]
pub struct PageRes<T> {
    pub total_records: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub current_page: usize,
    pub records: Vec<T>,
}
