//! # API REST
//!
//! REST API implementation for checkpost.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - mapping core errors onto status codes
//!
//! Uses `api-shared` for request/response bodies and `checkpost-core` for every
//! operation. The workspace binary builds a [`CheckpostService`] and serves
//! [`router`].
//!
//! Core operations take the store lock and, for a file-backed store, write the
//! record snapshot, so every handler runs them on the blocking thread pool.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::{IntoParams, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use api_shared::{
    CheckInReq, CreatePersonReq, CreateVisitReq, EncounterRes, ExistsRes, HealthRes,
    HealthService, HospitalNumberReq, PersonPageRes, PersonRes, ServiceRes, UpdateVisitReq,
    VisitDetailRes, VisitRes,
};
use checkpost_core::{
    CheckpostError, CheckpostResult, CheckpostService, EncounterId, PersonDirectory, PersonId,
    VisitId,
};

/// Error half of every handler result: a status code and a message body.
type ApiError = (StatusCode, String);

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    svc: Arc<CheckpostService>,
}

/// Paging and search parameters of the listing endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
struct PageQuery {
    /// Free-text search; empty or `*` matches everyone.
    search_param: Option<String>,
    /// Zero-based page number, default 0.
    page_no: Option<usize>,
    /// Records per page, default from configuration.
    page_size: Option<usize>,
}

impl PageQuery {
    fn resolve(&self, svc: &CheckpostService) -> (usize, usize) {
        (
            self.page_no.unwrap_or(0),
            self.page_size.unwrap_or_else(|| svc.cfg().default_page_size()),
        )
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        create_visit,
        check_in,
        list_visits,
        get_visit,
        update_visit,
        check_out,
        archive_visit,
        complete_encounter,
        visit_details_for_person,
        search_patients,
        create_patient,
        get_patient,
        update_patient,
        archive_patient,
        get_patient_by_nin,
        get_patient_by_hospital_number,
        checked_in_patients,
        checked_in_by_service,
        duplicate_hospital_numbers,
        hospital_number_exists,
        nin_exists,
        list_services,
    ),
    components(schemas(
        HealthRes,
        CreateVisitReq,
        CheckInReq,
        UpdateVisitReq,
        VisitRes,
        EncounterRes,
        VisitDetailRes,
        CreatePersonReq,
        PersonRes,
        PersonPageRes,
        HospitalNumberReq,
        ExistsRes,
        ServiceRes,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router over `svc`, with Swagger UI and permissive CORS.
///
/// # Arguments
///
/// * `svc` - Core services wired to one record store
///
/// # Returns
///
/// A `Router` with its state applied, ready for `axum::serve` or in-process
/// `oneshot` calls.
pub fn router(svc: CheckpostService) -> Router {
    let state = AppState { svc: Arc::new(svc) };

    Router::new()
        .route("/health", get(health))
        .route("/visits", get(list_visits).post(create_visit))
        .route("/visits/check-in", post(check_in))
        .route(
            "/visits/:id",
            get(get_visit).put(update_visit).delete(archive_visit),
        )
        .route("/visits/:id/check-out", put(check_out))
        .route("/visits/person/:person_id", get(visit_details_for_person))
        .route("/encounters/:id/complete", put(complete_encounter))
        .route("/patients", get(search_patients).post(create_patient))
        .route(
            "/patients/:id",
            get(get_patient).put(update_patient).delete(archive_patient),
        )
        .route("/patients/nin/:nin", get(get_patient_by_nin))
        .route(
            "/patients/hospital-number/:hospital_number",
            get(get_patient_by_hospital_number),
        )
        .route("/patients/checked-in", get(checked_in_patients))
        .route(
            "/patients/checked-in/:service_code",
            get(checked_in_by_service),
        )
        .route(
            "/patients/duplicate-hospital-numbers",
            get(duplicate_hospital_numbers),
        )
        .route(
            "/patients/exist/hospital-number",
            post(hospital_number_exists),
        )
        .route("/patients/exist/nin/:nin", post(nin_exists))
        .route("/services", get(list_services))
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Maps a core error onto a status code.
///
/// Caller errors keep their message so the missing id or conflicting person is
/// visible; anything else is logged and hidden behind `Internal error`.
fn api_error(err: CheckpostError) -> ApiError {
    match &err {
        CheckpostError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        CheckpostError::Conflict { .. } => (StatusCode::CONFLICT, err.to_string()),
        CheckpostError::InvalidInput(_)
        | CheckpostError::InvalidTimestamp(_)
        | CheckpostError::Text(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        _ => {
            tracing::error!("request failed: {:?}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
        }
    }
}

/// Runs a core operation on the blocking pool and maps its error.
async fn blocking<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&CheckpostService) -> CheckpostResult<T> + Send + 'static,
    T: Send + 'static,
{
    let svc = state.svc.clone();
    tokio::task::spawn_blocking(move || op(&svc))
        .await
        .map_err(|err| {
            tracing::error!("core task failed: {:?}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
        })?
        .map_err(api_error)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used by monitoring and load balancer health checks.
///
/// # Returns
/// * `Json<HealthRes>` - Health status response containing service status
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

// ============================================================================
// VISITS
// ============================================================================

#[utoipa::path(
    post,
    path = "/visits",
    request_body = CreateVisitReq,
    responses(
        (status = 201, description = "Visit opened", body = VisitRes),
        (status = 400, description = "Malformed check-in date"),
        (status = 404, description = "Unknown person or service"),
        (status = 409, description = "Person already has an open visit"),
        (status = 500, description = "Internal server error")
    )
)]
/// Open a visit and one pending encounter per listed service
///
/// # Returns
/// * `Ok((201, Json<VisitRes>))` - The new visit with its encounters
///
/// # Errors
/// Returns:
/// - `404 Not Found` if the person or a service does not exist,
/// - `409 Conflict` if the person already has an open visit,
/// - `400 Bad Request` if the check-in date is malformed.
#[axum::debug_handler]
async fn create_visit(
    State(state): State<AppState>,
    Json(req): Json<CreateVisitReq>,
) -> Result<(StatusCode, Json<VisitRes>), ApiError> {
    let res = blocking(&state, move |svc| svc.visits().create_visit(&req)).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[utoipa::path(
    post,
    path = "/visits/check-in",
    request_body = CheckInReq,
    responses(
        (status = 201, description = "Person checked in", body = VisitRes),
        (status = 400, description = "Malformed check-in date"),
        (status = 404, description = "Unknown person or service"),
        (status = 409, description = "Person already has an open visit"),
        (status = 500, description = "Internal server error")
    )
)]
/// Check a person in: open a visit and route it to the requested services.
///
/// Extra services already named by the visit are not routed a second time.
#[axum::debug_handler]
async fn check_in(
    State(state): State<AppState>,
    Json(req): Json<CheckInReq>,
) -> Result<(StatusCode, Json<VisitRes>), ApiError> {
    let res = blocking(&state, move |svc| svc.visits().check_in(&req)).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[utoipa::path(
    get,
    path = "/visits",
    responses(
        (status = 200, description = "Non-archived visits", body = [VisitRes]),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn list_visits(State(state): State<AppState>) -> Result<Json<Vec<VisitRes>>, ApiError> {
    blocking(&state, |svc| svc.visits().list_visits())
        .await
        .map(Json)
}

#[utoipa::path(
    get,
    path = "/visits/{id}",
    params(("id" = i64, Path, description = "Visit id")),
    responses(
        (status = 200, description = "Visit with its encounters", body = VisitRes),
        (status = 404, description = "Unknown visit")
    )
)]
#[axum::debug_handler]
async fn get_visit(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
) -> Result<Json<VisitRes>, ApiError> {
    blocking(&state, move |svc| svc.visits().get_visit(VisitId(id)))
        .await
        .map(Json)
}

#[utoipa::path(
    put,
    path = "/visits/{id}",
    params(("id" = i64, Path, description = "Visit id")),
    request_body = UpdateVisitReq,
    responses(
        (status = 200, description = "Visit updated and un-archived", body = VisitRes),
        (status = 400, description = "Malformed or inconsistent dates"),
        (status = 404, description = "Unknown visit or person"),
        (status = 409, description = "Person would have two open visits")
    )
)]
#[axum::debug_handler]
async fn update_visit(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
    Json(req): Json<UpdateVisitReq>,
) -> Result<Json<VisitRes>, ApiError> {
    blocking(&state, move |svc| svc.visits().update_visit(VisitId(id), &req))
        .await
        .map(Json)
}

#[utoipa::path(
    put,
    path = "/visits/{id}/check-out",
    params(("id" = i64, Path, description = "Visit id")),
    responses(
        (status = 200, description = "Visit closed, pending encounters completed", body = VisitRes),
        (status = 404, description = "Unknown visit")
    )
)]
/// Check a visit out. Checking out a closed visit again is harmless.
#[axum::debug_handler]
async fn check_out(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
) -> Result<Json<VisitRes>, ApiError> {
    blocking(&state, move |svc| {
        svc.visits().check_out(VisitId(id))?;
        svc.visits().get_visit(VisitId(id))
    })
    .await
    .map(Json)
}

#[utoipa::path(
    delete,
    path = "/visits/{id}",
    params(("id" = i64, Path, description = "Visit id")),
    responses(
        (status = 204, description = "Visit archived"),
        (status = 404, description = "Unknown visit")
    )
)]
/// Archive a visit. The visit stays retrievable by id.
#[axum::debug_handler]
async fn archive_visit(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |svc| svc.visits().archive_visit(VisitId(id))).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/visits/person/{person_id}",
    params(("person_id" = i64, Path, description = "Person id")),
    responses(
        (status = 200, description = "One detail per encounter of the person", body = [VisitDetailRes])
    )
)]
#[axum::debug_handler]
async fn visit_details_for_person(
    State(state): State<AppState>,
    AxumPath(person_id): AxumPath<i64>,
) -> Result<Json<Vec<VisitDetailRes>>, ApiError> {
    blocking(&state, move |svc| {
        svc.queries().visit_details_for_person(PersonId(person_id))
    })
    .await
    .map(Json)
}

#[utoipa::path(
    put,
    path = "/encounters/{id}/complete",
    params(("id" = i64, Path, description = "Encounter id")),
    responses(
        (status = 200, description = "Encounter completed", body = EncounterRes),
        (status = 404, description = "Unknown encounter")
    )
)]
#[axum::debug_handler]
async fn complete_encounter(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
) -> Result<Json<EncounterRes>, ApiError> {
    blocking(&state, move |svc| {
        svc.encounters()
            .complete_encounter(EncounterId(id))
            .map(|e| e.to_res())
    })
    .await
    .map(Json)
}

// ============================================================================
// PATIENTS AND SERVICES
// ============================================================================

#[utoipa::path(
    get,
    path = "/patients",
    params(PageQuery),
    responses(
        (status = 200, description = "One page of matching patients", body = PersonPageRes),
        (status = 400, description = "Zero page size")
    )
)]
/// Search non-archived patients, one page at a time
///
/// # Returns
/// * `Ok(Json<PersonPageRes>)` - The requested page with totals
///
/// # Errors
/// Returns `400 Bad Request` if `pageSize` is zero.
#[axum::debug_handler]
async fn search_patients(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PersonPageRes>, ApiError> {
    let (page, page_size) = query.resolve(&state.svc);
    blocking(&state, move |svc| {
        svc.persons()
            .search(query.search_param.as_deref(), page, page_size)
    })
    .await
    .map(Json)
}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = CreatePersonReq,
    responses(
        (status = 201, description = "Patient registered", body = PersonRes),
        (status = 400, description = "Blank name or malformed date of birth")
    )
)]
#[axum::debug_handler]
async fn create_patient(
    State(state): State<AppState>,
    Json(req): Json<CreatePersonReq>,
) -> Result<(StatusCode, Json<PersonRes>), ApiError> {
    let person = blocking(&state, move |svc| {
        svc.persons().register(req).map(|p| p.to_res())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(person)))
}

#[utoipa::path(
    get,
    path = "/patients/{id}",
    params(("id" = i64, Path, description = "Person id")),
    responses(
        (status = 200, description = "Patient", body = PersonRes),
        (status = 404, description = "Unknown patient")
    )
)]
#[axum::debug_handler]
async fn get_patient(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
) -> Result<Json<PersonRes>, ApiError> {
    blocking(&state, move |svc| {
        svc.persons().find_by_id(PersonId(id)).map(|p| p.to_res())
    })
    .await
    .map(Json)
}

#[utoipa::path(
    put,
    path = "/patients/{id}",
    params(("id" = i64, Path, description = "Person id")),
    request_body = CreatePersonReq,
    responses(
        (status = 200, description = "Patient updated", body = PersonRes),
        (status = 400, description = "Blank name or malformed date of birth"),
        (status = 404, description = "Unknown patient")
    )
)]
/// Overwrite a patient's identity fields. The archived flag is kept.
#[axum::debug_handler]
async fn update_patient(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
    Json(req): Json<CreatePersonReq>,
) -> Result<Json<PersonRes>, ApiError> {
    blocking(&state, move |svc| {
        svc.persons().update(PersonId(id), req).map(|p| p.to_res())
    })
    .await
    .map(Json)
}

#[utoipa::path(
    delete,
    path = "/patients/{id}",
    params(("id" = i64, Path, description = "Person id")),
    responses(
        (status = 204, description = "Patient archived"),
        (status = 404, description = "Unknown patient")
    )
)]
/// Archive a patient. Archived patients leave search and duplicate reports.
#[axum::debug_handler]
async fn archive_patient(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |svc| svc.persons().archive(PersonId(id))).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/patients/nin/{nin}",
    params(("nin" = String, Path, description = "National identification number")),
    responses(
        (status = 200, description = "Patient", body = PersonRes),
        (status = 404, description = "No patient with this NIN")
    )
)]
#[axum::debug_handler]
async fn get_patient_by_nin(
    State(state): State<AppState>,
    AxumPath(nin): AxumPath<String>,
) -> Result<Json<PersonRes>, ApiError> {
    blocking(&state, move |svc| {
        svc.persons().find_by_nin(&nin).map(|p| p.to_res())
    })
    .await
    .map(Json)
}

#[utoipa::path(
    get,
    path = "/patients/hospital-number/{hospital_number}",
    params(("hospital_number" = String, Path, description = "Hospital number")),
    responses(
        (status = 200, description = "Patient", body = PersonRes),
        (status = 404, description = "No patient with this hospital number")
    )
)]
#[axum::debug_handler]
async fn get_patient_by_hospital_number(
    State(state): State<AppState>,
    AxumPath(hospital_number): AxumPath<String>,
) -> Result<Json<PersonRes>, ApiError> {
    blocking(&state, move |svc| {
        svc.persons()
            .find_by_hospital_number(&hospital_number)
            .map(|p| p.to_res())
    })
    .await
    .map(Json)
}

#[utoipa::path(
    get,
    path = "/patients/checked-in",
    params(PageQuery),
    responses(
        (status = 200, description = "Patients with an open visit", body = PersonPageRes)
    )
)]
#[axum::debug_handler]
async fn checked_in_patients(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PersonPageRes>, ApiError> {
    let (page, page_size) = query.resolve(&state.svc);
    blocking(&state, move |svc| {
        svc.queries().checked_in_persons(page, page_size)
    })
    .await
    .map(Json)
}

#[utoipa::path(
    get,
    path = "/patients/checked-in/{service_code}",
    params(("service_code" = String, Path, description = "Service code, e.g. OPD")),
    responses(
        (status = 200, description = "Patients waiting on the service", body = [PersonRes])
    )
)]
#[axum::debug_handler]
async fn checked_in_by_service(
    State(state): State<AppState>,
    AxumPath(service_code): AxumPath<String>,
) -> Result<Json<Vec<PersonRes>>, ApiError> {
    blocking(&state, move |svc| {
        svc.queries().checked_in_by_service(&service_code)
    })
    .await
    .map(Json)
}

#[utoipa::path(
    get,
    path = "/patients/duplicate-hospital-numbers",
    params(PageQuery),
    responses(
        (status = 200, description = "Patients sharing a hospital number", body = PersonPageRes),
        (status = 400, description = "Zero page size")
    )
)]
/// Report patients that share a hospital number, one page at a time
///
/// `searchParam` is ignored.
///
/// # Returns
/// * `Ok(Json<PersonPageRes>)` - Duplicates ordered by hospital number, then id
#[axum::debug_handler]
async fn duplicate_hospital_numbers(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PersonPageRes>, ApiError> {
    let (page, page_size) = query.resolve(&state.svc);
    blocking(&state, move |svc| {
        svc.persons().duplicate_hospital_numbers(page, page_size)
    })
    .await
    .map(Json)
}

#[utoipa::path(
    post,
    path = "/patients/exist/hospital-number",
    request_body = HospitalNumberReq,
    responses(
        (status = 200, description = "Whether any patient has the hospital number", body = ExistsRes)
    )
)]
#[axum::debug_handler]
async fn hospital_number_exists(
    State(state): State<AppState>,
    Json(req): Json<HospitalNumberReq>,
) -> Result<Json<ExistsRes>, ApiError> {
    let exists = blocking(&state, move |svc| {
        svc.persons().hospital_number_exists(&req.hospital_number)
    })
    .await?;
    Ok(Json(ExistsRes { exists }))
}

#[utoipa::path(
    post,
    path = "/patients/exist/nin/{nin}",
    params(("nin" = String, Path, description = "National identification number")),
    responses(
        (status = 200, description = "Whether any patient has the NIN", body = ExistsRes)
    )
)]
#[axum::debug_handler]
async fn nin_exists(
    State(state): State<AppState>,
    AxumPath(nin): AxumPath<String>,
) -> Result<Json<ExistsRes>, ApiError> {
    let exists = blocking(&state, move |svc| svc.persons().nin_exists(&nin)).await?;
    Ok(Json(ExistsRes { exists }))
}

#[utoipa::path(
    get,
    path = "/services",
    responses(
        (status = 200, description = "Service catalog", body = [ServiceRes])
    )
)]
#[axum::debug_handler]
async fn list_services(State(state): State<AppState>) -> Result<Json<Vec<ServiceRes>>, ApiError> {
    blocking(&state, |svc| {
        svc.catalog()
            .list()
            .map(|services| services.iter().map(|s| s.to_res()).collect())
    })
    .await
    .map(Json)
}
