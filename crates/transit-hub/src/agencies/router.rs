use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    AgencyId, DocumentId, NewAgency, NewDocument, NewStation, ReviewDecision, StationId,
};
use super::repository::{AgencyRepository, NotificationPublisher, RepositoryError};
use super::service::{AgencyRegistryService, AgencyServiceError};
use crate::auth::{authenticate, AuthError, JwtService, Principal};

/// Shared state handed to every agency handler.
pub struct AgencyApiState<R, N> {
    pub service: Arc<AgencyRegistryService<R, N>>,
    pub tokens: Arc<JwtService>,
}

impl<R, N> Clone for AgencyApiState<R, N> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            tokens: Arc::clone(&self.tokens),
        }
    }
}

impl<R, N> AgencyApiState<R, N> {
    fn principal(&self, headers: &HeaderMap) -> Result<Principal, ApiError> {
        Ok(authenticate(headers, &self.tokens)?)
    }
}

/// Router builder exposing the agency, station, and document endpoints.
pub fn agency_router<R, N>(
    service: Arc<AgencyRegistryService<R, N>>,
    tokens: Arc<JwtService>,
) -> Router
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route(
            "/api/v1/agencies",
            post(create_agency_handler::<R, N>).get(list_agencies_handler::<R, N>),
        )
        .route("/api/v1/agency/me", get(my_agency_handler::<R, N>))
        .route("/api/v1/agencies/:agency_id", get(agency_profile_handler::<R, N>))
        .route(
            "/api/v1/agencies/:agency_id/publish",
            patch(publish_handler::<R, N>),
        )
        .route(
            "/api/v1/agency/:agency_id/publish",
            patch(publish_handler::<R, N>),
        )
        .route(
            "/api/v1/agencies/:agency_id/verify",
            patch(verify_handler::<R, N>),
        )
        .route(
            "/api/v1/agencies/:agency_id/stations",
            post(add_station_handler::<R, N>).get(list_stations_handler::<R, N>),
        )
        .route(
            "/api/v1/agencies/:agency_id/stations/:station_id",
            delete(remove_station_handler::<R, N>),
        )
        .route(
            "/api/v1/agencies/:agency_id/documents",
            post(submit_document_handler::<R, N>).get(list_documents_handler::<R, N>),
        )
        .route(
            "/api/v1/agencies/:agency_id/documents/:document_id",
            delete(remove_document_handler::<R, N>),
        )
        .route(
            "/api/v1/documents/:document_id/approve",
            patch(approve_document_handler::<R, N>),
        )
        .route(
            "/api/v1/documents/:document_id/reject",
            patch(reject_document_handler::<R, N>),
        )
        .route(
            "/api/v1/documents/:document_id/remark",
            patch(remark_document_handler::<R, N>),
        )
        .with_state(AgencyApiState { service, tokens })
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListAgenciesQuery {
    #[serde(default)]
    pub(crate) published_only: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VerifyRequest {
    pub(crate) is_verified: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RemarksRequest {
    pub(crate) remarks: String,
}

pub(crate) async fn create_agency_handler<R, N>(
    State(state): State<AgencyApiState<R, N>>,
    headers: HeaderMap,
    Json(input): Json<NewAgency>,
) -> Result<Response, ApiError>
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    state.principal(&headers)?.require_system_admin()?;
    let agency = state.service.create_agency(input)?;
    Ok((StatusCode::CREATED, Json(agency)).into_response())
}

/// Published agencies are public; the full listing is reserved for system administrators.
pub(crate) async fn list_agencies_handler<R, N>(
    State(state): State<AgencyApiState<R, N>>,
    headers: HeaderMap,
    Query(query): Query<ListAgenciesQuery>,
) -> Result<Response, ApiError>
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    if !query.published_only {
        state.principal(&headers)?.require_system_admin()?;
    }
    let agencies = state.service.list_agencies(query.published_only)?;
    Ok(Json(agencies).into_response())
}

pub(crate) async fn my_agency_handler<R, N>(
    State(state): State<AgencyApiState<R, N>>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let agency_id = state.principal(&headers)?.own_agency()?;
    let profile = state.service.profile(&agency_id)?;
    Ok(Json(profile).into_response())
}

pub(crate) async fn agency_profile_handler<R, N>(
    State(state): State<AgencyApiState<R, N>>,
    headers: HeaderMap,
    Path(agency_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let agency_id = parse_agency_id(&agency_id)?;
    state.principal(&headers)?.require_agency_reader(&agency_id)?;
    let profile = state.service.profile(&agency_id)?;
    Ok(Json(profile).into_response())
}

pub(crate) async fn publish_handler<R, N>(
    State(state): State<AgencyApiState<R, N>>,
    headers: HeaderMap,
    Path(agency_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let agency_id = parse_agency_id(&agency_id)?;
    state.principal(&headers)?.require_agency_manager(&agency_id)?;
    let agency = state.service.publish(&agency_id)?;
    Ok(Json(agency).into_response())
}

pub(crate) async fn verify_handler<R, N>(
    State(state): State<AgencyApiState<R, N>>,
    headers: HeaderMap,
    Path(agency_id): Path<String>,
    Json(request): Json<VerifyRequest>,
) -> Result<Response, ApiError>
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let agency_id = parse_agency_id(&agency_id)?;
    state.principal(&headers)?.require_system_admin()?;
    let agency = state.service.set_verified(&agency_id, request.is_verified)?;
    Ok(Json(agency).into_response())
}

pub(crate) async fn add_station_handler<R, N>(
    State(state): State<AgencyApiState<R, N>>,
    headers: HeaderMap,
    Path(agency_id): Path<String>,
    Json(input): Json<NewStation>,
) -> Result<Response, ApiError>
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let agency_id = parse_agency_id(&agency_id)?;
    state.principal(&headers)?.require_agency_manager(&agency_id)?;
    let station = state.service.add_station(&agency_id, input)?;
    Ok((StatusCode::CREATED, Json(station)).into_response())
}

pub(crate) async fn list_stations_handler<R, N>(
    State(state): State<AgencyApiState<R, N>>,
    headers: HeaderMap,
    Path(agency_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let agency_id = parse_agency_id(&agency_id)?;
    state.principal(&headers)?.require_agency_reader(&agency_id)?;
    let stations = state.service.stations(&agency_id)?;
    Ok(Json(stations).into_response())
}

pub(crate) async fn remove_station_handler<R, N>(
    State(state): State<AgencyApiState<R, N>>,
    headers: HeaderMap,
    Path((agency_id, station_id)): Path<(String, String)>,
) -> Result<Response, ApiError>
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let agency_id = parse_agency_id(&agency_id)?;
    let station_id: StationId = station_id
        .parse()
        .map_err(|_| ApiError::InvalidId("station_id"))?;
    state.principal(&headers)?.require_agency_manager(&agency_id)?;
    state.service.remove_station(&agency_id, &station_id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn submit_document_handler<R, N>(
    State(state): State<AgencyApiState<R, N>>,
    headers: HeaderMap,
    Path(agency_id): Path<String>,
    Json(input): Json<NewDocument>,
) -> Result<Response, ApiError>
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let agency_id = parse_agency_id(&agency_id)?;
    state.principal(&headers)?.require_agency_manager(&agency_id)?;
    let document = state.service.submit_document(&agency_id, input)?;
    Ok((StatusCode::CREATED, Json(document)).into_response())
}

pub(crate) async fn list_documents_handler<R, N>(
    State(state): State<AgencyApiState<R, N>>,
    headers: HeaderMap,
    Path(agency_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let agency_id = parse_agency_id(&agency_id)?;
    state.principal(&headers)?.require_agency_reader(&agency_id)?;
    let documents = state.service.documents(&agency_id)?;
    Ok(Json(documents).into_response())
}

pub(crate) async fn remove_document_handler<R, N>(
    State(state): State<AgencyApiState<R, N>>,
    headers: HeaderMap,
    Path((agency_id, document_id)): Path<(String, String)>,
) -> Result<Response, ApiError>
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let agency_id = parse_agency_id(&agency_id)?;
    let document_id = parse_document_id(&document_id)?;
    state.principal(&headers)?.require_agency_manager(&agency_id)?;
    state.service.remove_document(&agency_id, &document_id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn approve_document_handler<R, N>(
    State(state): State<AgencyApiState<R, N>>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    review(&state, &headers, &document_id, ReviewDecision::Approve)
}

pub(crate) async fn reject_document_handler<R, N>(
    State(state): State<AgencyApiState<R, N>>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
    Json(request): Json<RemarksRequest>,
) -> Result<Response, ApiError>
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let decision = ReviewDecision::Reject {
        remarks: request.remarks,
    };
    review(&state, &headers, &document_id, decision)
}

pub(crate) async fn remark_document_handler<R, N>(
    State(state): State<AgencyApiState<R, N>>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
    Json(request): Json<RemarksRequest>,
) -> Result<Response, ApiError>
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let decision = ReviewDecision::Remark {
        remarks: request.remarks,
    };
    review(&state, &headers, &document_id, decision)
}

fn review<R, N>(
    state: &AgencyApiState<R, N>,
    headers: &HeaderMap,
    document_id: &str,
    decision: ReviewDecision,
) -> Result<Response, ApiError>
where
    R: AgencyRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let document_id = parse_document_id(document_id)?;
    state.principal(headers)?.require_system_admin()?;
    let outcome = state.service.review_document(&document_id, decision)?;
    Ok(Json(outcome).into_response())
}

fn parse_agency_id(raw: &str) -> Result<AgencyId, ApiError> {
    raw.parse().map_err(|_| ApiError::InvalidId("agency_id"))
}

fn parse_document_id(raw: &str) -> Result<DocumentId, ApiError> {
    raw.parse().map_err(|_| ApiError::InvalidId("document_id"))
}

/// Handler error mapped onto an HTTP status and a JSON `{ "error": ... }` body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Service(#[from] AgencyServiceError),
    #[error("path parameter '{0}' is not a valid identifier")]
    InvalidId(&'static str),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Auth(err) => err.status_code(),
            ApiError::InvalidId(_) => StatusCode::BAD_REQUEST,
            ApiError::Service(err) => match err {
                AgencyServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                AgencyServiceError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
                AgencyServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
                AgencyServiceError::Repository(
                    RepositoryError::Conflict | RepositoryError::VersionConflict { .. },
                ) => StatusCode::CONFLICT,
                AgencyServiceError::Repository(RepositoryError::Unavailable(_)) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                AgencyServiceError::Notification(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "agency request failed");
        }
        let payload = json!({ "error": self.to_string() });
        (status, Json(payload)).into_response()
    }
}
