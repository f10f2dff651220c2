use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Local;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::store::Store;

use super::controller::AdmissionController;
use super::domain::{EntrantId, EntrantStatus, EventId, GeoPoint, OrganizerId, Role, UserIdentity};
use super::error::AdmissionError;
use super::participation::Transition;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLES_HEADER: &str = "x-user-roles";

/// Router builder exposing organizer, entrant, and admin endpoints.
pub fn admission_router<S>(controller: Arc<AdmissionController<S>>) -> Router
where
    S: Store + 'static,
{
    Router::new()
        .route("/api/v1/events/:event_id/lottery", post(lottery_handler::<S>))
        .route("/api/v1/events/:event_id/draw", post(draw_handler::<S>))
        .route("/api/v1/events/:event_id/pool", post(pool_handler::<S>))
        .route("/api/v1/events/:event_id/pool/auto", post(pool_auto_handler::<S>))
        .route(
            "/api/v1/events/:event_id/notifications",
            post(notify_handler::<S>),
        )
        .route(
            "/api/v1/events/:event_id/entrants/:status",
            get(entrants_handler::<S>),
        )
        .route(
            "/api/v1/events/:event_id/participants/:entrant_id",
            get(participant_handler::<S>),
        )
        .route(
            "/api/v1/events/:event_id/participants/:entrant_id/:action",
            post(transition_handler::<S>),
        )
        .route("/api/v1/events/:event_id/export.csv", get(export_handler::<S>))
        .route("/api/v1/organizers/:organizer_id", delete(delete_organizer_handler::<S>))
        .route("/api/v1/organizers/:organizer_id/ban", post(ban_handler::<S>))
        .route("/api/v1/organizers/:organizer_id/unban", post(unban_handler::<S>))
        .with_state(controller)
}

#[derive(Debug, Deserialize)]
pub(crate) struct PoolRequest {
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NotifyRequest {
    pub status: EntrantStatus,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ActionRequest {
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub status: Option<EntrantStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BanRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

pub(crate) async fn lottery_handler<S>(
    State(controller): State<Arc<AdmissionController<S>>>,
    Path(event_id): Path<String>,
) -> Response
where
    S: Store + 'static,
{
    let event_id = EventId(event_id);
    match controller.lottery().run_lottery(&event_id).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn draw_handler<S>(
    State(controller): State<Arc<AdmissionController<S>>>,
    Path(event_id): Path<String>,
) -> Response
where
    S: Store + 'static,
{
    let event_id = EventId(event_id);
    match controller.lottery().draw_or_pool(&event_id).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn pool_handler<S>(
    State(controller): State<Arc<AdmissionController<S>>>,
    Path(event_id): Path<String>,
    Json(request): Json<PoolRequest>,
) -> Response
where
    S: Store + 'static,
{
    let event_id = EventId(event_id);
    match controller
        .replacement()
        .pool_replacement(&event_id, request.count)
        .await
    {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn pool_auto_handler<S>(
    State(controller): State<Arc<AdmissionController<S>>>,
    Path(event_id): Path<String>,
) -> Response
where
    S: Store + 'static,
{
    let event_id = EventId(event_id);
    match controller.replacement().pool_replacement_auto(&event_id).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn notify_handler<S>(
    State(controller): State<Arc<AdmissionController<S>>>,
    Path(event_id): Path<String>,
    Json(request): Json<NotifyRequest>,
) -> Response
where
    S: Store + 'static,
{
    let event_id = EventId(event_id);
    match controller
        .send_waiting_list_notification(&event_id, request.status, &request.message)
        .await
    {
        Ok(report) => {
            let status = if report.is_complete() {
                StatusCode::OK
            } else {
                StatusCode::MULTI_STATUS
            };
            (status, Json(report)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn entrants_handler<S>(
    State(controller): State<Arc<AdmissionController<S>>>,
    Path((event_id, status)): Path<(String, String)>,
) -> Response
where
    S: Store + 'static,
{
    let status: EntrantStatus = match status.parse() {
        Ok(status) => status,
        Err(error) => return error_response(error),
    };
    let event_id = EventId(event_id);
    match controller.entrants(&event_id, status).await {
        Ok(entrants) => {
            let payload = json!({
                "event_id": event_id,
                "status": status,
                "entrants": entrants,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn participant_handler<S>(
    State(controller): State<Arc<AdmissionController<S>>>,
    Path((event_id, entrant_id)): Path<(String, String)>,
) -> Response
where
    S: Store + 'static,
{
    let event_id = EventId(event_id);
    let entrant_id = EntrantId(entrant_id);
    match controller.status_of(&event_id, &entrant_id).await {
        Ok(Some(participation)) => (StatusCode::OK, Json(participation)).into_response(),
        Ok(None) => error_response(AdmissionError::NotRegistered { event_id }),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn transition_handler<S>(
    State(controller): State<Arc<AdmissionController<S>>>,
    Path((event_id, entrant_id, action)): Path<(String, String, String)>,
    body: Bytes,
) -> Response
where
    S: Store + 'static,
{
    let event_id = EventId(event_id);
    let entrant_id = EntrantId(entrant_id);
    let request: ActionRequest = match optional_body(&body) {
        Ok(request) => request,
        Err(error) => return error_response(error),
    };

    let transition = if action.eq_ignore_ascii_case("swap") {
        match request.status {
            Some(status) => Transition::Swap(status),
            None => {
                return error_response(AdmissionError::InvalidArgument(
                    "swap requires a target status".to_string(),
                ))
            }
        }
    } else {
        match action.parse::<Transition>() {
            Ok(transition) => transition,
            Err(error) => return error_response(error),
        }
    };

    let result = match transition {
        Transition::Join => {
            controller
                .join_waiting_list(&event_id, &entrant_id, request.location)
                .await
        }
        Transition::Leave => controller.leave_waiting_list(&event_id, &entrant_id).await,
        Transition::Accept => controller.accept_invitation(&event_id, &entrant_id).await,
        Transition::Decline => controller.decline_invitation(&event_id, &entrant_id).await,
        Transition::Cancel => controller.cancel_entrant(&event_id, &entrant_id).await,
        Transition::Rejoin => {
            controller
                .rejoin_waiting_list(&event_id, &entrant_id, request.location)
                .await
        }
        Transition::Confirm => controller.confirm_attendance(&event_id, &entrant_id).await,
        Transition::Swap(status) => {
            controller
                .swap_status(&event_id, &entrant_id, status)
                .await
        }
    };

    match result {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn export_handler<S>(
    State(controller): State<Arc<AdmissionController<S>>>,
    Path(event_id): Path<String>,
) -> Response
where
    S: Store + 'static,
{
    let event_id = EventId(event_id);
    match controller.export_final_entrants(&event_id).await {
        Ok(csv) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            csv,
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn ban_handler<S>(
    State(controller): State<Arc<AdmissionController<S>>>,
    Path(organizer_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: Store + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(error) => return error_response(error),
    };
    let request: BanRequest = match optional_body(&body) {
        Ok(request) => request,
        Err(error) => return error_response(error),
    };
    let organizer_id = OrganizerId(organizer_id);
    let today = Local::now().date_naive();
    match controller
        .ban_user_from_organizer(&actor, &organizer_id, request.reason.as_deref(), today)
        .await
    {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn unban_handler<S>(
    State(controller): State<Arc<AdmissionController<S>>>,
    Path(organizer_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: Store + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(error) => return error_response(error),
    };
    let organizer_id = OrganizerId(organizer_id);
    let today = Local::now().date_naive();
    match controller
        .unban_user_from_organizer(&actor, &organizer_id, today)
        .await
    {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn delete_organizer_handler<S>(
    State(controller): State<Arc<AdmissionController<S>>>,
    Path(organizer_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: Store + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(error) => return error_response(error),
    };
    let organizer_id = OrganizerId(organizer_id);
    match controller
        .delete_organizer_profile(&actor, &organizer_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

/// Optional JSON body: an empty body means defaults, anything else must parse.
pub(crate) fn optional_body<T>(body: &Bytes) -> Result<T, AdmissionError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    Json::<T>::from_bytes(body)
        .map(|Json(request)| request)
        .map_err(|rejection| AdmissionError::InvalidArgument(rejection.body_text()))
}

/// Caller identity from `x-user-id` and a comma-separated `x-user-roles` header.
pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Result<UserIdentity, AdmissionError> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AdmissionError::InvalidArgument(format!("missing {USER_ID_HEADER} header")))?;

    let roles = match headers
        .get(USER_ROLES_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        Some(raw) => raw
            .split(',')
            .filter(|role| !role.trim().is_empty())
            .map(str::parse::<Role>)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    Ok(UserIdentity::new(user_id, roles))
}

pub(crate) fn error_response(error: AdmissionError) -> Response {
    let status = match &error {
        AdmissionError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        AdmissionError::MissingConfiguration { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AdmissionError::EventOnHold { .. }
        | AdmissionError::IllegalTransition { .. }
        | AdmissionError::AlreadyRegistered { .. } => StatusCode::CONFLICT,
        AdmissionError::NotRegistered { .. } => StatusCode::NOT_FOUND,
        AdmissionError::Forbidden { .. } => StatusCode::FORBIDDEN,
        AdmissionError::StoreRead(_) | AdmissionError::StoreWrite(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        AdmissionError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, Json(payload)).into_response()
}
