//! REST endpoints for driving booking sessions.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::booking::draft::{FieldUpdate, FieldValue};
use crate::booking::model::{Language, LegalDocument, ServiceCategory};
use crate::booking::schema::{self, FieldName, Schema};
use crate::booking::sequencer::{BookingSession, FlowEvent, SessionView, SubmitOutcome};
use crate::config::AppConfig;
use crate::dispatch::Dispatcher;
use crate::error::{BookingError, SessionError};
use crate::session::{self, SessionHandle, SessionStore};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub dispatcher: Arc<dyn Dispatcher>,
    pub config: Arc<AppConfig>,
}

/// Build the Axum router with the booking REST routes.
pub fn booking_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/bookings", post(create_session))
        .route("/api/bookings/{id}", get(get_session))
        .route("/api/bookings/{id}/service", post(select_service))
        .route("/api/bookings/{id}/fields", post(update_field))
        .route("/api/bookings/{id}/legal", post(acknowledge))
        .route("/api/bookings/{id}/next", post(next_step))
        .route("/api/bookings/{id}/back", post(previous_step))
        .route("/api/bookings/{id}/submit", post(submit))
        .route("/api/bookings/{id}/cancel", post(cancel))
        .route("/api/bookings/{id}/restart", post(restart))
        .route("/api/schema/{category}", get(get_schema))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Errors ──────────────────────────────────────────────────────────────

/// Handler error, rendered as `{ error, message, missing? }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Booking session {0} not found")]
    SessionNotFound(Uuid),

    #[error("Unknown service category: {0}")]
    UnknownCategory(String),

    #[error("Malformed request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    missing: Vec<FieldName>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error, missing) = match self {
            Self::SessionNotFound(_) => (StatusCode::NOT_FOUND, "session_not_found", Vec::new()),
            Self::UnknownCategory(_) => (StatusCode::NOT_FOUND, "schema_not_found", Vec::new()),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", Vec::new()),
            Self::Session(SessionError::CapacityReached { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "too_many_sessions", Vec::new())
            }
            Self::Booking(err) => {
                let status = match &err {
                    BookingError::Validation { .. }
                    | BookingError::InvalidValue { .. }
                    | BookingError::UnknownFieldForCategory { .. } => StatusCode::BAD_REQUEST,
                    BookingError::SelectionLimitReached { .. }
                    | BookingError::SubmissionInProgress
                    | BookingError::InvalidTransition { .. } => StatusCode::CONFLICT,
                    BookingError::Dispatch(_) => StatusCode::BAD_GATEWAY,
                    BookingError::SchemaNotFound => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.kind(), err.fields())
            }
        };

        if status.is_server_error() {
            warn!(status = %status, error, message = %message, "Booking request failed");
        } else {
            debug!(status = %status, error, message = %message, "Booking request rejected");
        }

        let body = ErrorBody {
            error,
            message,
            missing,
        };
        (status, Json(body)).into_response()
    }
}

// ── Bodies ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CreateParams {
    service: Option<String>,
    lang: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SelectServiceBody {
    category: String,
}

#[derive(Debug, Deserialize)]
struct UpdateFieldBody {
    field: FieldName,
    value: FieldValue,
}

#[derive(Debug, Deserialize)]
struct LegalBody {
    document: LegalDocument,
    accepted: bool,
}

/// Session view plus the effect of the event that produced it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    field_update: Option<FieldUpdate>,
    #[serde(flatten)]
    session: SessionView,
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "voice-booking",
        "sessions": state.store.len().await,
    }))
}

// ── Sessions ────────────────────────────────────────────────────────────

async fn create_session(
    State(state): State<AppState>,
    Query(params): Query<CreateParams>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let language = params.lang.as_deref().and_then(|l| l.parse::<Language>().ok());
    let context = state.config.workflow_context(language);
    let session = BookingSession::from_query(context, params.service.as_deref());
    let view = session.view();
    state.store.insert(session).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = find(&state, id).await?;
    let view = handle.lock().await.view();
    Ok(Json(view))
}

async fn select_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<SelectServiceBody>, JsonRejection>,
) -> Result<Json<EventResponse>, ApiError> {
    let Json(body) = body?;
    let category: ServiceCategory = body.category.parse().map_err(|reason| {
        BookingError::InvalidValue {
            field: FieldName::ServiceCategory,
            reason,
        }
    })?;
    apply(&state, id, FlowEvent::SelectService { category }).await
}

async fn update_field(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateFieldBody>, JsonRejection>,
) -> Result<Json<EventResponse>, ApiError> {
    let Json(body) = body?;
    let event = FlowEvent::UpdateField {
        field: body.field,
        value: body.value,
    };
    apply(&state, id, event).await
}

async fn acknowledge(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<LegalBody>, JsonRejection>,
) -> Result<Json<EventResponse>, ApiError> {
    let Json(body) = body?;
    let event = FlowEvent::Acknowledge {
        document: body.document,
        accepted: body.accepted,
    };
    apply(&state, id, event).await
}

async fn next_step(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventResponse>, ApiError> {
    apply(&state, id, FlowEvent::Next).await
}

async fn previous_step(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventResponse>, ApiError> {
    apply(&state, id, FlowEvent::Back).await
}

async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventResponse>, ApiError> {
    apply(&state, id, FlowEvent::Cancel).await
}

async fn restart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventResponse>, ApiError> {
    apply(&state, id, FlowEvent::Restart).await
}

async fn submit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = find(&state, id).await?;
    match session::submit(&handle, state.dispatcher.as_ref()).await? {
        SubmitOutcome::Submitted(_) => {}
        SubmitOutcome::Stale => debug!(session_id = %id, "Submission superseded before it completed"),
    }
    let view = handle.lock().await.view();
    Ok(Json(view))
}

// ── Schema ──────────────────────────────────────────────────────────────

async fn get_schema(Path(category): Path<String>) -> Result<Json<&'static Schema>, ApiError> {
    let category = ServiceCategory::from_query(&category)
        .ok_or_else(|| ApiError::UnknownCategory(category.clone()))?;
    Ok(Json(schema::lookup(Some(category))?))
}

// ── Helpers ─────────────────────────────────────────────────────────────

async fn find(state: &AppState, id: Uuid) -> Result<SessionHandle, ApiError> {
    state
        .store
        .get(id)
        .await
        .ok_or(ApiError::SessionNotFound(id))
}

async fn apply(state: &AppState, id: Uuid, event: FlowEvent) -> Result<Json<EventResponse>, ApiError> {
    let handle = find(state, id).await?;
    let mut session = handle.lock().await;
    let outcome = session.apply(event)?;
    Ok(Json(EventResponse {
        field_update: outcome.field_update,
        session: session.view(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::dispatch::LogDispatcher;

    fn app() -> Router {
        booking_routes(AppState {
            store: Arc::new(SessionStore::new(std::time::Duration::from_secs(60))),
            dispatcher: Arc::new(LogDispatcher),
            config: Arc::new(AppConfig::default()),
        })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_session_is_404() {
        let uri = format!("/api/bookings/{}", Uuid::new_v4());
        let response = app()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "session_not_found");
    }

    #[tokio::test]
    async fn schema_lookup_accepts_slugs() {
        let response = app()
            .oneshot(Request::get("/api/schema/workshop").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["category"], "GroupWorkshop");
        assert_eq!(json["fieldDomains"]["preferredSlots"]["max"], 3);

        let response = app()
            .oneshot(Request::get("/api/schema/karaoke").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn full_store_answers_service_unavailable() {
        let app = booking_routes(AppState {
            store: Arc::new(SessionStore::new(std::time::Duration::from_secs(60)).with_max_sessions(1)),
            dispatcher: Arc::new(LogDispatcher),
            config: Arc::new(AppConfig::default()),
        });

        let response = app
            .clone()
            .oneshot(Request::post("/api/bookings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(Request::post("/api/bookings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["error"], "too_many_sessions");
    }

    #[test]
    fn validation_error_lists_missing_fields() {
        let err = ApiError::from(BookingError::Validation {
            step: crate::booking::draft::BookingStep::PersonalInfo,
            missing: vec![FieldName::Email],
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
