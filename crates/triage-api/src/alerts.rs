//! Handlers for `/alerts` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/alerts` | Optional `status`, `read`, `follow`, `limit`, `offset` |
//! | `POST`   | `/alerts` | Body: [`NewAlert`]; returns 201 + alert with observables |
//! | `GET`    | `/alerts/{id}` | Alert with its observables |
//! | `PATCH`  | `/alerts/{id}` | Body: [`AlertUpdate`] |
//! | `DELETE` | `/alerts/{id}` | Cascades to observables and unreferenced blobs; 204 |
//! | `POST`   | `/alerts/{id}/markAsRead` | 204 |
//! | `POST`   | `/alerts/{id}/markAsUnread` | 204 |
//! | `POST`   | `/alerts/{id}/follow` | 204 |
//! | `POST`   | `/alerts/{id}/unfollow` | 204 |
//! | `POST`   | `/alerts/{id}/merge/{caseId}` | Returns the updated case |
//! | `POST`   | `/alerts/{id}/createCase` | Returns 201 + the new case |

use axum::{
  Extension, Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use triage_core::{
  alert::{Alert, AlertFilter, AlertUpdate, AlertWithObservables, NewAlert},
  case::Case,
  permission::Actor,
  store::TriageStore,
  workflow::AlertWorkflow,
};
use uuid::Uuid;

use crate::{
  error::ApiError,
  extract::{ApiJson, ApiPath, ApiQuery},
};

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /alerts[?status=New][&read=false][&follow=true][&limit=..][&offset=..]`
pub async fn list<S: TriageStore>(
  State(workflow): State<AlertWorkflow<S>>,
  Extension(actor): Extension<Actor>,
  ApiQuery(filter): ApiQuery<AlertFilter>,
) -> Result<Json<Vec<Alert>>, ApiError> {
  Ok(Json(workflow.list(&actor, filter).await?))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /alerts`
pub async fn create<S: TriageStore>(
  State(workflow): State<AlertWorkflow<S>>,
  Extension(actor): Extension<Actor>,
  ApiJson(body): ApiJson<NewAlert>,
) -> Result<impl IntoResponse, ApiError> {
  let created = workflow.create(&actor, body).await?;
  Ok((StatusCode::CREATED, Json(created)))
}

// ─── Single alert ────────────────────────────────────────────────────────────

/// `GET /alerts/{id}`
pub async fn get_one<S: TriageStore>(
  State(workflow): State<AlertWorkflow<S>>,
  Extension(actor): Extension<Actor>,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<AlertWithObservables>, ApiError> {
  Ok(Json(workflow.get(&actor, id).await?))
}

/// `PATCH /alerts/{id}`
pub async fn update_one<S: TriageStore>(
  State(workflow): State<AlertWorkflow<S>>,
  Extension(actor): Extension<Actor>,
  ApiPath(id): ApiPath<Uuid>,
  ApiJson(changes): ApiJson<AlertUpdate>,
) -> Result<Json<AlertWithObservables>, ApiError> {
  Ok(Json(workflow.update(&actor, id, changes).await?))
}

/// `DELETE /alerts/{id}`
pub async fn delete_one<S: TriageStore>(
  State(workflow): State<AlertWorkflow<S>>,
  Extension(actor): Extension<Actor>,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
  workflow.delete(&actor, id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Flags ───────────────────────────────────────────────────────────────────

/// `POST /alerts/{id}/markAsRead`
pub async fn mark_as_read<S: TriageStore>(
  State(workflow): State<AlertWorkflow<S>>,
  Extension(actor): Extension<Actor>,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
  workflow.mark_as_read(&actor, id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /alerts/{id}/markAsUnread`
pub async fn mark_as_unread<S: TriageStore>(
  State(workflow): State<AlertWorkflow<S>>,
  Extension(actor): Extension<Actor>,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
  workflow.mark_as_unread(&actor, id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /alerts/{id}/follow`
pub async fn follow<S: TriageStore>(
  State(workflow): State<AlertWorkflow<S>>,
  Extension(actor): Extension<Actor>,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
  workflow.follow(&actor, id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /alerts/{id}/unfollow`
pub async fn unfollow<S: TriageStore>(
  State(workflow): State<AlertWorkflow<S>>,
  Extension(actor): Extension<Actor>,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
  workflow.unfollow(&actor, id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Cases ───────────────────────────────────────────────────────────────────

/// `POST /alerts/{id}/merge/{caseId}`
pub async fn merge_in_case<S: TriageStore>(
  State(workflow): State<AlertWorkflow<S>>,
  Extension(actor): Extension<Actor>,
  ApiPath((id, case_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<Json<Case>, ApiError> {
  Ok(Json(workflow.merge_in_case(&actor, id, case_id).await?))
}

/// `POST /alerts/{id}/createCase`
pub async fn create_case<S: TriageStore>(
  State(workflow): State<AlertWorkflow<S>>,
  Extension(actor): Extension<Actor>,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
  let case = workflow.create_case(&actor, id).await?;
  Ok((StatusCode::CREATED, Json(case)))
}
