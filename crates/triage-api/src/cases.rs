//! Handlers for `/cases` and `/attachments` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/cases/{id}` | Case with its observables |
//! | `GET`  | `/attachments/{hash}` | Raw bytes; `hash` is the SHA-256 hex digest |

use axum::{
  Extension, Json,
  extract::State,
  http::header,
  response::IntoResponse,
};
use triage_core::{
  Error,
  attachment::ContentHash,
  case::CaseWithObservables,
  permission::Actor,
  store::TriageStore,
  workflow::AlertWorkflow,
};
use uuid::Uuid;

use crate::{error::ApiError, extract::ApiPath};

/// `GET /cases/{id}`
pub async fn get_one<S: TriageStore>(
  State(workflow): State<AlertWorkflow<S>>,
  Extension(actor): Extension<Actor>,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<CaseWithObservables>, ApiError> {
  Ok(Json(workflow.get_case(&actor, id).await?))
}

/// `GET /attachments/{hash}`
pub async fn attachment<S: TriageStore>(
  State(workflow): State<AlertWorkflow<S>>,
  Extension(actor): Extension<Actor>,
  ApiPath(hash): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
  // A malformed digest can never name a stored blob.
  let hash = ContentHash::parse(&hash).ok_or_else(|| Error::not_found("attachment", &hash))?;
  let bytes = workflow.attachment(&actor, hash).await?;
  Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes))
}
