//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error body has the shape `{"type": <code>, "message": <text>}`,
//! where `type` is the stable [`triage_core::Error::code`].

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] triage_core::Error),

  #[error("bad request: {0}")]
  BadRequest(String),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Core(e) => status_of(e),
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
    }
  }

  pub fn code(&self) -> &'static str {
    match self {
      ApiError::Core(e) => e.code(),
      ApiError::BadRequest(_) => "BadRequest",
    }
  }
}

// ─── Extractor rejections ────────────────────────────────────────────────────

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

fn status_of(error: &triage_core::Error) -> StatusCode {
  use triage_core::Error as E;
  match error {
    E::NotFound { .. } => StatusCode::NOT_FOUND,
    E::Forbidden { .. } => StatusCode::FORBIDDEN,
    E::InvalidFormat(_) | E::DecodeError(_) => StatusCode::BAD_REQUEST,
    E::Conflict(_) => StatusCode::CONFLICT,
    E::StorageFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    // An ingestion batch answers with the status of what broke it.
    E::AggregateFailure(inner) => match status_of(inner) {
      s if s.is_server_error() => s,
      _ => StatusCode::BAD_REQUEST,
    },
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    let body = json!({ "type": self.code(), "message": self.to_string() });
    (status, Json(body)).into_response()
  }
}
