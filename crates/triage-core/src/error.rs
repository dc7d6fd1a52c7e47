//! Error types for `triage-core`.

use thiserror::Error;

use crate::permission::Capability;

#[derive(Debug, Error)]
pub enum Error {
  /// An alert, case, template or observable type is absent or not visible to
  /// the acting identity.
  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: String },

  #[error("capability {capability} is required")]
  Forbidden { capability: Capability },

  /// Malformed attachment payload; carries the offending raw text.
  #[error("invalid attachment format: {0:?}")]
  InvalidFormat(String),

  #[error("invalid base64 payload: {0}")]
  DecodeError(#[from] base64::DecodeError),

  #[error("{0}")]
  Conflict(String),

  #[error("storage error: {0}")]
  StorageFailure(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The first failure hit while ingesting a batch of observables.
  #[error("observable ingestion failed: {0}")]
  AggregateFailure(#[source] Box<Error>),
}

impl Error {
  pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
    Self::NotFound { entity, id: id.to_string() }
  }

  pub fn forbidden(capability: Capability) -> Self {
    Self::Forbidden { capability }
  }

  /// Stable category string, independent of the message text.
  pub fn code(&self) -> &'static str {
    match self {
      Self::NotFound { .. } => "NotFound",
      Self::Forbidden { .. } => "AuthorizationError",
      Self::InvalidFormat(_) => "InvalidFormatAttributeError",
      Self::DecodeError(_) => "DecodeError",
      Self::Conflict(_) => "ConflictError",
      Self::StorageFailure(_) => "StorageError",
      Self::AggregateFailure(_) => "AggregateError",
    }
  }

  /// Unwrap [`Error::AggregateFailure`] layers down to the failure that
  /// caused them.
  pub fn root(&self) -> &Error {
    match self {
      Self::AggregateFailure(inner) => inner.root(),
      other => other,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
