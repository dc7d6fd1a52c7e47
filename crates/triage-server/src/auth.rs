//! HTTP Basic authentication resolving each request to an [`Actor`].

use std::{collections::HashMap, sync::Arc};

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  Json,
  extract::{Request, State},
  http::{HeaderMap, HeaderValue, StatusCode, header},
  middleware::Next,
  response::{IntoResponse, Response},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde_json::json;
use thiserror::Error;
use triage_core::permission::Actor;

use crate::UserConfig;

#[derive(Debug, Error)]
pub enum AuthError {
  #[error("missing or malformed credentials")]
  MissingCredentials,
  #[error("invalid username or password")]
  InvalidCredentials,
}

impl IntoResponse for AuthError {
  fn into_response(self) -> Response {
    let body = json!({ "type": "AuthenticationError", "message": self.to_string() });
    let mut res = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    res.headers_mut().insert(
      header::WWW_AUTHENTICATE,
      HeaderValue::from_static("Basic realm=\"triage\""),
    );
    res
  }
}

struct Account {
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  password_hash: String,
  actor:         Actor,
}

/// The configured users, keyed by username.
pub struct UserDirectory {
  accounts: HashMap<String, Account>,
}

impl UserDirectory {
  pub fn new(users: &[UserConfig]) -> Self {
    let accounts = users
      .iter()
      .map(|u| {
        let account = Account {
          password_hash: u.password_hash.clone(),
          actor:         Actor::new(
            u.username.clone(),
            u.organisation.clone(),
            u.capabilities.iter().copied(),
          ),
        };
        (u.username.clone(), account)
      })
      .collect();
    Self { accounts }
  }

  pub fn len(&self) -> usize { self.accounts.len() }

  pub fn is_empty(&self) -> bool { self.accounts.is_empty() }

  /// Check the `Authorization: Basic` header and return the matching actor.
  pub fn verify(&self, headers: &HeaderMap) -> Result<Actor, AuthError> {
    let header_val = headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .ok_or(AuthError::MissingCredentials)?;

    let encoded = header_val
      .strip_prefix("Basic ")
      .ok_or(AuthError::MissingCredentials)?;

    let decoded = B64.decode(encoded).map_err(|_| AuthError::MissingCredentials)?;
    let creds = std::str::from_utf8(&decoded).map_err(|_| AuthError::MissingCredentials)?;
    let (username, password) = creds.split_once(':').ok_or(AuthError::MissingCredentials)?;

    let account = self
      .accounts
      .get(username)
      .ok_or(AuthError::InvalidCredentials)?;

    let parsed_hash = PasswordHash::new(&account.password_hash)
      .map_err(|_| AuthError::InvalidCredentials)?;

    Argon2::default()
      .verify_password(password.as_bytes(), &parsed_hash)
      .map_err(|_| AuthError::InvalidCredentials)?;

    Ok(account.actor.clone())
  }
}

/// Middleware: authenticate, then expose the [`Actor`] as a request
/// extension for the API handlers.
pub async fn authenticate(
  State(users): State<Arc<UserDirectory>>,
  mut req: Request,
  next: Next,
) -> Result<Response, AuthError> {
  let actor = users.verify(req.headers()).inspect_err(|e| {
    tracing::debug!(error = %e, uri = %req.uri(), "rejected request");
  })?;
  req.extensions_mut().insert(actor);
  Ok(next.run(req).await)
}
