//! Extractors whose rejections answer in the API's error shape.
//!
//! axum's own [`Json`](axum::Json), [`Path`](axum::extract::Path) and
//! [`Query`](axum::extract::Query) reject with a plain-text body. These
//! wrappers run the same extraction and turn the rejection into
//! [`ApiError::BadRequest`].

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

/// JSON request body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Typed path segments.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Typed query string.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
