use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

// axum's own extractors, with rejections rendered in the error envelope.
// A malformed path id is `NOT_FOUND`; a malformed query or body is `VALIDATION_ERROR`.

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
