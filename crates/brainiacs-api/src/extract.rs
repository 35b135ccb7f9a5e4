//! Extractors whose rejections use the API error envelope.
//!
//! Plain `Json`/`Query`/`Path` reject with a text body; these wrap them so a
//! malformed body, query or id is a `VALIDATION_ERROR` like any other.

use axum::extract::FromRequest;
use axum::extract::FromRequestParts;
use brainiacs_common::error::BrainiacsError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(BrainiacsError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(BrainiacsError))]
pub struct ApiQuery<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(BrainiacsError))]
pub struct ApiPath<T>(pub T);
