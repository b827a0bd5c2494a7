//! Request extractors

use std::convert::Infallible;

use axum::extract::{FromRequestParts, Path};
use axum::http::header;
use axum::http::request::Parts;

use super::types::ApiError;
use crate::data::files::validate_object_name;
use crate::domain::Digest;
use crate::utils::basic_auth::basic_username;

/// Username from `Authorization: Basic`, or empty
///
/// The password is ignored; the name only labels the registry record.
#[derive(Debug, Clone, Default)]
pub struct Uploader(pub String);

impl<S> FromRequestParts<S> for Uploader
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let username = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(basic_username)
            .unwrap_or_default();
        Ok(Self(username))
    }
}

/// Validated `{name}` path segment of a content store object
#[derive(Debug)]
pub struct ObjectName(pub String);

impl<S> FromRequestParts<S> for ObjectName
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(name) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::bad_request("INVALID_PATH", e.body_text()))?;
        validate_object_name(&name)
            .map_err(|_| ApiError::bad_request("INVALID_NAME", "Invalid file name"))?;
        Ok(Self(name))
    }
}

/// Validated `{identifier}` path segment: non-empty lowercase hex
#[derive(Debug)]
pub struct IdentifierPath(pub String);

impl<S> FromRequestParts<S> for IdentifierPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(identifier) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::bad_request("INVALID_PATH", e.body_text()))?;
        Digest::parse(&identifier)
            .map_err(|e| ApiError::bad_request("INVALID_IDENTIFIER", e.to_string()))?;
        Ok(Self(identifier))
    }
}
