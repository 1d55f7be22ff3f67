//! Error taxonomy for the HTTP layer and the storage backends.
//!
//! Every handler returns `Result<_, AppError>`; the response body is always
//! `{ "message": string }`, which is what the web client reads.

use axum::{
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::domain::UpdateError;
use crate::progression::PurchaseError;

#[derive(Debug, Error)]
pub enum StorageError {
  #[error("storage request failed: {0}")]
  Http(#[from] reqwest::Error),
  #[error("storage backend returned {status}: {message}")]
  Backend { status: u16, message: String },
  #[error("stored document could not be decoded: {0}")]
  Decode(String),
  #[error("storage is misconfigured: {0}")]
  Config(String),
}

#[derive(Debug, Error)]
pub enum AppError {
  #[error("{0}")]
  NotFound(String),
  #[error("{0}")]
  InvalidInput(String),
  #[error("{0}")]
  Upstream(String),
  #[error(transparent)]
  Storage(#[from] StorageError),
}

#[derive(Serialize)]
struct ErrorBody {
  message: String,
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      AppError::NotFound(m) => (StatusCode::NOT_FOUND, m),
      AppError::InvalidInput(m) => (StatusCode::BAD_REQUEST, m),
      AppError::Upstream(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
      AppError::Storage(e) => {
        error!(target: "storage", error = %e, "Storage failure");
        (StatusCode::INTERNAL_SERVER_ERROR, "Storage backend unavailable".to_string())
      }
    };
    (status, Json(ErrorBody { message })).into_response()
  }
}

impl From<JsonRejection> for AppError {
  fn from(e: JsonRejection) -> Self {
    AppError::InvalidInput(e.body_text())
  }
}

impl From<PathRejection> for AppError {
  fn from(e: PathRejection) -> Self {
    AppError::InvalidInput(e.body_text())
  }
}

impl From<QueryRejection> for AppError {
  fn from(e: QueryRejection) -> Self {
    AppError::InvalidInput(e.body_text())
  }
}

impl From<UpdateError> for AppError {
  fn from(e: UpdateError) -> Self {
    AppError::InvalidInput(e.to_string())
  }
}

impl From<PurchaseError> for AppError {
  fn from(e: PurchaseError) -> Self {
    AppError::InvalidInput(e.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn taxonomy_maps_to_status_codes() {
    assert_eq!(AppError::NotFound("User not found".into()).into_response().status(), StatusCode::NOT_FOUND);
    assert_eq!(AppError::InvalidInput("bad".into()).into_response().status(), StatusCode::BAD_REQUEST);
    assert_eq!(AppError::Upstream("boom".into()).into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    let storage = AppError::from(StorageError::Decode("x".into()));
    assert_eq!(storage.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
  }
}
