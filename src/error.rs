//! Error taxonomy surfaced to callers.
//!
//! Only extraction, identification, validation and not-found conditions reach
//! the client as errors. LLM call failures during resolution or similar
//! generation are converted to fixed fallback strings at the call site and the
//! pipeline "succeeds" with degraded content. No failure is retried.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  /// Missing/invalid multipart fields, or payload that is not a PDF.
  #[error("invalid upload: {0}")]
  BadUpload(String),
  /// Unreadable file, empty result, or the OCR stub sentinel.
  #[error("text extraction failed: {0}")]
  Extraction(String),
  /// LLM error or "no exercises found" during identification.
  #[error("exercise identification failed: {0}")]
  Identification(String),
  /// Requested count out of range.
  #[error("invalid selection: {0}")]
  SelectionValidation(String),
  /// Unknown session or exercise id, or similars requested before a solution exists.
  #[error("not found: {0}")]
  NotFound(String),
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let status = match &self {
      AppError::BadUpload(_) => StatusCode::BAD_REQUEST,
      AppError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
      AppError::Identification(_) => StatusCode::BAD_GATEWAY,
      AppError::SelectionValidation(_) => StatusCode::BAD_REQUEST,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
    };
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
