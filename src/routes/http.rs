//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs include parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Multipart, Query, State},
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::domain::PdfCategory;
use crate::error::AppError;
use crate::logic::{self, DEFAULT_SIMILAR_QUANTITY};
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

/// Multipart upload: `pdf_file` (the document) + `category` (extraction strategy).
#[instrument(level = "info", skip(state, multipart))]
pub async fn http_post_upload(
  State(state): State<Arc<AppState>>,
  mut multipart: Multipart,
) -> Result<Json<UploadOut>, AppError> {
  let mut pdf: Option<Vec<u8>> = None;
  let mut category: Option<PdfCategory> = None;

  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| AppError::BadUpload(e.to_string()))?
  {
    let name = field.name().map(str::to_string);
    match name.as_deref() {
      Some("pdf_file") => {
        let bytes = field
          .bytes()
          .await
          .map_err(|e| AppError::BadUpload(e.to_string()))?;
        pdf = Some(bytes.to_vec());
      }
      Some("category") => {
        let text = field
          .text()
          .await
          .map_err(|e| AppError::BadUpload(e.to_string()))?;
        category = Some(
          PdfCategory::parse(&text)
            .ok_or_else(|| AppError::BadUpload(format!("unknown category: {}", text)))?,
        );
      }
      _ => {}
    }
  }

  let bytes = pdf.ok_or_else(|| AppError::BadUpload("missing 'pdf_file' field".into()))?;
  if !bytes.starts_with(b"%PDF") {
    return Err(AppError::BadUpload("only PDF files are accepted".into()));
  }
  let category =
    category.ok_or_else(|| AppError::BadUpload("missing 'category' field".into()))?;

  let (session_id, data) = logic::upload_and_identify(&state, &bytes, category).await?;
  info!(target: "exercise", %session_id, total = data.exercises.len(), "HTTP upload identified exercises");
  Ok(Json(UploadOut {
    session_id,
    total: data.exercises.len(),
    exercises: to_summaries(&data),
  }))
}

#[instrument(level = "info", skip(state, body), fields(session_id = %body.session_id, count = body.count, mode = ?body.mode))]
pub async fn http_post_select(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SelectIn>,
) -> Result<Json<SelectOut>, AppError> {
  let (resolved, data) =
    logic::select_and_resolve(&state, &body.session_id, body.count, body.mode).await?;
  info!(target: "exercise", session_id = %body.session_id, resolved = resolved.len(), "HTTP select resolved exercises");
  Ok(Json(SelectOut {
    results: to_resolved(&resolved),
    remaining: data.unanswered_ids().len(),
    answered_ids: data.answered_ids.iter().copied().collect(),
  }))
}

#[instrument(level = "info", skip(state, body), fields(session_id = %body.session_id, exercise_id = body.exercise_id))]
pub async fn http_post_similar(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SimilarIn>,
) -> Result<Json<SimilarOut>, AppError> {
  let quantity = body.quantity.unwrap_or(DEFAULT_SIMILAR_QUANTITY);
  let similars =
    logic::generate_similar(&state, &body.session_id, body.exercise_id, quantity).await?;
  info!(target: "exercise", session_id = %body.session_id, exercise_id = body.exercise_id, produced = similars.len(), "HTTP similars served");
  Ok(Json(SimilarOut {
    exercise_id: body.exercise_id,
    similars: to_similar_items(&similars),
  }))
}

#[instrument(level = "info", skip(state), fields(session_id = %q.session_id))]
pub async fn http_get_answered(
  State(state): State<Arc<AppState>>,
  Query(q): Query<AnsweredQuery>,
) -> Result<Json<AnsweredOut>, AppError> {
  let answered = logic::list_answered(&state, &q.session_id).await?;
  Ok(Json(AnsweredOut { answered: to_answered_items(&answered) }))
}

#[instrument(level = "info", skip(state, body), fields(session_id = %body.session_id))]
pub async fn http_post_reset(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ResetIn>,
) -> Result<Json<ResetOut>, AppError> {
  logic::reset_session(&state, &body.session_id).await;
  Ok(Json(ResetOut { ok: true }))
}
