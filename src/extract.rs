//! PDF text extraction, backed by the `pdf-extract` crate.
//!
//! The user-declared content category selects the strategy:
//! - digital_text: page-by-page linear pull, pages rejoined with newlines
//! - mixed_content: layout-tolerant whole-document pull
//! - scanned_*: OCR placeholder, always fails with a fixed sentinel
//!
//! Any failure here (unreadable bytes, empty text, OCR stub) short-circuits
//! the pipeline before a single LLM call is made.

use tracing::{error, info, instrument};

use crate::domain::PdfCategory;
use crate::error::AppError;
use crate::util::trunc_for_log;

pub const OCR_NOT_IMPLEMENTED: &str = "Texto não extraído: OCR não implementado.";

/// Best-effort plain-text transcription of uploaded PDF bytes.
#[instrument(level = "info", skip(bytes), fields(size = bytes.len()))]
pub fn extract_text(bytes: &[u8], category: PdfCategory) -> Result<String, AppError> {
  let text = match category {
    PdfCategory::DigitalText => extract_linear(bytes)?,
    PdfCategory::MixedContent => extract_layout(bytes)?,
    PdfCategory::ScannedPrinted | PdfCategory::ScannedHandwritten => {
      error!(target: "estudai_backend", ?category, "OCR requested but not implemented");
      return Err(AppError::Extraction(OCR_NOT_IMPLEMENTED.into()));
    }
  };

  if text.trim().is_empty() {
    return Err(AppError::Extraction("PDF produced no text".into()));
  }

  info!(target: "estudai_backend", chars = text.len(), preview = %trunc_for_log(&text, 200), "PDF text extracted");
  Ok(text)
}

/// Page-by-page pull; mirrors reading each page in order and concatenating.
fn extract_linear(bytes: &[u8]) -> Result<String, AppError> {
  let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
    .map_err(|e| AppError::Extraction(e.to_string()))?;
  Ok(pages.join("\n"))
}

/// Whole-document pull; pdf-extract keeps more of the layout ordering intact,
/// which behaves better on documents mixing text and graphics.
fn extract_layout(bytes: &[u8]) -> Result<String, AppError> {
  pdf_extract::extract_text_from_mem(bytes).map_err(|e| AppError::Extraction(e.to_string()))
}
