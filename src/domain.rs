//! Domain models: PDF categories, selection modes, exercises, and session data.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Content category declared by the user at upload time.
/// Routes the extractor to the strategy best suited for the document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfCategory {
  /// Pure digital text. Page-by-page linear text pull.
  DigitalText,
  /// Mixed text/graphics. Layout-tolerant whole-document pull.
  MixedContent,
  /// Scanned printed book. OCR, not implemented.
  ScannedPrinted,
  /// Scanned handwriting. OCR, not implemented.
  ScannedHandwritten,
}

impl PdfCategory {
  /// Parse the wire value used in multipart form fields (snake_case).
  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "digital_text" => Some(Self::DigitalText),
      "mixed_content" => Some(Self::MixedContent),
      "scanned_printed" => Some(Self::ScannedPrinted),
      "scanned_handwritten" => Some(Self::ScannedHandwritten),
      _ => None,
    }
  }
}

/// How the user wants the next batch of unanswered exercises picked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
  /// First k unanswered records in identification order.
  Sequential,
  /// Uniform sample of k unanswered records, without replacement.
  Random,
}

/// A practice exercise generated from an already-solved one.
/// Solutions are produced eagerly, so the pair is always complete.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimilarExercise {
  pub text: String,
  pub solution: String,
}

/// One exercise identified in the uploaded PDF.
///
/// `id` is zero-based, assigned at identification time, and never renumbered.
/// `answered` flips to true the first time a resolution is requested and stays
/// true; `solution` is written at most once (it may hold the fixed fallback
/// string when the LLM call failed).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Exercise {
  pub id: usize,
  pub text: String,
  pub answered: bool,
  pub solution: Option<String>,
  #[serde(default)]
  pub similar: Vec<SimilarExercise>,
}

impl Exercise {
  pub fn new(id: usize, text: String) -> Self {
    Self { id, text, answered: false, solution: None, similar: Vec::new() }
  }
}

/// All server-side state for one browser session.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionData {
  pub exercises: Vec<Exercise>,
  pub answered_ids: BTreeSet<usize>,
}

impl SessionData {
  /// Build a fresh session from identified exercise texts, ids 0..n.
  pub fn from_texts(texts: Vec<String>) -> Self {
    Self {
      exercises: texts
        .into_iter()
        .enumerate()
        .map(|(i, t)| Exercise::new(i, t))
        .collect(),
      answered_ids: BTreeSet::new(),
    }
  }

  /// Ids of exercises not yet answered, in identification order.
  pub fn unanswered_ids(&self) -> Vec<usize> {
    self
      .exercises
      .iter()
      .filter(|e| !e.answered)
      .map(|e| e.id)
      .collect()
  }

  pub fn get(&self, id: usize) -> Option<&Exercise> {
    self.exercises.iter().find(|e| e.id == id)
  }

  pub fn get_mut(&mut self, id: usize) -> Option<&mut Exercise> {
    self.exercises.iter_mut().find(|e| e.id == id)
  }
}
