//! Parsing the LLM's numbered free-text reply into a list of exercise strings.
//!
//! The identification and similar-generation prompts both ask for output of
//! the form "1. ...\n2. ...". This parser is purely syntactic: a line matching
//! `^\s*\d{1,2}\.` opens a new exercise, any other non-empty line continues
//! the open one, and everything before the first numbered line is discarded.
//!
//! Known limitation: this is best-effort and brittle against model output that
//! deviates from the requested numbering format (e.g. "1)" or bullet lists).
//! We keep it strict on purpose rather than guessing at other shapes.

use std::sync::OnceLock;

use regex::Regex;

/// Literal phrase the identification prompt asks the model to emit when the
/// document contains no recognizable exercises.
pub const NO_EXERCISES_MARKER: &str = "Nenhuma questão encontrada.";

/// Internal sentinel standing in for a failed identification call.
pub const IDENTIFICATION_ERROR_SENTINEL: &str = "ERRO_NA_IDENTIFICACAO";

fn item_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"^\s*\d{1,2}\.").expect("static regex"))
}

/// Parse a numbered free-text reply into ordered exercise strings.
///
/// The error sentinel, or the no-exercises marker anywhere in the text, yields
/// an empty list (never a one-element list containing the phrase itself).
/// Multi-line exercise bodies are rejoined with single newlines; finished
/// items are trimmed and empty ones dropped.
pub fn parse_numbered_list(reply: &str) -> Vec<String> {
  if reply == IDENTIFICATION_ERROR_SENTINEL || reply.contains(NO_EXERCISES_MARKER) {
    return Vec::new();
  }

  let mut items: Vec<String> = Vec::new();
  for line in reply.trim().lines() {
    if item_re().is_match(line) {
      // New item: keep the text after the first period, marker stripped.
      let after = line.splitn(2, '.').nth(1).unwrap_or("").trim();
      items.push(after.to_string());
    } else if !line.trim().is_empty() {
      // Continuation line belongs to the currently open item; lines before
      // the first numbered line (preamble) are dropped.
      if let Some(last) = items.last_mut() {
        last.push('\n');
        last.push_str(line.trim());
      }
    }
  }

  items
    .into_iter()
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn well_formed_list_parses_one_to_one() {
    let reply = "1. Calcule 2x + 5 = 15.\n2. Derive f(x) = x^2.\n3. Simplifique 4/8.";
    let items = parse_numbered_list(reply);
    assert_eq!(items, vec![
      "Calcule 2x + 5 = 15.",
      "Derive f(x) = x^2.",
      "Simplifique 4/8.",
    ]);
  }

  #[test]
  fn no_exercises_marker_yields_empty() {
    let reply = "Analisei o texto.\nNenhuma questão encontrada.\nObrigado.";
    assert!(parse_numbered_list(reply).is_empty());
  }

  #[test]
  fn error_sentinel_yields_empty() {
    assert!(parse_numbered_list(IDENTIFICATION_ERROR_SENTINEL).is_empty());
  }

  #[test]
  fn continuation_lines_join_with_single_newline() {
    let items = parse_numbered_list("1. Solve x+1=2\nfor integer x");
    assert_eq!(items, vec!["Solve x+1=2\nfor integer x"]);
  }

  #[test]
  fn preamble_before_first_item_is_discarded() {
    let items = parse_numbered_list("Aqui estão as questões:\n\n1. Primeira questão");
    assert_eq!(items, vec!["Primeira questão"]);
  }

  #[test]
  fn two_digit_markers_and_indentation_are_accepted() {
    let items = parse_numbered_list("  10. décima questão\n11. décima primeira");
    assert_eq!(items, vec!["décima questão", "décima primeira"]);
  }

  #[test]
  fn bare_marker_lines_are_dropped() {
    // "3." with no body opens an item that ends up empty and is removed.
    let items = parse_numbered_list("1. primeira\n3.\n4. quarta");
    assert_eq!(items, vec!["primeira", "quarta"]);
  }

  #[test]
  fn blank_lines_between_items_are_ignored() {
    let items = parse_numbered_list("1. uma\n\n\n2. duas");
    assert_eq!(items, vec!["uma", "duas"]);
  }
}
