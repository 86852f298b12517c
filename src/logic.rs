//! Core pipeline shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Identification: extracted PDF text -> numbered LLM reply -> session
//!   - Selection + resolution: pick k unanswered exercises, solve each once
//!   - Similar generation: new practice exercises for a solved one, eagerly resolved
//!   - Answered listing and session reset
//!
//! Every operation is a read-modify-write transaction on the session store,
//! guarded by the per-session lock in `AppState`. LLM calls happen one at a
//! time, with no fan-out and no retries; resolution failures degrade to a
//! fixed fallback string instead of erroring.

use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::Prompts;
use crate::domain::{Exercise, SelectionMode, SessionData, SimilarExercise};
use crate::error::AppError;
use crate::gemini::GenerativeClient;
use crate::parser::{parse_numbered_list, IDENTIFICATION_ERROR_SENTINEL};
use crate::state::AppState;
use crate::util::{fill_template, trunc_for_log};

/// Returned to the user when a resolution call fails; also cached as the
/// record's solution, so `answered` does not imply "successfully solved".
pub const RESOLUTION_FALLBACK: &str =
  "Não foi possível gerar a resolução para este exercício.";

/// Stand-in reply when similar generation fails; carries no numbered list, so
/// it parses to zero similars downstream.
pub const SIMILAR_FALLBACK: &str = "Não foi possível gerar exercícios similares.";

pub const DEFAULT_SIMILAR_QUANTITY: usize = 2;

/// Identify exercises in already-extracted text and create a fresh session.
///
/// Hard-errors when the LLM is unavailable, fails, or finds no exercises;
/// no session is created in that case.
#[instrument(level = "info", skip(state, pdf_text), fields(text_len = pdf_text.len()))]
pub async fn identify_and_store(
  state: &AppState,
  pdf_text: &str,
) -> Result<(String, SessionData), AppError> {
  let client = state
    .gemini
    .as_ref()
    .ok_or_else(|| AppError::Identification("no LLM client configured (GEMINI_API_KEY unset)".into()))?;

  let prompt = fill_template(&state.prompts.identify_template, &[("pdf_text", pdf_text)]);
  let reply = match client.generate(&prompt).await {
    Ok(t) => t,
    Err(e) => {
      error!(target: "exercise", error = %e, "Identification call failed");
      IDENTIFICATION_ERROR_SENTINEL.to_string()
    }
  };

  let texts = parse_numbered_list(&reply);
  if texts.is_empty() {
    return Err(AppError::Identification(
      "the model could not identify any exercise in the PDF".into(),
    ));
  }

  let session_id = Uuid::new_v4().to_string();
  let data = SessionData::from_texts(texts);
  info!(target: "exercise", %session_id, count = data.exercises.len(), "Session created from identified exercises");

  let lock = state.session_lock(&session_id).await;
  let _held = lock.lock().await;
  state.store.put(&session_id, data.clone()).await;
  Ok((session_id, data))
}

/// Full upload pipeline: extract text for the declared category, then identify.
#[instrument(level = "info", skip(state, bytes), fields(size = bytes.len()))]
pub async fn upload_and_identify(
  state: &AppState,
  bytes: &[u8],
  category: crate::domain::PdfCategory,
) -> Result<(String, SessionData), AppError> {
  let text = crate::extract::extract_text(bytes, category)?;
  identify_and_store(state, &text).await
}

/// Pick `count` unanswered exercises per `mode` and resolve each one.
///
/// Validation errors leave the session untouched. Each resolved record is
/// marked answered exactly once; cached solutions are returned without a new
/// LLM call.
#[instrument(level = "info", skip(state), fields(%session_id, count = count, mode = ?mode))]
pub async fn select_and_resolve(
  state: &AppState,
  session_id: &str,
  count: usize,
  mode: SelectionMode,
) -> Result<(Vec<Exercise>, SessionData), AppError> {
  let lock = state.session_lock(session_id).await;
  let _held = lock.lock().await;

  let mut data = state
    .store
    .get(session_id)
    .await
    .ok_or_else(|| AppError::NotFound(format!("unknown session: {}", session_id)))?;

  let unanswered = data.unanswered_ids();
  if count < 1 || count > unanswered.len() {
    return Err(AppError::SelectionValidation(format!(
      "count must be between 1 and {} (got {})",
      unanswered.len(),
      count
    )));
  }

  let chosen: Vec<usize> = match mode {
    SelectionMode::Sequential => unanswered[..count].to_vec(),
    SelectionMode::Random => unanswered
      .choose_multiple(&mut rand::thread_rng(), count)
      .copied()
      .collect(),
  };
  info!(target: "exercise", %session_id, chosen = ?chosen, "Exercises selected for resolution");

  let mut resolved = Vec::with_capacity(chosen.len());
  for id in chosen {
    let ex = data.get_mut(id).ok_or_else(|| {
      AppError::NotFound(format!("exercise {} disappeared from session", id))
    })?;
    resolve_exercise_record(state.gemini.as_ref(), &state.prompts, ex).await;
    let snapshot = ex.clone();
    data.answered_ids.insert(id);
    resolved.push(snapshot);
  }

  state.store.put(session_id, data.clone()).await;
  Ok((resolved, data))
}

/// Generate `quantity` similar exercises for an already-solved record and
/// resolve each of them eagerly. The batch replaces any previous similars on
/// the record. Preconditions violated -> NotFound, no side effects.
#[instrument(level = "info", skip(state), fields(%session_id, exercise_id = exercise_id, quantity = quantity))]
pub async fn generate_similar(
  state: &AppState,
  session_id: &str,
  exercise_id: usize,
  quantity: usize,
) -> Result<Vec<SimilarExercise>, AppError> {
  let lock = state.session_lock(session_id).await;
  let _held = lock.lock().await;

  let mut data = state
    .store
    .get(session_id)
    .await
    .ok_or_else(|| AppError::NotFound(format!("unknown session: {}", session_id)))?;

  let (original, solution) = match data.get(exercise_id) {
    Some(ex) => match &ex.solution {
      Some(sol) => (ex.text.clone(), sol.clone()),
      None => {
        return Err(AppError::NotFound(format!(
          "exercise {} has no solution yet; resolve it first",
          exercise_id
        )))
      }
    },
    None => {
      return Err(AppError::NotFound(format!("unknown exercise id: {}", exercise_id)))
    }
  };

  let prompt = fill_template(
    &state.prompts.similar_template,
    &[
      ("quantity", &quantity.to_string()),
      ("exercise", &original),
      ("solution", &solution),
    ],
  );
  let reply = match &state.gemini {
    Some(client) => match client.generate(&prompt).await {
      Ok(t) => t,
      Err(e) => {
        error!(target: "exercise", %session_id, exercise_id, error = %e, "Similar generation failed; no similars produced");
        SIMILAR_FALLBACK.to_string()
      }
    },
    None => {
      warn!(target: "exercise", %session_id, exercise_id, "No LLM client; no similars produced");
      SIMILAR_FALLBACK.to_string()
    }
  };

  let parsed = parse_numbered_list(&reply);
  if parsed.is_empty() {
    warn!(target: "exercise", %session_id, exercise_id, reply = %trunc_for_log(&reply, 120), "Similar reply parsed to zero exercises");
  }

  let mut similars = Vec::with_capacity(parsed.len());
  for text in parsed {
    let solution = resolve_free_text(state.gemini.as_ref(), &state.prompts, &text).await;
    similars.push(SimilarExercise { text, solution });
  }

  // get() succeeded above, the record is still there.
  if let Some(ex) = data.get_mut(exercise_id) {
    ex.similar = similars.clone();
  }
  state.store.put(session_id, data).await;
  info!(target: "exercise", %session_id, exercise_id, produced = similars.len(), "Similar exercises generated and resolved");
  Ok(similars)
}

/// All exercises already answered in this session, in identification order.
#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn list_answered(state: &AppState, session_id: &str) -> Result<Vec<Exercise>, AppError> {
  let data = state
    .store
    .get(session_id)
    .await
    .ok_or_else(|| AppError::NotFound(format!("unknown session: {}", session_id)))?;
  Ok(
    data
      .exercises
      .iter()
      .filter(|e| data.answered_ids.contains(&e.id))
      .cloned()
      .collect(),
  )
}

/// Discard all server-side state for a session (start-page semantics).
/// Deleting an unknown session is a no-op.
#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn reset_session(state: &AppState, session_id: &str) {
  let lock = state.session_lock(session_id).await;
  {
    let _held = lock.lock().await;
    state.store.delete(session_id).await;
  }
  state.forget_session_lock(session_id).await;
  info!(target: "exercise", %session_id, "Session discarded");
}

// -------- Resolution internals --------

/// Resolve one exercise record with memoization: a populated solution is
/// returned unchanged with no external call. The record is marked answered in
/// all cases, including when the call fails and the fallback string is cached.
pub(crate) async fn resolve_exercise_record(
  client: Option<&Arc<dyn GenerativeClient>>,
  prompts: &Prompts,
  ex: &mut Exercise,
) -> String {
  if let Some(sol) = &ex.solution {
    info!(target: "exercise", id = ex.id, "Solution already cached; skipping LLM call");
    ex.answered = true;
    return sol.clone();
  }

  let solution = resolve_free_text(client, prompts, &ex.text).await;
  ex.solution = Some(solution.clone());
  ex.answered = true;
  solution
}

/// One resolution round-trip for arbitrary exercise text. Any failure (or an
/// absent client) yields the fixed fallback string, never an error.
pub(crate) async fn resolve_free_text(
  client: Option<&Arc<dyn GenerativeClient>>,
  prompts: &Prompts,
  text: &str,
) -> String {
  let Some(client) = client else {
    warn!(target: "exercise", "No LLM client; returning resolution fallback");
    return RESOLUTION_FALLBACK.to_string();
  };

  let prompt = fill_template(&prompts.resolve_template, &[("exercise", text)]);
  match client.generate(&prompt).await {
    Ok(t) => t,
    Err(e) => {
      error!(target: "exercise", error = %e, "Resolution call failed; returning fallback");
      RESOLUTION_FALLBACK.to_string()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::PdfCategory;
  use crate::gemini::GenerativeClient;
  use crate::parser::NO_EXERCISES_MARKER;
  use crate::store::MemorySessionStore;
  use async_trait::async_trait;
  use std::collections::VecDeque;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use tokio::sync::Mutex;

  /// Scripted client: pops canned replies in order and counts calls.
  struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
  }

  impl ScriptedClient {
    fn new(replies: Vec<Result<String, String>>) -> Arc<Self> {
      Arc::new(Self { replies: Mutex::new(replies.into()), calls: AtomicUsize::new(0) })
    }

    fn call_count(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }
  }

  #[async_trait]
  impl GenerativeClient for ScriptedClient {
    async fn generate(&self, _prompt: &str) -> Result<String, String> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      self
        .replies
        .lock()
        .await
        .pop_front()
        .unwrap_or_else(|| Err("script exhausted".into()))
    }
  }

  fn state_with(client: Arc<ScriptedClient>) -> AppState {
    AppState::with_parts(
      Arc::new(MemorySessionStore::new()),
      Some(client),
      Prompts::default(),
    )
  }

  fn numbered(texts: &[&str]) -> String {
    texts
      .iter()
      .enumerate()
      .map(|(i, t)| format!("{}. {}", i + 1, t))
      .collect::<Vec<_>>()
      .join("\n")
  }

  #[tokio::test]
  async fn identification_creates_zero_based_session() {
    let client = ScriptedClient::new(vec![Ok(numbered(&["q-a", "q-b"]))]);
    let state = state_with(client.clone());

    let (sid, data) = identify_and_store(&state, "some pdf text").await.unwrap();
    assert_eq!(data.exercises.len(), 2);
    assert_eq!(data.exercises[0].id, 0);
    assert_eq!(data.exercises[1].id, 1);
    assert!(data.exercises.iter().all(|e| !e.answered && e.solution.is_none()));
    assert!(state.store.get(&sid).await.is_some());
    assert_eq!(client.call_count(), 1);
  }

  #[tokio::test]
  async fn identification_failure_is_a_hard_error() {
    let client = ScriptedClient::new(vec![Err("boom".into())]);
    let state = state_with(client);
    let err = identify_and_store(&state, "text").await.unwrap_err();
    assert!(matches!(err, AppError::Identification(_)));
  }

  #[tokio::test]
  async fn no_exercises_marker_is_a_hard_error() {
    let client = ScriptedClient::new(vec![Ok(format!("Olá.\n{}", NO_EXERCISES_MARKER))]);
    let state = state_with(client);
    let err = identify_and_store(&state, "text").await.unwrap_err();
    assert!(matches!(err, AppError::Identification(_)));
  }

  #[tokio::test]
  async fn selection_count_boundaries_are_enforced() {
    let client = ScriptedClient::new(vec![
      Ok(numbered(&["a", "b", "c", "d", "e"])),
      Ok("sol-1".into()),
      Ok("sol-2".into()),
      Ok("sol-3".into()),
      Ok("sol-4".into()),
      Ok("sol-5".into()),
    ]);
    let state = state_with(client);
    let (sid, _) = identify_and_store(&state, "text").await.unwrap();

    for bad in [0usize, 6] {
      let err = select_and_resolve(&state, &sid, bad, SelectionMode::Sequential)
        .await
        .unwrap_err();
      assert!(matches!(err, AppError::SelectionValidation(_)));
    }
    // Rejected requests must not have mutated anything.
    let data = state.store.get(&sid).await.unwrap();
    assert!(data.answered_ids.is_empty());

    let (resolved, data) = select_and_resolve(&state, &sid, 5, SelectionMode::Sequential)
      .await
      .unwrap();
    assert_eq!(resolved.len(), 5);
    assert!(data.exercises.iter().all(|e| e.answered));
    assert_eq!(data.answered_ids.len(), 5);
  }

  #[tokio::test]
  async fn sequential_mode_returns_lowest_unanswered_ids_in_order() {
    let client = ScriptedClient::new(vec![
      Ok(numbered(&["a", "b", "c", "d"])),
      Ok("s0".into()),
      Ok("s1".into()),
      Ok("s2".into()),
    ]);
    let state = state_with(client);
    let (sid, _) = identify_and_store(&state, "text").await.unwrap();

    let (first, _) = select_and_resolve(&state, &sid, 1, SelectionMode::Sequential)
      .await
      .unwrap();
    assert_eq!(first[0].id, 0);

    let (next, _) = select_and_resolve(&state, &sid, 2, SelectionMode::Sequential)
      .await
      .unwrap();
    assert_eq!(next.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2]);
  }

  #[tokio::test]
  async fn random_mode_returns_k_distinct_unanswered_ids() {
    let client = ScriptedClient::new(vec![
      Ok(numbered(&["a", "b", "c", "d", "e"])),
      Ok("s".into()),
      Ok("s".into()),
      Ok("s".into()),
    ]);
    let state = state_with(client);
    let (sid, _) = identify_and_store(&state, "text").await.unwrap();

    let (resolved, _) = select_and_resolve(&state, &sid, 3, SelectionMode::Random)
      .await
      .unwrap();
    let mut ids: Vec<usize> = resolved.iter().map(|e| e.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 3);
    assert!(ids.iter().all(|id| *id < 5));
  }

  #[tokio::test]
  async fn resolution_is_memoized_per_record() {
    let client = ScriptedClient::new(vec![Ok("the solution".into())]);
    let prompts = Prompts::default();
    let dyn_client: Arc<dyn GenerativeClient> = client.clone();
    let mut ex = Exercise::new(0, "solve it".into());

    let first = resolve_exercise_record(Some(&dyn_client), &prompts, &mut ex).await;
    let second = resolve_exercise_record(Some(&dyn_client), &prompts, &mut ex).await;

    assert_eq!(first, "the solution");
    assert_eq!(second, "the solution");
    assert_eq!(client.call_count(), 1);
    assert!(ex.answered);
  }

  #[tokio::test]
  async fn failed_resolution_caches_fallback_and_marks_answered() {
    let client = ScriptedClient::new(vec![
      Ok(numbered(&["only one"])),
      Err("llm down".into()),
    ]);
    let state = state_with(client);
    let (sid, _) = identify_and_store(&state, "text").await.unwrap();

    let (resolved, data) = select_and_resolve(&state, &sid, 1, SelectionMode::Sequential)
      .await
      .unwrap();
    assert_eq!(resolved[0].solution.as_deref(), Some(RESOLUTION_FALLBACK));
    assert!(data.exercises[0].answered);
    assert!(data.answered_ids.contains(&0));
  }

  #[tokio::test]
  async fn similars_require_an_existing_solution() {
    let client = ScriptedClient::new(vec![Ok(numbered(&["a", "b"]))]);
    let state = state_with(client.clone());
    let (sid, _) = identify_and_store(&state, "text").await.unwrap();

    let err = generate_similar(&state, &sid, 0, 2).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // Precondition failure must leave the session unmodified.
    let data = state.store.get(&sid).await.unwrap();
    assert!(data.answered_ids.is_empty());
    assert!(data.exercises.iter().all(|e| e.similar.is_empty()));
    // Only the identification call happened.
    assert_eq!(client.call_count(), 1);
  }

  #[tokio::test]
  async fn similars_are_parsed_and_eagerly_resolved() {
    let client = ScriptedClient::new(vec![
      Ok(numbered(&["original"])),
      Ok("original solution".into()),
      Ok(numbered(&["similar one", "similar two"])),
      Ok("sim sol 1".into()),
      Ok("sim sol 2".into()),
    ]);
    let state = state_with(client.clone());
    let (sid, _) = identify_and_store(&state, "text").await.unwrap();
    select_and_resolve(&state, &sid, 1, SelectionMode::Sequential)
      .await
      .unwrap();

    let similars = generate_similar(&state, &sid, 0, 2).await.unwrap();
    assert_eq!(similars.len(), 2);
    assert_eq!(similars[0].text, "similar one");
    assert_eq!(similars[0].solution, "sim sol 1");
    assert_eq!(similars[1].solution, "sim sol 2");

    // Cached on the record too.
    let data = state.store.get(&sid).await.unwrap();
    assert_eq!(data.exercises[0].similar.len(), 2);
    assert_eq!(client.call_count(), 5);
  }

  #[tokio::test]
  async fn unknown_session_is_not_found_everywhere() {
    let client = ScriptedClient::new(vec![]);
    let state = state_with(client);

    let err = select_and_resolve(&state, "nope", 1, SelectionMode::Sequential)
      .await
      .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = generate_similar(&state, "nope", 0, 2).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = list_answered(&state, "nope").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
  }

  #[tokio::test]
  async fn end_to_end_identify_select_answer_flow() {
    let client = ScriptedClient::new(vec![
      Ok(numbered(&["first exercise", "second exercise"])),
      Ok("step-by-step".into()),
    ]);
    let state = state_with(client);

    let (sid, data) = identify_and_store(&state, "two exercises in here").await.unwrap();
    assert_eq!(data.exercises.len(), 2);

    let (resolved, data) = select_and_resolve(&state, &sid, 1, SelectionMode::Sequential)
      .await
      .unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].id, 0);
    assert_eq!(resolved[0].solution.as_deref(), Some("step-by-step"));
    assert!(data.exercises[0].answered);
    assert!(!data.exercises[1].answered);
    assert_eq!(data.answered_ids.iter().copied().collect::<Vec<_>>(), vec![0]);

    let answered = list_answered(&state, &sid).await.unwrap();
    assert_eq!(answered.len(), 1);
    assert_eq!(answered[0].id, 0);

    reset_session(&state, &sid).await;
    assert!(state.store.get(&sid).await.is_none());
  }

  #[tokio::test]
  async fn upload_rejects_unextractable_bytes_before_any_llm_call() {
    let client = ScriptedClient::new(vec![]);
    let state = state_with(client.clone());
    let err = upload_and_identify(&state, b"not a pdf", PdfCategory::DigitalText)
      .await
      .unwrap_err();
    assert!(matches!(err, AppError::Extraction(_)));
    assert_eq!(client.call_count(), 0);
  }
}
