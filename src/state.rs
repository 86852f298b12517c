//! Application state: session store, prompts, Gemini client, and per-session
//! operation locks.
//!
//! Every logical operation on a session (identify, select+resolve, similars,
//! reset) runs as a read-modify-write transaction against the injected store,
//! serialized by a per-session mutex so concurrent handlers for the same
//! browser session cannot race on the same record.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument};

use crate::config::{load_config_from_env, Prompts};
use crate::gemini::{Gemini, GenerativeClient};
use crate::store::{MemorySessionStore, SessionStore};

pub struct AppState {
  pub store: Arc<dyn SessionStore>,
  pub gemini: Option<Arc<dyn GenerativeClient>>,
  pub prompts: Prompts,
  locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl AppState {
  /// Build state from env: load prompts config, init the session store,
  /// init Gemini if an API key is present.
  #[instrument(level = "info", skip_all)]
  pub fn new() -> Self {
    let prompts = load_config_from_env()
      .map(|c| c.prompts)
      .unwrap_or_default();

    let gemini: Option<Arc<dyn GenerativeClient>> = match Gemini::from_env() {
      Some(g) => {
        info!(target: "estudai_backend", base_url = %g.base_url, model = %g.model, "Gemini enabled.");
        Some(Arc::new(g))
      }
      None => {
        info!(target: "estudai_backend", "Gemini disabled (no GEMINI_API_KEY). Resolutions fall back to fixed text.");
        None
      }
    };

    Self::with_parts(Arc::new(MemorySessionStore::new()), gemini, prompts)
  }

  /// Explicit wiring: used by tests and by alternative entry points that pick
  /// their own store or LLM client.
  pub fn with_parts(
    store: Arc<dyn SessionStore>,
    gemini: Option<Arc<dyn GenerativeClient>>,
    prompts: Prompts,
  ) -> Self {
    Self { store, gemini, prompts, locks: RwLock::new(HashMap::new()) }
  }

  /// Mutex guarding all read-modify-write operations for one session.
  pub async fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
    {
      let locks = self.locks.read().await;
      if let Some(l) = locks.get(session_id) {
        return l.clone();
      }
    }
    let mut locks = self.locks.write().await;
    locks
      .entry(session_id.to_string())
      .or_insert_with(|| Arc::new(Mutex::new(())))
      .clone()
  }

  /// Drop the lock entry when a session is discarded.
  pub async fn forget_session_lock(&self, session_id: &str) {
    self.locks.write().await.remove(session_id);
  }
}
