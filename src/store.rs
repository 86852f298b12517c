//! Session persistence behind an injected key-value abstraction.
//!
//! The core logic only needs get/put/delete semantics keyed by an opaque
//! session id, so it never assumes in-process memory sharing; a process-local
//! implementation ships as the default, and an external store (Redis, etc.)
//! could be swapped in without touching the pipeline.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::SessionData;

#[async_trait]
pub trait SessionStore: Send + Sync {
  async fn get(&self, session_id: &str) -> Option<SessionData>;
  async fn put(&self, session_id: &str, data: SessionData);
  async fn delete(&self, session_id: &str);
}

/// In-memory implementation; state lives for the life of the process only.
#[derive(Default)]
pub struct MemorySessionStore {
  sessions: RwLock<HashMap<String, SessionData>>,
}

impl MemorySessionStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
  async fn get(&self, session_id: &str) -> Option<SessionData> {
    self.sessions.read().await.get(session_id).cloned()
  }

  async fn put(&self, session_id: &str, data: SessionData) {
    self.sessions.write().await.insert(session_id.to_string(), data);
  }

  async fn delete(&self, session_id: &str) {
    self.sessions.write().await.remove(session_id);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn put_get_delete_roundtrip() {
    let store = MemorySessionStore::new();
    assert!(store.get("s1").await.is_none());

    let data = SessionData::from_texts(vec!["q1".into(), "q2".into()]);
    store.put("s1", data).await;

    let loaded = store.get("s1").await.expect("stored session");
    assert_eq!(loaded.exercises.len(), 2);
    assert_eq!(loaded.exercises[1].id, 1);
    assert!(!loaded.exercises[0].answered);

    store.delete("s1").await;
    assert!(store.get("s1").await.is_none());
  }
}
