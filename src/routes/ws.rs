//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use base64::Engine;
use tracing::{debug, error, info, instrument};

use crate::domain::PdfCategory;
use crate::logic::{self, DEFAULT_SIMILAR_QUANTITY};
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "estudai_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "estudai_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target = "estudai_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "estudai_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "estudai_backend", "WebSocket disconnected");
}

#[instrument(level = "info", skip(msg, state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::Upload { pdf_base64, category } => {
      let Some(category) = PdfCategory::parse(&category) else {
        return ServerWsMessage::Error { message: format!("unknown category: {}", category) };
      };
      let bytes = match base64::engine::general_purpose::STANDARD.decode(pdf_base64) {
        Ok(b) => b,
        Err(e) => return ServerWsMessage::Error { message: format!("invalid base64: {}", e) },
      };
      if !bytes.starts_with(b"%PDF") {
        return ServerWsMessage::Error { message: "only PDF files are accepted".into() };
      }
      match logic::upload_and_identify(state, &bytes, category).await {
        Ok((session_id, data)) => {
          tracing::info!(target: "exercise", %session_id, total = data.exercises.len(), "WS upload identified exercises");
          ServerWsMessage::Identified { session_id, exercises: to_summaries(&data) }
        }
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::SelectResolve { session_id, count, mode } => {
      match logic::select_and_resolve(state, &session_id, count, mode).await {
        Ok((resolved, data)) => {
          tracing::info!(target: "exercise", %session_id, resolved = resolved.len(), "WS select resolved exercises");
          ServerWsMessage::Resolved {
            results: to_resolved(&resolved),
            remaining: data.unanswered_ids().len(),
            answered_ids: data.answered_ids.iter().copied().collect(),
          }
        }
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::GenerateSimilar { session_id, exercise_id, quantity } => {
      let quantity = quantity.unwrap_or(DEFAULT_SIMILAR_QUANTITY);
      match logic::generate_similar(state, &session_id, exercise_id, quantity).await {
        Ok(similars) => {
          tracing::info!(target: "exercise", %session_id, exercise_id, produced = similars.len(), "WS similars served");
          ServerWsMessage::Similar { exercise_id, similars: to_similar_items(&similars) }
        }
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::ListAnswered { session_id } => {
      match logic::list_answered(state, &session_id).await {
        Ok(answered) => ServerWsMessage::Answered { answered: to_answered_items(&answered) },
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::ResetSession { session_id } => {
      logic::reset_session(state, &session_id).await;
      ServerWsMessage::SessionReset
    }
  }
}
