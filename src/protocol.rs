//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{Exercise, SelectionMode, SessionData, SimilarExercise};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    /// PDF bytes travel as base64 over the socket.
    Upload {
        #[serde(rename = "pdfBase64")]
        pdf_base64: String,
        category: String,
    },
    SelectResolve {
        #[serde(rename = "sessionId")]
        session_id: String,
        count: usize,
        mode: SelectionMode,
    },
    GenerateSimilar {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "exerciseId")]
        exercise_id: usize,
        quantity: Option<usize>,
    },
    ListAnswered {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    ResetSession {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Identified {
        #[serde(rename = "sessionId")]
        session_id: String,
        exercises: Vec<ExerciseSummary>,
    },
    Resolved {
        results: Vec<ResolvedOut>,
        remaining: usize,
        #[serde(rename = "answeredIds")]
        answered_ids: Vec<usize>,
    },
    Similar {
        #[serde(rename = "exerciseId")]
        exercise_id: usize,
        similars: Vec<SimilarOutItem>,
    },
    Answered {
        answered: Vec<AnsweredOutItem>,
    },
    SessionReset,
    Error {
        message: String,
    },
}

/// One identified exercise, before any resolution.
#[derive(Debug, Serialize)]
pub struct ExerciseSummary {
    pub id: usize,
    pub text: String,
}

/// One resolved exercise as displayed to the user.
#[derive(Debug, Serialize)]
pub struct ResolvedOut {
    pub id: usize,
    pub text: String,
    pub solution: String,
}

#[derive(Debug, Serialize)]
pub struct SimilarOutItem {
    pub text: String,
    pub solution: String,
}

#[derive(Debug, Serialize)]
pub struct AnsweredOutItem {
    pub id: usize,
    pub text: String,
    pub solution: Option<String>,
    pub similars: Vec<SimilarOutItem>,
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct UploadOut {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub exercises: Vec<ExerciseSummary>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct SelectIn {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub count: usize,
    pub mode: SelectionMode,
}

#[derive(Serialize)]
pub struct SelectOut {
    pub results: Vec<ResolvedOut>,
    pub remaining: usize,
    #[serde(rename = "answeredIds")]
    pub answered_ids: Vec<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SimilarIn {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "exerciseId")]
    pub exercise_id: usize,
    pub quantity: Option<usize>,
}

#[derive(Serialize)]
pub struct SimilarOut {
    #[serde(rename = "exerciseId")]
    pub exercise_id: usize,
    pub similars: Vec<SimilarOutItem>,
}

#[derive(Debug, Deserialize)]
pub struct AnsweredQuery {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Serialize)]
pub struct AnsweredOut {
    pub answered: Vec<AnsweredOutItem>,
}

#[derive(Debug, Deserialize)]
pub struct ResetIn {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Serialize)]
pub struct ResetOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

// --- Conversions from domain types ---

pub fn to_summaries(data: &SessionData) -> Vec<ExerciseSummary> {
    data.exercises
        .iter()
        .map(|e| ExerciseSummary { id: e.id, text: e.text.clone() })
        .collect()
}

pub fn to_resolved(exercises: &[Exercise]) -> Vec<ResolvedOut> {
    exercises
        .iter()
        .map(|e| ResolvedOut {
            id: e.id,
            text: e.text.clone(),
            solution: e.solution.clone().unwrap_or_default(),
        })
        .collect()
}

pub fn to_similar_items(similars: &[SimilarExercise]) -> Vec<SimilarOutItem> {
    similars
        .iter()
        .map(|s| SimilarOutItem { text: s.text.clone(), solution: s.solution.clone() })
        .collect()
}

pub fn to_answered_items(exercises: &[Exercise]) -> Vec<AnsweredOutItem> {
    exercises
        .iter()
        .map(|e| AnsweredOutItem {
            id: e.id,
            text: e.text.clone(),
            solution: e.solution.clone(),
            similars: to_similar_items(&e.similar),
        })
        .collect()
}
