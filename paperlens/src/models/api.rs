use serde::{Deserialize, Serialize};

// ──────────────────────────── Chat ────────────────────────────

/// Register of the generated answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplanationLevel {
    Beginner,
    #[default]
    Student,
    Researcher,
}

/// One caller-supplied conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `user` or `assistant`.
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Missing and empty ids are both rejected by the handler.
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub explanation_level: ExplanationLevel,
    #[serde(default)]
    pub chat_history: Option<Vec<ChatMessage>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<String>,
    pub document_id: String,
}

// ──────────────────────────── Documents ────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentUploadResponse {
    pub document_id: String,
    pub filename: String,
    pub pages: usize,
    pub chunks: usize,
    pub message: String,
}

// ──────────────────────────── Misc ────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub docs: String,
}
