use serde::{Deserialize, Serialize};

// ============= Message Types =============

/// A single chat message sent to a completion capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Segmentation error: {0}")]
    Segmentation(String),

    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index is empty")]
    EmptyIndex,

    #[error("Corpus mismatch: {chunks} chunks but {rows} index rows")]
    CorpusMismatch { chunks: usize, rows: usize },

    #[error("Index error: {0}")]
    Index(String),

    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Map service error: {0}")]
    MapService(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wording safe to show an end user.
    ///
    /// Internal detail stays in the logs; configuration and input problems are
    /// the only ones the caller can act on.
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidInput(msg) => format!("Invalid request: {}", msg),
            AppError::Configuration(_) => {
                "The service is not configured correctly. Please contact the administrator."
                    .to_string()
            }
            AppError::Timeout(_) => {
                "The question could not be answered in time. Please try again later.".to_string()
            }
            _ => "The question could not be answered. Please try again later.".to_string(),
        }
    }
}

impl From<zoneqa_vector::Error> for AppError {
    fn from(err: zoneqa_vector::Error) -> Self {
        match err {
            zoneqa_vector::Error::DimensionMismatch { expected, actual } => {
                AppError::DimensionMismatch { expected, actual }
            }
            zoneqa_vector::Error::EmptyIndex => AppError::EmptyIndex,
            zoneqa_vector::Error::InvalidArgument(msg) => AppError::InvalidInput(msg),
            zoneqa_vector::Error::Io(e) => AppError::Io(e),
            other => AppError::Index(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
