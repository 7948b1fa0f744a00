use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Backend error: {message}")]
    Backend {
        message: String,
        status: Option<u16>,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Time parse failed for '{input}': {reason}")]
    TimeParse { input: String, reason: String },

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("State lock poisoned")]
    StatePoisoned,
}

impl From<AuditError> for String {
    fn from(e: AuditError) -> Self {
        e.to_string()
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;
