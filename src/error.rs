use crate::models::input::ValidationError;

pub type Result<T> = std::result::Result<T, EquityError>;

#[derive(Debug, thiserror::Error)]
pub enum EquityError {
    #[error("DB error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("weights are locked for feature {0}")]
    WeightsLocked(String),
    #[error("no weight votes to apply for feature {0}")]
    NoVotes(String),
    #[error("member {0} is not active")]
    InactiveMember(String),
    #[error("settings error: {0}")]
    Settings(String),
}

impl EquityError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        EquityError::NotFound {
            kind,
            id: id.into(),
        }
    }
}
