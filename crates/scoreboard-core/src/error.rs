#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid date format: {0}")]
    InvalidDateFormat(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
