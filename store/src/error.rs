#[derive(Debug, thiserror::Error, Clone)]
pub enum Error {
    #[error("record not found")]
    NotFound,

    #[error("concurrent write conflict")]
    Conflict,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("record store i/o error: {0}")]
    Io(String),
}

impl Error {
    /// `true` for the two error kinds the reconciler treats as
    /// "retry next tick" rather than a hard failure (spec §7).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict | Error::Io(_))
    }
}
