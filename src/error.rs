use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinmanError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("No suggestions computed yet: run a search first")]
    SessionNotInitialized,

    #[error("No more suggestions available")]
    SuggestionsExhausted,

    #[error("Background task failed: {0}")]
    TaskFailed(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FinmanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_failure_is_an_error() {
        let failure = dialoguer::Error::IO(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "not a terminal",
        ));
        let err: FinmanError = failure.into();
        assert!(matches!(err, FinmanError::Prompt(_)));
        assert!(err.to_string().starts_with("Prompt error:"));
    }
}
