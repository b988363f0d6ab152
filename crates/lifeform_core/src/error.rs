use thiserror::Error;

/// Errors surfaced by the metabolism entry points.
#[derive(Debug, Error)]
pub enum MetabolismError {
    /// Malformed or missing input. No state was changed.
    #[error("{0}")]
    Validation(String),

    /// The reply target does not exist or was already answered. No state was changed.
    #[error("Question not found or already answered")]
    NotFoundOrAlreadyAnswered,

    /// The reasoning provider failed or timed out. The operation wrote nothing.
    #[error("reasoning provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Persisted state broke one of its structural guarantees.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl MetabolismError {
    /// Whether the caller sent something wrong, as opposed to a server-side failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MetabolismError::Validation(_) | MetabolismError::NotFoundOrAlreadyAnswered
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classes() {
        assert!(MetabolismError::Validation("text must be provided".into()).is_client_error());
        assert!(MetabolismError::NotFoundOrAlreadyAnswered.is_client_error());
        assert!(!MetabolismError::ProviderUnavailable("timeout".into()).is_client_error());
        assert!(!MetabolismError::InvariantViolation("two pending".into()).is_client_error());
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(
            MetabolismError::NotFoundOrAlreadyAnswered.to_string(),
            "Question not found or already answered"
        );
    }
}
