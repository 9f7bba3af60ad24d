use thiserror::Error;

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Error taxonomy for the harness.
///
/// `Retriable` and (optionally) `Timeout` are the only transient kinds;
/// everything else is structural and must surface immediately. See
/// [`HarnessError::is_transient`].
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Raised deliberately by driver logic when a candidate page turned
    /// out unusable and the whole operation is worth re-running.
    #[error("retriable: {0}")]
    Retriable(String),
    /// A bounded wait elapsed.
    #[error("timeout waiting for {0}")]
    Timeout(String),
    /// A required DOM anchor, frame, or page state is missing.
    #[error("structural precondition failed: {0}")]
    Structural(String),
    /// The engine does not expose this capability.
    #[error("not supported on this engine: {0}")]
    Unsupported(String),
    #[error("webdriver launch failed: {0}")]
    Launch(String),
    #[error("webdriver command error: {0}")]
    WebDriver(#[from] fantoccini::error::CmdError),
    #[error("webdriver session error: {0}")]
    NewSession(#[from] fantoccini::error::NewSessionError),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl HarnessError {
    /// Whether a [`crate::retry::RetryPolicy`] may re-run the failed
    /// operation. `retry_timeouts` widens the set to automation-layer
    /// timeouts, which policy-wrapped navigation treats as flakiness.
    pub fn is_transient(&self, retry_timeouts: bool) -> bool {
        match self {
            HarnessError::Retriable(_) => true,
            HarnessError::Timeout(_) => retry_timeouts,
            HarnessError::WebDriver(err) if retry_timeouts => {
                err.to_string().to_lowercase().contains("timeout")
            }
            _ => false,
        }
    }

    pub fn retriable(message: impl Into<String>) -> Self {
        HarnessError::Retriable(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retriable_is_always_transient() {
        assert!(HarnessError::retriable("no candidate").is_transient(false));
        assert!(HarnessError::retriable("no candidate").is_transient(true));
    }

    #[test]
    fn timeouts_are_transient_only_when_requested() {
        let err = HarnessError::Timeout("pager".into());
        assert!(!err.is_transient(false));
        assert!(err.is_transient(true));
    }

    #[test]
    fn structural_errors_never_retry() {
        let err = HarnessError::Structural("missing frame".into());
        assert!(!err.is_transient(true));
        let err = HarnessError::Configuration("unknown reader".into());
        assert!(!err.is_transient(true));
    }
}
