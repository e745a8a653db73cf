use thiserror::Error;

use crate::json::{DirectiveError, ExtractError};

/// Failure taxonomy observed by the executor.
///
/// `Cancelled` always propagates to the top of the executor and halts the
/// sequence; it is never conflated with ordinary failure. The other variants
/// are retried when the action carries a retry budget, then either swallowed
/// and logged (error-tolerant actions) or re-raised fatally.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("no JSON payload found")]
    NoJsonFound,

    #[error("JSON payload could not be parsed: {0}")]
    ParseFailure(String),

    #[error("sequence '{0}' not found")]
    SequenceNotFound(String),

    #[error("malformed directive: {0}")]
    MalformedDirective(String),

    #[error("input injection failed: {0}")]
    InjectionFailed(String),

    #[error("clipboard is empty or unavailable")]
    ClipboardUnavailable,

    #[error("execution cancelled")]
    Cancelled,

    #[error("'{action}' failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        action: String,
        attempts: u32,
        #[source]
        source: Box<ActionError>,
    },

    #[error("maximum sequence nesting depth ({0}) exceeded")]
    DepthExceeded(usize),
}

impl ActionError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ActionError::Cancelled)
    }
}

impl From<ExtractError> for ActionError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::NoJsonFound => ActionError::NoJsonFound,
            ExtractError::Unparseable(msg) => ActionError::ParseFailure(msg),
        }
    }
}

impl From<DirectiveError> for ActionError {
    fn from(err: DirectiveError) -> Self {
        ActionError::MalformedDirective(err.to_string())
    }
}
