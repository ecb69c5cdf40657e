// Wizard error taxonomy

use thiserror::Error;

/// Errors raised by a form record when a field write is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("field '{key}' expects a {expected} value")]
    TypeMismatch { key: String, expected: &'static str },

    #[error("'{value}' is not an option for field '{key}'")]
    InvalidChoice { key: String, value: String },
}

/// Errors returned by a submission sink.
///
/// Every variant is retryable from the caller's point of view: the wizard state is left
/// untouched and the user stays on the final step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("submission rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("submission transport failed: {0}")]
    Transport(String),

    #[error("submission response could not be decoded: {0}")]
    InvalidResponse(String),

    #[error("submission payload could not be encoded: {0}")]
    Payload(String),

    #[error("submission sink unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    /// The engine was built with an unusable step list. Not recoverable by the user.
    #[error("wizard misconfigured: {0}")]
    Configuration(String),

    /// An illegal transition was attempted. The rendering layer should have disabled the
    /// control that triggered it.
    #[error("invalid step transition: {0}")]
    InvalidStep(String),

    #[error(transparent)]
    Field(#[from] FieldError),

    /// The external sink failed; form data is preserved for a retry.
    #[error(transparent)]
    Submission(#[from] SinkError),
}

impl WizardError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, WizardError::Submission(_))
    }
}
