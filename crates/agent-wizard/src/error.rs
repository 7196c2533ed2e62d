//! Error types surfaced by the wizard library.
//!
//! Each category maps to one place in the UI: validation errors are shown
//! inline before any request, API and poll errors in a dismissible banner,
//! storage errors never leave `drafts`, and `WizardError` indicates a
//! programming error.

use thiserror::Error;

/// Fallback shown when the backend gives no usable message.
pub const GENERIC_FAILURE: &str = "Request failed";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message} (HTTP {status})")]
    Http { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("invalid backend url '{0}'")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("{0}")]
    Failed(String),
    #[error("timed out waiting for ticket {ticket_id} after {attempts} attempt(s)")]
    TimedOut { ticket_id: String, attempts: u32 },
    #[error(transparent)]
    Transport(#[from] ApiError),
}

/// Misuse of the wizard store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("wizard store used outside of an active wizard flow")]
    OutsideFlow,
}

/// Screen-level input problems caught before any network call.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("description must not be empty")]
    EmptyDescription,
    #[error("{schema} schema needs at least one field")]
    EmptySchema { schema: &'static str },
    #[error("{schema} schema field '{field}' is not a valid identifier")]
    InvalidFieldName { schema: &'static str, field: String },
    #[error("choose a composer model first")]
    MissingComposerModel,
    #[error("generate code before {action}")]
    MissingCode { action: &'static str },
    #[error("agent name must not be empty")]
    EmptyName,
    #[error("missing input field '{0}'")]
    MissingInput(String),
    #[error("chat needs at least one message")]
    NoMessages,
    #[error(transparent)]
    Parameters(#[from] ParameterError),
}

#[derive(Debug, Error, PartialEq)]
pub enum ParameterError {
    #[error("parameters '{a}' and '{b}' are mutually exclusive")]
    MutuallyExclusive { a: String, b: String },
    #[error("parameter '{name}' must be a number")]
    NotANumber { name: String },
    #[error("parameter '{name}' must be an integer")]
    NotAnInteger { name: String },
    #[error("parameter '{name}' value {value} is outside [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("parameter '{name}' value {value} is not one of the allowed choices")]
    InvalidChoice { name: String, value: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DialogError {
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),
    #[error("provider '{provider}' has no model '{model}'")]
    UnknownModel { provider: String, model: String },
    #[error("provider '{0}' has no models")]
    NoModels(String),
    #[error("model '{model}' has no built-in tool '{tool}'")]
    UnknownBuiltInTool { model: String, tool: String },
    #[error("no model selected")]
    NothingSelected,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure of a long-running wizard action.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error(transparent)]
    Wizard(#[from] WizardError),
    #[error("agent code failed: {0}")]
    Execution(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_shows_backend_message() {
        let e = ApiError::Http {
            status: 404,
            message: "Model not found".into(),
        };
        assert_eq!(e.to_string(), "Model not found (HTTP 404)");
        assert_eq!(e.status(), Some(404));
    }

    #[test]
    fn poll_failure_displays_message_verbatim() {
        assert_eq!(PollError::Failed("boom".into()).to_string(), "boom");
    }
}
