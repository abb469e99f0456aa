use std::fmt;

use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

/// A single failed input constraint, reported against the form field it
/// belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for FieldError {}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Invalid email or password. Please try again.")]
    InvalidCredentials,
    #[error("This email is already registered. Try logging in instead.")]
    AlreadyRegistered,
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Auth,
    RemoteFailure,
    NotFound,
    Config,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("{}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{message}")]
    Remote { message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Auth(_) => ErrorKind::Auth,
            Error::Remote { .. } => ErrorKind::RemoteFailure,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Error::Remote {
            message: message.into(),
        }
    }

    pub fn task_not_found(id: Uuid) -> Self {
        Error::NotFound {
            entity: "task",
            id: id.to_string(),
        }
    }

    pub fn profile_not_found(user_id: Uuid) -> Self {
        Error::NotFound {
            entity: "profile",
            id: user_id.to_string(),
        }
    }

    /// Field errors for a validation failure, empty for every other kind.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Error::Validation(errors) => errors,
            _ => &[],
        }
    }
}

impl From<FieldError> for Error {
    fn from(err: FieldError) -> Self {
        Error::Validation(vec![err])
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::remote(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::remote(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::remote(err.to_string())
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_is_closed() {
        assert_eq!(Error::from(AuthError::NotAuthenticated).kind(), ErrorKind::Auth);
        assert_eq!(Error::remote("boom").kind(), ErrorKind::RemoteFailure);
        assert_eq!(Error::task_not_found(Uuid::nil()).kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::from(FieldError::new("title", "Title is required")).kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_validation_message_joins_fields() {
        let err = Error::Validation(vec![
            FieldError::new("title", "Title is required"),
            FieldError::new("description", "Description must be less than 500 characters"),
        ]);
        assert_eq!(
            err.to_string(),
            "Title is required; Description must be less than 500 characters"
        );
        assert_eq!(err.field_errors().len(), 2);
    }
}
