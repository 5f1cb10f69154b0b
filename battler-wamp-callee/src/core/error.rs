use battler_wamp_values::{
    Dictionary,
    List,
};
use thiserror::Error;

use crate::core::uri::Uri;

/// A basic error that occurs while handling an invocation.
#[derive(Debug, Error)]
pub enum BasicError {
    /// A generic resource was not found.
    #[error("{0}")]
    NotFound(String),
    /// An invalid argument was passed.
    #[error("{0}")]
    InvalidArgument(String),
    /// The operation is not allowed based on process configuration.
    #[error("{0}")]
    NotAllowed(String),
    /// The operation is not allowed based on user permissions.
    #[error("{0}")]
    PermissionDenied(String),
    /// Some internal error occurred.
    ///
    /// Should only be used when there is no other error variant that describes the error, since
    /// the message is very vague and not very useful for debugging.
    #[error("{0}")]
    Internal(String),
}

impl BasicError {
    /// The trailing URI component for the error.
    pub fn uri_component(&self) -> &str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotAllowed(_) => "not_allowed",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Internal(_) => "internal",
        }
    }
}

/// An interaction error that occurs while processing a WAMP message.
///
/// Interaction errors are clearly defined in the WAMP standard and are reserved for errors that
/// peers must be able to parse easily.
#[derive(Debug, Error)]
pub enum InteractionError {
    /// The incoming message violates the WAMP protocol.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    /// The registration being referenced does not exist.
    #[error("no such registration")]
    NoSuchRegistration,
    /// The invocation was canceled by the caller.
    #[error("canceled")]
    Canceled,
}

impl InteractionError {
    /// The trailing URI component for the error.
    pub fn uri_component(&self) -> &str {
        match self {
            Self::ProtocolViolation(_) => "protocol_violation",
            Self::NoSuchRegistration => "no_such_registration",
            Self::Canceled => "canceled",
        }
    }
}

/// An application-defined error, sent to the caller exactly as described.
///
/// Procedures return this error (through [`anyhow::Error`]) when they want full control over the
/// ERROR message. Any other error is reported with a standard URI.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct WampError {
    reason: Uri,
    message: String,
    arguments: List,
    arguments_keyword: Dictionary,
}

impl WampError {
    /// Creates a new error with a reason and message.
    pub fn new<S>(reason: Uri, message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            reason,
            message: message.into(),
            arguments: List::default(),
            arguments_keyword: Dictionary::default(),
        }
    }

    /// Attaches positional arguments to the error.
    pub fn with_arguments(mut self, arguments: List) -> Self {
        self.arguments = arguments;
        self
    }

    /// Attaches keyword arguments to the error.
    pub fn with_arguments_keyword(mut self, arguments_keyword: Dictionary) -> Self {
        self.arguments_keyword = arguments_keyword;
        self
    }

    /// The error URI.
    pub fn reason(&self) -> &Uri {
        &self.reason
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Positional arguments sent with the error.
    pub fn arguments(&self) -> &List {
        &self.arguments
    }

    /// Keyword arguments sent with the error.
    pub fn arguments_keyword(&self) -> &Dictionary {
        &self.arguments_keyword
    }

    pub(crate) fn into_parts(self) -> (Uri, String, List, Dictionary) {
        (
            self.reason,
            self.message,
            self.arguments,
            self.arguments_keyword,
        )
    }
}

impl From<&anyhow::Error> for WampError {
    fn from(value: &anyhow::Error) -> Self {
        match value.downcast_ref::<WampError>() {
            Some(error) => error.clone(),
            None => Self::new(Uri::for_error(value), value.to_string()),
        }
    }
}

impl From<anyhow::Error> for WampError {
    fn from(value: anyhow::Error) -> Self {
        Self::from(&value)
    }
}
