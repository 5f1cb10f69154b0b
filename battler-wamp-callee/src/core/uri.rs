use std::{
    fmt::Display,
    sync::LazyLock,
};

use anyhow::Error;
use regex::Regex;
use serde::{
    Deserialize,
    Serialize,
    de::{
        Unexpected,
        Visitor,
    },
};
use thiserror::Error;

use crate::{
    core::error::{
        BasicError,
        InteractionError,
        WampError,
    },
    invocation::InvocationError,
};

/// Error for an invalid URI.
#[derive(Debug, Error)]
#[error("invalid URI")]
pub struct InvalidUri;

/// Validates a strict URI.
pub fn validate_strict_uri<S>(uri: S) -> Result<(), InvalidUri>
where
    S: AsRef<str>,
{
    static RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^([0-9a-z_]+\.)*([0-9a-z_]+)$").unwrap());
    if !RE.is_match(uri.as_ref()) {
        return Err(InvalidUri);
    }
    Ok(())
}

/// A uniform resource identifier.
///
/// This crate only produces URIs for errors and reads the called procedure out of invocation
/// details, so wildcard URIs are not modeled.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Uri(String);

impl Uri {
    /// Constructs a URI directly from a value known to be valid, skipping validation.
    pub(crate) fn from_known<S>(value: S) -> Self
    where
        S: Into<String>,
    {
        Self(value.into())
    }

    /// The standard error URI for the given error.
    ///
    /// Errors that do not describe themselves are reported as invalid arguments, since the
    /// procedure rejected the call it was given.
    pub fn for_error(error: &Error) -> Self {
        if let Some(error) = error.downcast_ref::<WampError>() {
            return error.reason().clone();
        }
        if let Some(error) = error.downcast_ref::<BasicError>() {
            return Self::from_known(format!("wamp.error.{}", error.uri_component()));
        }
        if let Some(error) = error.downcast_ref::<InteractionError>() {
            return Self::from_known(format!("wamp.error.{}", error.uri_component()));
        }
        if let Some(InvocationError::Interrupted(_)) = error.downcast_ref::<InvocationError>() {
            return Self::from_known(format!(
                "wamp.error.{}",
                InteractionError::Canceled.uri_component()
            ));
        }
        Self::from_known("wamp.error.invalid_argument")
    }
}

impl Display for Uri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for Uri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Uri {
    type Error = InvalidUri;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_strict_uri(&value)?;
        Ok(Self(value))
    }
}

impl TryFrom<&str> for Uri {
    type Error = InvalidUri;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        validate_strict_uri(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl From<Uri> for String {
    fn from(value: Uri) -> Self {
        value.0
    }
}

struct UriVisitor;

impl<'de> Visitor<'de> for UriVisitor {
    type Value = Uri;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "a URI")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Uri::try_from(v).map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
    }
}

impl<'de> Deserialize<'de> for Uri {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_str(UriVisitor)
    }
}
