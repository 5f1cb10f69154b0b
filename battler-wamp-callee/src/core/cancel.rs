use std::fmt::Display;

use anyhow::Error;
use battler_wamp_values::{
    Dictionary,
    Value,
};

/// How an active procedure call should be canceled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CallCancelMode {
    /// The callee should stop politely. A response is still allowed.
    #[default]
    Skip,
    /// The callee should terminate on a best-effort basis. The caller waits for acknowledgement in
    /// the form of an ERROR or RESULT.
    Kill,
    /// The callee should terminate. The caller has already received an ERROR, so no response is
    /// expected or delivered.
    KillNoWait,
}

impl CallCancelMode {
    /// Whether the caller still expects a terminal response from the callee.
    pub fn expects_response(&self) -> bool {
        match self {
            Self::Skip | Self::Kill => true,
            Self::KillNoWait => false,
        }
    }
}

impl TryFrom<&str> for CallCancelMode {
    type Error = Error;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "skip" => Ok(Self::Skip),
            "kill" => Ok(Self::Kill),
            "killnowait" => Ok(Self::KillNoWait),
            _ => Err(Error::msg(format!("invalid call cancel mode: {value}"))),
        }
    }
}

impl From<CallCancelMode> for &'static str {
    fn from(value: CallCancelMode) -> Self {
        match value {
            CallCancelMode::Skip => "skip",
            CallCancelMode::Kill => "kill",
            CallCancelMode::KillNoWait => "killnowait",
        }
    }
}

impl Display for CallCancelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).into())
    }
}

/// A peer-initiated cancellation signal for an open invocation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Interrupt {
    pub mode: CallCancelMode,
}

impl Interrupt {
    /// Creates a new interrupt with the given cancel mode.
    pub fn new(mode: CallCancelMode) -> Self {
        Self { mode }
    }

    /// Reads an interrupt out of INTERRUPT options.
    ///
    /// A missing mode falls back to [`CallCancelMode::Skip`].
    pub fn from_options(options: &Dictionary) -> Result<Self, Error> {
        let mode = match options.get("mode") {
            Some(Value::String(mode)) => CallCancelMode::try_from(mode.as_str())?,
            Some(_) => return Err(Error::msg("interrupt mode must be a string")),
            None => CallCancelMode::default(),
        };
        Ok(Self { mode })
    }
}

impl Display for Interrupt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mode={}", self.mode)
    }
}
