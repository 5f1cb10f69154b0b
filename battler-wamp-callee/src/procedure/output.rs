use battler_wamp_values::{
    Dictionary,
    Integer,
    List,
    Value,
};

use crate::invocation::{
    InvocationProgress,
    InvocationResult,
};

/// A value produced by a procedure.
///
/// Every output is normalized into a [`InvocationResult`] before being sent:
/// 1. [`ProcedureOutput::Empty`] has no arguments at all.
/// 1. [`ProcedureOutput::Value`] is the single positional argument.
/// 1. [`ProcedureOutput::Arguments`] is the positional argument list itself.
/// 1. [`ProcedureOutput::Result`] and [`ProcedureOutput::Progress`] are used verbatim.
///
/// Streaming procedures additionally use the variant to decide how the output is sent. See
/// [`StreamingRunner`][`crate::runner::StreamingRunner`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum ProcedureOutput {
    #[default]
    Empty,
    Value(Value),
    Arguments(List),
    Result(InvocationResult),
    Progress(InvocationProgress),
}

impl ProcedureOutput {
    /// Normalizes the output into a result.
    pub fn into_result(self) -> InvocationResult {
        match self {
            Self::Empty => InvocationResult::default(),
            Self::Value(value) => InvocationResult::arguments(List::from_iter([value])),
            Self::Arguments(arguments) => InvocationResult::arguments(arguments),
            Self::Result(result) => result,
            Self::Progress(progress) => progress.into(),
        }
    }

    /// Normalizes the output into a progressive result.
    pub fn into_progress(self) -> InvocationProgress {
        match self {
            Self::Progress(progress) => progress,
            output => output.into_result().into(),
        }
    }
}

impl From<()> for ProcedureOutput {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}

impl From<Value> for ProcedureOutput {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Integer> for ProcedureOutput {
    fn from(value: Integer) -> Self {
        Self::Value(value.into())
    }
}

impl From<String> for ProcedureOutput {
    fn from(value: String) -> Self {
        Self::Value(value.into())
    }
}

impl From<&str> for ProcedureOutput {
    fn from(value: &str) -> Self {
        Self::Value(value.into())
    }
}

impl From<bool> for ProcedureOutput {
    fn from(value: bool) -> Self {
        Self::Value(value.into())
    }
}

impl From<Dictionary> for ProcedureOutput {
    fn from(value: Dictionary) -> Self {
        Self::Value(value.into())
    }
}

impl From<List> for ProcedureOutput {
    fn from(value: List) -> Self {
        Self::Arguments(value)
    }
}

impl From<InvocationResult> for ProcedureOutput {
    fn from(value: InvocationResult) -> Self {
        Self::Result(value)
    }
}

impl From<InvocationProgress> for ProcedureOutput {
    fn from(value: InvocationProgress) -> Self {
        Self::Progress(value)
    }
}

impl<T> From<Option<T>> for ProcedureOutput
where
    T: Into<ProcedureOutput>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => Self::Empty,
        }
    }
}

macro_rules! tuple_output {
    ($($name:ident => $value:ident),+) => {
        impl<$($name),+> From<($($name,)+)> for ProcedureOutput
        where
            $($name: Into<Value>,)+
        {
            fn from(($($value,)+): ($($name,)+)) -> Self {
                Self::Arguments(List::from_iter([$($value.into()),+]))
            }
        }
    };
}

tuple_output!(A => a, B => b);
tuple_output!(A => a, B => b, C => c);
tuple_output!(A => a, B => b, C => c, D => d);
