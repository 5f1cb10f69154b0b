use battler_wamp_values::{
    Dictionary,
    List,
};

/// The final result of an invocation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    pub arguments: List,
    pub arguments_keyword: Dictionary,
    /// Additional YIELD options.
    pub options: Dictionary,
}

impl InvocationResult {
    /// Creates a result with only positional arguments.
    pub fn arguments(arguments: List) -> Self {
        Self {
            arguments,
            ..Default::default()
        }
    }

    /// Creates a result with only keyword arguments.
    pub fn arguments_keyword(arguments_keyword: Dictionary) -> Self {
        Self {
            arguments_keyword,
            ..Default::default()
        }
    }
}

impl From<InvocationProgress> for InvocationResult {
    fn from(value: InvocationProgress) -> Self {
        Self {
            arguments: value.arguments,
            arguments_keyword: value.arguments_keyword,
            options: value.options,
        }
    }
}

/// A progressive result of an invocation.
///
/// Streaming procedures that produce this type have it sent immediately, rather than held back
/// until the next value is produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvocationProgress {
    pub arguments: List,
    pub arguments_keyword: Dictionary,
    /// Additional YIELD options.
    pub options: Dictionary,
}

impl InvocationProgress {
    /// Creates a progressive result with only positional arguments.
    pub fn arguments(arguments: List) -> Self {
        Self {
            arguments,
            ..Default::default()
        }
    }
}

impl From<InvocationResult> for InvocationProgress {
    fn from(value: InvocationResult) -> Self {
        Self {
            arguments: value.arguments,
            arguments_keyword: value.arguments_keyword,
            options: value.options,
        }
    }
}
