use anyhow::Error;
use battler_wamp_values::{
    Dictionary,
    List,
    Value,
};

use crate::{
    core::{
        error::WampError,
        id::Id,
    },
    message::message::{
        ErrorMessage,
        INVOCATION_MESSAGE_TAG,
        Message,
        YieldMessage,
    },
};

/// Builds a YIELD message for an invocation.
///
/// The progress flag is always overwritten, so stray flags in `options` never leak into a final
/// result.
pub fn yield_for_invocation(
    request: Id,
    mut options: Dictionary,
    arguments: List,
    arguments_keyword: Dictionary,
    progress: bool,
) -> Message {
    if progress {
        options.insert("progress".to_owned(), Value::Bool(true));
    } else {
        options.remove("progress");
    }
    Message::Yield(YieldMessage {
        invocation_request: request,
        options,
        arguments,
        arguments_keyword,
    })
}

/// Builds an ERROR message for an invocation from a structured error.
pub fn wamp_error_for_invocation(request: Id, error: WampError) -> Message {
    let (reason, message, arguments, arguments_keyword) = error.into_parts();
    Message::Error(ErrorMessage {
        request_type: INVOCATION_MESSAGE_TAG,
        request,
        details: Dictionary::from_iter([("message".to_owned(), Value::String(message))]),
        error: reason,
        arguments,
        arguments_keyword,
    })
}

/// Builds an ERROR message for an invocation from any error.
pub fn error_for_invocation(request: Id, error: &Error) -> Message {
    wamp_error_for_invocation(request, WampError::from(error))
}

#[cfg(test)]
mod common_test {
    use anyhow::Error;
    use battler_wamp_values::{
        Dictionary,
        List,
        Value,
    };

    use crate::{
        core::{
            error::{
                BasicError,
                WampError,
            },
            id::Id,
            uri::Uri,
        },
        message::{
            common::{
                error_for_invocation,
                yield_for_invocation,
            },
            message::{
                ErrorMessage,
                Message,
            },
        },
    };

    #[test]
    fn overwrites_progress_flag() {
        let options = Dictionary::from_iter([
            ("progress".to_owned(), Value::Bool(true)),
            ("custom".to_owned(), Value::Integer(1)),
        ]);
        assert_matches::assert_matches!(
            yield_for_invocation(Id::MIN, options.clone(), List::default(), Dictionary::default(), false),
            Message::Yield(message) => {
                assert!(!message.progress());
                assert_eq!(message.options.get("custom"), Some(&Value::Integer(1)));
            }
        );
        assert_matches::assert_matches!(
            yield_for_invocation(Id::MIN, Dictionary::default(), List::default(), Dictionary::default(), true),
            Message::Yield(message) => {
                assert!(message.progress());
            }
        );
    }

    #[test]
    fn reports_generic_errors_as_invalid_argument() {
        pretty_assertions::assert_eq!(
            error_for_invocation(Id::MIN, &Error::msg("bad")),
            Message::Error(ErrorMessage {
                request_type: 68,
                request: Id::MIN,
                details: Dictionary::from_iter([(
                    "message".to_owned(),
                    Value::String("bad".to_owned())
                )]),
                error: Uri::try_from("wamp.error.invalid_argument").unwrap(),
                arguments: List::default(),
                arguments_keyword: Dictionary::default(),
            })
        );
    }

    #[test]
    fn keeps_structured_errors() {
        let error = WampError::new(Uri::try_from("com.battler.error.too_big").unwrap(), "too big")
            .with_arguments(List::from_iter([Value::Integer(100)]));
        assert_matches::assert_matches!(error_for_invocation(Id::MIN, &error.into()), Message::Error(message) => {
            assert_eq!(message.error.as_ref(), "com.battler.error.too_big");
            assert_eq!(message.arguments, List::from_iter([Value::Integer(100)]));
            assert_eq!(message.details.get("message"), Some(&Value::String("too big".to_owned())));
        });
        assert_matches::assert_matches!(
            error_for_invocation(Id::MIN, &BasicError::PermissionDenied("no".to_owned()).into()),
            Message::Error(message) => {
                assert_eq!(message.error.as_ref(), "wamp.error.permission_denied");
            }
        );
    }
}
