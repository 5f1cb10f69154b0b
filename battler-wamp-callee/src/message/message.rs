use battler_wamp_values::{
    Dictionary,
    Integer,
    List,
};
use serde_struct_tuple::{
    DeserializeStructTuple,
    SerializeStructTuple,
};
use serde_struct_tuple_enum::{
    DeserializeStructTupleEnum,
    SerializeStructTupleEnum,
};

use crate::core::{
    id::Id,
    uri::Uri,
};

/// The message tag of INVOCATION, used as the request type of errors sent in response to one.
pub const INVOCATION_MESSAGE_TAG: Integer = 68;

/// An ERROR message for communicating an error in response to a single request.
#[derive(Debug, Default, Clone, PartialEq, Eq, SerializeStructTuple, DeserializeStructTuple)]
pub struct ErrorMessage {
    pub request_type: Integer,
    pub request: Id,
    pub details: Dictionary,
    pub error: Uri,
    #[serde_struct_tuple(default, skip_serializing_if = List::is_empty)]
    pub arguments: List,
    #[serde_struct_tuple(default, skip_serializing_if = Dictionary::is_empty)]
    pub arguments_keyword: Dictionary,
}

/// An INVOCATION message for invoking a procedure on its callee.
#[derive(Debug, Default, Clone, PartialEq, Eq, SerializeStructTuple, DeserializeStructTuple)]
pub struct InvocationMessage {
    pub request: Id,
    pub registered_registration: Id,
    pub details: Dictionary,
    #[serde_struct_tuple(default, skip_serializing_if = List::is_empty)]
    pub call_arguments: List,
    #[serde_struct_tuple(default, skip_serializing_if = Dictionary::is_empty)]
    pub call_arguments_keyword: Dictionary,
}

/// An INTERRUPT message for canceling an invocation on its callee.
#[derive(Debug, Default, Clone, PartialEq, Eq, SerializeStructTuple, DeserializeStructTuple)]
pub struct InterruptMessage {
    pub invocation_request: Id,
    pub options: Dictionary,
}

/// A YIELD message for yielding the result of an invocation from the callee.
#[derive(Debug, Default, Clone, PartialEq, Eq, SerializeStructTuple, DeserializeStructTuple)]
pub struct YieldMessage {
    pub invocation_request: Id,
    pub options: Dictionary,
    #[serde_struct_tuple(default, skip_serializing_if = List::is_empty)]
    pub arguments: List,
    #[serde_struct_tuple(default, skip_serializing_if = Dictionary::is_empty)]
    pub arguments_keyword: Dictionary,
}

impl YieldMessage {
    /// Checks if the message is a progressive result.
    pub fn progress(&self) -> bool {
        self.options
            .get("progress")
            .and_then(|progress| progress.bool())
            .unwrap_or(false)
    }
}

/// A WAMP message exchanged between a callee and the router during an invocation.
#[derive(Debug, Clone, PartialEq, Eq, SerializeStructTupleEnum, DeserializeStructTupleEnum)]
#[tag(Integer)]
pub enum Message {
    #[tag = 8]
    Error(ErrorMessage),
    #[tag = 68]
    Invocation(InvocationMessage),
    #[tag = 69]
    Interrupt(InterruptMessage),
    #[tag = 70]
    Yield(YieldMessage),
}

impl Message {
    /// The message name, mostly for logging.
    pub fn message_name(&self) -> &'static str {
        match self {
            Self::Error(_) => "ERROR",
            Self::Invocation(_) => "INVOCATION",
            Self::Interrupt(_) => "INTERRUPT",
            Self::Yield(_) => "YIELD",
        }
    }

    /// The request ID on the message.
    pub fn request_id(&self) -> Id {
        match self {
            Self::Error(message) => message.request,
            Self::Invocation(message) => message.request,
            Self::Interrupt(message) => message.invocation_request,
            Self::Yield(message) => message.invocation_request,
        }
    }
}

#[cfg(test)]
mod message_test {
    use battler_wamp_values::{
        Dictionary,
        List,
        Value,
    };

    use crate::{
        core::{
            id::Id,
            uri::Uri,
        },
        message::message::{
            ErrorMessage,
            InterruptMessage,
            InvocationMessage,
            Message,
            YieldMessage,
        },
    };

    #[test]
    fn deserializes_invocation_from_tuple() {
        assert_matches::assert_matches!(serde_json::from_str(r#"
            [68, 6131533, 9823526, {"receive_progress": true}, ["Hello, world!"]]
        "#), Ok(Message::Invocation(message)) => {
            assert_eq!(message, InvocationMessage {
                request: Id::try_from(6131533).unwrap(),
                registered_registration: Id::try_from(9823526).unwrap(),
                details: Dictionary::from_iter([("receive_progress".to_owned(), Value::Bool(true))]),
                call_arguments: List::from_iter([Value::String("Hello, world!".to_owned())]),
                call_arguments_keyword: Dictionary::default(),
            });
        });

        assert_matches::assert_matches!(serde_json::from_str(r#"
            [69, 6131533, {"mode": "kill"}]
        "#), Ok(Message::Interrupt(message)) => {
            assert_eq!(message, InterruptMessage {
                invocation_request: Id::try_from(6131533).unwrap(),
                options: Dictionary::from_iter([("mode".to_owned(), Value::String("kill".to_owned()))]),
            });
        });
    }

    #[test]
    fn serializes_responses_to_tuple() {
        assert_matches::assert_matches!(
            serde_json::to_string(&Message::Yield(YieldMessage {
                invocation_request: Id::try_from(6131533).unwrap(),
                options: Dictionary::default(),
                arguments: List::from_iter([Value::Integer(3)]),
                arguments_keyword: Dictionary::default(),
            })),
            Ok(serialized) => {
                assert_eq!(serialized, r#"[70,6131533,{},[3]]"#);
            }
        );

        assert_matches::assert_matches!(
            serde_json::to_string(&Message::Error(ErrorMessage {
                request_type: 68,
                request: Id::try_from(6131533).unwrap(),
                details: Dictionary::default(),
                error: Uri::try_from("wamp.error.canceled").unwrap(),
                arguments: List::default(),
                arguments_keyword: Dictionary::default(),
            })),
            Ok(serialized) => {
                assert_eq!(serialized, r#"[8,68,6131533,{},"wamp.error.canceled"]"#);
            }
        );
    }

    #[test]
    fn reads_progress_flag() {
        let mut message = YieldMessage::default();
        assert!(!message.progress());
        message
            .options
            .insert("progress".to_owned(), Value::Bool(true));
        assert!(message.progress());
    }
}
