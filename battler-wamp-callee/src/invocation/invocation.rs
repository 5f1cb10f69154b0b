use std::{
    fmt::Debug,
    sync::{
        Arc,
        OnceLock,
        atomic::{
            AtomicBool,
            Ordering,
        },
    },
};

use anyhow::Result;
use battler_wamp_values::{
    Dictionary,
    Integer,
    List,
    Value,
};
use log::trace;
use thiserror::Error;

use crate::{
    core::{
        cancel::{
            CallCancelMode,
            Interrupt,
        },
        error::WampError,
        id::Id,
        uri::Uri,
    },
    invocation::result::{
        InvocationProgress,
        InvocationResult,
    },
    message::{
        common::{
            wamp_error_for_invocation,
            yield_for_invocation,
        },
        message::InvocationMessage,
    },
    session::Session,
};

/// An error for an invocation refusing to send a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    /// The invocation already sent its terminal response, or the caller stopped waiting for one.
    #[error("invocation {0} is already done")]
    AlreadyDone(Id),
    /// The caller did not ask for progressive results.
    #[error("caller did not request progressive results")]
    ProgressNotRequested,
    /// The caller interrupted the invocation, so no more progress may be sent.
    #[error("invocation was interrupted ({0})")]
    Interrupted(Interrupt),
}

/// A single call of a procedure, received from the router.
///
/// The invocation is the only way to respond to the caller. At most one terminal response (result
/// or error) is ever sent; every response after that fails with [`InvocationError::AlreadyDone`].
pub struct Invocation {
    request_id: Id,
    registration: Id,
    arguments: List,
    arguments_keyword: Dictionary,
    details: Dictionary,

    done: AtomicBool,
    interrupt: OnceLock<Interrupt>,
    session: Arc<dyn Session>,
}

impl Invocation {
    /// Creates a new invocation that responds through the given session.
    pub fn new(
        request_id: Id,
        registration: Id,
        arguments: List,
        arguments_keyword: Dictionary,
        details: Dictionary,
        session: Arc<dyn Session>,
    ) -> Self {
        Self {
            request_id,
            registration,
            arguments,
            arguments_keyword,
            details,
            done: AtomicBool::new(false),
            interrupt: OnceLock::new(),
            session,
        }
    }

    /// Creates a new invocation from an INVOCATION message.
    pub fn from_message(message: InvocationMessage, session: Arc<dyn Session>) -> Self {
        Self::new(
            message.request,
            message.registered_registration,
            message.call_arguments,
            message.call_arguments_keyword,
            message.details,
            session,
        )
    }

    /// The request ID, unique for all open calls from the router.
    pub fn request_id(&self) -> Id {
        self.request_id
    }

    /// The registration ID of the procedure being invoked.
    pub fn registration(&self) -> Id {
        self.registration
    }

    /// Positional arguments from the caller.
    pub fn arguments(&self) -> &List {
        &self.arguments
    }

    /// Keyword arguments from the caller.
    pub fn arguments_keyword(&self) -> &Dictionary {
        &self.arguments_keyword
    }

    /// Invocation details from the router.
    pub fn details(&self) -> &Dictionary {
        &self.details
    }

    /// The session ID of the caller, if disclosed.
    pub fn caller(&self) -> Option<Id> {
        self.details
            .get("caller")
            .and_then(Value::integer)
            .and_then(|id| Id::try_from(id).ok())
    }

    /// The trust level assigned to the caller by the router, if any.
    pub fn trust_level(&self) -> Option<Integer> {
        self.details.get("trustlevel").and_then(Value::integer)
    }

    /// The procedure that was called, if disclosed.
    ///
    /// Only useful for pattern-based registrations.
    pub fn procedure(&self) -> Option<Uri> {
        self.details
            .get("procedure")
            .and_then(Value::string)
            .and_then(|procedure| Uri::try_from(procedure).ok())
    }

    /// Checks if the caller accepts progressive results.
    pub fn may_send_progress(&self) -> bool {
        self.details
            .get("receive_progress")
            .and_then(Value::bool)
            .unwrap_or(false)
    }

    /// Checks if the invocation is done, meaning no more responses will be sent.
    pub fn done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// The interrupt received for this invocation, if any.
    pub fn pending_interrupt(&self) -> Option<Interrupt> {
        self.interrupt.get().copied()
    }

    /// Stores an interrupt on the invocation.
    ///
    /// Only the first interrupt is kept. Returns `false` if an interrupt was already stored.
    ///
    /// [`CallCancelMode::KillNoWait`] marks the invocation as done immediately, since the caller
    /// will not accept any response.
    pub fn store_interrupt(&self, interrupt: Interrupt) -> bool {
        if self.interrupt.set(interrupt).is_err() {
            return false;
        }
        if interrupt.mode == CallCancelMode::KillNoWait {
            self.mark_done();
        }
        true
    }

    /// Marks the invocation as done, returning `true` if this call is the one that did so.
    fn mark_done(&self) -> bool {
        !self.done.swap(true, Ordering::AcqRel)
    }

    /// Sends a progressive result to the caller.
    ///
    /// Fails if the invocation is done, if the caller did not request progressive results, or if
    /// the invocation was interrupted.
    pub async fn send_progress(&self, progress: InvocationProgress) -> Result<()> {
        if self.done() {
            return Err(InvocationError::AlreadyDone(self.request_id).into());
        }
        if !self.may_send_progress() {
            return Err(InvocationError::ProgressNotRequested.into());
        }
        if let Some(interrupt) = self.pending_interrupt() {
            return Err(InvocationError::Interrupted(interrupt).into());
        }
        trace!("Sending progress for invocation {}", self.request_id);
        self.session
            .send(yield_for_invocation(
                self.request_id,
                progress.options,
                progress.arguments,
                progress.arguments_keyword,
                true,
            ))
            .await
    }

    /// Sends the final result to the caller, completing the invocation.
    pub async fn send_result(&self, result: InvocationResult) -> Result<()> {
        if !self.mark_done() {
            return Err(InvocationError::AlreadyDone(self.request_id).into());
        }
        trace!("Sending result for invocation {}", self.request_id);
        self.session
            .send(yield_for_invocation(
                self.request_id,
                result.options,
                result.arguments,
                result.arguments_keyword,
                false,
            ))
            .await
    }

    /// Sends an error to the caller, completing the invocation.
    pub async fn send_error(&self, error: WampError) -> Result<()> {
        if !self.mark_done() {
            return Err(InvocationError::AlreadyDone(self.request_id).into());
        }
        trace!(
            "Sending error {} for invocation {}",
            error.reason(),
            self.request_id
        );
        self.session
            .send(wamp_error_for_invocation(self.request_id, error))
            .await
    }
}

impl Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("request_id", &self.request_id)
            .field("registration", &self.registration)
            .field("arguments", &self.arguments)
            .field("arguments_keyword", &self.arguments_keyword)
            .field("details", &self.details)
            .field("done", &self.done())
            .field("interrupt", &self.pending_interrupt())
            .finish()
    }
}

#[cfg(test)]
mod invocation_test {
    use std::sync::Arc;

    use battler_wamp_values::{
        Dictionary,
        List,
        Value,
    };
    use tokio::sync::mpsc;

    use crate::{
        core::{
            cancel::{
                CallCancelMode,
                Interrupt,
            },
            error::WampError,
            id::Id,
            uri::Uri,
        },
        invocation::{
            Invocation,
            InvocationError,
            InvocationProgress,
            InvocationResult,
        },
        message::message::Message,
    };

    fn invocation(details: Dictionary) -> (Invocation, mpsc::UnboundedReceiver<Message>) {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        (
            Invocation::new(
                Id::try_from(12).unwrap(),
                Id::try_from(34).unwrap(),
                List::default(),
                Dictionary::default(),
                details,
                Arc::new(message_tx),
            ),
            message_rx,
        )
    }

    fn progress_details() -> Dictionary {
        Dictionary::from_iter([("receive_progress".to_owned(), Value::Bool(true))])
    }

    #[test]
    fn reads_details() {
        let (invocation, _) = invocation(Dictionary::from_iter([
            ("caller".to_owned(), Value::Integer(99)),
            ("trustlevel".to_owned(), Value::Integer(2)),
            (
                "procedure".to_owned(),
                Value::String("com.battler.add".to_owned()),
            ),
        ]));
        assert_eq!(invocation.caller(), Some(Id::try_from(99).unwrap()));
        assert_eq!(invocation.trust_level(), Some(2));
        assert_eq!(
            invocation.procedure(),
            Some(Uri::try_from("com.battler.add").unwrap())
        );
        assert!(!invocation.may_send_progress());
        assert!(!invocation.done());
    }

    #[tokio::test]
    async fn sends_result_at_most_once() {
        let (invocation, mut message_rx) = invocation(Dictionary::default());
        assert_matches::assert_matches!(
            invocation
                .send_result(InvocationResult::arguments(List::from_iter([Value::Integer(1)])))
                .await,
            Ok(())
        );
        assert!(invocation.done());
        assert_matches::assert_matches!(
            invocation.send_result(InvocationResult::default()).await,
            Err(err) => {
                assert_matches::assert_matches!(err.downcast_ref::<InvocationError>(), Some(InvocationError::AlreadyDone(_)));
            }
        );
        assert_matches::assert_matches!(
            invocation
                .send_error(WampError::new(Uri::try_from("com.battler.error").unwrap(), "late"))
                .await,
            Err(_)
        );

        assert_matches::assert_matches!(message_rx.try_recv(), Ok(Message::Yield(message)) => {
            assert_eq!(message.invocation_request, Id::try_from(12).unwrap());
            assert_eq!(message.arguments, List::from_iter([Value::Integer(1)]));
            assert!(!message.progress());
        });
        assert_matches::assert_matches!(message_rx.try_recv(), Err(_));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn sends_one_terminal_response_when_completions_race() {
        for _ in 0..50 {
            let (invocation, mut message_rx) = invocation(Dictionary::default());
            let invocation = Arc::new(invocation);
            let (result, error) = tokio::join!(
                tokio::spawn({
                    let invocation = invocation.clone();
                    async move { invocation.send_result(InvocationResult::default()).await }
                }),
                tokio::spawn({
                    let invocation = invocation.clone();
                    async move {
                        invocation
                            .send_error(WampError::new(
                                Uri::try_from("com.battler.error.raced").unwrap(),
                                "raced",
                            ))
                            .await
                    }
                }),
            );
            let outcomes = [result.unwrap(), error.unwrap()];
            assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
            assert_matches::assert_matches!(
                outcomes.iter().find_map(|outcome| outcome.as_ref().err()),
                Some(err) => {
                    assert_matches::assert_matches!(err.downcast_ref::<InvocationError>(), Some(InvocationError::AlreadyDone(_)));
                }
            );
            assert!(invocation.done());
            assert_matches::assert_matches!(message_rx.try_recv(), Ok(Message::Yield(_) | Message::Error(_)));
            assert_matches::assert_matches!(message_rx.try_recv(), Err(_));
        }
    }

    #[tokio::test]
    async fn strips_progress_flag_from_result() {
        let (invocation, mut message_rx) = invocation(progress_details());
        assert_matches::assert_matches!(
            invocation
                .send_result(InvocationResult {
                    options: Dictionary::from_iter([("progress".to_owned(), Value::Bool(true))]),
                    ..Default::default()
                })
                .await,
            Ok(())
        );
        assert_matches::assert_matches!(message_rx.try_recv(), Ok(Message::Yield(message)) => {
            assert!(!message.progress());
        });
    }

    #[tokio::test]
    async fn progress_requires_caller_interest() {
        let (invocation, mut message_rx) = invocation(Dictionary::default());
        for arguments in [
            List::default(),
            List::from_iter([Value::Integer(1)]),
            List::from_iter([Value::String("a".to_owned()), Value::Bool(false)]),
        ] {
            assert_matches::assert_matches!(
                invocation.send_progress(InvocationProgress::arguments(arguments)).await,
                Err(err) => {
                    assert_matches::assert_matches!(err.downcast_ref::<InvocationError>(), Some(InvocationError::ProgressNotRequested));
                }
            );
        }
        assert_matches::assert_matches!(message_rx.try_recv(), Err(_));
    }

    #[tokio::test]
    async fn sends_progress_before_result() {
        let (invocation, mut message_rx) = invocation(progress_details());
        assert_matches::assert_matches!(
            invocation
                .send_progress(InvocationProgress::arguments(List::from_iter([Value::Integer(1)])))
                .await,
            Ok(())
        );
        assert_matches::assert_matches!(
            invocation
                .send_result(InvocationResult::arguments(List::from_iter([Value::Integer(2)])))
                .await,
            Ok(())
        );
        assert_matches::assert_matches!(
            invocation.send_progress(InvocationProgress::default()).await,
            Err(_)
        );

        assert_matches::assert_matches!(message_rx.try_recv(), Ok(Message::Yield(message)) => {
            assert!(message.progress());
            assert_eq!(message.arguments, List::from_iter([Value::Integer(1)]));
        });
        assert_matches::assert_matches!(message_rx.try_recv(), Ok(Message::Yield(message)) => {
            assert!(!message.progress());
            assert_eq!(message.arguments, List::from_iter([Value::Integer(2)]));
        });
        assert_matches::assert_matches!(message_rx.try_recv(), Err(_));
    }

    #[tokio::test]
    async fn refuses_progress_after_interrupt() {
        let (invocation, mut message_rx) = invocation(progress_details());
        assert!(invocation.store_interrupt(Interrupt::new(CallCancelMode::Kill)));
        assert!(!invocation.store_interrupt(Interrupt::new(CallCancelMode::KillNoWait)));
        assert_eq!(
            invocation.pending_interrupt(),
            Some(Interrupt::new(CallCancelMode::Kill))
        );
        assert!(!invocation.done());

        assert_matches::assert_matches!(
            invocation.send_progress(InvocationProgress::default()).await,
            Err(err) => {
                assert_matches::assert_matches!(
                    err.downcast_ref::<InvocationError>(),
                    Some(InvocationError::Interrupted(Interrupt { mode: CallCancelMode::Kill }))
                );
            }
        );
        assert_matches::assert_matches!(message_rx.try_recv(), Err(_));

        // The caller still waits for a terminal response.
        assert_matches::assert_matches!(
            invocation.send_result(InvocationResult::default()).await,
            Ok(())
        );
        assert_matches::assert_matches!(message_rx.try_recv(), Ok(Message::Yield(_)));
    }

    #[tokio::test]
    async fn kill_no_wait_completes_invocation() {
        let (invocation, mut message_rx) = invocation(progress_details());
        assert!(invocation.store_interrupt(Interrupt::new(CallCancelMode::KillNoWait)));
        assert!(invocation.done());
        assert_matches::assert_matches!(
            invocation.send_result(InvocationResult::default()).await,
            Err(_)
        );
        assert_matches::assert_matches!(message_rx.try_recv(), Err(_));
    }

    #[tokio::test]
    async fn sends_error_keyed_to_request() {
        let (invocation, mut message_rx) = invocation(Dictionary::default());
        assert_matches::assert_matches!(
            invocation
                .send_error(WampError::new(
                    Uri::try_from("com.battler.error.failed").unwrap(),
                    "failed"
                ))
                .await,
            Ok(())
        );
        assert!(invocation.done());
        assert_matches::assert_matches!(message_rx.try_recv(), Ok(Message::Error(message)) => {
            assert_eq!(message.request_type, 68);
            assert_eq!(message.request, Id::try_from(12).unwrap());
            assert_eq!(message.error.as_ref(), "com.battler.error.failed");
        });
    }

    #[tokio::test]
    async fn surfaces_transport_failure() {
        let (invocation, message_rx) = invocation(Dictionary::default());
        drop(message_rx);
        assert_matches::assert_matches!(
            invocation.send_result(InvocationResult::default()).await,
            Err(err) => {
                assert!(err.to_string().contains("session closed"));
            }
        );
    }
}
