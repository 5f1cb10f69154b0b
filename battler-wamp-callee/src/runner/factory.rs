use anyhow::Result;
use thiserror::Error;

use crate::{
    invocation::Invocation,
    procedure::Handler,
    runner::{
        awaitable::AwaitableRunner,
        runner::ProcedureRunner,
        single::SingleRunner,
        streaming::StreamingRunner,
    },
};

/// An error for a handler that cannot drive an invocation.
#[derive(Debug, Error)]
#[error("{kind} handler cannot run invocation {request_id}")]
pub struct UnsupportedHandlerError {
    kind: &'static str,
    request_id: String,
}

impl UnsupportedHandlerError {
    fn new(kind: &'static str, invocation: &Invocation) -> Self {
        Self {
            kind,
            request_id: invocation.request_id().to_string(),
        }
    }

    /// The kind of handler that was rejected.
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

/// Starts the right runner for a procedure handler.
///
/// The strategy is fixed when the handler is registered, except for
/// [`Handler::Deferred`], which is resolved again for every invocation.
#[derive(Debug, Clone)]
pub struct RunnerFactory {
    handler: Handler,
}

impl RunnerFactory {
    pub fn new(handler: Handler) -> Self {
        Self { handler }
    }

    /// Starts running the invocation.
    pub fn start(&self, invocation: Invocation) -> Result<ProcedureRunner> {
        match &self.handler {
            Handler::Deferred(procedure) => {
                let handler = procedure.resolve(&invocation)?;
                Self::start_resolved(handler, invocation)
            }
            handler => Self::start_resolved(handler.clone(), invocation),
        }
    }

    fn start_resolved(handler: Handler, invocation: Invocation) -> Result<ProcedureRunner> {
        match handler {
            Handler::Single(procedure) => Ok(ProcedureRunner::start(
                invocation,
                SingleRunner::new(procedure),
            )),
            Handler::Streaming(procedure) => Ok(ProcedureRunner::start(
                invocation,
                StreamingRunner::new(procedure),
            )),
            Handler::Awaitable(procedure) => Ok(ProcedureRunner::start(
                invocation,
                AwaitableRunner::new(procedure),
            )),
            handler @ Handler::Deferred(_) => {
                Err(UnsupportedHandlerError::new(handler.name(), &invocation).into())
            }
        }
    }
}

#[cfg(test)]
mod factory_test {
    use std::sync::Arc;

    use battler_wamp_values::{
        Dictionary,
        List,
    };
    use tokio::sync::mpsc;

    use crate::{
        core::id::Id,
        invocation::Invocation,
        message::message::Message,
        procedure::{
            Handler,
            ProcedureOutput,
        },
        runner::{
            RunnerFactory,
            UnsupportedHandlerError,
        },
    };

    fn new_invocation() -> (Invocation, mpsc::UnboundedReceiver<Message>) {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        (
            Invocation::new(
                Id::try_from(1).unwrap(),
                Id::try_from(2).unwrap(),
                List::default(),
                Dictionary::default(),
                Dictionary::default(),
                Arc::new(message_tx),
            ),
            message_rx,
        )
    }

    #[tokio::test]
    async fn selects_runner_from_handler() {
        let factory = RunnerFactory::new(Handler::single_fn(|_| async {
            anyhow::Ok(ProcedureOutput::Empty)
        }));
        let (invocation, _message_rx) = new_invocation();
        let runner = factory.start(invocation).unwrap();
        assert_eq!(runner.name(), "single");
        assert_matches::assert_matches!(runner.join().await, Ok(()));

        let factory = RunnerFactory::new(Handler::awaitable_fn(|_| async {
            anyhow::Ok(ProcedureOutput::Empty)
        }));
        let (invocation, _message_rx) = new_invocation();
        let runner = factory.start(invocation).unwrap();
        assert_eq!(runner.name(), "awaitable");
        assert_matches::assert_matches!(runner.join().await, Ok(()));
    }

    #[tokio::test]
    async fn resolves_deferred_handler_per_invocation() {
        let factory = RunnerFactory::new(Handler::deferred_fn(|invocation| {
            if invocation.arguments().is_empty() {
                Ok(Handler::streaming_fn(|_| {
                    futures_util::stream::iter([anyhow::Ok(ProcedureOutput::from(1u64))])
                }))
            } else {
                Ok(Handler::single_fn(|_| async { anyhow::Ok(ProcedureOutput::Empty) }))
            }
        }));
        let (invocation, _message_rx) = new_invocation();
        let runner = factory.start(invocation).unwrap();
        assert_eq!(runner.name(), "streaming");
        assert_matches::assert_matches!(runner.join().await, Ok(()));
    }

    #[tokio::test]
    async fn rejects_nested_deferred_handler() {
        let factory = RunnerFactory::new(Handler::deferred_fn(|_| {
            Ok(Handler::deferred_fn(|_| {
                Ok(Handler::single_fn(|_| async { anyhow::Ok(ProcedureOutput::Empty) }))
            }))
        }));
        let (invocation, mut message_rx) = new_invocation();
        assert_matches::assert_matches!(factory.start(invocation), Err(err) => {
            assert_matches::assert_matches!(err.downcast_ref::<UnsupportedHandlerError>(), Some(err) => {
                assert_eq!(err.kind(), "deferred");
            });
        });
        assert_matches::assert_matches!(message_rx.try_recv(), Err(_));
    }
}
