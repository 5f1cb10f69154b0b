use std::{
    any::Any,
    sync::Arc,
};

use anyhow::{
    Error,
    Result,
};
use async_trait::async_trait;
use log::{
    debug,
    error,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
};

use crate::{
    core::{
        cancel::Interrupt,
        error::{
            BasicError,
            InteractionError,
            WampError,
        },
        id::Id,
    },
    invocation::{
        Invocation,
        InvocationError,
        InvocationProgress,
        InvocationResult,
    },
    procedure::ProcedureContext,
};

/// An execution strategy for a single invocation.
///
/// A runner drives its procedure to completion and turns the outcome into responses on the
/// invocation. It only fails for failures outside of the procedure itself, such as the session
/// being closed.
#[async_trait]
pub trait Runner: Send + 'static {
    /// The name of the strategy, for logging.
    fn name(&self) -> &'static str;

    /// Runs the procedure to completion.
    async fn run(self, context: RunnerContext) -> Result<()>;
}

/// Shared state and helpers for a running invocation.
///
/// Every send helper is a no-op (with a debug log) when the invocation can no longer accept the
/// response, since double completion is expected when cancellation races with the procedure.
#[derive(Debug)]
pub struct RunnerContext {
    invocation: Arc<Invocation>,
    interrupt_rx: watch::Receiver<Option<Interrupt>>,
}

impl RunnerContext {
    fn new(invocation: Arc<Invocation>, interrupt_rx: watch::Receiver<Option<Interrupt>>) -> Self {
        Self {
            invocation,
            interrupt_rx,
        }
    }

    /// The invocation being run.
    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn request_id(&self) -> Id {
        self.invocation.request_id()
    }

    /// A new receiver for interrupts delivered to the invocation.
    pub fn interrupt_rx(&self) -> watch::Receiver<Option<Interrupt>> {
        self.interrupt_rx.clone()
    }

    /// A new context to hand to the procedure.
    pub fn procedure_context(&self) -> ProcedureContext {
        ProcedureContext::new(self.invocation.clone(), self.interrupt_rx.clone())
    }

    /// Sends the final result.
    pub async fn send_result(&self, result: InvocationResult) -> Result<()> {
        if self.invocation.done() {
            debug!(
                "Dropping result for invocation {}: invocation is already done",
                self.request_id()
            );
            return Ok(());
        }
        self.absorb(self.invocation.send_result(result).await)
    }

    /// Sends a progressive result.
    pub async fn send_progress(&self, progress: InvocationProgress) -> Result<()> {
        if self.invocation.done() {
            debug!(
                "Dropping progress for invocation {}: invocation is already done",
                self.request_id()
            );
            return Ok(());
        }
        if !self.invocation.may_send_progress() {
            debug!(
                "Dropping progress for invocation {}: caller did not request progressive results",
                self.request_id()
            );
            return Ok(());
        }
        self.absorb(self.invocation.send_progress(progress).await)
    }

    /// Sends an error describing why the procedure failed.
    pub async fn send_exception(&self, error: &Error) -> Result<()> {
        if self.invocation.done() {
            debug!(
                "Dropping error for invocation {}: invocation is already done: {error:#}",
                self.request_id()
            );
            return Ok(());
        }
        self.absorb(self.invocation.send_error(WampError::from(error)).await)
    }

    /// Answers an invocation whose procedure was dropped because of an interrupt.
    ///
    /// Nothing is sent if the caller does not expect a response.
    pub async fn send_canceled(&self, interrupt: Interrupt) -> Result<()> {
        if !interrupt.mode.expects_response() {
            debug!(
                "Not answering invocation {}: caller does not expect a response ({interrupt})",
                self.request_id()
            );
            return Ok(());
        }
        self.send_exception(&InteractionError::Canceled.into()).await
    }

    fn absorb(&self, result: Result<()>) -> Result<()> {
        match result {
            Err(err) => match err.downcast_ref::<InvocationError>() {
                Some(reason) => {
                    debug!(
                        "Dropping response for invocation {}: {reason}",
                        self.request_id()
                    );
                    Ok(())
                }
                None => Err(err),
            },
            Ok(()) => Ok(()),
        }
    }
}

/// Waits for the next interrupt, if one can still arrive.
///
/// Resolves immediately if an interrupt was already delivered.
pub(crate) async fn next_interrupt(
    interrupt_rx: &mut watch::Receiver<Option<Interrupt>>,
) -> Option<Interrupt> {
    loop {
        let interrupt = *interrupt_rx.borrow_and_update();
        if interrupt.is_some() {
            return interrupt;
        }
        if interrupt_rx.changed().await.is_err() {
            return None;
        }
    }
}

/// Converts a panic payload from a procedure into an error for the caller.
pub(crate) fn panic_error(request_id: Id, panic: Box<dyn Any + Send>) -> Error {
    let message = match panic.downcast::<String>() {
        Ok(message) => *message,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(message) => (*message).to_owned(),
            Err(_) => "unknown panic".to_owned(),
        },
    };
    error!("Procedure for invocation {request_id} panicked: {message}");
    BasicError::Internal(format!("procedure panicked: {message}")).into()
}

/// A running invocation.
///
/// The runner task is spawned as soon as the runner is started. Interrupts from the caller are
/// forwarded into the task, which decides how to respond based on its strategy.
#[derive(Debug)]
pub struct ProcedureRunner {
    name: &'static str,
    invocation: Arc<Invocation>,
    interrupt_tx: watch::Sender<Option<Interrupt>>,
    handle: JoinHandle<Result<()>>,
}

impl ProcedureRunner {
    /// Starts running the invocation with the given strategy.
    pub fn start<R>(invocation: Invocation, runner: R) -> Self
    where
        R: Runner,
    {
        let invocation = Arc::new(invocation);
        let (interrupt_tx, interrupt_rx) = watch::channel(None);
        let name = runner.name();
        debug!(
            "Starting {name} runner for invocation {}",
            invocation.request_id()
        );
        let handle = tokio::spawn(runner.run(RunnerContext::new(invocation.clone(), interrupt_rx)));
        Self {
            name,
            invocation,
            interrupt_tx,
            handle,
        }
    }

    /// The invocation being run.
    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn request_id(&self) -> Id {
        self.invocation.request_id()
    }

    /// The name of the strategy running the invocation.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Checks if the invocation is done, meaning no more responses will be sent.
    pub fn done(&self) -> bool {
        self.invocation.done()
    }

    /// Checks if the runner task has exited.
    pub fn finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Interrupts the invocation.
    ///
    /// Interrupting a finished or already-interrupted invocation does nothing.
    pub fn interrupt(&self, interrupt: Interrupt) -> Result<()> {
        if self.invocation.done() {
            debug!(
                "Ignoring interrupt ({interrupt}) for invocation {}: invocation is already done",
                self.request_id()
            );
            return Ok(());
        }
        if !self.invocation.store_interrupt(interrupt) {
            debug!(
                "Ignoring interrupt ({interrupt}) for invocation {}: invocation was already interrupted",
                self.request_id()
            );
            return Ok(());
        }
        debug!(
            "Delivering interrupt ({interrupt}) to {} runner for invocation {}",
            self.name,
            self.request_id()
        );
        self.interrupt_tx.send_replace(Some(interrupt));
        Ok(())
    }

    /// Waits for the runner task to exit.
    ///
    /// Procedure failures are reported to the caller, so an error here always originates outside
    /// of the procedure.
    pub async fn join(self) -> Result<()> {
        let request_id = self.request_id();
        match self.handle.await {
            Ok(result) => result,
            Err(err) => Err(Error::new(err).context(format!(
                "{} runner for invocation {request_id} did not complete",
                self.name
            ))),
        }
    }
}
