use std::sync::Arc;

use ahash::HashMap;
use anyhow::{
    Error,
    Result,
};
use log::{
    debug,
    error,
    warn,
};
use tokio::sync::mpsc;

use crate::{
    core::{
        cancel::Interrupt,
        error::{
            BasicError,
            InteractionError,
        },
        id::Id,
    },
    invocation::Invocation,
    message::{
        common::error_for_invocation,
        message::{
            InterruptMessage,
            InvocationMessage,
            Message,
        },
    },
    procedure::Handler,
    runner::{
        ProcedureRunner,
        RunnerFactory,
        UnsupportedHandlerError,
    },
    session::Session,
};

const DEFAULT_NAME: &str = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"));

/// Configuration for a [`Callee`].
#[derive(Debug, Clone)]
pub struct CalleeConfig {
    /// Name of the callee, mostly for logging.
    pub name: String,
}

impl Default for CalleeConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
        }
    }
}

/// The callee side of a session, which runs registered procedures for incoming invocations.
///
/// Messages from the router are handed to [`Callee::handle_message`]. Every invocation runs on
/// its own task, and responses are written directly to the session.
pub struct Callee {
    config: CalleeConfig,
    session: Arc<dyn Session>,
    procedures: HashMap<Id, RunnerFactory>,
    runners: HashMap<Id, ProcedureRunner>,
}

impl Callee {
    /// Creates a new callee that responds through the given session.
    pub fn new<S>(config: CalleeConfig, session: S) -> Self
    where
        S: Session + 'static,
    {
        Self {
            config,
            session: Arc::new(session),
            procedures: HashMap::default(),
            runners: HashMap::default(),
        }
    }

    /// The callee configuration.
    pub fn config(&self) -> &CalleeConfig {
        &self.config
    }

    /// Adds a procedure for the given registration.
    ///
    /// Replaces any procedure previously added for the registration.
    pub fn add_procedure(&mut self, registration: Id, handler: Handler) {
        debug!(
            "Callee {} added {} procedure for registration {registration}",
            self.config.name,
            handler.name()
        );
        if self
            .procedures
            .insert(registration, RunnerFactory::new(handler))
            .is_some()
        {
            debug!(
                "Callee {} replaced procedure for registration {registration}",
                self.config.name
            );
        }
    }

    /// Removes the procedure for the given registration.
    ///
    /// Invocations already running are not affected.
    pub fn remove_procedure(&mut self, registration: Id) -> bool {
        self.procedures.remove(&registration).is_some()
    }

    /// Request IDs of invocations that are still running.
    pub fn active_invocations(&self) -> Vec<Id> {
        let mut active = self
            .runners
            .iter()
            .filter(|(_, runner)| !runner.finished())
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        active.sort();
        active
    }

    /// Handles a message from the router.
    pub async fn handle_message(&mut self, message: Message) -> Result<()> {
        debug!(
            "Callee {} received {} message for request {}",
            self.config.name,
            message.message_name(),
            message.request_id()
        );
        match message {
            Message::Invocation(message) => self.handle_invocation(message).await,
            Message::Interrupt(message) => self.handle_interrupt(message),
            message => Err(InteractionError::ProtocolViolation(format!(
                "unexpected {} message",
                message.message_name()
            ))
            .into()),
        }
    }

    async fn handle_invocation(&mut self, message: InvocationMessage) -> Result<()> {
        let request_id = message.request;
        if self
            .runners
            .get(&request_id)
            .is_some_and(|runner| !runner.finished())
        {
            return Err(InteractionError::ProtocolViolation(format!(
                "invocation {request_id} is already running"
            ))
            .into());
        }

        let factory = match self.procedures.get(&message.registered_registration) {
            Some(factory) => factory,
            None => {
                warn!(
                    "Callee {} received invocation {request_id} for unknown registration {}",
                    self.config.name, message.registered_registration
                );
                return self
                    .session
                    .send(error_for_invocation(
                        request_id,
                        &InteractionError::NoSuchRegistration.into(),
                    ))
                    .await;
            }
        };

        let invocation = Invocation::from_message(message, self.session.clone());
        let runner = match factory.start(invocation) {
            Ok(runner) => runner,
            Err(err) => {
                error!(
                    "Callee {} failed to start invocation {request_id}: {err:#}",
                    self.config.name
                );
                self.session
                    .send(error_for_invocation(
                        request_id,
                        &BasicError::Internal(format!("{err:#}")).into(),
                    ))
                    .await?;
                return Err(err.context(BasicError::Internal(format!(
                    "failed to start invocation {request_id}"
                ))));
            }
        };

        if let Some(previous) = self.runners.insert(request_id, runner) {
            self.report(previous.join().await).ok();
        }
        Ok(())
    }

    fn handle_interrupt(&self, message: InterruptMessage) -> Result<()> {
        let request_id = message.invocation_request;
        let interrupt = Interrupt::from_options(&message.options).map_err(|err| {
            InteractionError::ProtocolViolation(format!("invalid interrupt: {err}"))
        })?;
        self.interrupt(request_id, interrupt)
    }

    /// Interrupts a running invocation.
    ///
    /// Interrupting an unknown or finished invocation does nothing.
    pub fn interrupt(&self, request_id: Id, interrupt: Interrupt) -> Result<()> {
        match self.runners.get(&request_id) {
            Some(runner) => runner.interrupt(interrupt),
            None => {
                debug!(
                    "Callee {} ignoring interrupt ({interrupt}) for unknown invocation {request_id}",
                    self.config.name
                );
                Ok(())
            }
        }
    }

    /// Joins all finished invocations.
    ///
    /// Returns the first failure, after every finished invocation is joined.
    pub async fn reap_finished(&mut self) -> Result<()> {
        let finished = self
            .runners
            .iter()
            .filter(|(_, runner)| runner.finished())
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        let mut first = Ok(());
        for id in finished {
            if let Some(runner) = self.runners.remove(&id) {
                first = first.and(self.report(runner.join().await));
            }
        }
        first
    }

    /// Waits for every invocation to finish.
    ///
    /// Returns the first failure, after every invocation is joined.
    pub async fn join_all(&mut self) -> Result<()> {
        let mut first = Ok(());
        for (_, runner) in self.runners.drain().collect::<Vec<_>>() {
            first = first.and(self.report(runner.join().await));
        }
        first
    }

    fn report(&self, result: Result<()>) -> Result<()> {
        if let Err(err) = &result {
            error!(
                "Callee {} failed to complete invocation: {err:#}",
                self.config.name
            );
        }
        result
    }

    /// Handles messages from the router until the channel is closed, then waits for every
    /// invocation to finish.
    ///
    /// Invalid messages are logged and skipped. Failures of the session itself end the loop.
    pub async fn serve(mut self, mut message_rx: mpsc::Receiver<Message>) -> Result<()> {
        while let Some(message) = message_rx.recv().await {
            if let Err(err) = self.handle_message(message).await {
                if !Self::recoverable(&err) {
                    self.join_all().await.ok();
                    return Err(err);
                }
                warn!(
                    "Callee {} skipped invalid message: {err:#}",
                    self.config.name
                );
            }
            self.reap_finished().await?;
        }
        self.join_all().await
    }

    fn recoverable(error: &Error) -> bool {
        error.downcast_ref::<InteractionError>().is_some()
            || error.downcast_ref::<BasicError>().is_some()
            || error.downcast_ref::<UnsupportedHandlerError>().is_some()
    }
}
