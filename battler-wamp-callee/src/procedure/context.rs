use std::sync::Arc;

use anyhow::Result;
use battler_wamp_values::{
    Dictionary,
    Integer,
    List,
};
use log::debug;
use tokio::sync::watch;

use crate::{
    core::{
        cancel::Interrupt,
        id::Id,
        uri::Uri,
    },
    invocation::{
        Invocation,
        InvocationError,
    },
    procedure::ProcedureOutput,
};

/// The view of an invocation given to a procedure.
///
/// Interrupts from the caller are delivered here. Procedures that care about cancellation should
/// wait on [`ProcedureContext::interrupted`] alongside their own work, or call
/// [`ProcedureContext::check_interrupt`] between steps, and decide for themselves how to respond.
#[derive(Debug, Clone)]
pub struct ProcedureContext {
    invocation: Arc<Invocation>,
    interrupt_rx: watch::Receiver<Option<Interrupt>>,
}

impl ProcedureContext {
    pub(crate) fn new(
        invocation: Arc<Invocation>,
        interrupt_rx: watch::Receiver<Option<Interrupt>>,
    ) -> Self {
        Self {
            invocation,
            interrupt_rx,
        }
    }

    /// The underlying invocation.
    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn request_id(&self) -> Id {
        self.invocation.request_id()
    }

    pub fn arguments(&self) -> &List {
        self.invocation.arguments()
    }

    pub fn arguments_keyword(&self) -> &Dictionary {
        self.invocation.arguments_keyword()
    }

    pub fn details(&self) -> &Dictionary {
        self.invocation.details()
    }

    pub fn caller(&self) -> Option<Id> {
        self.invocation.caller()
    }

    pub fn trust_level(&self) -> Option<Integer> {
        self.invocation.trust_level()
    }

    pub fn procedure(&self) -> Option<Uri> {
        self.invocation.procedure()
    }

    /// Checks if the caller accepts progressive results.
    pub fn receive_progress(&self) -> bool {
        self.invocation.may_send_progress()
    }

    /// The interrupt delivered to the invocation, if any.
    pub fn interrupt(&self) -> Option<Interrupt> {
        self.invocation.pending_interrupt()
    }

    /// Fails with [`InvocationError::Interrupted`] if the invocation was interrupted.
    pub fn check_interrupt(&self) -> Result<()> {
        match self.interrupt() {
            Some(interrupt) => Err(InvocationError::Interrupted(interrupt).into()),
            None => Ok(()),
        }
    }

    /// Waits until the invocation is interrupted.
    ///
    /// Never resolves if the invocation finishes without being interrupted.
    pub async fn interrupted(&mut self) -> Interrupt {
        loop {
            if let Some(interrupt) = self.interrupt() {
                return interrupt;
            }
            if self.interrupt_rx.changed().await.is_err() {
                // The runner is gone, so no interrupt can arrive anymore.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sends a progressive result directly to the caller.
    ///
    /// Does nothing if the caller did not ask for progressive results. Fails if the invocation is
    /// done or was interrupted, which signals that the procedure should stop producing results.
    pub async fn send_progress<T>(&self, output: T) -> Result<()>
    where
        T: Into<ProcedureOutput>,
    {
        if !self.invocation.may_send_progress() {
            debug!(
                "Dropping progress for invocation {}: caller did not request progressive results",
                self.request_id()
            );
            return Ok(());
        }
        self.invocation
            .send_progress(output.into().into_progress())
            .await
    }
}
