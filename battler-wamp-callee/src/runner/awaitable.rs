use std::{
    panic::AssertUnwindSafe,
    sync::Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use log::debug;

use crate::{
    core::error::InteractionError,
    procedure::AwaitableProcedure,
    runner::runner::{
        Runner,
        RunnerContext,
        next_interrupt,
        panic_error,
    },
};

/// A runner for a procedure that hands back a bare unit of work.
///
/// The work runs on its own task. An interrupt aborts the task, which is reported to the caller as
/// a cancellation unless the work already finished.
pub struct AwaitableRunner {
    procedure: Arc<dyn AwaitableProcedure>,
}

impl AwaitableRunner {
    pub fn new(procedure: Arc<dyn AwaitableProcedure>) -> Self {
        Self { procedure }
    }
}

#[async_trait]
impl Runner for AwaitableRunner {
    fn name(&self) -> &'static str {
        "awaitable"
    }

    async fn run(self, context: RunnerContext) -> Result<()> {
        let request_id = context.request_id();
        let procedure_context = context.procedure_context();
        let work = match std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.procedure.invoke(procedure_context)
        })) {
            Ok(work) => work,
            Err(panic) => {
                return context
                    .send_exception(&panic_error(request_id, panic))
                    .await;
            }
        };

        let mut handle = tokio::spawn(work);
        let mut interrupt_rx = context.interrupt_rx();
        let joined = tokio::select! {
            joined = &mut handle => joined,
            Some(interrupt) = next_interrupt(&mut interrupt_rx) => {
                debug!("Aborting work for invocation {request_id} due to interrupt ({interrupt})");
                handle.abort();
                handle.await
            }
        };

        match joined {
            Ok(Ok(output)) => context.send_result(output.into_result()).await,
            Ok(Err(err)) => {
                debug!("Work for invocation {request_id} failed: {err:#}");
                context.send_exception(&err).await
            }
            Err(err) if err.is_panic() => {
                context
                    .send_exception(&panic_error(request_id, err.into_panic()))
                    .await
            }
            Err(_) => {
                context
                    .send_exception(&InteractionError::Canceled.into())
                    .await
            }
        }
    }
}
