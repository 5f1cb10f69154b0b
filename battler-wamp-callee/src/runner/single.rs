use std::{
    panic::AssertUnwindSafe,
    sync::Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use futures_util::FutureExt;
use log::debug;

use crate::{
    core::cancel::CallCancelMode,
    procedure::Procedure,
    runner::runner::{
        Runner,
        RunnerContext,
        next_interrupt,
        panic_error,
    },
};

/// A runner for a procedure that produces exactly one output.
///
/// Interrupts are observed by the procedure through its context. After a
/// [`CallCancelMode::Skip`] interrupt, the procedure runs until it finishes on its own. Any other
/// interrupt gives the procedure one more poll to respond. If it does not finish then, it is
/// dropped and the caller is told the call was canceled.
///
/// Whatever the procedure does in response is reported like any other outcome.
pub struct SingleRunner {
    procedure: Arc<dyn Procedure>,
}

impl SingleRunner {
    pub fn new(procedure: Arc<dyn Procedure>) -> Self {
        Self { procedure }
    }
}

#[async_trait]
impl Runner for SingleRunner {
    fn name(&self) -> &'static str {
        "single"
    }

    async fn run(self, context: RunnerContext) -> Result<()> {
        let request_id = context.request_id();
        let mut interrupt_rx = context.interrupt_rx();
        let mut interrupted = false;

        let mut invoke = AssertUnwindSafe(self.procedure.invoke(context.procedure_context()))
            .catch_unwind()
            .boxed();

        let outcome = loop {
            tokio::select! {
                outcome = &mut invoke => break Ok(outcome),
                Some(interrupt) = next_interrupt(&mut interrupt_rx), if !interrupted => {
                    interrupted = true;
                    if interrupt.mode == CallCancelMode::Skip {
                        debug!("Procedure for invocation {request_id} interrupted ({interrupt}), waiting for it to finish");
                        continue;
                    }
                    // The interrupt is stored before it is delivered, so the procedure can already
                    // see it through its context.
                    break (&mut invoke).now_or_never().ok_or(interrupt);
                }
            }
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(interrupt) => {
                drop(invoke);
                debug!("Dropped procedure for invocation {request_id} after interrupt ({interrupt})");
                return context.send_canceled(interrupt).await;
            }
        };

        match outcome {
            Ok(Ok(output)) => context.send_result(output.into_result()).await,
            Ok(Err(err)) => {
                debug!("Procedure for invocation {request_id} failed: {err:#}");
                context.send_exception(&err).await
            }
            Err(panic) => {
                context
                    .send_exception(&panic_error(request_id, panic))
                    .await
            }
        }
    }
}
