use std::{
    mem,
    panic::AssertUnwindSafe,
    sync::Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use futures_util::{
    FutureExt,
    StreamExt,
};
use log::{
    debug,
    warn,
};

use crate::{
    core::cancel::{
        CallCancelMode,
        Interrupt,
    },
    invocation::InvocationResult,
    procedure::{
        ProcedureOutput,
        StreamingProcedure,
    },
    runner::runner::{
        Runner,
        RunnerContext,
        next_interrupt,
        panic_error,
    },
};

/// The single slot holding back the latest output of a stream.
#[derive(Debug, Default)]
enum LagBuffer {
    #[default]
    Empty,
    Holding(ProcedureOutput),
}

impl LagBuffer {
    /// Holds a new output, releasing the previous one.
    fn hold(&mut self, output: ProcedureOutput) -> Option<ProcedureOutput> {
        match mem::replace(self, Self::Holding(output)) {
            Self::Empty => None,
            Self::Holding(previous) => Some(previous),
        }
    }

    fn take(&mut self) -> Option<ProcedureOutput> {
        match mem::take(self) {
            Self::Empty => None,
            Self::Holding(output) => Some(output),
        }
    }
}

/// A runner for a procedure that streams its outputs.
///
/// Outputs are sent one behind: an output is only sent as progress once the next output arrives,
/// and the last output is sent as the final result. There are two exceptions:
/// 1. [`ProcedureOutput::Progress`] is sent as progress immediately, after any held output.
/// 1. [`ProcedureOutput::Result`] is sent as the final result immediately, after any held output.
///    The stream is still driven to completion, but nothing else is sent.
///
/// Once the invocation is interrupted, nothing more is sent as progress. The next output is sent
/// as the final result, and the stream is dropped. If the stream ends instead, the held output is
/// the final result. After a [`CallCancelMode::Skip`] interrupt, the stream is polled until it
/// produces either. Any other interrupt gives the stream one more poll, after which it is dropped
/// and the caller is told the call was canceled.
pub struct StreamingRunner {
    procedure: Arc<dyn StreamingProcedure>,
}

impl StreamingRunner {
    pub fn new(procedure: Arc<dyn StreamingProcedure>) -> Self {
        Self { procedure }
    }
}

#[async_trait]
impl Runner for StreamingRunner {
    fn name(&self) -> &'static str {
        "streaming"
    }

    async fn run(self, context: RunnerContext) -> Result<()> {
        let request_id = context.request_id();
        let procedure_context = context.procedure_context();
        let mut stream = match std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.procedure.invoke(procedure_context)
        })) {
            Ok(stream) => stream,
            Err(panic) => {
                return context
                    .send_exception(&panic_error(request_id, panic))
                    .await;
            }
        };

        let mut interrupt_rx = context.interrupt_rx();
        let mut interrupted: Option<Interrupt> = None;
        let mut pending = LagBuffer::Empty;

        loop {
            let next = tokio::select! {
                next = AssertUnwindSafe(stream.next()).catch_unwind() => next,
                Some(interrupt) = next_interrupt(&mut interrupt_rx), if interrupted.is_none() => {
                    interrupted = Some(interrupt);
                    if interrupt.mode == CallCancelMode::Skip {
                        debug!("Stream for invocation {request_id} interrupted ({interrupt}), waiting for its final output");
                        continue;
                    }
                    match AssertUnwindSafe(stream.next()).catch_unwind().now_or_never() {
                        Some(next) => next,
                        None => {
                            drop(stream);
                            debug!("Dropped stream for invocation {request_id} after interrupt ({interrupt})");
                            return context.send_canceled(interrupt).await;
                        }
                    }
                }
            };

            let output = match next {
                Ok(Some(Ok(output))) => output,
                Ok(Some(Err(err))) => {
                    debug!("Stream for invocation {request_id} failed: {err:#}");
                    return context.send_exception(&err).await;
                }
                Ok(None) => break,
                Err(panic) => {
                    return context
                        .send_exception(&panic_error(request_id, panic))
                        .await;
                }
            };

            // The interrupt is stored on the invocation before it is delivered, so it may be seen
            // here before the runner observes it.
            if interrupted.or(context.invocation().pending_interrupt()).is_some() {
                if pending.take().is_some() {
                    debug!(
                        "Discarding held output of invocation {request_id}: stream was interrupted"
                    );
                }
                return context.send_result(output.into_result()).await;
            }

            if context.invocation().done() {
                debug!("Discarding output of invocation {request_id}: invocation is already done");
                continue;
            }

            match output {
                ProcedureOutput::Progress(progress) => {
                    if let Some(previous) = pending.take() {
                        context.send_progress(previous.into_progress()).await?;
                    }
                    context.send_progress(progress).await?;
                }
                ProcedureOutput::Result(result) => {
                    if let Some(previous) = pending.take() {
                        context.send_progress(previous.into_progress()).await?;
                    }
                    context.send_result(result).await?;
                }
                output => {
                    if let Some(previous) = pending.hold(output) {
                        context.send_progress(previous.into_progress()).await?;
                    }
                }
            }
        }

        match pending.take() {
            Some(output) => context.send_result(output.into_result()).await,
            None if context.invocation().done() => Ok(()),
            None => {
                warn!("Stream for invocation {request_id} finished without producing a result");
                context.send_result(InvocationResult::default()).await
            }
        }
    }
}
