use std::{
    fmt::Debug,
    future::Future,
    sync::Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use futures_util::{
    FutureExt,
    Stream,
    StreamExt,
    future::BoxFuture,
    stream::BoxStream,
};

use crate::{
    invocation::Invocation,
    procedure::{
        ProcedureContext,
        ProcedureOutput,
    },
};

/// A procedure that produces exactly one output, possibly after suspending.
#[async_trait]
pub trait Procedure: Send + Sync {
    /// Invokes the procedure.
    async fn invoke(&self, context: ProcedureContext) -> Result<ProcedureOutput>;
}

/// A procedure that streams zero or more outputs.
///
/// Every output but the last is sent as a progressive result. The last output is sent as the final
/// result.
pub trait StreamingProcedure: Send + Sync {
    /// Invokes the procedure, producing a stream of outputs.
    fn invoke(&self, context: ProcedureContext) -> BoxStream<'static, Result<ProcedureOutput>>;
}

/// A procedure that hands back a unit of work with no notion of progress or interruption.
///
/// The work is spawned on its own task, and it is aborted if the caller interrupts the
/// invocation.
pub trait AwaitableProcedure: Send + Sync {
    /// Invokes the procedure, producing the pending work.
    fn invoke(&self, context: ProcedureContext) -> BoxFuture<'static, Result<ProcedureOutput>>;
}

/// A procedure whose execution strategy is only known once it is invoked.
pub trait DeferredProcedure: Send + Sync {
    /// Resolves the handler for a single invocation.
    ///
    /// The resolved handler cannot be deferred again.
    fn resolve(&self, invocation: &Invocation) -> Result<Handler>;
}

/// A procedure handler, tagged with how it should be driven.
#[derive(Clone)]
pub enum Handler {
    /// Driven by a [`SingleRunner`][`crate::runner::SingleRunner`].
    Single(Arc<dyn Procedure>),
    /// Driven by a [`StreamingRunner`][`crate::runner::StreamingRunner`].
    Streaming(Arc<dyn StreamingProcedure>),
    /// Driven by an [`AwaitableRunner`][`crate::runner::AwaitableRunner`].
    Awaitable(Arc<dyn AwaitableProcedure>),
    /// Resolved into one of the above on every invocation.
    Deferred(Arc<dyn DeferredProcedure>),
}

impl Handler {
    pub fn single<P>(procedure: P) -> Self
    where
        P: Procedure + 'static,
    {
        Self::Single(Arc::new(procedure))
    }

    pub fn streaming<P>(procedure: P) -> Self
    where
        P: StreamingProcedure + 'static,
    {
        Self::Streaming(Arc::new(procedure))
    }

    pub fn awaitable<P>(procedure: P) -> Self
    where
        P: AwaitableProcedure + 'static,
    {
        Self::Awaitable(Arc::new(procedure))
    }

    pub fn deferred<P>(procedure: P) -> Self
    where
        P: DeferredProcedure + 'static,
    {
        Self::Deferred(Arc::new(procedure))
    }

    /// A single-output handler from an async function.
    pub fn single_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(ProcedureContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ProcedureOutput>> + Send + 'static,
    {
        Self::single(FnProcedure(f))
    }

    /// A streaming handler from a function returning a stream.
    pub fn streaming_fn<F, S>(f: F) -> Self
    where
        F: Fn(ProcedureContext) -> S + Send + Sync + 'static,
        S: Stream<Item = Result<ProcedureOutput>> + Send + 'static,
    {
        Self::streaming(FnProcedure(f))
    }

    /// An awaitable handler from a function returning a future.
    pub fn awaitable_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(ProcedureContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ProcedureOutput>> + Send + 'static,
    {
        Self::awaitable(FnProcedure(f))
    }

    /// A deferred handler from a resolving function.
    pub fn deferred_fn<F>(f: F) -> Self
    where
        F: Fn(&Invocation) -> Result<Handler> + Send + Sync + 'static,
    {
        Self::deferred(FnProcedure(f))
    }

    /// The name of the execution strategy, mostly for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Single(_) => "single",
            Self::Streaming(_) => "streaming",
            Self::Awaitable(_) => "awaitable",
            Self::Deferred(_) => "deferred",
        }
    }
}

impl Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Handler").field(&self.name()).finish()
    }
}

struct FnProcedure<F>(F);

#[async_trait]
impl<F, Fut> Procedure for FnProcedure<F>
where
    F: Fn(ProcedureContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ProcedureOutput>> + Send,
{
    async fn invoke(&self, context: ProcedureContext) -> Result<ProcedureOutput> {
        (self.0)(context).await
    }
}

impl<F, S> StreamingProcedure for FnProcedure<F>
where
    F: Fn(ProcedureContext) -> S + Send + Sync,
    S: Stream<Item = Result<ProcedureOutput>> + Send + 'static,
{
    fn invoke(&self, context: ProcedureContext) -> BoxStream<'static, Result<ProcedureOutput>> {
        (self.0)(context).boxed()
    }
}

impl<F, Fut> AwaitableProcedure for FnProcedure<F>
where
    F: Fn(ProcedureContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ProcedureOutput>> + Send + 'static,
{
    fn invoke(&self, context: ProcedureContext) -> BoxFuture<'static, Result<ProcedureOutput>> {
        (self.0)(context).boxed()
    }
}

impl<F> DeferredProcedure for FnProcedure<F>
where
    F: Fn(&Invocation) -> Result<Handler> + Send + Sync,
{
    fn resolve(&self, invocation: &Invocation) -> Result<Handler> {
        (self.0)(invocation)
    }
}
