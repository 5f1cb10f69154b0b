mod awaitable;
mod factory;
mod runner;
mod single;
mod streaming;

pub use awaitable::AwaitableRunner;
pub use factory::{
    RunnerFactory,
    UnsupportedHandlerError,
};
pub use runner::{
    ProcedureRunner,
    Runner,
    RunnerContext,
};
pub use single::SingleRunner;
pub use streaming::StreamingRunner;
