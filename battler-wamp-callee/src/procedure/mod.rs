mod context;
mod output;
mod procedure;

pub use context::ProcedureContext;
pub use output::ProcedureOutput;
pub use procedure::{
    AwaitableProcedure,
    DeferredProcedure,
    Handler,
    Procedure,
    StreamingProcedure,
};
