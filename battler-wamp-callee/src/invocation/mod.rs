mod invocation;
mod result;

pub use invocation::{
    Invocation,
    InvocationError,
};
pub use result::{
    InvocationProgress,
    InvocationResult,
};
