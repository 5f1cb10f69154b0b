mod callee;

pub use callee::{
    Callee,
    CalleeConfig,
};
