pub mod channel;
pub mod setup;
