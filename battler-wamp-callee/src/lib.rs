//! # battler-wamp-callee
//!
//! **battler-wamp-callee** is the callee-side invocation engine for WAMP procedures. It takes an
//! incoming INVOCATION, drives a procedure handler to completion, and turns the handler's behavior
//! into a well-ordered sequence of YIELD and ERROR messages.
//!
//! Procedures are registered as a [`Handler`][`crate::procedure::Handler`], which fixes how the
//! procedure is driven:
//! 1. **Single** - The procedure produces exactly one output.
//! 1. **Streaming** - The procedure produces a stream of outputs. Every output but the last is
//!    sent as a progressive result, but only once the next output is produced.
//! 1. **Awaitable** - The procedure hands back a bare unit of work, which is aborted if the caller
//!    cancels the call.
//! 1. **Deferred** - The procedure picks one of the above for every invocation.
//!
//! Every invocation sends at most one final response, and progressive results are only sent to
//! callers that asked for them. Cancellation from the caller is delivered to running procedures
//! through their [`ProcedureContext`][`crate::procedure::ProcedureContext`].
//!
//! The session that messages are written to is abstracted by the
//! [`Session`][`crate::session::Session`] trait, which is implemented for tokio channels.
//!
//! ## Example
//!
//! ```
//! use battler_wamp_callee::{
//!     callee::{
//!         Callee,
//!         CalleeConfig,
//!     },
//!     core::id::Id,
//!     message::message::Message,
//!     procedure::{
//!         Handler,
//!         ProcedureOutput,
//!     },
//! };
//! use battler_wamp_values::Value;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (message_tx, mut message_rx) = mpsc::unbounded_channel();
//!     let mut callee = Callee::new(CalleeConfig::default(), message_tx);
//!     callee.add_procedure(
//!         Id::try_from(1)?,
//!         Handler::single_fn(|context| async move {
//!             anyhow::Ok(ProcedureOutput::from(context.arguments().len() as u64))
//!         }),
//!     );
//!
//!     callee
//!         .handle_message(serde_json::from_str(r#"[68, 2, 1, {}, ["a", "b"]]"#)?)
//!         .await?;
//!     callee.join_all().await?;
//!
//!     match message_rx.recv().await {
//!         Some(Message::Yield(message)) => {
//!             assert_eq!(message.arguments, Vec::from_iter([Value::Integer(2)]));
//!         }
//!         message => panic!("unexpected message: {message:?}"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod callee;
pub mod core;
pub mod invocation;
pub mod message;
pub mod procedure;
pub mod runner;
pub mod session;
