pub mod cancel;
pub mod error;
pub mod id;
pub mod uri;
