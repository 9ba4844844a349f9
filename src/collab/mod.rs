//! # Collaborators
//!
//! Interfaces the form layer hands its output to, with reference implementations: record
//! validation, persistence, notification, and the JSON source models are written from.

pub mod notify;
pub mod sink;
pub mod source;
pub mod validate;

pub use notify::Notifier;
pub use sink::PersistenceSink;
pub use validate::Validator;
