//! Call coordinator
//!
//! The coordinator owns the single active call and applies every
//! [`crate::events::CallEvent`] to it: SIP requests and responses, media
//! backend callbacks and local commands.

mod coordinator;
mod event_handler;
mod session_ops;

pub use coordinator::{describe_failure, describe_rejection, CallCoordinator};
