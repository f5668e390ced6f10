//! Call negotiation engine for the duet stack.
//!
//! This crate drives one audio call at a time through invitation, codec and
//! candidate negotiation, legacy-peer fallback, hold renegotiation and
//! termination. SIP transport and the media backend are collaborators
//! behind the [`SipTransport`] and [`MediaBackend`] traits; everything that
//! happens to a call arrives as a [`CallEvent`] and the user interface hears
//! back through [`CallNotification`]s.

// Core modules
pub mod adapters;
pub mod config;
pub mod coordinator;
pub mod dialog;
pub mod errors;
pub mod events;
pub mod session;

// Public re-exports of main types
pub use adapters::{MediaBackend, OutgoingRequest, OutgoingResponse, SipTransport, StreamId, StreamParams};
pub use config::NegotiationConfig;
pub use coordinator::{describe_failure, describe_rejection, CallCoordinator};
pub use dialog::{Dialog, TransactionKey};
pub use errors::{Result, SessionError};
pub use events::{CallCommand, CallEvent, CallNotification, MediaEvent};
pub use session::{CallInfo, CallSession, CallState};

/// Re-export types from dependent crates that are used in our public API
pub mod prelude {
    pub use duet_sip_core::prelude::*;

    pub use crate::{
        CallCommand, CallCoordinator, CallEvent, CallInfo, CallNotification, CallState, MediaBackend, MediaEvent,
        NegotiationConfig, SessionError, SipTransport, StreamId, StreamParams,
    };
}
