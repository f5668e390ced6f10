//! Event vocabulary of the call engine
//!
//! Everything that can move a call arrives as one [`CallEvent`]: inbound
//! SIP requests, responses to our own requests, media backend callbacks and
//! local commands. The coordinator turns them into state changes and
//! publishes [`CallNotification`]s for the user interface.

use duet_sip_core::SipMessage;
use serde::{Deserialize, Serialize};

use crate::dialog::TransactionKey;
use crate::session::CallState;

/// Input to [`crate::CallCoordinator::handle_event`]
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// A request received from the network
    IncomingRequest(SipMessage),

    /// A response to a request we sent
    Response {
        transaction: TransactionKey,
        message: SipMessage,
    },

    Media(MediaEvent),

    Command(CallCommand),
}

/// Callbacks from the media backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaEvent {
    /// Local candidate gathering finished
    CandidatesPrepared,
    MediaConnected,
    Accept { local: bool },
    Reject { local: bool },
    Hold { local: bool, on_hold: bool },
    Hangup { local: bool },
}

/// Local user commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallCommand {
    /// Place a call to `participant` (a SIP URI)
    Initiate { participant: String },
    /// End the active call
    Hangup,
}

/// Output of the coordinator, delivered on an unbounded channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallNotification {
    StateChanged {
        call_id: String,
        old_state: Option<CallState>,
        new_state: CallState,
    },
    /// User-facing error with a short title and a longer description
    Error { title: String, description: String },
    Terminated { call_id: String, reason: String },
}

impl From<MediaEvent> for CallEvent {
    fn from(event: MediaEvent) -> Self {
        CallEvent::Media(event)
    }
}

impl From<CallCommand> for CallEvent {
    fn from(command: CallCommand) -> Self {
        CallEvent::Command(command)
    }
}
