//! Call lifecycle states
//!
//! Hold is not a state of its own; see the flags on
//! [`super::CallSession`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of the active call.
///
/// "Idle" is not a state: it is the absence of a call in the coordinator's
/// slot. Hold is tracked by two flags on the session, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallState {
    /// Waiting for the backend to finish gathering local candidates
    CandidateGathering,
    /// Our initial INVITE is out
    Offering,
    /// Peer's INVITE parsed, 180 sent, waiting for gathering and the user
    OfferReceived,
    /// An offer/answer round is in flight after early media
    Negotiating,
    Active,
    Terminated,
}

impl CallState {
    pub fn is_established(self) -> bool {
        self == CallState::Active
    }

    /// The peer's INVITE is still unanswered by a final response
    pub fn awaits_local_answer(self) -> bool {
        matches!(self, CallState::OfferReceived | CallState::Negotiating)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallState::CandidateGathering => "CandidateGathering",
            CallState::Offering => "Offering",
            CallState::OfferReceived => "OfferReceived",
            CallState::Negotiating => "Negotiating",
            CallState::Active => "Active",
            CallState::Terminated => "Terminated",
        };
        f.write_str(name)
    }
}
