//! Call session
//!
//! One [`CallSession`] exists per active call. [`CallInfo`] is the part the
//! outside world may look at; the negotiation fields stay crate-private and
//! are only touched by the coordinator.

use duet_sip_core::sdp::candidate::Candidate;
use duet_sip_core::sdp::codec::Codec;
use duet_sip_core::sdp::RemoteDescription;
use duet_sip_core::SipMessage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::state::CallState;
use crate::adapters::StreamId;
use crate::dialog::Dialog;
use crate::errors::Result;

/// Externally visible snapshot of a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallInfo {
    pub call_id: String,
    /// Remote party URI
    pub participant: String,
    pub state: CallState,
    pub initiator: bool,
    pub local_hold: bool,
    pub remote_hold: bool,
    /// Peer does not speak the candidate dialect
    pub legacy: bool,
}

impl CallInfo {
    pub fn is_on_hold(&self) -> bool {
        self.local_hold || self.remote_hold
    }
}

/// What the outstanding INVITE is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InviteKind {
    /// Opens the call (or replays it after a legacy downgrade): the answer is
    /// fully negotiated
    Initial,
    /// Follow-up or hold renegotiation: the answer is only acknowledged
    Reinvite,
}

/// The peer's last description and the codecs both sides share.
/// Always replaced as a pair.
#[derive(Debug, Clone)]
struct RemoteOffer {
    description: RemoteDescription,
    codecs: Vec<Codec>,
}

#[derive(Debug, Clone)]
pub struct CallSession {
    info: CallInfo,
    pub(crate) dialog: Dialog,
    pub(crate) stream: Option<StreamId>,
    remote: Option<RemoteOffer>,
    /// The last INVITE received; responses are built from it
    pub(crate) invitation: Option<SipMessage>,
    /// `invitation` has not had a final response yet
    pub(crate) invitation_pending: bool,
    pub(crate) invite_kind: InviteKind,
    pub(crate) using_connectivity_checks: bool,
    /// Stream was replaced after a legacy answer; the next gathering
    /// completion re-sends the offer
    pub(crate) replay_pending: bool,
    /// Local hold changed while an INVITE of ours was outstanding; the
    /// next INVITE carries the new state
    pub(crate) renegotiation_pending: bool,
}

impl CallSession {
    pub(crate) fn outgoing(participant: &str, connectivity_checks: bool) -> Self {
        let dialog = Dialog::outgoing(participant);
        Self::with_dialog(dialog, true, CallState::CandidateGathering, connectivity_checks)
    }

    /// Session for a received INVITE; stamps our tag onto the stored copy
    pub(crate) fn incoming(mut invitation: SipMessage) -> Result<Self> {
        let dialog = Dialog::incoming(&mut invitation)?;
        let mut session = Self::with_dialog(dialog, false, CallState::OfferReceived, true);
        session.store_invitation(invitation);
        Ok(session)
    }

    /// Keep a received INVITE (initial or re-offer) until it is answered
    pub(crate) fn store_invitation(&mut self, invitation: SipMessage) {
        self.invitation = Some(invitation);
        self.invitation_pending = true;
    }

    fn with_dialog(dialog: Dialog, initiator: bool, state: CallState, connectivity_checks: bool) -> Self {
        Self {
            info: CallInfo {
                call_id: dialog.call_id.clone(),
                participant: dialog.with.clone(),
                state,
                initiator,
                local_hold: false,
                remote_hold: false,
                legacy: false,
            },
            dialog,
            stream: None,
            remote: None,
            invitation: None,
            invitation_pending: false,
            invite_kind: InviteKind::Initial,
            using_connectivity_checks: connectivity_checks,
            replay_pending: false,
            renegotiation_pending: false,
        }
    }

    pub fn info(&self) -> &CallInfo {
        &self.info
    }

    pub fn call_id(&self) -> &str {
        &self.info.call_id
    }

    pub fn dialog(&self) -> &Dialog {
        &self.dialog
    }

    pub fn state(&self) -> CallState {
        self.info.state
    }

    /// Move to `state`, returning the previous one
    pub(crate) fn set_state(&mut self, state: CallState) -> CallState {
        let old = self.info.state;
        if old != state {
            debug!("Call {} state: {} -> {}", self.info.call_id, old, state);
            self.info.state = state;
        }
        old
    }

    pub fn is_initiator(&self) -> bool {
        self.info.initiator
    }

    pub fn is_legacy(&self) -> bool {
        self.info.legacy
    }

    /// Legacy mode only ever turns on
    pub(crate) fn mark_legacy(&mut self) {
        if !self.info.legacy {
            info!("Call {} switched to legacy mode", self.info.call_id);
            self.info.legacy = true;
        }
    }

    pub fn local_hold(&self) -> bool {
        self.info.local_hold
    }

    pub fn remote_hold(&self) -> bool {
        self.info.remote_hold
    }

    pub fn is_on_hold(&self) -> bool {
        self.info.is_on_hold()
    }

    pub(crate) fn set_local_hold(&mut self, on_hold: bool) {
        self.info.local_hold = on_hold;
    }

    pub(crate) fn set_remote_hold(&mut self, on_hold: bool) {
        self.info.remote_hold = on_hold;
    }

    /// Replace the peer description and the shared codec list together.
    /// A legacy description turns legacy mode on for good.
    pub(crate) fn set_remote(&mut self, description: RemoteDescription, codecs: Vec<Codec>) {
        if description.legacy {
            self.mark_legacy();
        }
        self.remote = Some(RemoteOffer { description, codecs });
    }

    pub fn remote_description(&self) -> Option<&RemoteDescription> {
        self.remote.as_ref().map(|r| &r.description)
    }

    pub fn remote_codecs(&self) -> &[Codec] {
        self.remote
            .as_ref()
            .map(|r| r.codecs.as_slice())
            .unwrap_or(&[])
    }

    pub fn remote_candidates(&self) -> &[Candidate] {
        self.remote
            .as_ref()
            .map(|r| r.description.candidates.as_slice())
            .unwrap_or(&[])
    }

    /// Peer demands encryption in its last description
    pub fn remote_requires_encryption(&self) -> bool {
        self.remote
            .as_ref()
            .map_or(false, |r| r.description.requires_encryption())
    }
}
