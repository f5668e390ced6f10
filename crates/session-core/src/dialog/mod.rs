//! Dialog bookkeeping
//!
//! The transport collaborator owns message framing and retransmission. The
//! call engine only tracks what it needs to address requests inside the
//! call: call id, both tags, the remote party, our CSeq counter and the slot
//! for the INVITE transaction we are waiting on.

mod correlation;

pub use correlation::TransactionKey;

use duet_sip_core::message::extract_uri;
use duet_sip_core::{Method, SdpError, SipMessage};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::Result;

/// Random 32-bit hex tag
pub fn generate_tag() -> String {
    let mut rng = rand::thread_rng();
    format!("{:08x}", rng.gen::<u32>())
}

pub fn generate_call_id() -> String {
    format!("call-{}", uuid::Uuid::new_v4())
}

/// SIP dialog state of the active call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialog {
    pub call_id: String,
    pub local_tag: String,
    pub remote_tag: Option<String>,
    /// Remote party URI
    pub with: String,
    cseq: u32,
    outgoing_invite: Option<TransactionKey>,
}

impl Dialog {
    /// Dialog for a call we place
    pub fn outgoing(participant: impl Into<String>) -> Self {
        Self {
            call_id: generate_call_id(),
            local_tag: generate_tag(),
            remote_tag: None,
            with: participant.into(),
            cseq: 0,
            outgoing_invite: None,
        }
    }

    /// Dialog for an INVITE we received.
    ///
    /// The local tag is stamped onto the invitation's `To` header so every
    /// response built from it carries the tag.
    pub fn incoming(invite: &mut SipMessage) -> Result<Self> {
        let call_id = invite
            .call_id()
            .ok_or(SdpError::MissingHeader { name: "Call-ID" })?
            .to_string();
        let from = invite
            .from_header()
            .ok_or(SdpError::MissingHeader { name: "From" })?;
        let with = extract_uri(from).to_string();
        let remote_tag = invite.from_tag().map(str::to_string);

        let local_tag = generate_tag();
        let to = invite
            .to_header()
            .ok_or(SdpError::MissingHeader { name: "To" })?
            .to_string();
        invite.set_header("To", format!("{};tag={}", to, local_tag));

        debug!("Created dialog {} with {}", call_id, with);
        Ok(Self {
            call_id,
            local_tag,
            remote_tag,
            with,
            cseq: 0,
            outgoing_invite: None,
        })
    }

    pub fn cseq(&self) -> u32 {
        self.cseq
    }

    /// Advance and return the CSeq number for a new request
    pub fn next_cseq(&mut self) -> u32 {
        self.cseq += 1;
        self.cseq
    }

    /// Learn the remote tag from a response to our INVITE
    pub fn update_from_response(&mut self, response: &SipMessage) {
        if let Some(tag) = response.to_tag() {
            if self.remote_tag.as_deref() != Some(tag) {
                debug!("Dialog {} remote tag is now {}", self.call_id, tag);
                self.remote_tag = Some(tag.to_string());
            }
        }
    }

    pub fn outgoing_invite(&self) -> Option<&TransactionKey> {
        self.outgoing_invite.as_ref()
    }

    pub fn set_outgoing_invite(&mut self, key: TransactionKey) {
        self.outgoing_invite = Some(key);
    }

    pub fn clear_outgoing_invite(&mut self) -> Option<TransactionKey> {
        self.outgoing_invite.take()
    }

    /// Whether `key` is the INVITE this dialog is waiting on
    pub fn is_outgoing_invite(&self, key: &TransactionKey) -> bool {
        self.outgoing_invite.as_ref() == Some(key) && key.method == Method::Invite
    }
}
