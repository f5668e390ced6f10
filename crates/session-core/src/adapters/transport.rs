//! SIP transport collaborator
//!
//! Framing, Via handling, retransmission and authentication live behind
//! this trait. The engine hands it the method, CSeq and the headers and body
//! that negotiation decides; the transport fills in everything else from the
//! dialog (or, for responses, from the request being answered).

use duet_sip_core::message::reason_phrase;
use duet_sip_core::{Method, SipMessage};

use crate::dialog::{Dialog, TransactionKey};
use crate::errors::Result;

pub const CONTENT_TYPE_SDP: &str = "application/sdp";

/// A request to send inside the call's dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingRequest {
    pub method: Method,
    pub cseq: u32,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl OutgoingRequest {
    pub fn new(method: Method, cseq: u32) -> Self {
        Self {
            method,
            cseq,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_sdp(mut self, body: String) -> Self {
        self.headers.push(("Content-Type".into(), CONTENT_TYPE_SDP.into()));
        self.body = Some(body);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response to a received request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl OutgoingResponse {
    /// Response with the canonical reason phrase for `status`
    pub fn new(status: u16) -> Self {
        Self::with_reason(status, reason_phrase(status))
    }

    pub fn with_reason(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_sdp(mut self, body: String) -> Self {
        self.headers.push(("Content-Type".into(), CONTENT_TYPE_SDP.into()));
        self.body = Some(body);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Outbound half of the SIP stack
pub trait SipTransport {
    /// Our Contact header value
    fn contact(&self) -> String;

    /// Send a request addressed by `dialog` and return its transaction key.
    /// Responses come back as [`crate::events::CallEvent::Response`].
    fn send_request(&mut self, dialog: &Dialog, request: OutgoingRequest) -> Result<TransactionKey>;

    /// Answer a received request
    fn send_response(&mut self, request: &SipMessage, response: OutgoingResponse) -> Result<()>;
}
