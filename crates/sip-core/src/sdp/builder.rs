//! Outgoing SDP document builder
//!
//! Every INVITE body and every 183/200 answer uses the same layout:
//!
//! ```text
//! v=0
//! o=- 0 0 IN IP4 <ip>
//! s=session
//! c=IN IP4 <ip>
//! b=CT:99980
//! t=0 0
//! m=audio <port> RTP/AVP <ids>
//! <candidate block>
//! [a=inactive]
//! <codec block>
//! a=encryption:rejected
//! ```

use super::candidate::{format_candidates, Candidate};
use super::codec::{format_codec_ids, format_codecs, Codec};

pub const DEFAULT_SESSION_NAME: &str = "session";
pub const DEFAULT_BANDWIDTH: &str = "CT:99980";
pub const DEFAULT_MAX_PTIME: u32 = 200;

/// Builder for the SDP documents this side sends
///
/// # Example
///
/// ```
/// use duet_sip_core::prelude::*;
///
/// let sdp = SessionDescriptionBuilder::new("10.0.0.1")
///     .codecs(vec![Codec::new(0, "PCMU", 8000, MediaType::Audio)])
///     .hold(true)
///     .build();
///
/// assert!(sdp.contains("a=inactive\r\n"));
/// assert!(sdp.ends_with("a=encryption:rejected\r\n"));
/// ```
#[derive(Debug, Clone)]
pub struct SessionDescriptionBuilder {
    ip: String,
    session_name: String,
    bandwidth: String,
    codecs: Vec<Codec>,
    local_candidates: Vec<Candidate>,
    remote_candidates: Vec<Candidate>,
    legacy: bool,
    hold: bool,
    max_ptime: u32,
}

impl SessionDescriptionBuilder {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            session_name: DEFAULT_SESSION_NAME.to_string(),
            bandwidth: DEFAULT_BANDWIDTH.to_string(),
            codecs: Vec::new(),
            local_candidates: Vec::new(),
            remote_candidates: Vec::new(),
            legacy: false,
            hold: false,
            max_ptime: DEFAULT_MAX_PTIME,
        }
    }

    pub fn session_name(mut self, name: impl Into<String>) -> Self {
        self.session_name = name.into();
        self
    }

    /// Value of the `b=` line
    pub fn bandwidth(mut self, bandwidth: impl Into<String>) -> Self {
        self.bandwidth = bandwidth.into();
        self
    }

    pub fn codecs(mut self, codecs: Vec<Codec>) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn local_candidates(mut self, candidates: Vec<Candidate>) -> Self {
        self.local_candidates = candidates;
        self
    }

    /// Remote candidates the media layer settled on
    pub fn remote_candidates(mut self, candidates: Vec<Candidate>) -> Self {
        self.remote_candidates = candidates;
        self
    }

    pub fn legacy(mut self, legacy: bool) -> Self {
        self.legacy = legacy;
        self
    }

    /// Either side holds the call
    pub fn hold(mut self, hold: bool) -> Self {
        self.hold = hold;
        self
    }

    pub fn max_ptime(mut self, max_ptime: u32) -> Self {
        self.max_ptime = max_ptime;
        self
    }

    pub fn build(self) -> String {
        let candidates = format_candidates(
            &self.local_candidates,
            &self.remote_candidates,
            self.legacy,
            self.max_ptime,
        );
        let port = candidates.rtp_port.unwrap_or(0);

        let mut sdp = format!(
            "v=0\r\n\
             o=- 0 0 IN IP4 {ip}\r\n\
             s={name}\r\n\
             c=IN IP4 {ip}\r\n\
             b={bw}\r\n\
             t=0 0\r\n\
             m=audio {port} RTP/AVP{ids}\r\n",
            ip = self.ip,
            name = self.session_name,
            bw = self.bandwidth,
            port = port,
            ids = format_codec_ids(&self.codecs),
        );
        sdp.push_str(&candidates.lines);
        if self.hold {
            sdp.push_str("a=inactive\r\n");
        }
        sdp.push_str(&format_codecs(&self.codecs));
        sdp.push_str("a=encryption:rejected\r\n");
        sdp
    }
}
