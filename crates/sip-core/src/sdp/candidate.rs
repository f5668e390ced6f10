//! SDP candidate model
//!
//! Reads and writes the ICE-style connectivity lines of an audio offer:
//!
//! ```text
//! a=ice-ufrag:<username>
//! a=ice-pwd:<password>
//! a=candidate:<foundation> <component> <transport> <priority> <ip> <port> typ <type> [raddr <ip> rport <port>]
//! a=remote-candidates:<component> <ip> <port> ...
//! ```
//!
//! Only UDP candidates are kept. TCP candidates, and IPv6 candidate lists
//! that use a different transport token, are dropped one by one. Peers that
//! send no candidates at all are legacy peers; for them two host candidates
//! are synthesised from the `o=` address and `m=` port.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::attributes::SdpAttributes;

/// Foundation token used for the synthesised legacy candidates
pub const LEGACY_FOUNDATION: &str = "foundation";

/// RTP or RTCP component of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    None = 0,
    Rtp = 1,
    Rtcp = 2,
}

impl ComponentType {
    pub fn from_id(id: u32) -> Self {
        match id {
            1 => ComponentType::Rtp,
            2 => ComponentType::Rtcp,
            _ => ComponentType::None,
        }
    }

    pub fn id(self) -> u32 {
        self as u32
    }
}

/// How the candidate address was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateType {
    Host,
    Relay,
    ServerReflexive,
    PeerReflexive,
}

impl CandidateType {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "host" => Some(CandidateType::Host),
            "relay" => Some(CandidateType::Relay),
            "srflx" => Some(CandidateType::ServerReflexive),
            "prflx" => Some(CandidateType::PeerReflexive),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            CandidateType::Host => "host",
            CandidateType::Relay => "relay",
            CandidateType::ServerReflexive => "srflx",
            CandidateType::PeerReflexive => "prflx",
        }
    }
}

impl fmt::Display for CandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkProtocol {
    Udp,
    Tcp,
}

impl NetworkProtocol {
    pub fn as_token(self) -> &'static str {
        match self {
            NetworkProtocol::Udp => "UDP",
            NetworkProtocol::Tcp => "TCP",
        }
    }
}

/// One connectivity candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub foundation: String,
    pub component: ComponentType,
    pub candidate_type: CandidateType,
    pub protocol: NetworkProtocol,
    pub ip: String,
    pub port: u16,
    pub priority: u32,
    /// Base address of a server-reflexive candidate
    pub base_ip: Option<String>,
    pub base_port: Option<u16>,
    /// ICE credentials; shared by every candidate of one set
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Candidate {
    pub fn new(
        foundation: impl Into<String>,
        component: ComponentType,
        candidate_type: CandidateType,
        protocol: NetworkProtocol,
        ip: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            foundation: foundation.into(),
            component,
            candidate_type,
            protocol,
            ip: ip.into(),
            port,
            priority: 0,
            base_ip: None,
            base_port: None,
            username: None,
            password: None,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_base(mut self, ip: impl Into<String>, port: u16) -> Self {
        self.base_ip = Some(ip.into());
        self.base_port = Some(port);
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// The value of an `a=candidate:` line (without the `a=candidate:` prefix)
    pub fn to_attribute_value(&self) -> String {
        let mut value = format!(
            "{} {} {} {} {} {} typ {}",
            self.foundation,
            self.component.id(),
            self.protocol.as_token(),
            self.priority,
            self.ip,
            self.port,
            self.candidate_type.as_token(),
        );
        if self.candidate_type == CandidateType::ServerReflexive {
            if let (Some(ip), Some(port)) = (&self.base_ip, self.base_port) {
                value.push_str(&format!(" raddr {} rport {}", ip, port));
            }
        }
        value
    }
}

/// Read one `candidate` attribute value. `None` drops the candidate.
pub fn parse_candidate(value: &str) -> Option<Candidate> {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    if tokens.len() < 8 {
        trace!("Dropping short candidate: {}", value);
        return None;
    }

    let component = ComponentType::from_id(tokens[1].parse().unwrap_or(0));

    if tokens[2] != "UDP" {
        trace!("Dropping non-UDP candidate: {}", value);
        return None;
    }

    let priority = tokens[3].parse().ok()?;
    let port = tokens[5].parse().ok()?;
    let candidate_type = CandidateType::from_token(tokens[7])?;

    let mut candidate = Candidate::new(
        tokens[0],
        component,
        candidate_type,
        NetworkProtocol::Udp,
        tokens[4],
        port,
    )
    .with_priority(priority);

    // raddr/rport follow the type as keyword/value pairs
    let mut rest = tokens[8..].chunks_exact(2);
    for pair in &mut rest {
        match pair[0] {
            "raddr" => candidate.base_ip = Some(pair[1].to_string()),
            "rport" => candidate.base_port = pair[1].parse().ok(),
            _ => {}
        }
    }

    Some(candidate)
}

/// Parse every usable `candidate` attribute, stamping the set's ICE
/// credentials onto each parsed candidate.
pub fn parse_candidates(attributes: &SdpAttributes) -> Vec<Candidate> {
    let username = attributes.find("ice-ufrag");
    let password = attributes.find("ice-pwd");

    let mut candidates: Vec<Candidate> = attributes
        .values("candidate")
        .filter_map(parse_candidate)
        .collect();

    if let Some(username) = username {
        for candidate in &mut candidates {
            candidate.username = Some(username.to_string());
            candidate.password = password.map(str::to_string);
        }
    }

    debug!("Parsed {} remote candidates", candidates.len());
    candidates
}

/// Host candidates for a peer that sent no candidate lines: RTP on the media
/// port, RTCP on the next one. A media port of 65535 leaves no room for RTCP.
pub fn legacy_candidates(ip: &str, port: u16) -> Vec<Candidate> {
    let host = |component, port| {
        Candidate::new(
            LEGACY_FOUNDATION,
            component,
            CandidateType::Host,
            NetworkProtocol::Udp,
            ip,
            port,
        )
    };

    let mut candidates = vec![host(ComponentType::Rtp, port)];
    match port.checked_add(1) {
        Some(rtcp) => candidates.push(host(ComponentType::Rtcp, rtcp)),
        None => warn!("No RTCP port above media port {}", port),
    }
    candidates
}

/// Remove candidates whose foundation occurs only once.
///
/// Gathering may report completion before every RTP+RTCP pair is known;
/// advertising half a pair confuses peers.
pub fn retain_complete_pairs(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for candidate in &candidates {
        *counts.entry(candidate.foundation.as_str()).or_default() += 1;
    }
    let lone: Vec<String> = counts
        .into_iter()
        .filter(|(_, count)| *count == 1)
        .map(|(foundation, _)| foundation.to_string())
        .collect();

    if !lone.is_empty() {
        debug!("Dropping {} lone local candidates", lone.len());
    }

    candidates
        .into_iter()
        .filter(|c| !lone.contains(&c.foundation))
        .collect()
}

/// Candidate section of an outgoing SDP body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateBlock {
    /// Lines to place after the `m=` line (may be empty)
    pub lines: String,
    /// Port of the local host RTP candidate, used on the `m=` line
    pub rtp_port: Option<u16>,
    /// Port of the local host RTCP candidate
    pub rtcp_port: Option<u16>,
}

/// Format the local candidate set and the active remote candidates.
///
/// In legacy mode nothing is emitted: only the host RTP port is looked up
/// for the `m=` line.
pub fn format_candidates(
    local: &[Candidate],
    remote_active: &[Candidate],
    legacy: bool,
    max_ptime: u32,
) -> CandidateBlock {
    let host_port = |component: ComponentType| {
        local
            .iter()
            .find(|c| c.candidate_type == CandidateType::Host && c.component == component)
            .map(|c| c.port)
    };

    let mut block = CandidateBlock {
        lines: String::new(),
        rtp_port: host_port(ComponentType::Rtp),
        rtcp_port: None,
    };

    if legacy {
        return block;
    }
    block.rtcp_port = host_port(ComponentType::Rtcp);

    let out = &mut block.lines;
    if let Some(first) = local.first() {
        if let Some(username) = &first.username {
            out.push_str(&format!("a=ice-ufrag:{}\r\n", username));
        }
        if let Some(password) = &first.password {
            out.push_str(&format!("a=ice-pwd:{}\r\n", password));
        }
    }

    for candidate in local {
        out.push_str(&format!("a=candidate:{}\r\n", candidate.to_attribute_value()));
    }

    if !remote_active.is_empty() {
        let mut sorted: Vec<&Candidate> = remote_active.iter().collect();
        sorted.sort_by_key(|c| c.component);
        let summary: Vec<String> = sorted
            .iter()
            .map(|c| format!("{} {} {}", c.component.id(), c.ip, c.port))
            .collect();
        out.push_str(&format!("a=remote-candidates:{}\r\n", summary.join(" ")));
    }

    if let Some(rtcp_port) = block.rtcp_port {
        out.push_str(&format!("a=maxptime:{}\r\na=rtcp:{}\r\n", max_ptime, rtcp_port));
    }

    block
}
