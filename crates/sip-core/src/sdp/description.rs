//! Whole-body SDP parsing

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::attributes::SdpAttributes;
use super::candidate::{legacy_candidates, parse_candidates, Candidate};
use super::line_parser::split_lines;
use crate::error::{Result, SdpError};

/// The parts of an SDP body that negotiation reads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub attributes: SdpAttributes,
    /// Address from the `o=` line
    pub origin_ip: Option<String>,
    /// Port from the `m=` line
    pub media_port: Option<u16>,
}

impl SessionDescription {
    /// Parse a body.
    ///
    /// Any `a=` line that does not split into a usable attribute fails the
    /// whole parse; nothing partially built is returned.
    pub fn parse(body: &str) -> Result<Self> {
        let mut description = SessionDescription::default();

        for (kind, value) in split_lines(body) {
            match kind {
                'a' => description.attributes.push_line(value)?,
                'o' => {
                    description.origin_ip = value.split_whitespace().nth(5).map(str::to_string);
                }
                'm' => {
                    if let Some(port) = value.split_whitespace().nth(1) {
                        let port = port
                            .parse()
                            .map_err(|_| SdpError::invalid_value("m= port", port))?;
                        description.media_port = Some(port);
                    }
                }
                _ => {}
            }
        }

        debug!(
            "Parsed SDP with {} attributes, origin {:?}, media port {:?}",
            description.attributes.len(),
            description.origin_ip,
            description.media_port
        );
        Ok(description)
    }

    pub fn is_inactive(&self) -> bool {
        self.attributes.contains("inactive")
    }

    /// Value of the `encryption` attribute, if the peer sent one
    pub fn encryption(&self) -> Option<&str> {
        self.attributes.find("encryption")
    }
}

/// A peer's offer or answer, with its candidates resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDescription {
    pub attributes: SdpAttributes,
    pub candidates: Vec<Candidate>,
    pub remote_ip: Option<String>,
    pub remote_port: Option<u16>,
    /// No candidate could be read and the two host candidates were synthesised
    pub legacy: bool,
}

impl RemoteDescription {
    /// Parse a peer body and resolve its candidates.
    ///
    /// When no usable `a=candidate` line exists the peer is treated as a
    /// legacy peer: two host candidates are built from the `o=` address and
    /// the `m=` port. Both fields are then mandatory.
    pub fn parse(body: &str) -> Result<Self> {
        let SessionDescription {
            attributes,
            origin_ip,
            media_port,
        } = SessionDescription::parse(body)?;

        let mut candidates = parse_candidates(&attributes);
        let legacy = candidates.is_empty();

        if legacy {
            let ip = origin_ip
                .as_deref()
                .ok_or(SdpError::MissingField { field: "o=" })?;
            let port = media_port.ok_or(SdpError::MissingField { field: "m=" })?;
            info!("Peer sent no candidates, using legacy host {}:{}", ip, port);
            candidates = legacy_candidates(ip, port);
        }

        Ok(Self {
            attributes,
            candidates,
            remote_ip: origin_ip,
            remote_port: media_port,
            legacy,
        })
    }

    pub fn is_inactive(&self) -> bool {
        self.attributes.contains("inactive")
    }

    pub fn encryption(&self) -> Option<&str> {
        self.attributes.find("encryption")
    }

    /// The peer demands encryption, which this side never offers
    pub fn requires_encryption(&self) -> bool {
        self.encryption() == Some("required")
    }
}
