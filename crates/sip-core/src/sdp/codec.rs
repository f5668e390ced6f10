//! SDP codec model
//!
//! Converts `a=rtpmap` / `a=fmtp` attributes to [`Codec`] descriptors and back,
//! and intersects the peer's codec list with ours.
//!
//! ```text
//! a=rtpmap:101 telephone-event/8000     ->  Codec { id: 101, name: "telephone-event",
//! a=fmtp:101 events=0-16                          clock_rate: 8000,
//!                                                 params: [events=0-16] }
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::attributes::SdpAttributes;

/// Kind of media a codec carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    Audio,
    Video,
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Audio => write!(f, "audio"),
            MediaType::Video => write!(f, "video"),
        }
    }
}

/// One `name=value` optional parameter taken from `a=fmtp`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecParameter {
    pub name: String,
    pub value: String,
}

/// Codec descriptor
///
/// Two codecs are considered the same for negotiation when their names are
/// equal (case-sensitive); payload id and clock rate do not take part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Codec {
    pub id: u8,
    pub name: String,
    pub clock_rate: u32,
    pub media_type: MediaType,
    pub params: Vec<CodecParameter>,
}

impl Codec {
    pub fn new(id: u8, name: impl Into<String>, clock_rate: u32, media_type: MediaType) -> Self {
        Self {
            id,
            name: name.into(),
            clock_rate,
            media_type,
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_param(name, value);
        self
    }

    pub fn add_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.push(CodecParameter {
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn matches(&self, other: &Codec) -> bool {
        self.name == other.name
    }
}

/// Split an rtpmap value (`0 PCMU/8000[/channels]`) into id, name and clock rate
fn parse_rtpmap(value: &str) -> Option<(u8, &str, u32)> {
    let mut tokens = value.splitn(3, |c| c == ' ' || c == '/');
    let id = tokens.next()?.trim().parse().ok()?;
    let name = tokens.next()?.trim();
    let clock_rate = tokens
        .next()?
        .split('/')
        .next()?
        .trim()
        .parse()
        .ok()?;
    if name.is_empty() {
        return None;
    }
    Some((id, name, clock_rate))
}

/// A `name=value` fmtp token whose name is purely alphanumeric
fn parse_fmtp_param(token: &str) -> Option<(&str, &str)> {
    let (name, value) = token.split_once('=')?;
    if name.is_empty() || value.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some((name, value))
}

/// Build the codec list announced in an attribute set.
///
/// Every `rtpmap` occurrence yields one audio codec; the optional parameters
/// of each `fmtp` whose leading payload id matches are attached to it.
/// rtpmap lines that cannot be read are skipped.
pub fn parse_codecs(attributes: &SdpAttributes) -> Vec<Codec> {
    let mut codecs = Vec::new();

    for rtpmap in attributes.values("rtpmap") {
        let Some((id, name, clock_rate)) = parse_rtpmap(rtpmap) else {
            warn!("Ignoring unreadable rtpmap: {}", rtpmap);
            continue;
        };

        let mut codec = Codec::new(id, name, clock_rate, MediaType::Audio);

        for fmtp in attributes.values("fmtp") {
            let mut tokens = fmtp.split(' ').filter(|t| !t.is_empty());
            let matches_id = tokens
                .next()
                .and_then(|t| t.parse::<u8>().ok())
                .map_or(false, |fmtp_id| fmtp_id == id);
            if !matches_id {
                continue;
            }
            for (param, value) in tokens.filter_map(parse_fmtp_param) {
                codec.add_param(param, value);
            }
        }

        codecs.push(codec);
    }

    debug!("Parsed {} codecs from SDP", codecs.len());
    codecs
}

/// Keep, in the peer's order, only the remote codecs we also support.
///
/// An empty result means there is nothing both sides can speak; callers treat
/// it as a failed negotiation.
pub fn prune_codecs(local: &[Codec], remote: Vec<Codec>) -> Vec<Codec> {
    remote
        .into_iter()
        .filter(|r| local.iter().any(|l| l.matches(r)))
        .collect()
}

/// Drop codecs whose names appear in `excluded`
pub fn filter_excluded(codecs: Vec<Codec>, excluded: &[String]) -> Vec<Codec> {
    codecs
        .into_iter()
        .filter(|c| !excluded.iter().any(|name| name == &c.name))
        .collect()
}

/// `a=rtpmap` (and, when parameters exist, `a=fmtp`) lines for each codec
pub fn format_codecs(codecs: &[Codec]) -> String {
    let mut out = String::new();
    for codec in codecs {
        out.push_str(&format!("a=rtpmap:{} {}/{}\r\n", codec.id, codec.name, codec.clock_rate));
        if !codec.params.is_empty() {
            out.push_str(&format!("a=fmtp:{}", codec.id));
            for param in &codec.params {
                out.push_str(&format!(" {}={}", param.name, param.value));
            }
            out.push_str("\r\n");
        }
    }
    out
}

/// Payload ids for the `m=` line, each preceded by a space
pub fn format_codec_ids(codecs: &[Codec]) -> String {
    codecs.iter().map(|c| format!(" {}", c.id)).collect()
}
