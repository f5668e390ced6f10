//! SIP message view
//!
//! The transport and dialog layers are outside this crate. What reaches the
//! call engine is an already-framed message; [`SipMessage`] exposes the small
//! set of fields negotiation reads (Call-ID, From/To tags, CSeq, RSeq, status
//! and body) and lets the engine stamp headers onto a stored request before
//! replying to it.

use std::fmt;
use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::{take_till, take_till1, take_until},
    character::complete::{char, space0},
    combinator::{opt, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded},
    IResult,
};
use serde::{Deserialize, Serialize};

/// SIP request method
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Invite,
    Ack,
    Bye,
    Prack,
    Cancel,
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Invite => "INVITE",
            Method::Ack => "ACK",
            Method::Bye => "BYE",
            Method::Prack => "PRACK",
            Method::Cancel => "CANCEL",
            Method::Other(name) => name,
        }
    }
}

impl FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "INVITE" => Method::Invite,
            "ACK" => Method::Ack,
            "BYE" => Method::Bye,
            "PRACK" => Method::Prack,
            "CANCEL" => Method::Cancel,
            _ => Method::Other(s.to_string()),
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First line of a SIP message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartLine {
    Request { method: Method, uri: String },
    Response { status: u16, reason: String },
}

/// A framed SIP request or response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipMessage {
    pub start_line: StartLine,
    headers: Vec<(String, String)>,
    pub body: String,
}

/// Header names with their RFC 3261 compact forms
const COMPACT_FORMS: &[(&str, &str)] = &[
    ("call-id", "i"),
    ("from", "f"),
    ("to", "t"),
    ("content-type", "c"),
    ("contact", "m"),
];

fn header_matches(candidate: &str, wanted: &str) -> bool {
    if candidate.eq_ignore_ascii_case(wanted) {
        return true;
    }
    COMPACT_FORMS.iter().any(|(long, short)| {
        (wanted.eq_ignore_ascii_case(long) && candidate.eq_ignore_ascii_case(short))
            || (wanted.eq_ignore_ascii_case(short) && candidate.eq_ignore_ascii_case(long))
    })
}

impl SipMessage {
    /// Create a request with no headers and an empty body
    pub fn request(method: Method, uri: impl Into<String>) -> Self {
        Self {
            start_line: StartLine::Request {
                method,
                uri: uri.into(),
            },
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Create a response with no headers and an empty body
    pub fn response(status: u16, reason: impl Into<String>) -> Self {
        Self {
            start_line: StartLine::Response {
                status,
                reason: reason.into(),
            },
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_header(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Append a header, keeping any existing header of the same name
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Replace the first header with this name, or append it if absent
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.headers.iter_mut().find(|(n, _)| header_matches(n, name)) {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name.to_string(), value)),
        }
    }

    /// First value of a header, matched case-insensitively (compact forms included)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| header_matches(n, name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a repeatable header, in arrival order
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| header_matches(n, name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn is_request(&self) -> bool {
        matches!(self.start_line, StartLine::Request { .. })
    }

    pub fn is_response(&self) -> bool {
        matches!(self.start_line, StartLine::Response { .. })
    }

    pub fn method(&self) -> Option<&Method> {
        match &self.start_line {
            StartLine::Request { method, .. } => Some(method),
            StartLine::Response { .. } => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match &self.start_line {
            StartLine::Response { status, .. } => Some(*status),
            StartLine::Request { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match &self.start_line {
            StartLine::Response { reason, .. } => Some(reason),
            StartLine::Request { .. } => None,
        }
    }

    pub fn call_id(&self) -> Option<&str> {
        self.header("Call-ID").map(str::trim)
    }

    pub fn from_header(&self) -> Option<&str> {
        self.header("From")
    }

    pub fn to_header(&self) -> Option<&str> {
        self.header("To")
    }

    pub fn from_tag(&self) -> Option<&str> {
        self.from_header().and_then(tag_param)
    }

    pub fn to_tag(&self) -> Option<&str> {
        self.to_header().and_then(tag_param)
    }

    /// CSeq number and method
    pub fn cseq(&self) -> Option<(u32, Method)> {
        let value = self.header("CSeq")?;
        let mut parts = value.split_whitespace();
        let number = parts.next()?.parse().ok()?;
        let method = parts.next()?.parse().ok()?;
        Some((number, method))
    }

    /// Raw CSeq header value, as echoed into RAck
    pub fn cseq_raw(&self) -> Option<&str> {
        self.header("CSeq").map(str::trim)
    }

    pub fn rseq(&self) -> Option<u32> {
        self.header("RSeq")?.trim().parse().ok()
    }
}

// name-addr: optional display name, then the URI in angle brackets
fn name_addr(input: &str) -> IResult<&str, &str> {
    preceded(take_until("<"), delimited(char('<'), take_until(">"), char('>')))(input)
}

// addr-spec: a bare URI, which runs up to the first ';'
fn addr_spec(input: &str) -> IResult<&str, &str> {
    take_till(|c: char| c == ';')(input)
}

// ;name[=value]
fn header_param(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    preceded(
        delimited(space0, char(';'), space0),
        pair(
            take_till1(|c: char| c == '=' || c == ';' || c.is_whitespace()),
            opt(preceded(
                delimited(space0, char('='), space0),
                take_till(|c: char| c == ';' || c.is_whitespace()),
            )),
        ),
    )(input)
}

/// Extract the bare URI from a From/To/Contact value.
///
/// `"Bob" <sip:bob@example.com>;tag=1234` becomes `sip:bob@example.com`.
pub fn extract_uri(value: &str) -> &str {
    let value = value.trim();
    match alt((name_addr, addr_spec))(value) {
        Ok((_, uri)) => uri.trim(),
        Err(_) => value,
    }
}

/// Value of the `tag` parameter of a From/To header, if any.
///
/// Parameters inside the angle brackets belong to the URI, not the header.
pub fn tag_param(value: &str) -> Option<&str> {
    let (_, (_, params)) = pair(alt((recognize(name_addr), addr_spec)), many0(header_param))(value.trim()).ok()?;
    params
        .into_iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("tag"))
        .and_then(|(_, tag)| tag)
}

/// Reason phrases for the status codes the call engine emits
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Trying",
        180 => "Ringing",
        183 => "Session Progress",
        200 => "OK",
        400 => "Bad Request",
        480 => "Temporarily Unavailable",
        481 => "Call/Transaction Does Not Exist",
        486 => "Busy Here",
        487 => "Request Terminated",
        488 => "Not Acceptable Here",
        491 => "Request Pending",
        500 => "Server Internal Error",
        603 => "Decline",
        _ => "Unknown",
    }
}
