//! SDP line splitting
//!
//! Each SDP line has the format `<type>=<value>` where type is a single
//! character. Negotiation only interprets `o=`, `m=` and `a=` lines; the rest
//! are accepted and ignored.

use nom::{
    character::complete::{anychar, char, not_line_ending},
    IResult,
};

use tracing::debug;

/// Parse an SDP line into its type character and trimmed value
///
/// # Examples
///
/// ```
/// use duet_sip_core::sdp::line_parser::parse_sdp_line;
///
/// let (_, (key, value)) = parse_sdp_line("a=rtpmap:0 PCMU/8000").unwrap();
/// assert_eq!(key, 'a');
/// assert_eq!(value, "rtpmap:0 PCMU/8000");
/// ```
pub fn parse_sdp_line(input: &str) -> IResult<&str, (char, &str)> {
    let (input, key) = anychar(input)?;
    let (input, _) = char('=')(input)?;
    let (input, value) = not_line_ending(input)?;

    let input = input.trim_start_matches(['\r', '\n']);

    Ok((input, (key, value.trim())))
}

/// Split a body into `(type, value)` pairs.
///
/// Blank lines and lines without the `x=` shape are skipped; only attribute
/// lines are held to a stricter standard (see [`super::attributes`]).
pub fn split_lines(body: &str) -> Vec<(char, &str)> {
    let mut lines = Vec::new();
    for raw in body.lines() {
        let raw = raw.trim_end_matches('\r');
        if raw.trim().is_empty() {
            continue;
        }
        match parse_sdp_line(raw) {
            Ok((_, pair)) => lines.push(pair),
            Err(_) => debug!("Skipping non-SDP line: {}", raw),
        }
    }
    lines
}
