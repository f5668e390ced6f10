//! SIP message view and SDP negotiation model for the duet call engine.
//!
//! This crate is the pure, synchronous half of the engine. It knows how to
//! read the fields of a SIP message that call negotiation cares about and how
//! to move between SDP text and structured codecs and connectivity
//! candidates. It performs no I/O.
//!
//! ## Modules
//!
//! - [`message`]: read-only view over SIP requests/responses handed to us by
//!   the transport layer
//! - [`sdp`]: attribute set, codec model, candidate model, remote description
//!   parsing and the document builder used for every offer and answer
//!
//! ## Example
//!
//! ```rust
//! use duet_sip_core::sdp::{RemoteDescription, codec::{parse_codecs, prune_codecs}};
//!
//! let body = "v=0\r\n\
//!             o=- 0 0 IN IP4 10.0.0.5\r\n\
//!             m=audio 5000 RTP/AVP 0\r\n\
//!             a=rtpmap:0 PCMU/8000\r\n\
//!             a=candidate:1 1 UDP 100 10.0.0.5 5000 typ host\r\n";
//!
//! let remote = RemoteDescription::parse(body).unwrap();
//! assert!(!remote.legacy);
//! assert_eq!(remote.candidates.len(), 1);
//!
//! let offered = parse_codecs(&remote.attributes);
//! let usable = prune_codecs(&offered, offered.clone());
//! assert_eq!(usable[0].name, "PCMU");
//! ```

pub mod error;
pub mod message;
pub mod sdp;

pub use error::{Result, SdpError};
pub use message::{Method, SipMessage, StartLine};

/// Commonly used types
pub mod prelude {
    pub use crate::error::{Result, SdpError};
    pub use crate::message::{Method, SipMessage, StartLine};
    pub use crate::sdp::builder::SessionDescriptionBuilder;
    pub use crate::sdp::candidate::{Candidate, CandidateType, ComponentType, NetworkProtocol};
    pub use crate::sdp::codec::{Codec, CodecParameter, MediaType};
    pub use crate::sdp::{RemoteDescription, SdpAttributes, SessionDescription};
}
