//! SDP offer/answer model
//!
//! The call engine only needs a narrow slice of SDP: the `o=` origin address,
//! the `m=audio` port and the `a=` attributes carrying codecs and
//! connectivity candidates. This module reads exactly that and writes the
//! fixed document layout used for every offer and answer.
//!
//! - [`line_parser`]: `x=value` line split
//! - [`attributes`]: ordered, repeatable attribute set
//! - [`codec`]: `rtpmap`/`fmtp` model and codec matching
//! - [`candidate`]: `candidate`/`ice-*`/`remote-candidates` model
//! - [`description`]: whole-body parsing, including the legacy fallback
//! - [`builder`]: outgoing document builder

pub mod attributes;
pub mod builder;
pub mod candidate;
pub mod codec;
pub mod description;
pub mod line_parser;

pub use attributes::{SdpAttribute, SdpAttributes};
pub use builder::SessionDescriptionBuilder;
pub use description::{RemoteDescription, SessionDescription};
