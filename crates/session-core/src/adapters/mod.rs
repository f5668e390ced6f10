//! Collaborator interfaces: SIP transport and media backend
pub mod media;
pub mod transport;

pub use media::{MediaBackend, StreamId, StreamParams};
pub use transport::{OutgoingRequest, OutgoingResponse, SipTransport, CONTENT_TYPE_SDP};
