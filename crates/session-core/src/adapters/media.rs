//! Media backend collaborator
//!
//! The backend gathers local candidates, runs connectivity checks and moves
//! audio. It reports back through [`crate::events::MediaEvent`]; the calls
//! below are the engine's side of that conversation.

use std::fmt;

use duet_sip_core::sdp::candidate::Candidate;
use duet_sip_core::sdp::codec::{Codec, MediaType};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Handle to one backend stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(pub u32);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// What to create when adding a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamParams {
    pub participant: String,
    pub media_type: MediaType,
    /// ICE connectivity checks on; off means bare UDP to the legacy host
    pub connectivity_checks: bool,
    pub initiator: bool,
}

pub trait MediaBackend {
    fn create_session(&mut self, call_id: &str) -> Result<()>;
    fn destroy_session(&mut self);

    fn add_stream(&mut self, params: StreamParams) -> Result<StreamId>;
    fn remove_stream(&mut self, stream: StreamId);
    fn is_initiator(&self, stream: StreamId) -> bool;

    /// Codecs this side can use for `media_type`, before exclusions
    fn local_codecs(&self, media_type: MediaType) -> Vec<Codec>;

    fn local_candidates(&self, stream: StreamId) -> Vec<Candidate>;
    /// Local candidates of established pairs; empty until checks succeed
    fn active_local_candidates(&self, stream: StreamId) -> Vec<Candidate>;
    fn active_remote_candidates(&self, stream: StreamId) -> Vec<Candidate>;

    fn add_remote_candidates(&mut self, stream: StreamId, candidates: Vec<Candidate>);
    fn set_remote_codecs(&mut self, stream: StreamId, codecs: Vec<Codec>) -> Result<()>;

    /// Local gathering already finished for `stream`
    fn candidates_prepared(&self, stream: StreamId) -> bool;

    fn accept(&mut self, local: bool);
    fn reject(&mut self, local: bool);
    fn hangup(&mut self, local: bool);
    fn hold(&mut self, local: bool);
    fn unhold(&mut self, local: bool);
}
