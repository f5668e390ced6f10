//! Shared test harness: a recording SIP transport, a scripted media backend
//! and canned peer messages.

#![allow(dead_code)]

use duet_session_core::{
    CallCoordinator, CallNotification, Dialog, MediaBackend, NegotiationConfig, OutgoingRequest, OutgoingResponse,
    Result, SipTransport, StreamId, StreamParams, TransactionKey,
};
use duet_sip_core::sdp::candidate::{Candidate, CandidateType, ComponentType, NetworkProtocol};
use duet_sip_core::sdp::codec::{Codec, MediaType};
use duet_sip_core::{Method, SipMessage};
use tokio::sync::mpsc;

pub const LOCAL_IP: &str = "10.0.0.1";
pub const PEER: &str = "sip:bob@example.com";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("duet_session_core=debug")
        .with_test_writer()
        .try_init();
}

/// A request the coordinator sent, with the dialog state it was sent under
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub key: TransactionKey,
    pub request: OutgoingRequest,
    pub remote_tag: Option<String>,
}

impl SentRequest {
    pub fn body(&self) -> &str {
        self.request.body.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub requests: Vec<SentRequest>,
    pub responses: Vec<(SipMessage, OutgoingResponse)>,
}

impl RecordingTransport {
    pub fn requests_of(&self, method: Method) -> Vec<&SentRequest> {
        self.requests.iter().filter(|r| r.request.method == method).collect()
    }

    pub fn last_request(&self, method: Method) -> Option<&SentRequest> {
        self.requests.iter().rev().find(|r| r.request.method == method)
    }

    pub fn statuses(&self) -> Vec<u16> {
        self.responses.iter().map(|(_, r)| r.status).collect()
    }

    pub fn response_with(&self, status: u16) -> Option<&OutgoingResponse> {
        self.responses.iter().map(|(_, r)| r).find(|r| r.status == status)
    }
}

impl SipTransport for RecordingTransport {
    fn contact(&self) -> String {
        format!("<sip:alice@{}:5060;transport=udp>", LOCAL_IP)
    }

    fn send_request(&mut self, dialog: &Dialog, request: OutgoingRequest) -> Result<TransactionKey> {
        let key = TransactionKey::new(dialog.call_id.clone(), request.cseq, request.method.clone());
        self.requests.push(SentRequest {
            key: key.clone(),
            request,
            remote_tag: dialog.remote_tag.clone(),
        });
        Ok(key)
    }

    fn send_response(&mut self, request: &SipMessage, response: OutgoingResponse) -> Result<()> {
        self.responses.push((request.clone(), response));
        Ok(())
    }
}

/// Media backend that records what the engine asks of it
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    pub codecs: Vec<Codec>,
    /// Report gathering as finished as soon as a stream exists
    pub prepared: bool,
    pub sessions: Vec<String>,
    pub destroyed: usize,
    pub streams: Vec<(StreamId, StreamParams)>,
    pub removed: Vec<StreamId>,
    pub remote_codecs: Vec<(StreamId, Vec<Codec>)>,
    pub remote_candidates: Vec<(StreamId, Vec<Candidate>)>,
    /// Backend callbacks in call order, e.g. `hold(false)`
    pub calls: Vec<String>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            codecs: vec![
                Codec::new(0, "PCMU", 8000, MediaType::Audio),
                Codec::new(8, "PCMA", 8000, MediaType::Audio),
                Codec::new(101, "telephone-event", 8000, MediaType::Audio).with_param("events", "0-16"),
            ],
            ..Default::default()
        }
    }

    pub fn with_codecs(mut self, codecs: Vec<Codec>) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn prepared(mut self) -> Self {
        self.prepared = true;
        self
    }

    pub fn called(&self, call: &str) -> bool {
        self.calls.iter().any(|c| c == call)
    }

    fn host(component: ComponentType, port: u16) -> Candidate {
        Candidate::new("1", component, CandidateType::Host, NetworkProtocol::Udp, LOCAL_IP, port)
            .with_priority(2130706431 - component.id())
            .with_credentials("lufrag", "lpwd")
    }
}

impl MediaBackend for ScriptedBackend {
    fn create_session(&mut self, call_id: &str) -> Result<()> {
        self.sessions.push(call_id.to_string());
        Ok(())
    }

    fn destroy_session(&mut self) {
        self.destroyed += 1;
    }

    fn add_stream(&mut self, params: StreamParams) -> Result<StreamId> {
        let id = StreamId(self.streams.len() as u32 + 1);
        self.streams.push((id, params));
        Ok(id)
    }

    fn remove_stream(&mut self, stream: StreamId) {
        self.removed.push(stream);
    }

    fn is_initiator(&self, stream: StreamId) -> bool {
        self.streams
            .iter()
            .find(|(id, _)| *id == stream)
            .map_or(false, |(_, p)| p.initiator)
    }

    fn local_codecs(&self, media_type: MediaType) -> Vec<Codec> {
        self.codecs.iter().filter(|c| c.media_type == media_type).cloned().collect()
    }

    fn local_candidates(&self, _stream: StreamId) -> Vec<Candidate> {
        vec![
            Self::host(ComponentType::Rtp, 7000),
            Self::host(ComponentType::Rtcp, 7001),
        ]
    }

    fn active_local_candidates(&self, _stream: StreamId) -> Vec<Candidate> {
        Vec::new()
    }

    fn active_remote_candidates(&self, _stream: StreamId) -> Vec<Candidate> {
        Vec::new()
    }

    fn add_remote_candidates(&mut self, stream: StreamId, candidates: Vec<Candidate>) {
        self.remote_candidates.push((stream, candidates));
    }

    fn set_remote_codecs(&mut self, stream: StreamId, codecs: Vec<Codec>) -> Result<()> {
        self.remote_codecs.push((stream, codecs));
        Ok(())
    }

    fn candidates_prepared(&self, _stream: StreamId) -> bool {
        self.prepared
    }

    fn accept(&mut self, local: bool) {
        self.calls.push(format!("accept({})", local));
    }

    fn reject(&mut self, local: bool) {
        self.calls.push(format!("reject({})", local));
    }

    fn hangup(&mut self, local: bool) {
        self.calls.push(format!("hangup({})", local));
    }

    fn hold(&mut self, local: bool) {
        self.calls.push(format!("hold({})", local));
    }

    fn unhold(&mut self, local: bool) {
        self.calls.push(format!("unhold({})", local));
    }
}

pub type TestCoordinator = CallCoordinator<RecordingTransport, ScriptedBackend>;

pub fn coordinator(backend: ScriptedBackend) -> (TestCoordinator, mpsc::UnboundedReceiver<CallNotification>) {
    init_tracing();
    CallCoordinator::new(NegotiationConfig::new(LOCAL_IP), RecordingTransport::default(), backend)
        .expect("valid config")
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<CallNotification>) -> Vec<CallNotification> {
    let mut out = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        out.push(notification);
    }
    out
}

/// Peer body with ICE candidates; `extra` lines go before the codecs
pub fn ice_body(extra: &str) -> String {
    format!(
        "v=0\r\n\
         o=- 0 0 IN IP4 10.0.0.9\r\n\
         s=session\r\n\
         c=IN IP4 10.0.0.9\r\n\
         b=CT:99980\r\n\
         t=0 0\r\n\
         m=audio 6000 RTP/AVP 0\r\n\
         a=ice-ufrag:rufrag\r\n\
         a=ice-pwd:rpwd\r\n\
         a=candidate:1 1 UDP 2130706431 10.0.0.9 6000 typ host\r\n\
         a=candidate:1 2 UDP 2130706430 10.0.0.9 6001 typ host\r\n\
         {extra}\
         a=rtpmap:0 PCMU/8000\r\n",
        extra = extra
    )
}

/// Peer body without candidates
pub fn legacy_body(extra: &str) -> String {
    format!(
        "v=0\r\n\
         o=- 0 0 IN IP4 10.0.0.9\r\n\
         s=session\r\n\
         c=IN IP4 10.0.0.9\r\n\
         t=0 0\r\n\
         m=audio 6000 RTP/AVP 0\r\n\
         {extra}\
         a=rtpmap:0 PCMU/8000\r\n",
        extra = extra
    )
}

pub fn invite(call_id: &str, body: &str) -> SipMessage {
    SipMessage::request(Method::Invite, format!("sip:alice@{}", LOCAL_IP))
        .with_header("Call-ID", call_id)
        .with_header("From", format!("<{}>;tag=peer1", PEER))
        .with_header("To", "<sip:alice@example.com>")
        .with_header("CSeq", "1 INVITE")
        .with_header("Content-Type", "application/sdp")
        .with_body(body)
}

pub fn request(method: Method, call_id: &str, cseq: u32) -> SipMessage {
    SipMessage::request(method.clone(), format!("sip:alice@{}", LOCAL_IP))
        .with_header("Call-ID", call_id)
        .with_header("From", format!("<{}>;tag=peer1", PEER))
        .with_header("To", "<sip:alice@example.com>")
        .with_header("CSeq", format!("{} {}", cseq, method))
}

/// Peer response to one of our INVITEs
pub fn response(key: &TransactionKey, status: u16, reason: &str, body: &str) -> SipMessage {
    SipMessage::response(status, reason)
        .with_header("Call-ID", key.call_id.as_str())
        .with_header("From", "<sip:alice@example.com>;tag=ours")
        .with_header("To", format!("<{}>;tag=peer2", PEER))
        .with_header("CSeq", format!("{} INVITE", key.cseq))
        .with_body(body)
}
