//! Core CallCoordinator structure and the helpers every transition shares

use duet_sip_core::message::reason_phrase;
use duet_sip_core::sdp::candidate::retain_complete_pairs;
use duet_sip_core::sdp::codec::{filter_excluded, parse_codecs, prune_codecs, Codec, MediaType};
use duet_sip_core::sdp::{RemoteDescription, SessionDescriptionBuilder};
use duet_sip_core::Method;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::adapters::{MediaBackend, OutgoingRequest, OutgoingResponse, SipTransport};
use crate::config::NegotiationConfig;
use crate::dialog::TransactionKey;
use crate::errors::{Result, SessionError};
use crate::events::CallNotification;
use crate::session::{CallInfo, CallSession, CallState, InviteKind};

/// Drives the single active call of one endpoint.
///
/// The coordinator owns the active-call slot, the SIP transport and the
/// media backend. All transitions run through
/// [`CallCoordinator::handle_event`], one event at a time.
pub struct CallCoordinator<T: SipTransport, M: MediaBackend> {
    pub(super) config: NegotiationConfig,
    pub(super) transport: T,
    pub(super) backend: M,
    pub(super) active: Option<CallSession>,
    notifications: mpsc::UnboundedSender<CallNotification>,
}

impl<T: SipTransport, M: MediaBackend> CallCoordinator<T, M> {
    /// Create a coordinator and the receiver for its notifications
    pub fn new(
        config: NegotiationConfig,
        transport: T,
        backend: M,
    ) -> Result<(Self, mpsc::UnboundedReceiver<CallNotification>)> {
        config.validate()?;
        let (notifications, notification_rx) = mpsc::unbounded_channel();
        info!("Call coordinator ready on {}", config.local_ip);
        Ok((
            Self {
                config,
                transport,
                backend,
                active: None,
                notifications,
            },
            notification_rx,
        ))
    }

    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn backend(&self) -> &M {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut M {
        &mut self.backend
    }

    pub fn active_call(&self) -> Option<&CallInfo> {
        self.active.as_ref().map(CallSession::info)
    }

    pub fn active_session(&self) -> Option<&CallSession> {
        self.active.as_ref()
    }

    pub(super) fn session(&self) -> Result<&CallSession> {
        self.active.as_ref().ok_or(SessionError::NoActiveCall)
    }

    pub(super) fn session_mut(&mut self) -> Result<&mut CallSession> {
        self.active.as_mut().ok_or(SessionError::NoActiveCall)
    }

    pub(super) fn notify(&self, notification: CallNotification) {
        if self.notifications.send(notification).is_err() {
            trace!("Notification receiver dropped");
        }
    }

    /// Move the active call to `state` and publish the change
    pub(super) fn transition(&mut self, state: CallState) {
        let Some(session) = self.active.as_mut() else {
            return;
        };
        let old = session.set_state(state);
        if old != state {
            let call_id = session.call_id().to_string();
            self.notify(CallNotification::StateChanged {
                call_id,
                old_state: Some(old),
                new_state: state,
            });
        }
    }

    /// Put a new call into the empty slot
    pub(super) fn install(&mut self, session: CallSession) {
        self.notify(CallNotification::StateChanged {
            call_id: session.call_id().to_string(),
            old_state: None,
            new_state: session.state(),
        });
        self.active = Some(session);
    }

    /// Codecs we announce: the backend's list minus the excluded names
    pub(super) fn local_codecs(&self) -> Vec<Codec> {
        filter_excluded(
            self.backend.local_codecs(MediaType::Audio),
            &self.config.excluded_codecs,
        )
    }

    /// Parse a peer body and intersect its codecs with ours.
    ///
    /// Nothing is stored; the caller replaces the session's remote state
    /// only when this succeeds.
    pub(super) fn negotiate(&self, body: &str) -> Result<(RemoteDescription, Vec<Codec>)> {
        let remote = RemoteDescription::parse(body)?;
        let codecs = prune_codecs(&self.local_codecs(), parse_codecs(&remote.attributes));
        if codecs.is_empty() {
            warn!("No codec in common with peer");
            return Err(SessionError::NoCommonCodec);
        }
        debug!(
            "Negotiated codecs: {:?}",
            codecs.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
        );
        Ok((remote, codecs))
    }

    /// Store a negotiated description and hand it to the current stream
    pub(super) fn apply_remote(&mut self, remote: RemoteDescription, codecs: Vec<Codec>) -> Result<()> {
        let candidates = remote.candidates.clone();
        let session = self.active.as_mut().ok_or(SessionError::NoActiveCall)?;
        session.set_remote(remote, codecs.clone());
        if let Some(stream) = session.stream {
            self.backend.set_remote_codecs(stream, codecs)?;
            self.backend.add_remote_candidates(stream, candidates);
        }
        Ok(())
    }

    /// SDP body for an offer or answer of the active call
    pub(super) fn build_sdp(&self, session: &CallSession) -> String {
        let (local, remote_active) = match session.stream {
            Some(stream) => {
                let mut local = self.backend.active_local_candidates(stream);
                if local.is_empty() {
                    local = self.backend.local_candidates(stream);
                    if self.config.drop_incomplete_candidate_pairs {
                        local = retain_complete_pairs(local);
                    }
                }
                (local, self.backend.active_remote_candidates(stream))
            }
            None => (Vec::new(), Vec::new()),
        };

        SessionDescriptionBuilder::new(self.config.local_ip.as_str())
            .session_name(self.config.session_name.as_str())
            .bandwidth(self.config.bandwidth.as_str())
            .codecs(self.local_codecs())
            .local_candidates(local)
            .remote_candidates(remote_active)
            .legacy(session.is_legacy())
            .hold(session.is_on_hold())
            .max_ptime(self.config.max_ptime)
            .build()
    }

    /// Send an INVITE carrying a fresh offer
    pub(super) fn send_invite(&mut self, kind: InviteKind) -> Result<()> {
        let session = self.session()?;
        if let Some(pending) = session.dialog.outgoing_invite() {
            return Err(SessionError::invalid_state(format!(
                "INVITE {} still outstanding",
                pending
            )));
        }
        let body = self.build_sdp(session);
        let rendering = if session.is_on_hold() {
            ";+sip.rendering=\"no\""
        } else {
            ""
        };
        let contact = format!("{}{}", self.transport.contact(), rendering);

        let session = self.active.as_mut().ok_or(SessionError::NoActiveCall)?;
        let request = OutgoingRequest::new(Method::Invite, session.dialog.next_cseq())
            .with_header("Supported", "ms-early-media")
            .with_header("Supported", "100rel")
            .with_header("ms-keep-alive", "UAC;hop-hop=yes")
            .with_header("Contact", contact)
            .with_sdp(body);

        let key = self.transport.send_request(&session.dialog, request)?;
        info!("Sent INVITE {} ({:?})", key, kind);
        session.dialog.set_outgoing_invite(key);
        session.invite_kind = kind;
        session.renegotiation_pending = false;
        Ok(())
    }

    /// Send the renegotiation a local hold change left waiting, once no
    /// INVITE of ours is outstanding
    pub(super) fn flush_renegotiation(&mut self) -> Result<()> {
        let session = self.session()?;
        if !session.renegotiation_pending || session.dialog.outgoing_invite().is_some() {
            return Ok(());
        }
        debug!("Sending deferred renegotiation for call {}", session.call_id());
        self.send_invite(InviteKind::Reinvite)
    }

    /// Send a new in-dialog request (BYE, PRACK) with the next CSeq
    pub(super) fn send_in_dialog(&mut self, method: Method, headers: Vec<(String, String)>) -> Result<TransactionKey> {
        let session = self.active.as_mut().ok_or(SessionError::NoActiveCall)?;
        let mut request = OutgoingRequest::new(method, session.dialog.next_cseq());
        request.headers = headers;
        let key = self.transport.send_request(&session.dialog, request)?;
        debug!("Sent {}", key);
        Ok(key)
    }

    /// ACK or CANCEL an INVITE transaction; both reuse its CSeq
    pub(super) fn send_for_invite(&mut self, method: Method, invite: &TransactionKey) -> Result<()> {
        let session = self.active.as_ref().ok_or(SessionError::NoActiveCall)?;
        let request = OutgoingRequest::new(method, invite.cseq);
        self.transport.send_request(&session.dialog, request)?;
        debug!("Sent {} for {}", invite.method, invite);
        Ok(())
    }

    /// Answer the stored invitation with an SDP body
    pub(super) fn respond_with_sdp(&mut self, status: u16) -> Result<()> {
        let session = self.session()?;
        let body = self.build_sdp(session);
        self.respond(OutgoingResponse::new(status).with_sdp(body))
    }

    /// Answer the stored invitation
    pub(super) fn respond(&mut self, response: OutgoingResponse) -> Result<()> {
        let session = self.active.as_mut().ok_or(SessionError::NoActiveCall)?;
        let invitation = session
            .invitation
            .as_ref()
            .ok_or_else(|| SessionError::invalid_state("no INVITE to answer"))?;
        let status = response.status;
        self.transport.send_response(invitation, response)?;
        if status >= 200 {
            session.invitation_pending = false;
        }
        debug!("Answered INVITE of {} with {}", session.call_id(), status);
        Ok(())
    }

    /// End a negotiation that cannot continue.
    ///
    /// An unanswered peer INVITE gets 488 (500 for local faults), an
    /// unanswered INVITE of ours is cancelled, and an established call is
    /// closed with BYE. The user sees an error and the slot is cleared.
    pub(super) fn fail_call(&mut self, err: &SessionError, established: bool) {
        let Some(session) = self.active.as_ref() else {
            return;
        };
        warn!("Call {} failed: {}", session.call_id(), err);

        if session.invitation_pending {
            let response = if err.is_negotiation_failure() {
                let mut response = OutgoingResponse::new(488);
                if *err == SessionError::EncryptionRequired {
                    response = OutgoingResponse::with_reason(488, "Encryption Levels not compatible")
                        .with_header(
                            "Warning",
                            format!(
                                "308 {} \"Encryption Levels not compatible\"",
                                self.config.warning_agent
                            ),
                        );
                }
                response
            } else {
                OutgoingResponse::new(500)
            };
            if let Err(e) = self.respond(response) {
                warn!("Could not answer failed INVITE: {}", e);
            }
        }

        if let Some(invite) = self.active.as_ref().and_then(|s| s.dialog.outgoing_invite().cloned()) {
            if let Err(e) = self.send_for_invite(Method::Cancel, &invite) {
                warn!("Could not cancel {}: {}", invite, e);
            }
        }

        if established {
            if let Err(e) = self.send_in_dialog(Method::Bye, Vec::new()) {
                warn!("Could not send BYE: {}", e);
            }
            self.backend.hangup(false);
        } else {
            self.backend.reject(false);
        }

        let (title, description) = describe_failure(err);
        self.notify(CallNotification::Error { title, description });
        self.teardown(&err.to_string());
    }

    /// Discard the active call and release its media
    pub(super) fn teardown(&mut self, reason: &str) {
        let Some(mut session) = self.active.take() else {
            return;
        };
        session.dialog.clear_outgoing_invite();
        self.backend.destroy_session();

        let old = session.set_state(CallState::Terminated);
        info!("Call {} terminated: {}", session.call_id(), reason);
        self.notify(CallNotification::StateChanged {
            call_id: session.call_id().to_string(),
            old_state: Some(old),
            new_state: CallState::Terminated,
        });
        self.notify(CallNotification::Terminated {
            call_id: session.call_id().to_string(),
            reason: reason.to_string(),
        });
    }
}

/// User-facing title and description for a failed negotiation
pub fn describe_failure(err: &SessionError) -> (String, String) {
    const TITLE: &str = "Unable to establish a call";
    let description = match err {
        SessionError::EncryptionRequired => {
            "Encryption settings of peer are incompatible with ours.".to_string()
        }
        SessionError::NoCommonCodec => "No audio codec is supported by both sides.".to_string(),
        SessionError::Sdp(e) => format!("Peer sent an unusable session description: {}", e),
        other => other.to_string(),
    };
    (TITLE.to_string(), description)
}

/// User-facing title and description for a final error response to our INVITE
pub fn describe_rejection(status: u16, reason: &str, with: &str) -> (String, String) {
    let (title, mut description) = match status {
        480 => ("User unavailable", format!("User {} is not available", with)),
        603 | 605 => ("Call rejected", format!("User {} rejected call", with)),
        300..=399 => ("Error occurred", "Call redirected".to_string()),
        _ => ("Error occurred", "Unable to establish a call".to_string()),
    };
    let reason = if reason.is_empty() {
        reason_phrase(status)
    } else {
        reason
    };
    description.push_str(&format!("\n{} {}", status, reason));
    (title.to_string(), description)
}
