//! Event handling implementation for CallCoordinator

use duet_sip_core::{Method, SdpError, SipMessage};
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::coordinator::describe_rejection;
use super::CallCoordinator;
use crate::adapters::{MediaBackend, OutgoingResponse, SipTransport, StreamParams};
use crate::dialog::TransactionKey;
use crate::errors::{Result, SessionError};
use crate::events::{CallEvent, CallNotification};
use crate::session::{CallSession, CallState, InviteKind};
use duet_sip_core::sdp::codec::MediaType;

impl<T: SipTransport, M: MediaBackend> CallCoordinator<T, M> {
    /// Process events until every sender is dropped
    pub async fn run_event_loop(&mut self, mut event_rx: mpsc::Receiver<CallEvent>) {
        info!("Starting call coordinator event loop");

        while let Some(event) = event_rx.recv().await {
            if let Err(e) = self.handle_event(event) {
                error!("Error handling call event: {}", e);
            }
        }

        info!("Call coordinator event loop ended");
    }

    /// Apply one event to the active call
    pub fn handle_event(&mut self, event: CallEvent) -> Result<()> {
        debug!("Handling event: {:?}", event);

        match event {
            CallEvent::IncomingRequest(request) => self.handle_request(request),
            CallEvent::Response {
                transaction,
                message,
            } => self.handle_response(transaction, message),
            CallEvent::Media(event) => self.handle_media_event(event),
            CallEvent::Command(command) => self.handle_command(command),
        }
    }

    fn handle_request(&mut self, request: SipMessage) -> Result<()> {
        let Some(method) = request.method().cloned() else {
            return Err(SessionError::invalid_state("response delivered as a request"));
        };
        let Some(call_id) = request.call_id().map(str::to_string) else {
            self.transport.send_response(&request, OutgoingResponse::new(400))?;
            return Err(SdpError::MissingHeader { name: "Call-ID" }.into());
        };
        let ours = self
            .active
            .as_ref()
            .map_or(false, |s| s.call_id() == call_id);

        match method {
            Method::Invite if self.active.is_none() => self.handle_new_invite(request),
            Method::Invite if ours => self.handle_reoffer(request),
            Method::Invite => {
                info!("Rejecting INVITE {} while another call is active", call_id);
                self.transport.send_response(&request, OutgoingResponse::new(486))
            }
            Method::Bye if ours => {
                self.transport.send_response(&request, OutgoingResponse::new(200))?;
                self.backend.hangup(false);
                self.teardown("Remote hangup");
                Ok(())
            }
            Method::Cancel if ours => self.handle_cancel(request),
            Method::Prack if ours => self.transport.send_response(&request, OutgoingResponse::new(200)),
            Method::Bye | Method::Cancel | Method::Prack => {
                debug!("{} for unknown call {}", method, call_id);
                self.transport.send_response(&request, OutgoingResponse::new(481))
            }
            Method::Ack => {
                debug!("ACK for {}", call_id);
                Ok(())
            }
            Method::Other(name) => {
                debug!("Ignoring {} request", name);
                Ok(())
            }
        }
    }

    /// First INVITE of a call: parse the offer, ring, and wait for gathering
    fn handle_new_invite(&mut self, invite: SipMessage) -> Result<()> {
        let session = match CallSession::incoming(invite.clone()) {
            Ok(session) => session,
            Err(e) => {
                self.transport.send_response(&invite, OutgoingResponse::new(400))?;
                return Err(e);
            }
        };
        let call_id = session.call_id().to_string();
        let with = session.info().participant.clone();
        info!("Incoming call {} from {}", call_id, with);

        self.backend.create_session(&call_id)?;
        self.install(session);

        if let Err(e) = self.setup_incoming(&invite.body, with) {
            self.fail_call(&e, false);
            return Err(e);
        }
        Ok(())
    }

    fn setup_incoming(&mut self, body: &str, with: String) -> Result<()> {
        let (remote, codecs) = self.negotiate(body)?;
        let legacy = remote.legacy;

        let stream = self.backend.add_stream(StreamParams {
            participant: with,
            media_type: MediaType::Audio,
            connectivity_checks: !legacy,
            initiator: false,
        })?;
        let session = self.session_mut()?;
        session.stream = Some(stream);
        session.using_connectivity_checks = !legacy;

        self.apply_remote(remote, codecs)?;
        self.respond(OutgoingResponse::new(180))?;

        if self.backend.candidates_prepared(stream) {
            self.on_candidates_prepared()?;
        }
        Ok(())
    }

    /// INVITE inside the active call: a new offer, possibly a hold change
    fn handle_reoffer(&mut self, invite: SipMessage) -> Result<()> {
        let session = self.session_mut()?;
        if session.invitation_pending {
            // The previous INVITE still waits for its final response
            debug!("Re-offer for call {} before the last INVITE was answered", session.call_id());
            let retry_after = rand::thread_rng().gen_range(0..=10u32);
            let response = OutgoingResponse::new(500).with_header("Retry-After", retry_after.to_string());
            return self.transport.send_response(&invite, response);
        }
        if session.dialog.outgoing_invite().is_some() {
            debug!("Re-offer for call {} crosses our own INVITE", session.call_id());
            return self.transport.send_response(&invite, OutgoingResponse::new(491));
        }
        session.store_invitation(invite.clone());
        let established = session.state() == CallState::Active;
        debug!("Re-offer for call {}", session.call_id());

        let (remote, codecs) = match self.negotiate(&invite.body) {
            Ok(negotiated) => negotiated,
            Err(e) => {
                self.fail_call(&e, established);
                return Err(e);
            }
        };
        let inactive = remote.is_inactive();
        if let Err(e) = self.apply_remote(remote, codecs) {
            self.fail_call(&e, established);
            return Err(e);
        }

        let session = self.session()?;
        if session.remote_requires_encryption() {
            self.fail_call(&SessionError::EncryptionRequired, established);
            return Ok(());
        }

        // Legacy peers signal hold and resume by re-inviting at all
        let remote_hold = session.remote_hold();
        let wanted = if session.is_legacy() { !remote_hold } else { inactive };

        if wanted != remote_hold {
            // The backend answers with a Hold callback; the 200 OK follows it
            if wanted {
                self.backend.hold(false);
            } else {
                self.backend.unhold(false);
            }
            Ok(())
        } else {
            self.respond_with_sdp(200)
        }
    }

    fn handle_cancel(&mut self, cancel: SipMessage) -> Result<()> {
        let session = self.session()?;
        if !(session.invitation_pending && session.state().awaits_local_answer()) {
            return self.transport.send_response(&cancel, OutgoingResponse::new(481));
        }
        self.transport.send_response(&cancel, OutgoingResponse::new(200))?;
        self.respond(OutgoingResponse::new(487))?;
        self.backend.reject(false);
        self.teardown("Call cancelled");
        Ok(())
    }

    fn handle_response(&mut self, transaction: TransactionKey, response: SipMessage) -> Result<()> {
        let Some(session) = self.active.as_ref() else {
            debug!("Response for {} without an active call", transaction);
            return Ok(());
        };
        if response.call_id() != Some(session.call_id()) || !session.dialog.is_outgoing_invite(&transaction) {
            debug!("Ignoring response for {}", transaction);
            return Ok(());
        }
        let Some(status) = response.status() else {
            return Err(SessionError::invalid_state("request delivered as a response"));
        };
        let kind = session.invite_kind;

        match (kind, status) {
            (_, 100..=182) | (_, 184..=199) => {
                debug!("Provisional {} for {}", status, transaction);
                self.session_mut()?.dialog.update_from_response(&response);
                Ok(())
            }
            (InviteKind::Reinvite, 183) => {
                debug!("Session progress for re-INVITE {}", transaction);
                self.send_prack(&response)
            }
            (InviteKind::Reinvite, _) => {
                self.session_mut()?.dialog.clear_outgoing_invite();
                self.send_for_invite(Method::Ack, &transaction)?;
                if status >= 300 {
                    warn!("Renegotiation {} refused: {}", transaction, status);
                } else {
                    debug!("Renegotiation {} complete", transaction);
                }
                self.flush_renegotiation()
            }
            (InviteKind::Initial, 183) => self.handle_session_progress(response),
            (InviteKind::Initial, 200..=299) => self.handle_invite_success(transaction, response),
            (InviteKind::Initial, _) => self.handle_invite_failure(transaction, response, status),
        }
    }

    /// 183 with early media: negotiate and acknowledge reliably
    fn handle_session_progress(&mut self, response: SipMessage) -> Result<()> {
        let negotiated = self.negotiate(&response.body).and_then(|(remote, codecs)| self.apply_remote(remote, codecs));
        if let Err(e) = negotiated {
            self.fail_call(&e, false);
            return Err(e);
        }
        self.session_mut()?.dialog.update_from_response(&response);
        self.send_prack(&response)?;

        self.transition(CallState::Negotiating);
        Ok(())
    }

    /// Acknowledge a reliable provisional response
    fn send_prack(&mut self, response: &SipMessage) -> Result<()> {
        match (response.rseq(), response.cseq_raw()) {
            (Some(rseq), Some(cseq)) => {
                let rack = vec![("RAck".to_string(), format!("{} {}", rseq, cseq))];
                self.send_in_dialog(Method::Prack, rack)?;
            }
            _ => warn!("183 without RSeq/CSeq, not sending PRACK"),
        }
        Ok(())
    }

    /// 2xx to an initial INVITE
    fn handle_invite_success(&mut self, transaction: TransactionKey, response: SipMessage) -> Result<()> {
        let session = self.session_mut()?;
        session.dialog.clear_outgoing_invite();
        session.dialog.update_from_response(&response);

        let negotiated = self.negotiate(&response.body).and_then(|(remote, codecs)| self.apply_remote(remote, codecs));
        self.send_for_invite(Method::Ack, &transaction)?;
        if let Err(e) = negotiated {
            self.fail_call(&e, true);
            return Err(e);
        }
        self.transition(CallState::Active);

        let session = self.session()?;
        if session.is_legacy() && session.using_connectivity_checks {
            if let Err(e) = self.downgrade_to_legacy(&response.body) {
                self.fail_call(&e, true);
                return Err(e);
            }
            Ok(())
        } else {
            self.send_invite(InviteKind::Reinvite)
        }
    }

    /// The answer proved the peer legacy while our stream runs connectivity
    /// checks: swap in a bare UDP stream and replay the offer on it
    fn downgrade_to_legacy(&mut self, body: &str) -> Result<()> {
        let session = self.session_mut()?;
        session.using_connectivity_checks = false;
        let old_stream = session.stream;
        let participant = session.info().participant.clone();
        info!("Peer of call {} is legacy, replacing stream", session.call_id());

        let stream = self.backend.add_stream(StreamParams {
            participant,
            media_type: MediaType::Audio,
            connectivity_checks: false,
            initiator: true,
        })?;
        if let Some(old) = old_stream {
            self.backend.remove_stream(old);
        }
        let session = self.session_mut()?;
        session.stream = Some(stream);
        session.replay_pending = true;

        let (remote, codecs) = self.negotiate(body)?;
        self.apply_remote(remote, codecs)?;

        if self.backend.candidates_prepared(stream) {
            self.on_candidates_prepared()?;
        }
        Ok(())
    }

    /// Final error response to our initial INVITE.
    ///
    /// A refused legacy replay arrives on a call the peer already confirmed,
    /// so that dialog is closed with BYE.
    fn handle_invite_failure(&mut self, transaction: TransactionKey, response: SipMessage, status: u16) -> Result<()> {
        let session = self.session_mut()?;
        session.dialog.clear_outgoing_invite();
        let with = session.info().participant.clone();
        let established = session.state().is_established();
        info!("Call {} refused: {}", session.call_id(), status);

        if established {
            self.send_for_invite(Method::Ack, &transaction)?;
            self.send_in_dialog(Method::Bye, Vec::new())?;
            self.backend.hangup(false);
        } else {
            self.backend.reject(false);
            self.send_for_invite(Method::Ack, &transaction)?;
        }

        let (title, description) = describe_rejection(status, response.reason().unwrap_or(""), &with);
        self.notify(CallNotification::Error { title, description });
        self.teardown(&format!("Remote refused with {}", status));
        Ok(())
    }
}
