//! Call operations for CallCoordinator: local commands and media callbacks

use duet_sip_core::sdp::codec::MediaType;
use duet_sip_core::Method;
use tracing::{debug, info, warn};

use super::CallCoordinator;
use crate::adapters::{MediaBackend, OutgoingResponse, SipTransport, StreamParams};
use crate::errors::{Result, SessionError};
use crate::events::{CallCommand, MediaEvent};
use crate::session::{CallSession, CallState, InviteKind};

impl<T: SipTransport, M: MediaBackend> CallCoordinator<T, M> {
    pub(super) fn handle_command(&mut self, command: CallCommand) -> Result<()> {
        match command {
            CallCommand::Initiate { participant } => self.initiate_call(&participant),
            CallCommand::Hangup => self.hangup(),
        }
    }

    pub(super) fn handle_media_event(&mut self, event: MediaEvent) -> Result<()> {
        if self.active.is_none() {
            debug!("Media event {:?} without an active call", event);
            return Ok(());
        }

        match event {
            MediaEvent::CandidatesPrepared => self.on_candidates_prepared(),
            MediaEvent::MediaConnected => {
                info!("Media connected for call {}", self.session()?.call_id());
                Ok(())
            }
            MediaEvent::Accept { local } => self.on_accept(local),
            MediaEvent::Reject { local } => self.on_reject(local),
            MediaEvent::Hold { local, on_hold } => self.on_hold(local, on_hold),
            MediaEvent::Hangup { local } => self.on_hangup(local),
        }
    }

    /// Start an outgoing call to `participant`.
    ///
    /// The INVITE goes out once the backend reports its candidates.
    pub fn initiate_call(&mut self, participant: &str) -> Result<()> {
        if let Some(active) = self.active.as_ref() {
            return Err(SessionError::CallInProgress {
                call_id: active.call_id().to_string(),
            });
        }

        let session = CallSession::outgoing(participant, self.config.connectivity_checks);
        let call_id = session.call_id().to_string();
        info!("Calling {} ({})", participant, call_id);

        self.backend.create_session(&call_id)?;
        self.install(session);

        let params = StreamParams {
            participant: participant.to_string(),
            media_type: MediaType::Audio,
            connectivity_checks: self.config.connectivity_checks,
            initiator: true,
        };
        let stream = match self.backend.add_stream(params) {
            Ok(stream) => stream,
            Err(e) => {
                self.teardown("Could not create media stream");
                return Err(e);
            }
        };
        self.session_mut()?.stream = Some(stream);

        if self.backend.candidates_prepared(stream) {
            self.on_candidates_prepared()?;
        }
        Ok(())
    }

    /// End the active call from the local side
    pub fn hangup(&mut self) -> Result<()> {
        if self.active.is_none() {
            return Err(SessionError::NoActiveCall);
        }
        self.backend.hangup(true);
        self.on_hangup(true)
    }

    /// Local gathering finished: send our offer, or our early answer
    pub(super) fn on_candidates_prepared(&mut self) -> Result<()> {
        let session = self.session_mut()?;

        if session.is_initiator() {
            if session.state() == CallState::CandidateGathering {
                self.send_invite(InviteKind::Initial)?;
                self.transition(CallState::Offering);
            } else if session.replay_pending {
                session.replay_pending = false;
                info!("Replaying offer for call {} on the legacy stream", session.call_id());
                self.send_invite(InviteKind::Initial)?;
            } else {
                debug!("Candidates prepared again for call {}", session.call_id());
            }
            return Ok(());
        }

        if session.state() != CallState::OfferReceived {
            debug!("Candidates prepared in state {}", session.state());
            return Ok(());
        }

        let (stream, codecs) = (session.stream, session.remote_codecs().to_vec());
        let early_media = !session.is_legacy() && !session.remote_requires_encryption();
        if let Some(stream) = stream {
            if let Err(e) = self.backend.set_remote_codecs(stream, codecs) {
                self.fail_call(&e, false);
                return Err(e);
            }
        }

        if early_media {
            self.respond_with_sdp(183)?;
            self.transition(CallState::Negotiating);
        }
        Ok(())
    }

    /// The user took the incoming call
    fn on_accept(&mut self, local: bool) -> Result<()> {
        if !local {
            return Ok(());
        }
        let session = self.session()?;
        if !(session.invitation_pending && session.state().awaits_local_answer()) {
            return Err(SessionError::invalid_state(format!(
                "nothing to accept in state {}",
                session.state()
            )));
        }

        if session.remote_requires_encryption() {
            self.fail_call(&SessionError::EncryptionRequired, false);
            return Ok(());
        }

        self.respond_with_sdp(200)?;
        self.transition(CallState::Active);
        Ok(())
    }

    fn on_reject(&mut self, local: bool) -> Result<()> {
        if local && self.session()?.invitation_pending {
            self.respond(OutgoingResponse::new(603))?;
        }
        self.teardown(if local { "Call declined" } else { "Call rejected" });
        Ok(())
    }

    /// Hold flags are changed on each side independently; a local change is
    /// renegotiated with a new INVITE, a remote one is answered
    fn on_hold(&mut self, local: bool, on_hold: bool) -> Result<()> {
        let session = self.session_mut()?;

        if local {
            if session.local_hold() == on_hold {
                return Ok(());
            }
            session.set_local_hold(on_hold);
            info!("Call {} local hold: {}", session.call_id(), on_hold);

            // Before the call is up the next offer or answer carries the flag
            if !session.state().is_established() {
                return Ok(());
            }
            if session.dialog.outgoing_invite().is_some() || session.replay_pending {
                debug!("INVITE outstanding, deferring hold renegotiation");
                session.renegotiation_pending = true;
                return Ok(());
            }
            if let Err(e) = self.send_invite(InviteKind::Reinvite) {
                self.session_mut()?.set_local_hold(!on_hold);
                return Err(e);
            }
            return Ok(());
        }

        if session.remote_hold() != on_hold {
            session.set_remote_hold(on_hold);
            info!("Call {} remote hold: {}", session.call_id(), on_hold);
        }
        // Only a re-offer on an accepted call is answered here
        if session.invitation_pending && session.state().is_established() {
            self.respond_with_sdp(200)?;
        }
        Ok(())
    }

    fn on_hangup(&mut self, local: bool) -> Result<()> {
        if local {
            let session = self.session()?;
            let outgoing = session.dialog.outgoing_invite().cloned();
            let (established, pending) = (session.state().is_established(), session.invitation_pending);

            if let Some(invite) = outgoing.filter(|_| !established) {
                self.send_for_invite(Method::Cancel, &invite)?;
            } else if established {
                self.send_in_dialog(Method::Bye, Vec::new())?;
            } else if pending {
                self.respond(OutgoingResponse::new(603))?;
            } else {
                warn!("Hanging up a call with nothing on the wire");
            }
        }
        self.teardown(if local { "Local hangup" } else { "Remote hangup" });
        Ok(())
    }
}
