//! Call setup and teardown flows through CallCoordinator
//!
//! Covers:
//! - Incoming calls: ringing, early media, answer, busy, cancel, decline
//! - Outgoing calls: offer, reliable provisional responses, rejection
//! - Negotiation failures: no common codec, incompatible encryption
//! - The async event loop

mod common;

use common::*;
use duet_session_core::{CallCommand, CallEvent, CallNotification, CallState, MediaEvent, SessionError};
use duet_sip_core::sdp::codec::{Codec, MediaType};
use duet_sip_core::Method;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

fn answer_incoming(coordinator: &mut TestCoordinator, call_id: &str) {
    coordinator
        .handle_event(CallEvent::IncomingRequest(invite(call_id, &ice_body(""))))
        .unwrap();
    coordinator.handle_event(MediaEvent::CandidatesPrepared.into()).unwrap();
    coordinator.handle_event(MediaEvent::Accept { local: true }.into()).unwrap();
}

/// Place a call and return the key of the initial INVITE
fn place_call(coordinator: &mut TestCoordinator) -> duet_session_core::TransactionKey {
    coordinator
        .handle_event(CallCommand::Initiate { participant: PEER.to_string() }.into())
        .unwrap();
    coordinator
        .transport()
        .last_request(Method::Invite)
        .expect("INVITE sent")
        .key
        .clone()
}

#[test]
fn test_incoming_call_rings_offers_early_media_and_answers() {
    let (mut coordinator, mut rx) = coordinator(ScriptedBackend::new());

    coordinator
        .handle_event(CallEvent::IncomingRequest(invite("c1", &ice_body(""))))
        .unwrap();
    assert_eq!(coordinator.transport().statuses(), vec![180]);
    assert_eq!(coordinator.active_call().unwrap().state, CallState::OfferReceived);

    let (_, params) = &coordinator.backend().streams[0];
    assert!(params.connectivity_checks);
    assert!(!params.initiator);
    assert_eq!(params.participant, PEER);
    assert_eq!(coordinator.backend().remote_candidates[0].1.len(), 2);

    coordinator.handle_event(MediaEvent::CandidatesPrepared.into()).unwrap();
    assert_eq!(coordinator.transport().statuses(), vec![180, 183]);
    let early = coordinator.transport().response_with(183).unwrap();
    assert_eq!(early.header("Content-Type"), Some("application/sdp"));
    let body = early.body.as_deref().unwrap();
    assert!(body.contains("m=audio 7000 RTP/AVP 0 8 101\r\n"));
    assert!(body.contains("a=rtpmap:0 PCMU/8000\r\n"));
    assert!(body.contains("a=ice-ufrag:lufrag\r\n"));
    assert!(body.contains("a=rtcp:7001\r\n"));

    coordinator.handle_event(MediaEvent::Accept { local: true }.into()).unwrap();
    assert_eq!(coordinator.transport().statuses(), vec![180, 183, 200]);
    let ok = coordinator.transport().response_with(200).unwrap();
    assert!(ok.body.as_deref().unwrap().contains("a=rtpmap:0 PCMU/8000\r\n"));
    assert!(ok.body.as_deref().unwrap().ends_with("a=encryption:rejected\r\n"));

    // Every response carries our tag
    let session = coordinator.active_session().unwrap();
    for (request, _) in &coordinator.transport().responses {
        assert_eq!(request.to_tag(), Some(session.dialog().local_tag.as_str()));
    }

    let states: Vec<CallState> = drain(&mut rx)
        .into_iter()
        .filter_map(|n| match n {
            CallNotification::StateChanged { new_state, .. } => Some(new_state),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![CallState::OfferReceived, CallState::Negotiating, CallState::Active]
    );
}

#[test]
fn test_second_call_is_busy() {
    let (mut coordinator, _rx) = coordinator(ScriptedBackend::new());
    answer_incoming(&mut coordinator, "c1");

    coordinator
        .handle_event(CallEvent::IncomingRequest(invite("c2", &ice_body(""))))
        .unwrap();
    assert_eq!(coordinator.transport().statuses().last(), Some(&486));
    assert_eq!(coordinator.active_call().unwrap().call_id, "c1");
    assert_eq!(coordinator.backend().sessions, vec!["c1".to_string()]);
}

#[test]
fn test_invite_without_call_id_is_bad_request() {
    let (mut coordinator, _rx) = coordinator(ScriptedBackend::new());
    let request = duet_sip_core::SipMessage::request(Method::Invite, "sip:alice@example.com")
        .with_body(ice_body(""));

    assert!(coordinator.handle_event(CallEvent::IncomingRequest(request)).is_err());
    assert_eq!(coordinator.transport().statuses(), vec![400]);
    assert!(coordinator.active_call().is_none());
}

#[test]
fn test_no_common_codec_rejects_offer() {
    let backend = ScriptedBackend::new().with_codecs(vec![Codec::new(9, "G722", 8000, MediaType::Audio)]);
    let (mut coordinator, mut rx) = coordinator(backend);

    let result = coordinator.handle_event(CallEvent::IncomingRequest(invite("c1", &ice_body(""))));
    assert_eq!(result, Err(SessionError::NoCommonCodec));
    assert_eq!(coordinator.transport().statuses(), vec![488]);
    assert!(coordinator.backend().called("reject(false)"));
    assert_eq!(coordinator.backend().destroyed, 1);
    assert!(coordinator.active_call().is_none());

    let error = drain(&mut rx).into_iter().find_map(|n| match n {
        CallNotification::Error { description, .. } => Some(description),
        _ => None,
    });
    assert_eq!(error.as_deref(), Some("No audio codec is supported by both sides."));
}

#[test]
fn test_excluded_codec_is_never_negotiated() {
    let backend = ScriptedBackend::new().with_codecs(vec![Codec::new(96, "THEORA", 90000, MediaType::Audio)]);
    let (mut coordinator, _rx) = coordinator(backend);
    let body = legacy_body("").replace("a=rtpmap:0 PCMU/8000", "a=rtpmap:96 THEORA/90000");

    let result = coordinator.handle_event(CallEvent::IncomingRequest(invite("c1", &body)));
    assert_eq!(result, Err(SessionError::NoCommonCodec));
}

#[test]
fn test_encryption_required_is_refused_on_accept() {
    let (mut coordinator, mut rx) = coordinator(ScriptedBackend::new());

    coordinator
        .handle_event(CallEvent::IncomingRequest(invite("c1", &ice_body("a=encryption:required\r\n"))))
        .unwrap();
    coordinator.handle_event(MediaEvent::CandidatesPrepared.into()).unwrap();
    // No early media towards a peer we cannot talk to
    assert_eq!(coordinator.transport().statuses(), vec![180]);

    coordinator.handle_event(MediaEvent::Accept { local: true }.into()).unwrap();
    assert_eq!(coordinator.transport().statuses(), vec![180, 488]);
    let refusal = coordinator.transport().response_with(488).unwrap();
    assert_eq!(refusal.reason, "Encryption Levels not compatible");
    assert_eq!(
        refusal.header("Warning"),
        Some("308 duet \"Encryption Levels not compatible\"")
    );
    assert!(coordinator.backend().called("reject(false)"));
    assert!(coordinator.active_call().is_none());

    let titles: Vec<String> = drain(&mut rx)
        .into_iter()
        .filter_map(|n| match n {
            CallNotification::Error { title, .. } => Some(title),
            _ => None,
        })
        .collect();
    assert_eq!(titles, vec!["Unable to establish a call".to_string()]);
}

#[test]
fn test_malformed_attribute_in_offer_is_not_acceptable() {
    let (mut coordinator, mut rx) = coordinator(ScriptedBackend::new());

    let result = coordinator.handle_event(CallEvent::IncomingRequest(invite("c1", &ice_body("a=bogus\r\n"))));
    assert!(matches!(result, Err(SessionError::Sdp(_))));
    assert_eq!(coordinator.transport().statuses(), vec![488]);
    assert!(coordinator.backend().called("reject(false)"));
    assert_eq!(coordinator.backend().destroyed, 1);
    assert!(coordinator.active_call().is_none());
    assert!(drain(&mut rx)
        .iter()
        .any(|n| matches!(n, CallNotification::Terminated { call_id, .. } if call_id == "c1")));
}

#[test]
fn test_repeated_invite_before_accept_is_not_answered() {
    let (mut coordinator, _rx) = coordinator(ScriptedBackend::new());
    coordinator
        .handle_event(CallEvent::IncomingRequest(invite("c1", &ice_body(""))))
        .unwrap();
    coordinator.handle_event(MediaEvent::CandidatesPrepared.into()).unwrap();

    coordinator
        .handle_event(CallEvent::IncomingRequest(invite("c1", &ice_body("a=inactive\r\n"))))
        .unwrap();
    assert_eq!(coordinator.transport().statuses(), vec![180, 183, 500]);
    let retry = coordinator.transport().response_with(500).unwrap();
    let seconds: u32 = retry.header("Retry-After").unwrap().parse().unwrap();
    assert!(seconds <= 10);
    assert!(coordinator.backend().calls.is_empty());
    assert_eq!(coordinator.active_call().unwrap().state, CallState::Negotiating);

    // A hold report for the ringing call does not answer it either
    coordinator
        .handle_event(MediaEvent::Hold { local: false, on_hold: true }.into())
        .unwrap();
    assert_eq!(coordinator.transport().statuses(), vec![180, 183, 500]);

    coordinator.handle_event(MediaEvent::Accept { local: true }.into()).unwrap();
    assert_eq!(coordinator.transport().statuses(), vec![180, 183, 500, 200]);
    assert_eq!(coordinator.active_call().unwrap().state, CallState::Active);
}

#[test]
fn test_cancel_while_ringing() {
    let (mut coordinator, _rx) = coordinator(ScriptedBackend::new());
    coordinator
        .handle_event(CallEvent::IncomingRequest(invite("c1", &ice_body(""))))
        .unwrap();

    coordinator
        .handle_event(CallEvent::IncomingRequest(request(Method::Cancel, "c1", 1)))
        .unwrap();
    assert_eq!(coordinator.transport().statuses(), vec![180, 200, 487]);
    assert!(coordinator.backend().called("reject(false)"));
    assert!(coordinator.active_call().is_none());
}

#[test]
fn test_local_decline() {
    let (mut coordinator, mut rx) = coordinator(ScriptedBackend::new());
    coordinator
        .handle_event(CallEvent::IncomingRequest(invite("c1", &ice_body(""))))
        .unwrap();

    coordinator.handle_event(MediaEvent::Reject { local: true }.into()).unwrap();
    assert_eq!(coordinator.transport().statuses(), vec![180, 603]);
    assert!(coordinator.active_call().is_none());
    assert!(drain(&mut rx).contains(&CallNotification::Terminated {
        call_id: "c1".to_string(),
        reason: "Call declined".to_string(),
    }));
}

#[test]
fn test_remote_bye_ends_call() {
    let (mut coordinator, mut rx) = coordinator(ScriptedBackend::new());
    answer_incoming(&mut coordinator, "c1");

    coordinator
        .handle_event(CallEvent::IncomingRequest(request(Method::Bye, "c1", 2)))
        .unwrap();
    assert_eq!(coordinator.transport().statuses().last(), Some(&200));
    assert!(coordinator.backend().called("hangup(false)"));
    assert_eq!(coordinator.backend().destroyed, 1);
    assert!(coordinator.active_call().is_none());
    assert!(drain(&mut rx).contains(&CallNotification::Terminated {
        call_id: "c1".to_string(),
        reason: "Remote hangup".to_string(),
    }));
}

#[test]
fn test_requests_for_unknown_calls_get_481() {
    let (mut coordinator, _rx) = coordinator(ScriptedBackend::new());
    answer_incoming(&mut coordinator, "c1");

    for method in [Method::Bye, Method::Cancel, Method::Prack] {
        coordinator
            .handle_event(CallEvent::IncomingRequest(request(method, "other", 5)))
            .unwrap();
        assert_eq!(coordinator.transport().statuses().last(), Some(&481));
    }
    assert!(coordinator.active_call().is_some());
}

#[test]
fn test_outgoing_call_waits_for_candidates() {
    let (mut coordinator, _rx) = coordinator(ScriptedBackend::new());

    coordinator
        .handle_event(CallCommand::Initiate { participant: PEER.to_string() }.into())
        .unwrap();
    assert!(coordinator.transport().requests.is_empty());
    assert_eq!(coordinator.active_call().unwrap().state, CallState::CandidateGathering);
    assert!(coordinator.backend().streams[0].1.initiator);

    coordinator.handle_event(MediaEvent::CandidatesPrepared.into()).unwrap();
    let sent = coordinator.transport().last_request(Method::Invite).unwrap();
    assert_eq!(sent.request.cseq, 1);
    assert!(sent.body().contains("a=candidate:1 1 UDP 2130706430 10.0.0.1 7000 typ host\r\n"));
    let supported: Vec<&str> = sent
        .request
        .headers
        .iter()
        .filter(|(name, _)| name == "Supported")
        .map(|(_, value)| value.as_str())
        .collect();
    assert_eq!(supported, vec!["ms-early-media", "100rel"]);
    assert_eq!(coordinator.active_call().unwrap().state, CallState::Offering);

    // A repeated gathering report does not re-send the offer
    coordinator.handle_event(MediaEvent::CandidatesPrepared.into()).unwrap();
    assert_eq!(coordinator.transport().requests_of(Method::Invite).len(), 1);
}

#[test]
fn test_only_one_call_at_a_time() {
    let (mut coordinator, _rx) = coordinator(ScriptedBackend::new().prepared());
    place_call(&mut coordinator);

    let result = coordinator.handle_event(CallCommand::Initiate { participant: "sip:carol@example.com".to_string() }.into());
    assert!(matches!(result, Err(SessionError::CallInProgress { .. })));
}

#[test]
fn test_session_progress_is_acknowledged_with_prack() {
    let (mut coordinator, _rx) = coordinator(ScriptedBackend::new().prepared());
    let key = place_call(&mut coordinator);

    let progress = response(&key, 183, "Session Progress", &ice_body("")).with_header("RSeq", "1");
    coordinator
        .handle_event(CallEvent::Response { transaction: key.clone(), message: progress })
        .unwrap();

    let prack = coordinator.transport().last_request(Method::Prack).unwrap();
    assert_eq!(prack.request.header("RAck"), Some("1 1 INVITE"));
    assert_eq!(prack.request.cseq, 2);
    assert_eq!(prack.remote_tag.as_deref(), Some("peer2"));
    assert!(coordinator.transport().requests_of(Method::Ack).is_empty());
    assert_eq!(coordinator.active_call().unwrap().state, CallState::Negotiating);

    let ok = response(&key, 200, "OK", &ice_body(""));
    coordinator
        .handle_event(CallEvent::Response { transaction: key.clone(), message: ok })
        .unwrap();

    let ack = coordinator.transport().last_request(Method::Ack).unwrap();
    assert_eq!(ack.request.cseq, key.cseq);
    assert_eq!(coordinator.active_call().unwrap().state, CallState::Active);

    // The answer is followed by a renegotiation carrying the current state
    let invites = coordinator.transport().requests_of(Method::Invite);
    assert_eq!(invites.len(), 2);
    assert_eq!(invites[1].request.cseq, 3);
}

#[test]
fn test_session_progress_for_renegotiation_is_acknowledged() {
    let (mut coordinator, _rx) = coordinator(ScriptedBackend::new());
    answer_incoming(&mut coordinator, "c1");
    coordinator
        .handle_event(MediaEvent::Hold { local: true, on_hold: true }.into())
        .unwrap();
    let key = coordinator.transport().last_request(Method::Invite).unwrap().key.clone();

    let progress = response(&key, 183, "Session Progress", &ice_body("")).with_header("RSeq", "4");
    coordinator
        .handle_event(CallEvent::Response { transaction: key.clone(), message: progress })
        .unwrap();

    let prack = coordinator.transport().last_request(Method::Prack).unwrap();
    assert_eq!(prack.request.header("RAck"), Some(format!("4 {} INVITE", key.cseq).as_str()));
    assert!(coordinator.transport().requests_of(Method::Ack).is_empty());
    assert_eq!(coordinator.active_call().unwrap().state, CallState::Active);
}

#[test]
fn test_outgoing_call_rejections_are_classified() {
    let cases = [
        (486, "Busy Here", "Error occurred", "Unable to establish a call\n486 Busy Here"),
        (480, "Temporarily Unavailable", "User unavailable", "User sip:bob@example.com is not available\n480 Temporarily Unavailable"),
        (603, "Decline", "Call rejected", "User sip:bob@example.com rejected call\n603 Decline"),
    ];

    for (status, reason, title, description) in cases {
        let (mut coordinator, mut rx) = coordinator(ScriptedBackend::new().prepared());
        let key = place_call(&mut coordinator);

        coordinator
            .handle_event(CallEvent::Response {
                transaction: key.clone(),
                message: response(&key, status, reason, ""),
            })
            .unwrap();

        assert!(coordinator.active_call().is_none());
        assert!(coordinator.backend().called("reject(false)"));
        assert_eq!(coordinator.transport().last_request(Method::Ack).unwrap().request.cseq, key.cseq);
        assert!(drain(&mut rx).contains(&CallNotification::Error {
            title: title.to_string(),
            description: description.to_string(),
        }));
    }
}

#[test]
fn test_stale_responses_are_ignored() {
    let (mut coordinator, _rx) = coordinator(ScriptedBackend::new().prepared());
    let key = place_call(&mut coordinator);

    let mut stale = key.clone();
    stale.cseq += 10;
    coordinator
        .handle_event(CallEvent::Response {
            transaction: stale.clone(),
            message: response(&stale, 486, "Busy Here", ""),
        })
        .unwrap();
    assert_eq!(coordinator.active_call().unwrap().state, CallState::Offering);
    assert!(coordinator.transport().requests_of(Method::Ack).is_empty());
}

#[test]
fn test_local_hangup_before_answer_cancels() {
    let (mut coordinator, _rx) = coordinator(ScriptedBackend::new().prepared());
    let key = place_call(&mut coordinator);

    coordinator.handle_event(CallCommand::Hangup.into()).unwrap();
    let cancel = coordinator.transport().last_request(Method::Cancel).unwrap();
    assert_eq!(cancel.request.cseq, key.cseq);
    assert!(coordinator.backend().called("hangup(true)"));
    assert!(coordinator.active_call().is_none());
}

#[test]
fn test_local_hangup_of_established_call_sends_bye() {
    let (mut coordinator, _rx) = coordinator(ScriptedBackend::new());
    answer_incoming(&mut coordinator, "c1");

    coordinator.handle_event(CallCommand::Hangup.into()).unwrap();
    assert_eq!(coordinator.transport().requests_of(Method::Bye).len(), 1);
    assert!(coordinator.active_call().is_none());

    assert_eq!(coordinator.hangup(), Err(SessionError::NoActiveCall));
}

#[tokio::test]
async fn test_event_loop_drives_incoming_call() {
    let (mut coordinator, mut rx) = coordinator(ScriptedBackend::new());
    let (tx, event_rx) = mpsc::channel(8);

    tx.send(CallEvent::IncomingRequest(invite("c1", &ice_body(""))))
        .await
        .unwrap();
    tx.send(MediaEvent::CandidatesPrepared.into()).await.unwrap();
    tx.send(MediaEvent::Accept { local: true }.into()).await.unwrap();
    // Errors are logged, not fatal
    tx.send(MediaEvent::Accept { local: true }.into()).await.unwrap();
    drop(tx);

    coordinator.run_event_loop(event_rx).await;

    assert_eq!(coordinator.transport().statuses(), vec![180, 183, 200]);
    assert_eq!(coordinator.active_call().unwrap().state, CallState::Active);
    assert!(!drain(&mut rx).is_empty());
}
