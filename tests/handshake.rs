mod common;

use codecsync::codec::bookings::{CMD_BOOKINGS_LIST, CMD_CALL_HISTORY};
use codecsync::codec::{
    CodecEngine, CodecEvent, CommandQueue, CommandReceiver, Lane, LayoutFamily, Milestone,
    Operation,
};
use codecsync::config::Config;
use codecsync::protocol::{
    feedback_registration_expression, CMD_CONFIGURATION, CMD_FEEDBACK_LIST, CMD_OUTPUT_MODE_JSON,
    CMD_SYSTEM_UNIT,
};
use common::*;
use tokio_test::{assert_pending, assert_ready_eq};

#[test]
fn full_handshake_reaches_sync_once() {
    let (mut e, mut rx) = engine();
    let events = sync(&mut e, LEGACY_FIRMWARE);

    assert_eq!(
        events.iter().filter(|ev| **ev == CodecEvent::SyncComplete).count(),
        1
    );
    assert!(events.contains(&CodecEvent::LoggedIn));
    assert!(e.is_synced());
    assert!(e.sync_state().pending().is_empty());
    assert_eq!(e.codec_info().serial_number, "FOC2233ABCD");
    assert_eq!(e.codec_info().h323_e164, "4455");

    let sent = rx.drain();
    let expected_handshake = vec![
        CMD_SYSTEM_UNIT.to_string(),
        CMD_OUTPUT_MODE_JSON.to_string(),
        "xStatus Cameras".to_string(),
        "xStatus SIP".to_string(),
        "xStatus Call".to_string(),
        "xStatus".to_string(),
        CMD_CONFIGURATION.to_string(),
        feedback_registration_expression(),
        CMD_FEEDBACK_LIST.to_string(),
    ];
    assert_eq!(&sent[..expected_handshake.len()], &expected_handshake[..]);

    let post_sync = &sent[expected_handshake.len()..];
    assert!(post_sync.contains(&CMD_CALL_HISTORY.to_string()));
    assert!(post_sync.contains(&CMD_BOOKINGS_LIST.to_string()));
    assert!(post_sync.iter().any(|c| c.contains("ContactType: Folder")));
    assert!(post_sync.contains(&"xStatus Video Layout LayoutFamily".to_string()));
    assert!(post_sync.contains(&"xCommand Video Selfview Set Mode: Off".to_string()));
}

#[test]
fn repeated_documents_do_not_repeat_one_time_commands() {
    let (mut e, mut rx) = engine();
    sync(&mut e, LEGACY_FIRMWARE);
    rx.drain();

    let mut events = e.handle_received(&status_doc(LEGACY_FIRMWARE));
    events.extend(e.handle_received(&configuration_doc()));
    events.extend(e.handle_received(JSON_MODE_ECHO));
    events.extend(e.handle_received(&feedback_list()));

    assert!(!events.contains(&CodecEvent::SyncComplete));
    assert!(rx.drain().is_empty(), "nothing is re-sent for duplicate replies");
}

#[test]
fn milestones_arriving_out_of_order_still_complete() {
    let (mut e, _rx) = engine();
    e.handle_connection(true);
    e.handle_received(LOGIN_LINE);
    // registration echo before JSON mode confirmation
    e.handle_received(b"xFeedback register /Event/CallDisconnect\r\n");
    assert!(e.sync_state().get(Milestone::FeedbackRegistered));
    e.handle_received(JSON_MODE_ECHO);
    e.handle_received(&configuration_doc());
    let events = e.handle_received(&status_doc(LEGACY_FIRMWARE));
    assert_eq!(events.iter().filter(|ev| **ev == CodecEvent::SyncComplete).count(), 1);
}

#[test]
fn disconnect_resets_and_reconnect_syncs_again() {
    let (mut e, mut rx) = engine();
    sync(&mut e, LEGACY_FIRMWARE);
    rx.drain();

    let events = e.handle_connection(false);
    assert_eq!(events, vec![CodecEvent::Connected(false)]);
    assert!(!e.is_synced());
    assert_eq!(e.sync_state().pending().len(), 6);
    assert!(!e.snapshot().logged_in);
    // a second disconnect is harmless
    e.handle_connection(false);

    let events = sync(&mut e, LEGACY_FIRMWARE);
    assert_eq!(events.iter().filter(|ev| **ev == CodecEvent::SyncComplete).count(), 1);
    assert_eq!(rx.drain()[0], CMD_SYSTEM_UNIT);
}

#[test]
fn partial_document_is_dropped_on_disconnect() {
    let (mut e, _rx) = engine();
    sync(&mut e, LEGACY_FIRMWARE);
    let status = status_doc(LEGACY_FIRMWARE);
    e.handle_received(&status[..status.len() / 2]);
    e.handle_connection(false);
    e.handle_connection(true);
    e.handle_received(LOGIN_LINE);
    // the tail of the old document must not complete anything
    let events = e.handle_received(&status[status.len() / 2..]);
    assert!(events.iter().all(|ev| !matches!(ev, CodecEvent::CodecInfoChanged(_))));
    assert!(!e.sync_state().get(Milestone::InitialStatusReceived));
}

#[test]
fn lost_registrations_are_renewed_after_sync() {
    let (mut e, mut rx) = engine();
    sync(&mut e, LEGACY_FIRMWARE);
    rx.drain();

    e.check_feedback_registration();
    assert_eq!(rx.drain(), vec![CMD_FEEDBACK_LIST]);
    e.handle_received(b"/Configuration\r\n/Status/Call\r\n/Event/CallDisconnect\r\n** end\r\n");
    assert_eq!(rx.drain(), vec![feedback_registration_expression()]);
    assert!(e.sync_state().get(Milestone::FeedbackRegistered));
}

#[tokio::test]
async fn feature_commands_wait_for_sync() {
    let (mut e, mut rx) = engine();
    e.handle_connection(true);
    e.execute(Operation::Dial("1234".into())).unwrap();
    assert_eq!(rx.try_next(false), Some((Lane::Handshake, CMD_SYSTEM_UNIT.to_string())));

    {
        let mut next = tokio_test::task::spawn(rx.next(e.is_synced()));
        assert_pending!(next.poll());
    }

    sync(&mut e, LEGACY_FIRMWARE);
    while let Some((Lane::Handshake, _)) = rx.try_next(false) {}
    let mut next = tokio_test::task::spawn(rx.next(e.is_synced()));
    assert_ready_eq!(
        next.poll(),
        Some((Lane::Normal, "xCommand Dial Number: \"1234\"".to_string()))
    );
}

#[test]
fn disconnect_ends_calls_and_presentation() {
    let (mut e, _rx) = engine();
    sync(&mut e, LEGACY_FIRMWARE);
    e.handle_received(&doc(&serde_json::json!({"Status": {
        "Call": [{"id": 1, "Status": {"Value": "Connected"}, "CallType": {"Value": "Video"}}],
        "Conference": {"Presentation": {
            "Mode": {"Value": "Sending"},
            "LocalInstance": [{"id": 1, "SendingMode": {"Value": "LocalRemote"}, "Source": {"Value": "1"}}]
        }}
    }})));
    assert_eq!(e.calls().len(), 1);
    assert!(e.presentation().is_active);

    let events = e.handle_connection(false);
    assert!(events.iter().any(|ev| matches!(ev, CodecEvent::CallDisconnected(c) if c.id == "1")));
    assert!(events.contains(&CodecEvent::PresentationActiveChanged(false)));
    assert_eq!(events.last(), Some(&CodecEvent::Connected(false)));
    assert!(e.calls().is_empty());
    assert!(!e.presentation().is_active);

    // nothing left to end on the next disconnect
    e.handle_connection(true);
    let events = e.handle_connection(false);
    assert_eq!(events, vec![CodecEvent::Connected(false)]);
}

fn serial_engine() -> (CodecEngine, CommandReceiver) {
    let mut config = Config::default();
    config.codec.password = "pw".into();
    let (queue, rx) = CommandQueue::new();
    (CodecEngine::new(&config, queue, true).unwrap(), rx)
}

#[test]
fn serial_login_answers_prompts_split_across_chunks() {
    let (mut e, mut rx) = serial_engine();
    e.handle_connection(true);
    assert!(rx.drain().is_empty());

    e.handle_received(b"Cisco Codec Release\r\nlog");
    assert!(rx.drain().is_empty());
    e.handle_received(b"in: ");
    e.handle_received(b"\r\nPass");
    e.handle_received(b"word: ");
    let events = e.handle_received(b"\r\nLogin successful\r\n");
    assert!(events.contains(&CodecEvent::LoggedIn));
    assert_eq!(rx.drain(), vec!["admin", "pw", CMD_OUTPUT_MODE_JSON]);
    assert!(e.sync_state().get(Milestone::LoginMessageReceived));
}

#[test]
fn unterminated_login_rejection_is_reported_once() {
    let (mut e, mut rx) = serial_engine();
    e.handle_connection(true);
    e.handle_received(b"login: ");
    e.handle_received(b"Password: ");
    rx.drain();

    let mut events = e.handle_received(b"Login incorrect");
    events.extend(e.handle_received(b"\r\n"));
    assert_eq!(
        events.iter().filter(|ev| **ev == CodecEvent::LoginRejected).count(),
        1
    );
    // the codec prompts again and the negotiator starts over
    e.handle_received(b"login: ");
    assert_eq!(rx.drain(), vec!["admin"]);
}

#[test]
fn unparseable_firmware_still_completes_sync() {
    let (mut e, _rx) = engine();
    let events = sync(&mut e, "Unknown-build");
    assert_eq!(events.iter().filter(|ev| **ev == CodecEvent::SyncComplete).count(), 1);
    assert!(e.sync_state().get(Milestone::InitialSoftwareVersionReceived));
    assert!(e.codec_info().firmware.is_none());
    assert_eq!(e.layouts().family(), LayoutFamily::Legacy);
}
