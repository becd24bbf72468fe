// Message ingestion: timestamp resolution, drop paths, one commit per message

mod common;

use chrono::{TimeZone, Utc};
use common::RecordingSink;
use statlog::error::IngestError;
use statlog::ingestor::{InboundMessage, MessageIngestor, MessageOutcome, TIMESTAMP_PROPERTY};
use statlog::models::NetworkMedium;
use std::sync::Arc;
use std::sync::atomic::Ordering;

const TOPIC: &str = "home/router-stat";

const PAYLOAD: &str = r#"{
    "wl1": {"hostname": "laptop", "ifname": "wl1", "ip_list": [
        {"ip": "192.168.1.50", "hw": "aa:bb:cc:dd:ee:ff", "rx_rate": 1200, "tx_rate": 0}
    ]},
    "wl0": {"ifname": "wl0", "ip_list": [
        {"ip": "192.168.1.51", "hw": "aa:bb:cc:dd:ee:00", "rx_rate": 1, "tx_rate": 1}
    ]},
    "uptime": 99
}"#;

#[test]
fn observed_at_uses_timestamp_property() {
    let msg = InboundMessage::new(TOPIC, PAYLOAD).with_property(TIMESTAMP_PROPERTY, "1760875200");
    assert_eq!(
        msg.observed_at(),
        Utc.timestamp_opt(1_760_875_200, 0).unwrap()
    );
}

#[test]
fn observed_at_truncates_fractional_seconds() {
    let msg = InboundMessage::new(TOPIC, PAYLOAD).with_property(TIMESTAMP_PROPERTY, "1760875200.9");
    assert_eq!(msg.observed_at().timestamp(), 1_760_875_200);
}

#[test]
fn observed_at_falls_back_to_now() {
    let before = Utc::now().timestamp();
    let missing = InboundMessage::new(TOPIC, PAYLOAD);
    let garbage = InboundMessage::new(TOPIC, PAYLOAD).with_property(TIMESTAMP_PROPERTY, "soon");
    assert!(missing.observed_at().timestamp() >= before);
    assert!(garbage.observed_at().timestamp() >= before);
}

#[tokio::test]
async fn commits_good_entries_and_counts_malformed() {
    let sink = Arc::new(RecordingSink::default());
    let ingestor = MessageIngestor::new(sink.clone());
    let msg = InboundMessage::new(TOPIC, PAYLOAD).with_property(TIMESTAMP_PROPERTY, "1760875200");

    let outcome = ingestor.handle_message(&msg).await;
    assert!(matches!(
        outcome,
        MessageOutcome::Committed {
            rows: 1,
            malformed_entries: 1
        }
    ));

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    assert!(batches[0].storage.is_empty());
    let row = &batches[0].network[0];
    assert_eq!(row.device, "laptop");
    assert_eq!(row.medium, NetworkMedium::Wifi2_4G);
    assert_eq!(row.observed_at.timestamp(), 1_760_875_200);
}

#[tokio::test]
async fn invalid_json_is_dropped_with_diagnostics() {
    let sink = Arc::new(RecordingSink::default());
    let ingestor = MessageIngestor::new(sink.clone());
    let msg = InboundMessage::new(TOPIC, "{not json").with_property(TIMESTAMP_PROPERTY, "1");

    let outcome = ingestor.handle_message(&msg).await;
    match outcome {
        MessageOutcome::Dropped(IngestError::PayloadDecodeFailed { diagnostics, .. }) => {
            assert!(diagnostics.contains(TOPIC));
            assert!(diagnostics.contains("timestamp"));
            assert!(diagnostics.contains("{not json"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_object_json_is_dropped() {
    let sink = Arc::new(RecordingSink::default());
    let ingestor = MessageIngestor::new(sink.clone());
    let outcome = ingestor
        .handle_message(&InboundMessage::new(TOPIC, "[1,2,3]"))
        .await;
    assert!(matches!(
        outcome,
        MessageOutcome::Dropped(IngestError::PayloadDecodeFailed { .. })
    ));
}

#[tokio::test]
async fn sink_failure_drops_whole_message_and_next_message_still_commits() {
    let sink = Arc::new(RecordingSink::failing());
    let ingestor = MessageIngestor::new(sink.clone());
    let msg = InboundMessage::new(TOPIC, PAYLOAD);

    let outcome = ingestor.handle_message(&msg).await;
    assert!(matches!(
        outcome,
        MessageOutcome::Dropped(IngestError::SinkCommitFailed(_))
    ));
    assert!(sink.batches().is_empty());

    sink.failing.store(false, Ordering::SeqCst);
    let outcome = ingestor.handle_message(&msg).await;
    assert!(matches!(outcome, MessageOutcome::Committed { rows: 1, .. }));
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn message_without_traffic_commits_empty_batch() {
    let sink = Arc::new(RecordingSink::default());
    let ingestor = MessageIngestor::new(sink.clone());
    let payload = r#"{"lan": {"hostname": "nas", "ifname": "", "ip_list": [
        {"ip": "192.168.1.2", "hw": "00:11:22:33:44:55", "rx_rate": 0, "tx_rate": 0}
    ]}}"#;
    let outcome = ingestor
        .handle_message(&InboundMessage::new(TOPIC, payload))
        .await;
    assert!(matches!(
        outcome,
        MessageOutcome::Committed {
            rows: 0,
            malformed_entries: 0
        }
    ));
}
