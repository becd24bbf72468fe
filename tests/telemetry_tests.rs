// Router message decoding: medium resolution, zero-traffic filter, per-entry isolation

use chrono::{TimeZone, Utc};
use serde_json::json;
use statlog::error::IngestError;
use statlog::models::NetworkMedium;
use statlog::telemetry::{decode, decode_entry};

fn at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

#[test]
fn decodes_wifi_host() {
    let payload = json!({"wl1": {"hostname": "laptop", "ifname": "wl1", "ip_list": [
        {"ip": "192.168.1.50", "hw": "aa:bb:cc:dd:ee:ff", "rx_rate": 1200, "tx_rate": 0}
    ]}});
    let out = decode(&payload, at());
    assert!(out.failures.is_empty());
    assert_eq!(out.rows.len(), 1);
    let row = &out.rows[0];
    assert_eq!(row.medium, NetworkMedium::Wifi2_4G);
    assert_eq!(row.device, "laptop");
    assert_eq!(row.ip, "192.168.1.50");
    assert_eq!(row.mac.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
    assert_eq!(row.rx_rate, 1200);
    assert_eq!(row.tx_rate, 0);
    assert_eq!(row.observed_at, at());
}

#[test]
fn zero_traffic_rows_are_suppressed() {
    let payload = json!({"lan": {"hostname": "nas", "ifname": "", "ip_list": [
        {"ip": "192.168.1.2", "hw": "00:11:22:33:44:55", "rx_rate": 0, "tx_rate": 0},
        {"ip": "192.168.1.3", "hw": "00:11:22:33:44:56", "rx_rate": 0, "tx_rate": 9}
    ]}});
    let out = decode(&payload, at());
    assert_eq!(out.rows.len(), 1);
    assert_eq!(out.rows[0].ip, "192.168.1.3");
    assert_eq!(out.rows[0].medium, NetworkMedium::Ethernet);
    assert!(out.rows.iter().all(|r| r.rx_rate > 0 || r.tx_rate > 0));
}

#[test]
fn non_telemetry_keys_are_ignored() {
    let payload = json!({
        "uptime": 12345,
        "meta": {"version": "1.2"},
        "list": [1, 2, 3],
        "wl0": {"hostname": "phone", "ifname": "wl0", "ip_list": [
            {"ip": "192.168.1.60", "hw": "aa:aa:aa:aa:aa:aa", "rx_rate": 1, "tx_rate": 2}
        ]}
    });
    let out = decode(&payload, at());
    assert!(out.failures.is_empty());
    assert_eq!(out.rows.len(), 1);
    assert_eq!(out.rows[0].medium, NetworkMedium::Wifi5G);
}

#[test]
fn malformed_entry_does_not_abort_siblings() {
    let payload = json!({
        "good": {"hostname": "laptop", "ifname": "wl1", "ip_list": [
            {"ip": "192.168.1.50", "hw": "aa:bb:cc:dd:ee:ff", "rx_rate": 5, "tx_rate": 6}
        ]},
        "bad": {"ifname": "wl0", "ip_list": [
            {"ip": "192.168.1.51", "hw": "aa:bb:cc:dd:ee:00", "rx_rate": 5, "tx_rate": 6}
        ]}
    });
    let out = decode(&payload, at());
    assert_eq!(out.rows.len(), 1);
    assert_eq!(out.rows[0].device, "laptop");
    assert_eq!(out.failures.len(), 1);
    match &out.failures[0] {
        IngestError::MalformedTelemetryEntry { key, reason } => {
            assert_eq!(key, "bad");
            assert!(reason.contains("hostname"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn malformed_ip_element_fails_whole_entry() {
    let value = json!({"hostname": "pc", "ifname": "", "ip_list": [
        {"ip": "192.168.1.5", "hw": "aa:bb:cc:dd:ee:ff", "rx_rate": 5, "tx_rate": 1},
        {"ip": "192.168.1.6", "rx_rate": 5, "tx_rate": 1}
    ]});
    let result = decode_entry("pc", &value, at()).expect("telemetry entry");
    let err = result.unwrap_err();
    assert!(err.to_string().contains("missing hw"));
}

#[test]
fn negative_or_non_numeric_rate_is_malformed() {
    for rate in [json!(-1), json!("12"), json!(null)] {
        let value = json!({"hostname": "pc", "ifname": "", "ip_list": [
            {"ip": "192.168.1.5", "hw": "aa:bb:cc:dd:ee:ff", "rx_rate": rate.clone(), "tx_rate": 1}
        ]});
        let result = decode_entry("pc", &value, at()).expect("telemetry entry");
        assert!(result.is_err(), "rate {rate} should be rejected");
    }
}

#[test]
fn fractional_rate_is_rounded() {
    let value = json!({"hostname": "pc", "ifname": "", "ip_list": [
        {"ip": "192.168.1.5", "hw": "aa:bb:cc:dd:ee:ff", "rx_rate": 10.6, "tx_rate": 0}
    ]});
    let rows = decode_entry("pc", &value, at()).unwrap().unwrap();
    assert_eq!(rows[0].rx_rate, 11);
}

#[test]
fn ip_list_must_be_an_array() {
    let value = json!({"hostname": "pc", "ifname": "", "ip_list": {}});
    let err = decode_entry("pc", &value, at()).unwrap().unwrap_err();
    assert_eq!(err.kind(), "malformed_telemetry_entry");
}

#[test]
fn long_hostname_is_clamped_to_column_width() {
    let long = "h".repeat(300);
    let value = json!({"hostname": long, "ifname": "eth9", "ip_list": [
        {"ip": "192.168.100.200x", "hw": "aa:bb:cc:dd:ee:ff:00", "rx_rate": 1, "tx_rate": 1}
    ]});
    let rows = decode_entry("x", &value, at()).unwrap().unwrap();
    assert_eq!(rows[0].device.len(), 255);
    assert_eq!(rows[0].ip, "192.168.100.200");
    assert_eq!(rows[0].mac.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
    assert_eq!(rows[0].medium, NetworkMedium::Unknown);
}

#[test]
fn non_object_payload_has_no_entries() {
    let out = decode(&json!([1, 2]), at());
    assert!(out.rows.is_empty());
    assert!(out.failures.is_empty());
}
