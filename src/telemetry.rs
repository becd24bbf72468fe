// Router stat messages -> network rows.
//
// Payload is a JSON object keyed by host; only values that are objects with an `ip_list`
// carry telemetry:
//   {"wl1": {"hostname": "laptop", "ifname": "wl1",
//            "ip_list": [{"ip": "192.168.1.50", "hw": "aa:bb:cc:dd:ee:ff", "rx_rate": 1200, "tx_rate": 0}]},
//    "uptime": 12345}

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::IngestError;
use crate::models::{NetworkMedium, NetworkStatRow};

/// Per-entry decode results collected into one batch. A failed entry contributes a failure
/// and no rows; its siblings are unaffected.
#[derive(Debug, Default)]
pub struct DecodedTelemetry {
    pub rows: Vec<NetworkStatRow>,
    pub failures: Vec<IngestError>,
}

/// Decode every telemetry-bearing entry of `payload`. A non-object payload has no entries.
pub fn decode(payload: &Value, observed_at: DateTime<Utc>) -> DecodedTelemetry {
    let mut out = DecodedTelemetry::default();
    let Some(entries) = payload.as_object() else {
        return out;
    };
    for (key, value) in entries {
        match decode_entry(key, value, observed_at) {
            None => {}
            Some(Ok(rows)) => out.rows.extend(rows),
            Some(Err(e)) => out.failures.push(e),
        }
    }
    out
}

/// `None` when the entry is not telemetry (not an object, or no `ip_list`).
/// Rows with zero traffic in both directions are left out.
pub fn decode_entry(
    key: &str,
    value: &Value,
    observed_at: DateTime<Utc>,
) -> Option<Result<Vec<NetworkStatRow>, IngestError>> {
    let entry = value.as_object()?;
    let ip_list = entry.get("ip_list")?;
    Some(decode_host(key, entry, ip_list, observed_at))
}

fn decode_host(
    key: &str,
    entry: &Map<String, Value>,
    ip_list: &Value,
    observed_at: DateTime<Utc>,
) -> Result<Vec<NetworkStatRow>, IngestError> {
    let device = str_field(key, entry, "hostname")?;
    let medium = NetworkMedium::resolve(str_field(key, entry, "ifname")?);
    let ips = ip_list
        .as_array()
        .ok_or_else(|| IngestError::malformed(key, "ip_list is not an array"))?;

    let mut rows = Vec::with_capacity(ips.len());
    for (i, ip_data) in ips.iter().enumerate() {
        let ip_entry = ip_data
            .as_object()
            .ok_or_else(|| IngestError::malformed(key, format!("ip_list[{}] is not an object", i)))?;
        let ip = str_field(key, ip_entry, "ip")?;
        let mac = str_field(key, ip_entry, "hw")?;
        let rx_rate = rate_field(key, ip_entry, "rx_rate")?;
        let tx_rate = rate_field(key, ip_entry, "tx_rate")?;

        if rx_rate > 0 || tx_rate > 0 {
            rows.push(NetworkStatRow::new(
                ip,
                Some(mac),
                medium,
                device,
                rx_rate,
                tx_rate,
                observed_at,
            ));
        }
    }
    Ok(rows)
}

fn str_field<'a>(key: &str, obj: &'a Map<String, Value>, name: &str) -> Result<&'a str, IngestError> {
    match obj.get(name) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(IngestError::malformed(
            key,
            format!("{} is not a string: {}", name, other),
        )),
        None => Err(IngestError::malformed(key, format!("missing {}", name))),
    }
}

/// Non-negative integer rate; fractional rates are rounded.
fn rate_field(key: &str, obj: &Map<String, Value>, name: &str) -> Result<u64, IngestError> {
    let v = obj
        .get(name)
        .ok_or_else(|| IngestError::malformed(key, format!("missing {}", name)))?;
    if let Some(n) = v.as_u64() {
        return Ok(n);
    }
    match v.as_f64() {
        Some(f) if f.is_finite() && f >= 0.0 => Ok(f.round() as u64),
        _ => Err(IngestError::malformed(
            key,
            format!("{} is not a non-negative number: {}", name, v),
        )),
    }
}
