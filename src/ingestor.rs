// Per-message ingestion: timestamp, JSON parse, decode, one commit.
// Never fails outward; the transport acks the message whatever the outcome.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::error::IngestError;
use crate::models::StatBatch;
use crate::stat_repo::StatSink;
use crate::telemetry;

/// User property carrying the observation time, seconds since the epoch.
pub const TIMESTAMP_PROPERTY: &str = "timestamp";

/// A delivered message, detached from the transport's packet type.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
    pub retain: bool,
    pub user_properties: Vec<(String, String)>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: false,
            user_properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_properties.push((key.into(), value.into()));
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.user_properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Everything known about the message, for error logs.
    pub fn diagnostics(&self) -> String {
        format!(
            "topic={:?} retain={} user_properties={:?} payload_len={} payload={:?}",
            self.topic,
            self.retain,
            self.user_properties,
            self.payload.len(),
            String::from_utf8_lossy(&self.payload)
        )
    }

    /// Observation time from the `timestamp` property (fraction truncated), else now.
    pub fn observed_at(&self) -> DateTime<Utc> {
        let Some(raw) = self.property(TIMESTAMP_PROPERTY) else {
            return Utc::now();
        };
        let parsed = raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|secs| secs.is_finite())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs.trunc() as i64, 0));
        parsed.unwrap_or_else(|| {
            warn!(timestamp = %raw, "unusable timestamp property, using current time");
            Utc::now()
        })
    }
}

#[derive(Debug)]
pub enum MessageOutcome {
    /// Batch committed (possibly empty). `malformed_entries` were skipped.
    Committed {
        rows: usize,
        malformed_entries: usize,
    },
    /// Nothing written for this message.
    Dropped(IngestError),
}

pub struct MessageIngestor<S> {
    sink: Arc<S>,
}

impl<S: StatSink> MessageIngestor<S> {
    pub fn new(sink: Arc<S>) -> Self {
        Self { sink }
    }

    #[instrument(skip_all, fields(topic = %msg.topic))]
    pub async fn handle_message(&self, msg: &InboundMessage) -> MessageOutcome {
        info!("new message");
        let observed_at = msg.observed_at();

        let payload = match parse_payload(msg) {
            Ok(v) => v,
            Err(e) => {
                error!(kind = e.kind(), error = %e, "dropping message");
                return MessageOutcome::Dropped(e);
            }
        };

        let decoded = telemetry::decode(&payload, observed_at);
        for e in &decoded.failures {
            warn!(kind = e.kind(), error = %e, "skipping telemetry entry");
        }
        let malformed_entries = decoded.failures.len();

        let batch = StatBatch {
            network: decoded.rows,
            storage: Vec::new(),
        };
        let rows = batch.len();
        if let Err(e) = self.sink.commit(&batch).await {
            error!(kind = e.kind(), error = %e, rows, "dropping batch");
            return MessageOutcome::Dropped(e);
        }

        info!(rows, malformed_entries, "{} new records added", rows);
        MessageOutcome::Committed {
            rows,
            malformed_entries,
        }
    }
}

fn parse_payload(msg: &InboundMessage) -> Result<serde_json::Value, IngestError> {
    let fail = |reason: String| IngestError::PayloadDecodeFailed {
        reason,
        diagnostics: msg.diagnostics(),
    };
    let value: serde_json::Value =
        serde_json::from_slice(&msg.payload).map_err(|e| fail(format!("invalid JSON: {}", e)))?;
    if !value.is_object() {
        return Err(fail("payload is not a JSON object".to_string()));
    }
    Ok(value)
}
