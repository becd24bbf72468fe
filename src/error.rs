// Error kinds of the ingestion pipeline. Each one is contained by the operation that
// detects it: the sampler loop and the message handler log it and keep running.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    /// Counter command exited non-zero, timed out, could not be spawned, or printed
    /// something that is not the header/value CSV shape.
    #[error("sample collection failed: {reason}; stderr={stderr:?}; stdout={stdout:?}")]
    SampleCollectionFailed {
        reason: String,
        stderr: String,
        stdout: String,
    },

    /// One host entry of a router message lacks a required field. Sibling entries still decode.
    #[error("malformed telemetry entry {key:?}: {reason}")]
    MalformedTelemetryEntry { key: String, reason: String },

    /// Message payload is not a JSON object. `diagnostics` carries topic, properties and payload.
    #[error("payload decode failed: {reason}; {diagnostics}")]
    PayloadDecodeFailed { reason: String, diagnostics: String },

    #[error("sink commit failed: {0}")]
    SinkCommitFailed(#[source] anyhow::Error),
}

impl IngestError {
    pub(crate) fn sample(reason: impl Into<String>, stderr: &str, stdout: &str) -> Self {
        Self::SampleCollectionFailed {
            reason: reason.into(),
            stderr: stderr.to_string(),
            stdout: stdout.to_string(),
        }
    }

    pub(crate) fn malformed(key: &str, reason: impl Into<String>) -> Self {
        Self::MalformedTelemetryEntry {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Short tag for the `kind` field of log events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SampleCollectionFailed { .. } => "sample_collection_failed",
            Self::MalformedTelemetryEntry { .. } => "malformed_telemetry_entry",
            Self::PayloadDecodeFailed { .. } => "payload_decode_failed",
            Self::SinkCommitFailed(_) => "sink_commit_failed",
        }
    }
}
