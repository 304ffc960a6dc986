use std::fmt;

use progress_core::{Channel, ProgressEvent, Timestamp};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportFailure,
    pub message: String,
}

impl TransportError {
    pub(crate) fn new(kind: TransportFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    InvalidUrl,
    /// 4xx answer; the message carries the backend's `error` text when present.
    Rejected { status: u16 },
    HttpStatus(u16),
    Timeout,
    Network,
    /// The peer answered with something that is not a status payload.
    Protocol,
    Io,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFailure::InvalidUrl => write!(f, "invalid url"),
            TransportFailure::Rejected { status } => write!(f, "rejected with status {status}"),
            TransportFailure::HttpStatus(code) => write!(f, "http status {code}"),
            TransportFailure::Timeout => write!(f, "timeout"),
            TransportFailure::Network => write!(f, "network error"),
            TransportFailure::Protocol => write!(f, "unexpected payload"),
            TransportFailure::Io => write!(f, "io error"),
        }
    }
}

/// One status observation as both channels deliver it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub progress_percent: u8,
    pub message: String,
    pub failed: bool,
    pub sequence: Option<u64>,
}

impl StatusSnapshot {
    pub fn into_event(self, channel: Channel, received_at: Timestamp) -> ProgressEvent {
        let mut event = ProgressEvent::new(channel, self.progress_percent, self.message, received_at);
        event.sequence_hint = self.sequence;
        if self.failed {
            event = event.failed();
        }
        event
    }
}

/// The backend's own failure write: progress 0 and this message prefix.
const FAILURE_MESSAGE_PREFIX: &str = "processing failed";

#[derive(Debug, Deserialize)]
struct RawStatus {
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default, alias = "seq")]
    sequence: Option<u64>,
}

/// Parse a `{progress, message}` status payload.
///
/// Missing progress reads as 0, fractions are rounded and out-of-range values
/// clamped. A `status` of `failed`/`error`, an `error` field, or a message
/// starting with "Processing failed" marks the job as failed on the backend.
pub fn parse_status_payload(text: &str) -> Result<StatusSnapshot, TransportError> {
    let raw: RawStatus = serde_json::from_str(text)
        .map_err(|err| TransportError::new(TransportFailure::Protocol, err.to_string()))?;

    let progress_percent = raw.progress.unwrap_or(0.0).round().clamp(0.0, 100.0) as u8;
    let status_failed = raw
        .status
        .as_deref()
        .map(|status| status.eq_ignore_ascii_case("failed") || status.eq_ignore_ascii_case("error"))
        .unwrap_or(false);
    let message_failed = raw
        .message
        .as_deref()
        .is_some_and(is_failure_message);
    let failed = status_failed || message_failed || raw.error.is_some();
    let message = raw.message.or(raw.error).unwrap_or_default();

    Ok(StatusSnapshot {
        progress_percent,
        message,
        failed,
        sequence: raw.sequence,
    })
}

fn is_failure_message(message: &str) -> bool {
    message
        .trim_start()
        .get(..FAILURE_MESSAGE_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(FAILURE_MESSAGE_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_progress() {
        let snapshot = parse_status_payload(r#"{"progress": 42, "message": "Tracking"}"#).unwrap();
        assert_eq!(snapshot.progress_percent, 42);
        assert_eq!(snapshot.message, "Tracking");
        assert!(!snapshot.failed);
        assert_eq!(snapshot.sequence, None);
    }

    #[test]
    fn missing_fields_default_and_values_clamp() {
        let snapshot = parse_status_payload("{}").unwrap();
        assert_eq!(snapshot.progress_percent, 0);
        assert_eq!(snapshot.message, "");

        let snapshot = parse_status_payload(r#"{"progress": 250.0}"#).unwrap();
        assert_eq!(snapshot.progress_percent, 100);

        let snapshot = parse_status_payload(r#"{"progress": 33.6, "seq": 7}"#).unwrap();
        assert_eq!(snapshot.progress_percent, 34);
        assert_eq!(snapshot.sequence, Some(7));
    }

    #[test]
    fn backend_failure_markers() {
        let snapshot =
            parse_status_payload(r#"{"progress": 0, "message": "Processing failed: x", "status": "FAILED"}"#)
                .unwrap();
        assert!(snapshot.failed);

        let snapshot = parse_status_payload(r#"{"error": "disk full"}"#).unwrap();
        assert!(snapshot.failed);
        assert_eq!(snapshot.message, "disk full");

        let snapshot =
            parse_status_payload(r#"{"progress": 0, "message": "Processing failed: codec error"}"#)
                .unwrap();
        assert!(snapshot.failed);
        assert_eq!(snapshot.progress_percent, 0);
        assert_eq!(snapshot.message, "Processing failed: codec error");

        let snapshot =
            parse_status_payload(r#"{"progress": 40, "message": "Processing frames"}"#).unwrap();
        assert!(!snapshot.failed);
    }

    #[test]
    fn rejects_non_json() {
        let err = parse_status_payload("<html>").unwrap_err();
        assert_eq!(err.kind, TransportFailure::Protocol);
    }
}
