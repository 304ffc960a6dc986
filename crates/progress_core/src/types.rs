use std::fmt;

use chrono::{DateTime, Utc};

pub type Timestamp = DateTime<Utc>;

/// Opaque job token issued by the backend when an upload is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(String);

impl JobId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Poll,
    Push,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Poll, Channel::Push];

    pub fn other(self) -> Channel {
        match self {
            Channel::Poll => Channel::Push,
            Channel::Push => Channel::Poll,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Channel::Poll => 0,
            Channel::Push => 1,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Poll => write!(f, "poll"),
            Channel::Push => write!(f, "push"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveChannel {
    #[default]
    None,
    Poll,
    Push,
    Both,
}

impl From<Channel> for ActiveChannel {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Poll => ActiveChannel::Poll,
            Channel::Push => ActiveChannel::Push,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Submitting,
    Uploading,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl Phase {
    /// `Completed`, `Failed` and `Cancelled` absorb every later input.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed | Phase::Cancelled)
    }

    /// A job is in flight: a new submission must wait.
    pub fn is_active(self) -> bool {
        matches!(self, Phase::Submitting | Phase::Uploading | Phase::Processing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelHealth {
    #[default]
    Idle,
    Connecting,
    Healthy,
    Degraded,
}

/// A status observation normalized by one of the channel drivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub source: Channel,
    pub progress_percent: u8,
    pub message: String,
    pub sequence_hint: Option<u64>,
    pub received_at: Timestamp,
    /// The backend reported the job itself as failed.
    pub reported_failure: bool,
}

impl ProgressEvent {
    pub fn new(
        source: Channel,
        progress_percent: u8,
        message: impl Into<String>,
        received_at: Timestamp,
    ) -> Self {
        Self {
            source,
            progress_percent: progress_percent.min(100),
            message: message.into(),
            sequence_hint: None,
            received_at,
            reported_failure: false,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence_hint = Some(sequence);
        self
    }

    pub fn failed(mut self) -> Self {
        self.reported_failure = true;
        self
    }
}

/// Byte-level progress of the multipart upload body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub sent_bytes: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 0;
        }
        let sent = self.sent_bytes.min(self.total_bytes) as u128;
        ((sent * 100 + self.total_bytes as u128 / 2) / self.total_bytes as u128) as u8
    }
}

/// The single authoritative view of one monitored job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobState {
    pub job_id: Option<JobId>,
    pub progress_percent: u8,
    pub message: String,
    pub phase: Phase,
    pub active_channel: ActiveChannel,
    pub last_updated_at: Option<Timestamp>,
}
