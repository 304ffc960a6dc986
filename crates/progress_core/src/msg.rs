use std::time::Duration;

use crate::{Channel, ChannelHealth, JobId, ProgressEvent, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// A validated upload is about to be sent; starts a fresh job.
    SubmitRequested { at: Timestamp },
    /// Bytes of the upload body handed to the transport.
    UploadProgressed {
        sent_bytes: u64,
        total_bytes: u64,
        at: Timestamp,
    },
    /// The backend accepted the upload and issued a job id.
    Submitted { job_id: JobId, at: Timestamp },
    /// The submission call itself failed.
    SubmitFailed { message: String, at: Timestamp },
    /// A status observation from either channel.
    Progress(ProgressEvent),
    /// A driver reported a change in its transport health.
    ChannelHealthChanged {
        channel: Channel,
        health: ChannelHealth,
        detail: Option<String>,
        at: Timestamp,
    },
    /// A scheduled reconnect delay elapsed.
    ReconnectDue { channel: Channel, at: Timestamp },
    /// The user asked to stop monitoring.
    CancelRequested { at: Timestamp },
    /// The monitoring ceiling elapsed before a terminal phase.
    DeadlineElapsed { limit: Duration, at: Timestamp },
    /// The owning session ended; forget the job.
    Reset,
    NoOp,
}
