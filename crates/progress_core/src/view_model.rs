use crate::{ChannelHealth, JobState, Phase, UploadProgress};

/// Snapshot handed to observers after every visible change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobView {
    pub state: JobState,
    pub upload: Option<UploadProgress>,
    pub poll_health: ChannelHealth,
    pub push_health: ChannelHealth,
}

impl JobView {
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.state.phase.is_terminal()
    }

    /// Percentage a progress bar should show: upload bytes while uploading,
    /// server-side progress afterwards.
    pub fn display_percent(&self) -> u8 {
        match (self.state.phase, self.upload) {
            (Phase::Uploading, Some(upload)) => upload.percent(),
            _ => self.state.progress_percent,
        }
    }

    /// True while at least one channel is known to be failing.
    pub fn has_degraded_channel(&self) -> bool {
        self.poll_health == ChannelHealth::Degraded || self.push_health == ChannelHealth::Degraded
    }
}
