use crate::view_model::JobView;
use crate::{
    ActiveChannel, Channel, ChannelHealth, JobId, JobState, Phase, ProgressEvent,
    ReconcileSettings, Timestamp, UploadProgress,
};

pub const SUBMITTING_MESSAGE: &str = "Starting upload...";
pub const MONITORING_MESSAGE: &str = "Upload complete! Starting video analysis...";

/// Reconciler bookkeeping for one channel. Not part of the published state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelStatus {
    pub health: ChannelHealth,
    pub consecutive_failures: u32,
    pub last_accepted_at: Option<Timestamp>,
    pub last_sequence: Option<u64>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MonitorState {
    settings: ReconcileSettings,
    job: JobState,
    upload: Option<UploadProgress>,
    channels: [ChannelStatus; 2],
    reconnect_attempts: u32,
    dirty: bool,
}

impl MonitorState {
    pub fn new(settings: ReconcileSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    pub fn job(&self) -> &JobState {
        &self.job
    }

    pub fn phase(&self) -> Phase {
        self.job.phase
    }

    pub fn upload(&self) -> Option<UploadProgress> {
        self.upload
    }

    pub fn channel(&self, channel: Channel) -> &ChannelStatus {
        &self.channels[channel.index()]
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn view(&self) -> JobView {
        JobView {
            state: self.job.clone(),
            upload: self.upload,
            poll_health: self.channel(Channel::Poll).health,
            push_health: self.channel(Channel::Push).health,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns whether anything visible changed since the last call, and
    /// clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn begin_submission(&mut self, at: Timestamp) {
        let settings = std::mem::take(&mut self.settings);
        *self = Self::new(settings);
        self.job.phase = Phase::Submitting;
        self.job.message = SUBMITTING_MESSAGE.to_string();
        self.job.last_updated_at = Some(at);
        self.dirty = true;
    }

    pub(crate) fn record_upload(&mut self, progress: UploadProgress, at: Timestamp) {
        if let Some(previous) = self.upload {
            // Byte counters only grow; anything else is a late duplicate.
            if progress.sent_bytes <= previous.sent_bytes {
                return;
            }
        }
        self.upload = Some(progress);
        self.job.phase = Phase::Uploading;
        self.job.message = format!("Uploading: {}%", progress.percent());
        self.job.last_updated_at = Some(at);
        self.dirty = true;
    }

    pub(crate) fn begin_monitoring(&mut self, job_id: JobId, at: Timestamp) {
        self.job.job_id = Some(job_id);
        self.job.phase = Phase::Processing;
        self.job.message = MONITORING_MESSAGE.to_string();
        self.job.last_updated_at = Some(at);
        for status in &mut self.channels {
            status.health = ChannelHealth::Connecting;
        }
        self.dirty = true;
    }

    /// Force a terminal phase. A `None` message keeps the last one so partial
    /// progress stays on display.
    pub(crate) fn terminate(&mut self, phase: Phase, message: Option<String>, at: Timestamp) {
        debug_assert!(phase.is_terminal());
        self.job.phase = phase;
        if let Some(message) = message {
            self.job.message = message;
        }
        self.job.last_updated_at = Some(at);
        self.dirty = true;
    }

    /// Any observation from a channel proves it is alive, even when the
    /// event itself is dropped. A health change is still published.
    pub(crate) fn note_alive(&mut self, channel: Channel, sequence: Option<u64>) {
        let status = &mut self.channels[channel.index()];
        status.consecutive_failures = 0;
        status.last_error = None;
        if status.health != ChannelHealth::Healthy {
            status.health = ChannelHealth::Healthy;
            self.dirty = true;
        }
        if let Some(sequence) = sequence {
            status.last_sequence = Some(status.last_sequence.map_or(sequence, |s| s.max(sequence)));
        }
    }

    pub(crate) fn accept(&mut self, event: &ProgressEvent) {
        self.job.progress_percent = event.progress_percent;
        self.job.message = event.message.clone();
        self.job.last_updated_at = Some(event.received_at);
        self.channels[event.source.index()].last_accepted_at = Some(event.received_at);
        self.job.active_channel = if self.is_fresh(event.source.other(), event.received_at) {
            ActiveChannel::Both
        } else {
            event.source.into()
        };
        if event.progress_percent == 100 {
            self.job.phase = Phase::Completed;
        }
        self.dirty = true;
    }

    /// Returns `true` when the channel was not degraded before.
    pub(crate) fn mark_degraded(&mut self, channel: Channel, detail: Option<String>) -> bool {
        let status = &mut self.channels[channel.index()];
        let newly_degraded = status.health != ChannelHealth::Degraded;
        status.health = ChannelHealth::Degraded;
        status.consecutive_failures = status.consecutive_failures.saturating_add(1);
        status.last_error = detail;
        status.last_accepted_at = None;

        let survivor = channel.other();
        let active = if self.channel(survivor).last_accepted_at.is_some() {
            survivor.into()
        } else {
            ActiveChannel::None
        };
        if newly_degraded || active != self.job.active_channel {
            self.job.active_channel = active;
            self.dirty = true;
        }
        newly_degraded
    }

    pub(crate) fn set_health(&mut self, channel: Channel, health: ChannelHealth) {
        let status = &mut self.channels[channel.index()];
        if health == ChannelHealth::Healthy {
            status.consecutive_failures = 0;
            status.last_error = None;
        }
        if status.health != health {
            status.health = health;
            self.dirty = true;
        }
    }

    /// A restarted connection numbers its events from scratch.
    pub(crate) fn restart_sequence(&mut self, channel: Channel) {
        self.channels[channel.index()].last_sequence = None;
    }

    pub(crate) fn all_degraded(&self) -> bool {
        self.channels
            .iter()
            .all(|status| status.health == ChannelHealth::Degraded)
    }

    pub(crate) fn total_consecutive_failures(&self) -> u32 {
        self.channels
            .iter()
            .fold(0u32, |sum, status| sum.saturating_add(status.consecutive_failures))
    }

    pub(crate) fn next_reconnect_attempt(&mut self) -> u32 {
        self.reconnect_attempts += 1;
        self.reconnect_attempts
    }

    /// Forget the job. Marks dirty only when something was tracked.
    pub(crate) fn reset(&mut self) {
        let settings = std::mem::take(&mut self.settings);
        let fresh = Self::new(settings);
        let changed = self.job != fresh.job || self.upload.is_some();
        *self = fresh;
        self.dirty = changed;
    }

    fn is_fresh(&self, channel: Channel, now: Timestamp) -> bool {
        let Some(last) = self.channel(channel).last_accepted_at else {
            return false;
        };
        match (now - last).to_std() {
            Ok(age) => age <= self.settings.freshness_window,
            // The other channel's event is newer than this one.
            Err(_) => true,
        }
    }
}
