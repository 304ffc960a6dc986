use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use monitor_logging::{monitor_debug, monitor_info, monitor_warn};
use progress_core::{Channel, ChannelHealth, JobId};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::driver::{ChannelHandle, HandleSlot};
use crate::{ChannelDriver, DriverSink, JobBackend};

/// Requests the job status on a fixed cadence.
pub struct Poller {
    backend: Arc<dyn JobBackend>,
    interval: Duration,
    slot: HandleSlot,
}

impl Poller {
    pub fn new(backend: Arc<dyn JobBackend>, interval: Duration) -> Self {
        Self {
            backend,
            interval,
            slot: HandleSlot::default(),
        }
    }
}

impl ChannelDriver for Poller {
    fn channel(&self) -> Channel {
        Channel::Poll
    }

    fn start(&self, job_id: JobId, sink: Arc<dyn DriverSink>) {
        monitor_info!(
            "Poller starting job_id={} interval_ms={}",
            job_id,
            self.interval.as_millis()
        );
        let token = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            self.backend.clone(),
            job_id,
            self.interval,
            sink,
            token.clone(),
        ));
        self.slot.install(ChannelHandle::new(token, task));
    }

    fn stop(&self) {
        if self.slot.release() {
            monitor_info!("Poller stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.slot.is_occupied()
    }
}

async fn poll_loop(
    backend: Arc<dyn JobBackend>,
    job_id: JobId,
    interval: Duration,
    sink: Arc<dyn DriverSink>,
    token: CancellationToken,
) {
    // First request one interval after start, like a browser interval timer.
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sequence = 0u64;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                sequence += 1;
                // A slow response must not hold back the cadence.
                tokio::spawn(poll_once(
                    backend.clone(),
                    job_id.clone(),
                    sink.clone(),
                    token.clone(),
                    sequence,
                ));
            }
        }
    }
}

async fn poll_once(
    backend: Arc<dyn JobBackend>,
    job_id: JobId,
    sink: Arc<dyn DriverSink>,
    token: CancellationToken,
    sequence: u64,
) {
    let result = backend.fetch_status(&job_id).await;
    if token.is_cancelled() {
        monitor_debug!(
            "Discarding poll response job_id={} seq={} after stop",
            job_id,
            sequence
        );
        return;
    }
    match result {
        Ok(snapshot) => {
            let event = snapshot
                .into_event(Channel::Poll, Utc::now())
                .with_sequence(sequence);
            sink.on_event(event);
        }
        Err(err) => {
            monitor_warn!(
                "Status request failed job_id={} seq={}: {}",
                job_id,
                sequence,
                err
            );
            sink.on_health(Channel::Poll, ChannelHealth::Degraded, Some(err.to_string()));
        }
    }
}
