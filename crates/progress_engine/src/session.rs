use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::Utc;
use monitor_logging::{monitor_debug, monitor_info, monitor_warn};
use progress_core::{
    update, validate_upload, Channel, ChannelHealth, Effect, JobId, JobState, JobView,
    MonitorState, Msg, Phase, ProgressEvent, UploadMetadata,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::observer::ObserverRegistry;
use crate::{
    ChannelDriver, DriverSink, HttpBackend, JobBackend, JobObserver, MonitorConfig, ObserverId,
    Poller, PushListener, SessionError, SubmitRequest, UploadFile, UploadProgressSink,
};

/// One upload-to-completion session.
///
/// Owns the reconciler state and both channel drivers. Every input, whether
/// from a driver, a timer or the caller, is folded through [`update`] under a
/// single lock, so reconciliation never runs concurrently with itself.
/// Observers are notified after that lock is released. Dropping the session
/// tears it down.
pub struct JobSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: MonitorConfig,
    backend: Arc<dyn JobBackend>,
    poller: Arc<dyn ChannelDriver>,
    push: Arc<dyn ChannelDriver>,
    state: Mutex<SessionState>,
    /// Generation whose drivers are currently started.
    drivers: Mutex<Option<u64>>,
    observers: ObserverRegistry,
}

struct SessionState {
    monitor: MonitorState,
    generation: u64,
    /// Cancelled once the generation stops; late callbacks check it.
    token: CancellationToken,
}

impl JobSession {
    pub fn new(
        config: MonitorConfig,
        backend: Arc<dyn JobBackend>,
        poller: Arc<dyn ChannelDriver>,
        push: Arc<dyn ChannelDriver>,
    ) -> Self {
        debug_assert_eq!(poller.channel(), Channel::Poll);
        debug_assert_eq!(push.channel(), Channel::Push);
        let monitor = MonitorState::new(config.reconcile.clone());
        let observers = ObserverRegistry::new(monitor.view());
        let token = CancellationToken::new();
        token.cancel();
        Self {
            inner: Arc::new(SessionInner {
                config,
                backend,
                poller,
                push,
                state: Mutex::new(SessionState {
                    monitor,
                    generation: 0,
                    token,
                }),
                drivers: Mutex::new(None),
                observers,
            }),
        }
    }

    /// Build a session wired to the HTTP backend, the poller and the push
    /// listener described by `config`.
    pub fn connect(config: MonitorConfig) -> Result<Self, SessionError> {
        let endpoints = config.endpoints()?;
        let backend = Arc::new(
            HttpBackend::new(endpoints.clone(), &config).map_err(SessionError::Transport)?,
        );
        let poller = Arc::new(Poller::new(backend.clone(), config.poll_interval));
        let push = Arc::new(PushListener::new(endpoints, config.connect_timeout));
        Ok(Self::new(config, backend, poller, push))
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    /// Validate and upload a video, then monitor the job the backend creates.
    ///
    /// Resolves once the backend has accepted the upload; progress after that
    /// reaches observers. Validation errors leave the session untouched.
    pub async fn submit(
        &self,
        file: UploadFile,
        metadata: UploadMetadata,
    ) -> Result<JobId, SessionError> {
        let inner = &self.inner;
        let metadata = validate_upload(&file.info(), metadata, &inner.config.upload)?;

        let (generation, token) = {
            let mut guard = inner.lock_state();
            let phase = guard.monitor.phase();
            if phase.is_active() {
                return Err(SessionError::Busy { phase });
            }
            guard.generation += 1;
            guard.token = CancellationToken::new();
            let effects = inner.fold(&mut guard, Msg::SubmitRequested { at: Utc::now() });
            debug_assert!(effects.is_empty());
            (guard.generation, guard.token.clone())
        };
        inner.observers.flush();

        monitor_info!(
            "Submitting {} ({} bytes) title={:?} generation={}",
            file.file_name(),
            file.size(),
            metadata.title,
            generation
        );
        let sink = Arc::new(SessionSink::new(inner, generation, token.clone()));
        let request = SubmitRequest { file, metadata };
        let outcome = tokio::select! {
            _ = token.cancelled() => None,
            result = inner.backend.submit(request, sink) => Some(result),
        };

        match outcome {
            None => Err(SessionError::Aborted),
            Some(Ok(job_id)) => {
                let msg = Msg::Submitted {
                    job_id: job_id.clone(),
                    at: Utc::now(),
                };
                if !inner.dispatch(generation, msg) {
                    return Err(SessionError::Aborted);
                }
                monitor_info!("Upload accepted job_id={}", job_id);
                Ok(job_id)
            }
            Some(Err(err)) => {
                monitor_warn!("Upload failed: {}", err);
                inner.dispatch(
                    generation,
                    Msg::SubmitFailed {
                        message: format!("Upload failed: {}", err.message),
                        at: Utc::now(),
                    },
                );
                Err(SessionError::Submit(err))
            }
        }
    }

    /// Stop monitoring the current job. Partial progress stays on display.
    pub fn cancel(&self) -> Result<(), SessionError> {
        let inner = &self.inner;
        let (generation, effects) = {
            let mut guard = inner.lock_state();
            let phase = guard.monitor.phase();
            if phase != Phase::Processing {
                return Err(SessionError::NotMonitoring { phase });
            }
            let effects = inner.fold(&mut guard, Msg::CancelRequested { at: Utc::now() });
            (guard.generation, effects)
        };
        inner.observers.flush();
        monitor_info!("Monitoring cancelled generation={}", generation);
        inner.run_effects(generation, effects);
        Ok(())
    }

    /// Abort any in-flight upload, stop both drivers and return to `Idle`.
    /// Safe to call in any phase and more than once.
    pub fn teardown(&self) {
        self.inner.teardown();
    }

    pub fn state(&self) -> JobState {
        self.inner.lock_state().monitor.job().clone()
    }

    pub fn view(&self) -> JobView {
        self.inner.lock_state().monitor.view()
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock_state().monitor.phase()
    }

    pub fn channel_health(&self, channel: Channel) -> ChannelHealth {
        self.inner.lock_state().monitor.channel(channel).health
    }

    /// A receiver that always holds the latest published view.
    pub fn subscribe(&self) -> watch::Receiver<JobView> {
        self.inner.observers.subscribe()
    }

    pub fn add_observer(&self, observer: impl JobObserver + 'static) -> ObserverId {
        self.inner.observers.add(Arc::new(observer))
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.inner.observers.remove(id)
    }
}

impl Drop for JobSession {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl SessionInner {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_drivers(&self) -> MutexGuard<'_, Option<u64>> {
        self.drivers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run one message through the reconciler and queue a view if anything
    /// visible changed. Caller holds the state lock and flushes the
    /// observers once it is released.
    fn fold(&self, guard: &mut SessionState, msg: Msg) -> Vec<Effect> {
        let monitor = std::mem::take(&mut guard.monitor);
        let (mut monitor, effects) = update(monitor, msg);
        if monitor.consume_dirty() {
            self.observers.enqueue(monitor.view());
        }
        guard.monitor = monitor;
        effects
    }

    /// Returns `false` when the message belongs to a stopped generation and
    /// was discarded.
    fn dispatch(self: &Arc<Self>, generation: u64, msg: Msg) -> bool {
        let effects = {
            let mut guard = self.lock_state();
            if guard.generation != generation || guard.token.is_cancelled() {
                monitor_debug!(
                    "Discarding late input for generation {} (current {})",
                    generation,
                    guard.generation
                );
                return false;
            }
            self.fold(&mut guard, msg)
        };
        self.observers.flush();
        self.run_effects(generation, effects);
        true
    }

    fn live_token(&self, generation: u64) -> Option<CancellationToken> {
        let guard = self.lock_state();
        (guard.generation == generation && !guard.token.is_cancelled())
            .then(|| guard.token.clone())
    }

    fn run_effects(self: &Arc<Self>, generation: u64, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartDrivers { job_id } => self.start_drivers(generation, job_id),
                Effect::StopDrivers => {
                    {
                        let guard = self.lock_state();
                        if guard.generation == generation {
                            guard.token.cancel();
                        }
                    }
                    self.stop_drivers(Some(generation));
                }
                Effect::ArmDeadline => self.arm_deadline(generation),
                Effect::ScheduleReconnect {
                    channel,
                    attempt,
                    delay,
                } => self.schedule_reconnect(generation, channel, attempt, delay),
                Effect::RestartDriver { channel, job_id } => {
                    self.restart_driver(generation, channel, job_id)
                }
            }
        }
    }

    fn start_drivers(self: &Arc<Self>, generation: u64, job_id: JobId) {
        let mut running = self.lock_drivers();
        // Checked under the drivers lock so a concurrent stop cannot be missed.
        let Some(token) = self.live_token(generation) else {
            monitor_debug!("Skipping driver start for stopped generation {}", generation);
            return;
        };
        if running.take().is_some() {
            self.poller.stop();
            self.push.stop();
        }
        let sink: Arc<dyn DriverSink> = Arc::new(SessionSink::new(self, generation, token));
        self.poller.start(job_id.clone(), sink.clone());
        self.push.start(job_id, sink);
        *running = Some(generation);
    }

    /// Stop the drivers started for `generation`, or whatever runs when
    /// `None`. Each start is matched by exactly one stop.
    fn stop_drivers(&self, generation: Option<u64>) {
        let mut running = self.lock_drivers();
        let matches = match (*running, generation) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(current), Some(wanted)) => current == wanted,
        };
        if matches {
            self.poller.stop();
            self.push.stop();
            *running = None;
        }
    }

    fn restart_driver(self: &Arc<Self>, generation: u64, channel: Channel, job_id: JobId) {
        let running = self.lock_drivers();
        if *running != Some(generation) {
            return;
        }
        let Some(token) = self.live_token(generation) else {
            return;
        };
        monitor_info!("Restarting {} channel job_id={}", channel, job_id);
        let sink: Arc<dyn DriverSink> = Arc::new(SessionSink::new(self, generation, token));
        self.driver(channel).start(job_id, sink);
    }

    fn arm_deadline(self: &Arc<Self>, generation: u64) {
        let Some(limit) = self.config.max_monitoring_duration else {
            return;
        };
        let Some(token) = self.live_token(generation) else {
            return;
        };
        let session = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(limit) => {
                    if let Some(session) = session.upgrade() {
                        monitor_warn!("Monitoring ceiling of {}s reached", limit.as_secs());
                        session.dispatch(generation, Msg::DeadlineElapsed { limit, at: Utc::now() });
                    }
                }
            }
        });
    }

    fn schedule_reconnect(
        self: &Arc<Self>,
        generation: u64,
        channel: Channel,
        attempt: u32,
        delay: Duration,
    ) {
        let Some(token) = self.live_token(generation) else {
            return;
        };
        monitor_info!(
            "Reconnecting {} channel in {}ms (attempt {})",
            channel,
            delay.as_millis(),
            attempt
        );
        let session = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if let Some(session) = session.upgrade() {
                        session.dispatch(generation, Msg::ReconnectDue { channel, at: Utc::now() });
                    }
                }
            }
        });
    }

    fn teardown(&self) {
        {
            let mut guard = self.lock_state();
            guard.token.cancel();
            guard.generation += 1;
            // Reset only ever asks for the drivers to stop, done below.
            let _ = self.fold(&mut guard, Msg::Reset);
        }
        self.observers.flush();
        self.stop_drivers(None);
        monitor_debug!("Session torn down");
    }

    fn driver(&self, channel: Channel) -> &Arc<dyn ChannelDriver> {
        match channel {
            Channel::Poll => &self.poller,
            Channel::Push => &self.push,
        }
    }
}

/// Routes driver and upload callbacks of one generation back into the
/// session. Holds only a weak reference so a dropped session is not kept
/// alive by its own drivers.
struct SessionSink {
    session: Weak<SessionInner>,
    generation: u64,
    token: CancellationToken,
}

impl SessionSink {
    fn new(session: &Arc<SessionInner>, generation: u64, token: CancellationToken) -> Self {
        Self {
            session: Arc::downgrade(session),
            generation,
            token,
        }
    }

    fn dispatch(&self, msg: Msg) {
        if self.token.is_cancelled() {
            return;
        }
        if let Some(session) = self.session.upgrade() {
            session.dispatch(self.generation, msg);
        }
    }
}

impl DriverSink for SessionSink {
    fn on_event(&self, event: ProgressEvent) {
        self.dispatch(Msg::Progress(event));
    }

    fn on_health(&self, channel: Channel, health: ChannelHealth, detail: Option<String>) {
        self.dispatch(Msg::ChannelHealthChanged {
            channel,
            health,
            detail,
            at: Utc::now(),
        });
    }
}

impl UploadProgressSink for SessionSink {
    fn on_upload_progress(&self, sent_bytes: u64, total_bytes: u64) {
        self.dispatch(Msg::UploadProgressed {
            sent_bytes,
            total_bytes,
            at: Utc::now(),
        });
    }
}
