use std::sync::{Arc, Mutex, MutexGuard};

use progress_core::{Channel, ChannelHealth, JobId, ProgressEvent};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Where a driver delivers what it observes.
pub trait DriverSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
    fn on_health(&self, channel: Channel, health: ChannelHealth, detail: Option<String>);
}

/// One transport used to observe job status.
///
/// `start` must be called from within a tokio runtime. `stop` is idempotent
/// and never waits for in-flight work; results that arrive afterwards are
/// dropped by the driver.
pub trait ChannelDriver: Send + Sync {
    fn channel(&self) -> Channel;
    fn start(&self, job_id: JobId, sink: Arc<dyn DriverSink>);
    fn stop(&self);
    fn is_running(&self) -> bool;
}

/// Resources held by a running driver.
#[derive(Debug)]
pub(crate) struct ChannelHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ChannelHandle {
    pub(crate) fn new(token: CancellationToken, task: JoinHandle<()>) -> Self {
        Self { token, task }
    }

    fn release(self) {
        // Cancel, never abort: the task closes its connection before exiting.
        self.token.cancel();
        drop(self.task);
    }
}

/// The single handle slot of a driver.
#[derive(Debug, Default)]
pub(crate) struct HandleSlot {
    handle: Mutex<Option<ChannelHandle>>,
}

impl HandleSlot {
    /// Store a new handle, releasing any previous one.
    pub(crate) fn install(&self, handle: ChannelHandle) {
        let previous = self.lock().replace(handle);
        if let Some(previous) = previous {
            previous.release();
        }
    }

    /// Release the current handle. Returns `false` when there was none.
    pub(crate) fn release(&self) -> bool {
        let current = self.lock().take();
        match current {
            Some(handle) => {
                handle.release();
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_occupied(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished())
    }

    fn lock(&self) -> MutexGuard<'_, Option<ChannelHandle>> {
        self.handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
