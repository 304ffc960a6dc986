use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use monitor_logging::monitor_info;
use progress_core::JobView;
use tokio::sync::watch;

/// Receives a snapshot after every visible state change.
///
/// Called after the session has released its state lock. Calls for one
/// session never overlap and arrive in the order the changes happened, so an
/// observer may read from or cancel the session it watches. Views produced by
/// such a call are delivered once the current call returns.
pub trait JobObserver: Send + Sync {
    fn on_update(&self, view: &JobView);
}

impl<F> JobObserver for F
where
    F: Fn(&JobView) + Send + Sync,
{
    fn on_update(&self, view: &JobView) {
        self(view)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub(crate) struct ObserverRegistry {
    next_id: AtomicU64,
    observers: Mutex<Vec<(ObserverId, Arc<dyn JobObserver>)>>,
    latest: watch::Sender<JobView>,
    pending: Mutex<Pending>,
}

#[derive(Default)]
struct Pending {
    views: VecDeque<JobView>,
    /// Set while one caller is delivering; others leave their views to it.
    draining: bool,
}

impl ObserverRegistry {
    pub(crate) fn new(initial: JobView) -> Self {
        let (latest, _) = watch::channel(initial);
        Self {
            next_id: AtomicU64::new(1),
            observers: Mutex::new(Vec::new()),
            latest,
            pending: Mutex::new(Pending::default()),
        }
    }

    pub(crate) fn add(&self, observer: Arc<dyn JobObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, observer));
        id
    }

    pub(crate) fn remove(&self, id: ObserverId) -> bool {
        let mut observers = self.lock();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<JobView> {
        self.latest.subscribe()
    }

    /// Queue a view for delivery. Called with the session state locked so
    /// the queue order is the order of the changes.
    pub(crate) fn enqueue(&self, view: JobView) {
        self.lock_pending().views.push_back(view);
    }

    /// Deliver queued views. Must be called without the session state lock.
    /// Returns at once when another caller is already delivering.
    pub(crate) fn flush(&self) {
        {
            let mut pending = self.lock_pending();
            if pending.draining || pending.views.is_empty() {
                return;
            }
            pending.draining = true;
        }
        let _draining = Draining(self);
        loop {
            let view = {
                let mut pending = self.lock_pending();
                match pending.views.pop_front() {
                    Some(view) => view,
                    None => {
                        // Cleared under the same lock that saw the queue empty.
                        pending.draining = false;
                        return;
                    }
                }
            };
            self.publish(view);
        }
    }

    fn publish(&self, view: JobView) {
        self.latest.send_replace(view.clone());
        let observers: Vec<Arc<dyn JobObserver>> = self
            .lock()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in observers {
            observer.on_update(&view);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ObserverId, Arc<dyn JobObserver>)>> {
        self.observers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_pending(&self) -> MutexGuard<'_, Pending> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Releases the draining flag when an observer panics mid-delivery.
struct Draining<'a>(&'a ObserverRegistry);

impl Drop for Draining<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock_pending().draining = false;
        }
    }
}

/// Writes every update to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl JobObserver for LoggingObserver {
    fn on_update(&self, view: &JobView) {
        let job = &view.state;
        monitor_info!(
            "Job {} phase={:?} progress={}% active={:?} poll={:?} push={:?} message={:?}",
            job.job_id.as_ref().map(|id| id.as_str()).unwrap_or("-"),
            job.phase,
            view.display_percent(),
            job.active_channel,
            view.poll_health,
            view.push_health,
            job.message
        );
    }
}
