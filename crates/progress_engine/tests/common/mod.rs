#![allow(dead_code)]

use std::future::Future;
use std::sync::{Mutex, Once};
use std::time::Duration;

use progress_core::{Channel, ChannelHealth, ProgressEvent};
use progress_engine::{DriverSink, UploadProgressSink};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(monitor_logging::initialize_for_tests);
}

/// Poll `condition` every few milliseconds until it holds or two seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), future)
        .await
        .expect("timed out")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub channel: Channel,
    pub health: ChannelHealth,
    pub detail: Option<String>,
}

/// Records everything a driver reports.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
    health: Mutex<Vec<HealthReport>>,
    uploads: Mutex<Vec<(u64, u64)>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn health(&self) -> Vec<HealthReport> {
        self.health.lock().unwrap().clone()
    }

    pub fn health_states(&self) -> Vec<ChannelHealth> {
        self.health().into_iter().map(|report| report.health).collect()
    }

    pub fn uploads(&self) -> Vec<(u64, u64)> {
        self.uploads.lock().unwrap().clone()
    }
}

impl DriverSink for RecordingSink {
    fn on_event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn on_health(&self, channel: Channel, health: ChannelHealth, detail: Option<String>) {
        self.health.lock().unwrap().push(HealthReport {
            channel,
            health,
            detail,
        });
    }
}

impl UploadProgressSink for RecordingSink {
    fn on_upload_progress(&self, sent_bytes: u64, total_bytes: u64) {
        self.uploads.lock().unwrap().push((sent_bytes, total_bytes));
    }
}
