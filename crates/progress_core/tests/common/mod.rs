#![allow(dead_code)]

use std::sync::Once;

use chrono::DateTime;
use progress_core::{
    update, Channel, JobId, MonitorState, Msg, ProgressEvent, ReconcileSettings, Timestamp,
};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(monitor_logging::initialize_for_tests);
}

/// Milliseconds after an arbitrary fixed origin.
pub fn at(millis: i64) -> Timestamp {
    DateTime::from_timestamp_millis(1_700_000_000_000 + millis).unwrap()
}

pub fn poll(percent: u8, message: &str, millis: i64) -> Msg {
    Msg::Progress(ProgressEvent::new(Channel::Poll, percent, message, at(millis)))
}

pub fn push(percent: u8, message: &str, millis: i64) -> Msg {
    Msg::Progress(ProgressEvent::new(Channel::Push, percent, message, at(millis)))
}

/// A state that has gone through submission and is monitoring `job_id`.
pub fn monitoring_with(settings: ReconcileSettings, job_id: &str) -> MonitorState {
    let state = MonitorState::new(settings);
    let (state, _) = update(state, Msg::SubmitRequested { at: at(0) });
    let (mut state, _) = update(
        state,
        Msg::Submitted {
            job_id: JobId::new(job_id),
            at: at(100),
        },
    );
    state.consume_dirty();
    state
}

pub fn monitoring(job_id: &str) -> MonitorState {
    monitoring_with(ReconcileSettings::default(), job_id)
}
