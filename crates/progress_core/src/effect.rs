use std::time::Duration;

use crate::{Channel, JobId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartDrivers { job_id: JobId },
    StopDrivers,
    /// Start the monitoring ceiling timer for the current job.
    ArmDeadline,
    ScheduleReconnect {
        channel: Channel,
        attempt: u32,
        delay: Duration,
    },
    RestartDriver { channel: Channel, job_id: JobId },
}
