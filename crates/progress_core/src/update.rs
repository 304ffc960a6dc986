use crate::{
    Channel, ChannelHealth, Effect, MonitorState, Msg, Phase, ProgressEvent, Timestamp,
    UploadProgress,
};

/// Pure update function: folds one message into the state and returns the
/// effects the session controller has to run.
pub fn update(mut state: MonitorState, msg: Msg) -> (MonitorState, Vec<Effect>) {
    let effects = match msg {
        Msg::SubmitRequested { at } => {
            if state.phase().is_active() {
                return (state, Vec::new());
            }
            state.begin_submission(at);
            Vec::new()
        }
        Msg::UploadProgressed {
            sent_bytes,
            total_bytes,
            at,
        } => {
            if is_submitting(state.phase()) {
                state.record_upload(
                    UploadProgress {
                        sent_bytes,
                        total_bytes,
                    },
                    at,
                );
            }
            Vec::new()
        }
        Msg::Submitted { job_id, at } => {
            if !is_submitting(state.phase()) {
                return (state, Vec::new());
            }
            state.begin_monitoring(job_id.clone(), at);
            vec![Effect::StartDrivers { job_id }, Effect::ArmDeadline]
        }
        Msg::SubmitFailed { message, at } => {
            // No drivers exist yet, so there is nothing to stop.
            if is_submitting(state.phase()) {
                state.terminate(Phase::Failed, Some(message), at);
            }
            Vec::new()
        }
        Msg::Progress(event) => reconcile(&mut state, event),
        Msg::ChannelHealthChanged {
            channel,
            health,
            detail,
            at,
        } => apply_health(&mut state, channel, health, detail, at),
        Msg::ReconnectDue { channel, .. } => {
            let still_needed = state.phase() == Phase::Processing
                && state.channel(channel).health == ChannelHealth::Degraded;
            match state.job().job_id.clone() {
                Some(job_id) if still_needed => {
                    state.restart_sequence(channel);
                    vec![Effect::RestartDriver { channel, job_id }]
                }
                _ => Vec::new(),
            }
        }
        Msg::CancelRequested { at } => {
            if state.phase() != Phase::Processing {
                return (state, Vec::new());
            }
            state.terminate(Phase::Cancelled, None, at);
            vec![Effect::StopDrivers]
        }
        Msg::DeadlineElapsed { limit, at } => {
            if state.phase() != Phase::Processing {
                return (state, Vec::new());
            }
            let message = format!(
                "No completion reported within {} seconds",
                limit.as_secs()
            );
            state.terminate(Phase::Failed, Some(message), at);
            vec![Effect::StopDrivers]
        }
        Msg::Reset => {
            state.reset();
            vec![Effect::StopDrivers]
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn is_submitting(phase: Phase) -> bool {
    matches!(phase, Phase::Submitting | Phase::Uploading)
}

fn reconcile(state: &mut MonitorState, event: ProgressEvent) -> Vec<Effect> {
    // Terminal phases absorb everything; before a job id there is nothing to track.
    if state.phase() != Phase::Processing {
        return Vec::new();
    }

    let channel = event.source;
    if let (Some(sequence), Some(last)) =
        (event.sequence_hint, state.channel(channel).last_sequence)
    {
        if sequence <= last {
            return Vec::new();
        }
    }
    state.note_alive(channel, event.sequence_hint);

    if event.reported_failure {
        state.terminate(Phase::Failed, Some(event.message), event.received_at);
        return vec![Effect::StopDrivers];
    }

    let job = state.job();
    if event.progress_percent < job.progress_percent {
        return Vec::new();
    }
    if event.progress_percent == job.progress_percent && event.message == job.message {
        return Vec::new();
    }

    state.accept(&event);
    if state.phase() == Phase::Completed {
        return vec![Effect::StopDrivers];
    }
    Vec::new()
}

fn apply_health(
    state: &mut MonitorState,
    channel: Channel,
    health: ChannelHealth,
    detail: Option<String>,
    at: Timestamp,
) -> Vec<Effect> {
    if state.phase() != Phase::Processing {
        return Vec::new();
    }
    if health != ChannelHealth::Degraded {
        state.set_health(channel, health);
        return Vec::new();
    }

    let newly_degraded = state.mark_degraded(channel, detail.clone());

    if let Some(limit) = state.settings().max_consecutive_failures {
        if state.all_degraded() && state.total_consecutive_failures() >= limit {
            let reason = detail.unwrap_or_else(|| format!("{channel} channel unavailable"));
            state.terminate(
                Phase::Failed,
                Some(format!("Lost contact with the job: {reason}")),
                at,
            );
            return vec![Effect::StopDrivers];
        }
    }

    if channel == Channel::Push && newly_degraded {
        return schedule_reconnect(state, channel);
    }
    Vec::new()
}

fn schedule_reconnect(state: &mut MonitorState, channel: Channel) -> Vec<Effect> {
    let policy = state.settings().push_reconnect.clone();
    if state.reconnect_attempts() >= policy.max_attempts {
        return Vec::new();
    }
    let attempt = state.next_reconnect_attempt();
    vec![Effect::ScheduleReconnect {
        channel,
        attempt,
        delay: policy.delay_for(attempt),
    }]
}
