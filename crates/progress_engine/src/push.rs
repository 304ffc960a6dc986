use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use monitor_logging::{monitor_debug, monitor_info, monitor_warn};
use progress_core::{Channel, ChannelHealth, JobId};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::driver::{ChannelHandle, HandleSlot};
use crate::types::parse_status_payload;
use crate::{ChannelDriver, DriverSink, Endpoints};

/// Listens for status messages the backend pushes over a websocket.
///
/// A listener never reconnects on its own. When the connection drops it
/// reports `Degraded` and exits; the session decides whether to restart it.
pub struct PushListener {
    endpoints: Endpoints,
    connect_timeout: Duration,
    slot: HandleSlot,
}

impl PushListener {
    pub fn new(endpoints: Endpoints, connect_timeout: Duration) -> Self {
        Self {
            endpoints,
            connect_timeout,
            slot: HandleSlot::default(),
        }
    }
}

impl ChannelDriver for PushListener {
    fn channel(&self) -> Channel {
        Channel::Push
    }

    fn start(&self, job_id: JobId, sink: Arc<dyn DriverSink>) {
        let url = self.endpoints.push_url(&job_id);
        monitor_info!("Push listener starting job_id={} url={}", job_id, url);
        let token = CancellationToken::new();
        let task = tokio::spawn(listen(url, self.connect_timeout, sink, token.clone()));
        self.slot.install(ChannelHandle::new(token, task));
    }

    fn stop(&self) {
        if self.slot.release() {
            monitor_info!("Push listener stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.slot.is_occupied()
    }
}

async fn listen(
    url: Url,
    connect_timeout: Duration,
    sink: Arc<dyn DriverSink>,
    token: CancellationToken,
) {
    sink.on_health(Channel::Push, ChannelHealth::Connecting, None);

    let connecting = tokio::time::timeout(connect_timeout, connect_async(url.as_str()));
    let connected = tokio::select! {
        _ = token.cancelled() => return,
        connected = connecting => connected,
    };
    let mut ws = match connected {
        Ok(Ok((ws, _response))) => ws,
        Ok(Err(err)) => {
            degrade(&sink, &token, format!("push connect failed: {err}"));
            return;
        }
        Err(_) => {
            degrade(
                &sink,
                &token,
                format!("push connect timed out after {}s", connect_timeout.as_secs()),
            );
            return;
        }
    };
    if token.is_cancelled() {
        let _ = ws.close(None).await;
        return;
    }
    monitor_debug!("Push connected url={}", url);
    sink.on_health(Channel::Push, ChannelHealth::Healthy, None);

    let reason = loop {
        let frame = tokio::select! {
            _ = token.cancelled() => {
                let _ = ws.close(None).await;
                return;
            }
            frame = ws.next() => frame,
        };

        let text = match frame {
            Some(Ok(Message::Text(text))) => text.as_str().to_string(),
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    monitor_warn!("Ignoring non-UTF-8 push frame ({} bytes)", bytes.len());
                    continue;
                }
            },
            Some(Ok(Message::Close(frame))) => {
                break match frame {
                    Some(frame) => format!("push closed by server: {} {}", frame.code, frame.reason),
                    None => "push closed by server".to_string(),
                };
            }
            Some(Ok(_)) => continue,
            Some(Err(err)) => break format!("push connection error: {err}"),
            None => break "push connection ended".to_string(),
        };

        match parse_status_payload(&text) {
            Ok(snapshot) => {
                if token.is_cancelled() {
                    return;
                }
                sink.on_event(snapshot.into_event(Channel::Push, Utc::now()));
            }
            // One bad frame does not make the connection unhealthy.
            Err(err) => monitor_warn!("Ignoring malformed push payload: {}", err),
        }
    };

    degrade(&sink, &token, reason);
}

fn degrade(sink: &Arc<dyn DriverSink>, token: &CancellationToken, reason: String) {
    if token.is_cancelled() {
        return;
    }
    monitor_warn!("{}", reason);
    sink.on_health(Channel::Push, ChannelHealth::Degraded, Some(reason));
}
