mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use progress_core::{Channel, ChannelHealth, JobId};
use progress_engine::{ChannelDriver, MonitorConfig, PushListener};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use common::{init_logging, wait_until, within, RecordingSink};

fn listener_for(addr: SocketAddr) -> PushListener {
    let config = MonitorConfig {
        api_base_url: format!("http://{addr}/"),
        ..MonitorConfig::default()
    };
    PushListener::new(config.endpoints().unwrap(), Duration::from_secs(2))
}

/// Accepts one websocket client, sends `frames`, then either closes or waits
/// for the client to go away.
async fn serve_once(frames: Vec<Message>, close_after: bool) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        for frame in frames {
            ws.send(frame).await.unwrap();
        }
        if close_after {
            let _ = ws.close(None).await;
        } else {
            while let Some(Ok(_)) = ws.next().await {}
        }
    });
    (addr, server)
}

#[tokio::test]
async fn push_frames_become_events_until_the_server_closes() {
    init_logging();
    let frames = vec![
        Message::Text(r#"{"progress": 10, "message": "Extracting frames", "seq": 1}"#.into()),
        Message::Text("not json".into()),
        Message::Binary(br#"{"progress": 20.4, "message": "Tracking"}"#.to_vec().into()),
    ];
    let (addr, server) = serve_once(frames, true).await;

    let listener = listener_for(addr);
    let sink = Arc::new(RecordingSink::default());
    listener.start(JobId::new("job-1"), sink.clone());

    assert!(
        wait_until(|| sink.health_states().last() == Some(&ChannelHealth::Degraded)).await
    );
    within(server).await.unwrap();

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|event| event.source == Channel::Push));
    assert_eq!(events[0].progress_percent, 10);
    assert_eq!(events[0].sequence_hint, Some(1));
    assert_eq!(events[1].progress_percent, 20);
    assert_eq!(events[1].message, "Tracking");

    assert_eq!(
        sink.health_states(),
        vec![
            ChannelHealth::Connecting,
            ChannelHealth::Healthy,
            ChannelHealth::Degraded
        ]
    );
    let reports = sink.health();
    assert!(reports.iter().all(|report| report.channel == Channel::Push));
    assert!(reports[2]
        .detail
        .as_deref()
        .is_some_and(|detail| detail.contains("closed")));

    assert!(wait_until(|| !listener.is_running()).await);
    listener.stop();
}

#[tokio::test]
async fn refused_connection_degrades_without_events() {
    init_logging();
    let addr = {
        let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
        probe.local_addr().unwrap()
    };

    let listener = listener_for(addr);
    let sink = Arc::new(RecordingSink::default());
    listener.start(JobId::new("job-2"), sink.clone());

    assert!(
        wait_until(|| sink.health_states().last() == Some(&ChannelHealth::Degraded)).await
    );
    assert_eq!(
        sink.health_states(),
        vec![ChannelHealth::Connecting, ChannelHealth::Degraded]
    );
    assert!(sink.events().is_empty());
    listener.stop();
}

#[tokio::test]
async fn stop_closes_the_socket_quietly() {
    init_logging();
    let frames = vec![Message::Text(r#"{"progress": 5, "message": "Queued"}"#.into())];
    let (addr, server) = serve_once(frames, false).await;

    let listener = listener_for(addr);
    let sink = Arc::new(RecordingSink::default());
    listener.start(JobId::new("job-3"), sink.clone());
    assert!(wait_until(|| sink.events().len() == 1).await);

    listener.stop();
    within(server).await.unwrap();
    assert!(wait_until(|| !listener.is_running()).await);

    assert_eq!(
        sink.health_states(),
        vec![ChannelHealth::Connecting, ChannelHealth::Healthy]
    );
}
