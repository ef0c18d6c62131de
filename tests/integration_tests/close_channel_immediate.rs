use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use cluster_rpc_client::{
    backoff::CooldownBackoff,
    model::{message::RawMessage, Message, Node, RequestRecord},
    pool::{ChannelPool, ChannelPoolConfig},
    stats::StatsTracker,
};

use crate::common::spawn_echo_peer;

/// Invariant 7 — `closeChannelTimeMillis = 0`: every write closes its
/// socket, so the idle pool size is 0 again right after the request
/// completes.
#[tokio::test]
async fn zero_close_channel_time_makes_every_socket_single_use() {
    let addr = spawn_echo_peer().await;
    let node = Node::new(1, addr);
    let cfg = ChannelPoolConfig {
        max_connections: 4,
        connect_timeout: Duration::from_millis(500),
        write_timeout: Duration::from_millis(500),
        close_channel_time_millis: 0,
        stale_request_timeout: Duration::from_secs(60),
        stale_cleanup_interval: Duration::from_secs(0),
    };
    let stats = Arc::new(StatsTracker::new(Duration::from_secs(60), Duration::from_millis(10)));
    let backoff = Arc::new(CooldownBackoff::new(Duration::from_secs(30)));
    let pool = ChannelPool::spawn(node, cfg, stats, backoff);

    let message: Arc<dyn Message> = Arc::new(RawMessage::new("Ping", Bytes::from_static(b"once")));
    let (tx, rx) = tokio::sync::oneshot::channel();
    let record = RequestRecord::new(
        message,
        pool.node().clone(),
        true,
        Some(Box::new(move |res| {
            let _ = tx.send(res);
        })),
    );
    pool.send_request(record).await;
    let body = tokio::time::timeout(Duration::from_secs(2), rx)
        .await
        .expect("completion fired")
        .expect("channel open")
        .expect("response ok");
    assert_eq!(body.as_ref(), b"once");

    // The read loop closing the now-discarded socket runs on its own
    // task; give it a moment to observe the shutdown before asserting.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(pool.snapshot().open_channels, 0, "single-use socket must not remain idle");
}
