use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use cluster_rpc_client::{
    backoff::CooldownBackoff,
    model::{message::RawMessage, ClientError, Message, Node, RequestRecord},
    pool::{ChannelPool, ChannelPoolConfig},
    stats::StatsTracker,
};

/// S5 — requests that never get a socket (here, because the pool is
/// configured with zero connect capacity, so `openChannel` perpetually
/// defers rather than ever dialing out) are failed by the sweeper once
/// they have waited past `staleRequestTimeoutMins`, and leave no trace in
/// the write queue afterwards.
#[tokio::test]
async fn waiters_with_no_socket_are_swept_as_stale() {
    let node = Node::new(1, "127.0.0.1:1".parse().expect("valid addr"));
    let cfg = ChannelPoolConfig {
        max_connections: 0,
        connect_timeout: Duration::from_secs(5),
        write_timeout: Duration::from_secs(5),
        close_channel_time_millis: -1,
        stale_request_timeout: Duration::from_millis(50),
        stale_cleanup_interval: Duration::from_millis(10),
    };
    let stats = Arc::new(StatsTracker::new(Duration::from_secs(60), Duration::from_millis(10)));
    let backoff = Arc::new(CooldownBackoff::new(Duration::from_secs(30)));
    let pool = ChannelPool::spawn(node, cfg, stats, backoff);

    let fire = |pool: Arc<ChannelPool>| {
        let message: Arc<dyn Message> = Arc::new(RawMessage::new("Ping", Bytes::from_static(b"x")));
        let (tx, rx) = tokio::sync::oneshot::channel();
        let record = RequestRecord::new(
            message,
            pool.node().clone(),
            true,
            Some(Box::new(move |res| {
                let _ = tx.send(res);
            })),
        );
        tokio::spawn(async move { pool.send_request(record).await });
        rx
    };

    let rx1 = fire(pool.clone());
    let rx2 = fire(pool.clone());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(pool.snapshot().write_queue_size, 2, "both requests should be queued with no socket available");

    let r1 = tokio::time::timeout(Duration::from_millis(500), rx1)
        .await
        .expect("r1 swept within budget")
        .expect("r1 channel open");
    let r2 = tokio::time::timeout(Duration::from_millis(500), rx2)
        .await
        .expect("r2 swept within budget")
        .expect("r2 channel open");

    assert!(matches!(r1, Err(ClientError::StaleRequest)));
    assert!(matches!(r2, Err(ClientError::StaleRequest)));
    assert_eq!(pool.snapshot().write_queue_size, 0);
}
