use std::sync::Arc;

use bytes::Bytes;
use cluster_rpc_client::{
    backoff::CooldownBackoff,
    model::{message::RawMessage, Message, Node, RequestRecord},
    pool::ChannelPool,
    stats::StatsTracker,
};

use crate::common::{small_pool_cfg, spawn_echo_peer};

/// S1 — one healthy node, `maxConnectionsPerNode = 1`: a single request
/// opens exactly one socket, is written on it, and the echoed response
/// reaches the caller.
#[tokio::test]
async fn single_request_opens_one_socket_and_completes() {
    let addr = spawn_echo_peer().await;
    let node = Node::new(1, addr);

    let stats = Arc::new(StatsTracker::new(std::time::Duration::from_secs(60), std::time::Duration::from_millis(10)));
    let backoff = Arc::new(CooldownBackoff::new(std::time::Duration::from_secs(30)));
    let pool = ChannelPool::spawn(node, small_pool_cfg(1), stats, backoff);

    let message: Arc<dyn Message> = Arc::new(RawMessage::new("Ping", Bytes::from_static(b"payload")));
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

    let body = tokio::time::timeout(std::time::Duration::from_secs(2), rx)
        .await
        .expect("completion fired")
        .expect("completion channel open")
        .expect("response ok");
    assert_eq!(body.as_ref(), b"payload");

    let snapshot = pool.snapshot();
    assert_eq!(snapshot.open_channels, 1);
    assert_eq!(snapshot.requests_sent, 1);
}
