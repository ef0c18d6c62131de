use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use cluster_rpc_client::{
    backoff::CooldownBackoff,
    model::{message::RawMessage, Message, Node, RequestRecord},
    pool::ChannelPool,
    stats::StatsTracker,
};

use crate::common::{small_pool_cfg, spawn_echo_peer};

/// S2 — `maxConnectionsPerNode = 1`, two requests submitted back to back
/// before the connect completes: both must be queued and both must be
/// drained onto the single socket once it opens.
#[tokio::test]
async fn two_concurrent_requests_share_one_connect() {
    let addr = spawn_echo_peer().await;
    let node = Node::new(1, addr);

    let stats = Arc::new(StatsTracker::new(Duration::from_secs(60), Duration::from_millis(10)));
    let backoff = Arc::new(CooldownBackoff::new(Duration::from_secs(30)));
    let pool = ChannelPool::spawn(node, small_pool_cfg(1), stats, backoff);

    let fire = |pool: Arc<ChannelPool>, payload: &'static [u8]| {
        let message: Arc<dyn Message> = Arc::new(RawMessage::new("Ping", Bytes::from_static(payload)));
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

    let rx1 = fire(pool.clone(), b"first");
    let rx2 = fire(pool.clone(), b"second");

    let r1 = tokio::time::timeout(Duration::from_secs(2), rx1)
        .await
        .expect("r1 completion fired")
        .expect("r1 channel open");
    let r2 = tokio::time::timeout(Duration::from_secs(2), rx2)
        .await
        .expect("r2 completion fired")
        .expect("r2 channel open");

    assert_eq!(r1.expect("r1 ok").as_ref(), b"first");
    assert_eq!(r2.expect("r2 ok").as_ref(), b"second");

    let snapshot = pool.snapshot();
    assert_eq!(snapshot.open_channels, 1, "only one socket should ever have opened");
    assert_eq!(snapshot.requests_sent, 2);
}
