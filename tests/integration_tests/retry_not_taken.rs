use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use cluster_rpc_client::{
    balance::RoundRobinBalancerFactory,
    model::{message::RawMessage, Capability, ClientError, Endpoint, Message, Node, PersistentCapability},
    net::{client::NetworkClient, SendOptions},
};

use crate::common::{fresh_registry, fresh_retry_strategy, small_pool_cfg, unroutable_addr};

/// S4 — single-node cluster: every re-selection lands back on the same
/// node, so no retry is ever taken even with budget to spare. The
/// original failure propagates unchanged, and it does so after roughly
/// one connect attempt's worth of time, not `maxRetry + 1` of them.
#[tokio::test]
async fn single_node_cluster_never_retries() {
    let node = Node::new(1, unroutable_addr());
    let registry = fresh_registry(small_pool_cfg(1));
    let client = NetworkClient::new(registry, Arc::new(RoundRobinBalancerFactory), fresh_retry_strategy());
    client.update_membership(&[Endpoint::new(node, Capability::READ, PersistentCapability::empty())]);

    let message: Arc<dyn Message> = Arc::new(RawMessage::new("Ping", Bytes::from_static(b"x")));
    let (tx, rx) = tokio::sync::oneshot::channel();

    let started = tokio::time::Instant::now();
    client
        .send_request(
            Some(message),
            SendOptions {
                capability: Capability::READ,
                persistent_capability: PersistentCapability::empty(),
                max_retry: 3,
            },
            Box::new(move |res| {
                let _ = tx.send(res);
            }),
        )
        .await;

    // A single connect attempt at connect_timeout = 500ms; three retries
    // against the same unreachable node would take >= 2s.
    let result = tokio::time::timeout(Duration::from_millis(900), rx)
        .await
        .expect("completion fires well before a 2nd connect attempt would")
        .expect("completion channel open");
    assert!(started.elapsed() < Duration::from_millis(900));
    assert!(matches!(
        result,
        Err(ClientError::ConnectTimeout(_)) | Err(ClientError::ConnectError(_, _))
    ));
}
