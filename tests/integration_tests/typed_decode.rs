use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use cluster_rpc_client::{
    balance::RoundRobinBalancerFactory,
    model::{message::RawMessage, Capability, ClientError, Endpoint, Message, Node, PersistentCapability},
    net::{client::NetworkClient, decoded_completion, SendOptions},
};

use crate::common::{fresh_registry, fresh_retry_strategy, small_pool_cfg, spawn_echo_peer};

/// A caller that wants a typed response wraps its own completion with
/// `decoded_completion` rather than matching on `Bytes` directly.
#[tokio::test]
async fn successful_round_trip_decodes_into_the_caller_type() {
    let addr = spawn_echo_peer().await;
    let node = Node::new(1, addr);

    let registry = fresh_registry(small_pool_cfg(1));
    let client = NetworkClient::new(registry, Arc::new(RoundRobinBalancerFactory), fresh_retry_strategy());
    client.update_membership(&[Endpoint::new(node, Capability::READ, PersistentCapability::empty())]);

    let message: Arc<dyn Message> = Arc::new(RawMessage::new("Ping", Bytes::from_static(b"42")));
    let (tx, rx) = tokio::sync::oneshot::channel();
    let completion = decoded_completion(
        |bytes| std::str::from_utf8(&bytes).map_err(|e| e.to_string())?.parse::<u32>().map_err(|e| e.to_string()),
        move |res: Result<u32, ClientError>| {
            let _ = tx.send(res);
        },
    );

    client
        .send_request(
            Some(message),
            SendOptions {
                capability: Capability::READ,
                persistent_capability: PersistentCapability::empty(),
                max_retry: 0,
            },
            completion,
        )
        .await;

    let result = tokio::time::timeout(Duration::from_secs(2), rx)
        .await
        .expect("completion fired")
        .expect("completion channel open");
    assert_eq!(result.expect("decodes to a u32"), 42);
}

/// The echo peer hands back whatever bytes it was sent, so sending a
/// payload the decode closure rejects exercises the deserialization
/// failure path end to end, through the real send/receive round trip.
#[tokio::test]
async fn malformed_response_surfaces_as_deserialization_error() {
    let addr = spawn_echo_peer().await;
    let node = Node::new(1, addr);

    let registry = fresh_registry(small_pool_cfg(1));
    let client = NetworkClient::new(registry, Arc::new(RoundRobinBalancerFactory), fresh_retry_strategy());
    client.update_membership(&[Endpoint::new(node, Capability::READ, PersistentCapability::empty())]);

    let message: Arc<dyn Message> = Arc::new(RawMessage::new("Ping", Bytes::from_static(b"not-a-number")));
    let (tx, rx) = tokio::sync::oneshot::channel();
    let completion = decoded_completion(
        |bytes| std::str::from_utf8(&bytes).map_err(|e| e.to_string())?.parse::<u32>().map_err(|e| e.to_string()),
        move |res: Result<u32, ClientError>| {
            let _ = tx.send(res);
        },
    );

    client
        .send_request(
            Some(message),
            SendOptions {
                capability: Capability::READ,
                persistent_capability: PersistentCapability::empty(),
                max_retry: 0,
            },
            completion,
        )
        .await;

    let result = tokio::time::timeout(Duration::from_secs(2), rx)
        .await
        .expect("completion fired")
        .expect("completion channel open");
    assert!(matches!(result, Err(ClientError::DeserializationError(_))));
}
