// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use tracing::debug;

use crate::{
    cfg::config::RetryStrategy,
    model::{message::Message, Capability, Completion, Node, PersistentCapability, RequestRecord},
    net::client::NetworkClient,
};

/// Wraps `user_callback` so that a retriable failure re-selects a node
/// and reissues the request before giving up, per spec §4.3.1.
///
/// Retry fires iff `retry_strategy.is_retriable(&e)`, `attempt <
/// max_retry`, and the load balancer's next selection differs (by node
/// identity) from the node that just failed. Any other outcome — a
/// non-retriable error, attempt budget exhausted, re-selection failing,
/// or re-selection landing on the same node — propagates the *original*
/// failure to `user_callback` rather than a secondary one.
pub fn wrap_with_retry(
    client: Arc<NetworkClient>,
    message: Arc<dyn Message>,
    capability: Capability,
    persistent_capability: PersistentCapability,
    max_retry: u32,
    attempt: u32,
    failing_node: Node,
    retry_strategy: Arc<dyn RetryStrategy>,
    user_callback: Completion,
) -> Completion {
    Box::new(move |result| match result {
        Ok(bytes) => user_callback(Ok(bytes)),
        Err(e) => {
            if !retry_strategy.is_retriable(&e) || attempt >= max_retry {
                user_callback(Err(e));
                return;
            }

            let Some(next_node) = client.current_node(capability, persistent_capability) else {
                user_callback(Err(e));
                return;
            };
            if next_node == failing_node {
                user_callback(Err(e));
                return;
            }

            let next_attempt = attempt + 1;
            debug!(
                from = %failing_node,
                to = %next_node,
                attempt = next_attempt,
                "retrying request on a freshly selected node"
            );

            let retried_completion = wrap_with_retry(
                client.clone(),
                message.clone(),
                capability,
                persistent_capability,
                max_retry,
                next_attempt,
                next_node.clone(),
                retry_strategy.clone(),
                user_callback,
            );
            let record =
                RequestRecord::new(message, next_node, true, Some(retried_completion)).at_attempt(next_attempt);

            let registry = client.registry();
            tokio::spawn(async move {
                registry.send_request(record).await;
            });
        },
    })
}
