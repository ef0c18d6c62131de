// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{Arc, RwLock};

use crate::{
    balance::{LoadBalancer, LoadBalancerFactory},
    cfg::config::RetryStrategy,
    model::{message::Message, Capability, ClientError, Completion, Endpoint, PersistentCapability, RequestRecord},
    net::retry::wrap_with_retry,
    pool::ChannelPoolRegistry,
};

/// Options accompanying a single `send_request`/`send_message` call
/// (spec §6 "per-call options"): the capability mask the destination
/// must satisfy and the retry budget for this call specifically.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions {
    pub capability: Capability,
    pub persistent_capability: PersistentCapability,
    pub max_retry: u32,
}

/// Tri-state load-balancer slot (spec §4.2): no membership has arrived
/// yet, the last snapshot failed to build a balancer, or a balancer is
/// ready to be queried.
enum LoadBalancerSlot {
    Absent,
    Error(ClientError),
    Ready(Arc<dyn LoadBalancer>),
}

/// Orchestrates membership → load-balancer refresh, node selection, the
/// retry trampoline, and hand-off to the channel pool registry (spec §3
/// "Network client", §4.2).
pub struct NetworkClient {
    lb_slot: RwLock<LoadBalancerSlot>,
    lb_factory: Arc<dyn LoadBalancerFactory>,
    registry: Arc<ChannelPoolRegistry>,
    retry_strategy: Arc<dyn RetryStrategy>,
}

impl NetworkClient {
    /// `retry_strategy` is the client's configured retry policy (spec §6
    /// `retryStrategy`): it caps how many attempts `SendOptions::max_retry`
    /// may request for any single call and decides which failure kinds
    /// are worth retrying at all.
    pub fn new(
        registry: Arc<ChannelPoolRegistry>,
        lb_factory: Arc<dyn LoadBalancerFactory>,
        retry_strategy: Arc<dyn RetryStrategy>,
    ) -> Arc<Self> {
        Arc::new(Self {
            lb_slot: RwLock::new(LoadBalancerSlot::Absent),
            lb_factory,
            registry,
            retry_strategy,
        })
    }

    pub fn registry(&self) -> Arc<ChannelPoolRegistry> {
        self.registry.clone()
    }

    /// Rebuilds the load balancer from a fresh membership snapshot. A
    /// construction failure is held sticky as `InvalidCluster` until the
    /// next snapshot replaces it (spec §4.2).
    pub fn update_membership(&self, endpoints: &[Endpoint]) {
        let slot = match self.lb_factory.create(endpoints) {
            Ok(lb) => LoadBalancerSlot::Ready(lb),
            Err(e) => LoadBalancerSlot::Error(e),
        };
        *self.lb_slot.write().expect("lb_slot lock poisoned") = slot;
    }

    fn current_balancer(&self) -> Result<Arc<dyn LoadBalancer>, ClientError> {
        match &*self.lb_slot.read().expect("lb_slot lock poisoned") {
            LoadBalancerSlot::Absent => Err(ClientError::ClusterDisconnected),
            LoadBalancerSlot::Error(e) => Err(e.clone()),
            LoadBalancerSlot::Ready(lb) => Ok(lb.clone()),
        }
    }

    /// Queries the *current* load balancer for a node, used by the
    /// retry trampoline to re-select against the latest membership
    /// rather than whatever was current at the original attempt.
    pub(crate) fn current_node(&self, capability: Capability, persistent_capability: PersistentCapability) -> Option<crate::model::Node> {
        self.current_balancer().ok()?.next_node(capability, persistent_capability)
    }

    /// Sends `message` and invokes `callback` exactly once with the
    /// terminal outcome. Returns as soon as node selection has run and
    /// the request has been handed to the channel pool's send path —
    /// never after the connect or write completes — and `callback` may
    /// fire well after this call returns. `message = None` surfaces as
    /// `NullArgument` (spec §4.2 step 2).
    pub async fn send_request(
        self: &Arc<Self>,
        message: Option<Arc<dyn Message>>,
        opts: SendOptions,
        callback: Completion,
    ) {
        let lb = match self.current_balancer() {
            Ok(lb) => lb,
            Err(e) => {
                callback(Err(e));
                return;
            },
        };
        let Some(message) = message else {
            callback(Err(ClientError::NullArgument));
            return;
        };
        let Some(node) = lb.next_node(opts.capability, opts.persistent_capability) else {
            callback(Err(ClientError::NoNodesAvailable));
            return;
        };

        // The configured strategy's budget is a ceiling, not a floor: a
        // caller may ask for fewer attempts than the default policy
        // allows, never more.
        let max_retry = opts.max_retry.min(self.retry_strategy.max_retry());
        let completion = if max_retry > 0 {
            wrap_with_retry(
                self.clone(),
                message.clone(),
                opts.capability,
                opts.persistent_capability,
                max_retry,
                0,
                node.clone(),
                self.retry_strategy.clone(),
                callback,
            )
        } else {
            callback
        };

        let record = RequestRecord::new(message, node, true, Some(completion));
        self.registry.send_request(record).await;
    }

    /// Fire-and-forget send: identical selection path, but the record
    /// carries no completion and expects no response. Never retried —
    /// there is no completion for a trampoline to observe a failure on.
    pub async fn send_message(self: &Arc<Self>, message: Option<Arc<dyn Message>>, opts: SendOptions) -> Result<(), ClientError> {
        let lb = self.current_balancer()?;
        let message = message.ok_or(ClientError::NullArgument)?;
        let node = lb
            .next_node(opts.capability, opts.persistent_capability)
            .ok_or(ClientError::NoNodesAvailable)?;

        let record = RequestRecord::new(message, node, false, None);
        self.registry.send_request(record).await;
        Ok(())
    }

    /// Closes every channel pool and marks the client disconnected.
    /// Blocks until every socket has been uninterruptibly closed.
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
        *self.lb_slot.write().expect("lb_slot lock poisoned") = LoadBalancerSlot::Absent;
    }
}
