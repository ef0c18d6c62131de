// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Load-balancer policy is an external collaborator per spec §1: the
//! core only needs a `LoadBalancer` it can query for the next node and
//! a factory that (re)builds one from a membership snapshot. This
//! module supplies the seam plus one reference round-robin
//! implementation so the crate is runnable end-to-end; production
//! deployments are expected to bring their own.

use std::sync::{atomic::{AtomicUsize, Ordering}, Arc};

use crate::model::{node::{Capability, Endpoint, PersistentCapability}, ClientError, Node};

/// A snapshot-immutable view over a set of endpoints, replaced wholesale
/// on every membership change.
pub trait LoadBalancer: Send + Sync {
    /// Selects the next node matching both capability masks, or `None`
    /// if no endpoint in the current snapshot qualifies.
    fn next_node(
        &self,
        capability: Capability,
        persistent_capability: PersistentCapability,
    ) -> Option<Node>;
}

/// Builds a [`LoadBalancer`] from a membership snapshot. Construction
/// may fail (spec §4.3: captured as `InvalidCluster` and held sticky
/// until the next snapshot).
pub trait LoadBalancerFactory: Send + Sync {
    fn create(&self, endpoints: &[Endpoint]) -> Result<Arc<dyn LoadBalancer>, ClientError>;
}

/// Round-robins over every endpoint whose capability bits satisfy the
/// query. `duplicatesOk` (spec §6) governs whether the same node may be
/// returned twice in a row when it is the only match; this
/// implementation always permits it (a one-node cluster has no other
/// choice), matching `duplicatesOk = true` semantics.
pub struct RoundRobinBalancer {
    endpoints: Vec<Endpoint>,
    cursor: AtomicUsize,
}

impl RoundRobinBalancer {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl LoadBalancer for RoundRobinBalancer {
    fn next_node(
        &self,
        capability: Capability,
        persistent_capability: PersistentCapability,
    ) -> Option<Node> {
        let matching: Vec<&Endpoint> = self
            .endpoints
            .iter()
            .filter(|e| e.satisfies(capability, persistent_capability))
            .collect();
        if matching.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % matching.len();
        Some(matching[idx].node.clone())
    }
}

/// Builds a [`RoundRobinBalancer`] from every membership snapshot.
/// Construction never fails for this reference policy (an empty
/// endpoint set is a valid, if useless, load balancer — it simply
/// returns `None` from every `next_node` call, surfaced by the network
/// client as `NoNodesAvailable` rather than `InvalidCluster`).
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundRobinBalancerFactory;

impl LoadBalancerFactory for RoundRobinBalancerFactory {
    fn create(&self, endpoints: &[Endpoint]) -> Result<Arc<dyn LoadBalancer>, ClientError> {
        Ok(Arc::new(RoundRobinBalancer::new(endpoints.to_vec())))
    }
}
