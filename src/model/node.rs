// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    fmt,
    hash::{Hash, Hasher},
    net::SocketAddr,
};

use bitflags::bitflags;

bitflags! {
    /// Transient capability bits consulted by a load balancer's `nextNode`
    /// query. "Transient" in the sense that it can change between
    /// membership snapshots without the node's identity changing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Capability: u64 {
        const READ = 0b0000_0001;
        const WRITE = 0b0000_0010;
        const ADMIN = 0b0000_0100;
    }
}

bitflags! {
    /// Capability bits that persist across restarts of the node (e.g.
    /// advertised once at provisioning time rather than derived from
    /// current load).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PersistentCapability: u64 {
        const PARTITIONED = 0b0000_0001;
        const DARK_CANARY = 0b0000_0010;
    }
}

/// An addressable peer in the cluster.
///
/// Identity equality is by `id` alone: two `Node`s with the same `id` and
/// different addresses are considered the same node by every map keyed on
/// `Node` in this crate (the statistics tracker, the channel pool
/// registry). A node whose address changed requires an explicit
/// remove-then-add by the membership layer, per spec.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: u64,
    pub addr: SocketAddr,
}

impl Node {
    pub fn new(id: u64, addr: SocketAddr) -> Self {
        Self { id, addr }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}({})", self.id, self.addr)
    }
}

/// A [`Node`] plus the capability bitmasks a load balancer consults.
/// Immutable for the lifetime of a membership snapshot: a capability
/// change is published as a brand-new `Endpoint` in the next snapshot,
/// never mutated in place.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub node: Node,
    pub capability: Capability,
    pub persistent_capability: PersistentCapability,
}

impl Endpoint {
    pub fn new(
        node: Node,
        capability: Capability,
        persistent_capability: PersistentCapability,
    ) -> Self {
        Self {
            node,
            capability,
            persistent_capability,
        }
    }

    /// Whether this endpoint satisfies the capability mask a caller is
    /// querying for. An empty mask matches everything.
    pub fn satisfies(
        &self,
        capability: Capability,
        persistent_capability: PersistentCapability,
    ) -> bool {
        self.capability.contains(capability)
            && self.persistent_capability.contains(persistent_capability)
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}
impl Eq for Endpoint {}

impl Hash for Endpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.hash(state);
    }
}
