// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::{
    backoff::ErrorBackoffStrategy,
    model::{Node, RequestRecord},
    pool::{channel_pool::ChannelPoolConfig, ChannelPool, PoolSnapshot},
    stats::StatsTracker,
};

/// Aggregated view of every pool the registry currently owns, as exposed
/// to the observability surface (spec §4.2, §6).
#[derive(Debug, Clone, Copy, Default)]
pub struct IoClientSnapshot {
    pub open_channels: u32,
    pub max_channels: u32,
    pub write_queue_size: usize,
    pub requests_sent: u64,
}

/// Owns one [`ChannelPool`] per node, created lazily on first use and
/// torn down when a node drops out of the membership snapshot (spec §3
/// "I/O client" / "Channel pool registry").
pub struct ChannelPoolRegistry {
    cfg: ChannelPoolConfig,
    stats: Arc<StatsTracker>,
    backoff: Arc<dyn ErrorBackoffStrategy>,
    pools: DashMap<u64, Arc<ChannelPool>>,
}

impl ChannelPoolRegistry {
    pub fn new(cfg: ChannelPoolConfig, stats: Arc<StatsTracker>, backoff: Arc<dyn ErrorBackoffStrategy>) -> Self {
        Self {
            cfg,
            stats,
            backoff,
            pools: DashMap::new(),
        }
    }

    fn pool_for(&self, node: &Node) -> Arc<ChannelPool> {
        self.pools
            .entry(node.id)
            .or_insert_with(|| {
                ChannelPool::spawn(node.clone(), self.cfg.clone(), self.stats.clone(), self.backoff.clone())
            })
            .clone()
    }

    /// Routes `record` to its destination node's pool, creating the pool
    /// if this is the first request ever sent to that node.
    pub async fn send_request(&self, record: RequestRecord) {
        let pool = self.pool_for(&record.destination);
        pool.send_request(record).await;
    }

    /// Reconciles the registry against the current membership snapshot:
    /// pools for nodes no longer present are closed and dropped. Pools
    /// are created lazily by `send_request`, not here — a node appearing
    /// in the snapshot with no traffic yet costs nothing.
    pub async fn reconcile(&self, live_node_ids: &[u64]) {
        let stale: Vec<u64> = self
            .pools
            .iter()
            .map(|e| *e.key())
            .filter(|id| !live_node_ids.contains(id))
            .collect();

        for id in stale {
            if let Some((_, pool)) = self.pools.remove(&id) {
                pool.close().await;
                info!(node_id = id, "removed channel pool for node no longer in membership");
            }
        }
    }

    pub fn snapshot(&self, node_id: u64) -> Option<PoolSnapshot> {
        self.pools.get(&node_id).map(|p| p.snapshot())
    }

    /// Aggregates every live pool's snapshot into one observability
    /// reading (spec §4.2 "I/O client" / §6 observability surface).
    pub fn observe(&self) -> IoClientSnapshot {
        self.pools
            .iter()
            .map(|e| e.value().snapshot())
            .fold(IoClientSnapshot::default(), |acc, s| IoClientSnapshot {
                open_channels: acc.open_channels + s.open_channels,
                max_channels: acc.max_channels + s.max_channels,
                write_queue_size: acc.write_queue_size + s.write_queue_size,
                requests_sent: acc.requests_sent + s.requests_sent,
            })
    }

    pub async fn shutdown(&self) {
        let pools: Vec<Arc<ChannelPool>> = self.pools.iter().map(|e| e.value().clone()).collect();
        for pool in pools {
            pool.close().await;
        }
        self.pools.clear();
    }
}
