// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use uuid::Uuid;

use crate::stats::{cache::CacheMaintainer, rolling::NodeTracker};

/// Derives a single health score from a node's pending load and recent
/// latency. Spec §4.4 only requires that "the calculator accepts both
/// summaries and produces a numeric score" — the formula itself is an
/// external policy concern, so this trait is the seam and
/// [`OutlierHealthScore`] is a reference implementation, not a mandated
/// one. Lower is healthier.
pub trait HealthScoreCalculator: Send + Sync {
    fn score(&self, pending: usize, median_latency_millis: u64) -> f64;
}

/// Penalizes latency beyond a constant floor by a configurable
/// multiplier, parameterized by `outlierMultiplier`/`outlierConstant`
/// (spec §6).
#[derive(Debug, Clone, Copy)]
pub struct OutlierHealthScore {
    pub outlier_multiplier: f64,
    pub outlier_constant: f64,
}

impl HealthScoreCalculator for OutlierHealthScore {
    fn score(&self, pending: usize, median_latency_millis: u64) -> f64 {
        pending as f64
            + self.outlier_multiplier * median_latency_millis as f64
            + self.outlier_constant
    }
}

/// A point-in-time view of one node's statistics, as exposed to the
/// observability surface in spec §6.
#[derive(Debug, Clone, Copy)]
pub struct NodeStatsSnapshot {
    pub pending: usize,
    pub rps: u64,
    pub p50: u64,
    pub p75: u64,
    pub p90: u64,
    pub p95: u64,
    pub p99: u64,
}

/// Rolling latency / pending-request statistics across every node seen
/// so far, with a bounded-concurrency cached read layer on top of the
/// raw per-node trackers (spec §4.4).
pub struct StatsTracker {
    window: Duration,
    cache_ttl: Duration,
    nodes: DashMap<u64, Arc<NodeTracker>>,
    sorted_latency_caches: DashMap<u64, Arc<CacheMaintainer<Arc<Vec<u64>>>>>,
    rps_caches: DashMap<u64, Arc<CacheMaintainer<u64>>>,
    pending_caches: DashMap<u64, Arc<CacheMaintainer<usize>>>,
}

impl StatsTracker {
    pub fn new(window: Duration, cache_ttl: Duration) -> Self {
        Self {
            window,
            cache_ttl,
            nodes: DashMap::new(),
            sorted_latency_caches: DashMap::new(),
            rps_caches: DashMap::new(),
            pending_caches: DashMap::new(),
        }
    }

    fn node_tracker(&self, node_id: u64) -> Arc<NodeTracker> {
        self.nodes
            .entry(node_id)
            .or_insert_with(|| Arc::new(NodeTracker::new(self.window)))
            .clone()
    }

    pub fn begin_request(&self, node_id: u64, correlation_id: Uuid) {
        self.node_tracker(node_id).begin_request(correlation_id);
    }

    pub fn end_request(&self, node_id: u64, correlation_id: Uuid) -> Option<Duration> {
        self.node_tracker(node_id).end_request(correlation_id)
    }

    pub fn expire_pending(&self, node_id: u64, correlation_id: Uuid) {
        self.node_tracker(node_id).expire_pending(correlation_id);
    }

    pub fn pending_count(&self, node_id: u64) -> usize {
        let tracker = self.node_tracker(node_id);
        let cache = self
            .pending_caches
            .entry(node_id)
            .or_insert_with(|| Arc::new(CacheMaintainer::new(self.cache_ttl, 0)))
            .clone();
        cache.get_or_refresh(|| tracker.pending_count())
    }

    pub fn requests_per_second(&self, node_id: u64) -> u64 {
        let tracker = self.node_tracker(node_id);
        let cache = self
            .rps_caches
            .entry(node_id)
            .or_insert_with(|| Arc::new(CacheMaintainer::new(self.cache_ttl, 0)))
            .clone();
        cache.get_or_refresh(|| tracker.requests_last_second())
    }

    /// Every percentile for a node reads from the same sorted snapshot:
    /// a cache miss sorts the finished-latency window once, and p50
    /// through p99 all index into that one `Arc<Vec<u64>>` rather than
    /// each re-deriving and re-sorting it independently (spec §4.4).
    pub fn percentile(&self, node_id: u64, p: f64) -> u64 {
        let tracker = self.node_tracker(node_id);
        let cache = self
            .sorted_latency_caches
            .entry(node_id)
            .or_insert_with(|| Arc::new(CacheMaintainer::new(self.cache_ttl, Arc::new(Vec::new()))))
            .clone();
        let sorted = cache.get_or_refresh(|| {
            let mut latencies = tracker.finished_snapshot();
            latencies.sort_unstable();
            Arc::new(latencies)
        });

        if sorted.is_empty() {
            return 0;
        }
        let idx = ((p.clamp(0.0, 1.0) * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
        sorted[idx]
    }

    pub fn snapshot(&self, node_id: u64) -> NodeStatsSnapshot {
        NodeStatsSnapshot {
            pending: self.pending_count(node_id),
            rps: self.requests_per_second(node_id),
            p50: self.percentile(node_id, 0.50),
            p75: self.percentile(node_id, 0.75),
            p90: self.percentile(node_id, 0.90),
            p95: self.percentile(node_id, 0.95),
            p99: self.percentile(node_id, 0.99),
        }
    }

    pub fn health_score(
        &self,
        node_id: u64,
        calculator: &dyn HealthScoreCalculator,
    ) -> f64 {
        let pending = self.pending_count(node_id);
        let median = self.percentile(node_id, 0.50);
        calculator.score(pending, median)
    }
}
