// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The error-backoff strategy is an external collaborator (spec §4.1,
//! §9, GLOSSARY): the channel pool tells it about connect/write
//! failures, and a load balancer is expected to query it to mask
//! unhealthy nodes out of node selection. This module defines the seam
//! plus a simple cooldown-window reference implementation.

use std::{
    sync::atomic::{AtomicI64, Ordering},
    time::{Duration, Instant},
};

use dashmap::DashMap;

use crate::model::Node;

pub trait ErrorBackoffStrategy: Send + Sync {
    /// Called by the channel pool whenever a connect or write attempt to
    /// `node` fails.
    fn notify_failure(&self, node: &Node);

    /// Whether `node` should currently be considered available for
    /// selection. Load balancers that consult backoff state call this;
    /// the core itself never gates on it directly.
    fn is_available(&self, node: &Node) -> bool;
}

/// Marks a node unavailable for a fixed cooldown window after its most
/// recent reported failure.
pub struct CooldownBackoff {
    cooldown: Duration,
    last_failure: DashMap<u64, AtomicI64>,
    epoch: Instant,
}

impl CooldownBackoff {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_failure: DashMap::new(),
            epoch: Instant::now(),
        }
    }

    fn now_millis(&self) -> i64 {
        self.epoch.elapsed().as_millis() as i64
    }
}

impl ErrorBackoffStrategy for CooldownBackoff {
    fn notify_failure(&self, node: &Node) {
        let now = self.now_millis();
        self.last_failure
            .entry(node.id)
            .and_modify(|v| v.store(now, Ordering::Relaxed))
            .or_insert_with(|| AtomicI64::new(now));
    }

    fn is_available(&self, node: &Node) -> bool {
        let Some(last) = self.last_failure.get(&node.id) else {
            return true;
        };
        let elapsed = self.now_millis() - last.load(Ordering::Relaxed);
        elapsed >= self.cooldown.as_millis() as i64
    }
}
