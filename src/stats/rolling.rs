// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::VecDeque,
    sync::Mutex,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use uuid::Uuid;

/// Per-node rolling window of finished-request latencies plus the set of
/// requests currently in flight.
///
/// Invariants (spec §3): a correlation id present in `pending` has no
/// matching entry in `finished` for that id, and removal from `pending`
/// happens-before insertion into `finished` for any single reader —
/// enforced here by `end_request` draining `pending` before it ever
/// touches `finished`.
#[derive(Debug)]
pub struct NodeTracker {
    window: Duration,
    finished: Mutex<VecDeque<(Instant, u64)>>,
    pending: DashMap<Uuid, Instant>,
}

impl NodeTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            finished: Mutex::new(VecDeque::new()),
            pending: DashMap::new(),
        }
    }

    /// Registers a request's start time. Called once the request has
    /// actually been written to a socket (spec §4.1: `startNettyTiming`).
    pub fn begin_request(&self, id: Uuid) {
        self.pending.insert(id, Instant::now());
    }

    /// Removes `id` from `pending` and, if it was present, appends its
    /// latency to `finished`. Returns the observed latency, or `None` if
    /// `id` was not pending (already completed, expired, or never
    /// begun).
    pub fn end_request(&self, id: Uuid) -> Option<Duration> {
        let (_, start) = self.pending.remove(&id)?;
        let now = Instant::now();
        let latency = now.duration_since(start);
        let mut finished = self.finished.lock().expect("finished mutex poisoned");
        finished.push_back((now, latency.as_millis() as u64));
        Some(latency)
    }

    /// Explicitly drops a pending entry without recording a finish (used
    /// when a request is abandoned, e.g. `StaleRequest`/`WriteTimeout`,
    /// so it does not linger as "pending" forever).
    pub fn expire_pending(&self, id: Uuid) {
        self.pending.remove(&id);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Trims entries older than `window` and returns the remaining
    /// latencies, time-ordered (oldest first).
    pub fn finished_snapshot(&self) -> Vec<u64> {
        let mut finished = self.finished.lock().expect("finished mutex poisoned");
        self.trim(&mut finished);
        finished.iter().map(|&(_, lat)| lat).collect()
    }

    /// Count of finished requests within the last second, for RPS.
    pub fn requests_last_second(&self) -> u64 {
        let mut finished = self.finished.lock().expect("finished mutex poisoned");
        self.trim(&mut finished);
        let cutoff = Instant::now().checked_sub(Duration::from_millis(1000));
        let Some(cutoff) = cutoff else {
            return finished.len() as u64;
        };
        let slice = finished.make_contiguous();
        let idx = slice.partition_point(|&(t, _)| t < cutoff);
        (slice.len() - idx) as u64
    }

    fn trim(&self, finished: &mut VecDeque<(Instant, u64)>) {
        let Some(cutoff) = Instant::now().checked_sub(self.window) else {
            return;
        };
        while let Some(&(t, _)) = finished.front() {
            if t < cutoff {
                finished.pop_front();
            } else {
                break;
            }
        }
    }

    /// Percentile `p` (0.0..=1.0) over the trimmed latency window, in
    /// milliseconds. Empty windows return 0 (spec §8 boundary behavior).
    pub fn percentile(&self, p: f64) -> u64 {
        let mut latencies = self.finished_snapshot();
        if latencies.is_empty() {
            return 0;
        }
        latencies.sort_unstable();
        let idx = ((p.clamp(0.0, 1.0) * latencies.len() as f64).floor() as usize)
            .min(latencies.len() - 1);
        latencies[idx]
    }
}
