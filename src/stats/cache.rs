// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        RwLock,
    },
    time::{Duration, Instant},
};

struct CacheState<T> {
    value: T,
    last_update: Instant,
}

/// A single cached derived statistic with a CAS-gated, single-flight
/// refresh.
///
/// Spec §4.4: "after `ttl` elapses, exactly one reader observes
/// `refreshing-flag` transition from false→true and recomputes; other
/// readers return the stale `cachedValue`." This bounds recomputation to
/// one concurrent refresh per statistic regardless of how many readers
/// race past expiry at once.
pub struct CacheMaintainer<T: Clone> {
    ttl: Duration,
    state: RwLock<CacheState<T>>,
    refreshing: AtomicBool,
}

impl<T: Clone> CacheMaintainer<T> {
    pub fn new(ttl: Duration, initial: T) -> Self {
        Self {
            ttl,
            state: RwLock::new(CacheState {
                value: initial,
                last_update: Instant::now(),
            }),
            refreshing: AtomicBool::new(false),
        }
    }

    /// Returns the current value, recomputing via `compute` if the TTL
    /// has elapsed and this caller wins the refresh CAS. Losing the CAS,
    /// or being within the TTL, returns the (possibly stale) cached
    /// value without calling `compute`.
    pub fn get_or_refresh(&self, compute: impl FnOnce() -> T) -> T {
        let stale = {
            let guard = self.state.read().expect("cache rwlock poisoned");
            (guard.value.clone(), guard.last_update.elapsed() < self.ttl)
        };
        let (value, fresh) = stale;
        if fresh {
            return value;
        }

        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let computed = compute();
            {
                let mut guard = self.state.write().expect("cache rwlock poisoned");
                guard.value = computed.clone();
                guard.last_update = Instant::now();
            }
            self.refreshing.store(false, Ordering::Release);
            computed
        } else {
            value
        }
    }
}
