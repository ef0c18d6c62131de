// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
        Arc, Mutex as StdMutex, Weak,
    },
    time::{Duration, Instant},
};

use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::{
    backoff::ErrorBackoffStrategy,
    model::{ClientError, Node, RequestRecord},
    pool::entry::Socket,
    stats::StatsTracker,
    wire::Frame,
};

/// Upper bound on how many waiters a single `checkin_channel` call will
/// drain before giving up and leaving the remainder queued, so that an
/// unbounded backlog can never stall the caller that triggered the
/// drain (spec §9 open question: capped at `max_connections * 64`, a
/// capacity hit is logged rather than silently absorbed).
const DRAIN_CAP_MULTIPLIER: u32 = 64;

#[derive(Debug, Clone)]
pub struct ChannelPoolConfig {
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    /// Negative: sockets never age out. Zero: every socket is single-use.
    /// Positive: a socket is reusable until it has lived this long.
    pub close_channel_time_millis: i64,
    pub stale_request_timeout: Duration,
    pub stale_cleanup_interval: Duration,
}

struct Waiter {
    record: RequestRecord,
    enqueued_at: Instant,
}

#[derive(Debug, Clone, Copy)]
pub struct PoolSnapshot {
    pub open_channels: u32,
    pub max_channels: u32,
    pub write_queue_size: usize,
    pub requests_sent: u64,
}

/// Per-node pool of pooled TCP sockets (spec §3 "Channel pool", §4.1-4.2).
/// Owns an idle-socket FIFO, a waiting-writes FIFO for requests that
/// arrived when no idle socket was available, and a background sweeper
/// that fails requests that have waited past `stale_request_timeout`.
pub struct ChannelPool {
    node: Node,
    cfg: ChannelPoolConfig,
    stats: Arc<StatsTracker>,
    backoff: Arc<dyn ErrorBackoffStrategy>,
    idle: StdMutex<VecDeque<Arc<Socket>>>,
    waiting: StdMutex<VecDeque<Waiter>>,
    pool_size: AtomicU32,
    requests_sent: AtomicU64,
    closed: AtomicBool,
    soft_closed: AtomicBool,
}

impl ChannelPool {
    pub fn spawn(
        node: Node,
        cfg: ChannelPoolConfig,
        stats: Arc<StatsTracker>,
        backoff: Arc<dyn ErrorBackoffStrategy>,
    ) -> Arc<Self> {
        let pool = Arc::new(Self {
            node,
            cfg,
            stats,
            backoff,
            idle: StdMutex::new(VecDeque::new()),
            waiting: StdMutex::new(VecDeque::new()),
            pool_size: AtomicU32::new(0),
            requests_sent: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            soft_closed: AtomicBool::new(false),
        });

        if !pool.cfg.stale_cleanup_interval.is_zero() {
            let weak = Arc::downgrade(&pool);
            tokio::spawn(async move { Self::run_sweeper(weak).await });
        }

        pool
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            open_channels: self.pool_size.load(Ordering::Relaxed),
            max_channels: self.cfg.max_connections,
            write_queue_size: self.waiting.lock().expect("waiting lock poisoned").len(),
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
        }
    }

    /// Enqueues `record` for delivery and returns as soon as it has
    /// either been handed off or fast-failed — never after the socket
    /// connect or the wire write completes (spec §5: public send paths
    /// never block on I/O). An idle hit schedules the write on a spawned
    /// task; a miss joins the waiting FIFO and schedules an open attempt
    /// the same way (spec §4.1 `sendRequest`).
    pub async fn send_request(self: &Arc<Self>, record: RequestRecord) {
        if self.closed.load(Ordering::Acquire) {
            record.complete(Err(ClientError::PoolClosed));
            return;
        }

        match self.checkout_channel() {
            Some(socket) => {
                let pool = self.clone();
                tokio::spawn(async move {
                    if let WriteOutcome::Ok = pool.write_and_track(&socket, record).await {
                        pool.checkin_channel(socket, false).await;
                    }
                });
            },
            None => {
                let correlation_id = record.correlation_id;
                self.waiting.lock().expect("waiting lock poisoned").push_back(Waiter {
                    record,
                    enqueued_at: Instant::now(),
                });
                let pool = self.clone();
                tokio::spawn(async move {
                    pool.open_channel(correlation_id).await;
                });
            },
        }
    }

    fn checkout_channel(&self) -> Option<Arc<Socket>> {
        loop {
            let socket = self.idle.lock().expect("idle lock poisoned").pop_front()?;
            if !socket.connected() {
                self.pool_size.fetch_sub(1, Ordering::Relaxed);
                continue;
            }
            if !socket.is_reusable(self.cfg.close_channel_time_millis) {
                self.pool_size.fetch_sub(1, Ordering::Relaxed);
                let stale = socket.clone();
                tokio::spawn(async move { stale.close().await });
                continue;
            }
            return Some(socket);
        }
    }

    async fn open_channel(self: &Arc<Self>, triggering_id: uuid::Uuid) {
        let new_size = self.pool_size.fetch_add(1, Ordering::Relaxed) + 1;
        if new_size > self.cfg.max_connections {
            self.pool_size.fetch_sub(1, Ordering::Relaxed);
            warn!(node = %self.node, "pool at capacity, deferring connect for queued request");
            return;
        }

        let connect = tokio::time::timeout(self.cfg.connect_timeout, TcpStream::connect(self.node.addr)).await;
        match connect {
            Ok(Ok(stream)) => {
                let socket = Socket::spawn(stream, self.node.clone(), self.stats.clone());
                self.checkin_channel(socket, true).await;
            },
            Ok(Err(e)) => {
                self.fail_open(triggering_id, ClientError::ConnectError(self.node.clone(), e.to_string()))
                    .await;
            },
            Err(_elapsed) => {
                self.fail_open(triggering_id, ClientError::ConnectTimeout(self.node.clone())).await;
            },
        }
    }

    async fn fail_open(self: &Arc<Self>, triggering_id: uuid::Uuid, error: ClientError) {
        self.pool_size.fetch_sub(1, Ordering::Relaxed);
        self.backoff.notify_failure(&self.node);

        let triggering = {
            let mut waiting = self.waiting.lock().expect("waiting lock poisoned");
            let pos = waiting.iter().position(|w| w.record.correlation_id == triggering_id);
            pos.and_then(|idx| waiting.remove(idx))
        };
        if let Some(waiter) = triggering {
            waiter.record.complete(Err(error));
        }
    }

    /// Drains the waiting-writes FIFO over `socket`, writing as many
    /// pending requests as possible (spec §4.2 `checkinChannel`).
    /// `is_first_write` grants the extra `connect_timeout` budget to
    /// every waiter drained during this call, since they raced against
    /// the socket open rather than an already-idle socket.
    async fn checkin_channel(self: &Arc<Self>, socket: Arc<Socket>, is_first_write: bool) {
        let effective_timeout = if is_first_write {
            self.cfg.connect_timeout + self.cfg.write_timeout
        } else {
            self.cfg.write_timeout
        };
        let drain_cap = self.cfg.max_connections.saturating_mul(DRAIN_CAP_MULTIPLIER);

        let mut drained = 0u32;
        loop {
            if drained >= drain_cap {
                warn!(node = %self.node, drain_cap, "checkin drain cap reached, leaving remainder queued");
                break;
            }
            let Some(waiter) = self.waiting.lock().expect("waiting lock poisoned").pop_front() else {
                break;
            };
            drained += 1;

            if waiter.enqueued_at.elapsed() >= effective_timeout {
                waiter.record.complete(Err(ClientError::WriteTimeout));
                continue;
            }

            if let WriteOutcome::Failed(_) = self.write_and_track(&socket, waiter.record).await {
                // Socket just died; stop draining onto it. Remaining
                // waiters stay queued for the next open or checkin.
                return;
            }
        }

        if socket.connected() && socket.is_reusable(self.cfg.close_channel_time_millis) {
            self.idle.lock().expect("idle lock poisoned").push_back(socket);
        } else {
            self.pool_size.fetch_sub(1, Ordering::Relaxed);
            socket.close().await;
        }
    }

    async fn write_and_track(&self, socket: &Arc<Socket>, record: RequestRecord) -> WriteOutcome {
        let payload = match record.payload() {
            Ok(p) => p.clone(),
            Err(e) => {
                let error = e.clone();
                record.complete(Err(e));
                return WriteOutcome::Failed(error);
            },
        };
        let correlation_id = record.correlation_id;
        let frame = Frame::new(correlation_id, record.request_name().to_string(), 0, payload);
        let expects_response = record.expects_response;

        match socket.write_frame(frame).await {
            Ok(()) => {
                self.requests_sent.fetch_add(1, Ordering::Relaxed);
                if expects_response {
                    socket.track_response(&self.stats, record);
                }
                WriteOutcome::Ok
            },
            Err(e) => {
                self.backoff.notify_failure(&self.node);
                socket.mark_disconnected();
                let error = ClientError::WriteError(e.to_string());
                record.complete(Err(error.clone()));
                WriteOutcome::Failed(error)
            },
        }
    }

    async fn run_sweeper(weak: Weak<ChannelPool>) {
        let interval = match weak.upgrade() {
            Some(pool) => pool.cfg.stale_cleanup_interval,
            None => return,
        };
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let Some(pool) = weak.upgrade() else { return };
            if pool.closed.load(Ordering::Acquire) {
                return;
            }
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| pool.sweep_once())) {
                let msg = e.downcast_ref::<&str>().copied().unwrap_or("unknown panic");
                warn!(node = %pool.node, "stale-request sweep panicked: {msg}");
            }
        }
    }

    fn sweep_once(&self) {
        let timeout = self.cfg.stale_request_timeout;
        let mut stale = Vec::new();
        {
            let mut waiting = self.waiting.lock().expect("waiting lock poisoned");
            let mut remaining = VecDeque::with_capacity(waiting.len());
            while let Some(waiter) = waiting.pop_front() {
                if waiter.enqueued_at.elapsed() > timeout {
                    stale.push(waiter.record);
                } else {
                    remaining.push_back(waiter);
                }
            }
            *waiting = remaining;
        }
        for record in stale {
            record.complete(Err(ClientError::StaleRequest));
        }
    }

    /// Idempotent. Fails every queued waiter with `PoolClosed` and
    /// closes every idle socket. Sockets currently mid-checkin are left
    /// to complete naturally; their in-flight requests resolve with
    /// their own outcome rather than being force-failed.
    pub async fn close(self: &Arc<Self>) {
        if self.closed.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return;
        }
        self.soft_closed.store(true, Ordering::Release);

        let waiters: Vec<Waiter> = std::mem::take(&mut *self.waiting.lock().expect("waiting lock poisoned")).into();
        for waiter in waiters {
            waiter.record.complete(Err(ClientError::PoolClosed));
        }

        let sockets: Vec<Arc<Socket>> = std::mem::take(&mut *self.idle.lock().expect("idle lock poisoned")).into();
        for socket in sockets {
            socket.close().await;
        }
        info!(node = %self.node, "channel pool closed");
    }

    /// Mirrors the teacher's JMX deregistration hook: stops whatever
    /// periodic metric emission is tied to this pool without tearing
    /// down live sockets.
    pub fn unregister_metrics(&self) {
        self.soft_closed.store(true, Ordering::Release);
    }
}

enum WriteOutcome {
    Ok,
    Failed(ClientError),
}
