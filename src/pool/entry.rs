// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use bytes::BytesMut;
use dashmap::DashMap;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::Mutex as AsyncMutex,
};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    model::{ClientError, Node, RequestRecord},
    stats::StatsTracker,
    wire::{Frame, FrameCodec},
};

/// A single connected socket plus its creation timestamp (spec §3
/// "Pool entry"). Owns the write half directly and spawns a read loop
/// that demultiplexes inbound frames by correlation id — the
/// "correlation layer... below the pool" from spec §2's data-flow
/// description. Response bytes are handed to the originating
/// `RequestRecord`'s completion as soon as the matching frame arrives.
pub struct Socket {
    node: Node,
    writer: AsyncMutex<OwnedWriteHalf>,
    created_at: Instant,
    connected: AtomicBool,
    awaiting: Arc<DashMap<Uuid, RequestRecord>>,
}

impl Socket {
    /// Establishes the read loop over an already-connected stream and
    /// returns the handle used for writes.
    pub fn spawn(stream: TcpStream, node: Node, stats: Arc<StatsTracker>) -> Arc<Self> {
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();

        let socket = Arc::new(Self {
            node,
            writer: AsyncMutex::new(write_half),
            created_at: Instant::now(),
            connected: AtomicBool::new(true),
            awaiting: Arc::new(DashMap::new()),
        });

        let reader = socket.clone();
        tokio::spawn(async move {
            reader.read_loop(read_half, stats).await;
        });

        socket
    }

    /// Registers `record` as awaiting a response on this socket and
    /// begins its latency timer. Called by the channel pool immediately
    /// after a successful write (spec §4.1: `startNettyTiming`).
    pub fn track_response(&self, stats: &StatsTracker, record: RequestRecord) {
        stats.begin_request(self.node.id, record.correlation_id);
        self.awaiting.insert(record.correlation_id, record);
    }

    pub async fn write_frame(&self, frame: Frame) -> std::io::Result<()> {
        let mut buf = BytesMut::new();
        FrameCodec.encode(frame, &mut buf)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(&buf).await
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }

    /// Reusable iff `close_channel_time_millis < 0` (never age out), `==
    /// 0` (single use only — never reusable after one write), or the
    /// socket's age is still under the configured budget.
    pub fn is_reusable(&self, close_channel_time_millis: i64) -> bool {
        if close_channel_time_millis < 0 {
            return true;
        }
        if close_channel_time_millis == 0 {
            return false;
        }
        (self.created_at.elapsed().as_millis() as i64) < close_channel_time_millis
    }

    pub async fn close(&self) {
        self.mark_disconnected();
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }

    async fn read_loop(self: Arc<Self>, mut read_half: OwnedReadHalf, stats: Arc<StatsTracker>) {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::with_capacity(8 * 1024);
        'outer: loop {
            loop {
                match codec.decode(&mut buf) {
                    Ok(Some(frame)) => {
                        if let Some((_, record)) = self.awaiting.remove(&frame.correlation_id) {
                            stats.end_request(self.node.id, frame.correlation_id);
                            record.complete(Ok(frame.body));
                        } else {
                            warn!(
                                node = %self.node,
                                correlation_id = %frame.correlation_id,
                                "response for unknown or already-expired correlation id"
                            );
                        }
                    },
                    Ok(None) => break,
                    Err(e) => {
                        warn!(node = %self.node, "frame decode error, closing socket: {e}");
                        break 'outer;
                    },
                }
            }

            match read_half.read_buf(&mut buf).await {
                Ok(0) => {
                    debug!(node = %self.node, "peer closed connection");
                    break;
                },
                Ok(_) => {},
                Err(e) => {
                    warn!(node = %self.node, "read error, closing socket: {e}");
                    break;
                },
            }
        }

        self.mark_disconnected();
        let stranded: Vec<Uuid> = self.awaiting.iter().map(|e| *e.key()).collect();
        for id in stranded {
            if let Some((_, record)) = self.awaiting.remove(&id) {
                stats.expire_pending(self.node.id, id);
                record.complete(Err(ClientError::WriteError(
                    "connection closed while awaiting response".to_string(),
                )));
            }
        }
    }
}
