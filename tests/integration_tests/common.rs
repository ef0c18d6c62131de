use std::{net::SocketAddr, sync::Arc, time::Duration};

use bytes::BytesMut;
use cluster_rpc_client::{
    backoff::CooldownBackoff,
    cfg::config::{MaxAttemptsRetryStrategy, RetryStrategy},
    pool::{ChannelPoolConfig, ChannelPoolRegistry},
    stats::StatsTracker,
    wire::FrameCodec,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};
use tokio_util::codec::{Decoder, Encoder};

/// Binds a loopback listener that echoes every frame it receives back to
/// the sender, standing in for a healthy cluster peer.
pub async fn spawn_echo_peer() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind echo peer");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut codec = FrameCodec;
                let mut buf = BytesMut::with_capacity(4 * 1024);
                loop {
                    loop {
                        match codec.decode(&mut buf) {
                            Ok(Some(frame)) => {
                                let mut out = BytesMut::new();
                                if codec.encode(frame, &mut out).is_err() {
                                    return;
                                }
                                if socket.write_all(&out).await.is_err() {
                                    return;
                                }
                            },
                            Ok(None) => break,
                            Err(_) => return,
                        }
                    }
                    match socket.read_buf(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(_) => {},
                    }
                }
            });
        }
    });

    addr
}

/// An address in the TEST-NET-1 block (RFC 5737). Connect attempts to it
/// time out at the TCP layer rather than being refused, standing in for a
/// peer whose `connect` stalls.
pub fn unroutable_addr() -> SocketAddr {
    "192.0.2.1:9".parse().expect("valid test-net addr")
}

pub fn small_pool_cfg(max_connections: u32) -> ChannelPoolConfig {
    ChannelPoolConfig {
        max_connections,
        connect_timeout: Duration::from_millis(500),
        write_timeout: Duration::from_millis(500),
        close_channel_time_millis: -1,
        stale_request_timeout: Duration::from_secs(60),
        stale_cleanup_interval: Duration::from_secs(0),
    }
}

pub fn fresh_registry(cfg: ChannelPoolConfig) -> Arc<ChannelPoolRegistry> {
    let stats = Arc::new(StatsTracker::new(Duration::from_secs(60), Duration::from_millis(10)));
    let backoff = Arc::new(CooldownBackoff::new(Duration::from_secs(30)));
    Arc::new(ChannelPoolRegistry::new(cfg, stats, backoff))
}

/// A permissive ceiling (well above any per-call `max_retry` used in
/// these tests) so `SendOptions::max_retry` is never clamped here —
/// tests that care about the ceiling itself build their own strategy.
pub fn fresh_retry_strategy() -> Arc<dyn RetryStrategy> {
    Arc::new(MaxAttemptsRetryStrategy { max_retry: 5 })
}
