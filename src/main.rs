// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use bytes::{Bytes, BytesMut};
use cluster_rpc_client::{
    backoff::CooldownBackoff,
    balance::RoundRobinBalancerFactory,
    cfg::{
        cli::resolve_config_path,
        config::{MaxAttemptsRetryStrategy, NetworkClientConfig},
        logger::init_logger,
    },
    model::{message::RawMessage, Capability, Endpoint, Message, Node, PersistentCapability},
    net::{NetworkClient, SendOptions},
    pool::{ChannelPoolConfig, ChannelPoolRegistry},
    stats::StatsTracker,
    wire::FrameCodec,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    time::timeout,
};
use tokio_util::codec::{Decoder, Encoder};
use tracing::info;

/// Binds a loopback listener that echoes every frame it receives back
/// to the sender, standing in for a real cluster peer.
async fn spawn_echo_peer() -> Result<std::net::SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

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

    Ok(addr)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _logger_guard = init_logger("config/logger.yaml")?;

    let cfg = resolve_config_path("config/network_client.yaml")
        .ok()
        .and_then(|p| NetworkClientConfig::load_from_file(p).ok())
        .unwrap_or_default();

    let peer_addr = spawn_echo_peer().await.context("failed to start demo peer")?;
    info!(%peer_addr, "demo echo peer listening");

    let stats = Arc::new(StatsTracker::new(
        cfg.request_statistics_window(),
        cfg.statistics_cache_ttl(),
    ));
    let backoff = Arc::new(CooldownBackoff::new(cfg.backoff_cooldown()));
    let pool_cfg = ChannelPoolConfig {
        max_connections: cfg.max_connections_per_node,
        connect_timeout: cfg.connect_timeout(),
        write_timeout: cfg.write_timeout(),
        close_channel_time_millis: cfg.close_channel_time_millis,
        stale_request_timeout: cfg.stale_request_timeout(),
        stale_cleanup_interval: cfg.stale_cleanup_interval(),
    };
    let registry = Arc::new(ChannelPoolRegistry::new(pool_cfg, stats.clone(), backoff));
    let retry_strategy = Arc::new(MaxAttemptsRetryStrategy {
        max_retry: cfg.default_max_retry,
    });
    let client = NetworkClient::new(registry, Arc::new(RoundRobinBalancerFactory), retry_strategy);

    let node = Node::new(1, peer_addr);
    client.update_membership(&[Endpoint::new(node.clone(), Capability::READ | Capability::WRITE, PersistentCapability::empty())]);

    for i in 0..5u32 {
        let message: Arc<dyn Message> = Arc::new(RawMessage::new("Ping", Bytes::from(format!("hello-{i}"))));
        let (tx, rx) = tokio::sync::oneshot::channel();
        client
            .send_request(
                Some(message),
                SendOptions {
                    capability: Capability::READ,
                    persistent_capability: PersistentCapability::empty(),
                    max_retry: cfg.default_max_retry,
                },
                Box::new(move |res| {
                    let _ = tx.send(res);
                }),
            )
            .await;

        match timeout(Duration::from_secs(2), rx).await {
            Ok(Ok(Ok(body))) => info!(i, response = ?String::from_utf8_lossy(&body), "round trip complete"),
            Ok(Ok(Err(e))) => info!(i, error = %e, "round trip failed"),
            Ok(Err(_)) => info!(i, "completion channel dropped"),
            Err(_) => info!(i, "round trip timed out"),
        }
    }

    let snapshot = stats.snapshot(node.id);
    info!(
        pending = snapshot.pending,
        rps = snapshot.rps,
        p50 = snapshot.p50,
        p99 = snapshot.p99,
        "final statistics snapshot"
    );

    client.shutdown().await;
    Ok(())
}
