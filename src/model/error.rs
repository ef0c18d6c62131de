// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

use crate::model::node::Node;

/// The closed error taxonomy for this crate. Every failure surfaced to a
/// user completion, or inspected by the retry trampoline, is one of
/// these variants — no other error kind crosses the public API.
#[derive(Debug, Error, Clone)]
pub enum ClientError {
    /// No membership snapshot has ever arrived, or `shutdown()` has run.
    #[error("cluster disconnected")]
    ClusterDisconnected,

    /// Load-balancer construction failed on the latest membership
    /// snapshot. Sticky until the next snapshot replaces it.
    #[error("invalid cluster: {0}")]
    InvalidCluster(String),

    /// The load balancer returned no node for the requested capability
    /// mask.
    #[error("no nodes available")]
    NoNodesAvailable,

    /// The destination pool is shutting down or has shut down.
    #[error("pool closed")]
    PoolClosed,

    /// The queue used to bound waiting writes is full (not part of the
    /// base spec; implementers may add a cap, see spec §5).
    #[error("write queue full")]
    QueueFull,

    /// Socket `connect` did not complete within `connectTimeoutMillis`.
    #[error("connect timeout to {0}")]
    ConnectTimeout(Node),

    /// Socket `connect` failed for a reason other than timeout.
    #[error("connect error to {0}: {1}")]
    ConnectError(Node, String),

    /// A socket write failed (remote reset, broken pipe, etc.).
    #[error("write error: {0}")]
    WriteError(String),

    /// A queued waiter aged out before a socket was free to write it.
    #[error("write timeout")]
    WriteTimeout,

    /// A queued waiter aged out via the stale-request sweeper.
    #[error("stale request")]
    StaleRequest,

    /// Response bytes failed to parse into the expected type.
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// Caller passed no message to send.
    #[error("null argument")]
    NullArgument,
}

impl ClientError {
    /// Whether this failure kind is, in principle, worth retrying against
    /// a freshly selected node. Permanent caller errors
    /// (`NullArgument`) and cluster-wide states (`ClusterDisconnected`,
    /// `InvalidCluster`, `NoNodesAvailable`) are not: a different node
    /// selection cannot fix them.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ClientError::ConnectTimeout(_)
                | ClientError::ConnectError(_, _)
                | ClientError::WriteError(_)
                | ClientError::WriteTimeout
                | ClientError::StaleRequest
                | ClientError::PoolClosed
        )
    }
}
