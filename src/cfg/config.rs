// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::ClientError;

/// Top-level configuration for a `NetworkClient`, loaded from YAML.
/// Field names and defaults follow the configuration list from the
/// external-interfaces section of the design this crate implements.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NetworkClientConfig {
    /// Upper bound on concurrently open sockets per destination node.
    #[serde(rename = "maxConnectionsPerNode", default = "default_max_connections_per_node")]
    pub max_connections_per_node: u32,

    #[serde(rename = "connectTimeoutMillis", default = "default_connect_timeout_millis")]
    pub connect_timeout_millis: u64,

    #[serde(rename = "writeTimeoutMillis", default = "default_write_timeout_millis")]
    pub write_timeout_millis: u64,

    /// Negative: sockets never age out. Zero: every socket is single-use.
    #[serde(rename = "closeChannelTimeMillis", default = "default_close_channel_time_millis")]
    pub close_channel_time_millis: i64,

    #[serde(rename = "staleRequestTimeoutMins", default = "default_stale_request_timeout_mins")]
    pub stale_request_timeout_mins: u64,

    #[serde(rename = "staleRequestCleanupFreqMins", default = "default_stale_request_cleanup_freq_mins")]
    pub stale_request_cleanup_freq_mins: u64,

    /// Width, in seconds, of the rolling latency window kept per node.
    #[serde(rename = "requestStatisticsWindowSeconds", default = "default_request_statistics_window_seconds")]
    pub request_statistics_window_seconds: u64,

    /// How long a cached percentile/RPS/pending read is served before the
    /// next reader triggers a recompute.
    #[serde(rename = "statisticsCacheTtlMillis", default = "default_statistics_cache_ttl_millis")]
    pub statistics_cache_ttl_millis: u64,

    #[serde(rename = "outlierMultiplier", default = "default_outlier_multiplier")]
    pub outlier_multiplier: f64,

    #[serde(rename = "outlierConstant", default = "default_outlier_constant")]
    pub outlier_constant: f64,

    /// Cooldown window applied by the default error-backoff strategy
    /// after a connect/write failure against a node.
    #[serde(rename = "backoffCooldownMillis", default = "default_backoff_cooldown_millis")]
    pub backoff_cooldown_millis: u64,

    /// Retry budget applied when a caller does not specify one per call.
    #[serde(rename = "defaultMaxRetry", default = "default_default_max_retry")]
    pub default_max_retry: u32,

    /// Whether the load balancer is permitted to return the same node
    /// twice in a row when it is the only match (degenerate clusters).
    #[serde(rename = "duplicatesOk", default = "default_duplicates_ok")]
    pub duplicates_ok: bool,

    /// Service name advertised to a dark-canary-aware load balancer;
    /// empty means no canary routing.
    #[serde(rename = "darkCanaryServiceName", default)]
    pub dark_canary_service_name: String,
}

fn default_max_connections_per_node() -> u32 {
    8
}
fn default_connect_timeout_millis() -> u64 {
    2_000
}
fn default_write_timeout_millis() -> u64 {
    5_000
}
fn default_close_channel_time_millis() -> i64 {
    -1
}
fn default_stale_request_timeout_mins() -> u64 {
    5
}
fn default_stale_request_cleanup_freq_mins() -> u64 {
    1
}
fn default_request_statistics_window_seconds() -> u64 {
    60
}
fn default_statistics_cache_ttl_millis() -> u64 {
    100
}
fn default_outlier_multiplier() -> f64 {
    3.0
}
fn default_outlier_constant() -> f64 {
    1.0
}
fn default_backoff_cooldown_millis() -> u64 {
    30_000
}
fn default_default_max_retry() -> u32 {
    2
}
fn default_duplicates_ok() -> bool {
    true
}

impl Default for NetworkClientConfig {
    fn default() -> Self {
        Self {
            max_connections_per_node: default_max_connections_per_node(),
            connect_timeout_millis: default_connect_timeout_millis(),
            write_timeout_millis: default_write_timeout_millis(),
            close_channel_time_millis: default_close_channel_time_millis(),
            stale_request_timeout_mins: default_stale_request_timeout_mins(),
            stale_request_cleanup_freq_mins: default_stale_request_cleanup_freq_mins(),
            request_statistics_window_seconds: default_request_statistics_window_seconds(),
            statistics_cache_ttl_millis: default_statistics_cache_ttl_millis(),
            outlier_multiplier: default_outlier_multiplier(),
            outlier_constant: default_outlier_constant(),
            backoff_cooldown_millis: default_backoff_cooldown_millis(),
            default_max_retry: default_default_max_retry(),
            duplicates_ok: default_duplicates_ok(),
            dark_canary_service_name: String::new(),
        }
    }
}

impl NetworkClientConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: NetworkClientConfig = serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&mut self) -> Result<()> {
        ensure!(self.max_connections_per_node >= 1, "maxConnectionsPerNode must be >= 1");
        ensure!(self.connect_timeout_millis >= 1, "connectTimeoutMillis must be >= 1");
        ensure!(self.write_timeout_millis >= 1, "writeTimeoutMillis must be >= 1");
        ensure!(
            self.request_statistics_window_seconds >= 1,
            "requestStatisticsWindowSeconds must be >= 1"
        );
        ensure!(
            self.outlier_multiplier.is_finite() && self.outlier_multiplier >= 0.0,
            "outlierMultiplier must be a finite, non-negative number"
        );
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_millis)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_millis)
    }

    pub fn stale_request_timeout(&self) -> Duration {
        Duration::from_secs(self.stale_request_timeout_mins * 60)
    }

    pub fn stale_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.stale_request_cleanup_freq_mins * 60)
    }

    pub fn request_statistics_window(&self) -> Duration {
        Duration::from_secs(self.request_statistics_window_seconds)
    }

    pub fn statistics_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.statistics_cache_ttl_millis)
    }

    pub fn backoff_cooldown(&self) -> Duration {
        Duration::from_millis(self.backoff_cooldown_millis)
    }
}

/// Pluggable retry policy (spec §6 `retryStrategy`). `NetworkClient`
/// itself only consumes `max_retry` per call via `SendOptions`; this
/// trait exists for callers who want a single source of truth for both
/// the attempt budget and which error kinds are worth retrying, rather
/// than hardcoding `ClientError::is_retriable`.
pub trait RetryStrategy: Send + Sync {
    fn max_retry(&self) -> u32;
    fn is_retriable(&self, error: &ClientError) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct MaxAttemptsRetryStrategy {
    pub max_retry: u32,
}

impl RetryStrategy for MaxAttemptsRetryStrategy {
    fn max_retry(&self) -> u32 {
        self.max_retry
    }

    fn is_retriable(&self, error: &ClientError) -> bool {
        error.is_retriable()
    }
}
