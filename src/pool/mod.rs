// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod channel_pool;
pub mod entry;
pub mod registry;

pub use channel_pool::{ChannelPool, ChannelPoolConfig, PoolSnapshot};
pub use registry::{ChannelPoolRegistry, IoClientSnapshot};
