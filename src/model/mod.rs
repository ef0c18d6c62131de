// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod error;
pub mod message;
pub mod node;
pub mod request;

pub use error::ClientError;
pub use message::Message;
pub use node::{Capability, Endpoint, Node, PersistentCapability};
pub use request::{Completion, RequestRecord};
