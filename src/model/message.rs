// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt::Debug;

use bytes::Bytes;

use crate::model::error::ClientError;

/// An application-level request payload.
///
/// Spec §9 describes "implicit serializer parameters" in the source
/// system becoming "explicit `{encode, decode}` function pairs". For the
/// outbound half that is this trait: a `Message` knows how to turn
/// itself into wire bytes on demand (the `RequestRecord` calls `encode`
/// lazily, on first access, never eagerly at construction). The inbound
/// half — turning response bytes back into a typed value — is the
/// caller's concern: `net::decoded_completion` wraps a plain `decode:
/// FnOnce(Bytes) -> Result<R, String>` and a typed callback into the
/// `Completion` passed to `send_request`, so decoding is wired per call
/// site rather than through a process-wide serializer registry.
pub trait Message: Debug + Send + Sync {
    /// The name advertised in the wire frame header so a compliant peer
    /// can dispatch on it without decoding the body.
    fn request_name(&self) -> &str;

    /// Serialize this message to its wire representation.
    fn encode(&self) -> Result<Bytes, ClientError>;
}

/// A message whose bytes are already known. Useful for tests and for
/// callers that have already serialized their payload.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub name: String,
    pub body: Bytes,
}

impl RawMessage {
    pub fn new(name: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }
}

impl Message for RawMessage {
    fn request_name(&self) -> &str {
        &self.name
    }

    fn encode(&self) -> Result<Bytes, ClientError> {
        Ok(self.body.clone())
    }
}
