// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration, time::Instant};

use bytes::Bytes;
use once_cell::sync::OnceCell;
use uuid::Uuid;

use crate::model::{error::ClientError, message::Message, node::Node};

/// Invoked exactly once per request, with the response bytes on success
/// or the terminal [`ClientError`] on failure.
pub type Completion = Box<dyn FnOnce(Result<Bytes, ClientError>) + Send>;

/// A single in-flight (or about-to-be-flight) request attempt.
///
/// Correlation identifiers are assigned at construction and are unique
/// per attempt: a retry builds a brand-new `RequestRecord` (via
/// [`RequestRecord::retry`]) with a fresh id rather than reusing the
/// original one, since the spec requires correlation ids to be globally
/// unique across all in-flight requests in the process.
pub struct RequestRecord {
    message: Arc<dyn Message>,
    payload: OnceCell<Bytes>,
    pub destination: Node,
    pub correlation_id: Uuid,
    pub created_at: Instant,
    pub retry_attempt: u32,
    pub expects_response: bool,
    pub completion: Option<Completion>,
}

impl std::fmt::Debug for RequestRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRecord")
            .field("request_name", &self.message.request_name())
            .field("destination", &self.destination)
            .field("correlation_id", &self.correlation_id)
            .field("retry_attempt", &self.retry_attempt)
            .field("expects_response", &self.expects_response)
            .finish()
    }
}

impl RequestRecord {
    /// Builds a fresh, attempt-0 request record.
    pub fn new(
        message: Arc<dyn Message>,
        destination: Node,
        expects_response: bool,
        completion: Option<Completion>,
    ) -> Self {
        Self {
            message,
            payload: OnceCell::new(),
            destination,
            correlation_id: Uuid::new_v4(),
            created_at: Instant::now(),
            retry_attempt: 0,
            expects_response,
            completion,
        }
    }

    /// Consumes `self` to build the next retry attempt: same message,
    /// a (possibly different) destination node, `retry_attempt + 1`, a
    /// fresh correlation id and creation timestamp, and a new
    /// completion (normally the retry trampoline wrapping the original
    /// user callback again).
    pub fn retry(self, destination: Node, completion: Option<Completion>) -> Self {
        Self {
            message: self.message,
            payload: OnceCell::new(),
            destination,
            correlation_id: Uuid::new_v4(),
            created_at: Instant::now(),
            retry_attempt: self.retry_attempt + 1,
            expects_response: self.expects_response,
            completion,
        }
    }

    /// The serialized payload, materialized from the underlying
    /// [`Message`] on first access and cached thereafter.
    pub fn payload(&self) -> Result<&Bytes, ClientError> {
        self.payload.get_or_try_init(|| self.message.encode())
    }

    pub fn request_name(&self) -> &str {
        self.message.request_name()
    }

    /// Overrides the retry-attempt counter. Used by the retry trampoline,
    /// which constructs the next attempt's record directly (it only has
    /// the failing node and message on hand, not the previous record,
    /// since that record was already consumed by its own completion).
    pub fn at_attempt(mut self, retry_attempt: u32) -> Self {
        self.retry_attempt = retry_attempt;
        self
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Invokes the completion, if any, exactly once. Fire-and-forget
    /// records (no completion) silently drop the result.
    pub fn complete(mut self, result: Result<Bytes, ClientError>) {
        if let Some(completion) = self.completion.take() {
            completion(result);
        }
    }
}
