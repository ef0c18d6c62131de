// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;

use crate::model::{ClientError, Completion};

/// Builds a [`Completion`] that runs the request lifecycle's
/// deserialization step (spec §2) before handing a typed result to
/// `on_result`: `decode` only ever sees the bytes of a successful
/// response, and a decode failure is reported as
/// [`ClientError::DeserializationError`] rather than silently dropped.
/// An upstream connect/write/pool failure bypasses `decode` entirely and
/// reaches `on_result` unchanged.
///
/// This is the "explicit `{encode, decode}` function pair... passed
/// alongside the completion at the call site" from spec §9 — there is no
/// process-wide serializer registry, so callers that want a typed
/// response build their completion with this helper instead of matching
/// on `Bytes` themselves.
pub fn decoded_completion<T: Send + 'static>(
    decode: impl FnOnce(Bytes) -> Result<T, String> + Send + 'static,
    on_result: impl FnOnce(Result<T, ClientError>) + Send + 'static,
) -> Completion {
    Box::new(move |result| {
        let decoded = result.and_then(|bytes| decode(bytes).map_err(ClientError::DeserializationError));
        on_result(decoded);
    })
}
