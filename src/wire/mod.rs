// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod frame;

pub use frame::{Frame, FrameCodec, MAX_FRAME_LEN};
