// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Reply stream protocol
//!
//! The reply to a message is a byte stream of CRLF-separated JSON frames,
//! each optionally carrying assistant commentary and/or a full artifact.

pub mod frame;
pub mod stream;

pub use frame::{DecoderStats, FrameDecoder, StreamEvent, DEFAULT_MAX_PENDING_BYTES, RECORD_SEPARATOR};
pub use stream::{
    byte_stream_from_chunks, decode_events, decode_frames, ByteStream, DecodeItem,
    FrameBatchStream,
};
