// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Async adapters from a response byte stream to decoded frames

use futures::{Stream, StreamExt};
use std::pin::Pin;

use crate::error::{ComposerError, Result};
use crate::protocol::frame::{DecoderStats, FrameDecoder, StreamEvent};

/// Raw reply body, chunked by the transport
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Lazily decoded reply, one item per transport chunk
pub type FrameBatchStream = Pin<Box<dyn Stream<Item = Result<DecodeItem>> + Send>>;

/// Item produced by [`decode_frames`]
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeItem {
    /// Events completed by one transport chunk, in wire order
    Batch(Vec<StreamEvent>),
    /// The byte stream ended
    End {
        /// Trailing fragment that never completed
        dropped_fragment: Option<String>,
        stats: DecoderStats,
    },
}

/// Decode a byte stream into per-chunk batches of events.
///
/// Chunks that complete no frame produce no batch. The last item is always
/// `DecodeItem::End` unless the byte stream fails, in which case the error is
/// yielded and the stream stops.
pub fn decode_frames(bytes: ByteStream, mut decoder: FrameDecoder) -> FrameBatchStream {
    let stream = async_stream::stream! {
        for await chunk in bytes {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(into_transport_failure(e));
                    return;
                }
            };
            if chunk.is_empty() {
                continue;
            }

            let events = decoder.feed(&chunk);
            if !events.is_empty() {
                yield Ok(DecodeItem::Batch(events));
            }
        }

        let dropped_fragment = decoder.finish();
        yield Ok(DecodeItem::End {
            dropped_fragment,
            stats: decoder.stats(),
        });
    };

    Box::pin(stream)
}

/// Flatten a byte stream into the plain ordered sequence of events
pub fn decode_events(bytes: ByteStream) -> Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>> {
    let events = decode_frames(bytes, FrameDecoder::new())
        .map(|item| match item {
            Ok(DecodeItem::Batch(events)) => events.into_iter().map(Ok).collect::<Vec<_>>(),
            Ok(DecodeItem::End { .. }) => Vec::new(),
            Err(e) => vec![Err(e)],
        })
        .flat_map(futures::stream::iter);

    Box::pin(events)
}

/// Wrap in-memory chunks as a byte stream
pub fn byte_stream_from_chunks<I>(chunks: I) -> ByteStream
where
    I: IntoIterator<Item = Vec<u8>>,
    I::IntoIter: Send + 'static,
{
    Box::pin(futures::stream::iter(chunks.into_iter().map(Ok)))
}

fn into_transport_failure(err: ComposerError) -> ComposerError {
    match err {
        ComposerError::TransportFailure(_) => err,
        other => ComposerError::TransportFailure(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&str]) -> ByteStream {
        byte_stream_from_chunks(
            parts
                .iter()
                .map(|part| part.as_bytes().to_vec())
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_decode_frames_batches_per_chunk() {
        let stream = chunks(&["{\"message\":\"a\"}\r\n{\"message\":\"b\"}\r\n", "{\"artifact\":\"x\"}\r\n"]);
        let items: Vec<_> = decode_frames(stream, FrameDecoder::new()).collect().await;

        assert_eq!(items.len(), 3);
        match &items[0] {
            Ok(DecodeItem::Batch(events)) => assert_eq!(events.len(), 2),
            other => panic!("unexpected item: {:?}", other),
        }
        match &items[2] {
            Ok(DecodeItem::End {
                dropped_fragment,
                stats,
            }) => {
                assert!(dropped_fragment.is_none());
                assert_eq!(stats.frames_emitted, 3);
            }
            other => panic!("unexpected item: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_decode_frames_skips_chunks_without_frames() {
        let stream = chunks(&["{\"message\"", ":\"a\"}"]);
        let items: Vec<_> = decode_frames(stream, FrameDecoder::new()).collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], Ok(DecodeItem::Batch(events)) if events.len() == 1));
    }

    #[tokio::test]
    async fn test_decode_frames_reports_dropped_fragment() {
        let stream = chunks(&["{\"message\":\"partial"]);
        let items: Vec<_> = decode_frames(stream, FrameDecoder::new()).collect().await;
        assert_eq!(items.len(), 1);
        match &items[0] {
            Ok(DecodeItem::End {
                dropped_fragment, ..
            }) => assert_eq!(dropped_fragment.as_deref(), Some("{\"message\":\"partial")),
            other => panic!("unexpected item: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_decode_frames_stops_on_transport_error() {
        let parts: Vec<Result<Vec<u8>>> = vec![
            Ok(b"{\"message\":\"a\"}\r\n".to_vec()),
            Err(ComposerError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))),
            Ok(b"{\"message\":\"never\"}\r\n".to_vec()),
        ];
        let stream: ByteStream = Box::pin(futures::stream::iter(parts));
        let items: Vec<_> = decode_frames(stream, FrameDecoder::new()).collect().await;

        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(ComposerError::TransportFailure(_))));
    }

    #[tokio::test]
    async fn test_decode_events_flattens() {
        let stream = chunks(&["{\"message\":\"a\"}\r\n{\"arti", "fact\":\"b\"}\r\n"]);
        let events: Vec<_> = decode_events(stream)
            .map(|event| event.unwrap())
            .collect()
            .await;
        assert_eq!(
            events,
            vec![StreamEvent::message("a"), StreamEvent::artifact("b")]
        );
    }
}
