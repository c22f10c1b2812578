use bytes::Bytes;
use futures::Stream;
use futures::StreamExt;
use futures::pin_mut;
use tracing::debug;
use tracing::warn;

use leadscout_protocol::StreamEvent;
use leadscout_protocol::parse_frame_payload;

use crate::error::BackendError;

const FRAME_DELIMITER: &[u8] = b"\n\n";
const FIELD_PREFIX: &str = "data:";

/// Reassembles blank-line-delimited frames from byte chunks of arbitrary,
/// boundary-unaligned granularity.
///
/// The split happens at byte level so a multi-byte UTF-8 sequence cut in
/// half by a chunk boundary is stitched back together before decoding.
/// The frame sequence produced is independent of how the underlying bytes
/// were chunked.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    // Offset into `buf` below which no delimiter start can exist.
    scan_from: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk and return every frame it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.find_delimiter() {
            let segment: Vec<u8> = self.buf.drain(..pos + FRAME_DELIMITER.len()).collect();
            self.scan_from = 0;
            let segment = &segment[..pos];
            if segment.is_empty() {
                continue;
            }
            match std::str::from_utf8(segment) {
                Ok(text) => frames.push(text.to_string()),
                Err(err) => warn!("dropping frame with invalid utf-8: {err}"),
            }
        }
        frames
    }

    /// End of stream. A trailing partial frame is discarded: it is "no
    /// event", never an error.
    pub fn finish(self) {
        if !self.buf.is_empty() {
            debug!(
                "discarding {} trailing bytes without frame delimiter",
                self.buf.len()
            );
        }
    }

    fn find_delimiter(&mut self) -> Option<usize> {
        let found = self
            .buf
            .windows(FRAME_DELIMITER.len())
            .skip(self.scan_from)
            .position(|window| window == FRAME_DELIMITER)
            .map(|offset| self.scan_from + offset);
        if found.is_none() {
            // The last byte could still start a delimiter once the next
            // chunk arrives.
            self.scan_from = self.buf.len().saturating_sub(FRAME_DELIMITER.len() - 1);
        }
        found
    }
}

/// Strip the field prefix and parse one frame into an event.
///
/// Returns `None` for frames that must be skipped: unknown discriminators
/// (forward compatibility) and malformed frames (logged, never fatal to
/// the stream).
fn decode_frame(frame: &str) -> Option<StreamEvent> {
    let Some(payload) = frame.trim_start().strip_prefix(FIELD_PREFIX) else {
        warn!("dropping frame without `{FIELD_PREFIX}` prefix");
        return None;
    };
    match parse_frame_payload(payload.strip_prefix(' ').unwrap_or(payload)) {
        Ok(Some(event)) => Some(event),
        Ok(None) => {
            debug!("ignoring frame with unknown event type");
            None
        }
        Err(err) => {
            warn!("dropping malformed frame: {err}");
            None
        }
    }
}

/// Lift a raw byte stream (one streaming HTTP response body) into a stream
/// of typed events. Transport errors end the stream with an error item;
/// per-frame problems are skipped per [`decode_frame`].
pub fn event_stream<S>(body: S) -> impl Stream<Item = Result<StreamEvent, BackendError>>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>>,
{
    async_stream::try_stream! {
        let mut decoder = FrameDecoder::new();
        pin_mut!(body);
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for frame in decoder.push(&chunk) {
                if let Some(event) = decode_frame(&frame) {
                    yield event;
                }
            }
        }
        decoder.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use pretty_assertions::assert_eq;

    fn decode_all(bytes: &[u8], chunk_size: usize) -> Vec<String> {
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for chunk in bytes.chunks(chunk_size) {
            frames.extend(decoder.push(chunk));
        }
        decoder.finish();
        frames
    }

    const WIRE: &[u8] = b"data: {\"type\":\"init\",\"total\":3}\n\n\
data: {\"type\":\"progress\",\"index\":0,\"total\":3}\n\n\
data: {\"type\":\"complete\",\"summary\":{\"hot\":1}}\n\n";

    #[test]
    fn chunk_boundary_independence() {
        let whole = decode_all(WIRE, WIRE.len());
        assert_eq!(whole.len(), 3);
        for chunk_size in [1, 2, 3, 5, 7, 16, 64] {
            assert_eq!(decode_all(WIRE, chunk_size), whole, "chunk size {chunk_size}");
        }
    }

    #[test]
    fn multibyte_utf8_survives_chunk_split() {
        let wire = "data: {\"type\":\"error\",\"error\":\"caf\u{e9} \u{1f50d}\"}\n\n".as_bytes();
        let whole = decode_all(wire, wire.len());
        for chunk_size in [1, 2, 3] {
            assert_eq!(decode_all(wire, chunk_size), whole, "chunk size {chunk_size}");
        }
    }

    #[test]
    fn trailing_partial_frame_is_discarded() {
        let mut wire = WIRE.to_vec();
        wire.extend_from_slice(b"data: {\"type\":\"result\"");
        assert_eq!(decode_all(&wire, 4).len(), 3);
    }

    #[test]
    fn delimiter_straddling_chunks_is_found() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: {\"type\":\"init\",\"total\":1}\n").is_empty());
        let frames = decoder.push(b"\ndata: x");
        assert_eq!(frames, vec!["data: {\"type\":\"init\",\"total\":1}".to_string()]);
    }

    #[test]
    fn empty_segments_between_delimiters_are_skipped() {
        let frames = decode_all(b"data: {\"type\":\"init\",\"total\":1}\n\n\n\ndata: {\"type\":\"init\",\"total\":2}\n\n", 8);
        assert_eq!(frames.len(), 2);
    }

    #[tokio::test]
    async fn event_stream_skips_malformed_and_unknown_frames() {
        let wire: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"type\":\"init\",\"total\":2}\n\n")),
            Ok(Bytes::from_static(b"data: {not json at all\n\n")),
            Ok(Bytes::from_static(b"data: {\"type\":\"heartbeat\"}\n\n")),
            Ok(Bytes::from_static(
                b"data: {\"type\":\"complete\",\"summary\":{\"hot\":2}}\n\n",
            )),
        ];
        let events: Vec<StreamEvent> = event_stream(futures::stream::iter(wire))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], StreamEvent::Init { total: 2 });
        assert!(matches!(events[1], StreamEvent::Complete { .. }));
    }

    #[tokio::test]
    async fn event_stream_preserves_order_across_one_byte_chunks() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = WIRE
            .iter()
            .map(|byte| Ok(Bytes::copy_from_slice(std::slice::from_ref(byte))))
            .collect();
        let events: Vec<StreamEvent> = event_stream(futures::stream::iter(chunks))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], StreamEvent::Init { total: 3 });
        assert!(matches!(events[2], StreamEvent::Complete { .. }));
    }
}
