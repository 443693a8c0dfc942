//! Incremental frame reassembly for one connection.

use bytes::{Buf, Bytes, BytesMut};

use crate::codec::{peek_body_len, DEFAULT_MAX_BODY, LENGTH_PREFIX_SIZE};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Accumulates stream bytes and yields complete frame bodies.
///
/// Bytes leave the buffer only once a whole frame (prefix + body) is present,
/// so an incomplete frame is simply retried on the next [`feed`](Self::feed)
/// with nothing lost or duplicated. Each connection owns its own instance.
#[derive(Debug)]
pub struct StreamReassembler {
    pending: BytesMut,
    expected: Option<usize>,
    max_body: usize,
}

impl Default for StreamReassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamReassembler {
    /// Reassembler with the default body limit.
    pub fn new() -> Self {
        Self::with_max_body(DEFAULT_MAX_BODY)
    }

    /// Reassembler that rejects bodies larger than `max_body` bytes.
    pub fn with_max_body(max_body: usize) -> Self {
        Self {
            pending: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            expected: None,
            max_body,
        }
    }

    /// Append bytes without extracting anything.
    pub fn push(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Append bytes and return every body completed by them, in stream order.
    ///
    /// An empty vector means "waiting for more data". If an oversized prefix
    /// is hit after some bodies were completed, those bodies are returned and
    /// the error is reported by the next call.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.push(data);

        let mut bodies = Vec::new();
        loop {
            match self.next_body() {
                Ok(Some(body)) => bodies.push(body),
                Ok(None) => return Ok(bodies),
                Err(err) if bodies.is_empty() => return Err(err),
                Err(_) => return Ok(bodies),
            }
        }
    }

    /// Extract the next complete body, if one is buffered.
    pub fn next_body(&mut self) -> Result<Option<Bytes>> {
        let body_len = match self.expected {
            Some(len) => len,
            None => {
                let Some(len) = peek_body_len(&self.pending) else {
                    return Ok(None);
                };
                if len > self.max_body {
                    return Err(FrameError::FrameTooLarge {
                        size: len,
                        max: self.max_body,
                    });
                }
                self.expected = Some(len);
                len
            }
        };

        if self.pending.len() < LENGTH_PREFIX_SIZE + body_len {
            return Ok(None);
        }

        self.pending.advance(LENGTH_PREFIX_SIZE);
        let body = self.pending.split_to(body_len).freeze();
        self.expected = None;
        Ok(Some(body))
    }

    /// Bytes buffered but not yet part of a completed body.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Body length of the frame in progress, once its prefix has arrived.
    pub fn expected_body_len(&self) -> Option<usize> {
        self.expected
    }

    /// Whether the buffer sits exactly on a frame boundary.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// Discard any partial frame.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.expected = None;
    }

    /// Current body limit.
    pub fn max_body(&self) -> usize {
        self.max_body
    }

    /// Change the body limit for frames whose prefix has not been read yet.
    pub fn set_max_body(&mut self, max_body: usize) {
        self.max_body = max_body;
    }
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, BytesMut};
    use proptest::prelude::*;

    use super::*;
    use crate::codec::{decode_body, Frame};
    use crate::header::HEADER_SIZE;
    use crate::kind::FrameKind;

    fn wire(frame: &Frame) -> Vec<u8> {
        frame.encode().unwrap().to_vec()
    }

    #[test]
    fn single_frame_in_one_feed() {
        let frame = Frame::message("hello");
        let mut reassembler = StreamReassembler::new();

        let bodies = reassembler.feed(&wire(&frame)).unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(decode_body(bodies[0].clone()).unwrap(), frame);
        assert!(reassembler.is_idle());
    }

    #[test]
    fn partial_payload_waits_then_completes() {
        let frame = Frame::attachment("a.txt", (0u8..10).collect::<Vec<_>>()).unwrap();
        let bytes = wire(&frame);
        assert_eq!(&bytes[..4], &138u32.to_be_bytes());

        // prefix + header + 4 of 10 payload bytes
        let split = LENGTH_PREFIX_SIZE + HEADER_SIZE + 4;
        let mut reassembler = StreamReassembler::new();

        assert!(reassembler.feed(&bytes[..split]).unwrap().is_empty());
        assert_eq!(reassembler.pending_len(), split);
        assert_eq!(reassembler.expected_body_len(), Some(138));

        let bodies = reassembler.feed(&bytes[split..]).unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].as_ref(), &bytes[LENGTH_PREFIX_SIZE..]);
        assert!(reassembler.is_idle());
        assert_eq!(reassembler.expected_body_len(), None);
    }

    #[test]
    fn partial_prefix_waits() {
        let bytes = wire(&Frame::message("x"));
        let mut reassembler = StreamReassembler::new();

        assert!(reassembler.feed(&bytes[..2]).unwrap().is_empty());
        assert_eq!(reassembler.expected_body_len(), None);
        assert!(reassembler.feed(&bytes[2..3]).unwrap().is_empty());
        assert_eq!(reassembler.feed(&bytes[3..]).unwrap().len(), 1);
    }

    #[test]
    fn byte_at_a_time() {
        let frame = Frame::message("one byte at a time");
        let bytes = wire(&frame);
        let mut reassembler = StreamReassembler::new();

        let mut bodies = Vec::new();
        for b in &bytes {
            bodies.extend(reassembler.feed(std::slice::from_ref(b)).unwrap());
        }

        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].as_ref(), &bytes[LENGTH_PREFIX_SIZE..]);
    }

    #[test]
    fn pipelined_frames_in_one_feed() {
        let first = Frame::message("first");
        let second = Frame::attachment("b.bin", vec![0xAB; 32]).unwrap();
        let mut bytes = wire(&first);
        bytes.extend(wire(&second));

        let mut reassembler = StreamReassembler::new();
        let bodies = reassembler.feed(&bytes).unwrap();

        assert_eq!(bodies.len(), 2);
        assert_eq!(decode_body(bodies[0].clone()).unwrap(), first);
        assert_eq!(decode_body(bodies[1].clone()).unwrap(), second);
    }

    #[test]
    fn complete_frame_followed_by_partial() {
        let mut bytes = wire(&Frame::message("done"));
        let tail = wire(&Frame::message("later"));
        bytes.extend_from_slice(&tail[..7]);

        let mut reassembler = StreamReassembler::new();
        assert_eq!(reassembler.feed(&bytes).unwrap().len(), 1);
        assert_eq!(reassembler.pending_len(), 7);

        let bodies = reassembler.feed(&tail[7..]).unwrap();
        assert_eq!(decode_body(bodies[0].clone()).unwrap().text(), "later");
    }

    #[test]
    fn oversized_prefix_rejected() {
        let mut bytes = BytesMut::new();
        bytes.put_u32(1024);
        let mut reassembler = StreamReassembler::with_max_body(512);

        let err = reassembler.feed(&bytes).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { size: 1024, max: 512 }));
    }

    #[test]
    fn oversized_prefix_after_good_frame_reported_next() {
        let mut bytes = wire(&Frame::message("ok"));
        bytes.extend_from_slice(&u32::MAX.wrapping_sub(1).to_be_bytes());
        let mut reassembler = StreamReassembler::with_max_body(1024);

        assert_eq!(reassembler.feed(&bytes).unwrap().len(), 1);
        assert!(matches!(
            reassembler.feed(&[]),
            Err(FrameError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn malformed_body_keeps_stream_aligned() {
        let mut bytes = BytesMut::new();
        bytes.put_u32(3);
        bytes.put_slice(b"bad");
        bytes.put_slice(&wire(&Frame::message("good")));

        let mut reassembler = StreamReassembler::new();
        let bodies = reassembler.feed(&bytes).unwrap();
        assert_eq!(bodies.len(), 2);
        assert!(decode_body(bodies[0].clone()).is_err());
        assert_eq!(decode_body(bodies[1].clone()).unwrap().kind, FrameKind::Message);
    }

    #[test]
    fn clear_discards_partial_frame() {
        let bytes = wire(&Frame::message("discard me"));
        let mut reassembler = StreamReassembler::new();
        reassembler.feed(&bytes[..10]).unwrap();

        reassembler.clear();
        assert!(reassembler.is_idle());
        assert_eq!(reassembler.expected_body_len(), None);
        assert_eq!(reassembler.feed(&bytes).unwrap().len(), 1);
    }

    proptest! {
        #[test]
        fn any_chunking_yields_identical_body(
            payload in proptest::collection::vec(any::<u8>(), 0..2048),
            cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..16),
        ) {
            let frame = Frame::attachment("p.bin", payload).unwrap();
            let bytes = wire(&frame);

            let mut points: Vec<usize> = cuts.iter().map(|i| i.index(bytes.len())).collect();
            points.push(0);
            points.push(bytes.len());
            points.sort_unstable();
            points.dedup();

            let mut reassembler = StreamReassembler::new();
            let mut bodies = Vec::new();
            for pair in points.windows(2) {
                bodies.extend(reassembler.feed(&bytes[pair[0]..pair[1]]).unwrap());
            }

            prop_assert_eq!(bodies.len(), 1);
            prop_assert_eq!(bodies[0].as_ref(), &bytes[LENGTH_PREFIX_SIZE..]);
            prop_assert!(reassembler.is_idle());
        }

        #[test]
        fn back_to_back_frames_keep_order(
            texts in proptest::collection::vec("[a-z ]{0,40}", 1..8),
        ) {
            let mut bytes = Vec::new();
            for text in &texts {
                bytes.extend(wire(&Frame::message(text.clone())));
            }

            let mut reassembler = StreamReassembler::new();
            let decoded: Vec<String> = reassembler
                .feed(&bytes)
                .unwrap()
                .into_iter()
                .map(|body| decode_body(body).unwrap().text().into_owned())
                .collect();

            prop_assert_eq!(decoded, texts);
        }
    }
}
