// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Message types and the frame encoding used inside the queue's byte ring.
//!
//! A frame is a 16-byte little-endian header (`what`, `arg1`, `arg2`,
//! `payload_len`, each an `i32`) followed by the payload bytes, zero-padded
//! so every frame starts on a 4-byte boundary.

/// Size of the encoded frame header in bytes.
pub const FRAME_HEADER_LEN: usize = 16;

/// Frames are padded so each one starts on this boundary.
pub(crate) const FRAME_ALIGN: usize = 4;

/// Total encoded size of a frame carrying `payload_len` payload bytes.
pub(crate) fn frame_len(payload_len: usize) -> usize {
    (FRAME_HEADER_LEN + payload_len + FRAME_ALIGN - 1) & !(FRAME_ALIGN - 1)
}

/// Largest payload whose frame fits in a buffer of `capacity` bytes.
pub(crate) fn max_payload_for(capacity: usize) -> usize {
    (capacity & !(FRAME_ALIGN - 1)).saturating_sub(FRAME_HEADER_LEN)
}

/// A queued message: three integer arguments and an opaque payload.
///
/// An empty payload means "no payload"; the queue never inspects the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message kind, interpreted by the delivery side.
    pub what: i32,
    /// First argument.
    pub arg1: i32,
    /// Second argument.
    pub arg2: i32,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
}

impl Message {
    /// Create a message without a payload.
    pub fn new(what: i32, arg1: i32, arg2: i32) -> Self {
        Self {
            what,
            arg1,
            arg2,
            payload: Vec::new(),
        }
    }

    /// Create a message carrying a payload.
    pub fn with_payload(what: i32, arg1: i32, arg2: i32, payload: Vec<u8>) -> Self {
        Self {
            what,
            arg1,
            arg2,
            payload,
        }
    }

    /// Encoded size of this message's frame in the ring.
    pub fn frame_len(&self) -> usize {
        frame_len(self.payload.len())
    }

    /// Borrow as the form handed to delivery callbacks.
    pub fn as_ref(&self) -> MessageRef<'_> {
        MessageRef {
            what: self.what,
            arg1: self.arg1,
            arg2: self.arg2,
            payload: &self.payload,
        }
    }
}

/// Borrowed view of a message, valid for one delivery callback invocation.
///
/// The payload borrows the consumer's scratch buffer; copy it out if it must
/// outlive the callback.
#[derive(Debug, Clone, Copy)]
pub struct MessageRef<'a> {
    /// Message kind.
    pub what: i32,
    /// First argument.
    pub arg1: i32,
    /// Second argument.
    pub arg2: i32,
    /// Payload bytes; empty when the message carries none.
    pub payload: &'a [u8],
}

/// Decoded frame header, returned by the queue's pop operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Message kind.
    pub what: i32,
    /// First argument.
    pub arg1: i32,
    /// Second argument.
    pub arg2: i32,
    /// Payload length in bytes.
    pub payload_len: usize,
}

pub(crate) fn encode_header(
    what: i32,
    arg1: i32,
    arg2: i32,
    payload_len: usize,
) -> [u8; FRAME_HEADER_LEN] {
    let mut raw = [0u8; FRAME_HEADER_LEN];
    raw[0..4].copy_from_slice(&what.to_le_bytes());
    raw[4..8].copy_from_slice(&arg1.to_le_bytes());
    raw[8..12].copy_from_slice(&arg2.to_le_bytes());
    raw[12..16].copy_from_slice(&(payload_len as i32).to_le_bytes());
    raw
}

pub(crate) fn decode_header(raw: &[u8; FRAME_HEADER_LEN]) -> FrameInfo {
    let what = i32::from_le_bytes(raw[0..4].try_into().unwrap());
    let arg1 = i32::from_le_bytes(raw[4..8].try_into().unwrap());
    let arg2 = i32::from_le_bytes(raw[8..12].try_into().unwrap());
    let payload_len = i32::from_le_bytes(raw[12..16].try_into().unwrap());
    // Push validates lengths before encoding; a negative value here means
    // the ring was corrupted outside this crate.
    debug_assert!(payload_len >= 0);
    FrameInfo {
        what,
        arg1,
        arg2,
        payload_len: payload_len as usize,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let raw = encode_header(7, -1, i32::MAX, 513);
        let info = decode_header(&raw);
        assert_eq!(info.what, 7);
        assert_eq!(info.arg1, -1);
        assert_eq!(info.arg2, i32::MAX);
        assert_eq!(info.payload_len, 513);
    }

    #[test]
    fn frame_len_rounds_to_alignment() {
        assert_eq!(frame_len(0), 16);
        assert_eq!(frame_len(1), 20);
        assert_eq!(frame_len(4), 20);
        assert_eq!(frame_len(100), 116);
        assert_eq!(frame_len(700), 716);
    }

    #[test]
    fn max_payload_accounts_for_header_and_alignment() {
        assert_eq!(max_payload_for(1024), 1008);
        // A capacity that is not a multiple of the alignment loses the
        // unusable tail bytes.
        assert_eq!(max_payload_for(1022), 1004);
        assert_eq!(max_payload_for(16), 0);
    }

    #[test]
    fn message_frame_len_matches_codec() {
        let msg = Message::with_payload(1, 2, 3, vec![0u8; 100]);
        assert_eq!(msg.frame_len(), 116);
        assert_eq!(Message::new(1, 2, 3).frame_len(), FRAME_HEADER_LEN);
    }
}
