// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Length-prefix framing for TCPROS streams.
//!
//! ```text
//! +----------------+-------------------+
//! | Length (4B LE) | Message body      |
//! +----------------+-------------------+
//! ```
//!
//! Transports read with a short socket timeout so they can notice closure.
//! The decoder therefore keeps partial-read state: a timeout in the middle
//! of a frame returns `Ok(None)` and the next call resumes where it left off.
//!
//! # Example
//!
//! ```
//! use roswire::tcpros::FrameCodec;
//!
//! let frame = FrameCodec::encode(b"hello");
//! assert_eq!(&frame[..4], &5u32.to_le_bytes());
//!
//! let mut codec = FrameCodec::new(1024);
//! let mut reader = &frame[..];
//! assert_eq!(codec.decode(&mut reader).unwrap(), Some(b"hello".to_vec()));
//! ```

use std::io::{self, Read};

/// Frame header size (4 bytes for length).
pub const FRAME_HEADER_SIZE: usize = 4;

/// Incremental decoder for one stream.
#[derive(Debug)]
pub struct FrameCodec {
    state: ReadState,
    buffer: Vec<u8>,
    max_size: usize,
    frames_decoded: u64,
    frames_rejected: u64,
}

#[derive(Debug, Clone, Copy)]
enum ReadState {
    ReadingLength { bytes_read: usize },
    ReadingBody { expected_len: usize, bytes_read: usize },
}

impl Default for ReadState {
    fn default() -> Self {
        ReadState::ReadingLength { bytes_read: 0 }
    }
}

/// Whether `err` is a read timeout rather than a failure.
pub(crate) fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

impl FrameCodec {
    /// Create a decoder rejecting frames larger than `max_size`.
    pub fn new(max_size: usize) -> Self {
        Self {
            state: ReadState::default(),
            buffer: vec![0u8; FRAME_HEADER_SIZE],
            max_size,
            frames_decoded: 0,
            frames_rejected: 0,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    pub fn frames_rejected(&self) -> u64 {
        self.frames_rejected
    }

    /// Whether a frame is partially read.
    pub fn is_partial(&self) -> bool {
        match self.state {
            ReadState::ReadingLength { bytes_read } => bytes_read > 0,
            ReadState::ReadingBody { .. } => true,
        }
    }

    /// Encode `[length: u32 LE][payload]`.
    pub fn encode(payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        Self::encode_into(payload, &mut frame);
        frame
    }

    /// Append `[length: u32 LE][payload]` to `buf`.
    pub fn encode_into(payload: &[u8], buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(payload);
    }

    /// Read until one frame completes.
    ///
    /// - `Ok(Some(body))` - a frame completed
    /// - `Ok(None)` - the read timed out; call again to resume
    /// - `Err(e)` - EOF, oversized frame or socket failure
    pub fn decode<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<Option<Vec<u8>>> {
        loop {
            match self.state {
                ReadState::ReadingLength { bytes_read } => {
                    match reader.read(&mut self.buffer[bytes_read..FRAME_HEADER_SIZE]) {
                        Ok(0) => {
                            let msg = if bytes_read == 0 {
                                "connection closed"
                            } else {
                                "incomplete frame header"
                            };
                            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, msg));
                        }
                        Ok(n) => {
                            let total = bytes_read + n;
                            if total < FRAME_HEADER_SIZE {
                                self.state = ReadState::ReadingLength { bytes_read: total };
                                continue;
                            }

                            let len = u32::from_le_bytes([
                                self.buffer[0],
                                self.buffer[1],
                                self.buffer[2],
                                self.buffer[3],
                            ]) as usize;

                            if len > self.max_size {
                                self.frames_rejected += 1;
                                self.state = ReadState::default();
                                return Err(io::Error::new(
                                    io::ErrorKind::InvalidData,
                                    format!("frame too large: {} bytes (max {})", len, self.max_size),
                                ));
                            }

                            if len == 0 {
                                self.frames_decoded += 1;
                                self.state = ReadState::default();
                                return Ok(Some(Vec::new()));
                            }

                            self.buffer.resize(len, 0);
                            self.state = ReadState::ReadingBody {
                                expected_len: len,
                                bytes_read: 0,
                            };
                        }
                        Err(e) if is_timeout(&e) => {
                            self.state = ReadState::ReadingLength { bytes_read };
                            return Ok(None);
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(e),
                    }
                }

                ReadState::ReadingBody {
                    expected_len,
                    bytes_read,
                } => match reader.read(&mut self.buffer[bytes_read..expected_len]) {
                    Ok(0) => {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "incomplete frame body",
                        ));
                    }
                    Ok(n) => {
                        let total = bytes_read + n;
                        if total < expected_len {
                            self.state = ReadState::ReadingBody {
                                expected_len,
                                bytes_read: total,
                            };
                            continue;
                        }

                        let body = std::mem::replace(&mut self.buffer, vec![0u8; FRAME_HEADER_SIZE]);
                        self.frames_decoded += 1;
                        self.state = ReadState::default();
                        return Ok(Some(body));
                    }
                    Err(e) if is_timeout(&e) => return Ok(None),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reader handing out at most `chunk` bytes, then a timeout, per call pair.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
        stall: bool,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.stall {
                self.stall = false;
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "timeout"));
            }
            self.stall = true;
            let n = self.chunk.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_encode_le() {
        let frame = FrameCodec::encode(&[1, 2, 3]);
        assert_eq!(frame, vec![3, 0, 0, 0, 1, 2, 3]);
    }

    #[test]
    fn test_decode_sequence() {
        let mut data = FrameCodec::encode(b"first");
        FrameCodec::encode_into(b"", &mut data);
        FrameCodec::encode_into(b"third", &mut data);

        let mut codec = FrameCodec::new(64);
        let mut reader = &data[..];
        assert_eq!(codec.decode(&mut reader).unwrap(), Some(b"first".to_vec()));
        assert_eq!(codec.decode(&mut reader).unwrap(), Some(Vec::new()));
        assert_eq!(codec.decode(&mut reader).unwrap(), Some(b"third".to_vec()));
        assert_eq!(codec.frames_decoded(), 3);

        let err = codec.decode(&mut reader).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_decode_resumes_after_timeouts() {
        let payload: Vec<u8> = (0..40u8).collect();
        let mut reader = Trickle {
            data: FrameCodec::encode(&payload),
            pos: 0,
            chunk: 3,
            stall: false,
        };
        let mut codec = FrameCodec::new(64);

        let mut timeouts = 0;
        let frame = loop {
            match codec.decode(&mut reader).unwrap() {
                Some(frame) => break frame,
                None => {
                    timeouts += 1;
                    assert!(codec.is_partial());
                }
            }
        };
        assert_eq!(frame, payload);
        assert!(timeouts > 1);
        assert!(!codec.is_partial());
    }

    #[test]
    fn test_decode_rejects_oversized() {
        let data = FrameCodec::encode(&[0u8; 100]);
        let mut codec = FrameCodec::new(10);
        let err = codec.decode(&mut &data[..]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(codec.frames_rejected(), 1);
    }

    #[test]
    fn test_truncated_body() {
        let data = FrameCodec::encode(b"truncated");
        let mut codec = FrameCodec::new(64);
        let err = codec.decode(&mut &data[..7]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
