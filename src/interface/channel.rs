// src/interface/channel.rs
// Teleoperation command channel: frames a raw byte stream and decodes each
// frame into a `Command`.
//
// The stream carries 4-character ASCII tokens (`Stop`, `Forw`, `Back`, `Left`,
// `Righ`). A frame is either a fixed number of bytes or everything up to a
// delimiter; the frame size never depends on what was read before.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, TryRecvError};

use crate::RoverError;

/// Length of every wire token
pub const TOKEN_LEN: usize = 4;

/// Longest delimited frame accepted; longer runs are discarded whole
pub const MAX_FRAME_LEN: usize = 64;

const TOKENS: [(&[u8; TOKEN_LEN], Command); 5] = [
    (b"Stop", Command::Stop),
    (b"Forw", Command::Forward),
    (b"Back", Command::Backward),
    (b"Left", Command::RotateLeft),
    (b"Righ", Command::RotateRight),
];

/// Teleoperation command decoded from one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Halt both motors
    Stop,
    /// Drive forward, subject to proximity gating
    Forward,
    /// Drive backward
    Backward,
    /// Rotate in place counter-clockwise
    RotateLeft,
    /// Rotate in place clockwise
    RotateRight,
    /// Frame carried no recognised token
    Unknown,
}

impl Command {
    /// Decode a frame by token containment; the first token found in table
    /// order wins and anything else is `Unknown`
    pub fn decode(frame: &[u8]) -> Self {
        TOKENS
            .iter()
            .find(|(token, _)| frame.windows(TOKEN_LEN).any(|window| window == &token[..]))
            .map(|(_, command)| *command)
            .unwrap_or(Command::Unknown)
    }

    /// Wire token for this command, `None` for `Unknown`
    pub fn token(self) -> Option<&'static str> {
        match self {
            Command::Stop => Some("Stop"),
            Command::Forward => Some("Forw"),
            Command::Backward => Some("Back"),
            Command::RotateLeft => Some("Left"),
            Command::RotateRight => Some("Righ"),
            Command::Unknown => None,
        }
    }
}

/// How the byte stream is cut into frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Framing {
    /// Every frame is exactly `len` bytes
    Fixed {
        /// Frame length in bytes
        len: usize,
    },
    /// Frames end at `delimiter`, which is not part of the frame
    Delimited {
        /// Terminating byte, usually `b'\n'`
        delimiter: u8,
    },
}

impl Default for Framing {
    fn default() -> Self {
        Framing::Fixed { len: TOKEN_LEN }
    }
}

/// Accumulates stream bytes and yields complete frames
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    framing: Framing,
    pending: VecDeque<u8>,
}

impl FrameDecoder {
    /// Create an empty decoder
    pub fn new(framing: Framing) -> Self {
        FrameDecoder {
            framing,
            pending: VecDeque::new(),
        }
    }

    /// Append raw stream bytes
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes);
        if let Framing::Delimited { delimiter } = self.framing {
            // An undelimited run this long can never become a valid frame.
            if self.pending.len() > MAX_FRAME_LEN && !self.pending.contains(&delimiter) {
                let excess = self.pending.len() - MAX_FRAME_LEN;
                warn!("Discarding {} undelimited command bytes", excess);
                self.pending.drain(..excess);
            }
        }
    }

    /// Take the next complete frame, if one is buffered
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        match self.framing {
            Framing::Fixed { len } => {
                if self.pending.len() < len {
                    return None;
                }
                self.realign(len);
                if self.pending.len() < len {
                    return None;
                }
                Some(self.pending.drain(..len).collect())
            }
            Framing::Delimited { delimiter } => loop {
                let end = self.pending.iter().position(|&b| b == delimiter)?;
                let frame: Vec<u8> = self.pending.drain(..end).collect();
                self.pending.pop_front();
                if frame.len() <= MAX_FRAME_LEN {
                    return Some(frame);
                }
                warn!("Discarding oversized {}-byte command frame", frame.len());
            },
        }
    }

    // A fixed frame with no token in it usually means a stray byte shifted the
    // stream. Skip ahead to the first offset where a token starts (or could
    // start, if the rest has not arrived yet). A frame with no such offset is
    // left in place and decodes as `Unknown`.
    fn realign(&mut self, len: usize) {
        let bytes = self.pending.make_contiguous();
        if Command::decode(&bytes[..len]) != Command::Unknown {
            return;
        }
        let skip = (1..len).find(|&offset| {
            let rest = &bytes[offset..bytes.len().min(offset + TOKEN_LEN)];
            TOKENS.iter().any(|(token, _)| token.starts_with(rest))
        });
        if let Some(skip) = skip {
            debug!("Skipping {} stray command bytes", skip);
            self.pending.drain(..skip);
        }
    }

    /// Number of buffered bytes not yet framed
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Drop any partial frame
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Non-blocking source of raw channel bytes
pub trait ByteSource {
    /// Append every byte currently available to `buf` and return how many were
    /// added; `Ok(0)` means nothing is waiting
    fn read_available(&mut self, buf: &mut Vec<u8>) -> std::io::Result<usize>;
}

impl ByteSource for Receiver<Vec<u8>> {
    fn read_available(&mut self, buf: &mut Vec<u8>) -> std::io::Result<usize> {
        let mut added = 0;
        loop {
            match self.try_recv() {
                Ok(chunk) => {
                    added += chunk.len();
                    buf.extend_from_slice(&chunk);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Ok(added),
            }
        }
    }
}

/// A teleoperation command source that can be released while the rover is
/// driving itself and re-acquired for manual control
pub trait CommandChannel {
    /// Start accepting commands; bytes that arrived while released are dropped
    fn acquire(&mut self) -> Result<(), RoverError>;
    /// Stop accepting commands and discard anything buffered
    fn release(&mut self);
    /// Whether the channel is currently acquired
    fn is_open(&self) -> bool;
    /// Decode at most one command; `Ok(None)` when no full frame is waiting or
    /// the channel is released
    fn poll(&mut self) -> Result<Option<Command>, RoverError>;
}

/// Command channel over a framed byte source
pub struct FramedChannel<S: ByteSource> {
    source: S,
    decoder: FrameDecoder,
    scratch: Vec<u8>,
    open: bool,
}

impl<S: ByteSource> FramedChannel<S> {
    /// Wrap a byte source; the channel starts released
    pub fn new(source: S, framing: Framing) -> Self {
        FramedChannel {
            source,
            decoder: FrameDecoder::new(framing),
            scratch: Vec::with_capacity(MAX_FRAME_LEN),
            open: false,
        }
    }

    fn drain_source(&mut self) -> Result<usize, RoverError> {
        self.scratch.clear();
        self.source
            .read_available(&mut self.scratch)
            .map_err(|e| RoverError::ChannelError(format!("read failed: {}", e)))
    }
}

impl<S: ByteSource> CommandChannel for FramedChannel<S> {
    fn acquire(&mut self) -> Result<(), RoverError> {
        let stale = self.drain_source()?;
        if stale > 0 {
            debug!("Dropped {} stale command bytes on acquire", stale);
        }
        self.decoder.clear();
        self.open = true;
        Ok(())
    }

    fn release(&mut self) {
        // Read errors while shutting the channel down carry no information.
        let _ = self.drain_source();
        self.decoder.clear();
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn poll(&mut self) -> Result<Option<Command>, RoverError> {
        if !self.open {
            return Ok(None);
        }
        if self.drain_source()? > 0 {
            self.decoder.push(&self.scratch);
        }
        Ok(self.decoder.next_frame().map(|frame| {
            let command = Command::decode(&frame);
            if command == Command::Unknown {
                debug!("Ignoring unrecognised frame {:?}", String::from_utf8_lossy(&frame));
            }
            command
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn fixed_frames_split_a_run_of_tokens() {
        let mut decoder = FrameDecoder::new(Framing::default());
        decoder.push(b"ForwBa");
        assert_eq!(decoder.next_frame().as_deref(), Some(&b"Forw"[..]));
        assert_eq!(decoder.next_frame(), None);
        assert_eq!(decoder.buffered(), 2);
        decoder.push(b"ck");
        assert_eq!(decoder.next_frame().as_deref(), Some(&b"Back"[..]));
    }

    #[test]
    fn delimited_frames_drop_the_delimiter() {
        let mut decoder = FrameDecoder::new(Framing::Delimited { delimiter: b'\n' });
        decoder.push(b"GET /Left HTTP\nSt");
        assert_eq!(decoder.next_frame().as_deref(), Some(&b"GET /Left HTTP"[..]));
        assert_eq!(decoder.next_frame(), None);
    }

    #[test]
    fn undelimited_garbage_is_bounded() {
        let mut decoder = FrameDecoder::new(Framing::Delimited { delimiter: b'\n' });
        decoder.push(&[b'x'; MAX_FRAME_LEN * 2]);
        assert_eq!(decoder.buffered(), MAX_FRAME_LEN);
    }

    #[test]
    fn oversized_delimited_frame_is_dropped() {
        let mut decoder = FrameDecoder::new(Framing::Delimited { delimiter: b'\n' });
        let mut stream = vec![b'F'; 10 * 1024];
        stream.extend_from_slice(b"\nStop\n");
        decoder.push(&stream);
        assert_eq!(decoder.next_frame().as_deref(), Some(&b"Stop"[..]));
        assert_eq!(decoder.next_frame(), None);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn stray_byte_does_not_shift_later_frames() {
        let mut decoder = FrameDecoder::new(Framing::default());
        decoder.push(b"xForwSt");
        assert_eq!(decoder.next_frame().as_deref(), Some(&b"Forw"[..]));
        assert_eq!(decoder.next_frame(), None);
        decoder.push(b"opzRigh");
        assert_eq!(decoder.next_frame().as_deref(), Some(&b"Stop"[..]));
        assert_eq!(decoder.next_frame().as_deref(), Some(&b"Righ"[..]));
    }

    #[test]
    fn tokenless_fixed_frame_still_decodes_unknown() {
        let mut decoder = FrameDecoder::new(Framing::default());
        decoder.push(b"zzzz");
        let frame = decoder.next_frame().unwrap();
        assert_eq!(Command::decode(&frame), Command::Unknown);
    }

    #[test]
    fn released_channel_discards_traffic() {
        let (tx, rx) = mpsc::channel();
        let mut channel = FramedChannel::new(rx, Framing::default());
        tx.send(b"Forw".to_vec()).unwrap();
        assert_eq!(channel.poll().unwrap(), None);

        channel.acquire().unwrap();
        assert_eq!(channel.poll().unwrap(), None);

        tx.send(b"Stop".to_vec()).unwrap();
        assert_eq!(channel.poll().unwrap(), Some(Command::Stop));
    }
}
