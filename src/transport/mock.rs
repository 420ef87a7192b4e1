//! Mock transport that models a bridge target, used in testing the protocol

use super::ByteTransport;
use crate::codec::{self, Opcode};
use std::{
    collections::{HashMap, VecDeque},
    io,
};

/// One decoded command header, recorded so tests can assert exact framing
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: u8,
    pub len: u8,
    pub word_addr: u64,
}

/// A model peer holding word-addressed register state.
///
/// Command frames are parsed as the host writes them, even one byte at a
/// time; read commands queue their response words immediately. The mock can
/// be limited to short per-call reads and writes to exercise the host's
/// completion loops, and records every wire byte and frame header.
#[derive(Debug)]
pub struct Mock {
    open: bool,
    addr_bytes: usize,
    /// Largest number of bytes transferred per read/write call
    chunk: usize,
    memory: HashMap<u64, u32>,
    /// Command bytes received from the host, not yet parsed into a frame
    rx: Vec<u8>,
    /// Response bytes queued for the host
    tx: VecDeque<u8>,
    wire: Vec<u8>,
    frames: Vec<Frame>,
}

impl Mock {
    /// A model target expecting address fields of `addr_bytes` bytes
    #[must_use]
    pub fn new(addr_bytes: usize) -> Self {
        Self {
            open: false,
            addr_bytes,
            chunk: usize::MAX,
            memory: HashMap::new(),
            rx: Vec::new(),
            tx: VecDeque::new(),
            wire: Vec::new(),
            frames: Vec::new(),
        }
    }

    /// Limit every read and write call to at most `chunk` bytes
    #[must_use]
    pub fn with_chunk_limit(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self
    }

    /// Queue bytes as if a previous, desynchronized transaction left them
    /// unread on the host side
    pub fn push_stale(&mut self, bytes: &[u8]) {
        self.tx.extend(bytes);
    }

    /// Every byte the host has written, in order
    #[must_use]
    pub fn wire(&self) -> &[u8] {
        &self.wire
    }

    /// Every parsed command header, in order
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Model register state at a word address (unwritten words read as 0)
    #[must_use]
    pub fn word(&self, word_addr: u64) -> u32 {
        self.memory.get(&word_addr).copied().unwrap_or(0)
    }

    /// Directly seed model register state
    pub fn set_word(&mut self, word_addr: u64, value: u32) {
        self.memory.insert(word_addr, value);
    }

    /// Consume as many complete command frames as `rx` holds
    fn process(&mut self) {
        loop {
            let header = 2 + self.addr_bytes;
            if self.rx.len() < header {
                return;
            }
            let opcode = self.rx[0];
            let len = self.rx[1] as usize;
            assert!((1..=codec::MAX_BURST_WORDS).contains(&len), "burst length {len} out of range");
            let word_addr = codec::decode_address(&self.rx[2..header]);
            match opcode {
                op if op == Opcode::WriteBurstIncr as u8 || op == Opcode::WriteBurstFixed as u8 => {
                    if self.rx.len() < header + 4 * len {
                        return;
                    }
                    for i in 0..len {
                        let mut word = [0u8; 4];
                        word.copy_from_slice(&self.rx[header + 4 * i..header + 4 * i + 4]);
                        let target = if op == Opcode::WriteBurstIncr as u8 {
                            word_addr + i as u64
                        } else {
                            word_addr
                        };
                        self.memory.insert(target, codec::decode_word(word));
                    }
                    self.rx.drain(..header + 4 * len);
                }
                op if op == Opcode::ReadBurstIncr as u8 || op == Opcode::ReadBurstFixed as u8 => {
                    for i in 0..len {
                        let source = if op == Opcode::ReadBurstIncr as u8 {
                            word_addr + i as u64
                        } else {
                            word_addr
                        };
                        self.tx.extend(codec::encode_word(self.word(source)));
                    }
                    self.rx.drain(..header);
                }
                op => panic!("model target received unknown opcode 0x{op:02x}"),
            }
            self.frames.push(Frame {
                opcode,
                len: len as u8,
                word_addr,
            });
        }
    }
}

impl ByteTransport for Mock {
    fn open(&mut self) -> io::Result<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.open = false;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_open()?;
        assert!(
            !self.tx.is_empty() || buf.is_empty(),
            "host read with no response pending (desynchronized?)"
        );
        let n = buf.len().min(self.chunk).min(self.tx.len());
        for slot in &mut buf[..n] {
            *slot = self.tx.pop_front().unwrap_or(0);
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check_open()?;
        let n = buf.len().min(self.chunk);
        self.rx.extend_from_slice(&buf[..n]);
        self.wire.extend_from_slice(&buf[..n]);
        self.process();
        Ok(n)
    }

    fn bytes_to_read(&mut self) -> io::Result<usize> {
        self.check_open()?;
        Ok(self.tx.len())
    }
}

impl Mock {
    fn check_open(&self) -> io::Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "mock transport is not open",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_mock(addr_bytes: usize) -> Mock {
        let mut mock = Mock::new(addr_bytes);
        mock.open().unwrap();
        mock
    }

    #[test]
    fn test_write_frame_updates_memory() {
        let mut mock = open_mock(4);
        // write-incr, 2 words, word address 0x10
        mock.write(&[0x01, 0x02, 0x00, 0x00, 0x00, 0x10]).unwrap();
        mock.write(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x00, 0x00, 0x01])
            .unwrap();
        assert_eq!(mock.word(0x10), 0xDEAD_BEEF);
        assert_eq!(mock.word(0x11), 1);
        assert_eq!(
            mock.frames(),
            [Frame {
                opcode: 0x01,
                len: 2,
                word_addr: 0x10
            }]
        );
    }

    #[test]
    fn test_fixed_write_lands_on_one_word() {
        let mut mock = open_mock(2);
        mock.write(&[0x03, 0x02, 0x00, 0x08]).unwrap();
        mock.write(&[0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02])
            .unwrap();
        assert_eq!(mock.word(0x08), 2);
        assert_eq!(mock.word(0x09), 0);
    }

    #[test]
    fn test_read_frame_queues_response() {
        let mut mock = open_mock(4);
        mock.set_word(0x04, 0xCAFE_F00D);
        mock.write(&[0x02, 0x01, 0x00, 0x00, 0x00, 0x04]).unwrap();
        assert_eq!(mock.bytes_to_read().unwrap(), 4);
        let mut buf = [0u8; 4];
        assert_eq!(mock.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, [0xCA, 0xFE, 0xF0, 0x0D]);
    }

    #[test]
    fn test_frame_parsed_from_single_bytes() {
        let mut mock = open_mock(4).with_chunk_limit(1);
        let frame = [0x02u8, 0x01, 0x00, 0x00, 0x00, 0x00];
        for byte in frame {
            // short writes accept exactly one byte per call
            assert_eq!(mock.write(&[byte]).unwrap(), 1);
        }
        assert_eq!(mock.frames().len(), 1);
        assert_eq!(mock.bytes_to_read().unwrap(), 4);
    }

    #[test]
    fn test_closed_mock_rejects_io() {
        let mut mock = Mock::new(4);
        assert!(mock.write(&[0x01]).is_err());
        assert!(mock.bytes_to_read().is_err());
    }
}
