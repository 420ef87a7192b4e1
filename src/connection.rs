//! The bridge connection: a reliable byte channel plus burst framing

use crate::codec::{self, BurstMode, Opcode, MAX_BURST_WORDS};
use crate::trace::{Direction, Tracer};
use crate::transport::ByteTransport;
use std::io;
use thiserror::Error;

/// Errors surfaced by bridge transactions
#[derive(Error, Debug)]
pub enum Error {
    /// The underlying transport failed to open, read or write. Not
    /// recoverable at this layer; the peer's framing state is unknown.
    #[error("transport error")]
    Transport(#[from] io::Error),
    /// An operation was attempted on a connection that is not open
    #[error("connection is not open")]
    Closed,
    /// The configured address width is unusable
    #[error("address width of {0} bits is not a positive multiple of 8")]
    BadAddressWidth(u32),
    /// A word address does not fit the configured address field
    #[error("word address 0x{0:x} does not fit in {1} address bytes")]
    AddressOutOfRange(u64, usize),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    Closed,
    Open,
}

/// A point-to-point bridge connection over a byte transport.
///
/// The connection owns its transport exclusively. All operations block, and
/// the channel is a single ordered byte stream with no request identifiers,
/// so only one transaction may be in flight at a time; callers needing
/// concurrent access must serialize externally.
///
/// Addresses are byte addresses; the wire carries the word address
/// (`addr / 4`), so sub-word addressing is not representable and the low two
/// bits of an unaligned address are dropped.
pub struct Connection<T> {
    transport: T,
    state: State,
    addr_bytes: usize,
    tracer: Option<Tracer>,
}

impl<T: ByteTransport> Connection<T> {
    /// Wrap `transport` in a connection with a given address width in bits.
    /// The width is fixed for the lifetime of the connection and sizes the
    /// address field of every command.
    ///
    /// # Errors
    /// Returns [`Error::BadAddressWidth`] unless `addr_width` is a positive
    /// multiple of 8.
    pub fn new(transport: T, addr_width: u32) -> Result<Self> {
        if addr_width == 0 || addr_width % 8 != 0 {
            return Err(Error::BadAddressWidth(addr_width));
        }
        Ok(Self {
            transport,
            state: State::Closed,
            addr_bytes: (addr_width / 8) as usize,
            tracer: None,
        })
    }

    /// Log every transferred word through `tracer`
    #[must_use]
    pub fn with_tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Open the underlying transport. No-op when already open.
    ///
    /// # Errors
    /// Propagates transport open failures.
    pub fn open(&mut self) -> Result<()> {
        if self.state == State::Open {
            return Ok(());
        }
        self.transport.open()?;
        self.state = State::Open;
        Ok(())
    }

    /// Close the underlying transport. No-op when already closed.
    ///
    /// # Errors
    /// Propagates transport close failures.
    pub fn close(&mut self) -> Result<()> {
        if self.state == State::Closed {
            return Ok(());
        }
        self.transport.close()?;
        self.state = State::Closed;
        Ok(())
    }

    /// Read a single CSR word at byte address `addr`.
    /// Indistinguishable on the wire from a burst of length 1.
    ///
    /// # Errors
    /// See [`Connection::read_burst`].
    pub fn read(&mut self, addr: u64) -> Result<u32> {
        let words = self.read_burst(addr, 1, BurstMode::Incrementing)?;
        Ok(words[0])
    }

    /// Write a single CSR word at byte address `addr`.
    ///
    /// # Errors
    /// See [`Connection::write_burst`].
    pub fn write(&mut self, addr: u64, value: u32) -> Result<()> {
        self.write_burst(addr, &[value], BurstMode::Incrementing)
    }

    /// Read `count` words starting at byte address `addr`.
    ///
    /// Stale input is flushed first, then the request is realized as
    /// consecutive framed bursts of at most [`MAX_BURST_WORDS`] words, each
    /// with its own header and address field. In `Incrementing` mode the
    /// address field advances by the words already transferred; in `Fixed`
    /// mode it is re-sent unchanged. Results are returned in request order.
    ///
    /// A `count` of 0 returns an empty vector without touching the wire: a
    /// zero-length burst is not representable in the frame format.
    ///
    /// # Errors
    /// [`Error::Closed`] when the connection is not open,
    /// [`Error::AddressOutOfRange`] when an address field would overflow
    /// (checked before any bytes move), and [`Error::Transport`] on channel
    /// faults, which abort the in-flight call.
    pub fn read_burst(&mut self, addr: u64, count: usize, mode: BurstMode) -> Result<Vec<u32>> {
        self.ensure_open()?;
        let mut words = Vec::with_capacity(count);
        if count == 0 {
            return Ok(words);
        }
        self.check_address(addr, count, mode)?;
        self.flush_input()?;
        while words.len() < count {
            let burst = (count - words.len()).min(MAX_BURST_WORDS);
            let burst_addr = match mode {
                BurstMode::Incrementing => addr + 4 * words.len() as u64,
                BurstMode::Fixed => addr,
            };
            self.command(Opcode::read(mode), burst, burst_addr)?;
            for _ in 0..burst {
                let mut buf = [0u8; 4];
                self.read_exact(&mut buf)?;
                let value = codec::decode_word(buf);
                let trace_addr = match mode {
                    BurstMode::Incrementing => addr + 4 * words.len() as u64,
                    BurstMode::Fixed => addr,
                };
                self.trace(Direction::Read, value, trace_addr);
                words.push(value);
            }
        }
        Ok(words)
    }

    /// Write `values` starting at byte address `addr`.
    ///
    /// The values are partitioned into consecutive frames of at most
    /// [`MAX_BURST_WORDS`] words, addressed as for [`Connection::read_burst`].
    /// Writes are write-and-forget: no acknowledgement is read back, so
    /// completion means every frame was accepted by the transport. An empty
    /// slice emits zero frames.
    ///
    /// # Errors
    /// Same conditions as [`Connection::read_burst`].
    pub fn write_burst(&mut self, addr: u64, values: &[u32], mode: BurstMode) -> Result<()> {
        self.ensure_open()?;
        if values.is_empty() {
            return Ok(());
        }
        self.check_address(addr, values.len(), mode)?;
        self.flush_input()?;
        let mut sent = 0u64;
        for chunk in values.chunks(MAX_BURST_WORDS) {
            let burst_addr = match mode {
                BurstMode::Incrementing => addr + 4 * sent,
                BurstMode::Fixed => addr,
            };
            self.command(Opcode::write(mode), chunk.len(), burst_addr)?;
            for (i, &value) in chunk.iter().enumerate() {
                self.write_exact(&codec::encode_word(value))?;
                let trace_addr = match mode {
                    BurstMode::Incrementing => addr + 4 * (sent + i as u64),
                    BurstMode::Fixed => addr,
                };
                self.trace(Direction::Write, value, trace_addr);
            }
            sent += chunk.len() as u64;
        }
        Ok(())
    }

    /// Discard any bytes already buffered on the transport, dropping stale
    /// responses from a previous, possibly desynchronized transaction.
    ///
    /// Best effort: bytes arriving between the query and the next command are
    /// not covered. The peer is expected to be idle when a transaction
    /// starts.
    ///
    /// # Errors
    /// [`Error::Closed`] when not open, [`Error::Transport`] on faults.
    pub fn flush_input(&mut self) -> Result<()> {
        self.ensure_open()?;
        let pending = self.transport.bytes_to_read()?;
        if pending > 0 {
            let mut scratch = vec![0u8; pending];
            self.read_exact(&mut scratch)?;
        }
        Ok(())
    }

    /// Access the owned transport (mainly useful with the mock in tests)
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Emit one command frame header: opcode, burst length, address field
    fn command(&mut self, opcode: Opcode, len: usize, addr: u64) -> Result<()> {
        let word_addr = addr / 4;
        let field = codec::encode_address(word_addr, self.addr_bytes)
            .ok_or(Error::AddressOutOfRange(word_addr, self.addr_bytes))?;
        self.write_exact(&codec::encode_header(opcode, len))?;
        self.write_exact(&field)?;
        Ok(())
    }

    /// Reject a transfer whose address fields cannot be encoded, before any
    /// bytes move. Only sub-burst start addresses go on the wire, so the last
    /// chunk's start is the widest field the transfer will need.
    fn check_address(&self, addr: u64, count: usize, mode: BurstMode) -> Result<()> {
        let last_field = match mode {
            BurstMode::Fixed => addr / 4,
            BurstMode::Incrementing => {
                let last_chunk_start = ((count - 1) / MAX_BURST_WORDS) * MAX_BURST_WORDS;
                addr / 4 + last_chunk_start as u64
            }
        };
        if codec::encode_address(last_field, self.addr_bytes).is_none() {
            return Err(Error::AddressOutOfRange(last_field, self.addr_bytes));
        }
        Ok(())
    }

    /// Block until `buf` is completely filled. The transport may return short
    /// or even zero-length reads; neither is end-of-stream here.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            filled += self.transport.read(&mut buf[filled..])?;
        }
        Ok(())
    }

    /// Block until every byte of `bytes` has been accepted by the transport
    fn write_exact(&mut self, bytes: &[u8]) -> Result<()> {
        let mut sent = 0;
        while sent < bytes.len() {
            sent += self.transport.write(&bytes[sent..])?;
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            State::Open => Ok(()),
            State::Closed => Err(Error::Closed),
        }
    }

    fn trace(&self, direction: Direction, value: u32, addr: u64) {
        if let Some(tracer) = &self.tracer {
            tracer.record(direction, value, addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::Mock;

    fn connection(addr_bytes: usize) -> Connection<Mock> {
        let mut conn = Connection::new(Mock::new(addr_bytes), addr_bytes as u32 * 8).unwrap();
        conn.open().unwrap();
        conn
    }

    #[test]
    fn test_write_wire_bytes() {
        let mut conn = connection(4).with_tracer(Tracer::new());
        conn.write_burst(0x1000, &[0xDEAD_BEEF, 0x0000_0001], BurstMode::Incrementing)
            .unwrap();
        assert_eq!(
            conn.transport().wire(),
            [0x01, 0x02, 0x00, 0x00, 0x04, 0x00, 0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x00, 0x00, 0x01]
        );
    }

    #[test]
    fn test_write_then_read() {
        let mut conn = connection(4);
        conn.write_burst(0x1000, &[0xDEAD_BEEF, 1], BurstMode::Incrementing)
            .unwrap();
        let back = conn
            .read_burst(0x1000, 2, BurstMode::Incrementing)
            .unwrap();
        assert_eq!(back, vec![0xDEAD_BEEF, 1]);
    }

    #[test]
    fn test_large_transfer_roundtrip() {
        let mut conn = connection(4);
        let values: Vec<u32> = (0..100).map(|i| i * 3 + 7).collect();
        conn.write_burst(0x400, &values, BurstMode::Incrementing)
            .unwrap();
        let back = conn
            .read_burst(0x400, values.len(), BurstMode::Incrementing)
            .unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn test_seventeen_words_is_three_frames() {
        let mut conn = connection(4);
        let values: Vec<u32> = (0..17).collect();
        conn.write_burst(0, &values, BurstMode::Incrementing)
            .unwrap();
        {
            let frames = conn.transport().frames();
            assert_eq!(frames.len(), 3);
            assert_eq!(frames.iter().map(|f| f.len).collect::<Vec<_>>(), [8, 8, 1]);
            assert_eq!(
                frames.iter().map(|f| f.word_addr).collect::<Vec<_>>(),
                [0, 8, 16]
            );
        }
        let back = conn.read_burst(0, 17, BurstMode::Incrementing).unwrap();
        assert_eq!(back, values);
        let read_frames = &conn.transport().frames()[3..];
        assert_eq!(
            read_frames.iter().map(|f| f.len).collect::<Vec<_>>(),
            [8, 8, 1]
        );
    }

    #[test]
    fn test_fixed_mode_address_never_advances() {
        let mut conn = connection(4);
        let values: Vec<u32> = (1..=12).collect();
        conn.write_burst(0x20, &values, BurstMode::Fixed).unwrap();
        let frames = conn.transport().frames();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.word_addr == 0x08));
        assert!(frames.iter().all(|f| f.opcode == 0x03));
        // every value landed on the same word; the last one sticks
        assert_eq!(conn.transport().word(0x08), 12);
        assert_eq!(conn.transport().word(0x09), 0);
    }

    #[test]
    fn test_fixed_mode_read() {
        let mut conn = connection(4);
        conn.transport_mut().set_word(0x08, 0xAB);
        let back = conn.read_burst(0x20, 10, BurstMode::Fixed).unwrap();
        assert_eq!(back, vec![0xAB; 10]);
        assert!(conn
            .transport()
            .frames()
            .iter()
            .all(|f| f.word_addr == 0x08 && f.opcode == 0x04));
    }

    #[test]
    fn test_single_read_matches_burst_of_one() {
        let mut single = connection(4);
        single.transport_mut().set_word(0x40, 0xCAFE_F00D);
        let value = single.read(0x100).unwrap();

        let mut burst = connection(4);
        burst.transport_mut().set_word(0x40, 0xCAFE_F00D);
        let values = burst.read_burst(0x100, 1, BurstMode::Incrementing).unwrap();

        assert_eq!(value, 0xCAFE_F00D);
        assert_eq!(value, values[0]);
        assert_eq!(single.transport().wire(), burst.transport().wire());
    }

    #[test]
    fn test_stale_input_is_flushed() {
        let mut conn = connection(4);
        conn.transport_mut().set_word(1, 7);
        conn.transport_mut().push_stale(&[0xFF, 0xFF, 0xFF]);
        assert_eq!(conn.read(4).unwrap(), 7);
    }

    #[test]
    fn test_chunked_transport_framing_is_identical() {
        let values: Vec<u32> = (0..5).map(|i| 0x1111_0000 + i).collect();

        let mut whole = connection(4);
        whole
            .write_burst(0x80, &values, BurstMode::Incrementing)
            .unwrap();
        let whole_read = whole.read_burst(0x80, 5, BurstMode::Incrementing).unwrap();

        let mut chunked =
            Connection::new(Mock::new(4).with_chunk_limit(1), 32).unwrap();
        chunked.open().unwrap();
        chunked
            .write_burst(0x80, &values, BurstMode::Incrementing)
            .unwrap();
        let chunked_read = chunked
            .read_burst(0x80, 5, BurstMode::Incrementing)
            .unwrap();

        assert_eq!(whole_read, chunked_read);
        assert_eq!(whole.transport().wire(), chunked.transport().wire());
    }

    #[test]
    fn test_closed_connection_rejects_operations() {
        let mut conn = Connection::new(Mock::new(4), 32).unwrap();
        assert!(matches!(conn.read(0), Err(Error::Closed)));
        assert!(matches!(conn.write(0, 1), Err(Error::Closed)));
        assert!(matches!(conn.flush_input(), Err(Error::Closed)));
        conn.open().unwrap();
        conn.close().unwrap();
        assert!(matches!(conn.read(0), Err(Error::Closed)));
    }

    #[test]
    fn test_open_close_idempotent() {
        let mut conn = Connection::new(Mock::new(4), 32).unwrap();
        conn.open().unwrap();
        conn.open().unwrap();
        conn.write(0, 1).unwrap();
        conn.close().unwrap();
        conn.close().unwrap();
    }

    #[test]
    fn test_zero_count_read_touches_nothing() {
        let mut conn = connection(4);
        assert!(conn
            .read_burst(0, 0, BurstMode::Incrementing)
            .unwrap()
            .is_empty());
        assert!(conn.transport().wire().is_empty());
        assert!(conn.transport().frames().is_empty());
    }

    #[test]
    fn test_empty_write_is_a_noop() {
        let mut conn = connection(4);
        conn.write_burst(0, &[], BurstMode::Incrementing).unwrap();
        assert!(conn.transport().wire().is_empty());
        assert!(conn.transport().frames().is_empty());
    }

    #[test]
    fn test_bad_address_width() {
        assert!(matches!(
            Connection::new(Mock::new(4), 0),
            Err(Error::BadAddressWidth(0))
        ));
        assert!(matches!(
            Connection::new(Mock::new(4), 12),
            Err(Error::BadAddressWidth(12))
        ));
    }

    #[test]
    fn test_address_out_of_range_rejected_before_wire() {
        let mut conn = connection(1);
        // word address 0x400 does not fit one byte
        assert!(matches!(
            conn.read(0x1000),
            Err(Error::AddressOutOfRange(0x400, 1))
        ));
        assert!(matches!(
            conn.write_burst(0x1000, &[1], BurstMode::Incrementing),
            Err(Error::AddressOutOfRange(0x400, 1))
        ));
        assert!(conn.transport().wire().is_empty());
    }

    #[test]
    fn test_incrementing_split_can_overflow_field() {
        let mut conn = connection(1);
        // starts in range, but the second frame's address field would not fit
        let values = vec![0u32; 9];
        assert!(matches!(
            conn.write_burst(0x3F0, &values, BurstMode::Incrementing),
            Err(Error::AddressOutOfRange(..))
        ));
        assert!(conn.transport().wire().is_empty());
    }

    #[test]
    fn test_unaligned_address_drops_low_bits() {
        let mut aligned = connection(4);
        aligned.write(0x1000, 0x55).unwrap();
        let mut unaligned = connection(4);
        unaligned.write(0x1002, 0x55).unwrap();
        assert_eq!(aligned.transport().wire(), unaligned.transport().wire());
    }
}
