//! Wire encoding for the bridge command set. All multi-byte fields are
//! big-endian.

/// Maximum number of 32-bit words carried by a single framed burst. The burst
/// length field is one byte but the protocol caps it at 8; longer transfers
/// are split into consecutive bursts.
pub const MAX_BURST_WORDS: usize = 8;

/// How the target address behaves across the words of a burst
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum BurstMode {
    /// The address advances by one word per transferred value
    #[default]
    Incrementing,
    /// The address stays constant across the burst (e.g. a FIFO port)
    Fixed,
}

/// Command opcodes as they appear on the wire
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    WriteBurstIncr = 0x01,
    ReadBurstIncr = 0x02,
    WriteBurstFixed = 0x03,
    ReadBurstFixed = 0x04,
}

impl Opcode {
    /// The read opcode for a burst mode
    #[must_use]
    pub fn read(mode: BurstMode) -> Self {
        match mode {
            BurstMode::Incrementing => Opcode::ReadBurstIncr,
            BurstMode::Fixed => Opcode::ReadBurstFixed,
        }
    }

    /// The write opcode for a burst mode
    #[must_use]
    pub fn write(mode: BurstMode) -> Self {
        match mode {
            BurstMode::Incrementing => Opcode::WriteBurstIncr,
            BurstMode::Fixed => Opcode::WriteBurstFixed,
        }
    }
}

/// Encode a command header: opcode byte followed by the burst length byte.
/// `len` must be in `1..=MAX_BURST_WORDS`.
#[must_use]
pub fn encode_header(opcode: Opcode, len: usize) -> [u8; 2] {
    debug_assert!((1..=MAX_BURST_WORDS).contains(&len));
    [opcode as u8, len as u8]
}

/// Encode a word address big-endian into exactly `width` bytes.
/// Returns `None` when the address does not fit the field.
#[must_use]
pub fn encode_address(word_addr: u64, width: usize) -> Option<Vec<u8>> {
    let be = word_addr.to_be_bytes();
    if width >= be.len() {
        // Wider fields than the address itself are zero-padded on the left
        let mut field = vec![0u8; width];
        field[width - be.len()..].copy_from_slice(&be);
        Some(field)
    } else if be[..be.len() - width].iter().all(|&b| b == 0) {
        Some(be[be.len() - width..].to_vec())
    } else {
        None
    }
}

/// Decode a big-endian address field
#[must_use]
pub fn decode_address(field: &[u8]) -> u64 {
    field.iter().fold(0, |acc, &b| (acc << 8) | u64::from(b))
}

/// Encode a 32-bit data word big-endian
#[must_use]
pub fn encode_word(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

/// Decode a 32-bit data word from its big-endian wire form
#[must_use]
pub fn decode_word(bytes: [u8; 4]) -> u32 {
    u32::from_be_bytes(bytes)
}
