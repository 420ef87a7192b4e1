//! Byte transports the bridge protocol can run over

pub mod mock;
pub mod serial;

use std::io;

/// The interface the protocol needs from a physical byte channel.
///
/// Implementations are serial-like: a single ordered byte stream with no
/// framing of its own. Reads and writes may transfer fewer bytes than
/// requested per call, including zero, which is not end-of-stream; the
/// [`crate::connection::Connection`] completion loops retry until the full
/// amount has moved.
pub trait ByteTransport {
    /// Open the underlying channel
    ///
    /// # Errors
    /// Returns an error if the channel cannot be opened (bad device path,
    /// permissions, etc.)
    fn open(&mut self) -> io::Result<()>;

    /// Release the underlying channel
    ///
    /// # Errors
    /// Returns an error if the channel cannot be released cleanly
    fn close(&mut self) -> io::Result<()>;

    /// Read up to `buf.len()` bytes, returning how many were read
    ///
    /// # Errors
    /// Returns an error on an unrecoverable read fault
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write up to `buf.len()` bytes, returning how many were accepted
    ///
    /// # Errors
    /// Returns an error on an unrecoverable write fault
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// The number of received bytes buffered but not yet read
    ///
    /// # Errors
    /// Returns an error if the channel cannot be queried
    fn bytes_to_read(&mut self) -> io::Result<usize>;
}
