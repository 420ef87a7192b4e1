//! Host-side access to 32-bit CSRs on LiteX-style SoC designs over a serial
//! UART bridge.
//!
//! The bridge speaks a small binary command protocol over an ordered byte
//! stream: each transaction is a one-byte opcode, a one-byte burst length
//! (1 to 8 words), a fixed-width big-endian word address, and, for writes,
//! the data words themselves. Reads are request/response; writes are
//! write-and-forget.
//!
//! [`connection::Connection`] drives the protocol over anything implementing
//! [`transport::ByteTransport`]. A [`transport::serial::Serial`] transport is
//! provided for real hardware, and [`transport::mock::Mock`] models a target
//! for tests.
//!
//! ```no_run
//! use uartbone::prelude::*;
//!
//! # fn main() -> Result<(), uartbone::connection::Error> {
//! let serial = Serial::new("/dev/ttyUSB0", 115_200);
//! let mut conn = Connection::new(serial, 32)?;
//! conn.open()?;
//! conn.write(0x8000_0000, 1)?;
//! let status = conn.read(0x8000_0004)?;
//! println!("status: 0x{status:08x}");
//! conn.close()?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod connection;
pub mod core;
pub mod prelude;
pub mod trace;
pub mod transport;
