//! Prelude (helpful reexports) for this package

pub use crate::{
    codec::BurstMode,
    connection::{Connection, Error},
    core::{Register, RegisterLookup, RegisterMap},
    trace::Tracer,
    transport::{serial::Serial, ByteTransport},
};
