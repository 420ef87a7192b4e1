//! Optional per-word transaction tracing

use crate::core::RegisterLookup;
use std::fmt;

/// Direction of a traced transfer
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // pad() so callers' column alignment applies
        f.pad(match self {
            Direction::Read => "read",
            Direction::Write => "write",
        })
    }
}

/// Side channel that logs one line per transferred word.
///
/// Purely observational: recording never touches the wire and never alters
/// protocol control flow. Register names come from an injected
/// [`RegisterLookup`], so the tracer does not care who owns the register map.
pub struct Tracer {
    lookup: Option<Box<dyn RegisterLookup + Send>>,
}

impl Tracer {
    /// A tracer with no register name annotation
    #[must_use]
    pub fn new() -> Self {
        Self { lookup: None }
    }

    /// A tracer that annotates addresses with names resolved by `lookup`
    #[must_use]
    pub fn with_lookup(lookup: impl RegisterLookup + Send + 'static) -> Self {
        Self {
            lookup: Some(Box::new(lookup)),
        }
    }

    /// Emit a single trace line for one transferred word
    pub fn record(&self, direction: Direction, value: u32, addr: u64) {
        match self.lookup.as_ref().and_then(|l| l.lookup(addr)) {
            Some(name) => log::debug!("{direction:<5} 0x{value:08x} @ 0x{addr:08x} {name}"),
            None => log::debug!("{direction:<5} 0x{value:08x} @ 0x{addr:08x}"),
        }
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("lookup", &self.lookup.is_some())
            .finish()
    }
}
