//! Register metadata used to annotate transaction traces

use kstring::KString;
use std::collections::HashMap;

/// The location and extent of a register in the target's address space
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Register {
    /// Byte address of this register
    pub addr: u64,
    /// The number of bytes stored at this location
    pub length: u64,
}

/// The mapping from register names to their location
pub type RegisterMap = HashMap<KString, Register>;

/// Resolve a byte address to a symbolic name. This is a debug convenience
/// consumed by [`crate::trace::Tracer`], not part of the protocol contract.
pub trait RegisterLookup {
    /// The name of the register containing `addr`, if any
    fn lookup(&self, addr: u64) -> Option<&str>;
}

impl RegisterLookup for RegisterMap {
    fn lookup(&self, addr: u64) -> Option<&str> {
        self.iter()
            .find(|(_, reg)| reg.addr <= addr && addr < reg.addr + reg.length)
            .map(|(name, _)| name.as_str())
    }
}
