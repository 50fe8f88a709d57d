//! Instruction decoding backends.
//!
//! The cleanup engine never decodes bytes itself; it asks the analysis
//! database. In-memory databases can delegate raw-byte decoding to one of
//! these backends when they have no pre-decoded instruction for an address.

use std::fmt::Debug;

use crate::model::{Address, Instruction};

#[cfg(feature = "capstone-decoder")]
pub mod capstone;

#[cfg(feature = "capstone-decoder")]
pub use self::capstone::{CapstoneDecoder, DecoderMode};

/// Decodes a single instruction from raw bytes.
pub trait InstructionDecoder: Debug {
    /// Returns a human-readable name for the backend.
    fn name(&self) -> &str;

    /// Decode the instruction starting at `bytes[0]`, located at `address`.
    ///
    /// Returns `None` when the bytes do not form a valid instruction.
    fn decode(&self, address: Address, bytes: &[u8]) -> Option<Instruction>;
}

/// Raw-byte decoders compiled into this build, for version output.
pub fn available_decoders() -> Vec<String> {
    #[allow(unused_mut)]
    let mut out = Vec::new();
    #[cfg(feature = "capstone-decoder")]
    out.push(format!("capstone {}", self::capstone::capstone_version()));
    out
}
