//! # Method Records
//!
//! Decoders for the immutable method records ("ROM methods") the runtime keeps
//! for every loaded method: the header, the flag-gated optional sections that
//! follow the bytecodes, and the compressed line number table.
//!
//! Everything here reads through [`MemoryAccess`] and never writes.

pub mod debug_info;
pub mod method;
pub mod modifiers;

pub use debug_info::{decode_line_table, LineNumber, MethodDebugInfo};
pub use method::{RomMethod, SectionKind, SectionLayout};
pub use modifiers::{ExtendedModifiers, MethodModifiers};

use crate::error::JitResult;
use crate::memory::MemoryAccess;
use crate::types::Address;

/// Read a length-prefixed string (`u16` length, then bytes).
///
/// Invalid UTF-8 is replaced rather than rejected.
pub fn read_utf8<M: MemoryAccess>(memory: &M, address: Address) -> JitResult<String>
{
    let length = memory.read_u16(address)?;
    let bytes = memory.read_vec(address + 2, usize::from(length))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
