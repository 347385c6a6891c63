//! Code generator instructions and the PC → bytecode index table.

use serde::{Deserialize, Serialize};

use crate::error::{JitError, JitResult};
use crate::range_map::RangeMap;
use crate::types::Address;

/// PC → bytecode index map of one compiled method.
pub type BytecodeTable = RangeMap<Address, u32>;

/// One instruction emitted by the code generator, in program order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction
{
    /// Address of the encoded instruction
    pub pc: Address,
    /// Encoded length in bytes; zero for labels and block markers
    pub length: u32,
    /// Bytecode index of the IL node the instruction was generated for
    pub bytecode_index: u32,
}

impl Instruction
{
    pub fn new(pc: impl Into<Address>, length: u32, bytecode_index: u32) -> Self
    {
        Self {
            pc: pc.into(),
            length,
            bytecode_index,
        }
    }

    /// Labels, block starts and other markers emit no bytes.
    pub fn is_pseudo(&self) -> bool
    {
        self.length == 0
    }
}

/// Derive the PC → bytecode index table from a code generator's instruction list.
///
/// The first element is the method's descriptor word and is always skipped,
/// as are pseudo instructions. An entry is recorded only where the bytecode
/// index changes, so the table holds boundaries, not every instruction.
///
/// This must run while the compilation is still alive: the instruction list
/// is discarded once the compile finishes.
///
/// ## Errors
///
/// - `InvalidArgument` if no real instruction follows the descriptor
/// - `KeyOrder` if instruction addresses go backwards
///
/// ## Example
///
/// ```rust
/// use jitwalk_core::jit::{build_bytecode_table, Instruction};
///
/// let instructions = [
///     Instruction::new(0, 0, 0), // descriptor
///     Instruction::new(100, 4, 5),
///     Instruction::new(104, 4, 5),
///     Instruction::new(108, 4, 7),
/// ];
/// let table = build_bytecode_table(&instructions).unwrap();
/// let entries: Vec<_> = table.iter().map(|(pc, bc)| (pc.value(), bc)).collect();
/// assert_eq!(entries, vec![(100, 5), (108, 7)]);
/// ```
pub fn build_bytecode_table<'a, I>(instructions: I) -> JitResult<BytecodeTable>
where
    I: IntoIterator<Item = &'a Instruction>,
{
    let mut table = BytecodeTable::new();
    let mut previous: Option<u32> = None;

    for instruction in instructions.into_iter().skip(1).filter(|insn| !insn.is_pseudo()) {
        if previous != Some(instruction.bytecode_index) {
            table.put(instruction.pc, instruction.bytecode_index)?;
            previous = Some(instruction.bytecode_index);
        }
    }

    if table.is_empty() {
        return Err(JitError::InvalidArgument(
            "compiled method has no real instructions".to_string(),
        ));
    }
    Ok(table)
}
