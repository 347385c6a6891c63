//! # Prologue Shapes
//!
//! JIT prologues and epilogues follow a fixed instruction sequence per
//! architecture, so their landmarks are pure arithmetic on the method's start
//! PC and parameter count. No disassembly is involved.
//!
//! The riscv64 prologue:
//!
//! ```text
//! startPC:        ld   a0,0(s11)        ; one load per parameter slot
//!                 ...
//! jitEntry:       sd   ra,-8(s11)       ; spill return address
//!                 addi s11,s11,-N       ; allocate frame
//! frameAllocated: ld   t3,80(s10)       ; stack check
//!                 blt  s11,t3,overflow
//! frameBuilt:     ...                   ; method body
//! ```
//!
//! and every return (which may be inlined several times):
//!
//! ```text
//!                 addi s11,s11,N        ; destroy frame
//!                 ld   ra,-8(s11)       ; reload return address
//!                 ret
//! ```

use std::fmt;

use crate::error::{JitError, JitResult};
use crate::types::{Address, Architecture};

/// PC landmarks of one method's prologue, in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrologueInfo
{
    /// Interpreter entry, the method's start PC
    pub entry: Address,
    /// Entry used by compiled callers, after the parameter loads
    pub jit_entry: Address,
    /// First PC at which the frame pointer has been adjusted
    pub frame_allocated: Address,
    /// First PC after the stack overflow check
    pub stack_checked: Address,
    /// First PC of the method body
    pub frame_built: Address,
}

impl PrologueInfo
{
    /// Where execution is relative to the prologue.
    pub fn state_at(&self, pc: Address) -> PrologueState
    {
        if pc < self.jit_entry {
            PrologueState::Entry
        } else if pc < self.frame_allocated {
            PrologueState::JitEntry
        } else if pc < self.frame_built {
            PrologueState::FrameAllocated
        } else {
            PrologueState::FrameBuilt
        }
    }
}

/// Prologue progress, ordered by PC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PrologueState
{
    /// Loading parameters from the Java stack
    Entry,
    /// Return address spilled, frame not yet allocated
    JitEntry,
    /// Frame allocated, stack check pending
    FrameAllocated,
    /// Steady state for the rest of the method
    FrameBuilt,
}

impl fmt::Display for PrologueState
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            PrologueState::Entry => "entry",
            PrologueState::JitEntry => "jit-entry",
            PrologueState::FrameAllocated => "frame-allocated",
            PrologueState::FrameBuilt => "frame-built",
        };
        f.write_str(label)
    }
}

/// Fixed prologue/epilogue shape of one architecture.
pub trait PrologueShape: fmt::Debug + Send + Sync
{
    fn architecture(&self) -> Architecture;

    /// Width of every instruction in bytes.
    fn instruction_width(&self) -> u64;

    /// Compute the landmarks for a method starting at `start_pc`.
    fn prologue(&self, start_pc: Address, param_slots: u32) -> PrologueInfo;

    /// Does `next_instruction` (the encoded instruction after the current PC)
    /// return from the method?
    fn is_epilogue_return(&self, next_instruction: [u8; 4]) -> bool;
}

/// The riscv64 JIT linkage.
#[derive(Debug, Clone, Copy, Default)]
pub struct Riscv64Prologue;

impl Riscv64Prologue
{
    const INSTRUCTION_WIDTH: u64 = 4;
    /// `jalr x0, 0(ra)`
    const RET: [u8; 4] = [0x67, 0x80, 0x00, 0x00];
}

impl PrologueShape for Riscv64Prologue
{
    fn architecture(&self) -> Architecture
    {
        Architecture::Riscv64
    }

    fn instruction_width(&self) -> u64
    {
        Self::INSTRUCTION_WIDTH
    }

    fn prologue(&self, start_pc: Address, param_slots: u32) -> PrologueInfo
    {
        let width = Self::INSTRUCTION_WIDTH;
        let jit_entry = start_pc + u64::from(param_slots) * width;
        let frame_allocated = jit_entry + 2 * width;
        let stack_checked = frame_allocated + 2 * width;
        PrologueInfo {
            entry: start_pc,
            jit_entry,
            frame_allocated,
            stack_checked,
            // TODO: account for callee-saved and argument stores once the
            // linkage reports how many it emits
            frame_built: stack_checked,
        }
    }

    fn is_epilogue_return(&self, next_instruction: [u8; 4]) -> bool
    {
        next_instruction == Self::RET
    }
}

static RISCV64: Riscv64Prologue = Riscv64Prologue;

/// Prologue shape for `architecture`.
///
/// ## Errors
///
/// Returns `UnsupportedTarget` for every architecture except riscv64.
pub fn shape_for(architecture: Architecture) -> JitResult<&'static dyn PrologueShape>
{
    match architecture {
        Architecture::Riscv64 => Ok(&RISCV64),
        other => Err(JitError::UnsupportedTarget(other)),
    }
}
