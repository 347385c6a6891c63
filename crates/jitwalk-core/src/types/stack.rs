//! Stack frame types.

use std::fmt;

use smallvec::SmallVec;

use super::symbols::SourceLocation;
use super::{Address, RegisterId};

/// Identity of one frame: its canonical frame address and PC.
///
/// The host walker uses this pair to tell frames apart and to detect a walk
/// that stops making progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId
{
    /// Canonical frame address
    pub cfa: Address,
    /// PC executing in the frame
    pub pc: Address,
}

impl FrameId
{
    pub fn new(cfa: Address, pc: Address) -> Self
    {
        Self { cfa, pc }
    }
}

/// Caller register value recovered from a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedRegister
{
    pub register: RegisterId,
    pub value: u64,
}

/// Result of unwinding one frame
///
/// `saved_registers` holds the values the *caller* had in each register. The
/// JIT unwinder always restores exactly four: frame pointer, return address,
/// program counter, and stack pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnwindInfo
{
    pub id: FrameId,
    pub saved_registers: SmallVec<[SavedRegister; 4]>,
}

impl UnwindInfo
{
    pub fn new(id: FrameId) -> Self
    {
        Self {
            id,
            saved_registers: SmallVec::new(),
        }
    }

    /// Record a caller register value. A second value for the same register replaces the first.
    pub fn add_saved_register(&mut self, register: RegisterId, value: u64)
    {
        if let Some(existing) = self.saved_registers.iter_mut().find(|saved| saved.register == register) {
            existing.value = value;
        } else {
            self.saved_registers.push(SavedRegister { register, value });
        }
    }

    /// Caller value of `register`, if this frame restores it.
    pub fn saved_register(&self, register: RegisterId) -> Option<u64>
    {
        self.saved_registers
            .iter()
            .find(|saved| saved.register == register)
            .map(|saved| saved.value)
    }
}

impl fmt::Display for UnwindInfo
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "<unwind info: CFA {} PC {}>", self.id.cfa, self.id.pc)
    }
}

/// Indicates how a presented frame was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus
{
    /// Unwound by the JIT unwinder.
    Jit,
    /// No unwinder applied; the walk stops here.
    Unknown,
}

/// Frame as presented to the user by the host walker.
#[derive(Debug, Clone)]
pub struct StackFrame
{
    /// Ordered index within the stack trace (0 = innermost).
    pub index: usize,
    /// Program counter of this frame.
    pub pc: Address,
    /// Canonical frame address, when the frame was unwound.
    pub cfa: Option<Address>,
    /// Return address that unwinding will jump to (if known).
    pub return_address: Option<Address>,
    /// Method or native symbol name.
    pub function: Option<String>,
    /// Source location of `pc`.
    pub location: Option<SourceLocation>,
    pub status: FrameStatus,
}

impl fmt::Display for StackFrame
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "#{:<3} {} in {}", self.index, self.pc, self.function.as_deref().unwrap_or("??"))?;
        if let Some(location) = &self.location {
            write!(f, " at {location}")?;
        }
        Ok(())
    }
}
