//! CPU register types and access.

use std::fmt;
use std::str::FromStr;

use super::Address;
use crate::error::{JitError, JitResult};

/// ABI names of the RISC-V integer registers, indexed by register number.
const RISCV_ABI_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4", "a5", "a6", "a7", "s2",
    "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4", "t5", "t6",
];

/// Identifier for a RISC-V register
///
/// `X(n)` names integer register `xn`; `Pc` is the program counter, which is
/// not addressable as an integer register on RISC-V.
///
/// ## Registers with a role in JIT frames
///
/// - `ra` (x1): return address, holds the caller's PC until the prologue spills it
/// - `sp` (x2): native stack pointer, passed through untouched by JIT frames
/// - `s11` (x27): Java stack pointer, the frame pointer of JIT frames
///
/// ## Example
///
/// ```rust
/// use jitwalk_core::types::RegisterId;
///
/// let java_sp: RegisterId = "s11".parse().unwrap();
/// assert_eq!(java_sp, RegisterId::S11);
/// assert_eq!(RegisterId::X(1).to_string(), "ra");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegisterId
{
    /// Program counter
    Pc,
    /// Integer register `x0`..`x31`
    X(u8),
}

impl RegisterId
{
    /// Return address register (`x1`)
    pub const RA: Self = RegisterId::X(1);
    /// Stack pointer (`x2`)
    pub const SP: Self = RegisterId::X(2);
    /// Saved register 11 (`x27`), the Java stack pointer
    pub const S11: Self = RegisterId::X(27);

    /// ABI name of the register (`pc`, `ra`, `s11`, ...)
    pub fn abi_name(self) -> &'static str
    {
        match self {
            RegisterId::Pc => "pc",
            RegisterId::X(n) => RISCV_ABI_NAMES.get(usize::from(n)).copied().unwrap_or("x?"),
        }
    }
}

impl fmt::Display for RegisterId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.abi_name())
    }
}

impl FromStr for RegisterId
{
    type Err = JitError;

    fn from_str(s: &str) -> JitResult<Self>
    {
        let name = s.trim().to_lowercase();
        if name == "pc" {
            return Ok(RegisterId::Pc);
        }
        // s0 doubles as the frame pointer in the native ABI
        if name == "fp" {
            return Ok(RegisterId::X(8));
        }
        if let Some(index) = RISCV_ABI_NAMES.iter().position(|abi| *abi == name) {
            return Ok(RegisterId::X(index as u8));
        }
        if let Some(number) = name.strip_prefix('x').and_then(|n| n.parse::<u8>().ok()) {
            if number < 32 {
                return Ok(RegisterId::X(number));
            }
        }
        Err(JitError::UnknownRegister(s.to_string()))
    }
}

/// Register file of one stopped thread (or one unwound frame)
///
/// `x0` is hard-wired to zero and writes to it are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registers
{
    /// Program counter
    pub pc: Address,
    /// Integer registers `x0`..`x31`
    pub general: [u64; 32],
}

impl Registers
{
    /// Create an all-zero register file.
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Read a register value.
    pub fn get(&self, id: RegisterId) -> u64
    {
        match id {
            RegisterId::Pc => self.pc.value(),
            RegisterId::X(0) => 0,
            RegisterId::X(n) => self.general.get(usize::from(n)).copied().unwrap_or(0),
        }
    }

    /// Write a register value.
    pub fn set(&mut self, id: RegisterId, value: u64)
    {
        match id {
            RegisterId::Pc => self.pc = Address::from(value),
            RegisterId::X(0) => {}
            RegisterId::X(n) => {
                if let Some(slot) = self.general.get_mut(usize::from(n)) {
                    *slot = value;
                }
            }
        }
    }

    /// Build a register file from `(abi name, value)` pairs.
    ///
    /// ## Errors
    ///
    /// Returns `UnknownRegister` for names that are not RISC-V registers.
    pub fn from_named<'a, I>(values: I) -> JitResult<Self>
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let mut regs = Registers::new();
        for (name, value) in values {
            regs.set(name.parse()?, value);
        }
        Ok(regs)
    }
}
