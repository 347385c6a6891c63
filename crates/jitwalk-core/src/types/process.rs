//! Target architecture identification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// CPU architecture of the inspected process
///
/// Only `Riscv64` has a supported prologue shape. The other variants exist so
/// that a snapshot taken on another machine can be recognised and refused
/// with a clear `UnsupportedTarget` error instead of being misread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture
{
    /// 64-bit RISC-V (`riscv:rv64`)
    ///
    /// Fixed 4-byte instructions (compressed instructions are not used by the
    /// JIT prologue), 31 general-purpose registers plus `pc`.
    Riscv64,
    /// 64-bit ARM
    Arm64,
    /// 64-bit x86
    #[serde(rename = "x86_64")]
    X86_64,
}

impl Architecture
{
    /// Size of a pointer in bytes for this architecture.
    #[must_use]
    pub const fn pointer_size_bytes(self) -> u8
    {
        match self {
            Architecture::Riscv64 | Architecture::Arm64 | Architecture::X86_64 => 8,
        }
    }
}

impl fmt::Display for Architecture
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Architecture::Riscv64 => write!(f, "riscv64"),
            Architecture::Arm64 => write!(f, "arm64"),
            Architecture::X86_64 => write!(f, "x86_64"),
        }
    }
}

impl FromStr for Architecture
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "riscv64" | "riscv:rv64" | "rv64" => Ok(Architecture::Riscv64),
            "arm64" | "aarch64" => Ok(Architecture::Arm64),
            "x86_64" | "x86-64" | "amd64" => Ok(Architecture::X86_64),
            _ => Err(format!("Unknown architecture: {s}")),
        }
    }
}
