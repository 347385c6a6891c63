//! # Types
//!
//! Plain data types shared by the decoders, the unwinder, and the host walker.

pub mod address;
pub mod process;
pub mod registers;
pub mod stack;
pub mod symbols;

// Re-export all public types
pub use address::Address;
pub use process::Architecture;
pub use registers::{RegisterId, Registers};
pub use stack::{FrameId, FrameStatus, SavedRegister, StackFrame, UnwindInfo};
pub use symbols::{ResolvedSymbol, SourceLocation};
