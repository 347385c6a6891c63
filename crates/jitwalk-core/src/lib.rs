//! # jitwalk-core
//!
//! Symbolication and stack unwinding for JIT-compiled Java methods.
//!
//! This crate provides:
//! - Decoding of method records and their compressed line number tables
//! - Per-method symbolic records built from compile-success events
//! - A PC-keyed registry of compiled methods
//! - An unwinder for compiled frames, including returns into the interpreter
//! - A snapshot-backed host for inspecting a stopped process offline
//!
//! ## Target Support
//!
//! - **riscv64**: OpenJ9 JIT linkage (`s11` Java stack pointer, `ra` link register)
//! - Anything else is refused with `UnsupportedTarget`
//!
//! ## Example
//!
//! ```rust
//! use jitwalk_core::prelude::*;
//!
//! let session = JitSession::new(
//!     Architecture::Riscv64,
//!     MemoryImage::new(),
//!     SymbolTable::new(),
//!     SessionConfig::default(),
//! )
//! .unwrap();
//!
//! // no compiled methods registered: the walk ends at the first frame
//! let mut regs = Registers::new();
//! regs.set(RegisterId::Pc, 0x1000);
//! let frames = session.backtrace(&regs);
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].status, FrameStatus::Unknown);
//! ```

pub mod error;
pub mod jit;
pub mod memory;
pub mod prelude;
pub mod range_map;
pub mod rom;
pub mod session;
pub mod snapshot;
pub mod symbols;
pub mod types;
pub mod unwind;

// Re-export commonly used types
pub use error::{JitError, JitResult};
pub use jit::{MethodInfo, MethodRegistry};
pub use session::{JitSession, SessionConfig};
pub use snapshot::Snapshot;
pub use types::{Address, Architecture, Registers};
