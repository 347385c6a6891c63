//! # Compiled Methods
//!
//! Per-method symbolic records built when the JIT reports a successful
//! compilation, and the registry the unwinder consults by PC.
//!
//! ## Lifecycle
//!
//! 1. A [`CompileEvent`] arrives with the method's metadata and the code
//!    generator's instruction list
//! 2. The PC → bytecode index table is captured from the instruction list
//! 3. The method record's line table is decoded and a [`MethodInfo`] built
//! 4. The method is added to the [`MethodRegistry`]
//!
//! On reload, every `MethodInfo` is rebuilt from its captured bytecode table.

pub mod instruction;
pub mod metadata;
pub mod method_info;
pub mod prologue;
pub mod registry;

pub use instruction::{build_bytecode_table, BytecodeTable, Instruction};
pub use metadata::{CompileEvent, CompiledMethodMetadata, MethodNames};
pub use method_info::{LineTable, LineTableEntry, MethodInfo};
pub use prologue::{shape_for, PrologueInfo, PrologueShape, PrologueState, Riscv64Prologue};
pub use registry::MethodRegistry;
