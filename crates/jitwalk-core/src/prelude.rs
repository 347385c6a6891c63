//! Common module for library exports

pub use crate::error::{JitError, JitResult};
pub use crate::jit::{CompileEvent, CompiledMethodMetadata, Instruction, MethodInfo, MethodRegistry};
pub use crate::memory::{MemoryAccess, MemoryImage};
pub use crate::session::{JitSession, SessionConfig};
pub use crate::snapshot::Snapshot;
pub use crate::symbols::{SymbolResolver, SymbolTable};
pub use crate::types::{Address, Architecture, FrameStatus, RegisterId, Registers, StackFrame, UnwindInfo};
pub use crate::unwind::{JitUnwinder, PendingFrame, TargetAbi};
