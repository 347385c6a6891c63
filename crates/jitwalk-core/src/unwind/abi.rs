//! Target ABI description used by the unwinder.

use crate::error::JitResult;
use crate::jit::{shape_for, PrologueShape};
use crate::types::{Architecture, RegisterId};

/// Register roles and interpreter-boundary symbols of the target
///
/// The JIT keeps its own Java stack: the frame pointer is not `sp` but a
/// dedicated callee-saved register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAbi
{
    pub architecture: Architecture,
    /// Java stack pointer
    pub frame_pointer: RegisterId,
    pub return_address: RegisterId,
    pub stack_pointer: RegisterId,
    pub program_counter: RegisterId,
    /// Bytes per frame slot
    pub word_size: u64,
    /// Name prefix of the return-to-interpreter trampolines
    pub trampoline_prefix: String,
    /// Module (path suffix) the trampolines live in
    pub helper_module: String,
    /// Global symbol of the interpreter loop
    pub interpreter_symbol: String,
    /// Offset from `interpreter_symbol` of the call into compiled code
    pub interpreter_reentry_offset: u64,
}

impl TargetAbi
{
    /// OpenJ9 on 64-bit RISC-V.
    pub fn riscv64() -> Self
    {
        Self {
            architecture: Architecture::Riscv64,
            frame_pointer: RegisterId::S11,
            return_address: RegisterId::RA,
            stack_pointer: RegisterId::SP,
            program_counter: RegisterId::Pc,
            word_size: 8,
            trampoline_prefix: "returnFromJIT".to_string(),
            helper_module: "libj9jit29.so".to_string(),
            interpreter_symbol: "cInterpreter".to_string(),
            interpreter_reentry_offset: 0x32,
        }
    }

    /// Prologue shape matching this ABI's architecture.
    ///
    /// ## Errors
    ///
    /// Returns `UnsupportedTarget` if the architecture has none.
    pub fn prologue_shape(&self) -> JitResult<&'static dyn PrologueShape>
    {
        shape_for(self.architecture)
    }

    /// Is `name` in `module` a return-to-interpreter trampoline?
    pub fn is_trampoline(&self, name: &str, module: Option<&str>) -> bool
    {
        name.starts_with(&self.trampoline_prefix)
            && module.is_some_and(|module| module.ends_with(&self.helper_module))
    }
}

impl Default for TargetAbi
{
    fn default() -> Self
    {
        Self::riscv64()
    }
}
