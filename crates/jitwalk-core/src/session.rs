//! # Session
//!
//! Ties the pieces together for one inspected process: compile events feed
//! the registry, and stack-walk requests go through the JIT unwinder.
//!
//! Per-method failures are logged and the session carries on. The only error
//! that stops a session from being created is `UnsupportedTarget`.

use std::sync::Arc;

use regex::Regex;

use crate::error::{JitError, JitResult};
use crate::jit::{build_bytecode_table, CompileEvent, MethodInfo, MethodRegistry, PrologueShape};
use crate::memory::MemoryAccess;
use crate::snapshot::Snapshot;
use crate::symbols::{SymbolResolver, SymbolTable};
use crate::types::{Address, Architecture, Registers, StackFrame, UnwindInfo};
use crate::unwind::{JitUnwinder, TargetAbi};

/// Default limit on frames produced by one walk.
pub const DEFAULT_MAX_FRAMES: usize = 256;

/// Session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig
{
    /// Stop a backtrace after this many frames
    pub max_frames: usize,
    pub abi: TargetAbi,
}

impl Default for SessionConfig
{
    fn default() -> Self
    {
        Self {
            max_frames: DEFAULT_MAX_FRAMES,
            abi: TargetAbi::riscv64(),
        }
    }
}

/// Compiled-method symbolication and unwinding for one stopped process.
#[derive(Debug)]
pub struct JitSession<M, S>
{
    config: SessionConfig,
    shape: &'static dyn PrologueShape,
    registry: MethodRegistry,
    memory: M,
    symbols: S,
}

impl<M, S> JitSession<M, S>
where
    M: MemoryAccess,
    S: SymbolResolver,
{
    /// Create a session for a process running on `architecture`.
    ///
    /// ## Errors
    ///
    /// Returns `UnsupportedTarget` if `architecture` has no prologue shape or
    /// differs from the configured ABI.
    pub fn new(architecture: Architecture, memory: M, symbols: S, config: SessionConfig) -> JitResult<Self>
    {
        if architecture != config.abi.architecture {
            return Err(JitError::UnsupportedTarget(architecture));
        }
        let shape = config.abi.prologue_shape()?;
        tracing::info!(%architecture, "JIT unwinder installed");

        Ok(Self {
            config,
            shape,
            registry: MethodRegistry::new(),
            memory,
            symbols,
        })
    }

    /// Register the method a compile event describes.
    ///
    /// A method whose record cannot be decoded is still registered, without
    /// line information, so its frames can be unwound.
    ///
    /// ## Errors
    ///
    /// Returns `InvalidArgument` or `KeyOrder` if the instruction list does
    /// not describe any code; nothing is registered then.
    #[tracing::instrument(skip_all, fields(start_pc = %event.metadata.start_pc, end_pc = %event.metadata.end_pc))]
    pub fn on_compile_success(&mut self, event: &CompileEvent) -> JitResult<Arc<MethodInfo>>
    {
        let bytecode_table = build_bytecode_table(&event.instructions)?;
        let method = match MethodInfo::build(&self.memory, event.metadata, bytecode_table.clone(), self.shape) {
            Ok(method) => method,
            Err(err) => {
                tracing::warn!(error = %err, "registering method without line information");
                MethodInfo::unsymbolicated(&self.memory, event.metadata, bytecode_table, self.shape)
            }
        };
        tracing::info!(method = method.name(), "registered compiled method");
        Ok(self.registry.register(method))
    }

    /// Register every event, skipping the ones that fail. Returns how many were registered.
    pub fn register_all<'a, I>(&mut self, events: I) -> usize
    where
        I: IntoIterator<Item = &'a CompileEvent>,
    {
        let mut registered = 0;
        for event in events {
            match self.on_compile_success(event) {
                Ok(_) => registered += 1,
                Err(err) => tracing::warn!(start_pc = %event.metadata.start_pc, error = %err, "skipping compile event"),
            }
        }
        registered
    }

    /// Rebuild all methods after the inspected image was reloaded.
    #[tracing::instrument(skip_all)]
    pub fn reload(&mut self) -> Vec<JitError>
    {
        self.registry.reload(&self.memory)
    }

    /// Forget every registered method.
    pub fn clear(&mut self)
    {
        self.registry.clear();
    }

    pub fn unwinder(&self) -> JitUnwinder<'_, M, S>
    {
        JitUnwinder::new(&self.config.abi, &self.registry, &self.memory, &self.symbols)
    }

    /// Walk the stack from `registers`.
    #[tracing::instrument(skip_all, fields(pc = %registers.pc))]
    pub fn backtrace(&self, registers: &Registers) -> Vec<StackFrame>
    {
        let frames = self.unwinder().backtrace(registers, self.config.max_frames);
        tracing::debug!(frames = frames.len(), "backtrace complete");
        frames
    }

    /// Registers of frame `frame` (0 = innermost), or `None` if the walk
    /// cannot reach it.
    pub fn registers_for_frame(&self, registers: &Registers, frame: usize) -> Option<Registers>
    {
        let unwinder = self.unwinder();
        let mut cursor = registers.clone();
        for _ in 0..frame {
            let info = unwinder.unwind(&cursor)?;
            for saved in &info.saved_registers {
                cursor.set(saved.register, saved.value);
            }
        }
        Some(cursor)
    }

    /// Unwind frame `frame` (0 = innermost).
    pub fn unwind_frame(&self, registers: &Registers, frame: usize) -> Option<UnwindInfo>
    {
        let cursor = self.registers_for_frame(registers, frame)?;
        self.unwinder().unwind(&cursor)
    }

    /// Method containing `pc`.
    pub fn method_at(&self, pc: Address) -> Option<Arc<MethodInfo>>
    {
        self.registry.lookup_by_pc(pc)
    }

    /// Methods whose name matches `pattern`.
    pub fn methods_matching(&self, pattern: &Regex) -> Vec<Arc<MethodInfo>>
    {
        self.registry.lookup_by_name(pattern)
    }

    pub fn registry(&self) -> &MethodRegistry
    {
        &self.registry
    }

    pub fn memory(&self) -> &M
    {
        &self.memory
    }

    pub fn symbols(&self) -> &S
    {
        &self.symbols
    }

    pub fn config(&self) -> &SessionConfig
    {
        &self.config
    }
}

impl JitSession<Snapshot, SymbolTable>
{
    /// Create a session over a snapshot and register its compile events.
    ///
    /// ## Errors
    ///
    /// Returns `UnsupportedTarget` if the snapshot is not from a riscv64 process.
    #[tracing::instrument(skip_all, fields(architecture = %snapshot.architecture()))]
    pub fn from_snapshot(snapshot: Snapshot, config: SessionConfig) -> JitResult<Self>
    {
        let symbols = snapshot.symbol_table();
        let mut session = Self::new(snapshot.architecture(), snapshot, symbols, config)?;

        let events = session.memory.compile_events().to_vec();
        let registered = session.register_all(&events);
        tracing::info!(registered, total = events.len(), "registered snapshot methods");
        Ok(session)
    }
}
