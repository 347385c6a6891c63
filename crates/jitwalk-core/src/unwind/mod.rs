//! # JIT Frame Unwinding
//!
//! Recovers the caller's registers for a frame executing compiled Java code.
//!
//! Compiled methods carry no unwind tables. Instead the unwinder relies on
//! the fixed prologue and epilogue shapes (see [`crate::jit::prologue`]) and
//! classifies the PC into one of three states:
//!
//! | State      | PC                                   | CFA                | Return address              |
//! |------------|--------------------------------------|--------------------|-----------------------------|
//! | `PreAlloc` | before the frame is allocated        | `fp - frame size`  | link register               |
//! | `Epilogue` | next instruction is the return       | `fp + frame size`  | `[CFA + slots * word]`      |
//! | `Body`     | anywhere else                        | `fp`               | `[CFA + slots * word]`      |
//!
//! The canonical frame address (CFA) of a compiled frame is the value of
//! the Java stack pointer once the frame is built.
//!
//! A return address inside a return-to-interpreter trampoline is replaced by
//! the interpreter's call site, so the walk shows how compiled code was
//! entered rather than where it will return to.

pub mod abi;

use std::fmt;
use std::sync::Arc;

pub use abi::TargetAbi;

use crate::error::JitResult;
use crate::jit::{MethodInfo, MethodRegistry};
use crate::memory::MemoryAccess;
use crate::symbols::SymbolResolver;
use crate::types::{
    Address, FrameId, FrameStatus, RegisterId, Registers, SourceLocation, StackFrame, UnwindInfo,
};

/// Register access for the frame being unwound.
pub trait PendingFrame
{
    fn read_register(&self, register: RegisterId) -> JitResult<u64>;

    fn pc(&self) -> JitResult<Address>
    {
        self.read_register(RegisterId::Pc).map(Address::from)
    }
}

impl PendingFrame for Registers
{
    fn read_register(&self, register: RegisterId) -> JitResult<u64>
    {
        Ok(self.get(register))
    }
}

/// Where in its method a frame is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState
{
    /// Frame not allocated yet; the return address is still in its register
    PreAlloc,
    /// Frame already torn down, the return instruction is next
    Epilogue,
    /// Frame fully built
    Body,
}

impl fmt::Display for FrameState
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            FrameState::PreAlloc => write!(f, "pre-alloc"),
            FrameState::Epilogue => write!(f, "epilogue"),
            FrameState::Body => write!(f, "body"),
        }
    }
}

/// Unwinder for frames of registered compiled methods.
pub struct JitUnwinder<'a, M, S>
{
    abi: &'a TargetAbi,
    registry: &'a MethodRegistry,
    memory: &'a M,
    symbols: &'a S,
}

impl<'a, M, S> JitUnwinder<'a, M, S>
where
    M: MemoryAccess,
    S: SymbolResolver,
{
    pub fn new(abi: &'a TargetAbi, registry: &'a MethodRegistry, memory: &'a M, symbols: &'a S) -> Self
    {
        Self {
            abi,
            registry,
            memory,
            symbols,
        }
    }

    /// Unwind one frame, or `None` if this unwinder does not apply.
    ///
    /// Errors while unwinding a compiled frame are logged and reported as
    /// `None`, so the host can fall back to other unwinders.
    pub fn unwind<F: PendingFrame + ?Sized>(&self, frame: &F) -> Option<UnwindInfo>
    {
        match self.try_unwind(frame) {
            Ok(info) => info.map(|(_, info)| info),
            Err(err) => {
                tracing::debug!(error = %err, "JIT unwinder declined after error");
                None
            }
        }
    }

    /// Unwind one frame, returning the method it belongs to.
    ///
    /// ## Errors
    ///
    /// Returns `MemoryFault` or `UnknownRegister` if the frame's registers or
    /// stack slots cannot be read.
    pub fn try_unwind<F: PendingFrame + ?Sized>(&self, frame: &F) -> JitResult<Option<(Arc<MethodInfo>, UnwindInfo)>>
    {
        let pc = frame.pc()?;
        let Some(method) = self.registry.lookup_by_pc(pc) else {
            tracing::trace!(%pc, "no compiled method at pc");
            return Ok(None);
        };
        let info = self.unwind_method(&method, frame, pc)?;
        Ok(Some((method, info)))
    }

    /// Classify `pc` within `method`.
    ///
    /// An unreadable next instruction is treated as the method body.
    pub fn frame_state(&self, method: &MethodInfo, pc: Address) -> FrameState
    {
        if pc < method.prologue().frame_allocated {
            return FrameState::PreAlloc;
        }
        let next = pc + method.shape().instruction_width();
        match self.memory.read_array::<4>(next) {
            Ok(bytes) if method.shape().is_epilogue_return(bytes) => FrameState::Epilogue,
            Ok(_) => FrameState::Body,
            Err(err) => {
                tracing::debug!(%next, error = %err, "cannot read next instruction, assuming method body");
                FrameState::Body
            }
        }
    }

    fn unwind_method<F: PendingFrame + ?Sized>(&self, method: &MethodInfo, frame: &F, pc: Address) -> JitResult<UnwindInfo>
    {
        let frame_size = method.frame_size_bytes();
        let fp = Address::from(frame.read_register(self.abi.frame_pointer)?);
        let state = self.frame_state(method, pc);

        let (cfa, return_address) = match state {
            FrameState::PreAlloc => {
                let ra = frame.read_register(self.abi.return_address)?;
                (fp - frame_size, Address::from(ra))
            }
            FrameState::Epilogue | FrameState::Body => {
                let cfa = if state == FrameState::Epilogue { fp + frame_size } else { fp };
                let slot = cfa + u64::from(method.frame_slots()) * self.abi.word_size;
                (cfa, Address::from(self.memory.read_u64(slot)?))
            }
        };
        let return_address = self.interpreter_fixup(return_address);

        tracing::debug!(
            method = method.name(),
            %pc,
            %state,
            %cfa,
            %return_address,
            "unwound compiled frame"
        );

        let mut info = UnwindInfo::new(FrameId::new(cfa, pc));
        info.add_saved_register(self.abi.frame_pointer, (cfa + frame_size).value());
        info.add_saved_register(self.abi.return_address, return_address.value());
        info.add_saved_register(self.abi.program_counter, return_address.value());
        info.add_saved_register(self.abi.stack_pointer, frame.read_register(self.abi.stack_pointer)?);
        Ok(info)
    }

    /// Replace a return into the interpreter trampoline with the interpreter's call site.
    fn interpreter_fixup(&self, return_address: Address) -> Address
    {
        let Some(symbol) = self.symbols.resolve(return_address) else {
            return return_address;
        };
        if !self.abi.is_trampoline(&symbol.name, symbol.module.as_deref()) {
            return return_address;
        }
        match self.symbols.lookup_global(&self.abi.interpreter_symbol) {
            Some(interpreter) => {
                let reentry = interpreter + self.abi.interpreter_reentry_offset;
                tracing::debug!(trampoline = %symbol.name, %reentry, "return address is interpreter trampoline");
                reentry
            }
            None => {
                tracing::warn!(symbol = %self.abi.interpreter_symbol, "interpreter symbol not found");
                return_address
            }
        }
    }

    /// Walk the stack from `registers`, innermost frame first.
    ///
    /// Compiled frames are unwound until a frame this unwinder declines. That
    /// frame is presented through the native symbol resolver and ends the walk.
    pub fn backtrace(&self, registers: &Registers, max_frames: usize) -> Vec<StackFrame>
    {
        let mut frames = Vec::new();
        let mut cursor = registers.clone();

        while frames.len() < max_frames && cursor.pc != Address::ZERO {
            let index = frames.len();
            let unwound = match self.try_unwind(&cursor) {
                Ok(unwound) => unwound,
                Err(err) => {
                    tracing::debug!(error = %err, pc = %cursor.pc, "unwinding failed, stopping walk");
                    None
                }
            };

            let Some((method, info)) = unwound else {
                frames.push(self.unknown_frame(index, cursor.pc));
                break;
            };

            frames.push(StackFrame {
                index,
                pc: cursor.pc,
                cfa: Some(info.id.cfa),
                return_address: info.saved_register(self.abi.return_address).map(Address::from),
                function: Some(method.name().to_string()),
                location: Some(method.location_for_pc(cursor.pc)),
                status: FrameStatus::Jit,
            });

            let previous = cursor.clone();
            for saved in &info.saved_registers {
                cursor.set(saved.register, saved.value);
            }
            if cursor == previous {
                tracing::warn!(pc = %cursor.pc, "unwinding made no progress");
                break;
            }
        }

        frames
    }

    fn unknown_frame(&self, index: usize, pc: Address) -> StackFrame
    {
        let symbol = self.symbols.resolve(pc);
        StackFrame {
            index,
            pc,
            cfa: None,
            return_address: None,
            function: symbol.as_ref().map(ToString::to_string),
            location: symbol
                .and_then(|symbol| symbol.module)
                .map(SourceLocation::from_file),
            status: FrameStatus::Unknown,
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::jit::{BytecodeTable, CompiledMethodMetadata, Riscv64Prologue};
    use crate::memory::MemoryImage;
    use crate::symbols::{SymbolEntry, SymbolTable};

    static SHAPE: Riscv64Prologue = Riscv64Prologue;
    const RET: [u8; 4] = [0x67, 0x80, 0x00, 0x00];
    const NOP: [u8; 4] = [0x13, 0x00, 0x00, 0x00];

    struct Fixture
    {
        abi: TargetAbi,
        registry: MethodRegistry,
        memory: MemoryImage,
        symbols: SymbolTable,
    }

    impl Fixture
    {
        /// One method at `[0x4000, 0x4040)`: one parameter slot, three frame slots.
        fn new() -> Self
        {
            let metadata = CompiledMethodMetadata {
                start_pc: Address::from(0x4000),
                end_pc: Address::from(0x4040),
                total_frame_size: 3,
                slots: 1,
                class_name: Address::ZERO,
                method_name: Address::ZERO,
                method_signature: Address::ZERO,
                ram_method: Address::ZERO,
            };
            let mut registry = MethodRegistry::new();
            registry.register(MethodInfo::unsymbolicated(
                &MemoryImage::new(),
                metadata,
                BytecodeTable::new(),
                &SHAPE,
            ));

            let mut code = NOP.repeat(16);
            code[0x34..0x38].copy_from_slice(&RET);
            let mut memory = MemoryImage::new();
            memory.map(Address::from(0x4000), code);
            memory.map(Address::from(0x7f00), vec![0; 0x200]);

            let mut symbols = SymbolTable::new();
            symbols.add_symbol(
                "/opt/openj9/lib/default/libj9jit29.so",
                SymbolEntry {
                    name: "returnFromJITI".to_string(),
                    address: Address::from(0x5000),
                    size: 0x40,
                },
            );
            symbols.add_symbol(
                "/opt/openj9/lib/default/libj9vm29.so",
                SymbolEntry {
                    name: "cInterpreter".to_string(),
                    address: Address::from(0x9000),
                    size: 0x1000,
                },
            );

            Self {
                abi: TargetAbi::riscv64(),
                registry,
                memory,
                symbols,
            }
        }

        fn store(&mut self, address: u64, value: u64)
        {
            let mut stack = self.memory.read_vec(Address::from(0x7f00), 0x200).unwrap();
            let at = (address - 0x7f00) as usize;
            stack[at..at + 8].copy_from_slice(&value.to_le_bytes());
            self.memory.map(Address::from(0x7f00), stack);
        }

        fn unwinder(&self) -> JitUnwinder<'_, MemoryImage, SymbolTable>
        {
            JitUnwinder::new(&self.abi, &self.registry, &self.memory, &self.symbols)
        }
    }

    fn registers(pc: u64, s11: u64, ra: u64) -> Registers
    {
        let mut regs = Registers::new();
        regs.set(RegisterId::Pc, pc);
        regs.set(RegisterId::S11, s11);
        regs.set(RegisterId::RA, ra);
        regs.set(RegisterId::SP, 0x3fff_f000);
        regs
    }

    #[test]
    fn test_pre_alloc_takes_return_address_from_register()
    {
        let mut fixture = Fixture::new();
        // a stale value in the return address slot must be ignored
        fixture.store(0x7fe0 + 24, 0xdead);
        let info = fixture.unwinder().unwind(&registers(0x4004, 0x8000, 0x6000)).unwrap();

        assert_eq!(info.id, FrameId::new(Address::from(0x7fe0), Address::from(0x4004)));
        assert_eq!(info.saved_register(RegisterId::RA), Some(0x6000));
        assert_eq!(info.saved_register(RegisterId::Pc), Some(0x6000));
        assert_eq!(info.saved_register(RegisterId::S11), Some(0x8000));
        assert_eq!(info.saved_register(RegisterId::SP), Some(0x3fff_f000));
        assert_eq!(info.to_string(), "<unwind info: CFA 0x0000000000007fe0 PC 0x0000000000004004>");
    }

    #[test]
    fn test_body_reads_return_address_from_frame()
    {
        let mut fixture = Fixture::new();
        fixture.store(0x7fe0 + 24, 0x6100);
        let unwinder = fixture.unwinder();
        let regs = registers(0x4020, 0x7fe0, 0x1);

        let method = fixture.registry.lookup_by_pc(Address::from(0x4020)).unwrap();
        assert_eq!(unwinder.frame_state(&method, Address::from(0x4020)), FrameState::Body);

        let info = unwinder.unwind(&regs).unwrap();
        assert_eq!(info.id.cfa, Address::from(0x7fe0));
        assert_eq!(info.saved_register(RegisterId::RA), Some(0x6100));
        assert_eq!(info.saved_register(RegisterId::S11), Some(0x8000));
    }

    #[test]
    fn test_epilogue_adds_frame_size()
    {
        let mut fixture = Fixture::new();
        fixture.store(0x8020 + 24, 0x6200);
        let unwinder = fixture.unwinder();

        let method = fixture.registry.lookup_by_pc(Address::from(0x4030)).unwrap();
        assert_eq!(unwinder.frame_state(&method, Address::from(0x4030)), FrameState::Epilogue);

        let info = unwinder.unwind(&registers(0x4030, 0x8000, 0x1)).unwrap();
        assert_eq!(info.id.cfa, Address::from(0x8020));
        assert_eq!(info.saved_register(RegisterId::RA), Some(0x6200));
        assert_eq!(info.saved_register(RegisterId::S11), Some(0x8040));
    }

    #[test]
    fn test_unreadable_next_instruction_is_body()
    {
        let mut fixture = Fixture::new();
        fixture.store(0x7fe0 + 24, 0x6300);
        let unwinder = fixture.unwinder();

        // last instruction: the following word is outside the code segment
        let method = fixture.registry.lookup_by_pc(Address::from(0x403c)).unwrap();
        assert_eq!(unwinder.frame_state(&method, Address::from(0x403c)), FrameState::Body);
        let info = unwinder.unwind(&registers(0x403c, 0x7fe0, 0x1)).unwrap();
        assert_eq!(info.id.cfa, Address::from(0x7fe0));
    }

    #[test]
    fn test_trampoline_return_is_replaced_by_interpreter_call_site()
    {
        let mut fixture = Fixture::new();
        fixture.store(0x7fe0 + 24, 0x5010);
        let info = fixture.unwinder().unwind(&registers(0x4020, 0x7fe0, 0x1)).unwrap();

        assert_eq!(info.saved_register(RegisterId::RA), Some(0x9032));
        assert_eq!(info.saved_register(RegisterId::Pc), Some(0x9032));
    }

    #[test]
    fn test_trampoline_prefix_outside_helper_module_is_kept()
    {
        let mut fixture = Fixture::new();
        fixture.symbols.add_symbol(
            "libother.so",
            SymbolEntry {
                name: "returnFromJITL".to_string(),
                address: Address::from(0x5800),
                size: 0x10,
            },
        );
        fixture.store(0x7fe0 + 24, 0x5804);
        let info = fixture.unwinder().unwind(&registers(0x4020, 0x7fe0, 0x1)).unwrap();
        assert_eq!(info.saved_register(RegisterId::RA), Some(0x5804));
    }

    #[test]
    fn test_declines_outside_compiled_methods()
    {
        let fixture = Fixture::new();
        let unwinder = fixture.unwinder();
        assert!(unwinder.unwind(&registers(0x3ffc, 0x8000, 0x1)).is_none());
        assert!(unwinder.unwind(&registers(0x4040, 0x8000, 0x1)).is_none());
        assert!(unwinder.try_unwind(&registers(0x4040, 0x8000, 0x1)).unwrap().is_none());
    }

    #[test]
    fn test_unreadable_frame_declines()
    {
        let fixture = Fixture::new();
        let unwinder = fixture.unwinder();
        let regs = registers(0x4020, 0x1_0000, 0x1);

        assert!(unwinder.try_unwind(&regs).is_err());
        assert!(unwinder.unwind(&regs).is_none());
    }

    #[test]
    fn test_backtrace_stops_at_native_frame()
    {
        let mut fixture = Fixture::new();
        fixture.store(0x7fe0 + 24, 0x5010);
        let frames = fixture.unwinder().backtrace(&registers(0x4020, 0x7fe0, 0x1), 16);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].status, FrameStatus::Jit);
        assert_eq!(frames[0].function.as_deref(), Some("<unknown>.jit_4000"));
        assert_eq!(frames[0].cfa, Some(Address::from(0x7fe0)));
        assert_eq!(frames[0].return_address, Some(Address::from(0x9032)));

        assert_eq!(frames[1].status, FrameStatus::Unknown);
        assert_eq!(frames[1].pc, Address::from(0x9032));
        assert_eq!(frames[1].function.as_deref(), Some("cInterpreter+0x32"));
    }

    #[test]
    fn test_backtrace_respects_max_frames()
    {
        let mut fixture = Fixture::new();
        fixture.store(0x7fe0 + 24, 0x5010);
        let frames = fixture.unwinder().backtrace(&registers(0x4020, 0x7fe0, 0x1), 1);
        assert_eq!(frames.len(), 1);
    }
}
