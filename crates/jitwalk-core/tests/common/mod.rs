//! Shared fixtures: a small process image with one compiled method.
//!
//! ```text
//! 0x1000  "Foo" "bar" "()V"
//! 0x1100  method record, 6 bytecodes at 0x1114, debug info at 0x111c
//! 0x1200  linked method
//! 0x4000  compiled code, 16 instructions, `ret` at 0x4034
//! 0x7f00  Java stack
//! ```
#![allow(dead_code)]

use jitwalk_core::jit::{CompileEvent, CompiledMethodMetadata, Instruction};
use jitwalk_core::memory::MemoryImage;
use jitwalk_core::rom::debug_info::encode_entry;
use jitwalk_core::rom::MethodModifiers;
use jitwalk_core::symbols::{SymbolEntry, SymbolTable};
use jitwalk_core::types::{Address, RegisterId, Registers};

pub const CODE_START: u64 = 0x4000;
pub const CODE_END: u64 = 0x4040;
pub const STACK_BASE: u64 = 0x7f00;
pub const STACK_SIZE: usize = 0x200;
/// `s11` while the method body runs.
pub const FRAME_CFA: u64 = 0x7fe0;
/// Return address slot: `cfa + total_frame_size * 8`.
pub const RETURN_SLOT: u64 = FRAME_CFA + 24;
pub const TRAMPOLINE: u64 = 0x5000;
pub const INTERPRETER: u64 = 0x9000;

pub const NOP: [u8; 4] = [0x13, 0x00, 0x00, 0x00];
pub const RET: [u8; 4] = [0x67, 0x80, 0x00, 0x00];

pub fn utf8(text: &str) -> Vec<u8>
{
    let mut bytes = (text.len() as u16).to_le_bytes().to_vec();
    bytes.extend_from_slice(text.as_bytes());
    bytes
}

/// Line 10 from bytecode 0, line 12 from bytecode 4.
pub fn line_table() -> Vec<u8>
{
    let mut table = encode_entry(10, 0).unwrap();
    table.extend(encode_entry(2, 4).unwrap());
    table
}

/// Strings, method record and linked method of `Foo.bar()V`.
pub fn record_segment(line_table: &[u8], line_count: u32) -> Vec<u8>
{
    let base = 0x1000usize;
    let mut bytes = vec![0u8; 0x300];
    let mut write = |at: usize, data: &[u8]| bytes[at - base..at - base + data.len()].copy_from_slice(data);

    write(0x1000, &utf8("Foo"));
    write(0x1010, &utf8("bar"));
    write(0x1020, &utf8("()V"));

    write(0x1100, &(0x1010i32 - 0x1100).to_le_bytes());
    write(0x1104, &(0x1020i32 - 0x1104).to_le_bytes());
    write(0x1108, &MethodModifiers::HAS_DEBUG_INFO.bits().to_le_bytes());
    write(0x110e, &6u16.to_le_bytes());
    write(0x1120, &(line_count << 1).to_le_bytes());
    write(0x1128, line_table);
    write(0x1200, &0x1114u64.to_le_bytes());
    bytes
}

pub fn code_segment() -> Vec<u8>
{
    let mut code = NOP.repeat(16);
    code[0x34..0x38].copy_from_slice(&RET);
    code
}

/// Java stack with `return_address` in the method's return slot.
pub fn stack_segment(return_address: u64) -> Vec<u8>
{
    let mut stack = vec![0u8; STACK_SIZE];
    let at = (RETURN_SLOT - STACK_BASE) as usize;
    stack[at..at + 8].copy_from_slice(&return_address.to_le_bytes());
    stack
}

/// The whole process: record, code and a stack returning into the interpreter.
pub fn process_image(line_table: &[u8], line_count: u32) -> MemoryImage
{
    let mut memory = MemoryImage::new();
    memory.map(Address::from(0x1000), record_segment(line_table, line_count));
    memory.map(Address::from(CODE_START), code_segment());
    memory.map(Address::from(STACK_BASE), stack_segment(TRAMPOLINE + 0x10));
    memory
}

pub fn metadata() -> CompiledMethodMetadata
{
    CompiledMethodMetadata {
        start_pc: Address::from(CODE_START),
        end_pc: Address::from(CODE_END),
        total_frame_size: 3,
        slots: 1,
        class_name: Address::from(0x1000),
        method_name: Address::from(0x1010),
        method_signature: Address::from(0x1020),
        ram_method: Address::from(0x1200),
    }
}

/// Descriptor word, bytecode 0 up to 0x4014, then bytecode 4.
pub fn compile_event() -> CompileEvent
{
    let mut instructions = vec![Instruction::new(CODE_START - 4, 4, 0)];
    instructions.extend((CODE_START..0x4014).step_by(4).map(|pc| Instruction::new(pc, 4, 0)));
    instructions.push(Instruction::new(0x4014, 0, 4));
    instructions.extend((0x4014..CODE_END).step_by(4).map(|pc| Instruction::new(pc, 4, 4)));
    CompileEvent {
        metadata: metadata(),
        instructions,
    }
}

pub fn symbol_table() -> SymbolTable
{
    let mut symbols = SymbolTable::new();
    symbols.add_symbol(
        "/opt/openj9/lib/default/libj9jit29.so",
        SymbolEntry {
            name: "returnFromJITV".to_string(),
            address: Address::from(TRAMPOLINE),
            size: 0x40,
        },
    );
    symbols.add_symbol(
        "/opt/openj9/lib/default/libj9vm29.so",
        SymbolEntry {
            name: "cInterpreter".to_string(),
            address: Address::from(INTERPRETER),
            size: 0x1000,
        },
    );
    symbols
}

pub fn registers(pc: u64, s11: u64) -> Registers
{
    let mut regs = Registers::new();
    regs.set(RegisterId::Pc, pc);
    regs.set(RegisterId::S11, s11);
    regs.set(RegisterId::RA, 0x1);
    regs.set(RegisterId::SP, 0x3fff_f000);
    regs
}
