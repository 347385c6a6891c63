//! End-to-end tests: compile events in, symbolicated frames out.

mod common;

use common::*;
use jitwalk_core::prelude::*;
use regex::Regex;

fn session(memory: MemoryImage) -> JitSession<MemoryImage, SymbolTable>
{
    JitSession::new(Architecture::Riscv64, memory, symbol_table(), SessionConfig::default()).unwrap()
}

#[test]
fn test_backtrace_through_compiled_method_into_interpreter()
{
    let mut session = session(process_image(&line_table(), 2));
    let method = session.on_compile_success(&compile_event()).unwrap();
    assert_eq!(method.name(), "Foo.bar()V");

    let frames = session.backtrace(&registers(0x4020, FRAME_CFA));
    assert_eq!(frames.len(), 2);

    assert_eq!(frames[0].status, FrameStatus::Jit);
    assert_eq!(frames[0].function.as_deref(), Some("Foo.bar()V"));
    assert_eq!(frames[0].location.as_ref().unwrap().to_string(), "Foo.java:12");
    assert_eq!(frames[0].cfa, Some(Address::from(FRAME_CFA)));
    assert_eq!(frames[0].return_address, Some(Address::from(INTERPRETER + 0x32)));

    assert_eq!(frames[1].status, FrameStatus::Unknown);
    assert_eq!(frames[1].pc, Address::from(INTERPRETER + 0x32));
    assert_eq!(frames[1].function.as_deref(), Some("cInterpreter+0x32"));
}

#[test]
fn test_caller_registers()
{
    let mut session = session(process_image(&line_table(), 2));
    session.on_compile_success(&compile_event()).unwrap();
    let regs = registers(0x4020, FRAME_CFA);

    assert_eq!(session.registers_for_frame(&regs, 0), Some(regs.clone()));

    let caller = session.registers_for_frame(&regs, 1).unwrap();
    assert_eq!(caller.pc, Address::from(INTERPRETER + 0x32));
    assert_eq!(caller.get(RegisterId::RA), INTERPRETER + 0x32);
    assert_eq!(caller.get(RegisterId::S11), FRAME_CFA + 32);
    assert_eq!(caller.get(RegisterId::SP), 0x3fff_f000);

    // the interpreter frame is not ours to unwind
    assert!(session.unwind_frame(&regs, 1).is_none());
    assert!(session.registers_for_frame(&regs, 2).is_none());
}

#[test]
fn test_epilogue_frame_uses_frame_pointer_plus_size()
{
    let mut session = session(process_image(&line_table(), 2));
    session.on_compile_success(&compile_event()).unwrap();

    // the instruction after 0x4030 is the return: frame already popped
    let info = session.unwind_frame(&registers(0x4030, FRAME_CFA - 32), 0).unwrap();
    assert_eq!(info.id.cfa, Address::from(FRAME_CFA));
    assert_eq!(info.saved_register(RegisterId::Pc), Some(INTERPRETER + 0x32));
}

#[test]
fn test_malformed_record_is_still_registered()
{
    let mut session = session(process_image(&[0x04, 0xc0], 2));
    let method = session.on_compile_success(&compile_event()).unwrap();

    assert_eq!(method.name(), "Foo.bar()V");
    assert!(method.line_table().is_none());
    assert!(session.method_at(Address::from(0x4020)).is_some());

    // frames still unwind, just without a line
    let frames = session.backtrace(&registers(0x4020, FRAME_CFA));
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].location.as_ref().unwrap().to_string(), "Foo.java");
}

#[test]
fn test_event_without_code_is_rejected()
{
    let mut session = session(process_image(&line_table(), 2));
    let mut event = compile_event();
    event.instructions.truncate(1);

    let err = session.on_compile_success(&event).unwrap_err();
    assert!(matches!(err, JitError::InvalidArgument(_)));
    assert!(session.registry().is_empty());

    assert_eq!(session.register_all([&event, &compile_event()]), 1);
    assert_eq!(session.registry().len(), 1);
}

#[test]
fn test_method_lookup()
{
    let mut session = session(process_image(&line_table(), 2));
    session.on_compile_success(&compile_event()).unwrap();

    assert!(session.method_at(Address::from(CODE_START)).is_some());
    assert!(session.method_at(Address::from(CODE_END - 1)).is_some());
    assert!(session.method_at(Address::from(CODE_END)).is_none());
    assert!(session.method_at(Address::from(CODE_START - 1)).is_none());

    assert_eq!(session.methods_matching(&Regex::new(r"^Foo\.bar").unwrap()).len(), 1);
    assert!(session.methods_matching(&Regex::new("Baz").unwrap()).is_empty());

    assert!(session.reload().is_empty());
    assert_eq!(session.registry().len(), 1);

    session.clear();
    assert!(session.method_at(Address::from(CODE_START)).is_none());
}

#[test]
fn test_unsupported_target_is_refused()
{
    let err = JitSession::new(Architecture::X86_64, MemoryImage::new(), SymbolTable::new(), SessionConfig::default())
        .unwrap_err();
    assert!(matches!(err, JitError::UnsupportedTarget(Architecture::X86_64)));

    let err = JitSession::new(Architecture::Arm64, MemoryImage::new(), SymbolTable::new(), SessionConfig::default())
        .unwrap_err();
    assert!(matches!(err, JitError::UnsupportedTarget(_)));
}
