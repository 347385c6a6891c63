//! Method record section walking against hand-built records.

use jitwalk_core::memory::MemoryImage;
use jitwalk_core::rom::debug_info::encode_entry;
use jitwalk_core::rom::method::round_up4;
use jitwalk_core::rom::{decode_line_table, ExtendedModifiers, MethodModifiers, RomMethod, SectionKind};
use jitwalk_core::types::Address;
use jitwalk_core::JitError;

const RECORD: u64 = 0x2000;

struct RecordBuilder
{
    bytes: Vec<u8>,
}

impl RecordBuilder
{
    fn new(modifiers: MethodModifiers, bytecode_size: u32) -> Self
    {
        let mut bytes = vec![0u8; 0x100];
        bytes[8..12].copy_from_slice(&modifiers.bits().to_le_bytes());
        bytes[14..16].copy_from_slice(&(bytecode_size as u16).to_le_bytes());
        bytes[16] = (bytecode_size >> 16) as u8;
        Self { bytes }
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> &mut Self
    {
        let at = offset as usize;
        self.bytes[at..at + data.len()].copy_from_slice(data);
        self
    }

    fn word(&mut self, offset: u64, value: u32) -> &mut Self
    {
        self.write(offset, &value.to_le_bytes())
    }

    fn image(&self) -> MemoryImage
    {
        let mut memory = MemoryImage::new();
        memory.map(Address::from(RECORD), self.bytes.clone());
        memory
    }
}

fn every_section() -> MethodModifiers
{
    MethodModifiers::HAS_EXTENDED_MODIFIERS
        | MethodModifiers::HAS_GENERIC_SIGNATURE
        | MethodModifiers::HAS_EXCEPTION_INFO
        | MethodModifiers::HAS_METHOD_ANNOTATIONS
        | MethodModifiers::HAS_PARAMETER_ANNOTATIONS
        | MethodModifiers::HAS_DEFAULT_ANNOTATION
        | MethodModifiers::HAS_DEBUG_INFO
}

/// Five bytecodes followed by every optional section.
fn full_record() -> RecordBuilder
{
    let mut record = RecordBuilder::new(every_section(), 5);
    record
        .word(0x1c, (ExtendedModifiers::HAS_METHOD_TYPE_ANNOTATIONS | ExtendedModifiers::HAS_CODE_TYPE_ANNOTATIONS).bits())
        .word(0x20, 0x40)
        // one handler, two thrown names
        .write(0x24, &[1, 0, 2, 0])
        .word(0x40, 3)
        .word(0x48, 0)
        .word(0x4c, 5)
        .word(0x58, 4)
        .word(0x60, 1)
        // odd count encoding: one entry, table one byte further out
        .word(0x6c, (1 << 1) | 1);
    let entry = encode_entry(7, 0).unwrap();
    record.write(0x75, &entry);
    record
}

#[test]
fn test_walk_every_section()
{
    let memory = full_record().image();
    let method = RomMethod::read(&memory, Address::from(RECORD)).unwrap();
    assert_eq!(method.bytecode_size(), 5);
    assert_eq!(method.sections_start(), Address::from(RECORD + 0x1c));

    let layout = method.sections(&memory).unwrap();
    let offsets: Vec<_> = layout
        .present()
        .map(|(kind, address)| (kind, address.distance_from(Address::from(RECORD)).unwrap()))
        .collect();
    assert_eq!(
        offsets,
        vec![
            (SectionKind::ExtendedModifiers, 0x1c),
            (SectionKind::GenericSignature, 0x20),
            (SectionKind::ExceptionInfo, 0x24),
            (SectionKind::MethodAnnotations, 0x40),
            (SectionKind::ParameterAnnotations, 0x48),
            (SectionKind::DefaultAnnotation, 0x4c),
            (SectionKind::MethodTypeAnnotations, 0x58),
            (SectionKind::CodeTypeAnnotations, 0x60),
            (SectionKind::DebugInfo, 0x68),
        ]
    );

    let exceptions = layout.exception_info().unwrap();
    assert_eq!((exceptions.catch_count, exceptions.throw_count), (1, 2));
    assert_eq!(exceptions.size(), 28);
    assert!(layout.extended_modifiers().contains(ExtendedModifiers::HAS_CODE_TYPE_ANNOTATIONS));
}

#[test]
fn test_debug_info_with_odd_count_encoding()
{
    let memory = full_record().image();
    let method = RomMethod::read(&memory, Address::from(RECORD)).unwrap();
    let debug_info = method.debug_info(&memory).unwrap().unwrap();

    assert_eq!(debug_info.address, Address::from(RECORD + 0x68));
    assert_eq!(debug_info.line_number_count(), 1);
    assert_eq!(debug_info.line_table_address(), Some(Address::from(RECORD + 0x75)));

    let table = decode_line_table(&memory, &debug_info, "Foo.full()V").unwrap().unwrap();
    assert_eq!(table.iter().collect::<Vec<_>>(), vec![(0, 7)]);
}

#[test]
fn test_absent_extended_modifiers_hide_type_annotations()
{
    // the extended word is what announces type annotations
    let modifiers = MethodModifiers::HAS_METHOD_ANNOTATIONS | MethodModifiers::HAS_DEBUG_INFO;
    let mut record = RecordBuilder::new(modifiers, 2);
    record.word(0x18, 6);
    let memory = record.image();

    let method = RomMethod::read(&memory, Address::from(RECORD)).unwrap();
    let layout = method.sections(&memory).unwrap();
    assert_eq!(layout.extended_modifiers(), ExtendedModifiers::empty());
    assert_eq!(layout.address_of(SectionKind::MethodTypeAnnotations), None);
    assert_eq!(layout.offset_of(SectionKind::DebugInfo), Some(0x18 + 12));
}

#[test]
fn test_debug_info_follows_bytecodes_rounded_to_four()
{
    for bytecode_size in [0u32, 1, 2, 3, 4, 5, 17, 0x1_0003] {
        let record = RecordBuilder::new(MethodModifiers::HAS_DEBUG_INFO, bytecode_size);
        let memory = record.image();
        let method = RomMethod::read(&memory, Address::from(RECORD)).unwrap();

        let expected = 20 + round_up4(u64::from(bytecode_size));
        let layout = method.sections(&memory).unwrap();
        assert_eq!(layout.offset_of(SectionKind::DebugInfo), Some(expected), "bytecode size {bytecode_size}");
        assert_eq!(expected % 4, 0);
    }
}

#[test]
fn test_no_debug_info()
{
    let memory = RecordBuilder::new(MethodModifiers::PUBLIC | MethodModifiers::STATIC, 8).image();
    let method = RomMethod::read(&memory, Address::from(RECORD)).unwrap();

    assert!(method.debug_info(&memory).unwrap().is_none());
    assert_eq!(method.sections(&memory).unwrap().present().count(), 0);
    assert_eq!(method.modifiers().access_keywords(), vec!["public", "static"]);
}

#[test]
fn test_truncated_section_is_malformed()
{
    let mut record = RecordBuilder::new(MethodModifiers::HAS_METHOD_ANNOTATIONS | MethodModifiers::HAS_DEBUG_INFO, 4);
    // annotation length runs past the end of the record
    record.word(0x18, 0x1000);
    let memory = record.image();

    let method = RomMethod::read(&memory, Address::from(RECORD)).unwrap();
    assert!(matches!(method.sections(&memory), Err(JitError::MalformedRecord { .. })));
    assert!(matches!(method.debug_info(&memory), Err(JitError::MalformedRecord { .. })));
}
