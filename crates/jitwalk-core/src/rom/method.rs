//! Method record view and optional-section walker.
//!
//! A method record is laid out as:
//!
//! ```text
//! +--------------------+  record address
//! | header (20 bytes)  |
//! +--------------------+  bytecode start
//! | bytecodes          |
//! | padding to 4       |
//! +--------------------+  first optional section
//! | extended modifiers |  u32                       if HAS_EXTENDED_MODIFIERS
//! | generic signature  |  self-relative pointer     if HAS_GENERIC_SIGNATURE
//! | exception info     |  header + handlers + names if HAS_EXCEPTION_INFO
//! | method annotations |  length-prefixed           if HAS_METHOD_ANNOTATIONS
//! | param annotations  |  length-prefixed           if HAS_PARAMETER_ANNOTATIONS
//! | default annotation |  length-prefixed           if HAS_DEFAULT_ANNOTATION
//! | method type annos  |  length-prefixed           if ext HAS_METHOD_TYPE_ANNOTATIONS
//! | code type annos    |  length-prefixed           if ext HAS_CODE_TYPE_ANNOTATIONS
//! | debug info         |                            if HAS_DEBUG_INFO
//! +--------------------+
//! ```
//!
//! Sections have no index. The address of a section is only known after
//! skipping every present section before it, in this order.

use std::fmt;

use super::debug_info::MethodDebugInfo;
use super::modifiers::{ExtendedModifiers, MethodModifiers};
use super::read_utf8;
use crate::error::{JitError, JitResult};
use crate::memory::MemoryAccess;
use crate::types::Address;

/// Size of the fixed method record header.
pub const ROM_METHOD_HEADER_SIZE: u64 = 20;
/// Size of the exception info header (`catch_count: u16`, `throw_count: u16`).
pub const EXCEPTION_INFO_HEADER_SIZE: u64 = 4;
/// Size of one exception handler entry.
pub const EXCEPTION_HANDLER_SIZE: u64 = 16;
/// Size of one thrown-exception name pointer.
pub const THROW_NAME_SIZE: u64 = 4;

/// Optional sections in record order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind
{
    ExtendedModifiers,
    GenericSignature,
    ExceptionInfo,
    MethodAnnotations,
    ParameterAnnotations,
    DefaultAnnotation,
    MethodTypeAnnotations,
    CodeTypeAnnotations,
    DebugInfo,
}

impl fmt::Display for SectionKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            SectionKind::ExtendedModifiers => "extended modifiers",
            SectionKind::GenericSignature => "generic signature",
            SectionKind::ExceptionInfo => "exception info",
            SectionKind::MethodAnnotations => "method annotations",
            SectionKind::ParameterAnnotations => "parameter annotations",
            SectionKind::DefaultAnnotation => "default annotation",
            SectionKind::MethodTypeAnnotations => "method type annotations",
            SectionKind::CodeTypeAnnotations => "code type annotations",
            SectionKind::DebugInfo => "debug info",
        };
        f.write_str(label)
    }
}

/// Which flag announces a section.
#[derive(Debug, Clone, Copy)]
enum Presence
{
    Modifier(MethodModifiers),
    Extended(ExtendedModifiers),
}

/// How many bytes a present section occupies.
#[derive(Debug, Clone, Copy)]
enum SizeRule
{
    /// A single 32-bit word.
    Word,
    /// `u32` length, data, padding to 4 bytes.
    LengthPrefixed,
    /// Exception info header, handlers, and thrown-name pointers.
    ExceptionInfo,
    /// Last section; nothing follows it.
    Terminal,
}

/// The walk order: every entry is a presence test and a size rule.
const SECTION_ORDER: [(SectionKind, Presence, SizeRule); 9] = [
    (
        SectionKind::ExtendedModifiers,
        Presence::Modifier(MethodModifiers::HAS_EXTENDED_MODIFIERS),
        SizeRule::Word,
    ),
    (
        SectionKind::GenericSignature,
        Presence::Modifier(MethodModifiers::HAS_GENERIC_SIGNATURE),
        SizeRule::Word,
    ),
    (
        SectionKind::ExceptionInfo,
        Presence::Modifier(MethodModifiers::HAS_EXCEPTION_INFO),
        SizeRule::ExceptionInfo,
    ),
    (
        SectionKind::MethodAnnotations,
        Presence::Modifier(MethodModifiers::HAS_METHOD_ANNOTATIONS),
        SizeRule::LengthPrefixed,
    ),
    (
        SectionKind::ParameterAnnotations,
        Presence::Modifier(MethodModifiers::HAS_PARAMETER_ANNOTATIONS),
        SizeRule::LengthPrefixed,
    ),
    (
        SectionKind::DefaultAnnotation,
        Presence::Modifier(MethodModifiers::HAS_DEFAULT_ANNOTATION),
        SizeRule::LengthPrefixed,
    ),
    (
        SectionKind::MethodTypeAnnotations,
        Presence::Extended(ExtendedModifiers::HAS_METHOD_TYPE_ANNOTATIONS),
        SizeRule::LengthPrefixed,
    ),
    (
        SectionKind::CodeTypeAnnotations,
        Presence::Extended(ExtendedModifiers::HAS_CODE_TYPE_ANNOTATIONS),
        SizeRule::LengthPrefixed,
    ),
    (SectionKind::DebugInfo, Presence::Modifier(MethodModifiers::HAS_DEBUG_INFO), SizeRule::Terminal),
];

/// Round `size` up to a multiple of 4.
pub const fn round_up4(size: u64) -> u64
{
    (size + 3) & !3
}

/// Fixed header of a method record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RomMethodHeader
{
    pub name_srp: i32,
    pub signature_srp: i32,
    pub modifiers: u32,
    pub max_stack: u16,
    pub bytecode_size_low: u16,
    pub bytecode_size_high: u8,
    pub arg_count: u8,
    pub temp_count: u16,
}

impl RomMethodHeader
{
    /// Decode the 20 header bytes.
    pub fn parse(bytes: &[u8; ROM_METHOD_HEADER_SIZE as usize]) -> Self
    {
        let i32_at = |at: usize| i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        Self {
            name_srp: i32_at(0),
            signature_srp: i32_at(4),
            modifiers: i32_at(8) as u32,
            max_stack: u16_at(12),
            bytecode_size_low: u16_at(14),
            bytecode_size_high: bytes[16],
            arg_count: bytes[17],
            temp_count: u16_at(18),
        }
    }

    /// Bytecode length in bytes: `low + (high << 16)`.
    pub fn bytecode_size(&self) -> u64
    {
        u64::from(self.bytecode_size_low) + (u64::from(self.bytecode_size_high) << 16)
    }
}

/// Summary of an exception info section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionInfo
{
    pub address: Address,
    pub catch_count: u16,
    pub throw_count: u16,
}

impl ExceptionInfo
{
    /// Total section size: header, handlers, thrown-name pointers.
    pub fn size(&self) -> u64
    {
        EXCEPTION_INFO_HEADER_SIZE
            + u64::from(self.catch_count) * EXCEPTION_HANDLER_SIZE
            + u64::from(self.throw_count) * THROW_NAME_SIZE
    }
}

/// Addresses of every optional section of one method record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionLayout
{
    record: Address,
    offsets: [Option<Address>; SECTION_ORDER.len()],
    extended_modifiers: ExtendedModifiers,
    exception_info: Option<ExceptionInfo>,
}

impl SectionLayout
{
    /// Address of `kind`, or `None` if its flag is unset.
    pub fn address_of(&self, kind: SectionKind) -> Option<Address>
    {
        SECTION_ORDER
            .iter()
            .position(|(candidate, _, _)| *candidate == kind)
            .and_then(|index| self.offsets[index])
    }

    /// Offset of `kind` from the start of the record.
    pub fn offset_of(&self, kind: SectionKind) -> Option<u64>
    {
        self.address_of(kind)
            .and_then(|address| address.distance_from(self.record))
    }

    pub fn extended_modifiers(&self) -> ExtendedModifiers
    {
        self.extended_modifiers
    }

    pub fn exception_info(&self) -> Option<ExceptionInfo>
    {
        self.exception_info
    }

    /// Sections present in the record, in record order.
    pub fn present(&self) -> impl Iterator<Item = (SectionKind, Address)> + '_
    {
        SECTION_ORDER
            .iter()
            .zip(self.offsets.iter())
            .filter_map(|((kind, _, _), address)| address.map(|address| (*kind, address)))
    }
}

/// Read-only view of a method record in the inspected process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RomMethod
{
    address: Address,
    header: RomMethodHeader,
}

impl RomMethod
{
    /// Read the record header at `address`.
    ///
    /// ## Errors
    ///
    /// Returns `MemoryFault` if the header is unreadable.
    pub fn read<M: MemoryAccess>(memory: &M, address: Address) -> JitResult<Self>
    {
        let bytes = memory.read_array::<{ ROM_METHOD_HEADER_SIZE as usize }>(address)?;
        Ok(Self {
            address,
            header: RomMethodHeader::parse(&bytes),
        })
    }

    /// Locate the record that owns the bytecodes at `bytecodes`.
    ///
    /// Linked methods point at their bytecodes; the header sits right before them.
    pub fn from_bytecodes<M: MemoryAccess>(memory: &M, bytecodes: Address) -> JitResult<Self>
    {
        Self::read(memory, bytecodes - ROM_METHOD_HEADER_SIZE)
    }

    pub fn address(&self) -> Address
    {
        self.address
    }

    pub fn header(&self) -> &RomMethodHeader
    {
        &self.header
    }

    pub fn modifiers(&self) -> MethodModifiers
    {
        MethodModifiers::from_raw(self.header.modifiers)
    }

    pub fn bytecode_start(&self) -> Address
    {
        self.address + ROM_METHOD_HEADER_SIZE
    }

    pub fn bytecode_size(&self) -> u64
    {
        self.header.bytecode_size()
    }

    /// End of the bytecodes rounded up to 4 bytes: where optional sections begin.
    pub fn sections_start(&self) -> Address
    {
        self.bytecode_start() + round_up4(self.bytecode_size())
    }

    /// Method name, through the header's self-relative pointer.
    pub fn name<M: MemoryAccess>(&self, memory: &M) -> JitResult<String>
    {
        read_utf8(memory, self.address.offset(i64::from(self.header.name_srp)))
    }

    /// Method signature, through the header's self-relative pointer.
    pub fn signature<M: MemoryAccess>(&self, memory: &M) -> JitResult<String>
    {
        read_utf8(memory, (self.address + 4).offset(i64::from(self.header.signature_srp)))
    }

    /// Walk the optional sections and record where each one starts.
    ///
    /// ## Errors
    ///
    /// Returns `MalformedRecord` if a section is flagged present but its
    /// bytes cannot be read.
    pub fn sections<M: MemoryAccess>(&self, memory: &M) -> JitResult<SectionLayout>
    {
        let modifiers = self.modifiers();
        let mut layout = SectionLayout {
            record: self.address,
            offsets: [None; SECTION_ORDER.len()],
            extended_modifiers: ExtendedModifiers::empty(),
            exception_info: None,
        };
        let mut cursor = self.sections_start();

        for (index, (kind, presence, size_rule)) in SECTION_ORDER.iter().enumerate() {
            let present = match presence {
                Presence::Modifier(flag) => modifiers.contains(*flag),
                Presence::Extended(flag) => layout.extended_modifiers.contains(*flag),
            };
            if !present {
                continue;
            }
            layout.offsets[index] = Some(cursor);
            tracing::trace!(record = %self.address, section = %kind, address = %cursor, "method record section");

            let size = match size_rule {
                SizeRule::Word => {
                    let word = memory.read_u32(cursor).map_err(|err| self.unreadable(*kind, &err))?;
                    // later presence tests depend on this word
                    if *kind == SectionKind::ExtendedModifiers {
                        layout.extended_modifiers = ExtendedModifiers::from_bits_truncate(word);
                    }
                    4
                }
                SizeRule::LengthPrefixed => self.length_prefixed_size(memory, *kind, cursor)?,
                SizeRule::ExceptionInfo => {
                    let info = self.exception_info_at(memory, cursor)?;
                    layout.exception_info = Some(info);
                    info.size()
                }
                SizeRule::Terminal => 0,
            };
            cursor = cursor + size;
        }

        Ok(layout)
    }

    /// Address of one section, or `None` if it is absent.
    pub fn section<M: MemoryAccess>(&self, memory: &M, kind: SectionKind) -> JitResult<Option<Address>>
    {
        Ok(self.sections(memory)?.address_of(kind))
    }

    /// Debug info header, if the record has one.
    pub fn debug_info<M: MemoryAccess>(&self, memory: &M) -> JitResult<Option<MethodDebugInfo>>
    {
        let Some(address) = self.section(memory, SectionKind::DebugInfo)? else {
            return Ok(None);
        };
        MethodDebugInfo::read(memory, address)
            .map(Some)
            .map_err(|err| self.unreadable(SectionKind::DebugInfo, &err))
    }

    /// Skip length, data, and padding of a length-prefixed section.
    fn length_prefixed_size<M: MemoryAccess>(&self, memory: &M, kind: SectionKind, at: Address) -> JitResult<u64>
    {
        let length = u64::from(memory.read_u32(at).map_err(|err| self.unreadable(kind, &err))?);
        if length > 0 {
            memory
                .read_u8(at + 4 + (length - 1))
                .map_err(|err| self.unreadable(kind, &err))?;
        }
        Ok(round_up4(length + 4))
    }

    fn exception_info_at<M: MemoryAccess>(&self, memory: &M, at: Address) -> JitResult<ExceptionInfo>
    {
        let kind = SectionKind::ExceptionInfo;
        let catch_count = memory.read_u16(at).map_err(|err| self.unreadable(kind, &err))?;
        let throw_count = memory.read_u16(at + 2).map_err(|err| self.unreadable(kind, &err))?;
        let info = ExceptionInfo {
            address: at,
            catch_count,
            throw_count,
        };
        if info.size() > EXCEPTION_INFO_HEADER_SIZE {
            memory
                .read_u8(at + (info.size() - 1))
                .map_err(|err| self.unreadable(kind, &err))?;
        }
        Ok(info)
    }

    fn unreadable(&self, kind: SectionKind, err: &JitError) -> JitError
    {
        JitError::malformed(
            format!("method record at {}", self.address),
            format!("{kind} flagged present but unreadable: {err}"),
        )
    }
}
