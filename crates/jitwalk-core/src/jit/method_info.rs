//! Symbolic record of one compiled method.

use std::fmt;

use super::instruction::{build_bytecode_table, BytecodeTable};
use super::metadata::{CompileEvent, CompiledMethodMetadata, MethodNames};
use super::prologue::{PrologueInfo, PrologueShape};
use crate::error::{JitError, JitResult};
use crate::memory::MemoryAccess;
use crate::range_map::RangeMap;
use crate::rom::decode_line_table;
use crate::types::{Address, SourceLocation};

/// Bytecode index → source line map.
pub type LineTable = RangeMap<u32, i32>;

/// One row of a method's PC → line table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTableEntry
{
    pub line: i32,
    pub pc: Address,
    /// A good place for a line breakpoint
    pub is_statement: bool,
    /// First instruction after the prologue
    pub is_prologue_end: bool,
}

/// Everything needed to symbolicate and unwind one compiled method
///
/// Built once when the compilation succeeds and never modified afterwards.
/// A recompilation of the same Java method produces a new `MethodInfo`.
#[derive(Debug, Clone)]
pub struct MethodInfo
{
    metadata: CompiledMethodMetadata,
    names: MethodNames,
    name: String,
    bytecode_table: BytecodeTable,
    line_table: Option<LineTable>,
    prologue: PrologueInfo,
    shape: &'static dyn PrologueShape,
}

impl MethodInfo
{
    /// Build the record for a compile event.
    ///
    /// The bytecode table is taken from the event's instruction list, which
    /// is gone once the compilation finishes.
    pub fn from_compile_event<M: MemoryAccess>(
        memory: &M,
        event: &CompileEvent,
        shape: &'static dyn PrologueShape,
    ) -> JitResult<Self>
    {
        let bytecode_table = build_bytecode_table(&event.instructions)?;
        Self::build(memory, event.metadata, bytecode_table, shape)
    }

    /// Build the record from metadata and an already captured bytecode table.
    ///
    /// ## Errors
    ///
    /// - `MemoryFault` if the method names or the method record are unreadable
    /// - `MalformedRecord` if the record's sections or line table cannot be decoded
    pub fn build<M: MemoryAccess>(
        memory: &M,
        metadata: CompiledMethodMetadata,
        bytecode_table: BytecodeTable,
        shape: &'static dyn PrologueShape,
    ) -> JitResult<Self>
    {
        let names = MethodNames::read(memory, &metadata)?;
        let name = names.qualified();

        let rom_method = metadata.rom_method(memory)?;
        let line_table = match rom_method.debug_info(memory)? {
            Some(debug_info) => decode_line_table(memory, &debug_info, &name)?,
            None => None,
        };

        Ok(Self {
            prologue: shape.prologue(metadata.start_pc, metadata.slots),
            metadata,
            names,
            name,
            bytecode_table,
            line_table,
            shape,
        })
    }

    /// Record without line information, for methods whose record is malformed.
    ///
    /// Names are read when possible and replaced by placeholders otherwise.
    /// The method can still be unwound.
    pub fn unsymbolicated<M: MemoryAccess>(
        memory: &M,
        metadata: CompiledMethodMetadata,
        bytecode_table: BytecodeTable,
        shape: &'static dyn PrologueShape,
    ) -> Self
    {
        let names = MethodNames::read(memory, &metadata).unwrap_or_else(|_| MethodNames::placeholder(&metadata));
        Self {
            name: names.qualified(),
            prologue: shape.prologue(metadata.start_pc, metadata.slots),
            metadata,
            names,
            bytecode_table,
            line_table: None,
            shape,
        }
    }

    /// Recreate this record after the inspected image was reloaded.
    ///
    /// Uses the bytecode table captured at compile time; the instruction list
    /// cannot be scanned again.
    pub fn rebuild<M: MemoryAccess>(&self, memory: &M) -> JitResult<Self>
    {
        Self::build(memory, self.metadata, self.bytecode_table.clone(), self.shape)
    }

    /// `Class.method(signature)`
    pub fn name(&self) -> &str
    {
        &self.name
    }

    pub fn names(&self) -> &MethodNames
    {
        &self.names
    }

    pub fn metadata(&self) -> &CompiledMethodMetadata
    {
        &self.metadata
    }

    pub fn start_pc(&self) -> Address
    {
        self.metadata.start_pc
    }

    pub fn end_pc(&self) -> Address
    {
        self.metadata.end_pc
    }

    /// Frame slots: return address, saved registers, temporaries, outgoing arguments.
    pub fn frame_slots(&self) -> u32
    {
        self.metadata.total_frame_size
    }

    /// Parameter slots, including the receiver.
    pub fn param_slots(&self) -> u32
    {
        self.metadata.slots
    }

    /// Frame size in bytes: every slot plus the spilled return address.
    pub fn frame_size_bytes(&self) -> u64
    {
        let word = u64::from(self.shape.architecture().pointer_size_bytes());
        u64::from(self.frame_slots()) * word + word
    }

    pub fn prologue(&self) -> &PrologueInfo
    {
        &self.prologue
    }

    pub fn shape(&self) -> &'static dyn PrologueShape
    {
        self.shape
    }

    pub fn bytecode_table(&self) -> &BytecodeTable
    {
        &self.bytecode_table
    }

    pub fn line_table(&self) -> Option<&LineTable>
    {
        self.line_table.as_ref()
    }

    /// `Class.java`, the runtime's guess at the source file.
    pub fn source_file(&self) -> String
    {
        format!("{}.java", self.names.class_name)
    }

    /// Is `pc` inside `[start_pc, end_pc)`?
    pub fn contains(&self, pc: Address) -> bool
    {
        self.metadata.contains(pc)
    }

    /// Source line executing at `pc`.
    ///
    /// ## Errors
    ///
    /// Returns `NotFound` if the method has no line table or `pc` precedes
    /// the first mapped instruction.
    pub fn line_for_pc(&self, pc: Address) -> JitResult<i32>
    {
        let lines = self
            .line_table
            .as_ref()
            .ok_or_else(|| JitError::NotFound(format!("no line information for {}", self.name)))?;
        let bytecode_index = self.bytecode_table.get(pc)?;
        lines.get(bytecode_index)
    }

    /// Source location of `pc`; the line is omitted when unknown.
    pub fn location_for_pc(&self, pc: Address) -> SourceLocation
    {
        SourceLocation {
            file: self.source_file(),
            line: self.line_for_pc(pc).ok(),
        }
    }

    /// One entry per instruction in `[start_pc, end_pc)`.
    ///
    /// Instructions without a line are left out.
    ///
    /// ## Errors
    ///
    /// Returns `NotFound` if the method has no line table.
    pub fn full_line_table(&self) -> JitResult<Vec<LineTableEntry>>
    {
        if self.line_table.is_none() {
            return Err(JitError::NotFound(format!("no line information for {}", self.name)));
        }

        let frame_built = self.prologue.frame_built;
        let width = self.shape.instruction_width();
        let mut entries = Vec::new();
        let mut pc = self.start_pc();
        while pc < self.end_pc() {
            if let Ok(line) = self.line_for_pc(pc) {
                entries.push(LineTableEntry {
                    line,
                    pc,
                    is_statement: pc >= frame_built,
                    is_prologue_end: pc == frame_built,
                });
            }
            pc = pc + width;
        }
        Ok(entries)
    }
}

impl fmt::Display for MethodInfo
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{:#x} - {:#x} '{}'", self.start_pc(), self.end_pc(), self.name)
    }
}
