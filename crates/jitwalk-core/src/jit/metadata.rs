//! Compiled method metadata and compile-success events.

use serde::{Deserialize, Serialize};

use super::instruction::Instruction;
use crate::error::JitResult;
use crate::memory::MemoryAccess;
use crate::rom::{read_utf8, RomMethod};
use crate::types::Address;

/// Metadata the JIT publishes for every compiled method.
///
/// The three name fields point at length-prefixed strings. `ram_method`
/// points at the linked method, whose first word is the address of the
/// bytecodes inside the method record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledMethodMetadata
{
    pub start_pc: Address,
    /// One past the last byte of compiled code
    pub end_pc: Address,
    /// Frame slots: return address, saved registers, temporaries, outgoing arguments
    pub total_frame_size: u32,
    /// Parameter slots, including the receiver
    pub slots: u32,
    pub class_name: Address,
    pub method_name: Address,
    pub method_signature: Address,
    pub ram_method: Address,
}

impl CompiledMethodMetadata
{
    /// Follow the linked method back to its method record.
    pub fn rom_method<M: MemoryAccess>(&self, memory: &M) -> JitResult<RomMethod>
    {
        let bytecodes = Address::from(memory.read_u64(self.ram_method)?);
        RomMethod::from_bytecodes(memory, bytecodes)
    }

    pub fn contains(&self, pc: Address) -> bool
    {
        self.start_pc <= pc && pc < self.end_pc
    }
}

/// Class, method, and signature of a compiled method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodNames
{
    pub class_name: String,
    pub method_name: String,
    pub signature: String,
}

impl MethodNames
{
    pub fn read<M: MemoryAccess>(memory: &M, metadata: &CompiledMethodMetadata) -> JitResult<Self>
    {
        Ok(Self {
            class_name: read_utf8(memory, metadata.class_name)?,
            method_name: read_utf8(memory, metadata.method_name)?,
            signature: read_utf8(memory, metadata.method_signature)?,
        })
    }

    /// Stand-in names for a method whose strings cannot be read.
    pub fn placeholder(metadata: &CompiledMethodMetadata) -> Self
    {
        Self {
            class_name: "<unknown>".to_string(),
            method_name: format!("jit_{:x}", metadata.start_pc),
            signature: String::new(),
        }
    }

    /// `Class.method(signature)`
    pub fn qualified(&self) -> String
    {
        format!("{}.{}{}", self.class_name, self.method_name, self.signature)
    }
}

/// Everything the JIT hands over when a compilation succeeds.
///
/// The instruction list only lives as long as the compilation, so it must be
/// consumed while handling this event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileEvent
{
    pub metadata: CompiledMethodMetadata,
    pub instructions: Vec<Instruction>,
}
