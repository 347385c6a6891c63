//! # Process Snapshots
//!
//! A stopped process captured as JSON: registers of the current thread,
//! memory segments, native symbols, and the compile events the JIT reported.
//!
//! ```json
//! {
//!   "architecture": "riscv64",
//!   "registers": { "pc": 16420, "s11": 32736, "ra": 0, "sp": 1073737728 },
//!   "memory": [ { "base": 16384, "bytes": "1300000067800000" } ],
//!   "symbols": [
//!     { "module": "libj9vm29.so", "symbols": [ { "name": "cInterpreter", "address": 36864 } ] }
//!   ],
//!   "images": [ { "path": "/opt/openj9/lib/default/libj9jit29.so", "load_address": 1073741824 } ],
//!   "compile_events": []
//! }
//! ```
//!
//! Segment bytes are hex strings; whitespace inside them is ignored.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::JitResult;
use crate::jit::CompileEvent;
use crate::memory::{MemoryAccess, MemoryImage};
use crate::symbols::{ImageDescriptor, ModuleSymbols, SymbolEntry, SymbolTable};
use crate::types::{Address, Architecture, RegisterId, Registers};
use crate::unwind::PendingFrame;

/// Captured memory block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSegment
{
    pub base: Address,
    #[serde(with = "hex_bytes")]
    pub bytes: Vec<u8>,
}

/// Symbols listed for one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotModule
{
    pub module: String,
    pub symbols: Vec<SymbolEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotFile
{
    architecture: Architecture,
    #[serde(default)]
    registers: BTreeMap<String, u64>,
    #[serde(default)]
    memory: Vec<SnapshotSegment>,
    #[serde(default)]
    symbols: Vec<SnapshotModule>,
    #[serde(default)]
    images: Vec<ImageDescriptor>,
    #[serde(default)]
    compile_events: Vec<CompileEvent>,
}

/// A stopped process loaded from a snapshot file.
#[derive(Debug, Clone)]
pub struct Snapshot
{
    architecture: Architecture,
    registers: Registers,
    memory: MemoryImage,
    symbols: Vec<SnapshotModule>,
    images: Vec<ImageDescriptor>,
    compile_events: Vec<CompileEvent>,
}

impl Snapshot
{
    /// Parse a snapshot from JSON.
    ///
    /// ## Errors
    ///
    /// - `Snapshot` if the JSON does not describe a snapshot
    /// - `UnknownRegister` if a register name is not a RISC-V register
    pub fn from_json(json: &str) -> JitResult<Self>
    {
        let file: SnapshotFile = serde_json::from_str(json)?;
        let registers = Registers::from_named(file.registers.iter().map(|(name, value)| (name.as_str(), *value)))?;

        let mut memory = MemoryImage::new();
        for segment in file.memory {
            memory.map(segment.base, segment.bytes);
        }

        tracing::debug!(
            architecture = %file.architecture,
            segments = memory.segments().len(),
            compile_events = file.compile_events.len(),
            "parsed snapshot"
        );
        Ok(Self {
            architecture: file.architecture,
            registers,
            memory,
            symbols: file.symbols,
            images: file.images,
            compile_events: file.compile_events,
        })
    }

    /// Read and parse a snapshot file.
    pub fn load(path: impl AsRef<Path>) -> JitResult<Self>
    {
        let json = fs::read_to_string(path.as_ref())?;
        tracing::info!(path = %path.as_ref().display(), "loading snapshot");
        Self::from_json(&json)
    }

    /// Serialize back to JSON.
    pub fn to_json(&self) -> JitResult<String>
    {
        let file = SnapshotFile {
            architecture: self.architecture,
            registers: (0..32u8)
                .map(RegisterId::X)
                .chain([RegisterId::Pc])
                .map(|id| (id.abi_name().to_string(), self.registers.get(id)))
                .filter(|(_, value)| *value != 0)
                .collect(),
            memory: self
                .memory
                .segments()
                .iter()
                .map(|segment| SnapshotSegment {
                    base: segment.base,
                    bytes: segment.bytes.clone(),
                })
                .collect(),
            symbols: self.symbols.clone(),
            images: self.images.clone(),
            compile_events: self.compile_events.clone(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    pub fn architecture(&self) -> Architecture
    {
        self.architecture
    }

    /// Registers of the stopped thread.
    pub fn registers(&self) -> &Registers
    {
        &self.registers
    }

    pub fn memory(&self) -> &MemoryImage
    {
        &self.memory
    }

    pub fn compile_events(&self) -> &[CompileEvent]
    {
        &self.compile_events
    }

    /// Native symbols: listed entries plus every listed image.
    ///
    /// An image that cannot be loaded is skipped with a warning.
    pub fn symbol_table(&self) -> SymbolTable
    {
        let mut table = SymbolTable::new();
        for listed in &self.symbols {
            let mut module = ModuleSymbols::new(listed.module.clone(), None);
            for entry in &listed.symbols {
                module.push(entry.clone());
            }
            table.add_module(module);
        }
        for image in &self.images {
            match image.load() {
                Ok(module) => table.add_module(module),
                Err(err) => tracing::warn!(image = %image.path.display(), error = %err, "skipping image"),
            }
        }
        table
    }
}

impl MemoryAccess for Snapshot
{
    fn read_bytes(&self, address: Address, buf: &mut [u8]) -> JitResult<()>
    {
        self.memory.read_bytes(address, buf)
    }
}

impl PendingFrame for Snapshot
{
    fn read_register(&self, register: RegisterId) -> JitResult<u64>
    {
        Ok(self.registers.get(register))
    }
}

mod hex_bytes
{
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    {
        let hex: String = bytes.iter().map(|byte| format!("{byte:02x}")).collect();
        serializer.serialize_str(&hex)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error>
    {
        let text = String::deserialize(deserializer)?;
        let digits: Vec<u8> = text.bytes().filter(|byte| !byte.is_ascii_whitespace()).collect();
        if digits.len() % 2 != 0 {
            return Err(D::Error::custom("hex string has an odd number of digits"));
        }
        digits
            .chunks(2)
            .map(|pair| {
                std::str::from_utf8(pair)
                    .ok()
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| D::Error::custom(format!("invalid hex byte {:?}", String::from_utf8_lossy(pair))))
            })
            .collect()
    }
}
