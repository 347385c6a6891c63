//! # Native Symbols
//!
//! Address → symbol resolution for native code in the inspected process.
//!
//! The JIT unwinder needs native symbols for exactly two things: recognising
//! a return address that lands in the return-to-interpreter trampoline, and
//! finding the address of the interpreter entry it substitutes. Frames that
//! the JIT unwinder declines are also named through this resolver.
//!
//! Symbols come from two places:
//! - Entries listed directly in a snapshot
//! - ELF images (`.symtab` and `.dynsym`), see [`image`]

pub mod image;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use image::ImageDescriptor;

use crate::types::{Address, ResolvedSymbol};

/// Native symbol lookups the unwinder and host walker rely on.
pub trait SymbolResolver
{
    /// Symbol covering `address`, with its owning module.
    fn resolve(&self, address: Address) -> Option<ResolvedSymbol>;

    /// Address of the global symbol `name`.
    fn lookup_global(&self, name: &str) -> Option<Address>;
}

impl<R: SymbolResolver + ?Sized> SymbolResolver for &R
{
    fn resolve(&self, address: Address) -> Option<ResolvedSymbol>
    {
        (**self).resolve(address)
    }

    fn lookup_global(&self, name: &str) -> Option<Address>
    {
        (**self).lookup_global(name)
    }
}

/// One native symbol at its runtime address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolEntry
{
    pub name: String,
    pub address: Address,
    /// Zero when the size is unknown; the symbol then extends to the next one
    #[serde(default)]
    pub size: u64,
}

impl SymbolEntry
{
    fn covers(&self, address: Address) -> bool
    {
        self.size == 0 || address < self.address + self.size
    }
}

/// Symbols of one loaded module, sorted by address.
#[derive(Debug, Clone, Default)]
pub struct ModuleSymbols
{
    /// Path or soname of the module
    pub name: String,
    /// Runtime address range of the module, if known
    pub range: Option<(Address, Address)>,
    symbols: Vec<SymbolEntry>,
}

impl ModuleSymbols
{
    pub fn new(name: impl Into<String>, range: Option<(Address, Address)>) -> Self
    {
        Self {
            name: name.into(),
            range,
            symbols: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: SymbolEntry)
    {
        let index = self.symbols.partition_point(|existing| existing.address <= entry.address);
        self.symbols.insert(index, entry);
    }

    pub fn symbols(&self) -> &[SymbolEntry]
    {
        &self.symbols
    }

    fn in_range(&self, address: Address) -> bool
    {
        match self.range {
            Some((start, end)) => start <= address && address < end,
            None => true,
        }
    }

    fn lookup(&self, address: Address) -> Option<&SymbolEntry>
    {
        if !self.in_range(address) {
            return None;
        }
        let upper = self.symbols.partition_point(|entry| entry.address <= address);
        let entry = self.symbols.get(upper.checked_sub(1)?)?;
        entry.covers(address).then_some(entry)
    }
}

/// Symbols of every module known to the session.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable
{
    modules: Vec<ModuleSymbols>,
    globals: HashMap<String, Address>,
}

impl SymbolTable
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Add a module's symbols, making each of them resolvable by name.
    pub fn add_module(&mut self, module: ModuleSymbols)
    {
        for entry in &module.symbols {
            self.globals.entry(entry.name.clone()).or_insert(entry.address);
        }
        tracing::debug!(module = %module.name, symbols = module.symbols.len(), "added module symbols");
        self.modules.push(module);
    }

    /// Add a single symbol to `module`, creating the module if needed.
    pub fn add_symbol(&mut self, module: &str, entry: SymbolEntry)
    {
        self.globals.entry(entry.name.clone()).or_insert(entry.address);
        match self.modules.iter_mut().find(|existing| existing.name == module) {
            Some(existing) => existing.push(entry),
            None => {
                let mut created = ModuleSymbols::new(module, None);
                created.push(entry);
                self.modules.push(created);
            }
        }
    }

    pub fn modules(&self) -> &[ModuleSymbols]
    {
        &self.modules
    }

    pub fn len(&self) -> usize
    {
        self.modules.iter().map(|module| module.symbols.len()).sum()
    }

    pub fn is_empty(&self) -> bool
    {
        self.len() == 0
    }
}

impl SymbolResolver for SymbolTable
{
    fn resolve(&self, address: Address) -> Option<ResolvedSymbol>
    {
        // closest preceding symbol across all modules
        self.modules
            .iter()
            .filter_map(|module| module.lookup(address).map(|entry| (module, entry)))
            .max_by_key(|(_, entry)| entry.address)
            .map(|(module, entry)| ResolvedSymbol {
                name: entry.name.clone(),
                module: Some(module.name.clone()),
                address: entry.address,
                offset: address.value() - entry.address.value(),
            })
    }

    fn lookup_global(&self, name: &str) -> Option<Address>
    {
        self.globals.get(name).copied()
    }
}
