//! Symbol and source location types.

use std::fmt;

use super::Address;

/// A native symbol resolved for an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSymbol
{
    /// Linkage name of the symbol
    pub name: String,
    /// Path or soname of the module that defines the symbol, if known
    pub module: Option<String>,
    /// First address of the symbol
    pub address: Address,
    /// Offset of the resolved address from `address`
    pub offset: u64,
}

impl ResolvedSymbol
{
    /// Returns `true` if the owning module's path ends with `suffix`.
    pub fn module_ends_with(&self, suffix: &str) -> bool
    {
        self.module.as_deref().is_some_and(|module| module.ends_with(suffix))
    }
}

impl fmt::Display for ResolvedSymbol
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        if self.offset == 0 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}+{:#x}", self.name, self.offset)
        }
    }
}

/// Source code location for a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation
{
    /// Source file name (`Foo.java` for compiled Java methods)
    pub file: String,
    /// Line number, if known.
    pub line: Option<i32>,
}

impl SourceLocation
{
    /// Helper to build a location when only a file is known.
    pub fn from_file(file: impl Into<String>) -> Self
    {
        Self {
            file: file.into(),
            line: None,
        }
    }
}

impl fmt::Display for SourceLocation
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self.line {
            Some(line) => write!(f, "{}:{line}", self.file),
            None => write!(f, "{}", self.file),
        }
    }
}
