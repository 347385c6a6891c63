//! ELF symbol loading.

use std::fs;
use std::path::PathBuf;

use object::{Object, ObjectSegment, ObjectSymbol, SymbolKind};
use serde::{Deserialize, Serialize};

use super::{ModuleSymbols, SymbolEntry};
use crate::error::{JitError, JitResult};
use crate::types::{Address, Architecture};

/// Describes a binary image mapped in the inspected process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescriptor
{
    pub path: PathBuf,
    /// Runtime address of the image's lowest loadable segment
    pub load_address: Address,
}

impl ImageDescriptor
{
    /// Read the image and collect its defined symbols at their runtime addresses.
    ///
    /// Both `.symtab` and `.dynsym` are used, so stripped shared libraries
    /// still resolve their exported functions.
    ///
    /// ## Errors
    ///
    /// - `Io` if the file cannot be read
    /// - `Object` if it is not a parsable object file
    /// - `UnsupportedTarget` if it was built for another architecture
    pub fn load(&self) -> JitResult<ModuleSymbols>
    {
        let bytes = fs::read(&self.path)?;
        let file = object::File::parse(&*bytes)?;

        match file.architecture() {
            object::Architecture::Riscv64 => {}
            object::Architecture::Aarch64 => return Err(JitError::UnsupportedTarget(Architecture::Arm64)),
            object::Architecture::X86_64 => return Err(JitError::UnsupportedTarget(Architecture::X86_64)),
            other => {
                return Err(JitError::InvalidArgument(format!(
                    "{}: unrecognised architecture {other:?}",
                    self.path.display()
                )))
            }
        }

        let base_vmaddr = file.segments().map(|segment| segment.address()).min().unwrap_or(0);
        let size = file
            .segments()
            .map(|segment| segment.address().saturating_add(segment.size()))
            .max()
            .unwrap_or(base_vmaddr)
            .saturating_sub(base_vmaddr);
        let slide = self.load_address.value().wrapping_sub(base_vmaddr);
        let range = (size > 0).then(|| (self.load_address, self.load_address + size));

        let mut module = ModuleSymbols::new(self.path.to_string_lossy(), range);
        for symbol in file.symbols().chain(file.dynamic_symbols()) {
            if !symbol.is_definition() || !matches!(symbol.kind(), SymbolKind::Text | SymbolKind::Data) {
                continue;
            }
            let Ok(name) = symbol.name() else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            module.push(SymbolEntry {
                name: name.to_string(),
                address: Address::from(symbol.address().wrapping_add(slide)),
                size: symbol.size(),
            });
        }

        tracing::info!(
            image = %self.path.display(),
            load_address = %self.load_address,
            symbols = module.symbols().len(),
            "loaded image symbols"
        );
        Ok(module)
    }
}
