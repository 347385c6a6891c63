//! PC-keyed registry of compiled methods.

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;

use super::method_info::MethodInfo;
use crate::error::JitError;
use crate::memory::MemoryAccess;
use crate::types::Address;

/// Registered compiled methods, keyed by start PC
///
/// Ranges never overlap: registering a method evicts every method whose code
/// range intersects the new one (the old code was freed and reused).
#[derive(Debug, Default, Clone)]
pub struct MethodRegistry
{
    methods: BTreeMap<Address, Arc<MethodInfo>>,
}

impl MethodRegistry
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Add `method`, replacing any method whose code range overlaps it.
    pub fn register(&mut self, method: MethodInfo) -> Arc<MethodInfo>
    {
        let (start, end) = (method.start_pc(), method.end_pc());
        let evicted: Vec<Address> = self
            .methods
            .range(..end)
            .rev()
            .take_while(|(_, existing)| existing.end_pc() > start)
            .map(|(key, _)| *key)
            .collect();
        for key in evicted {
            if let Some(old) = self.methods.remove(&key) {
                tracing::debug!(old = old.name(), new = method.name(), "replacing overlapping method");
            }
        }

        let method = Arc::new(method);
        self.methods.insert(start, Arc::clone(&method));
        method
    }

    /// Method whose `[start_pc, end_pc)` contains `pc`.
    pub fn lookup_by_pc(&self, pc: Address) -> Option<Arc<MethodInfo>>
    {
        self.methods
            .range(..=pc)
            .next_back()
            .filter(|(_, method)| method.contains(pc))
            .map(|(_, method)| Arc::clone(method))
    }

    /// Methods whose qualified name matches `pattern`, in PC order.
    pub fn lookup_by_name(&self, pattern: &Regex) -> Vec<Arc<MethodInfo>>
    {
        self.methods
            .values()
            .filter(|method| pattern.is_match(method.name()))
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<MethodInfo>> + '_
    {
        self.methods.values()
    }

    pub fn len(&self) -> usize
    {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.methods.is_empty()
    }

    pub fn clear(&mut self)
    {
        self.methods.clear();
    }

    /// Rebuild every method after the inspected image was reloaded.
    ///
    /// A method that fails to rebuild keeps its previous record. The failures
    /// are returned so the caller can report them.
    pub fn reload<M: MemoryAccess>(&mut self, memory: &M) -> Vec<JitError>
    {
        let mut failures = Vec::new();
        for method in self.methods.values_mut() {
            match method.rebuild(memory) {
                Ok(rebuilt) => *method = Arc::new(rebuilt),
                Err(err) => {
                    tracing::warn!(method = method.name(), error = %err, "keeping stale method after reload");
                    failures.push(err);
                }
            }
        }
        tracing::info!(methods = self.methods.len(), failed = failures.len(), "reloaded compiled methods");
        failures
    }
}
