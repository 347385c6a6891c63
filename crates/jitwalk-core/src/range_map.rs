//! # Range Map
//!
//! Append-only map from sorted integer keys to values, answering "which value
//! is active at or before this key". Used for PC → bytecode index and
//! bytecode index → line number tables.

use std::fmt;

use crate::error::{JitError, JitResult};

/// Sorted key → value association with floor lookup
///
/// Keys must be inserted in strictly increasing order. A lookup returns the
/// value of the greatest key that is less than or equal to the lookup key.
///
/// ## Example
///
/// ```rust
/// use jitwalk_core::range_map::RangeMap;
///
/// let mut lines = RangeMap::new();
/// lines.put(0u32, 10).unwrap();
/// lines.put(4u32, 11).unwrap();
///
/// assert_eq!(lines.get(3).unwrap(), 10);
/// assert_eq!(lines.get(4).unwrap(), 11);
/// assert_eq!(lines.get(400).unwrap(), 11);
/// assert!(lines.put(2u32, 12).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeMap<K, V>
{
    entries: Vec<(K, V)>,
}

impl<K, V> Default for RangeMap<K, V>
{
    fn default() -> Self
    {
        Self { entries: Vec::new() }
    }
}

impl<K, V> RangeMap<K, V>
where
    K: Copy + Ord + fmt::Debug,
    V: Copy,
{
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Build a map from pairs that are already in increasing key order.
    ///
    /// ## Errors
    ///
    /// Returns `KeyOrder` on the first key that does not increase.
    pub fn from_entries<I>(entries: I) -> JitResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut map = Self::new();
        for (key, value) in entries {
            map.put(key, value)?;
        }
        Ok(map)
    }

    /// Append `key → value`.
    ///
    /// ## Errors
    ///
    /// Returns `KeyOrder` if `key` is not greater than every key already inserted.
    pub fn put(&mut self, key: K, value: V) -> JitResult<()>
    {
        if let Some((last, _)) = self.entries.last() {
            if key <= *last {
                return Err(JitError::KeyOrder {
                    key: format!("{key:?}"),
                    last: format!("{last:?}"),
                });
            }
        }
        self.entries.push((key, value));
        Ok(())
    }

    /// Value of the greatest key `<= lookup`.
    ///
    /// ## Errors
    ///
    /// Returns `NotFound` if the map is empty or `lookup` is below the first key.
    pub fn get(&self, lookup: K) -> JitResult<V>
    {
        let upper = self.entries.partition_point(|(key, _)| *key <= lookup);
        match upper.checked_sub(1).and_then(|index| self.entries.get(index)) {
            Some((_, value)) => Ok(*value),
            None => Err(JitError::NotFound(format!("no range starts at or before {lookup:?}"))),
        }
    }

    /// Smallest key in the map.
    pub fn first_key(&self) -> Option<K>
    {
        self.entries.first().map(|(key, _)| *key)
    }

    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    /// Iterate over `(start key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (K, V)> + '_
    {
        self.entries.iter().copied()
    }
}
