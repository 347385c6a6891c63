//! Memory address type.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Strongly typed address in the inspected process
///
/// Program counters, canonical frame addresses, and pointers into method
/// records are all `Address` values. Keeping them apart from plain `u64`
/// prevents mixing up a frame size with a frame address.
///
/// ## Example
///
/// ```rust
/// use jitwalk_core::types::Address;
///
/// let start_pc = Address::from(0x3f5b_6360_24);
/// let jit_entry = start_pc + 8;
/// assert_eq!(jit_entry.value(), 0x3f5b_6360_2c);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value
    ///
    /// Usable in const contexts, unlike `Address::from`.
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Raw `u64` value of this address
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Add an offset to this address, checking for overflow
    ///
    /// ```rust
    /// use jitwalk_core::types::Address;
    ///
    /// let addr = Address::from(0x1000);
    /// assert_eq!(addr.checked_add(0x100), Some(Address::from(0x1100)));
    /// assert_eq!(addr.checked_add(u64::MAX), None);
    /// ```
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Subtract an offset from this address, checking for underflow
    pub fn checked_sub(self, offset: u64) -> Option<Self>
    {
        self.0.checked_sub(offset).map(Address)
    }

    /// Apply a signed displacement, as used by self-relative pointers.
    ///
    /// ```rust
    /// use jitwalk_core::types::Address;
    ///
    /// assert_eq!(Address::from(0x1000).offset(-16), Address::from(0xff0));
    /// assert_eq!(Address::from(0x1000).offset(16), Address::from(0x1010));
    /// ```
    pub fn offset(self, displacement: i64) -> Self
    {
        Address(self.0.wrapping_add_signed(displacement))
    }

    /// Round up to the next multiple of `align` (a power of two).
    ///
    /// ```rust
    /// use jitwalk_core::types::Address;
    ///
    /// assert_eq!(Address::from(0x1001).align_up(4), Address::from(0x1004));
    /// assert_eq!(Address::from(0x1004).align_up(4), Address::from(0x1004));
    /// ```
    pub fn align_up(self, align: u64) -> Self
    {
        debug_assert!(align.is_power_of_two());
        Address(self.0.wrapping_add(align - 1) & !(align - 1))
    }

    /// Distance in bytes from `base` to this address, if it is not below `base`.
    pub fn distance_from(self, base: Address) -> Option<u64>
    {
        self.0.checked_sub(base.0)
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

impl Sub<u64> for Address
{
    type Output = Address;

    fn sub(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_sub(rhs))
    }
}
