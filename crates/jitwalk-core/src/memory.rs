//! # Memory Access
//!
//! Read-only access to the memory of the inspected process.
//!
//! Every read may fail at any time (unmapped page, exited process). Failures
//! surface as `JitError::MemoryFault` and are recoverable per call.

use crate::error::{JitError, JitResult};
use crate::types::Address;

/// Memory accessor required for decoding method records and unwinding.
///
/// Implementors only provide `read_bytes`; the typed helpers decode
/// little-endian values on top of it.
pub trait MemoryAccess
{
    /// Fill `buf` with the bytes starting at `address`.
    ///
    /// ## Errors
    ///
    /// Returns `MemoryFault` if any byte of the range is unreadable.
    fn read_bytes(&self, address: Address, buf: &mut [u8]) -> JitResult<()>;

    fn read_array<const N: usize>(&self, address: Address) -> JitResult<[u8; N]>
    {
        let mut buf = [0u8; N];
        self.read_bytes(address, &mut buf)?;
        Ok(buf)
    }

    fn read_u8(&self, address: Address) -> JitResult<u8>
    {
        Ok(self.read_array::<1>(address)?[0])
    }

    fn read_u16(&self, address: Address) -> JitResult<u16>
    {
        Ok(u16::from_le_bytes(self.read_array(address)?))
    }

    fn read_u32(&self, address: Address) -> JitResult<u32>
    {
        Ok(u32::from_le_bytes(self.read_array(address)?))
    }

    fn read_i32(&self, address: Address) -> JitResult<i32>
    {
        Ok(i32::from_le_bytes(self.read_array(address)?))
    }

    fn read_u64(&self, address: Address) -> JitResult<u64>
    {
        Ok(u64::from_le_bytes(self.read_array(address)?))
    }

    /// Read `length` bytes into a new vector.
    fn read_vec(&self, address: Address, length: usize) -> JitResult<Vec<u8>>
    {
        let mut buf = vec![0u8; length];
        self.read_bytes(address, &mut buf)?;
        Ok(buf)
    }
}

impl<M: MemoryAccess + ?Sized> MemoryAccess for &M
{
    fn read_bytes(&self, address: Address, buf: &mut [u8]) -> JitResult<()>
    {
        (**self).read_bytes(address, buf)
    }
}

/// A contiguous block of captured memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment
{
    pub base: Address,
    pub bytes: Vec<u8>,
}

impl Segment
{
    /// One past the last byte of the segment.
    pub fn end(&self) -> Address
    {
        self.base + self.bytes.len() as u64
    }

    fn slice(&self, address: Address, length: usize) -> Option<&[u8]>
    {
        let start = usize::try_from(address.distance_from(self.base)?).ok()?;
        let end = start.checked_add(length)?;
        self.bytes.get(start..end)
    }
}

/// Memory captured from a stopped process
///
/// A set of non-overlapping segments. Reads must fall entirely inside one
/// segment; anything else is a `MemoryFault`, just like an unmapped page in a
/// live process.
///
/// ## Example
///
/// ```rust
/// use jitwalk_core::memory::{MemoryAccess, MemoryImage};
/// use jitwalk_core::types::Address;
///
/// let mut image = MemoryImage::new();
/// image.map(Address::from(0x1000), vec![0x67, 0x80, 0x00, 0x00]);
///
/// assert_eq!(image.read_u32(Address::from(0x1000)).unwrap(), 0x8067);
/// assert!(image.read_u32(Address::from(0x1002)).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryImage
{
    segments: Vec<Segment>,
}

impl MemoryImage
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Add a segment. A segment overlapping an existing one replaces it.
    pub fn map(&mut self, base: Address, bytes: Vec<u8>)
    {
        let segment = Segment { base, bytes };
        let end = segment.end();
        self.segments.retain(|existing| existing.end() <= base || existing.base >= end);
        let index = self.segments.partition_point(|existing| existing.base < base);
        self.segments.insert(index, segment);
    }

    pub fn segments(&self) -> &[Segment]
    {
        &self.segments
    }

    fn segment_for(&self, address: Address) -> Option<&Segment>
    {
        let upper = self.segments.partition_point(|segment| segment.base <= address);
        self.segments.get(upper.checked_sub(1)?)
    }
}

impl MemoryAccess for MemoryImage
{
    fn read_bytes(&self, address: Address, buf: &mut [u8]) -> JitResult<()>
    {
        let bytes = self
            .segment_for(address)
            .and_then(|segment| segment.slice(address, buf.len()))
            .ok_or(JitError::MemoryFault {
                address,
                length: buf.len(),
            })?;
        buf.copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_reads_are_little_endian()
    {
        let mut image = MemoryImage::new();
        image.map(Address::from(0x100), (1u8..=8).collect());

        assert_eq!(image.read_u8(Address::from(0x100)).unwrap(), 1);
        assert_eq!(image.read_u16(Address::from(0x100)).unwrap(), 0x0201);
        assert_eq!(image.read_u32(Address::from(0x104)).unwrap(), 0x0807_0605);
        assert_eq!(image.read_u64(Address::from(0x100)).unwrap(), 0x0807_0605_0403_0201);
    }

    #[test]
    fn test_read_past_segment_end_faults()
    {
        let mut image = MemoryImage::new();
        image.map(Address::from(0x100), vec![0; 8]);

        let err = image.read_u64(Address::from(0x104)).unwrap_err();
        assert!(matches!(err, JitError::MemoryFault { length: 8, .. }));
        assert!(image.read_u8(Address::from(0xff)).is_err());
        assert!(image.read_u8(Address::from(0x108)).is_err());
    }

    #[test]
    fn test_overlapping_segment_replaces_old_one()
    {
        let mut image = MemoryImage::new();
        image.map(Address::from(0x100), vec![1; 8]);
        image.map(Address::from(0x200), vec![2; 8]);
        image.map(Address::from(0x104), vec![3; 8]);

        assert_eq!(image.segments().len(), 2);
        assert_eq!(image.read_u8(Address::from(0x104)).unwrap(), 3);
        assert!(image.read_u8(Address::from(0x100)).is_err());
        assert_eq!(image.read_u8(Address::from(0x200)).unwrap(), 2);
    }
}
