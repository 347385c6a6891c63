//! Method debug info and the compressed line number table.
//!
//! Line number entries are deltas against a running `(line, location)` state
//! that starts at `(0, 0)`:
//!
//! ```text
//! 0LLLLLDD            1 byte:  location += L (0..31), line += D (0..3)
//! 10LLLLLD DDDDDDDD   2 bytes: location += L (0..31), line += D (signed 9 bits)
//! 11xxxxxx            reserved, not decodable
//! ```

use thiserror::Error;

use crate::error::{JitError, JitResult};
use crate::memory::MemoryAccess;
use crate::range_map::RangeMap;
use crate::types::Address;

/// Size of the debug info header (`srp_to_var_info`, `line_number_count`, `var_info_count`).
pub const METHOD_DEBUG_INFO_SIZE: u64 = 12;

/// Debug info header of a method record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDebugInfo
{
    pub address: Address,
    pub srp_to_var_info: u32,
    /// Raw, dual-encoded line number count.
    pub raw_line_number_count: u32,
    pub var_info_count: u32,
}

impl MethodDebugInfo
{
    pub fn read<M: MemoryAccess>(memory: &M, address: Address) -> JitResult<Self>
    {
        Ok(Self {
            address,
            srp_to_var_info: memory.read_u32(address)?,
            raw_line_number_count: memory.read_u32(address + 4)?,
            var_info_count: memory.read_u32(address + 8)?,
        })
    }

    /// Number of entries in the line table.
    ///
    /// The low bit selects the encoding: clear means a 15-bit count in the
    /// next bits, set means the remaining bits are the count and the table is
    /// shifted by one byte.
    pub fn line_number_count(&self) -> u32
    {
        if self.raw_line_number_count & 1 == 0 {
            (self.raw_line_number_count >> 1) & 0x7fff
        } else {
            self.raw_line_number_count >> 1
        }
    }

    /// Header size, including the extra byte of the odd count encoding.
    pub fn structure_size(&self) -> u64
    {
        if self.raw_line_number_count & 1 == 1 {
            METHOD_DEBUG_INFO_SIZE + 1
        } else {
            METHOD_DEBUG_INFO_SIZE
        }
    }

    /// Start of the compressed line table, `None` if the raw count is zero.
    pub fn line_table_address(&self) -> Option<Address>
    {
        (self.raw_line_number_count != 0).then(|| self.address + self.structure_size())
    }
}

/// Running state of the line table decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineNumber
{
    pub line: i32,
    /// Bytecode index the line starts at
    pub location: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LineDecodeError
{
    #[error("reserved line number encoding 0x{0:02x}")]
    ReservedEncoding(u8),
    #[error("line number entry truncated")]
    Truncated,
}

/// Bytes taken by the entry whose first byte is `lead`.
pub fn entry_length(lead: u8) -> Result<usize, LineDecodeError>
{
    match lead & 0xc0 {
        0x00 | 0x40 => Ok(1),
        0x80 => Ok(2),
        _ => Err(LineDecodeError::ReservedEncoding(lead)),
    }
}

/// Apply one entry to `previous`.
pub fn decode_entry(entry: &[u8], previous: LineNumber) -> Result<LineNumber, LineDecodeError>
{
    let lead = *entry.first().ok_or(LineDecodeError::Truncated)?;
    match entry_length(lead)? {
        1 => Ok(LineNumber {
            line: previous.line + i32::from(lead & 0x3),
            location: previous.location + u32::from((lead >> 2) & 0x1f),
        }),
        _ => {
            let second = *entry.get(1).ok_or(LineDecodeError::Truncated)?;
            let encoded = (u16::from(lead) << 8) | u16::from(second);
            // sign extend from 9 bits
            let raw_line = i32::from(encoded & 0x1ff);
            let line_delta = (raw_line ^ 0x100) - 0x100;
            Ok(LineNumber {
                line: previous.line + line_delta,
                location: previous.location + u32::from((encoded >> 9) & 0x1f),
            })
        }
    }
}

/// Encode one `(line delta, location delta)` pair in the shortest form.
///
/// Returns `None` when the deltas do not fit either form.
pub fn encode_entry(line_delta: i32, location_delta: u32) -> Option<Vec<u8>>
{
    if location_delta > 0x1f {
        return None;
    }
    if (0..=3).contains(&line_delta) {
        return Some(vec![((location_delta as u8) << 2) | line_delta as u8]);
    }
    if !(-256..=255).contains(&line_delta) {
        return None;
    }
    let encoded = 0x8000 | ((location_delta as u16) << 9) | ((line_delta as u16) & 0x1ff);
    Some(encoded.to_be_bytes().to_vec())
}

/// Decode the whole line table into a bytecode index → line map.
///
/// `method` names the owner in error messages.
///
/// ## Errors
///
/// Returns `MalformedRecord` for a reserved encoding, an unreadable table
/// byte, or a location that does not increase.
pub fn decode_line_table<M: MemoryAccess>(
    memory: &M,
    debug_info: &MethodDebugInfo,
    method: &str,
) -> JitResult<Option<RangeMap<u32, i32>>>
{
    let Some(mut cursor) = debug_info.line_table_address() else {
        return Ok(None);
    };

    let malformed = |reason: String| JitError::malformed(method, reason);
    let mut table = RangeMap::new();
    let mut state = LineNumber::default();

    for index in 0..debug_info.line_number_count() {
        let lead = memory
            .read_u8(cursor)
            .map_err(|err| malformed(format!("line table entry {index}: {err}")))?;
        let length = entry_length(lead).map_err(|err| malformed(format!("line table entry {index}: {err}")))?;
        let entry = memory
            .read_vec(cursor, length)
            .map_err(|err| malformed(format!("line table entry {index}: {err}")))?;
        state = decode_entry(&entry, state).map_err(|err| malformed(format!("line table entry {index}: {err}")))?;
        tracing::trace!(method, line = state.line, location = state.location, "line table entry");

        table
            .put(state.location, state.line)
            .map_err(|err| malformed(format!("line table entry {index}: {err}")))?;
        cursor = cursor + length as u64;
    }

    Ok(Some(table))
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::memory::MemoryImage;

    #[test]
    fn test_one_byte_entries_reproduce_deltas()
    {
        let deltas = [(1, 0), (0, 5), (3, 31), (2, 17)];
        let mut state = LineNumber::default();
        for (line_delta, location_delta) in deltas {
            let bytes = encode_entry(line_delta, location_delta).unwrap();
            assert_eq!(bytes.len(), 1);
            let next = decode_entry(&bytes, state).unwrap();
            assert_eq!(next.line - state.line, line_delta);
            assert_eq!(next.location - state.location, location_delta);
            state = next;
        }
    }

    #[test]
    fn test_two_byte_entry_all_ones_is_minus_one()
    {
        // 10 00011 111111111: location +3, line -1
        let entry = [0x87, 0xff];
        let start = LineNumber { line: 10, location: 4 };
        let next = decode_entry(&entry, start).unwrap();
        assert_eq!(next.line, 9);
        assert_eq!(next.location, 7);
    }

    #[test]
    fn test_two_byte_entry_large_positive_delta()
    {
        let bytes = encode_entry(200, 9).unwrap();
        assert_eq!(bytes.len(), 2);
        let next = decode_entry(&bytes, LineNumber::default()).unwrap();
        assert_eq!(next, LineNumber { line: 200, location: 9 });
    }

    #[test]
    fn test_reserved_encoding_fails()
    {
        assert_eq!(
            decode_entry(&[0xc1], LineNumber::default()),
            Err(LineDecodeError::ReservedEncoding(0xc1))
        );
        assert_eq!(decode_entry(&[0x80], LineNumber::default()), Err(LineDecodeError::Truncated));
        assert!(encode_entry(0, 32).is_none());
        assert!(encode_entry(300, 0).is_none());
    }

    #[test]
    fn test_line_number_count_dual_encoding()
    {
        let even = MethodDebugInfo {
            address: Address::from(0x100),
            srp_to_var_info: 0,
            raw_line_number_count: (3 << 1) | 0x1_0000_u32 << 1,
            var_info_count: 0,
        };
        // bit 16 of the count is outside the 15-bit form
        assert_eq!(even.line_number_count(), 3);
        assert_eq!(even.line_table_address(), Some(Address::from(0x10c)));

        let odd = MethodDebugInfo {
            raw_line_number_count: (0x1_0003 << 1) | 1,
            ..even
        };
        assert_eq!(odd.line_number_count(), 0x1_0003);
        assert_eq!(odd.line_table_address(), Some(Address::from(0x10d)));

        let empty = MethodDebugInfo {
            raw_line_number_count: 0,
            ..even
        };
        assert_eq!(empty.line_table_address(), None);
    }

    #[test]
    fn test_decode_line_table_from_memory()
    {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&(3u32 << 1).to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        // line 12 at bytecode 0, line 13 at bytecode 4, line 11 at bytecode 9
        bytes.extend(encode_entry(12, 0).unwrap());
        bytes.extend(encode_entry(1, 4).unwrap());
        bytes.extend(encode_entry(-2, 5).unwrap());

        let mut memory = MemoryImage::new();
        memory.map(Address::from(0x2000), bytes);
        let info = MethodDebugInfo::read(&memory, Address::from(0x2000)).unwrap();
        let table = decode_line_table(&memory, &info, "Foo.bar()V").unwrap().unwrap();

        assert_eq!(table.iter().collect::<Vec<_>>(), vec![(0, 12), (4, 13), (9, 11)]);
        assert_eq!(table.get(8).unwrap(), 13);
    }

    #[test]
    fn test_decode_line_table_rejects_reserved_byte()
    {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&(2u32 << 1).to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&[0x04, 0xc0]);

        let mut memory = MemoryImage::new();
        memory.map(Address::from(0x2000), bytes);
        let info = MethodDebugInfo::read(&memory, Address::from(0x2000)).unwrap();
        let err = decode_line_table(&memory, &info, "Foo.bar()V").unwrap_err();
        assert!(matches!(err, JitError::MalformedRecord { ref method, .. } if method == "Foo.bar()V"));
    }
}
