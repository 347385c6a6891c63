//! # Error Types
//!
//! Error handling for decoding JIT method metadata and unwinding JIT frames.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

use crate::types::{Address, Architecture};

/// Main error type for jitwalk operations
///
/// ## Error Categories
///
/// 1. **Missing information**: `NotFound` (recoverable, "no information available")
/// 2. **Per-method failures**: `MalformedRecord` (fatal to one method, never to the session)
/// 3. **Inspected process failures**: `MemoryFault`, `UnknownRegister` (recoverable per call)
/// 4. **Installation failures**: `UnsupportedTarget` (the only error that aborts a session)
/// 5. **Input errors**: `KeyOrder`, `InvalidArgument`, `Snapshot`, `Object`, `Io`
#[derive(Error, Debug)]
pub enum JitError
{
    /// A lookup found nothing
    ///
    /// Raised when a range map lookup falls below its first key, when an
    /// optional section of a method record is absent, or when a PC belongs to
    /// no registered method. Callers present this as "no information".
    #[error("Not found: {0}")]
    NotFound(String),

    /// A method record claims data that cannot be decoded
    ///
    /// Examples:
    /// - A line table entry using the reserved `11xxxxxx` encoding
    /// - A section whose presence flag is set but whose bytes are unreadable
    ///
    /// This is scoped to a single method. Listing or unwinding other methods
    /// must keep working.
    #[error("Malformed record for {method}: {reason}")]
    MalformedRecord
    {
        /// Method (name or record address) the failure belongs to
        method: String,
        /// What could not be decoded
        reason: String,
    },

    /// Reading memory of the inspected process failed
    ///
    /// The page may be unmapped or the process may have exited. An unwind
    /// step that hits this declines instead of failing the whole walk.
    #[error("Memory fault reading {length} bytes at {address}")]
    MemoryFault
    {
        /// First byte that was requested
        address: Address,
        /// Number of bytes requested
        length: usize,
    },

    /// The inspected register is not available in this frame
    #[error("Unknown register: {0}")]
    UnknownRegister(String),

    /// The target architecture has no supported prologue shape
    ///
    /// Only `riscv64` is supported. This is raised when a session is created
    /// and prevents the unwinder from being installed at all.
    #[error("Unsupported target architecture: {0}")]
    UnsupportedTarget(Architecture),

    /// A range map key was not strictly greater than the previous one
    #[error("Range map keys must increase: {key} inserted after {last}")]
    KeyOrder
    {
        /// Rejected key
        key: String,
        /// Largest key already in the map
        last: String,
    },

    /// Invalid argument passed to a jitwalk function
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A snapshot file could not be parsed
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// An object file could not be parsed for symbols
    #[error("Object file error: {0}")]
    Object(#[from] object::Error),

    /// I/O error (for snapshot and object files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl JitError
{
    /// Build a `MalformedRecord` error for `method`.
    pub fn malformed(method: impl Into<String>, reason: impl Into<String>) -> Self
    {
        JitError::MalformedRecord {
            method: method.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for "no information available".
    pub fn is_not_found(&self) -> bool
    {
        matches!(self, JitError::NotFound(_))
    }

    /// Returns `true` if the error only affects the current call or method.
    ///
    /// Everything except `UnsupportedTarget` is recoverable: the session logs it
    /// and continues with the next method or frame.
    pub fn is_recoverable(&self) -> bool
    {
        !matches!(self, JitError::UnsupportedTarget(_))
    }
}

/// Convenience type alias for `Result<T, JitError>`
///
/// ```rust
/// use jitwalk_core::error::JitResult;
/// fn foo() -> JitResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type JitResult<T> = std::result::Result<T, JitError>;
