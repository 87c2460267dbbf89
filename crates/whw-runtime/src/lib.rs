//! `whw-runtime`: random-access store over isolated linear memory.
//!
//! This crate is `#![no_std]` by default. It provides:
//! - `IsolatedMemory<const MAX_PAGES: usize>` for Wasm-style linear memory
//! - `RandomAccessHeader` / `header_size()` for the store's control structure
//! - `StoreHandle` and the tail/extent read-write engine
//! - `Backing` implementations for the extended store
//! - `Instance`, the guest side of the host binding protocol (exports)

#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

use core::fmt;

/// WebAssembly page size: 64 KiB per the Wasm specification.
pub const PAGE_SIZE: usize = 65536;

mod memory;
pub use memory::{IsolatedMemory, OutOfBounds};

pub mod layout;
pub use layout::{header_size, RandomAccessHeader, HEADER_SIZE};

mod resolve;
pub use resolve::{resolve, Plan};

mod backing;
#[cfg(feature = "alloc")]
pub use backing::VecBacking;
pub use backing::{ArrayBacking, Backing, NoBacking};

mod engine;
pub use engine::{Span, StoreHandle};

pub mod host;
pub use host::{Errno, NoSystem, SystemInterface};

mod instance;
pub use instance::{BindingMode, Globals, Instance, MAX_STORES};

/// Failure reported by an extended store. Opaque to the engine and surfaced
/// unchanged through `StoreError::BackingStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackingFault {
    /// The access reaches past what the medium can hold.
    CapacityExceeded,
    /// The medium itself failed; the code is medium-specific (e.g. an errno).
    Medium(i32),
}

/// Store operation errors: no panics, no unwinding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// `offset + size` falls outside the serviceable range of the store.
    Bounds,
    /// `store_base` does not reference a usable header.
    InvalidHandle,
    /// The input/output span is not accessible or overlaps the store.
    Buffer,
    /// The extended store rejected the operation.
    BackingStore(BackingFault),
}

impl StoreError {
    /// Out-of-band sentinel returned across the export boundary.
    /// Always negative, so never confused with a byte count.
    pub const fn code(self) -> i32 {
        match self {
            StoreError::Bounds => -1,
            StoreError::InvalidHandle => -2,
            StoreError::Buffer => -3,
            StoreError::BackingStore(_) => -4,
        }
    }

    /// Inverse of [`StoreError::code`]. Backing faults lose their detail
    /// across the sentinel and come back as `Medium(0)`.
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(StoreError::Bounds),
            -2 => Some(StoreError::InvalidHandle),
            -3 => Some(StoreError::Buffer),
            -4 => Some(StoreError::BackingStore(BackingFault::Medium(0))),
            _ => None,
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Bounds => f.write_str("range outside the serviceable store"),
            StoreError::InvalidHandle => f.write_str("store base does not reference a valid header"),
            StoreError::Buffer => f.write_str("buffer is inaccessible or overlaps the store"),
            StoreError::BackingStore(BackingFault::CapacityExceeded) => {
                f.write_str("extended store capacity exceeded")
            }
            StoreError::BackingStore(BackingFault::Medium(code)) => {
                write!(f, "extended store medium failure (code {code})")
            }
        }
    }
}

impl core::error::Error for StoreError {}

/// Result type for store operations: `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Collapse a store result into the `i32` convention of the exports:
/// the byte count on success, a negative sentinel on failure.
#[inline]
pub fn to_status(result: StoreResult<usize>) -> i32 {
    match result {
        // Byte counts above i32::MAX are rejected before any transfer.
        Ok(n) => i32::try_from(n).unwrap_or(StoreError::Bounds.code()),
        Err(e) => e.code(),
    }
}

/// Errors that occur during memory construction.
///
/// These are host configuration errors, not store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionError {
    /// Initial pages exceeds MAX_PAGES for memory.
    MemoryInitialPagesExceedsMax { initial: usize, max: usize },
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructionError::MemoryInitialPagesExceedsMax { initial, max } => {
                write!(f, "initial pages {initial} exceeds maximum {max}")
            }
        }
    }
}

impl core::error::Error for ConstructionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_is_copy() {
        let err = StoreError::Bounds;
        let err2 = err; // Copy
        assert_eq!(err, err2);
    }

    #[test]
    fn sentinels_are_negative_and_distinct() {
        let codes = [
            StoreError::Bounds.code(),
            StoreError::InvalidHandle.code(),
            StoreError::Buffer.code(),
            StoreError::BackingStore(BackingFault::CapacityExceeded).code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            assert!(*a < 0);
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn code_roundtrips_for_plain_variants() {
        for err in [StoreError::Bounds, StoreError::InvalidHandle, StoreError::Buffer] {
            assert_eq!(StoreError::from_code(err.code()), Some(err));
        }
        assert_eq!(StoreError::from_code(0), None);
        assert_eq!(StoreError::from_code(5), None);
    }

    #[test]
    fn to_status_passes_counts_through() {
        assert_eq!(to_status(Ok(5)), 5);
        assert_eq!(to_status(Ok(0)), 0);
        assert_eq!(to_status(Err(StoreError::Buffer)), -3);
        assert_eq!(
            to_status(Err(StoreError::BackingStore(BackingFault::Medium(5)))),
            -4
        );
    }
}
