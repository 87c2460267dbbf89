//! Storage object layout: the `RandomAccess` header.
//!
//! A store occupies `[base, base + HEADER_SIZE + L)` of linear memory: the
//! fixed-size header followed by a tail region of `L` bytes chosen by the
//! caller on every call. Only the header's total size is a contract with the
//! host. The header is written by `init` only; transfers never touch it.
//!
//! The header is never accessed through a pointer cast. Each field is
//! (de)serialised little-endian at `base + offset_of!(field)`, so the layout
//! reported by [`header_size`] and the offsets the engine uses come from the
//! same `#[repr(C)]` definition.

use core::mem::{offset_of, size_of};

use crate::{IsolatedMemory, StoreError, StoreResult};

/// `"WHWR"` read as a little-endian u32.
pub const HEADER_MAGIC: u32 = u32::from_le_bytes(*b"WHWR");

/// Header format version understood by this build.
pub const HEADER_VERSION: u16 = 1;

/// Control structure placed at a store's base address.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RandomAccessHeader {
    pub magic: u32,
    pub version: u16,
    pub flags: u16,
    /// Start of this store's window in the instance's extended store.
    pub extent_origin: u64,
    /// Size of the extent window; logical offsets `>= L + extent_capacity`
    /// are out of range.
    pub extent_capacity: u32,
    /// Always zero.
    pub reserved: [u8; 20],
}

/// Byte size of [`RandomAccessHeader`] for this build.
pub const HEADER_SIZE: usize = size_of::<RandomAccessHeader>();

const _: () = assert!(HEADER_SIZE == 40);
const _: () = assert!(HEADER_SIZE <= i32::MAX as usize);

/// Byte size of the store header.
///
/// Pure and callable before any store exists. The value is also the distance
/// from a store's base address to the first byte of its tail region.
#[inline]
pub const fn header_size() -> usize {
    HEADER_SIZE
}

const MAGIC: usize = offset_of!(RandomAccessHeader, magic);
const VERSION: usize = offset_of!(RandomAccessHeader, version);
const FLAGS: usize = offset_of!(RandomAccessHeader, flags);
const EXTENT_ORIGIN: usize = offset_of!(RandomAccessHeader, extent_origin);
const EXTENT_CAPACITY: usize = offset_of!(RandomAccessHeader, extent_capacity);
const RESERVED: usize = offset_of!(RandomAccessHeader, reserved);

/// `(name, offset)` of every header field, in declaration order.
pub const FIELDS: [(&str, usize); 6] = [
    ("magic", MAGIC),
    ("version", VERSION),
    ("flags", FLAGS),
    ("extent_origin", EXTENT_ORIGIN),
    ("extent_capacity", EXTENT_CAPACITY),
    ("reserved", RESERVED),
];

impl RandomAccessHeader {
    /// A freshly formatted header with an extent window at `origin`.
    pub const fn formatted(extent_origin: u64, extent_capacity: u32) -> Self {
        Self {
            magic: HEADER_MAGIC,
            version: HEADER_VERSION,
            flags: 0,
            extent_origin,
            extent_capacity,
            reserved: [0; 20],
        }
    }

    /// All-zero header: memory the host reserved but nobody formatted yet.
    pub fn is_pristine(&self) -> bool {
        *self == Self::default()
    }

    /// Whether this header was written by a compatible engine.
    pub fn is_valid(&self) -> bool {
        self.magic == HEADER_MAGIC && self.version == HEADER_VERSION
    }

    /// Read the header at `base`.
    ///
    /// # Errors
    /// `InvalidHandle` if the header does not fit in active memory.
    #[inline(always)]
    pub fn load<const MAX_PAGES: usize>(
        memory: &IsolatedMemory<MAX_PAGES>,
        base: usize,
    ) -> StoreResult<Self> {
        load_inner(memory.slice(base, HEADER_SIZE).map_err(|_| StoreError::InvalidHandle)?)
    }

    /// Write the header at `base`.
    ///
    /// # Errors
    /// `InvalidHandle` if the header does not fit in active memory; nothing
    /// is written in that case.
    #[inline(always)]
    pub fn store<const MAX_PAGES: usize>(
        &self,
        memory: &mut IsolatedMemory<MAX_PAGES>,
        base: usize,
    ) -> StoreResult<()> {
        let dst = memory
            .slice_mut(base, HEADER_SIZE)
            .map_err(|_| StoreError::InvalidHandle)?;
        store_inner(self, dst);
        Ok(())
    }
}

// ── Non-generic inner functions ──────────────────────────────────────

fn field<const N: usize>(raw: &[u8], at: usize) -> StoreResult<[u8; N]> {
    raw.get(at..at + N)
        .and_then(|s| s.try_into().ok())
        .ok_or(StoreError::InvalidHandle)
}

fn put(raw: &mut [u8], at: usize, bytes: &[u8]) {
    if let Some(dst) = raw.get_mut(at..at + bytes.len()) {
        dst.copy_from_slice(bytes);
    }
}

#[inline(never)]
fn load_inner(raw: &[u8]) -> StoreResult<RandomAccessHeader> {
    Ok(RandomAccessHeader {
        magic: u32::from_le_bytes(field(raw, MAGIC)?),
        version: u16::from_le_bytes(field(raw, VERSION)?),
        flags: u16::from_le_bytes(field(raw, FLAGS)?),
        extent_origin: u64::from_le_bytes(field(raw, EXTENT_ORIGIN)?),
        extent_capacity: u32::from_le_bytes(field(raw, EXTENT_CAPACITY)?),
        reserved: field(raw, RESERVED)?,
    })
}

#[inline(never)]
fn store_inner(header: &RandomAccessHeader, raw: &mut [u8]) {
    raw.fill(0);
    put(raw, MAGIC, &header.magic.to_le_bytes());
    put(raw, VERSION, &header.version.to_le_bytes());
    put(raw, FLAGS, &header.flags.to_le_bytes());
    put(raw, EXTENT_ORIGIN, &header.extent_origin.to_le_bytes());
    put(raw, EXTENT_CAPACITY, &header.extent_capacity.to_le_bytes());
    put(raw, RESERVED, &header.reserved);
}
