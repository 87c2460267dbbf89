//! Extended stores: the medium behind offsets past the tail region.
//!
//! A `Backing` is owned by the guest instance and shared by every store the
//! instance formats; each store gets a disjoint window of it. Offsets never
//! written read back as zeros.

use crate::BackingFault;

/// Byte-addressable medium servicing offsets beyond the tail.
///
/// Implementations must be all-or-nothing per call: a call that returns an
/// error has not modified the medium.
pub trait Backing {
    /// Total bytes this medium can hold.
    fn capacity(&self) -> u64;

    /// Fill `buf` from `offset`. Unwritten bytes read as zero.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), BackingFault>;

    /// Write `data` at `offset`.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), BackingFault>;
}

impl<B: Backing + ?Sized> Backing for &mut B {
    fn capacity(&self) -> u64 {
        (**self).capacity()
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), BackingFault> {
        (**self).read_at(offset, buf)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), BackingFault> {
        (**self).write_at(offset, data)
    }
}

#[cfg(feature = "alloc")]
impl<B: Backing + ?Sized> Backing for alloc::boxed::Box<B> {
    fn capacity(&self) -> u64 {
        (**self).capacity()
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), BackingFault> {
        (**self).read_at(offset, buf)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), BackingFault> {
        (**self).write_at(offset, data)
    }
}

/// Range `[offset, offset + len)` as `usize` indices if it ends within `capacity`.
fn window(offset: u64, len: usize, capacity: u64) -> Result<(usize, usize), BackingFault> {
    let end = offset
        .checked_add(len as u64)
        .filter(|&end| end <= capacity)
        .ok_or(BackingFault::CapacityExceeded)?;
    let start = usize::try_from(offset).map_err(|_| BackingFault::CapacityExceeded)?;
    let end = usize::try_from(end).map_err(|_| BackingFault::CapacityExceeded)?;
    Ok((start, end))
}

/// No extended store: only the tail region is serviceable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBacking;

impl Backing for NoBacking {
    fn capacity(&self) -> u64 {
        0
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), BackingFault> {
        window(offset, buf.len(), 0).map(|_| ())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), BackingFault> {
        window(offset, data.len(), 0).map(|_| ())
    }
}

/// Fixed-capacity in-memory extended store, usable without `alloc`.
pub struct ArrayBacking<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> ArrayBacking<N> {
    pub const fn new() -> Self {
        Self { bytes: [0; N] }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl<const N: usize> Default for ArrayBacking<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Backing for ArrayBacking<N> {
    fn capacity(&self) -> u64 {
        N as u64
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), BackingFault> {
        let (start, end) = window(offset, buf.len(), N as u64)?;
        let src = self
            .bytes
            .get(start..end)
            .ok_or(BackingFault::CapacityExceeded)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), BackingFault> {
        let (start, end) = window(offset, data.len(), N as u64)?;
        let dst = self
            .bytes
            .get_mut(start..end)
            .ok_or(BackingFault::CapacityExceeded)?;
        dst.copy_from_slice(data);
        Ok(())
    }
}

/// Growable in-memory extended store with a hard limit.
///
/// Storage is allocated lazily up to the highest byte written.
#[cfg(feature = "alloc")]
pub struct VecBacking {
    bytes: alloc::vec::Vec<u8>,
    limit: u64,
}

#[cfg(feature = "alloc")]
impl VecBacking {
    pub fn with_limit(limit: u64) -> Self {
        Self {
            bytes: alloc::vec::Vec::new(),
            limit,
        }
    }

    /// Bytes currently materialised (highest written offset).
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(feature = "alloc")]
impl Backing for VecBacking {
    fn capacity(&self) -> u64 {
        self.limit
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), BackingFault> {
        let (start, end) = window(offset, buf.len(), self.limit)?;
        let have = self.bytes.len();
        let copied = end.min(have).saturating_sub(start);
        if copied > 0 {
            buf[..copied].copy_from_slice(&self.bytes[start..start + copied]);
        }
        buf[copied..].fill(0);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), BackingFault> {
        let (start, end) = window(offset, data.len(), self.limit)?;
        if end > self.bytes.len() {
            self.bytes
                .try_reserve(end - self.bytes.len())
                .map_err(|_| BackingFault::CapacityExceeded)?;
            self.bytes.resize(end, 0);
        }
        self.bytes[start..end].copy_from_slice(data);
        Ok(())
    }
}
