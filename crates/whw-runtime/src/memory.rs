//! Linear memory shared between host and store: `IsolatedMemory<const MAX_PAGES: usize>`.
//!
//! The backing array is `[[u8; PAGE_SIZE]; MAX_PAGES]`: a 2D array that
//! is contiguous in memory. We use `as_flattened()` (stable since Rust 1.80)
//! to get a flat `&[u8]` view for the inner functions.
//!
//! Every accessor uses the **outline pattern**: the generic wrapper delegates
//! to a non-generic inner function so that only one copy of the
//! bounds-checking logic exists in the binary, whatever `MAX_PAGES` is.

use crate::PAGE_SIZE;

/// A linear-memory access that does not fit in the active region.
///
/// The engine maps this onto the store taxonomy depending on what was being
/// accessed (header, tail or payload buffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds;

type MemResult<T> = Result<T, OutOfBounds>;

/// Linear memory owned by the embedding context.
///
/// `MAX_PAGES` is the compile-time maximum. The backing array is fully
/// pre-allocated; `grow` only moves the active boundary.
pub struct IsolatedMemory<const MAX_PAGES: usize> {
    /// Backing storage: `MAX_PAGES` pages of `PAGE_SIZE` bytes each.
    pages: [[u8; PAGE_SIZE]; MAX_PAGES],
    /// Number of currently active pages. Accesses beyond
    /// `active_pages * PAGE_SIZE` fail with `OutOfBounds`.
    active_pages: usize,
}

impl<const MAX_PAGES: usize> IsolatedMemory<MAX_PAGES> {
    /// Create a new `IsolatedMemory` with `initial_pages` active.
    ///
    /// The value is built on the stack; prefer [`IsolatedMemory::try_init`]
    /// or `try_new_boxed` when `MAX_PAGES` is large.
    ///
    /// # Errors
    /// Returns `ConstructionError::MemoryInitialPagesExceedsMax` if `initial_pages > MAX_PAGES`.
    #[inline(never)]
    pub fn try_new(initial_pages: usize) -> Result<Self, crate::ConstructionError> {
        if initial_pages > MAX_PAGES {
            return Err(crate::ConstructionError::MemoryInitialPagesExceedsMax {
                initial: initial_pages,
                max: MAX_PAGES,
            });
        }
        Ok(Self {
            pages: [[0u8; PAGE_SIZE]; MAX_PAGES],
            active_pages: initial_pages,
        })
    }

    /// Initialize an `IsolatedMemory` in-place within a caller-provided slot.
    ///
    /// Never materialises the page array on the call stack.
    ///
    /// # Errors
    /// Returns `ConstructionError` if `initial_pages` exceeds `MAX_PAGES`;
    /// the slot is left untouched in that case.
    #[inline(never)]
    pub fn try_init(
        slot: &mut core::mem::MaybeUninit<Self>,
        initial_pages: usize,
    ) -> Result<(), crate::ConstructionError> {
        if initial_pages > MAX_PAGES {
            return Err(crate::ConstructionError::MemoryInitialPagesExceedsMax {
                initial: initial_pages,
                max: MAX_PAGES,
            });
        }
        let ptr = slot.as_mut_ptr();
        // SAFETY: ptr comes from MaybeUninit so it is valid for writes and
        // correctly aligned. `write_bytes(0, 1)` zeroes exactly one page
        // array, and both fields are written before the caller can observe
        // the slot as initialised.
        unsafe {
            core::ptr::addr_of_mut!((*ptr).pages).write_bytes(0, 1);
            core::ptr::addr_of_mut!((*ptr).active_pages).write(initial_pages);
        }
        Ok(())
    }

    /// Heap-allocate a zeroed memory without a stack temporary.
    ///
    /// # Errors
    /// Returns `ConstructionError` if `initial_pages` exceeds `MAX_PAGES`.
    #[cfg(feature = "alloc")]
    pub fn try_new_boxed(
        initial_pages: usize,
    ) -> Result<alloc::boxed::Box<Self>, crate::ConstructionError> {
        let mut slot = alloc::boxed::Box::<Self>::new_uninit();
        Self::try_init(&mut slot, initial_pages)?;
        // SAFETY: try_init returned Ok, so every field has been written.
        Ok(unsafe { slot.assume_init() })
    }

    /// Current number of active pages.
    #[inline(always)]
    pub fn page_count(&self) -> usize {
        self.active_pages
    }

    /// Current active size in bytes.
    #[inline(always)]
    pub fn active_size(&self) -> usize {
        self.active_pages * PAGE_SIZE
    }

    /// `memory.grow`: returns previous page count, or -1 on failure.
    /// No allocation occurs: the backing array is already sized to `MAX_PAGES`.
    pub fn grow(&mut self, delta: u32) -> i32 {
        let old = self.active_pages;
        let new = old.wrapping_add(delta as usize);
        if new > MAX_PAGES || new < old {
            return -1;
        }
        for page in &mut self.pages[old..new] {
            page.fill(0);
        }
        self.active_pages = new;
        old as i32
    }

    /// `memory.size`: returns current page count.
    #[inline(always)]
    pub fn size(&self) -> i32 {
        self.active_pages as i32
    }

    /// Flat read-only view of the full backing memory.
    #[inline(always)]
    fn flat(&self) -> &[u8] {
        self.pages.as_flattened()
    }

    /// Flat mutable view of the full backing memory.
    #[inline(always)]
    fn flat_mut(&mut self) -> &mut [u8] {
        self.pages.as_flattened_mut()
    }

    // ── Bulk byte operations ─────────────────────────────────────────

    /// `memory.copy`: copy `len` bytes from `src` to `dst`.
    ///
    /// Overlapping regions are handled like `memmove`. Fails if either
    /// region extends beyond the active memory.
    #[inline(always)]
    pub fn copy_within(&mut self, dst: usize, src: usize, len: usize) -> MemResult<()> {
        let active = self.active_size();
        copy_within_inner(self.flat_mut(), active, dst, src, len)
    }

    /// Copy `buf.len()` bytes starting at `offset` out of linear memory.
    #[inline(always)]
    pub fn read_bytes(&self, offset: usize, buf: &mut [u8]) -> MemResult<()> {
        read_bytes_inner(self.flat(), self.active_size(), offset, buf)
    }

    /// Copy `data` into linear memory starting at `offset`.
    #[inline(always)]
    pub fn write_bytes(&mut self, offset: usize, data: &[u8]) -> MemResult<()> {
        let active = self.active_size();
        write_bytes_inner(self.flat_mut(), active, offset, data)
    }

    /// Borrow `len` bytes at `offset`.
    #[inline(always)]
    pub fn slice(&self, offset: usize, len: usize) -> MemResult<&[u8]> {
        checked_slice(self.flat(), self.active_size(), offset, len)
    }

    /// Mutably borrow `len` bytes at `offset`.
    #[inline(always)]
    pub fn slice_mut(&mut self, offset: usize, len: usize) -> MemResult<&mut [u8]> {
        let active = self.active_size();
        checked_slice_mut(self.flat_mut(), active, offset, len)
    }

    /// Whether `[offset, offset + len)` lies inside the active region.
    #[inline(always)]
    pub fn contains(&self, offset: usize, len: usize) -> bool {
        range_end(self.active_size(), offset, len).is_ok()
    }

    // ── Little-endian scalar access ──────────────────────────────────

    /// Load a u16 with bounds checking.
    #[inline(always)]
    pub fn load_u16(&self, offset: usize) -> MemResult<u16> {
        load_u16_inner(self.flat(), self.active_size(), offset)
    }

    /// Load a u32 with bounds checking.
    #[inline(always)]
    pub fn load_u32(&self, offset: usize) -> MemResult<u32> {
        load_u32_inner(self.flat(), self.active_size(), offset)
    }

    /// Load a u64 with bounds checking.
    #[inline(always)]
    pub fn load_u64(&self, offset: usize) -> MemResult<u64> {
        load_u64_inner(self.flat(), self.active_size(), offset)
    }

    /// Store a u16 with bounds checking.
    #[inline(always)]
    pub fn store_u16(&mut self, offset: usize, value: u16) -> MemResult<()> {
        let active = self.active_size();
        write_bytes_inner(self.flat_mut(), active, offset, &value.to_le_bytes())
    }

    /// Store a u32 with bounds checking.
    #[inline(always)]
    pub fn store_u32(&mut self, offset: usize, value: u32) -> MemResult<()> {
        let active = self.active_size();
        write_bytes_inner(self.flat_mut(), active, offset, &value.to_le_bytes())
    }

    /// Store a u64 with bounds checking.
    #[inline(always)]
    pub fn store_u64(&mut self, offset: usize, value: u64) -> MemResult<()> {
        let active = self.active_size();
        write_bytes_inner(self.flat_mut(), active, offset, &value.to_le_bytes())
    }

    /// Read-only access to the active memory region.
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        &self.flat()[..self.active_size()]
    }

    /// Mutable access to the active memory region.
    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        let size = self.active_size();
        &mut self.flat_mut()[..size]
    }
}

// ── Helpers ───────────────────────────────────────────────────────────

/// End of `[offset, offset + len)` if it fits in `active_bytes`.
#[inline(always)]
fn range_end(active_bytes: usize, offset: usize, len: usize) -> MemResult<usize> {
    let end = offset.checked_add(len).ok_or(OutOfBounds)?;
    if end > active_bytes {
        return Err(OutOfBounds);
    }
    Ok(end)
}

/// Bounds-check and return the sub-slice `memory[offset..offset+len]`.
/// Never panics.
#[inline(always)]
fn checked_slice(memory: &[u8], active_bytes: usize, offset: usize, len: usize) -> MemResult<&[u8]> {
    let end = range_end(active_bytes, offset, len)?;
    memory.get(offset..end).ok_or(OutOfBounds)
}

/// Mutable variant of `checked_slice`.
#[inline(always)]
fn checked_slice_mut(
    memory: &mut [u8],
    active_bytes: usize,
    offset: usize,
    len: usize,
) -> MemResult<&mut [u8]> {
    let end = range_end(active_bytes, offset, len)?;
    memory.get_mut(offset..end).ok_or(OutOfBounds)
}

/// Convert a slice to a fixed-size array without panicking.
#[inline(always)]
fn to_array<const N: usize>(slice: &[u8]) -> MemResult<[u8; N]> {
    slice.try_into().map_err(|_| OutOfBounds)
}

// ── Non-generic inner functions (outline pattern) ────────────────────
//
// ONE copy of each function in the binary, regardless of how many
// `MAX_PAGES` instantiations exist.
//
// No unwrap(), no indexing, no panic paths.

#[inline(never)]
fn copy_within_inner(
    memory: &mut [u8],
    active_bytes: usize,
    dst: usize,
    src: usize,
    len: usize,
) -> MemResult<()> {
    let src_end = range_end(active_bytes, src, len)?;
    range_end(active_bytes, dst, len)?;
    memory.copy_within(src..src_end, dst);
    Ok(())
}

#[inline(never)]
fn read_bytes_inner(
    memory: &[u8],
    active_bytes: usize,
    offset: usize,
    buf: &mut [u8],
) -> MemResult<()> {
    let src = checked_slice(memory, active_bytes, offset, buf.len())?;
    buf.copy_from_slice(src);
    Ok(())
}

#[inline(never)]
fn write_bytes_inner(
    memory: &mut [u8],
    active_bytes: usize,
    offset: usize,
    data: &[u8],
) -> MemResult<()> {
    let dst = checked_slice_mut(memory, active_bytes, offset, data.len())?;
    dst.copy_from_slice(data);
    Ok(())
}

#[inline(never)]
fn load_u16_inner(memory: &[u8], active_bytes: usize, offset: usize) -> MemResult<u16> {
    let s = checked_slice(memory, active_bytes, offset, 2)?;
    Ok(u16::from_le_bytes(to_array(s)?))
}

#[inline(never)]
fn load_u32_inner(memory: &[u8], active_bytes: usize, offset: usize) -> MemResult<u32> {
    let s = checked_slice(memory, active_bytes, offset, 4)?;
    Ok(u32::from_le_bytes(to_array(s)?))
}

#[inline(never)]
fn load_u64_inner(memory: &[u8], active_bytes: usize, offset: usize) -> MemResult<u64> {
    let s = checked_slice(memory, active_bytes, offset, 8)?;
    Ok(u64::from_le_bytes(to_array(s)?))
}


// ── Kani Formal Verification Proofs ──────────────────────────────────────
//
// Run with: cargo kani -p whw-runtime

#[cfg(kani)]
mod proofs {
    use super::*;

    /// Proof: read_bytes never panics and only succeeds inside the active region.
    #[kani::proof]
    #[kani::unwind(9)]
    fn read_bytes_never_panics() {
        let mem = IsolatedMemory::<1>::try_new(1).unwrap();
        let offset: usize = kani::any();
        let mut buf = [0u8; 8];
        if mem.read_bytes(offset, &mut buf).is_ok() {
            kani::assert(
                offset.checked_add(8).is_some_and(|end| end <= mem.active_size()),
                "successful read is within the active region",
            );
        }
    }

    /// Proof: store_u32 followed by load_u32 returns the stored value.
    #[kani::proof]
    #[kani::unwind(5)]
    fn store_load_roundtrip_u32() {
        let mut mem = IsolatedMemory::<1>::try_new(1).unwrap();
        let offset: usize = kani::any();
        let value: u32 = kani::any();
        if mem.store_u32(offset, value).is_ok() {
            kani::assert(mem.load_u32(offset) == Ok(value), "u32 roundtrip");
        }
    }

    /// Proof: grow never pushes active_pages past MAX_PAGES.
    #[kani::proof]
    #[kani::unwind(5)]
    fn grow_respects_max_pages() {
        let mut mem = IsolatedMemory::<4>::try_new(1).unwrap();
        let delta: u32 = kani::any();
        let old = mem.page_count();
        let result = mem.grow(delta);
        kani::assert(mem.page_count() <= 4, "active_pages <= MAX_PAGES");
        if result < 0 {
            kani::assert(mem.page_count() == old, "failed grow is a no-op");
        }
    }
}
