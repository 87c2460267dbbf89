//! Offset resolution: splits a logical range into tail and extent parts.
//!
//! The logical address space of a store is `[0, L + extent_capacity)`:
//!
//! ```text
//!   0            L                      L + extent_capacity
//!   ├── tail ────┼──── extent window ────┤
//! ```
//!
//! A transfer that crosses `L` is serviced as two sub-transfers, stitched at
//! `split = L - offset` inside the caller's buffer.

use crate::{StoreError, StoreResult};

/// How one transfer maps onto the tail region and the extent window.
///
/// Either part may be empty; `tail_len + extent_len` always equals the
/// requested size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    /// Offset inside the tail region where the tail part starts.
    pub tail_offset: usize,
    /// Bytes serviced by the tail region.
    pub tail_len: usize,
    /// Offset inside the extent window where the extent part starts.
    pub extent_offset: u64,
    /// Bytes serviced by the extended store.
    pub extent_len: usize,
}

impl Plan {
    /// Total bytes moved by this plan.
    pub fn total(&self) -> usize {
        self.tail_len + self.extent_len
    }

    /// Position in the caller's buffer where the extent part begins.
    pub fn split(&self) -> usize {
        self.tail_len
    }

    /// Whether the transfer touches both the tail and the extent.
    pub fn straddles(&self) -> bool {
        self.tail_len > 0 && self.extent_len > 0
    }
}

/// Resolve `[offset, offset + size)` against a tail of `tail_len` bytes and
/// an extent window of `extent_capacity` bytes.
///
/// # Errors
/// `Bounds` if the range overflows, ends past `tail_len + extent_capacity`,
/// or `size` cannot be reported as an `i32` byte count.
#[inline(never)]
pub fn resolve(offset: u64, size: usize, tail_len: usize, extent_capacity: u64) -> StoreResult<Plan> {
    if size > i32::MAX as usize {
        return Err(StoreError::Bounds);
    }
    let tail = tail_len as u64;
    let end = offset
        .checked_add(size as u64)
        .ok_or(StoreError::Bounds)?;
    let serviceable = tail
        .checked_add(extent_capacity)
        .ok_or(StoreError::Bounds)?;
    if end > serviceable {
        return Err(StoreError::Bounds);
    }

    let (tail_offset, tail_part) = if offset < tail {
        // offset < tail_len, so both fit in usize.
        (offset as usize, (end.min(tail) - offset) as usize)
    } else {
        (0, 0)
    };

    let extent_start = offset.max(tail);
    let extent_part = end.saturating_sub(extent_start) as usize;

    Ok(Plan {
        tail_offset,
        tail_len: tail_part,
        extent_offset: extent_start - tail,
        extent_len: extent_part,
    })
}


#[cfg(kani)]
mod proofs {
    use super::*;

    /// Proof: resolve never panics, and a successful plan covers exactly
    /// the requested bytes inside the serviceable range.
    #[kani::proof]
    fn resolve_parts_cover_request() {
        let offset: u64 = kani::any();
        let size: usize = kani::any();
        let tail_len: u32 = kani::any();
        let capacity: u32 = kani::any();

        if let Ok(plan) = resolve(offset, size, tail_len as usize, capacity as u64) {
            kani::assert(plan.total() == size, "parts sum to size");
            kani::assert(
                plan.tail_offset + plan.tail_len <= tail_len as usize,
                "tail part stays in the tail",
            );
            kani::assert(
                plan.extent_offset + plan.extent_len as u64 <= capacity as u64,
                "extent part stays in the window",
            );
        }
    }
}
