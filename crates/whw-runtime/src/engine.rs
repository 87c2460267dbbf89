//! Read/write engine: moves bytes between a buffer and a store's logical
//! address space.
//!
//! Every transfer is validated completely before anything is mutated:
//! header, range resolution, buffer placement. A straddling write commits
//! its extent part first and touches the tail only once the extended store
//! has accepted its bytes, so a failed call leaves the tail as it was.
//! Transfers never write the header.

use crate::layout::{RandomAccessHeader, HEADER_SIZE};
use crate::resolve::{resolve, Plan};
use crate::{Backing, IsolatedMemory, StoreError, StoreResult};

/// A validated `[addr, addr + len)` range of linear memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    addr: usize,
    len: usize,
}

impl Span {
    /// Validate that `[addr, addr + len)` lies in the active memory.
    ///
    /// # Errors
    /// `Buffer` if the span overflows or leaves the active region.
    pub fn new<const MAX_PAGES: usize>(
        memory: &IsolatedMemory<MAX_PAGES>,
        addr: usize,
        len: usize,
    ) -> StoreResult<Self> {
        if !memory.contains(addr, len) {
            return Err(StoreError::Buffer);
        }
        Ok(Self { addr, len })
    }

    pub fn addr(&self) -> usize {
        self.addr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One past the last byte. Cannot overflow: checked at construction.
    pub fn end(&self) -> usize {
        self.addr + self.len
    }

    /// Whether the two spans share at least one byte.
    pub fn overlaps(&self, other: &Span) -> bool {
        !self.is_empty() && !other.is_empty() && self.addr < other.end() && other.addr < self.end()
    }
}

/// An opened store: a validated base address, its tail region and the
/// header read at open time.
///
/// The header is read once at open time and never written back.
#[derive(Debug)]
pub struct StoreHandle {
    base: usize,
    header_span: Span,
    tail: Span,
    header: RandomAccessHeader,
}

impl StoreHandle {
    /// Open the store at `base` with a tail region of `tail_len` bytes.
    ///
    /// An all-zero header is accepted as a tail-only store with no extent
    /// window and stays all-zero.
    ///
    /// # Errors
    /// - `InvalidHandle` if the header is outside memory or not a store header
    /// - `Bounds` if the tail region does not fit in the active memory
    pub fn open<const MAX_PAGES: usize>(
        memory: &IsolatedMemory<MAX_PAGES>,
        base: usize,
        tail_len: usize,
    ) -> StoreResult<Self> {
        let header = RandomAccessHeader::load(memory, base)?;
        if !header.is_pristine() && !header.is_valid() {
            return Err(StoreError::InvalidHandle);
        }
        let header_span = Span::new(memory, base, HEADER_SIZE).map_err(|_| StoreError::InvalidHandle)?;
        let tail = Span::new(memory, header_span.end(), tail_len).map_err(|_| StoreError::Bounds)?;
        Ok(Self {
            base,
            header_span,
            tail,
            header,
        })
    }

    pub fn base(&self) -> usize {
        self.base
    }

    /// The tail region in linear memory.
    pub fn tail(&self) -> Span {
        self.tail
    }

    pub fn header(&self) -> &RandomAccessHeader {
        &self.header
    }

    /// End of the logical address space: `L + extent_capacity`.
    pub fn serviceable_len(&self) -> u64 {
        self.tail.len() as u64 + u64::from(self.header.extent_capacity)
    }

    fn plan(&self, offset: u64, size: usize) -> StoreResult<Plan> {
        resolve(
            offset,
            size,
            self.tail.len(),
            u64::from(self.header.extent_capacity),
        )
    }

    /// Payload buffers may not alias the store they are copied into/out of.
    fn check_buffer(&self, buffer: &Span) -> StoreResult<()> {
        if buffer.overlaps(&self.header_span) || buffer.overlaps(&self.tail) {
            return Err(StoreError::Buffer);
        }
        Ok(())
    }

    fn backing_offset(&self, plan: &Plan) -> StoreResult<u64> {
        self.header
            .extent_origin
            .checked_add(plan.extent_offset)
            .ok_or(StoreError::BackingStore(crate::BackingFault::CapacityExceeded))
    }

    /// Write `input` (a span of linear memory) at logical `offset`.
    ///
    /// Returns `input.len()` on success.
    pub fn write<const MAX_PAGES: usize, B: Backing>(
        &self,
        memory: &mut IsolatedMemory<MAX_PAGES>,
        backing: &mut B,
        input: Span,
        offset: u64,
    ) -> StoreResult<usize> {
        let plan = self.plan(offset, input.len())?;
        self.check_buffer(&input)?;
        if plan.total() == 0 {
            return Ok(0);
        }

        if plan.extent_len > 0 {
            let at = self.backing_offset(&plan)?;
            let src = memory
                .slice(input.addr() + plan.split(), plan.extent_len)
                .map_err(|_| StoreError::Buffer)?;
            backing.write_at(at, src).map_err(StoreError::BackingStore)?;
        }
        if plan.tail_len > 0 {
            memory
                .copy_within(self.tail.addr() + plan.tail_offset, input.addr(), plan.tail_len)
                .map_err(|_| StoreError::Buffer)?;
        }
        Ok(plan.total())
    }

    /// Read into `output` (a span of linear memory) from logical `offset`.
    ///
    /// Returns `output.len()` on success. On failure the contents of
    /// `output` are unspecified; the store itself is never modified.
    pub fn read<const MAX_PAGES: usize, B: Backing>(
        &self,
        memory: &mut IsolatedMemory<MAX_PAGES>,
        backing: &mut B,
        output: Span,
        offset: u64,
    ) -> StoreResult<usize> {
        let plan = self.plan(offset, output.len())?;
        self.check_buffer(&output)?;

        if plan.extent_len > 0 {
            let at = self.backing_offset(&plan)?;
            let dst = memory
                .slice_mut(output.addr() + plan.split(), plan.extent_len)
                .map_err(|_| StoreError::Buffer)?;
            backing.read_at(at, dst).map_err(StoreError::BackingStore)?;
        }
        if plan.tail_len > 0 {
            memory
                .copy_within(output.addr(), self.tail.addr() + plan.tail_offset, plan.tail_len)
                .map_err(|_| StoreError::Buffer)?;
        }
        Ok(plan.total())
    }

    /// Write a host-side slice (outside linear memory) at logical `offset`.
    pub fn write_from_slice<const MAX_PAGES: usize, B: Backing>(
        &self,
        memory: &mut IsolatedMemory<MAX_PAGES>,
        backing: &mut B,
        data: &[u8],
        offset: u64,
    ) -> StoreResult<usize> {
        let plan = self.plan(offset, data.len())?;
        if plan.total() == 0 {
            return Ok(0);
        }
        let (head, rest) = data.split_at(plan.split());

        if plan.extent_len > 0 {
            let at = self.backing_offset(&plan)?;
            backing.write_at(at, rest).map_err(StoreError::BackingStore)?;
        }
        if plan.tail_len > 0 {
            memory
                .write_bytes(self.tail.addr() + plan.tail_offset, head)
                .map_err(|_| StoreError::Bounds)?;
        }
        Ok(plan.total())
    }

    /// Read into a host-side slice (outside linear memory) from logical `offset`.
    pub fn read_into_slice<const MAX_PAGES: usize, B: Backing>(
        &self,
        memory: &IsolatedMemory<MAX_PAGES>,
        backing: &mut B,
        buf: &mut [u8],
        offset: u64,
    ) -> StoreResult<usize> {
        let plan = self.plan(offset, buf.len())?;
        let (head, rest) = buf.split_at_mut(plan.split());

        if plan.extent_len > 0 {
            let at = self.backing_offset(&plan)?;
            backing.read_at(at, rest).map_err(StoreError::BackingStore)?;
        }
        if plan.tail_len > 0 {
            memory
                .read_bytes(self.tail.addr() + plan.tail_offset, head)
                .map_err(|_| StoreError::Bounds)?;
        }
        Ok(plan.total())
    }
}
