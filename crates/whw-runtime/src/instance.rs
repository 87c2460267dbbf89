//! Guest instance: the store module as seen through its exports.
//!
//! An `Instance` does not own linear memory: the host lends it on every
//! call, like a shared library using the host process's address space.
//! The instance owns its globals, the extended store that backs every
//! store it formats, and the record of which extent window it handed to
//! which store. A header is only honoured if it matches that record, so
//! header bytes written by anyone other than `init` cannot reach the
//! extended store.
//!
//! Two bindings are supported without changing the instance:
//! - `Minimal`: the host supplies memory and calls exports directly.
//! - `SystemInterface`: the host must run [`Instance::initialize`] with its
//!   system-call shim first, even though the module has no entry point.
//!   Store exports fail with `InvalidHandle` until it has.
//!
//! Export methods speak the `i32` ABI (byte count or negative sentinel);
//! the `try_*` methods are the typed equivalents.

use crate::engine::{Span, StoreHandle};
use crate::host::{Errno, SystemInterface};
use crate::layout::{RandomAccessHeader, HEADER_SIZE};
use crate::{to_status, Backing, BackingFault, IsolatedMemory, StoreError, StoreResult};

/// How the host embeds the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingMode {
    /// Raw linear memory only.
    Minimal,
    /// Linear memory plus a system-call shim that must be wired first.
    SystemInterface,
}

/// Module-level globals.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Globals {
    /// `__heap_base`: first address the host may place stores and buffers at.
    pub heap_base: u32,
    pub argc: u32,
    pub argv_buf_size: u32,
    pub environ_count: u32,
    pub environ_buf_size: u32,
}

/// Byte counts must be representable in the `i32` return value. Checked
/// before the buffer so an oversized request reports `Bounds`.
fn check_size(size: u32) -> StoreResult<()> {
    if size > i32::MAX as u32 {
        return Err(StoreError::Bounds);
    }
    Ok(())
}

/// Stores an instance can format with `init`.
pub const MAX_STORES: usize = 16;

/// An extent window handed out by `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    base: u32,
    origin: u64,
    capacity: u32,
}

/// A store module instance.
pub struct Instance<B> {
    /// Module-level global variables.
    pub globals: Globals,
    backing: B,
    mode: BindingMode,
    initialized: bool,
    /// Bump cursor for extent windows handed out by `init`.
    next_origin: u64,
    /// Current window of every formatted store, one slot per base.
    windows: [Option<Window>; MAX_STORES],
}

impl<B: Backing> Instance<B> {
    /// Create an instance whose stores live at or above `heap_base` and
    /// whose extent windows are carved out of `backing`.
    pub fn new(mode: BindingMode, heap_base: u32, backing: B) -> Self {
        Self {
            globals: Globals {
                heap_base,
                ..Globals::default()
            },
            backing,
            mode,
            initialized: mode == BindingMode::Minimal,
            next_origin: 0,
            windows: [None; MAX_STORES],
        }
    }

    pub fn mode(&self) -> BindingMode {
        self.mode
    }

    /// Whether store exports may be called.
    pub fn is_ready(&self) -> bool {
        self.initialized
    }

    pub fn backing(&self) -> &B {
        &self.backing
    }

    pub fn backing_mut(&mut self) -> &mut B {
        &mut self.backing
    }

    /// Bytes of the extended store not yet assigned to a store.
    pub fn unallocated_extent(&self) -> u64 {
        self.backing.capacity().saturating_sub(self.next_origin)
    }

    /// Reactor initialisation through the host's system interface.
    ///
    /// Records argument and environment sizes in the globals. Idempotent.
    ///
    /// # Errors
    /// The first `Errno` returned by the shim; the instance stays unready.
    pub fn initialize<S: SystemInterface>(&mut self, sys: &mut S) -> Result<(), Errno> {
        let (argc, argv_buf_size) = sys.args_sizes_get()?;
        let (environ_count, environ_buf_size) = sys.environ_sizes_get()?;
        self.globals.argc = argc;
        self.globals.argv_buf_size = argv_buf_size;
        self.globals.environ_count = environ_count;
        self.globals.environ_buf_size = environ_buf_size;
        self.initialized = true;
        Ok(())
    }

    /// Console output on behalf of the module (`fd_write`).
    ///
    /// # Errors
    /// `NOSYS` under the minimal binding, `BADF` before `initialize`, or
    /// whatever the shim reports.
    pub fn console_write<S: SystemInterface>(
        &self,
        sys: &mut S,
        fd: u32,
        data: &[u8],
    ) -> Result<usize, Errno> {
        match self.mode {
            BindingMode::Minimal => Err(Errno::NOSYS),
            BindingMode::SystemInterface if !self.initialized => Err(Errno::BADF),
            BindingMode::SystemInterface => sys.fd_write(fd, data),
        }
    }

    fn ensure_ready(&self) -> StoreResult<()> {
        if !self.initialized {
            return Err(StoreError::InvalidHandle);
        }
        Ok(())
    }

    /// Whether `init` gave the store at `base` exactly this window.
    fn issued(&self, base: u32, header: &RandomAccessHeader) -> bool {
        self.windows.iter().flatten().any(|w| {
            w.base == base
                && w.origin == header.extent_origin
                && w.capacity == header.extent_capacity
        })
    }

    /// Open the store at `store_base` for direct use with the typed engine.
    ///
    /// # Errors
    /// `InvalidHandle` if the header is not all-zero and does not describe
    /// the window `init` handed to this base, plus the errors of
    /// [`StoreHandle::open`].
    pub fn open<const MAX_PAGES: usize>(
        &self,
        memory: &IsolatedMemory<MAX_PAGES>,
        store_base: u32,
        tail_length: u32,
    ) -> StoreResult<StoreHandle> {
        self.ensure_ready()?;
        let store = StoreHandle::open(memory, store_base as usize, tail_length as usize)?;
        let header = store.header();
        if !header.is_pristine() && !self.issued(store_base, header) {
            return Err(StoreError::InvalidHandle);
        }
        Ok(store)
    }

    // ── Typed operations ──────────────────────────────────────────────

    /// Format a store at `store_base` with a fresh extent window of
    /// `extent_capacity` bytes. Re-initialising a store replaces its window;
    /// the previous one is not reclaimed.
    ///
    /// # Errors
    /// `BackingStore(CapacityExceeded)` if the extended store cannot hold
    /// the window or [`MAX_STORES`] other bases are already formatted.
    pub fn try_init<const MAX_PAGES: usize>(
        &mut self,
        memory: &mut IsolatedMemory<MAX_PAGES>,
        store_base: u32,
        extent_capacity: u32,
    ) -> StoreResult<()> {
        self.ensure_ready()?;
        if !memory.contains(store_base as usize, HEADER_SIZE) {
            return Err(StoreError::InvalidHandle);
        }
        let exhausted = StoreError::BackingStore(BackingFault::CapacityExceeded);
        let origin = self.next_origin;
        let end = origin
            .checked_add(u64::from(extent_capacity))
            .filter(|&end| end <= self.backing.capacity())
            .ok_or(exhausted)?;
        let slot = self
            .windows
            .iter()
            .position(|slot| matches!(slot, Some(w) if w.base == store_base))
            .or_else(|| self.windows.iter().position(Option::is_none))
            .ok_or(exhausted)?;
        RandomAccessHeader::formatted(origin, extent_capacity).store(memory, store_base as usize)?;
        self.windows[slot] = Some(Window {
            base: store_base,
            origin,
            capacity: extent_capacity,
        });
        self.next_origin = end;
        Ok(())
    }

    /// Typed `write`: bytes written, always `size` on success.
    pub fn try_write<const MAX_PAGES: usize>(
        &mut self,
        memory: &mut IsolatedMemory<MAX_PAGES>,
        store_base: u32,
        tail_length: u32,
        input: u32,
        offset: u32,
        size: u32,
    ) -> StoreResult<usize> {
        let store = self.open(memory, store_base, tail_length)?;
        check_size(size)?;
        let input = Span::new(memory, input as usize, size as usize)?;
        store.write(memory, &mut self.backing, input, u64::from(offset))
    }

    /// Typed `read`: bytes read, always `size` on success.
    pub fn try_read<const MAX_PAGES: usize>(
        &mut self,
        memory: &mut IsolatedMemory<MAX_PAGES>,
        store_base: u32,
        tail_length: u32,
        output: u32,
        offset: u32,
        size: u32,
    ) -> StoreResult<usize> {
        let store = self.open(memory, store_base, tail_length)?;
        check_size(size)?;
        let output = Span::new(memory, output as usize, size as usize)?;
        store.read(memory, &mut self.backing, output, u64::from(offset))
    }

    /// Write a host-side slice at logical `offset`.
    pub fn write_slice<const MAX_PAGES: usize>(
        &mut self,
        memory: &mut IsolatedMemory<MAX_PAGES>,
        store_base: u32,
        tail_length: u32,
        data: &[u8],
        offset: u64,
    ) -> StoreResult<usize> {
        let store = self.open(memory, store_base, tail_length)?;
        store.write_from_slice(memory, &mut self.backing, data, offset)
    }

    /// Read into a host-side slice from logical `offset`.
    pub fn read_slice<const MAX_PAGES: usize>(
        &mut self,
        memory: &IsolatedMemory<MAX_PAGES>,
        store_base: u32,
        tail_length: u32,
        buf: &mut [u8],
        offset: u64,
    ) -> StoreResult<usize> {
        let store = self.open(memory, store_base, tail_length)?;
        store.read_into_slice(memory, &mut self.backing, buf, offset)
    }

    // ── Exports (i32 ABI) ─────────────────────────────────────────────

    /// `sizeof_whw_RandomAccess`.
    pub fn sizeof_random_access(&self) -> i32 {
        HEADER_SIZE as i32
    }

    /// `__heap_base`.
    pub fn heap_base(&self) -> i32 {
        self.globals.heap_base as i32
    }

    /// `whw_init`: 0 on success, negative sentinel on failure.
    pub fn init<const MAX_PAGES: usize>(
        &mut self,
        memory: &mut IsolatedMemory<MAX_PAGES>,
        store_base: u32,
        extent_capacity: u32,
    ) -> i32 {
        to_status(
            self.try_init(memory, store_base, extent_capacity)
                .map(|()| 0),
        )
    }

    /// `whw_write`.
    pub fn write<const MAX_PAGES: usize>(
        &mut self,
        memory: &mut IsolatedMemory<MAX_PAGES>,
        store_base: u32,
        tail_length: u32,
        input: u32,
        offset: u32,
        size: u32,
    ) -> i32 {
        to_status(self.try_write(memory, store_base, tail_length, input, offset, size))
    }

    /// `whw_read`.
    pub fn read<const MAX_PAGES: usize>(
        &mut self,
        memory: &mut IsolatedMemory<MAX_PAGES>,
        store_base: u32,
        tail_length: u32,
        output: u32,
        offset: u32,
        size: u32,
    ) -> i32 {
        to_status(self.try_read(memory, store_base, tail_length, output, offset, size))
    }
}
