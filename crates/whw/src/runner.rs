//! Host side of the binding protocol, driving a native store instance.
//!
//! The host owns linear memory and lends it to the instance on each call,
//! exactly as a Wasm embedder would. Calls go through the `i32` exports so
//! the sentinel convention is exercised end to end; sentinels are lifted
//! back into `StoreError` for reporting. Any other negative status means the
//! host and module disagree on the ABI and is reported with its raw value.

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, info};
use whw_runtime::{
    Backing, BindingMode, Instance, IsolatedMemory, NoBacking, StoreError, SystemInterface,
    VecBacking,
};

use crate::backing::FileBacking;
use crate::config::{HostOptions, MAX_PAGES};

/// Turn an export's `i32` status into a byte count.
///
/// Known sentinels become a `StoreError` (recoverable with `downcast_ref`).
pub fn lift_status(status: i32) -> Result<usize> {
    if let Ok(count) = usize::try_from(status) {
        return Ok(count);
    }
    match StoreError::from_code(status) {
        Some(err) => Err(err.into()),
        None => bail!("store export returned unknown status {status}"),
    }
}

/// Outcome of the write/read round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeReport {
    pub header_size: usize,
    pub offset: u32,
    pub written: usize,
    pub read: usize,
    /// Bytes found in the payload buffer after the read.
    pub read_back: Vec<u8>,
}

impl SmokeReport {
    pub fn matches(&self, expected: &[u8]) -> bool {
        self.read_back == expected
    }
}

/// A host embedding one store at `heap_base`.
pub struct Host {
    options: HostOptions,
    memory: Box<IsolatedMemory<MAX_PAGES>>,
    instance: Instance<Box<dyn Backing>>,
}

impl Host {
    /// Allocate linear memory and instantiate the store module.
    pub fn new(options: HostOptions) -> Result<Self> {
        let memory = IsolatedMemory::<MAX_PAGES>::try_new_boxed(options.memory_pages)
            .context("failed to allocate linear memory")?;
        let backing = open_backing(&options)?;
        let instance = Instance::new(options.binding, options.heap_base, backing);
        info!(
            pages = options.memory_pages,
            heap_base = options.heap_base,
            binding = ?options.binding,
            "instantiated store module"
        );
        Ok(Self {
            options,
            memory,
            instance,
        })
    }

    pub fn options(&self) -> &HostOptions {
        &self.options
    }

    pub fn instance(&self) -> &Instance<Box<dyn Backing>> {
        &self.instance
    }

    pub fn memory(&self) -> &IsolatedMemory<MAX_PAGES> {
        &self.memory
    }

    /// Address of the store's tail region.
    pub fn tail_addr(&self) -> u32 {
        self.options.heap_base + self.instance.sizeof_random_access() as u32
    }

    /// First address after the tail; payload buffers start here.
    pub fn payload_addr(&self) -> u32 {
        self.tail_addr() + self.options.tail_len
    }

    /// Run the module's reactor initialisation through `sys`.
    ///
    /// A no-op for the minimal binding.
    pub fn initialize<S: SystemInterface>(&mut self, sys: &mut S) -> Result<()> {
        if self.instance.mode() == BindingMode::Minimal {
            return Ok(());
        }
        self.instance
            .initialize(sys)
            .map_err(|errno| anyhow!("system interface initialisation failed (errno {})", errno.0))?;
        debug!(globals = ?self.instance.globals, "instance initialised");
        Ok(())
    }

    /// Format the store with the configured extent window. Skipped when no
    /// window is requested; a pristine header works for the tail alone.
    pub fn init_store(&mut self) -> Result<()> {
        let capacity = self.options.extent_capacity;
        if capacity == 0 {
            return Ok(());
        }
        let status = self
            .instance
            .init(&mut self.memory, self.options.heap_base, capacity);
        lift_status(status).context("whw_init failed")?;
        debug!(capacity, "store formatted");
        Ok(())
    }

    /// Copy host bytes into linear memory.
    pub fn place(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.memory
            .write_bytes(addr as usize, data)
            .map_err(|_| anyhow!("{} bytes at {addr:#x} fall outside linear memory", data.len()))
    }

    /// Copy bytes out of linear memory.
    pub fn fetch(&self, addr: u32, len: usize) -> Result<Vec<u8>> {
        let bytes = self
            .memory
            .slice(addr as usize, len)
            .map_err(|_| anyhow!("{len} bytes at {addr:#x} fall outside linear memory"))?;
        Ok(bytes.to_vec())
    }

    /// `whw_write` against the configured store.
    pub fn write(&mut self, input: u32, offset: u32, size: u32) -> Result<usize> {
        let status = self.instance.write(
            &mut self.memory,
            self.options.heap_base,
            self.options.tail_len,
            input,
            offset,
            size,
        );
        debug!(input, offset, size, status, "whw_write");
        lift_status(status)
    }

    /// `whw_read` against the configured store.
    pub fn read(&mut self, output: u32, offset: u32, size: u32) -> Result<usize> {
        let status = self.instance.read(
            &mut self.memory,
            self.options.heap_base,
            self.options.tail_len,
            output,
            offset,
            size,
        );
        debug!(output, offset, size, status, "whw_read");
        lift_status(status)
    }

    /// Write `data` at logical `offset`, clear the buffer, read it back.
    pub fn smoke(&mut self, data: &[u8], offset: u32) -> Result<SmokeReport> {
        let size = u32::try_from(data.len()).context("payload too large")?;
        let buffer = self.payload_addr();
        self.place(buffer, data)?;

        let written = self
            .write(buffer, offset, size)
            .with_context(|| format!("whw_write of {size} bytes at offset {offset} failed"))?;
        if written != data.len() {
            bail!("whw_write reported {written} bytes, expected {size}");
        }

        self.place(buffer, &vec![0; data.len()])?;
        let read = self
            .read(buffer, offset, size)
            .with_context(|| format!("whw_read of {size} bytes at offset {offset} failed"))?;
        let read_back = self.fetch(buffer, data.len())?;

        info!(offset, written, read, "round trip complete");
        Ok(SmokeReport {
            header_size: self.instance.sizeof_random_access() as usize,
            offset,
            written,
            read,
            read_back,
        })
    }

    /// Print a report through the module's console (system-interface binding).
    ///
    /// Fails with `NOSYS` under the minimal binding.
    pub fn announce<S: SystemInterface>(&self, sys: &mut S, report: &SmokeReport) -> Result<()> {
        let line = format!(
            "read {} bytes at offset {}: {}\n",
            report.read,
            report.offset,
            String::from_utf8_lossy(&report.read_back)
        );
        self.instance
            .console_write(sys, 1, line.as_bytes())
            .map_err(|errno| anyhow!("fd_write failed (errno {})", errno.0))?;
        Ok(())
    }
}

fn open_backing(options: &HostOptions) -> Result<Box<dyn Backing>> {
    let capacity = u64::from(options.extent_capacity);
    if let Some(path) = &options.backing_file {
        debug!(path = %path.display(), capacity, "file-backed extended store");
        return Ok(Box::new(FileBacking::open(path, capacity)?));
    }
    if capacity == 0 {
        return Ok(Box::new(NoBacking));
    }
    Ok(Box::new(VecBacking::with_limit(capacity)))
}
