//! Shared fixture for the embedding tests: one instance, one lent memory.

use whw_runtime::{BindingMode, Instance, IsolatedMemory, VecBacking, HEADER_SIZE};

/// Pages of the fixture memory.
pub const PAGES: usize = 4;

/// Base address of the first store, mirroring a typical `__heap_base`.
pub const HEAP_BASE: u32 = 66_560;

/// A host with one store at [`HEAP_BASE`] and a payload area after its tail.
pub struct Harness {
    pub memory: Box<IsolatedMemory<PAGES>>,
    pub instance: Instance<VecBacking>,
    pub base: u32,
    pub tail_len: u32,
}

impl Harness {
    /// Minimal binding, no extended store.
    pub fn new(tail_len: u32) -> Self {
        Self::with_extent(BindingMode::Minimal, tail_len, 0)
    }

    /// Store formatted with an extent window of `extent_capacity` bytes.
    ///
    /// A system-interface harness is left uninitialised and unformatted.
    pub fn with_extent(mode: BindingMode, tail_len: u32, extent_capacity: u32) -> Self {
        let memory = IsolatedMemory::try_new_boxed(PAGES).expect("fixture memory");
        let backing = VecBacking::with_limit(u64::from(extent_capacity));
        let mut harness = Self {
            memory,
            instance: Instance::new(mode, HEAP_BASE, backing),
            base: HEAP_BASE,
            tail_len,
        };
        if mode == BindingMode::Minimal && extent_capacity > 0 {
            let status = harness
                .instance
                .init(&mut harness.memory, HEAP_BASE, extent_capacity);
            assert_eq!(status, 0, "fixture store init");
        }
        harness
    }

    /// Address of the tail region.
    pub fn tail_addr(&self) -> u32 {
        self.base + HEADER_SIZE as u32
    }

    /// Payload buffer `n` (4 KiB apart) after the tail.
    pub fn buffer(&self, n: u32) -> u32 {
        self.tail_addr() + self.tail_len + n * 4096
    }

    pub fn place(&mut self, addr: u32, data: &[u8]) {
        self.memory
            .write_bytes(addr as usize, data)
            .expect("payload inside memory");
    }

    pub fn bytes(&self, addr: u32, len: usize) -> Vec<u8> {
        self.memory
            .slice(addr as usize, len)
            .expect("payload inside memory")
            .to_vec()
    }

    /// `whw_write` from buffer `n`.
    pub fn write(&mut self, n: u32, offset: u32, size: u32) -> i32 {
        let input = self.buffer(n);
        self.instance
            .write(&mut self.memory, self.base, self.tail_len, input, offset, size)
    }

    /// `whw_read` into buffer `n`.
    pub fn read(&mut self, n: u32, offset: u32, size: u32) -> i32 {
        let output = self.buffer(n);
        self.instance
            .read(&mut self.memory, self.base, self.tail_len, output, offset, size)
    }

    /// Place `data` in buffer 0 and write it at `offset`.
    pub fn put(&mut self, offset: u32, data: &[u8]) -> i32 {
        let input = self.buffer(0);
        self.place(input, data);
        self.write(0, offset, data.len() as u32)
    }

    /// Read `len` bytes at `offset` through buffer 1.
    pub fn get(&mut self, offset: u32, len: usize) -> Result<Vec<u8>, i32> {
        match self.read(1, offset, len as u32) {
            n if n >= 0 => Ok(self.bytes(self.buffer(1), n as usize)),
            sentinel => Err(sentinel),
        }
    }
}
