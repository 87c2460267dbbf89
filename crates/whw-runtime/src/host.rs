//! System-interface imports the host can wire into an instance.
//!
//! This is the subset of `wasi_snapshot_preview1` a store module touches:
//! the argument/environment sizing calls made by the module's reactor
//! initialisation, and `fd_write` for console output. Store operations
//! themselves never call into the host.

/// WASI-style error number returned by a system-interface call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Errno(pub u16);

impl Errno {
    /// Bad file descriptor.
    pub const BADF: Errno = Errno(8);
    /// Function not supported.
    pub const NOSYS: Errno = Errno(52);
}

/// Host functions imported from the system-interface module.
pub trait SystemInterface {
    /// `(argc, argv_buf_size)`.
    fn args_sizes_get(&mut self) -> Result<(u32, u32), Errno>;

    /// `(environ_count, environ_buf_size)`.
    fn environ_sizes_get(&mut self) -> Result<(u32, u32), Errno>;

    /// Write `data` to `fd`, returning the number of bytes written. Reached
    /// through [`Instance::console_write`](crate::Instance::console_write).
    fn fd_write(&mut self, fd: u32, data: &[u8]) -> Result<usize, Errno>;
}

/// Host with no system interface at all (minimal binding).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSystem;

impl SystemInterface for NoSystem {
    fn args_sizes_get(&mut self) -> Result<(u32, u32), Errno> {
        Err(Errno::NOSYS)
    }

    fn environ_sizes_get(&mut self) -> Result<(u32, u32), Errno> {
        Err(Errno::NOSYS)
    }

    fn fd_write(&mut self, _fd: u32, _data: &[u8]) -> Result<usize, Errno> {
        Err(Errno::NOSYS)
    }
}
