//! Standard-library implementation of the system interface.

use std::io::{self, Write};

use whw_runtime::{Errno, SystemInterface};

/// System-call shim backed by the host process.
///
/// fd 1 goes to `out`, fd 2 to the process's stderr; anything else is
/// `BADF`.
pub struct StdSystem<W> {
    args: Vec<String>,
    env: Vec<(String, String)>,
    out: W,
}

impl StdSystem<io::Stdout> {
    /// Shim exposing this process's arguments, environment and stdout.
    pub fn from_env() -> Self {
        Self::new(std::env::args().collect(), std::env::vars().collect(), io::stdout())
    }
}

impl<W: Write> StdSystem<W> {
    pub fn new(args: Vec<String>, env: Vec<(String, String)>, out: W) -> Self {
        Self { args, env, out }
    }

    pub fn into_output(self) -> W {
        self.out
    }
}

/// Bytes needed to store every string NUL-terminated.
fn buf_size(items: impl Iterator<Item = usize>) -> Result<u32, Errno> {
    let total: usize = items.map(|len| len + 1).sum();
    u32::try_from(total).map_err(|_| Errno(61)) // EOVERFLOW
}

impl<W: Write> SystemInterface for StdSystem<W> {
    fn args_sizes_get(&mut self) -> Result<(u32, u32), Errno> {
        let argc = u32::try_from(self.args.len()).map_err(|_| Errno(61))?;
        Ok((argc, buf_size(self.args.iter().map(String::len))?))
    }

    fn environ_sizes_get(&mut self) -> Result<(u32, u32), Errno> {
        let count = u32::try_from(self.env.len()).map_err(|_| Errno(61))?;
        // Each entry is stored as `KEY=VALUE\0`.
        let size = buf_size(self.env.iter().map(|(k, v)| k.len() + 1 + v.len()))?;
        Ok((count, size))
    }

    fn fd_write(&mut self, fd: u32, data: &[u8]) -> Result<usize, Errno> {
        let result = match fd {
            1 => self.out.write_all(data).and_then(|()| self.out.flush()),
            2 => io::stderr().write_all(data),
            _ => return Err(Errno::BADF),
        };
        result.map(|()| data.len()).map_err(|_| Errno(29)) // EIO
    }
}
