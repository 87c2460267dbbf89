//! File-backed extended store.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{Context, Result};
use whw_runtime::{Backing, BackingFault};

/// Extended store kept in a regular file, capped at `limit` bytes.
///
/// The file grows on demand; bytes past its end read as zero. A write that
/// fits the limit but fails half-way in the OS may leave part of it on disk.
pub struct FileBacking {
    file: File,
    limit: u64,
}

impl FileBacking {
    /// Open (creating if needed) `path` as an extended store.
    pub fn open(path: &Path, limit: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("failed to open backing file {}", path.display()))?;
        Ok(Self { file, limit })
    }

    fn check(&self, offset: u64, len: usize) -> Result<(), BackingFault> {
        match offset.checked_add(len as u64) {
            Some(end) if end <= self.limit => Ok(()),
            _ => Err(BackingFault::CapacityExceeded),
        }
    }
}

fn medium(err: io::Error) -> BackingFault {
    BackingFault::Medium(err.raw_os_error().unwrap_or(-1))
}

impl Backing for FileBacking {
    fn capacity(&self) -> u64 {
        self.limit
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), BackingFault> {
        self.check(offset, buf.len())?;
        self.file.seek(SeekFrom::Start(offset)).map_err(medium)?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(medium(e)),
            }
        }
        buf[filled..].fill(0);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), BackingFault> {
        self.check(offset, data.len())?;
        self.file.seek(SeekFrom::Start(offset)).map_err(medium)?;
        self.file.write_all(data).map_err(medium)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_and_zero_past_eof() {
        let dir = tempfile::tempdir().unwrap();
        let mut backing = FileBacking::open(&dir.path().join("extent.bin"), 1024).unwrap();
        backing.write_at(10, b"abc").unwrap();

        let mut buf = [0xFFu8; 6];
        backing.read_at(9, &mut buf).unwrap();
        assert_eq!(&buf, b"\0abc\0\0");
    }

    #[test]
    fn limit_is_enforced_before_touching_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extent.bin");
        let mut backing = FileBacking::open(&path, 8).unwrap();
        assert_eq!(
            backing.write_at(6, b"abc"),
            Err(BackingFault::CapacityExceeded)
        );
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn contents_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extent.bin");
        FileBacking::open(&path, 64)
            .unwrap()
            .write_at(0, b"persist")
            .unwrap();

        let mut again = FileBacking::open(&path, 64).unwrap();
        let mut buf = [0u8; 7];
        again.read_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"persist");
    }
}
