//! File-backed medium for host-side use.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::nvm::Nvm;

/// Fixed-size medium stored in a regular file.
///
/// `create` fills the file with `0xFF` so it mounts as an empty medium;
/// `open` takes the medium size from the existing file. Every write is
/// flushed before the call returns, mirroring the durability of the EEPROM
/// this stands in for.
pub struct FileNvm {
    file: File,
    size: usize,
    path: PathBuf,
}

impl FileNvm {
    /// Create a fresh medium of `size` bytes, truncating any existing file.
    pub fn create<P: AsRef<Path>>(path: P, size: usize) -> std::io::Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.write_all(&vec![0xFF; size])?;
        file.flush()?;
        Ok(FileNvm {
            file,
            size,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Open an existing medium; its size is the file length.
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let size = file.metadata()?.len() as usize;
        Ok(FileNvm {
            file,
            size,
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn seek_to(&self, addr: usize) -> std::io::Result<()> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(addr as u64))?;
        Ok(())
    }
}

impl Nvm for FileNvm {
    fn size(&self) -> usize {
        self.size
    }

    fn read_byte(&self, addr: usize) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read(addr, &mut buf)?;
        Ok(buf[0])
    }

    fn read(&self, addr: usize, buf: &mut [u8]) -> Result<()> {
        if addr + buf.len() > self.size {
            return Err(Error::Read { addr });
        }
        self.seek_to(addr).map_err(|_| Error::Read { addr })?;
        let mut file = &self.file;
        file.read_exact(buf).map_err(|_| Error::Read { addr })
    }

    fn write_byte(&mut self, addr: usize, value: u8) -> Result<()> {
        self.write(addr, &[value])
    }

    fn write(&mut self, addr: usize, data: &[u8]) -> Result<()> {
        if addr + data.len() > self.size {
            return Err(Error::Write { addr });
        }
        self.seek_to(addr).map_err(|_| Error::Write { addr })?;
        let mut file = &self.file;
        file.write_all(data).map_err(|_| Error::Write { addr })?;
        file.flush().map_err(|_| Error::Write { addr })
    }
}
