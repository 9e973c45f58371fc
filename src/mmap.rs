//! Byte sources for database files.
//!
//! A database is consumed as one contiguous read-only slice with the
//! exact file length, either memory-mapped or read onto the heap.
//! Validation beyond "regular, non-empty file" belongs to the reader;
//! the mapped bytes stay untouched until decoding asks for them.

use crate::error::{Error, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// A read-only memory-mapped database file.
///
/// The mapping is released when the value is dropped. The file
/// contents can in principle change underneath the map if another
/// process writes the file; published `.mmdb` files are replaced
/// atomically, so the reader treats the view as immutable.
pub(crate) struct MmapFile {
    mmap: Mmap,
}

impl MmapFile {
    /// Open and map `path` read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path)?;
        if !meta.is_file() {
            return Err(Error::NotFile(path.display().to_string()));
        }
        if meta.len() == 0 {
            return Err(Error::FileEmpty);
        }
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::Io(e.to_string()))?;
        Ok(MmapFile { mmap })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mmap[..]
    }
}

/// Read a whole file onto the heap, refusing files larger than
/// `max_size` bytes.
pub(crate) fn read_bounded<P: AsRef<Path>>(path: P, max_size: u64) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let meta = std::fs::metadata(path)?;
    if !meta.is_file() {
        return Err(Error::NotFile(path.display().to_string()));
    }
    let size = meta.len();
    if size == 0 {
        return Err(Error::FileEmpty);
    }
    if size > max_size {
        return Err(Error::FileTooLarge { size, max_size });
    }
    let mut buf = Vec::with_capacity(size as usize);
    File::open(path)?.read_to_end(&mut buf)?;
    Ok(buf)
}
