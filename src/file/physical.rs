//! Memory-mapped backend for boot images stored on disk.
//!
//! [`crate::file::physical::Physical`] maps the image read-only into the VMM's address space.
//! Kernels and initial filesystems are read front to back exactly once while they are copied
//! into guest frames, so demand paging of the mapping keeps the resident footprint at a few
//! pages no matter how large the image is. Dropping the backend unmaps the file and closes the
//! underlying descriptor.

use super::Backend;
use crate::{
    Error::{FileError, OutOfBounds},
    Result,
};

use memmap2::Mmap;
use std::{fs, path::Path};

/// A file backend that uses memory-mapped I/O.
///
/// Zero-length files map successfully and report a length of `0`.
#[derive(Debug)]
pub struct Physical {
    /// Memory-mapped file data
    data: Mmap,
}

impl Physical {
    /// Open and map the image at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = fs::File::open(path)?;
        Self::from_std_file(&file)
    }

    /// Map an already opened file.
    ///
    /// The mapping stays valid after `file` is closed.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if mapping fails.
    pub fn from_std_file(file: &fs::File) -> Result<Physical> {
        // The VMM is the only writer of boot images; nothing truncates them while mapped.
        let mmap = unsafe { Mmap::map(file) }.map_err(FileError)?;

        Ok(Physical { data: mmap })
    }
}

impl Backend for Physical {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let Some(offset_end) = offset.checked_add(len) else {
            return Err(OutOfBounds);
        };

        if offset_end > self.data.len() {
            return Err(OutOfBounds);
        }

        Ok(&self.data[offset..offset_end])
    }

    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}
