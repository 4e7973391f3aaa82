//! Boot image sources.
//!
//! This module abstracts over where a boot image's bytes come from. An [`ImageFile`] owns a
//! [`Backend`] (a memory-mapped file or an in-memory buffer) together with a read cursor, and
//! is what the loader hands to the copier for exactly one load.
//!
//! # Key Components
//!
//! - [`crate::file::ImageFile`] - Scoped image handle with a sequential read cursor
//! - [`crate::file::Backend`] - Trait for the underlying data source
//! - [`crate::file::io`] - Bounds-checked integer readers used for header fields
//!
//! # Lifecycle
//!
//! An [`ImageFile`] is opened at the start of a load call and dropped before that call returns,
//! on success and on every failure path. Dropping it unmaps the file and closes the descriptor;
//! no handle survives across calls.
//!
//! # Examples
//!
//! ```rust,no_run
//! use guestimage::{detect, ImageFile, ImageKind};
//!
//! let image = ImageFile::from_file("images/linux.dtb")?;
//! let header = image.header();
//! assert_eq!(detect(&header), ImageKind::DeviceTree);
//! println!("{} bytes", image.len());
//! # Ok::<(), guestimage::Error>(())
//! ```

pub mod io;

mod physical;

use std::path::Path;

use crate::{
    image::ImageHeader,
    image::HEADER_SIZE,
    Error::{OutOfBounds, ShortTransfer},
    Result,
};
use physical::Physical;

/// Backend trait for image data sources.
///
/// Implementations provide bounds-checked random access to the complete image.
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

/// An image embedded in the VMM or already read into a buffer.
impl Backend for Vec<u8> {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.get(offset..end))
            .ok_or(OutOfBounds)
    }

    fn data(&self) -> &[u8] {
        self
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

/// An opened boot image.
///
/// Reading the header is positionless; streaming the body through
/// [`ImageFile::read_exact_into`] advances an internal cursor from the start of the image.
pub struct ImageFile {
    /// The underlying data source (memory or file).
    data: Box<dyn Backend>,
    /// Offset of the next byte handed out by `read_exact_into`.
    position: usize,
}

impl ImageFile {
    /// Opens and maps the image at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped.
    pub fn from_file(path: impl AsRef<Path>) -> Result<ImageFile> {
        let input = Physical::new(path)?;
        Ok(ImageFile::with_backend(Box::new(input)))
    }

    /// Wraps an image the VMM already holds in memory.
    #[must_use]
    pub fn from_mem(data: Vec<u8>) -> ImageFile {
        ImageFile::with_backend(Box::new(data))
    }

    fn with_backend(data: Box<dyn Backend>) -> ImageFile {
        ImageFile { data, position: 0 }
    }

    /// Total length of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the image has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// The complete image.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Bounds-checked access to part of the image.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the range extends past the end of the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data.data_slice(offset, len)
    }

    /// Copies the leading header bytes.
    ///
    /// Images shorter than [`HEADER_SIZE`] yield a header with fewer valid bytes. The read
    /// cursor is not moved.
    #[must_use]
    pub fn header(&self) -> ImageHeader {
        let data = self.data.data();
        ImageHeader::new(&data[..data.len().min(HEADER_SIZE)])
    }

    /// Offset of the next byte [`ImageFile::read_exact_into`] will return.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of bytes left after the cursor.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Moves the read cursor back to the start of the image.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Fills `dst` completely with the next bytes of the image.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ShortTransfer`] if fewer than `dst.len()` bytes remain. Nothing
    /// is copied and the cursor does not move in that case.
    pub fn read_exact_into(&mut self, dst: &mut [u8]) -> Result<()> {
        let available = self.remaining();
        if available < dst.len() {
            return Err(ShortTransfer {
                expected: dst.len(),
                actual: available,
            });
        }

        dst.copy_from_slice(self.data.data_slice(self.position, dst.len())?);
        self.position += dst.len();
        Ok(())
    }
}

impl std::fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageFile")
            .field("len", &self.data.len())
            .field("position", &self.position)
            .finish()
    }
}
