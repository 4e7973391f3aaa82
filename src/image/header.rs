//! Leading header bytes of a boot image and the structured views derived from them.
//!
//! An [`ImageHeader`] is a fixed-capacity copy of the first [`HEADER_SIZE`] bytes of an image,
//! which is large enough to hold every recognised signature (an ELF64 file header is the
//! largest). Shorter images produce a header with fewer valid bytes; every field accessor is
//! bounds-checked against the valid length, never against the capacity.
//!
//! The only structured view needed for placement is the zImage header:
//!
//! ```text
//! offset  0   code[9]   reserved words, executable stub
//! offset 36   magic     0x016F2818
//! offset 40   start     preferred load address, 0 if position independent
//! offset 44   end       end address of the image
//! ```

use crate::{file::io::read_le_at, Error, Result};

/// Capacity of an [`ImageHeader`]: the size of an ELF64 file header.
pub const HEADER_SIZE: usize = goblin::elf64::header::SIZEOF_EHDR;

/// Magic value identifying a zImage.
pub const ZIMAGE_MAGIC: u32 = 0x016F_2818;

/// Offset of the zImage magic, after nine reserved 32-bit words.
pub const ZIMAGE_MAGIC_OFFSET: usize = 9 * 4;

/// The first bytes of an image, as read once before detection.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    bytes: [u8; HEADER_SIZE],
    len: usize,
}

impl ImageHeader {
    /// Copy up to [`HEADER_SIZE`] leading bytes of `data` into a header.
    #[must_use]
    pub fn new(data: &[u8]) -> ImageHeader {
        let len = data.len().min(HEADER_SIZE);
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..len].copy_from_slice(&data[..len]);

        ImageHeader { bytes, len }
    }

    /// The valid header bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Number of valid bytes, at most [`HEADER_SIZE`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the image had no bytes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if the header holds the full [`HEADER_SIZE`] bytes.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.len == HEADER_SIZE
    }

    /// Interpret the header as a zImage header.
    ///
    /// The magic is not checked here; callers classify the header first.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the header is too short to hold the zImage fields.
    pub fn zimage(&self) -> Result<ZImageHeader> {
        ZImageHeader::parse(self.as_bytes())
    }
}

impl std::fmt::Debug for ImageHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageHeader")
            .field("len", &self.len)
            .field("bytes", &format_args!("{:02x?}", self.as_bytes()))
            .finish()
    }
}

/// The fields of a zImage header that follow the reserved code words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZImageHeader {
    /// Format magic, [`ZIMAGE_MAGIC`] for a real zImage
    pub magic: u32,
    /// Preferred physical load address, `0` if the image does not care
    pub start: u32,
    /// End address of the image
    pub end: u32,
}

impl ZImageHeader {
    /// Size of the fixed zImage header.
    pub const SIZE: usize = ZIMAGE_MAGIC_OFFSET + 3 * 4;

    /// Read the zImage fields from `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than [`ZImageHeader::SIZE`].
    pub fn parse(data: &[u8]) -> Result<ZImageHeader> {
        if data.len() < Self::SIZE {
            return Err(Error::OutOfBounds);
        }

        let mut offset = ZIMAGE_MAGIC_OFFSET;
        Ok(ZImageHeader {
            magic: read_le_at(data, &mut offset)?,
            start: read_le_at(data, &mut offset)?,
            end: read_le_at(data, &mut offset)?,
        })
    }

    /// Returns `true` if the magic identifies a zImage.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.magic == ZIMAGE_MAGIC
    }
}
