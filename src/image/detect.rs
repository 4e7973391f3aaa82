//! Boot image format detection.
//!
//! [`detect`] classifies an [`ImageHeader`] by checking signatures in a fixed priority order
//! and returning the first match:
//!
//! | Priority | Kind | Offset | Signature |
//! |---|---|---|---|
//! | 1 | [`ImageKind::Elf`] | 0 | `7F 45 4C 46` |
//! | 2 | [`ImageKind::ZImage`] | 36 | `0x016F2818` (LE u32) |
//! | 3 | [`ImageKind::UImage`] | 0 | `0x56190527` (LE u32) |
//! | 4 | [`ImageKind::DeviceTree`] | 0 | `0xEDFE0DD0` (LE u32) |
//! | 5 | [`ImageKind::InitrdGz`] | 0 | `0x8B1F` (LE u16) |
//! | - | [`ImageKind::Binary`] | - | anything else |
//!
//! A header that is too short for a signature never matches it, so detection cannot read out
//! of bounds and always produces a kind.

use goblin::elf::header::{ELFMAG, SELFMAG};

use crate::{
    file::io::{read_le_at, HeaderIO},
    image::{
        header::{ZIMAGE_MAGIC, ZIMAGE_MAGIC_OFFSET},
        ImageHeader, ImageKind,
    },
};

/// Magic value of a legacy U-Boot image.
pub const UIMAGE_MAGIC: u32 = 0x5619_0527;

/// Flattened device tree magic as read little-endian from the big-endian `D0 0D FE ED`.
pub const DTB_MAGIC: u32 = 0xEDFE_0DD0;

/// gzip member magic as read little-endian from `1F 8B`.
pub const INITRD_GZ_MAGIC: u16 = 0x8B1F;

type Matcher = fn(&[u8]) -> bool;

/// Signatures in priority order.
const SIGNATURES: [(Matcher, ImageKind); 5] = [
    (is_elf, ImageKind::Elf),
    (is_zimage, ImageKind::ZImage),
    (is_uimage, ImageKind::UImage),
    (is_dtb, ImageKind::DeviceTree),
    (is_initrd_gz, ImageKind::InitrdGz),
];

/// Classify an image by its header.
///
/// # Examples
///
/// ```rust
/// use guestimage::{detect, ImageHeader, ImageKind};
///
/// let header = ImageHeader::new(&[0xD0, 0x0D, 0xFE, 0xED, 0x00, 0x00, 0x10, 0x00]);
/// assert_eq!(detect(&header), ImageKind::DeviceTree);
///
/// let header = ImageHeader::new(b"just some bytes");
/// assert_eq!(detect(&header), ImageKind::Binary);
/// ```
#[must_use]
pub fn detect(header: &ImageHeader) -> ImageKind {
    let data = header.as_bytes();

    SIGNATURES
        .iter()
        .find(|(matches, _)| matches(data))
        .map_or(ImageKind::Binary, |(_, kind)| *kind)
}

fn magic_at<T: HeaderIO>(data: &[u8], offset: usize) -> Option<T> {
    let mut offset = offset;
    read_le_at(data, &mut offset).ok()
}

fn is_elf(data: &[u8]) -> bool {
    data.len() >= SELFMAG && &data[..SELFMAG] == ELFMAG
}

fn is_zimage(data: &[u8]) -> bool {
    magic_at::<u32>(data, ZIMAGE_MAGIC_OFFSET) == Some(ZIMAGE_MAGIC)
}

fn is_uimage(data: &[u8]) -> bool {
    magic_at::<u32>(data, 0) == Some(UIMAGE_MAGIC)
}

fn is_dtb(data: &[u8]) -> bool {
    magic_at::<u32>(data, 0) == Some(DTB_MAGIC)
}

fn is_initrd_gz(data: &[u8]) -> bool {
    magic_at::<u16>(data, 0) == Some(INITRD_GZ_MAGIC)
}
