//! Crafted boot image headers.
//!
//! Every factory returns a full [`HEADER_SIZE`] buffer carrying exactly one signature, so that
//! tests can add a second one where they need to check priority.

use crate::image::{DTB_MAGIC, HEADER_SIZE, UIMAGE_MAGIC, ZIMAGE_MAGIC, ZIMAGE_MAGIC_OFFSET};

/// ARM `mov r0, r0`, the filler zImage stubs start with.
const ARM_NOP: u32 = 0xE1A0_0000;

/// ELF64 little-endian identifier followed by zeros.
pub fn elf_header() -> Vec<u8> {
    let mut bytes = vec![0u8; HEADER_SIZE];
    bytes[0..4].copy_from_slice(b"\x7FELF");
    bytes[4] = 2; // ELFCLASS64
    bytes[5] = 1; // ELFDATA2LSB
    bytes[6] = 1; // EV_CURRENT
    bytes
}

/// zImage header with the given `start` and `end` fields.
pub fn zimage_header(start: u32, end: u32) -> Vec<u8> {
    let mut bytes = vec![0u8; HEADER_SIZE];
    for word in bytes[..ZIMAGE_MAGIC_OFFSET].chunks_exact_mut(4) {
        word.copy_from_slice(&ARM_NOP.to_le_bytes());
    }
    bytes[36..40].copy_from_slice(&ZIMAGE_MAGIC.to_le_bytes());
    bytes[40..44].copy_from_slice(&start.to_le_bytes());
    bytes[44..48].copy_from_slice(&end.to_le_bytes());
    bytes
}

/// Legacy U-Boot header magic followed by zeros.
pub fn uimage_header() -> Vec<u8> {
    let mut bytes = vec![0u8; HEADER_SIZE];
    bytes[0..4].copy_from_slice(&UIMAGE_MAGIC.to_le_bytes());
    bytes
}

/// FDT header: magic and a big-endian `totalsize` of one page.
pub fn dtb_header() -> Vec<u8> {
    let mut bytes = vec![0u8; HEADER_SIZE];
    bytes[0..4].copy_from_slice(&DTB_MAGIC.to_le_bytes());
    bytes[4..8].copy_from_slice(&0x1000_u32.to_be_bytes());
    bytes
}

/// gzip member header, deflate, no flags.
pub fn initrd_gz_header() -> Vec<u8> {
    let mut bytes = vec![0u8; HEADER_SIZE];
    bytes[0..4].copy_from_slice(&[0x1F, 0x8B, 0x08, 0x00]);
    bytes
}

/// `len` bytes of a non-repeating-per-page pattern.
pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
