//! Guest physical load address resolution.
//!
//! Each [`LoadContext`] accepts its own set of image kinds and places them by a format
//! convention:
//!
//! - **Kernel**: a raw binary goes to the VM's configured entry address. A zImage goes to the
//!   `start` address embedded in its header, or `base + 0x8000` if `start` is zero; the first
//!   32 KiB above `base` are left for the decompressor's page tables and boot data.
//! - **Module**: device trees and gzip initrds go to `base` unmodified.
//!
//! Address `0` is never a valid result.

use crate::{
    image::{ImageHeader, ImageKind, LoadContext},
    Error::{InvalidAddress, UnknownFormat},
    Result,
};

/// Distance from the RAM base at which a position independent zImage is placed.
pub const ZIMAGE_TEXT_OFFSET: u64 = 0x8000;

/// Compute the guest physical address an image of `kind` is loaded at.
///
/// `header` is only consulted for zImages. `base` is the caller-supplied base address and
/// `vm_entry` the VM's configured entry point.
///
/// # Errors
/// - [`crate::Error::UnknownFormat`] if `context` does not accept `kind`
/// - [`crate::Error::InvalidAddress`] if the resolved address is `0` or overflows
/// - [`crate::Error::OutOfBounds`] if a zImage header is truncated
///
/// # Examples
///
/// ```rust
/// use guestimage::{resolve, ImageHeader, ImageKind, LoadContext};
///
/// let header = ImageHeader::new(&[]);
/// let addr = resolve(LoadContext::Module, ImageKind::DeviceTree, &header, 0x4400_0000, 0)?;
/// assert_eq!(addr, 0x4400_0000);
///
/// assert!(resolve(LoadContext::Kernel, ImageKind::DeviceTree, &header, 0x4400_0000, 0).is_err());
/// # Ok::<(), guestimage::Error>(())
/// ```
pub fn resolve(
    context: LoadContext,
    kind: ImageKind,
    header: &ImageHeader,
    base: u64,
    vm_entry: u64,
) -> Result<u64> {
    if !context.accepts(kind) {
        return Err(UnknownFormat { context, kind });
    }

    let load_addr = match kind {
        ImageKind::Binary => vm_entry,
        ImageKind::ZImage => zimage_load_address(header, base)?,
        ImageKind::DeviceTree | ImageKind::InitrdGz => base,
        ImageKind::Elf | ImageKind::UImage => return Err(UnknownFormat { context, kind }),
    };

    if load_addr == 0 {
        return Err(InvalidAddress { kind });
    }

    Ok(load_addr)
}

/// The load address a zImage asks for, falling back to `base + 0x8000`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] for a truncated header and
/// [`crate::Error::InvalidAddress`] if the fallback overflows.
pub fn zimage_load_address(header: &ImageHeader, base: u64) -> Result<u64> {
    let zimage = header.zimage()?;
    if zimage.start != 0 {
        return Ok(u64::from(zimage.start));
    }

    base.checked_add(ZIMAGE_TEXT_OFFSET).ok_or(InvalidAddress {
        kind: ImageKind::ZImage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test::zimage_header, Error};
    use strum::IntoEnumIterator;

    const BASE: u64 = 0x4000_0000;
    const ENTRY: u64 = 0x8000_0000;

    fn empty() -> ImageHeader {
        ImageHeader::new(&[])
    }

    #[test]
    fn zimage_embedded_start() {
        let header = ImageHeader::new(&zimage_header(0x4000_8000, 0));
        let addr = resolve(LoadContext::Kernel, ImageKind::ZImage, &header, BASE, ENTRY).unwrap();
        assert_eq!(addr, 0x4000_8000);
    }

    #[test]
    fn zimage_without_start_uses_text_offset() {
        let header = ImageHeader::new(&zimage_header(0, 0));
        let addr = resolve(LoadContext::Kernel, ImageKind::ZImage, &header, BASE, ENTRY).unwrap();
        assert_eq!(addr, BASE + 0x8000);
    }

    #[test]
    fn zimage_text_offset_overflow() {
        let header = ImageHeader::new(&zimage_header(0, 0));
        let result = zimage_load_address(&header, u64::MAX - 0x10);
        assert!(matches!(result, Err(InvalidAddress { kind: ImageKind::ZImage })));
    }

    #[test]
    fn zimage_start_zero_at_base_zero() {
        let header = ImageHeader::new(&zimage_header(0, 0));
        let addr = resolve(LoadContext::Kernel, ImageKind::ZImage, &header, 0, ENTRY).unwrap();
        assert_eq!(addr, 0x8000);
    }

    #[test]
    fn binary_kernel_goes_to_entry() {
        let addr = resolve(LoadContext::Kernel, ImageKind::Binary, &empty(), BASE, ENTRY).unwrap();
        assert_eq!(addr, ENTRY);
    }

    #[test]
    fn binary_kernel_without_entry() {
        let result = resolve(LoadContext::Kernel, ImageKind::Binary, &empty(), BASE, 0);
        assert!(matches!(result, Err(InvalidAddress { kind: ImageKind::Binary })));
    }

    #[test]
    fn modules_load_at_base() {
        for kind in [ImageKind::DeviceTree, ImageKind::InitrdGz] {
            let addr = resolve(LoadContext::Module, kind, &empty(), 0x4400_0000, ENTRY).unwrap();
            assert_eq!(addr, 0x4400_0000);
        }
    }

    #[test]
    fn module_at_zero_base() {
        let result = resolve(LoadContext::Module, ImageKind::DeviceTree, &empty(), 0, ENTRY);
        assert!(matches!(result, Err(InvalidAddress { .. })));
    }

    #[test]
    fn contexts_reject_foreign_kinds() {
        for kind in ImageKind::iter() {
            for context in LoadContext::iter() {
                if context.accepts(kind) {
                    continue;
                }
                match resolve(context, kind, &empty(), BASE, ENTRY) {
                    Err(Error::UnknownFormat {
                        context: c,
                        kind: k,
                    }) => {
                        assert_eq!(c, context);
                        assert_eq!(k, kind);
                    }
                    other => panic!("{context} accepted {kind}: {other:?}"),
                }
            }
        }
    }

    #[test]
    fn kernel_rejects_modules() {
        assert!(
            resolve(LoadContext::Kernel, ImageKind::DeviceTree, &empty(), BASE, ENTRY).is_err()
        );
        assert!(resolve(LoadContext::Kernel, ImageKind::InitrdGz, &empty(), BASE, ENTRY).is_err());
    }

    #[test]
    fn module_rejects_kernels() {
        let header = ImageHeader::new(&zimage_header(0x4000_8000, 0));
        for kind in [
            ImageKind::Elf,
            ImageKind::ZImage,
            ImageKind::UImage,
            ImageKind::Binary,
        ] {
            assert!(resolve(LoadContext::Module, kind, &header, BASE, ENTRY).is_err());
        }
    }
}
