//! Boot image identification and placement.
//!
//! This module answers the first two questions of every load: *what kind of image is this* and
//! *where in guest physical memory does it go*. Both are pure functions over the image's leading
//! header bytes; nothing here touches guest memory or the image source.
//!
//! # Key Components
//!
//! - [`crate::image::ImageHeader`] - The first bytes of an image, read once per load
//! - [`crate::image::ImageKind`] - The closed set of recognised formats
//! - [`crate::image::detect()`] - Ordered signature matching, total over all inputs
//! - [`crate::image::resolve()`] - Per-context load address rules
//!
//! # Examples
//!
//! ```rust
//! use guestimage::{detect, resolve, ImageHeader, ImageKind, LoadContext};
//!
//! let mut bytes = [0u8; 64];
//! bytes[36..40].copy_from_slice(&0x016F_2818_u32.to_le_bytes()); // zImage magic
//! bytes[40..44].copy_from_slice(&0x4000_8000_u32.to_le_bytes()); // start
//!
//! let header = ImageHeader::new(&bytes);
//! let kind = detect(&header);
//! assert_eq!(kind, ImageKind::ZImage);
//!
//! let addr = resolve(LoadContext::Kernel, kind, &header, 0x4000_0000, 0x8000_0000)?;
//! assert_eq!(addr, 0x4000_8000);
//! # Ok::<(), guestimage::Error>(())
//! ```

mod detect;
mod header;
mod kind;
mod resolve;

pub use detect::{detect, DTB_MAGIC, INITRD_GZ_MAGIC, UIMAGE_MAGIC};
pub use header::{ImageHeader, ZImageHeader, HEADER_SIZE, ZIMAGE_MAGIC, ZIMAGE_MAGIC_OFFSET};
pub use kind::{ImageKind, LoadContext};
pub use resolve::{resolve, zimage_load_address, ZIMAGE_TEXT_OFFSET};
