// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # guestimage
//!
//! Boot image loading for a virtual machine monitor running as a user-level task on a
//! capability microkernel. Given a path to a guest kernel, device tree or compressed initial
//! ramdisk, `guestimage` identifies the format from its leading bytes, decides where in guest
//! physical memory it belongs, and copies it there through the VMM's memory subsystem.
//!
//! ## Features
//!
//! - **🔍 Format detection** - ELF, ARM zImage, U-Boot uImage, flattened device tree and gzip
//!   initrd signatures, with raw binary as the fallback
//! - **📍 Address resolution** - Per-context placement rules, including the zImage embedded start
//!   address and the conventional `base + 0x8000` text offset
//! - **📦 Frame-by-frame copy** - Streams a memory-mapped image into guest frames without
//!   buffering it whole
//! - **🧹 Cache maintenance** - Optional clean and invalidate of every written frame for guests
//!   that boot with caches disabled
//! - **🛡️ No partial descriptors** - A load either reports where the whole image landed or
//!   fails
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use guestimage::prelude::*;
//!
//! let mut ram = GuestRam::new(0x4000_0000, 0x2000_0000);
//! let vspace = HostVspace::new();
//! let mut loader = ImageLoader::new(&mut ram, &vspace, LoaderConfig::default(), 0x4800_0000);
//!
//! let kernel = loader.load_kernel("images/Image", 0x4000_0000)?;
//! let dtb = loader.load_module("images/linux.dtb", 0x4f00_0000)?;
//!
//! println!("kernel at 0x{:x}", kernel.kernel_image.load_paddr);
//! println!("dtb at 0x{:x} ({} bytes)", dtb.load_paddr, dtb.size);
//! # Ok::<(), guestimage::Error>(())
//! ```
//!
//! ## Load contexts
//!
//! | Detected kind | Kernel | Module |
//! |---|---|---|
//! | raw binary | VM entry address | rejected |
//! | zImage | embedded start, else `base + 0x8000` | rejected |
//! | device tree | rejected | `base` |
//! | gzip initrd | rejected | `base` |
//! | ELF, uImage | rejected | rejected |
//!
//! ## Logging
//!
//! The loader reports through [`tracing`]: failures at `error`, resolved addresses and completed
//! copies at `debug`, individual frame writes at `trace`. Install any subscriber to see them.
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`], with [`Error`] describing what went wrong. Only
//! [`Error::CacheMaintenance`] leaves guest memory in a state the caller cannot trust; see
//! [`Error::is_fatal`].

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use guestimage::prelude::*;
///
/// let kind = identify_image("images/zImage")?;
/// println!("{kind}");
/// # Ok::<(), guestimage::Error>(())
/// ```
pub mod prelude;

/// Boot image sources: memory-mapped files and in-memory buffers with a read cursor.
pub mod file;

/// Header parsing, format detection and load address resolution.
///
/// # Key Types
///
/// - [`image::ImageKind`] - Detected image format
/// - [`image::LoadContext`] - Whether an image is being loaded as a kernel or a module
/// - [`image::ImageHeader`] - Leading bytes of an image
///
/// # Main Functions
///
/// - [`image::detect`] - Classify a header
/// - [`image::resolve`] - Choose a guest physical load address
pub mod image;

/// Guest memory and VMM address space interfaces, plus in-process implementations.
pub mod memory;

/// The load pipeline: configuration, copying and the [`ImageLoader`] entry points.
pub mod loader;

/// `guestimage` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust,no_run
/// use guestimage::{ImageKind, Result};
///
/// fn kernel_kind(path: &str) -> Result<ImageKind> {
///     guestimage::identify_image(path)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `guestimage` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

/// Main entry points for loading images into a guest.
///
/// See [`loader::ImageLoader`].
pub use loader::{identify_image, GuestImage, GuestKernelImage, ImageLoader, LoaderConfig};

/// Image classification and placement.
///
/// # Example
///
/// ```rust
/// use guestimage::{detect, ImageHeader, ImageKind};
///
/// let header = ImageHeader::new(&[0xD0, 0x0D, 0xFE, 0xED, 0x00, 0x00, 0x10, 0x00]);
/// assert_eq!(detect(&header), ImageKind::DeviceTree);
/// ```
pub use image::{detect, resolve, ImageHeader, ImageKind, LoadContext};

/// Image sources.
pub use file::ImageFile;

/// Guest memory interfaces and the in-process RAM implementation.
pub use memory::{FrameCap, GuestMemory, GuestRam, HostVspace, TouchedFrame, Vspace};
