//! Loading boot images into a guest.
//!
//! [`ImageLoader`] is the entry point used during VM construction. Each load runs the same
//! sequence: open the image, read its header, [`detect`] its kind, [`resolve`] a load address
//! for the calling context, and [`copy_image`] it into guest memory. The result is a
//! descriptor of where the image landed and how large it is, produced only when every step
//! succeeded.
//!
//! # Key Components
//!
//! - [`crate::loader::ImageLoader`] - Kernel and module entry points for one VM
//! - [`crate::loader::LoaderConfig`] - Deferred-mapping and cache policies
//! - [`crate::loader::GuestImage`] / [`crate::loader::GuestKernelImage`] - Load descriptors
//! - [`crate::loader::identify_image`] - Classification without loading
//!
//! # Ordering
//!
//! Loads are synchronous. The loader holds the VM's guest memory mutably for its whole
//! lifetime, so the kernel, device tree and initrd of one VM are necessarily loaded one after
//! the other.
//!
//! # Examples
//!
//! ```rust,no_run
//! use guestimage::{GuestRam, HostVspace, ImageLoader, LoaderConfig};
//!
//! let mut ram = GuestRam::new(0x4000_0000, 0x2000_0000);
//! let vspace = HostVspace::new();
//! let config = LoaderConfig::noncoherent();
//! let mut loader = ImageLoader::new(&mut ram, &vspace, config, 0x4000_8000);
//!
//! let kernel = loader.load_kernel("images/zImage", 0x4000_0000)?;
//! let dtb = loader.load_module("images/linux.dtb", 0x4f00_0000)?;
//! let initrd = loader.load_module("images/rootfs.cpio.gz", 0x4d70_0000)?;
//!
//! println!(
//!     "kernel 0x{:x}+{} dtb 0x{:x} initrd 0x{:x}",
//!     kernel.kernel_image.load_paddr,
//!     kernel.kernel_image.size,
//!     dtb.load_paddr,
//!     initrd.load_paddr
//! );
//! # Ok::<(), guestimage::Error>(())
//! ```

mod config;
mod copier;

pub use config::LoaderConfig;
pub use copier::copy_image;

use std::path::Path;

use tracing::{debug, error};

use crate::{
    file::ImageFile,
    image::{detect, resolve, ImageKind, LoadContext},
    memory::{GuestMemory, Vspace},
    Result,
};

/// Where an image was placed in guest physical memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuestImage {
    /// Guest physical address of the first byte
    pub load_paddr: u64,
    /// Exact length of the image in bytes
    pub size: usize,
}

/// Where the guest kernel was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuestKernelImage {
    /// The kernel image itself
    pub kernel_image: GuestImage,
}

/// Loads boot images into the memory of one VM.
pub struct ImageLoader<'a> {
    memory: &'a mut dyn GuestMemory,
    vspace: &'a dyn Vspace,
    config: LoaderConfig,
    vm_entry: u64,
}

impl<'a> ImageLoader<'a> {
    /// Creates a loader for a VM.
    ///
    /// `vspace` is the VMM's own address space (used for cache maintenance) and `vm_entry` the
    /// VM's configured entry address, where raw binary kernels are placed.
    pub fn new(
        memory: &'a mut dyn GuestMemory,
        vspace: &'a dyn Vspace,
        config: LoaderConfig,
        vm_entry: u64,
    ) -> ImageLoader<'a> {
        ImageLoader {
            memory,
            vspace,
            config,
            vm_entry,
        }
    }

    /// The configuration applied to every load.
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// The VM entry address raw binary kernels are loaded at.
    #[must_use]
    pub fn vm_entry(&self) -> u64 {
        self.vm_entry
    }

    /// Loads the guest kernel at `path`.
    ///
    /// Raw binaries go to the VM entry address; zImages go to their embedded start address or
    /// `base + 0x8000`.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::FileError`] if the image cannot be opened
    /// - [`crate::Error::UnknownFormat`] if the image is not a raw binary or zImage
    /// - any error from [`resolve`] or [`copy_image`]
    pub fn load_kernel(&mut self, path: impl AsRef<Path>, base: u64) -> Result<GuestKernelImage> {
        let path = path.as_ref();
        let image = open(path)?;

        self.load_kernel_from(image, base).inspect_err(|e| {
            error!(image = %path.display(), error = %e, "failed to load kernel image");
        })
    }

    /// Loads an already opened guest kernel. See [`ImageLoader::load_kernel`].
    ///
    /// # Errors
    ///
    /// As [`ImageLoader::load_kernel`], except for opening.
    pub fn load_kernel_from(&mut self, image: ImageFile, base: u64) -> Result<GuestKernelImage> {
        let kernel_image = self.load(LoadContext::Kernel, image, base)?;
        Ok(GuestKernelImage { kernel_image })
    }

    /// Loads a device tree or gzip initrd at `path` to `base`.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::FileError`] if the image cannot be opened
    /// - [`crate::Error::UnknownFormat`] if the image is not a device tree or gzip initrd
    /// - any error from [`resolve`] or [`copy_image`]
    pub fn load_module(&mut self, path: impl AsRef<Path>, base: u64) -> Result<GuestImage> {
        let path = path.as_ref();
        let image = open(path)?;

        self.load_module_from(image, base).inspect_err(|e| {
            error!(image = %path.display(), error = %e, "failed to load module image");
        })
    }

    /// Loads an already opened module. See [`ImageLoader::load_module`].
    ///
    /// # Errors
    ///
    /// As [`ImageLoader::load_module`], except for opening.
    pub fn load_module_from(&mut self, image: ImageFile, base: u64) -> Result<GuestImage> {
        self.load(LoadContext::Module, image, base)
    }

    fn load(&mut self, context: LoadContext, image: ImageFile, base: u64) -> Result<GuestImage> {
        self.config.validate()?;

        let header = image.header();
        let kind = detect(&header);
        let load_paddr = resolve(context, kind, &header, base, self.vm_entry)?;
        debug!(
            %context,
            %kind,
            base = format_args!("0x{base:x}"),
            load_paddr = format_args!("0x{load_paddr:x}"),
            "resolved load address"
        );

        let size = copy_image(
            &mut *self.memory,
            self.vspace,
            &self.config,
            image,
            load_paddr,
        )?;

        Ok(GuestImage { load_paddr, size })
    }
}

/// Classifies the image at `path` without loading it.
///
/// # Errors
///
/// Returns [`crate::Error::FileError`] if the image cannot be opened.
///
/// # Examples
///
/// ```rust,no_run
/// use guestimage::{identify_image, ImageKind};
///
/// if identify_image("images/zImage")? != ImageKind::ZImage {
///     eprintln!("not a zImage");
/// }
/// # Ok::<(), guestimage::Error>(())
/// ```
pub fn identify_image(path: impl AsRef<Path>) -> Result<ImageKind> {
    let image = open(path.as_ref())?;
    Ok(detect(&image.header()))
}

fn open(path: &Path) -> Result<ImageFile> {
    ImageFile::from_file(path).inspect_err(|e| {
        error!(image = %path.display(), error = %e, "unable to open image");
    })
}
