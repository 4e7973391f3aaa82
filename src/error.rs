use thiserror::Error;

use crate::image::{ImageKind, LoadContext};

macro_rules! allocation_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Allocation {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Allocation {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every failure is surfaced synchronously to the immediate caller. The loader never re-opens,
/// re-reads or re-maps after a failure, and any open image source has already been released by
/// the time one of these values is observed.
///
/// # Error Categories
///
/// ## Image Source Errors
/// - [`Error::FileError`] - The image could not be opened or read
/// - [`Error::ShortTransfer`] - The image yielded fewer bytes than a guest frame requested
/// - [`Error::Empty`] - The image has zero length
/// - [`Error::OutOfBounds`] - A header field lies beyond the bytes that were read
///
/// ## Placement Errors
/// - [`Error::UnknownFormat`] - The detected kind is not accepted where it was loaded
/// - [`Error::InvalidAddress`] - Resolution produced no usable guest physical address
/// - [`Error::InvalidConfig`] - The loader configuration is inconsistent
///
/// ## Guest Memory Errors
/// - [`Error::Allocation`] - The memory subsystem could not back the destination range
/// - [`Error::CacheMaintenance`] - Post-write cache maintenance failed (fatal, see
///   [`Error::is_fatal`])
///
/// # Examples
///
/// ```rust,no_run
/// use guestimage::{Error, GuestRam, HostVspace, ImageLoader, LoaderConfig};
///
/// let mut ram = GuestRam::new(0x4000_0000, 0x1000_0000);
/// let vspace = HostVspace::new();
/// let mut loader = ImageLoader::new(&mut ram, &vspace, LoaderConfig::default(), 0x4000_8000);
///
/// match loader.load_module("initrd.gz", 0x4400_0000) {
///     Ok(image) => println!("initrd at 0x{:x}", image.load_paddr),
///     Err(Error::UnknownFormat { context, kind }) => {
///         eprintln!("{} is not a valid {} image", kind, context);
///     }
///     Err(e) if e.is_fatal() => panic!("guest memory is no longer trustworthy: {e}"),
///     Err(e) => eprintln!("load failed: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// An out of bound access was attempted while reading header fields.
    ///
    /// Header fields are only read when the header holds enough valid bytes; this error is what
    /// the bounds-checked readers return instead of touching memory past the end.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The image source has zero length.
    ///
    /// Raised before any guest memory is reserved.
    #[error("Provided image was empty")]
    Empty,

    /// File I/O error.
    ///
    /// Wraps errors from opening, mapping or reading an image on disk.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// The image source produced fewer bytes than a guest frame write requested.
    #[error("Short read from image - expected {expected} bytes, got {actual}")]
    ShortTransfer {
        /// Number of bytes the frame required
        expected: usize,
        /// Number of bytes the source could provide
        actual: usize,
    },

    /// The detected image kind is not accepted by the requested load context.
    ///
    /// A device tree is never a valid kernel and a raw binary is never a module.
    #[error("Unknown {context} image format - {kind}")]
    UnknownFormat {
        /// Where the image was being loaded
        context: LoadContext,
        /// What the image was detected as
        kind: ImageKind,
    },

    /// Address resolution produced no usable guest physical address.
    ///
    /// Address `0` is the "no address" sentinel and is never copied to.
    #[error("No valid load address for {kind} image")]
    InvalidAddress {
        /// The kind that was being placed
        kind: ImageKind,
    },

    /// The loader configuration is inconsistent.
    #[error("Invalid loader configuration - {0}")]
    InvalidConfig(String),

    /// The guest memory subsystem could not reserve, map or touch the destination range.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the failed operation
    /// * `file` - Source file where the error was raised
    /// * `line` - Source line where the error was raised
    #[error("Allocation failed - {file}:{line}: {message}")]
    Allocation {
        /// The message to be printed for the Allocation error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Cleaning and invalidating a freshly written frame failed.
    ///
    /// Stale cache lines could hand the guest corrupt boot data, so this is fatal to the VM
    /// instance the image was being loaded into.
    #[error("Cache maintenance failed for vaddr 0x{vaddr:x} - {message}")]
    CacheMaintenance {
        /// VMM-side virtual address of the frame
        vaddr: usize,
        /// Description of the failure
        message: String,
    },
}

impl Error {
    /// Returns `true` if the error leaves the target VM in an untrustworthy state.
    ///
    /// Callers must tear down the VM instance instead of retrying or continuing construction.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::CacheMaintenance { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        let cache = Error::CacheMaintenance {
            vaddr: 0x1000,
            message: "no cap".to_string(),
        };
        assert!(cache.is_fatal());

        assert!(!Error::Empty.is_fatal());
        assert!(!allocation_error!("out of frames").is_fatal());
        assert!(!Error::UnknownFormat {
            context: LoadContext::Kernel,
            kind: ImageKind::DeviceTree,
        }
        .is_fatal());
    }

    #[test]
    fn messages() {
        let err = Error::UnknownFormat {
            context: LoadContext::Module,
            kind: ImageKind::Binary,
        };
        assert_eq!(err.to_string(), "Unknown module image format - binary");

        let err = allocation_error!("cannot back 0x{:x}", 0x4000_0000_u64);
        match err {
            Error::Allocation { message, file, .. } => {
                assert_eq!(message, "cannot back 0x40000000");
                assert!(file.ends_with("error.rs"));
            }
            _ => panic!("unexpected variant"),
        }
    }
}
