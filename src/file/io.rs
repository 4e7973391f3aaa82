//! Bounds-checked little-endian integer readers for image headers.
//!
//! Boot image headers are overlaid on raw bytes read from an untrusted file. Instead of casting
//! the byte buffer to a `#[repr(C)]` struct, every field is extracted through the functions in
//! this module, which verify that the requested bytes exist and never perform misaligned loads.
//!
//! # Key Components
//!
//! - [`crate::file::io::HeaderIO`] - Byte-array conversions for the integer widths used by headers
//! - [`crate::file::io::read_le_at`] - Little-endian reader with a cursor
//!
//! # Examples
//!
//! ```rust
//! use guestimage::file::io::read_le_at;
//!
//! // zImage magic lives in the tenth 32-bit word
//! let mut header = [0u8; 48];
//! header[36..40].copy_from_slice(&0x016F_2818_u32.to_le_bytes());
//!
//! let mut offset = 36;
//! let magic: u32 = read_le_at(&header, &mut offset)?;
//! assert_eq!(magic, 0x016F_2818);
//! assert_eq!(offset, 40);
//! # Ok::<(), guestimage::Error>(())
//! ```

use crate::{Error::OutOfBounds, Result};

/// Conversion between a fixed-width integer and its byte representation.
///
/// Implemented for the unsigned widths that appear in the recognised boot headers.
pub trait HeaderIO: Sized {
    /// Byte array holding one value of this type.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_header_io {
    ($($ty:ty),*) => {
        $(
            impl HeaderIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_header_io!(u16, u32);

/// Takes the bytes for one `T` starting at `offset`, advancing `offset` on success.
fn take<'a, T: HeaderIO>(data: &'a [u8], offset: &mut usize) -> Result<&'a [u8]> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };

    if end > data.len() {
        return Err(OutOfBounds);
    }

    let bytes = &data[*offset..end];
    *offset = end;
    Ok(bytes)
}

/// Reads a little-endian `T` at `offset` and advances `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if fewer than `size_of::<T>()` bytes remain at
/// `offset`. The offset is left untouched in that case.
pub fn read_le_at<T: HeaderIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let Ok(read) = take::<T>(data, offset)?.try_into() else {
        return Err(OutOfBounds);
    };

    Ok(T::from_le_bytes(read))
}
