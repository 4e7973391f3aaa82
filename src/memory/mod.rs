//! Guest memory interfaces consumed by the loader.
//!
//! The loader does not own guest RAM. It reserves, maps and writes it through [`GuestMemory`],
//! and keeps the VMM's cacheable view of freshly written frames consistent through [`Vspace`].
//! Both traits are implemented by the VMM's memory subsystem; [`GuestRam`] and [`HostVspace`]
//! are in-process implementations for hosted monitors whose caches are coherent.
//!
//! # Touching guest memory
//!
//! [`GuestMemory::touch`] walks a guest physical range frame by frame and hands each chunk to a
//! writer closure as a [`TouchedFrame`]. A chunk never crosses a frame boundary, so the first and
//! last chunks may be shorter than a page when the range is unaligned.
//!
//! ```rust
//! use guestimage::{GuestMemory, GuestRam, TouchedFrame};
//!
//! let mut ram = GuestRam::new(0x4000_0000, 0x10_0000);
//! let mut chunks = Vec::new();
//! ram.touch(0x4000_0f00, 0x200, &mut |frame: TouchedFrame<'_>| {
//!     chunks.push((frame.paddr, frame.offset, frame.data.len()));
//!     Ok(())
//! })?;
//!
//! assert_eq!(chunks, [(0x4000_0f00, 0, 0x100), (0x4000_1000, 0x100, 0x100)]);
//! # Ok::<(), guestimage::Error>(())
//! ```

mod ram;

pub use ram::{GuestRam, HostVspace};

use crate::Result;

/// Size of a small page frame.
pub const PAGE_SIZE_4K: usize = 4096;

/// Rounds `value` up to the next multiple of `align`, which must be a power of two.
///
/// Returns `None` if the result does not fit in a `usize`.
///
/// ```rust
/// use guestimage::memory::round_up;
///
/// assert_eq!(round_up(1, 4096), Some(4096));
/// assert_eq!(round_up(4096, 4096), Some(4096));
/// assert_eq!(round_up(usize::MAX, 4096), None);
/// ```
#[must_use]
pub fn round_up(value: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    value.checked_add(align - 1).map(|v| v & !(align - 1))
}

/// One frame-bounded chunk of a guest range being touched.
#[derive(Debug)]
pub struct TouchedFrame<'a> {
    /// Guest physical address of the first byte of `data`
    pub paddr: u64,
    /// Offset of `data` from the start of the touched range
    pub offset: usize,
    /// The VMM's writable view of the chunk
    pub data: &'a mut [u8],
}

impl TouchedFrame<'_> {
    /// VMM-side virtual address of the chunk, used to look up the backing frame capability.
    #[must_use]
    pub fn vaddr(&self) -> usize {
        self.data.as_ptr() as usize
    }
}

/// The guest physical memory of one VM, as seen by the loader.
///
/// Implementations are not expected to lock: the loader holds the only mutable borrow for the
/// duration of a load.
pub trait GuestMemory {
    /// Marks `[paddr, paddr + len)` as allocated in the guest's physical memory map.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Allocation`] if the range cannot be backed.
    fn mark_allocated(&mut self, paddr: u64, len: usize) -> Result<()>;

    /// Maps backing frames for `[paddr, paddr + len)` now instead of on first access.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Allocation`] if frames cannot be mapped.
    fn map_deferred(&mut self, paddr: u64, len: usize) -> Result<()>;

    /// Calls `writer` once per frame-bounded chunk of `[paddr, paddr + len)`, in address order.
    ///
    /// An error from `writer` stops the walk and is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Allocation`] if part of the range has no backing frame, or
    /// whatever `writer` returned.
    fn touch(
        &mut self,
        paddr: u64,
        len: usize,
        writer: &mut dyn FnMut(TouchedFrame<'_>) -> Result<()>,
    ) -> Result<()>;
}

/// Capability to a frame mapped into the VMM's address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameCap(pub usize);

/// The VMM's own address space: frame capability lookup and cache maintenance.
pub trait Vspace {
    /// Capability of the frame backing VMM virtual address `vaddr`, if any.
    fn frame_cap(&self, vaddr: usize) -> Option<FrameCap>;

    /// Cleans and invalidates the data cache for bytes `[start, end)` of the frame behind `cap`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the operation.
    fn clean_invalidate_data(&self, cap: FrameCap, start: usize, end: usize) -> Result<()>;
}
