//! Streaming an image into guest physical memory.
//!
//! [`copy_image`] consumes an [`ImageFile`] and writes it to a guest physical destination:
//!
//! 1. Reject empty images before anything is reserved.
//! 2. Mark the page-rounded destination range allocated.
//! 3. Map the destination frames up front when the VM defers mapping.
//! 4. Touch the range; each frame-bounded chunk is filled from the image.
//! 5. Clean and invalidate each written frame when caches may be incoherent.
//!
//! The image is dropped when the copy returns, on every path.

use tracing::{debug, error, trace};

use crate::{
    file::ImageFile,
    loader::LoaderConfig,
    memory::{round_up, GuestMemory, TouchedFrame, Vspace, PAGE_SIZE_4K},
    Error::{CacheMaintenance, Empty, ShortTransfer},
    Result,
};

/// Copies `source` to guest physical `destination` and returns the number of bytes written.
///
/// # Errors
///
/// - [`crate::Error::InvalidConfig`] if `config` does not validate; nothing is touched
/// - [`crate::Error::Empty`] if the image has no bytes; no allocation is attempted
/// - [`crate::Error::Allocation`] if the memory subsystem cannot reserve, map or touch the range
/// - [`crate::Error::ShortTransfer`] if the image runs out before the range is filled
/// - [`crate::Error::CacheMaintenance`] if cleaning a written frame fails
pub fn copy_image(
    memory: &mut dyn GuestMemory,
    vspace: &dyn Vspace,
    config: &LoaderConfig,
    mut source: ImageFile,
    destination: u64,
) -> Result<usize> {
    config.validate()?;

    source.rewind();
    let len = source.len();
    if len == 0 {
        error!(destination = format_args!("0x{destination:x}"), "image has zero size");
        return Err(Empty);
    }

    let Some(reserved) = round_up(len, config.page_size) else {
        return Err(allocation_error!(
            "image of {} bytes cannot be rounded to 0x{:x} pages",
            len,
            config.page_size
        ));
    };
    memory.mark_allocated(destination, reserved)?;

    if config.defer_memory_map {
        if let Err(e) = memory.map_deferred(destination, len) {
            error!(
                destination = format_args!("0x{destination:x}"),
                len,
                error = %e,
                "failed to map deferred frames for image"
            );
            return Err(e);
        }
    }

    let mut chunks = 0_usize;
    memory.touch(destination, len, &mut |frame: TouchedFrame<'_>| {
        let vaddr = frame.vaddr();
        trace!(
            paddr = format_args!("0x{:x}", frame.paddr),
            offset = frame.offset,
            len = frame.data.len(),
            "writing image chunk"
        );

        if let Err(e) = source.read_exact_into(frame.data) {
            error!(
                paddr = format_args!("0x{:x}", frame.paddr),
                error = %e,
                "image bytes do not match expected length"
            );
            return Err(e);
        }

        if config.clean_cache {
            clean_frame(vspace, vaddr)?;
        }

        chunks += 1;
        Ok(())
    })?;

    // A memory subsystem that skipped part of the range must not produce a descriptor.
    if source.position() != len {
        return Err(ShortTransfer {
            expected: len,
            actual: source.position(),
        });
    }

    debug!(
        destination = format_args!("0x{destination:x}"),
        len,
        reserved,
        chunks,
        "image copied"
    );
    Ok(len)
}

/// Cleans and invalidates the whole 4 KiB frame backing VMM address `vaddr`.
///
/// Touched chunks never span frames, so the range is always the frame itself, independent of
/// the allocation granularity.
fn clean_frame(vspace: &dyn Vspace, vaddr: usize) -> Result<()> {
    let Some(cap) = vspace.frame_cap(vaddr) else {
        error!(vaddr = format_args!("0x{vaddr:x}"), "no frame capability for written chunk");
        return Err(CacheMaintenance {
            vaddr,
            message: "no frame capability".to_string(),
        });
    };

    vspace
        .clean_invalidate_data(cap, 0, PAGE_SIZE_4K)
        .map_err(|e| {
            error!(
                vaddr = format_args!("0x{vaddr:x}"),
                error = %e,
                "clean and invalidate failed"
            );
            CacheMaintenance {
                vaddr,
                message: e.to_string(),
            }
        })
}
