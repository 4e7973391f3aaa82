//! In-process guest RAM.
//!
//! [`GuestRam`] backs a contiguous guest physical RAM region with host heap pages. Frames are
//! created lazily the first time they are mapped or touched, which mirrors a deferred mapping
//! policy; [`GuestMemory::map_deferred`] forces them in up front. The allocation map is kept per
//! frame so callers can check what the loader reserved.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::atomic::{AtomicUsize, Ordering},
};

use super::{FrameCap, GuestMemory, TouchedFrame, Vspace, PAGE_SIZE_4K};
use crate::Result;

const PAGE: u64 = PAGE_SIZE_4K as u64;

/// Guest RAM backed by host pages.
#[derive(Debug)]
pub struct GuestRam {
    base: u64,
    size: u64,
    /// Backing pages keyed by guest frame number
    frames: BTreeMap<u64, Box<[u8]>>,
    /// Guest frame numbers marked allocated
    allocated: BTreeSet<u64>,
}

impl GuestRam {
    /// A RAM region of `size` bytes starting at guest physical `base`.
    #[must_use]
    pub fn new(base: u64, size: u64) -> GuestRam {
        GuestRam {
            base,
            size,
            frames: BTreeMap::new(),
            allocated: BTreeSet::new(),
        }
    }

    /// First guest physical address of the region.
    #[must_use]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Size of the region in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of frames that currently have backing pages.
    #[must_use]
    pub fn mapped_frames(&self) -> usize {
        self.frames.len()
    }

    /// Number of frames marked allocated.
    #[must_use]
    pub fn allocated_frames(&self) -> usize {
        self.allocated.len()
    }

    /// Returns `true` if every frame overlapping `[paddr, paddr + len)` is marked allocated.
    #[must_use]
    pub fn is_allocated(&self, paddr: u64, len: usize) -> bool {
        match self.frame_span(paddr, len) {
            Ok((first, last)) => (first..=last).all(|gfn| self.allocated.contains(&gfn)),
            Err(_) => false,
        }
    }

    /// Copies guest memory at `paddr` into `buf`. Frames never written read as zero.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Allocation`] if the range lies outside the region.
    pub fn read(&self, paddr: u64, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        self.check_range(paddr, buf.len())?;

        let mut done = 0;
        while done < buf.len() {
            let addr = paddr + done as u64;
            let in_page = (addr % PAGE) as usize;
            let chunk = (PAGE_SIZE_4K - in_page).min(buf.len() - done);

            match self.frames.get(&(addr / PAGE)) {
                Some(frame) => {
                    buf[done..done + chunk].copy_from_slice(&frame[in_page..in_page + chunk]);
                }
                None => buf[done..done + chunk].fill(0),
            }
            done += chunk;
        }
        Ok(())
    }

    fn check_range(&self, paddr: u64, len: usize) -> Result<()> {
        let end = paddr.checked_add(len as u64);
        let region_end = self.base.saturating_add(self.size);

        match end {
            Some(end) if paddr >= self.base && end <= region_end => Ok(()),
            _ => Err(allocation_error!(
                "range 0x{:x}+0x{:x} outside guest RAM 0x{:x}-0x{:x}",
                paddr,
                len,
                self.base,
                region_end
            )),
        }
    }

    /// First and last guest frame numbers overlapping a non-empty range.
    fn frame_span(&self, paddr: u64, len: usize) -> Result<(u64, u64)> {
        if len == 0 {
            return Err(allocation_error!("empty range at 0x{:x}", paddr));
        }
        self.check_range(paddr, len)?;

        Ok((paddr / PAGE, (paddr + len as u64 - 1) / PAGE))
    }
}

impl GuestMemory for GuestRam {
    fn mark_allocated(&mut self, paddr: u64, len: usize) -> Result<()> {
        let (first, last) = self.frame_span(paddr, len)?;
        self.allocated.extend(first..=last);
        Ok(())
    }

    fn map_deferred(&mut self, paddr: u64, len: usize) -> Result<()> {
        let (first, last) = self.frame_span(paddr, len)?;
        for gfn in first..=last {
            self.frames
                .entry(gfn)
                .or_insert_with(|| vec![0u8; PAGE_SIZE_4K].into_boxed_slice());
        }
        Ok(())
    }

    fn touch(
        &mut self,
        paddr: u64,
        len: usize,
        writer: &mut dyn FnMut(TouchedFrame<'_>) -> Result<()>,
    ) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        self.check_range(paddr, len)?;

        let mut offset = 0;
        while offset < len {
            let addr = paddr + offset as u64;
            let in_page = (addr % PAGE) as usize;
            let chunk = (PAGE_SIZE_4K - in_page).min(len - offset);

            let frame = self
                .frames
                .entry(addr / PAGE)
                .or_insert_with(|| vec![0u8; PAGE_SIZE_4K].into_boxed_slice());

            writer(TouchedFrame {
                paddr: addr,
                offset,
                data: &mut frame[in_page..in_page + chunk],
            })?;
            offset += chunk;
        }
        Ok(())
    }
}

/// VMM address space of a hosted monitor with coherent caches.
///
/// Every address has a frame capability and cache maintenance succeeds without doing
/// anything; the number of operations issued is counted.
#[derive(Debug, Default)]
pub struct HostVspace {
    cleaned: AtomicUsize,
}

impl HostVspace {
    /// A fresh vspace with no maintenance recorded.
    #[must_use]
    pub fn new() -> HostVspace {
        HostVspace::default()
    }

    /// Number of clean-and-invalidate operations issued so far.
    #[must_use]
    pub fn cleaned(&self) -> usize {
        self.cleaned.load(Ordering::Relaxed)
    }
}

impl Vspace for HostVspace {
    fn frame_cap(&self, vaddr: usize) -> Option<FrameCap> {
        Some(FrameCap(vaddr & !(PAGE_SIZE_4K - 1)))
    }

    fn clean_invalidate_data(&self, _cap: FrameCap, _start: usize, _end: usize) -> Result<()> {
        self.cleaned.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    const BASE: u64 = 0x4000_0000;

    #[test]
    fn touch_splits_on_frames() {
        let mut ram = GuestRam::new(BASE, 0x10_0000);
        let mut seen = Vec::new();

        ram.touch(BASE + 0x800, 0x2000, &mut |frame: TouchedFrame<'_>| {
            seen.push((frame.paddr, frame.offset, frame.data.len()));
            frame.data.fill(0xAA);
            Ok(())
        })
        .unwrap();

        assert_eq!(
            seen,
            [
                (BASE + 0x800, 0, 0x800),
                (BASE + 0x1000, 0x800, 0x1000),
                (BASE + 0x2000, 0x1800, 0x800),
            ]
        );
        assert_eq!(ram.mapped_frames(), 3);

        let mut buf = [0u8; 0x2002];
        ram.read(BASE + 0x7FF, &mut buf).unwrap();
        assert_eq!(buf[0], 0);
        assert!(buf[1..0x2001].iter().all(|b| *b == 0xAA));
        assert_eq!(buf[0x2001], 0);
    }

    #[test]
    fn touch_stops_on_writer_error() {
        let mut ram = GuestRam::new(BASE, 0x10_0000);
        let mut calls = 0;

        let result = ram.touch(BASE, 0x3000, &mut |_frame: TouchedFrame<'_>| {
            calls += 1;
            if calls == 2 {
                return Err(Error::ShortTransfer {
                    expected: 0x1000,
                    actual: 0,
                });
            }
            Ok(())
        });

        assert!(matches!(result, Err(Error::ShortTransfer { .. })));
        assert_eq!(calls, 2);
    }

    #[test]
    fn touch_outside_region() {
        let mut ram = GuestRam::new(BASE, 0x1000);
        let result = ram.touch(BASE + 0x800, 0x1000, &mut |_frame: TouchedFrame<'_>| Ok(()));
        assert!(matches!(result, Err(Error::Allocation { .. })));
        assert_eq!(ram.mapped_frames(), 0);
    }

    #[test]
    fn allocation_map() {
        let mut ram = GuestRam::new(BASE, 0x10_0000);

        ram.mark_allocated(BASE + 0x1000, 0x2000).unwrap();
        assert_eq!(ram.allocated_frames(), 2);
        assert!(ram.is_allocated(BASE + 0x1000, 0x2000));
        assert!(!ram.is_allocated(BASE, 0x2000));
        assert_eq!(ram.mapped_frames(), 0);

        assert!(ram.mark_allocated(BASE + 0x10_0000, 0x1000).is_err());
        assert!(ram.mark_allocated(BASE - 0x1000, 0x1000).is_err());
        assert!(ram.mark_allocated(u64::MAX - 0x10, 0x1000).is_err());
    }

    #[test]
    fn map_deferred_creates_frames() {
        let mut ram = GuestRam::new(BASE, 0x10_0000);
        ram.map_deferred(BASE + 0x10, 0x1000).unwrap();
        assert_eq!(ram.mapped_frames(), 2);
    }

    #[test]
    fn host_vspace_counts() {
        let vspace = HostVspace::new();
        let cap = vspace.frame_cap(0x7000_1234).unwrap();
        assert_eq!(cap, FrameCap(0x7000_1000));

        vspace.clean_invalidate_data(cap, 0, PAGE_SIZE_4K).unwrap();
        vspace.clean_invalidate_data(cap, 0, PAGE_SIZE_4K).unwrap();
        assert_eq!(vspace.cleaned(), 2);
    }
}
