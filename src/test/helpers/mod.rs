//! Guest memory and vspace doubles.

use std::cell::{Cell, RefCell};

use crate::{
    memory::{FrameCap, GuestMemory, GuestRam, TouchedFrame, Vspace},
    Error, Result,
};

/// Ordered record of the calls a [`RecordingMemory`] received.
#[derive(Debug, Default)]
pub struct CallLog {
    calls: RefCell<Vec<String>>,
}

impl CallLog {
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn push(&self, name: &str, paddr: u64, len: usize) {
        self.calls
            .borrow_mut()
            .push(format!("{name} 0x{paddr:x} 0x{len:x}"));
    }
}

/// Guest memory covering the whole address space that logs every call.
pub struct RecordingMemory<'a> {
    log: &'a CallLog,
    ram: GuestRam,
    fail_map_deferred: bool,
    skip_touch: bool,
}

impl<'a> RecordingMemory<'a> {
    pub fn new(log: &'a CallLog) -> Self {
        RecordingMemory {
            log,
            ram: GuestRam::new(0, u64::MAX),
            fail_map_deferred: false,
            skip_touch: false,
        }
    }

    /// `map_deferred` fails as if the frame allocator were exhausted.
    pub fn failing_map_deferred(mut self) -> Self {
        self.fail_map_deferred = true;
        self
    }

    /// `touch` returns success without calling the writer.
    pub fn skipping_touch(mut self) -> Self {
        self.skip_touch = true;
        self
    }
}

impl GuestMemory for RecordingMemory<'_> {
    fn mark_allocated(&mut self, paddr: u64, len: usize) -> Result<()> {
        self.log.push("mark_allocated", paddr, len);
        self.ram.mark_allocated(paddr, len)
    }

    fn map_deferred(&mut self, paddr: u64, len: usize) -> Result<()> {
        self.log.push("map_deferred", paddr, len);
        if self.fail_map_deferred {
            return Err(allocation_error!("no free frames"));
        }
        self.ram.map_deferred(paddr, len)
    }

    fn touch(
        &mut self,
        paddr: u64,
        len: usize,
        writer: &mut dyn FnMut(TouchedFrame<'_>) -> Result<()>,
    ) -> Result<()> {
        self.log.push("touch", paddr, len);
        if self.skip_touch {
            return Ok(());
        }
        self.ram.touch(paddr, len, writer)
    }
}

/// A vspace that succeeds and records every clean-and-invalidate range.
#[derive(Debug, Default)]
pub struct RecordingVspace {
    ranges: RefCell<Vec<(usize, usize)>>,
}

impl RecordingVspace {
    pub fn ranges(&self) -> Vec<(usize, usize)> {
        self.ranges.borrow().clone()
    }
}

impl Vspace for RecordingVspace {
    fn frame_cap(&self, vaddr: usize) -> Option<FrameCap> {
        Some(FrameCap(vaddr))
    }

    fn clean_invalidate_data(&self, _cap: FrameCap, start: usize, end: usize) -> Result<()> {
        self.ranges.borrow_mut().push((start, end));
        Ok(())
    }
}

/// A vspace whose cache maintenance path fails.
pub struct FailingVspace {
    has_caps: bool,
    attempts: Cell<usize>,
}

impl FailingVspace {
    /// Capability lookup fails for every address.
    pub fn without_caps() -> Self {
        FailingVspace {
            has_caps: false,
            attempts: Cell::new(0),
        }
    }

    /// Lookup succeeds but every clean-and-invalidate is rejected.
    pub fn failing_clean() -> Self {
        FailingVspace {
            has_caps: true,
            attempts: Cell::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.get()
    }
}

impl Vspace for FailingVspace {
    fn frame_cap(&self, vaddr: usize) -> Option<FrameCap> {
        self.has_caps.then_some(FrameCap(vaddr))
    }

    fn clean_invalidate_data(&self, cap: FrameCap, _start: usize, _end: usize) -> Result<()> {
        self.attempts.set(self.attempts.get() + 1);
        Err(Error::CacheMaintenance {
            vaddr: cap.0,
            message: "kernel rejected the operation".to_string(),
        })
    }
}
