//! Attribute enumeration.
//!
//! Every step re-validates the entry it lands on against `used`/`total`.
//! A violation ends the walk: callers see "no more attributes" rather than
//! an error. [`Record::validate`] walks the same path and reports the first
//! violation for callers that must tell corruption from a clean end.

use crate::layout::{
    attr, get_u16, get_u32, get_u64, ATTR_FLAG_COMPRESSED, ATTR_FLAG_SPARSE, END_MARKER_SIZE,
    MIN_ATTR_OFFSET, SIZEOF_NONRESIDENT, SIZEOF_NONRESIDENT_EX, SIZEOF_RESIDENT,
};
use crate::record::{AttrRef, Record};
use mftrec_core::{AttrType, RecordError, Result};
use tracing::trace;

/// Outcome of one enumeration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// A structurally sound attribute
    Attr(AttrRef),
    /// The END marker, correctly placed at `used - 8`
    End,
    /// A layout violation at `offset`
    Corrupt {
        offset: usize,
        reason: &'static str,
    },
}

impl Record {
    pub(crate) fn step(&self, prev: Option<AttrRef>) -> Step {
        let buf = self.as_bytes();
        let used = self.used() as usize;
        let corrupt = |offset, reason| Step::Corrupt { offset, reason };

        if used > self.total() as usize || used > buf.len() {
            return corrupt(0, "used exceeds total");
        }

        let off = match prev {
            None => {
                let off = self.attr_offset() as usize;
                if off >= used || off < MIN_ATTR_OFFSET || off % 8 != 0 {
                    return corrupt(off, "bad first attribute offset");
                }
                if !self.is_in_use() {
                    return corrupt(0, "record not in use");
                }
                off
            }
            Some(prev) => {
                let off = prev.offset();
                if off + END_MARKER_SIZE > used {
                    return corrupt(off, "previous attribute beyond used");
                }
                let size = get_u32(buf, off + attr::SIZE) as usize;
                if size < SIZEOF_RESIDENT {
                    return corrupt(off, "previous attribute too small");
                }
                off + size
            }
        };

        if off + END_MARKER_SIZE > used {
            return corrupt(off, "type field beyond used");
        }

        let ty = AttrType::new(get_u32(buf, off + attr::TYPE));
        if ty.is_end() {
            if used != off + END_MARKER_SIZE {
                return corrupt(off, "END marker does not close the record");
            }
            return Step::End;
        }

        if !ty.is_valid(self.max_attr_type) {
            return corrupt(off, "unsupported attribute type");
        }

        let size = get_u32(buf, off + attr::SIZE) as usize;
        if size < SIZEOF_RESIDENT {
            return corrupt(off, "attribute too small");
        }
        if size % 8 != 0 {
            return corrupt(off, "attribute size not quad-aligned");
        }
        if off + size > used {
            return corrupt(off, "attribute extends beyond used");
        }

        let name_end = get_u16(buf, off + attr::NAME_OFFSET) as usize
            + 2 * buf[off + attr::NAME_LEN] as usize;

        if buf[off + attr::NON_RESIDENT] == 0 {
            if name_end > size {
                return corrupt(off, "name extends beyond attribute");
            }
            let data_off = get_u16(buf, off + attr::RES_DATA_OFFSET) as usize;
            if data_off > size {
                return corrupt(off, "resident data offset beyond attribute");
            }
            let data_size = get_u32(buf, off + attr::RES_DATA_SIZE) as usize;
            if data_off + data_size > size {
                return corrupt(off, "resident data extends beyond attribute");
            }
            return Step::Attr(AttrRef(off));
        }

        // header fields up to the compression unit must lie inside the entry
        if size + 8 < SIZEOF_NONRESIDENT {
            return corrupt(off, "non-resident attribute too small");
        }
        let run_off = get_u16(buf, off + attr::NR_RUN_OFFSET) as usize;
        if buf[off + attr::NAME_LEN] != 0 && name_end > run_off {
            return corrupt(off, "name overlaps run list");
        }
        if run_off > size {
            return corrupt(off, "run list offset beyond attribute");
        }

        let ext =
            get_u16(buf, off + attr::FLAGS) & (ATTR_FLAG_COMPRESSED | ATTR_FLAG_SPARSE) != 0;
        if get_u64(buf, off + attr::NR_SVCN) != 0 || !ext {
            if get_u16(buf, off + attr::NR_C_UNIT) != 0 {
                return corrupt(off, "unexpected compression unit");
            }
        } else if size + 8 < SIZEOF_NONRESIDENT_EX {
            return corrupt(off, "extended non-resident attribute too small");
        }

        Step::Attr(AttrRef(off))
    }

    /// Next attribute after `prev`, or the first one when `prev` is `None`.
    ///
    /// Returns `None` at the END marker and on any structural violation.
    pub fn enumerate(&self, prev: Option<AttrRef>) -> Option<AttrRef> {
        match self.step(prev) {
            Step::Attr(r) => Some(r),
            Step::End => None,
            Step::Corrupt { offset, reason } => {
                trace!(record = %self.id(), offset, reason, "attribute walk stopped");
                None
            }
        }
    }

    /// Iterator over the attributes, in record order.
    pub fn attrs(&self) -> Attrs<'_> {
        Attrs {
            record: self,
            prev: None,
            done: false,
        }
    }

    /// Check the header and walk every attribute up to a correct END marker.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Corruption` naming the first violation.
    pub fn validate(&self) -> Result<()> {
        if !self.has_signature() {
            return Err(RecordError::corruption(format!(
                "record {} has no FILE signature",
                self.id()
            )));
        }
        if self.total() as usize != self.record_size() {
            return Err(RecordError::corruption(format!(
                "record {} declares total {} for a {}-byte record",
                self.id(),
                self.total(),
                self.record_size()
            )));
        }
        let mut prev = None;
        loop {
            match self.step(prev) {
                Step::Attr(r) => prev = Some(r),
                Step::End => return Ok(()),
                Step::Corrupt { offset, reason } => {
                    return Err(RecordError::corruption(format!(
                        "record {} at offset {:#x}: {}",
                        self.id(),
                        offset,
                        reason
                    )))
                }
            }
        }
    }
}

/// Iterator returned by [`Record::attrs`].
pub struct Attrs<'a> {
    record: &'a Record,
    prev: Option<AttrRef>,
    done: bool,
}

impl Iterator for Attrs<'_> {
    type Item = AttrRef;

    fn next(&mut self) -> Option<AttrRef> {
        if self.done {
            return None;
        }
        let next = self.record.enumerate(self.prev);
        self.done = next.is_none();
        self.prev = next;
        next
    }
}
