//! Attribute space management: insert, remove, resize.
//!
//! All three keep the attribute list byte-exact: everything from the
//! mutation point to `used` is shifted with an overlap-safe move, and
//! `used` always ends right after the END marker. None of them performs I/O;
//! they only edit the buffer and mark the record dirty.

use crate::enumerate::Step;
use crate::layout::{
    attr, quad_align, put_u16, put_u32, END_MARKER_SIZE, SIZEOF_NONRESIDENT,
    SIZEOF_NONRESIDENT_EX, SIZEOF_RESIDENT,
};
use crate::locate::compare_attr;
use crate::record::{Attr, AttrRef, Record};
use mftrec_core::{AttrType, UpcaseTable};
use std::cmp::Ordering;
use tracing::trace;

impl Record {
    /// Reserve a new attribute entry of `size` bytes named `name`.
    ///
    /// The entry is placed before the first attribute that orders after
    /// `(ty, name)`. An attribute with the same `(ty, name)` blocks the
    /// insert unless it is indexed. The header (type, size, name, id) is
    /// filled in; the payload is zeroed and left to the caller.
    ///
    /// Returns `None` when the record lacks room, the ordering forbids the
    /// entry, the geometry is inconsistent, or the record is corrupt.
    pub fn insert(
        &mut self,
        upcase: &UpcaseTable,
        ty: AttrType,
        name: &[u16],
        size: usize,
        name_offset: u16,
    ) -> Option<AttrRef> {
        let used = self.used() as usize;
        let capacity = (self.total() as usize).min(self.record_size());
        if used + size > capacity {
            trace!(record = %self.id(), used, size, capacity, "no room for attribute");
            return None;
        }
        if ty.is_end()
            || size % 8 != 0
            || size < SIZEOF_RESIDENT
            || name.len() > u8::MAX as usize
            || name_offset as usize + 2 * name.len() > size
        {
            return None;
        }

        let mut prev = None;
        let at = loop {
            match self.step(prev) {
                Step::Attr(r) => match compare_attr(&self.attr(r), ty, name, upcase) {
                    Ordering::Less => prev = Some(r),
                    Ordering::Greater => break r.offset(),
                    Ordering::Equal if self.attr(r).is_indexed() => break r.offset(),
                    Ordering::Equal => return None,
                },
                Step::End => break used - END_MARKER_SIZE,
                Step::Corrupt { .. } => return None,
            }
        };

        let id = self.allocate_id();

        self.shift(at, at + size, used - at);
        self.zero(at, size);

        let buf = self.buf_mut();
        put_u32(buf, at + attr::TYPE, ty.as_u32());
        put_u32(buf, at + attr::SIZE, size as u32);
        buf[at + attr::NAME_LEN] = name.len() as u8;
        put_u16(buf, at + attr::NAME_OFFSET, name_offset);
        put_u16(buf, at + attr::ID, id.as_u16());
        for (i, unit) in name.iter().enumerate() {
            put_u16(buf, at + name_offset as usize + 2 * i, *unit);
        }

        self.set_used(used + size);
        self.mark_dirty();
        Some(AttrRef(at))
    }

    /// Remove an attribute, closing the gap it leaves.
    ///
    /// `attr` and every reference after it are invalid afterwards. Returns
    /// `false` if the attribute does not lie within `used`.
    pub fn remove(&mut self, r: AttrRef) -> bool {
        let used = self.used() as usize;
        let off = r.offset();
        if used > self.record_size() || off + END_MARKER_SIZE > used {
            return false;
        }
        let size = self.attr(r).size() as usize;
        if size < SIZEOF_RESIDENT || off + size > used {
            return false;
        }

        let end = off + size;
        self.shift(end, off, used - end);
        self.zero(used - size, size);
        self.set_used(used - size);
        self.mark_dirty();
        true
    }

    /// Grow or shrink an attribute in place by `delta` bytes.
    ///
    /// The effective delta is rounded up to a multiple of 8 in magnitude.
    /// For resident attributes the payload size follows the same rounded
    /// delta. Fails without touching the record when growth does not fit,
    /// or when shrinking would take the entry below the minimum for its
    /// shape or cut into its name or run list.
    pub fn resize(&mut self, r: AttrRef, delta: isize) -> bool {
        let used = self.used() as usize;
        let off = r.offset();
        if used > self.record_size() || off + END_MARKER_SIZE > used {
            return false;
        }
        let view = self.attr(r);
        let size = view.size() as usize;
        let resident = view.is_resident();
        let min_size = min_entry_size(&view);
        if off + size > used {
            return false;
        }
        if delta == 0 {
            return true;
        }

        let next = off + size;
        let tail = used - next;
        let step = quad_align(delta.unsigned_abs());

        let (new_size, new_used) = if delta > 0 {
            let capacity = (self.total() as usize).min(self.record_size());
            if used + step > capacity {
                return false;
            }
            self.shift(next, next + step, tail);
            self.zero(next, step);
            (size + step, used + step)
        } else {
            if step > size || size - step < min_size {
                return false;
            }
            self.shift(next, next - step, tail);
            self.zero(used - step, step);
            (size - step, used - step)
        };

        self.set_used(new_used);
        let buf = self.buf_mut();
        put_u32(buf, off + attr::SIZE, new_size as u32);
        if resident {
            let data_size = crate::layout::get_u32(buf, off + attr::RES_DATA_SIZE) as usize;
            let data_size = if delta > 0 {
                data_size + step
            } else {
                data_size.saturating_sub(step)
            };
            put_u32(buf, off + attr::RES_DATA_SIZE, data_size as u32);
        }
        self.mark_dirty();
        true
    }
}

/// Smallest size the enumerator still accepts for this entry.
fn min_entry_size(view: &Attr<'_>) -> usize {
    let name_end = view.name_offset() as usize + 2 * view.name_len() as usize;
    if view.is_resident() {
        return SIZEOF_RESIDENT.max(name_end);
    }
    let shape = if view.svcn() == 0 && view.is_ext() {
        SIZEOF_NONRESIDENT_EX
    } else {
        SIZEOF_NONRESIDENT
    };
    (shape - END_MARKER_SIZE)
        .max(name_end)
        .max(view.run_offset() as usize)
}
