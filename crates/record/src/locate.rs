//! Attribute lookup by (type, name, id).

use crate::record::{Attr, AttrRef, Record};
use mftrec_core::{AttrId, AttrType, UpcaseTable};
use std::cmp::Ordering;

/// Ordering of an existing attribute relative to `(ty, name)`.
///
/// Type code first, then the name collated case-insensitively and finally
/// case-sensitively. This is the order attributes are kept in.
pub fn compare_attr(attr: &Attr<'_>, ty: AttrType, name: &[u16], upcase: &UpcaseTable) -> Ordering {
    attr.attr_type()
        .cmp(&ty)
        .then_with(|| upcase.collate(&attr.name(), name))
}

impl Record {
    /// Find the first attribute after `start` with type `ty`, exactly
    /// `name`, and `id` if given.
    ///
    /// Stops as soon as the walk passes `ty`. Names are compared unit by
    /// unit; no case folding happens here.
    pub fn find(
        &self,
        start: Option<AttrRef>,
        ty: AttrType,
        name: &[u16],
        id: Option<AttrId>,
    ) -> Option<AttrRef> {
        let mut cur = start;
        while let Some(r) = self.enumerate(cur) {
            cur = Some(r);
            let attr = self.attr(r);
            match attr.attr_type().cmp(&ty) {
                Ordering::Greater => return None,
                Ordering::Less => continue,
                Ordering::Equal => {}
            }
            if !attr.name_eq(name) {
                continue;
            }
            if id.is_some_and(|id| id != attr.id()) {
                continue;
            }
            return Some(r);
        }
        None
    }
}
