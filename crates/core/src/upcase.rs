//! Volume-wide upcase table
//!
//! Attribute names are UTF-16 code units. Ordering inside a record compares
//! names case-insensitively through this table first and falls back to a
//! case-sensitive comparison to break ties. The table is loaded once per
//! mount and shared read-only.

use crate::error::{RecordError, Result};
use std::cmp::Ordering;

/// Number of entries in an upcase table (one per UTF-16 code unit).
pub const UPCASE_ENTRIES: usize = 0x1_0000;

/// Maps every UTF-16 code unit to its uppercase form.
#[derive(Clone)]
pub struct UpcaseTable {
    table: Box<[u16]>,
}

impl UpcaseTable {
    /// Build a table from Unicode simple uppercase mappings.
    ///
    /// Code units whose uppercase form is not a single BMP character map to
    /// themselves.
    pub fn generated() -> Self {
        let table = (0..UPCASE_ENTRIES)
            .map(|unit| {
                let unit = unit as u16;
                let Some(c) = char::from_u32(unit as u32) else {
                    return unit;
                };
                let mut upper = c.to_uppercase();
                match (upper.next(), upper.next()) {
                    (Some(u), None) if (u as u32) <= 0xFFFF => u as u16,
                    _ => unit,
                }
            })
            .collect();
        Self { table }
    }

    /// Parse a raw on-disk table: 65536 little-endian u16 entries.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Corruption` if the image has the wrong length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != UPCASE_ENTRIES * 2 {
            return Err(RecordError::corruption(format!(
                "upcase table is {} bytes, expected {}",
                bytes.len(),
                UPCASE_ENTRIES * 2
            )));
        }
        let table = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Self { table })
    }

    /// Uppercase form of a code unit
    #[inline]
    pub fn upcase(&self, unit: u16) -> u16 {
        self.table[unit as usize]
    }

    /// Case-insensitive comparison; shorter name wins on a common prefix.
    pub fn cmp_ignore_case(&self, left: &[u16], right: &[u16]) -> Ordering {
        left.iter()
            .zip(right)
            .map(|(l, r)| self.upcase(*l).cmp(&self.upcase(*r)))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| left.len().cmp(&right.len()))
    }

    /// Full collation: case-insensitive first, then exact code units.
    pub fn collate(&self, left: &[u16], right: &[u16]) -> Ordering {
        self.cmp_ignore_case(left, right)
            .then_with(|| left.cmp(right))
    }
}

impl Default for UpcaseTable {
    fn default() -> Self {
        Self::generated()
    }
}

impl std::fmt::Debug for UpcaseTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpcaseTable")
            .field("entries", &self.table.len())
            .finish()
    }
}
