//! Cluster run lists and their packed mapping-pairs form.
//!
//! # Mapping pairs
//!
//! ```text
//! ┌──────────────┬──────────────────────┬──────────────────────────┐
//! │ header (1)   │ length (h & 0xF)     │ lcn delta (h >> 4)       │
//! └──────────────┴──────────────────────┴──────────────────────────┘
//!   ... repeated ..., terminated by a 0x00 header
//! ```
//!
//! Length and delta are little-endian two's complement, each stored in the
//! fewest bytes that preserve the sign. A sparse run has no delta bytes.
//! The delta is relative to the LCN of the previous non-sparse run.

use mftrec_core::{RecordError, Result};

/// One contiguous range of clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    /// First logical (virtual) cluster
    pub vcn: u64,
    /// First physical cluster; `None` for a sparse run
    pub lcn: Option<u64>,
    /// Number of clusters
    pub len: u64,
}

/// Ordered run list with contiguous VCNs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunList {
    runs: Vec<Run>,
}

impl RunList {
    /// Create an empty run list
    pub fn new() -> Self {
        Self { runs: Vec::new() }
    }

    /// Build from runs, checking they are non-empty and contiguous.
    pub fn from_runs(runs: Vec<Run>) -> Result<Self> {
        for pair in runs.windows(2) {
            if pair[0].vcn + pair[0].len != pair[1].vcn {
                return Err(RecordError::InvalidRunList(format!(
                    "gap between vcn {} and {}",
                    pair[0].vcn + pair[0].len,
                    pair[1].vcn
                )));
            }
        }
        if let Some(empty) = runs.iter().find(|r| r.len == 0) {
            return Err(RecordError::InvalidRunList(format!(
                "empty run at vcn {}",
                empty.vcn
            )));
        }
        Ok(Self { runs })
    }

    /// Append a run starting where the list currently ends.
    pub fn push(&mut self, lcn: Option<u64>, len: u64) {
        if len == 0 {
            return;
        }
        let vcn = self.next_vcn();
        self.runs.push(Run { vcn, lcn, len });
    }

    /// Runs in VCN order
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Number of runs
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether no clusters are mapped
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// VCN just past the last run
    pub fn next_vcn(&self) -> u64 {
        self.runs.last().map_or(0, |r| r.vcn + r.len)
    }

    /// Index of the run containing `vcn`
    pub fn lookup(&self, vcn: u64) -> Option<usize> {
        let idx = self.runs.partition_point(|r| r.vcn + r.len <= vcn);
        self.runs
            .get(idx)
            .filter(|r| r.vcn <= vcn)
            .map(|_| idx)
    }

    /// Physical cluster backing `vcn`; `Some(None)` for a sparse cluster
    pub fn lcn_of(&self, vcn: u64) -> Option<Option<u64>> {
        self.lookup(vcn).map(|i| {
            let run = &self.runs[i];
            run.lcn.map(|lcn| lcn + (vcn - run.vcn))
        })
    }
}

/// Outcome of packing a run list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packed {
    /// Bytes written, including the terminator
    pub bytes: usize,
    /// Clusters covered, starting at the requested VCN
    pub clusters: u64,
}

/// Serializer for run lists.
///
/// Encodes as many clusters of `runs` starting at `svcn` (up to `len`) as
/// fit in `dst`. Encoding fewer clusters than requested is not an error.
pub trait RunEncoder {
    /// Pack into `dst`, returning bytes used and clusters covered.
    fn encode(&self, runs: &RunList, svcn: u64, len: u64, dst: &mut [u8]) -> Result<Packed>;
}

/// Bytes needed to store `v` as sign-preserving little-endian.
fn packed_size(v: i64) -> usize {
    (1..8)
        .find(|&n| {
            let bits = 8 * n as u32 - 1;
            let (min, max) = (-(1i64 << bits), (1i64 << bits) - 1);
            (min..=max).contains(&v)
        })
        .unwrap_or(8)
}

fn write_le(dst: &mut [u8], v: i64) {
    let bytes = v.to_le_bytes();
    dst.copy_from_slice(&bytes[..dst.len()]);
}

fn read_le_signed(src: &[u8]) -> i64 {
    let mut bytes = if src.last().is_some_and(|b| b & 0x80 != 0) {
        [0xFF; 8]
    } else {
        [0; 8]
    };
    bytes[..src.len()].copy_from_slice(src);
    i64::from_le_bytes(bytes)
}

/// NTFS mapping-pairs encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct MappingPairs;

impl RunEncoder for MappingPairs {
    fn encode(&self, runs: &RunList, svcn: u64, len: u64, dst: &mut [u8]) -> Result<Packed> {
        if dst.is_empty() {
            return Err(RecordError::CapacityExceeded {
                needed: 1,
                available: 0,
            });
        }
        if len == 0 {
            dst[0] = 0;
            return Ok(Packed {
                bytes: 1,
                clusters: 0,
            });
        }

        // requests past the last run stop where the list ends
        let end = svcn.saturating_add(len).min(runs.next_vcn());
        let mut idx = runs
            .lookup(svcn)
            .ok_or_else(|| RecordError::InvalidRunList(format!("vcn {} is not mapped", svcn)))?;
        let mut vcn = svcn;
        let mut prev_lcn = 0i64;
        let mut pos = 0;

        loop {
            let run = runs.runs[idx];
            let chunk = (run.vcn + run.len).min(end) - vcn;
            let lcn = run.lcn.map(|l| (l + (vcn - run.vcn)) as i64);

            let len_bytes = packed_size(chunk as i64);
            let (off_bytes, delta) = match lcn {
                Some(l) => (packed_size(l - prev_lcn), l - prev_lcn),
                None => (0, 0),
            };

            // header + fields + trailing terminator
            if pos + 1 + len_bytes + off_bytes + 1 > dst.len() {
                break;
            }
            dst[pos] = len_bytes as u8 | (off_bytes as u8) << 4;
            write_le(&mut dst[pos + 1..pos + 1 + len_bytes], chunk as i64);
            write_le(
                &mut dst[pos + 1 + len_bytes..pos + 1 + len_bytes + off_bytes],
                delta,
            );
            pos += 1 + len_bytes + off_bytes;
            vcn += chunk;
            if let Some(l) = lcn {
                prev_lcn = l;
            }

            if vcn >= end {
                break;
            }
            idx += 1;
            match runs.runs.get(idx) {
                Some(next) if next.vcn == vcn => {}
                Some(next) => {
                    return Err(RecordError::InvalidRunList(format!(
                        "run at vcn {} does not follow vcn {}",
                        next.vcn, vcn
                    )))
                }
                None => {
                    return Err(RecordError::InvalidRunList(format!(
                        "run list ends at vcn {}, requested up to {}",
                        vcn, end
                    )))
                }
            }
        }

        dst[pos] = 0;
        Ok(Packed {
            bytes: pos + 1,
            clusters: vcn - svcn,
        })
    }
}

impl MappingPairs {
    /// Unpack mapping pairs whose first run starts at `svcn`.
    ///
    /// Stops at the terminator. Returns an error for malformed headers,
    /// non-positive lengths, negative LCNs, or a missing terminator.
    pub fn decode(src: &[u8], svcn: u64) -> Result<RunList> {
        let mut runs = Vec::new();
        let mut vcn = svcn;
        let mut lcn = 0i64;
        let mut pos = 0;

        loop {
            let Some(&header) = src.get(pos) else {
                return Err(RecordError::InvalidRunList(
                    "mapping pairs not terminated".to_string(),
                ));
            };
            if header == 0 {
                break;
            }
            let len_bytes = (header & 0x0F) as usize;
            let off_bytes = (header >> 4) as usize;
            if len_bytes == 0 || len_bytes > 8 || off_bytes > 8 {
                return Err(RecordError::InvalidRunList(format!(
                    "bad mapping pair header {:#04x} at {}",
                    header, pos
                )));
            }
            let fields_end = pos + 1 + len_bytes + off_bytes;
            if fields_end > src.len() {
                return Err(RecordError::InvalidRunList(format!(
                    "mapping pair at {} truncated",
                    pos
                )));
            }

            let len = read_le_signed(&src[pos + 1..pos + 1 + len_bytes]);
            if len <= 0 {
                return Err(RecordError::InvalidRunList(format!(
                    "non-positive run length {} at {}",
                    len, pos
                )));
            }
            let run_lcn = if off_bytes == 0 {
                None
            } else {
                lcn += read_le_signed(&src[pos + 1 + len_bytes..fields_end]);
                if lcn < 0 {
                    return Err(RecordError::InvalidRunList(format!(
                        "negative lcn at {}",
                        pos
                    )));
                }
                Some(lcn as u64)
            };

            runs.push(Run {
                vcn,
                lcn: run_lcn,
                len: len as u64,
            });
            vcn += len as u64;
            pos = fields_end;
        }

        Ok(RunList { runs })
    }
}
