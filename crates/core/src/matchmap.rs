//! The per-scan matchmap — accumulates, for each candidate file digest seen while
//! sweeping a target's fingerprints, a hit count and the line ranges matched (§3,
//! §4.3). Backed by an arena of entries plus a hash index for O(1) upserts, per the
//! §9 design note ("prefer an arena... addressed by index, with a small... hash
//! keyed by `file_md5`... avoids pointer graphs").

use crate::digest::Digest;
use std::collections::HashMap;

/// One contiguous run of fingerprint hits against the same candidate file.
///
/// `from_fp`/`to_fp` are indices into the scan's `HashTable` (not source line
/// numbers — those are looked up later via `lines[fp_index]` in [`compile_ranges`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRecord {
    pub from_fp: u16,
    pub to_fp: u16,
    /// OSS line number at `from_fp`; the OSS side of the run is assumed to advance
    /// in lockstep with the source side (`oss_line + (to_fp - from_fp)` at `to_fp`).
    pub oss_line: u16,
}

/// Accumulated hit data for one candidate file digest within a single scan (§3).
#[derive(Debug, Clone)]
pub struct MatchMapEntry {
    pub md5: Digest,
    pub hits: u16,
    pub last_line: u32,
    pub ranges: Vec<RangeRecord>,
}

/// Bounded, per-scan accumulator of [`MatchMapEntry`] values, capped at `max_files` (§3).
pub struct MatchMap {
    entries: Vec<MatchMapEntry>,
    index: HashMap<Digest, usize>,
    max_files: usize,
}

impl MatchMap {
    pub fn new(max_files: usize) -> Self {
        MatchMap { entries: Vec::new(), index: HashMap::new(), max_files }
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record one fingerprint hit against `file_md5` at fingerprint index `fp_index`
    /// (source line `source_line`), matched against OSS line `oss_line`.
    ///
    /// New candidate files beyond `max_files` are silently dropped — the bound is an
    /// implementation limit (§6), not an error.
    pub fn record_hit(&mut self, file_md5: Digest, fp_index: u16, source_line: u32, oss_line: u16) {
        let idx = match self.index.get(&file_md5) {
            Some(&i) => i,
            None => {
                if self.entries.len() >= self.max_files {
                    return;
                }
                let i = self.entries.len();
                self.entries.push(MatchMapEntry { md5: file_md5, hits: 0, last_line: 0, ranges: Vec::new() });
                self.index.insert(file_md5, i);
                i
            }
        };

        let entry = &mut self.entries[idx];
        entry.hits = entry.hits.saturating_add(1);
        entry.last_line = source_line;

        // Widen to u32 before adding: a long run against a high OSS base line
        // (e.g. oss_line = 65000 over a 600-fingerprint run) would otherwise
        // overflow these u16 fields.
        let extends_run = entry.ranges.last().is_some_and(|r| {
            fp_index as u32 == r.to_fp as u32 + 1
                && oss_line as u32 == r.oss_line as u32 + (r.to_fp - r.from_fp) as u32 + 1
        });

        if extends_run {
            entry.ranges.last_mut().unwrap().to_fp = fp_index;
        } else {
            entry.ranges.push(RangeRecord { from_fp: fp_index, to_fp: fp_index, oss_line });
        }
    }

    /// Select the "biggest snippet": highest `hits`, tie-broken by lowest `md5`
    /// (lexicographic), then by earliest `last_line` (§4.3).
    pub fn biggest_snippet(&self) -> Option<&MatchMapEntry> {
        self.entries.iter().min_by(|a, b| {
            b.hits
                .cmp(&a.hits)
                .then_with(|| a.md5.cmp(&b.md5))
                .then_with(|| a.last_line.cmp(&b.last_line))
        })
    }
}

/// Merge a winning entry's [`RangeRecord`]s into comma-separated source/OSS line
/// range strings, translating fingerprint indices back to source line numbers via
/// `lines` (the scan's `HashTable.lines`). Returns `(source_ranges, oss_ranges, hits)`.
///
/// Deterministic and idempotent (§8 property 4): the same sorted range stream
/// always compiles to the same two strings and the same hit count.
pub fn compile_ranges(ranges: &[RangeRecord], lines: &[u32]) -> (String, String, usize) {
    let mut sorted: Vec<&RangeRecord> = ranges.iter().collect();
    sorted.sort_by_key(|r| r.from_fp);

    let mut source_parts = Vec::with_capacity(sorted.len());
    let mut oss_parts = Vec::with_capacity(sorted.len());
    let mut hits = 0usize;

    for r in &sorted {
        let from_line = lines.get(r.from_fp as usize).copied().unwrap_or(0);
        let to_line = lines.get(r.to_fp as usize).copied().unwrap_or(from_line);
        source_parts.push(format!("{from_line}-{to_line}"));

        let oss_from = r.oss_line as u32;
        let oss_to = oss_from + (r.to_fp - r.from_fp) as u32;
        oss_parts.push(format!("{oss_from}-{oss_to}"));

        hits += (r.to_fp - r.from_fp) as usize + 1;
    }

    (source_parts.join(","), oss_parts.join(","), hits)
}
