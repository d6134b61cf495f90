//! The match engine — runs the three-tier lookup (component, then whole file,
//! then snippet) against a single target's bytes.
//!
//! Each tier is checked in order and the first one that fires wins; a component
//! hit never falls through to a file or snippet check, and a file hit never
//! falls through to snippet winnowing. This mirrors the original scanner's early
//! returns rather than computing every tier and picking the best after the fact.

use crate::config::ScanConfig;
use crate::digest::Digest;
use crate::gateway::{self, IndexGateway, IterControl, Table};
use crate::matchmap::MatchMap;
use crate::wire::MatchType;
use crate::winnow;

/// Parallel fingerprint/line arrays produced by winnowing a target.
///
/// Kept as two `Vec`s rather than a `Vec` of pairs so [`MatchEngine::scan`] can hand
/// `lines` straight to [`crate::matchmap::compile_ranges`] without re-zipping.
#[derive(Debug, Clone, Default)]
pub struct HashTable {
    pub fps: Vec<u32>,
    pub lines: Vec<u32>,
}

impl HashTable {
    pub fn hash_count(&self) -> usize {
        self.fps.len()
    }

    pub fn clear(&mut self) {
        self.fps.clear();
        self.lines.clear();
    }
}

/// Per-target scratch state, reused across targets in a run so the matchmap's
/// arena and the hash table's vectors don't reallocate on every scan.
pub struct ScanContext {
    pub file_path: String,
    pub file_size: u64,
    pub source_digest: Digest,
    pub hash_table: HashTable,
    pub matchmap: MatchMap,
    pub match_type: MatchType,
}

impl ScanContext {
    pub fn new(max_files: usize) -> Self {
        ScanContext {
            file_path: String::new(),
            file_size: 0,
            source_digest: Digest::from_bytes([0u8; 16]),
            hash_table: HashTable::default(),
            matchmap: MatchMap::new(max_files),
            match_type: MatchType::None,
        }
    }

    /// Clear per-target state while keeping the matchmap's arena allocated.
    pub fn reset_for(&mut self, file_path: String, file_size: u64, source_digest: Digest) {
        self.file_path = file_path;
        self.file_size = file_size;
        self.source_digest = source_digest;
        self.hash_table.clear();
        self.matchmap.reset();
        self.match_type = MatchType::None;
    }
}

/// Runs the three-tier lookup over a gateway, borrowing config for its limits.
pub struct MatchEngine<'a> {
    gateway: &'a dyn IndexGateway,
    config: &'a ScanConfig,
}

impl<'a> MatchEngine<'a> {
    pub fn new(gateway: &'a dyn IndexGateway, config: &'a ScanConfig) -> Self {
        MatchEngine { gateway, config }
    }

    /// Run the lookup for `ctx`'s target against `content` (the target's full bytes).
    ///
    /// `ctx.match_type` is left at `None` if nothing fired. Zero- and one-byte
    /// files never reach the component/file tiers: there's nothing meaningful to
    /// digest-match, so they fall straight through to (and are then filtered out
    /// by) snippet winnowing's own minimum-length check.
    pub fn scan(&self, ctx: &mut ScanContext, content: &[u8]) {
        let whole_file_eligible = ctx.file_size > 1 && !ctx.source_digest.is_empty_file();

        if whole_file_eligible {
            if self.gateway.exists(Table::Components, ctx.source_digest.as_bytes()) {
                ctx.match_type = MatchType::Component;
                return;
            }
            if self.gateway.exists(Table::Files, ctx.source_digest.as_bytes()) {
                ctx.match_type = MatchType::File;
                return;
            }
        }

        self.scan_snippets(ctx, content);
    }

    fn scan_snippets(&self, ctx: &mut ScanContext, content: &[u8]) {
        if winnow::skip_snippets(content) {
            return;
        }

        let hashes = winnow::winnow(content, self.config.max_hashes_read);
        ctx.hash_table.fps = hashes.iter().map(|&(h, _)| h).collect();
        ctx.hash_table.lines = hashes.iter().map(|&(_, l)| l).collect();
        self.sweep(ctx);
    }

    /// Run the component/file tiers then, if neither fires, sweep `ctx.hash_table`
    /// against `SNIPPETS`. Used both by [`Self::scan`] (which builds the hash
    /// table from raw bytes) and by a driver replaying a manifest's precomputed
    /// fingerprints, which skips winnowing entirely.
    pub fn scan_precomputed(&self, ctx: &mut ScanContext) {
        let whole_file_eligible = ctx.file_size > 1 && !ctx.source_digest.is_empty_file();

        if whole_file_eligible {
            if self.gateway.exists(Table::Components, ctx.source_digest.as_bytes()) {
                ctx.match_type = MatchType::Component;
                return;
            }
            if self.gateway.exists(Table::Files, ctx.source_digest.as_bytes()) {
                ctx.match_type = MatchType::File;
                return;
            }
        }

        self.sweep(ctx);
    }

    /// For each fingerprint already staged in `ctx.hash_table`, look it up in
    /// `SNIPPETS` and accumulate hits into the matchmap.
    fn sweep(&self, ctx: &mut ScanContext) {
        for i in 0..ctx.hash_table.hash_count() {
            if i > u16::MAX as usize {
                break;
            }
            let fp_index = i as u16;
            let fp = ctx.hash_table.fps[i];
            let line = ctx.hash_table.lines[i];
            let fp_key = fp.to_be_bytes();

            self.gateway.fetch(Table::Snippets, &fp_key, &mut |rec| {
                if let Some((file_md5, _oss_fp_index, oss_line)) = gateway::decode_snippet_row(rec.raw) {
                    ctx.matchmap.record_hit(file_md5, fp_index, line, oss_line);
                }
                IterControl::Continue
            });
        }

        if !ctx.matchmap.is_empty() {
            ctx.match_type = MatchType::Snippet;
        }
    }
}
