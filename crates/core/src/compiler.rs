//! The match compiler — turns a finished scan's raw tier result into a bounded,
//! deduplicated, policy-filtered [`MatchSet`].
//!
//! Everything here reads through an [`IndexGateway`]; nothing here decides
//! *which* tier fired (that's [`crate::engine::MatchEngine`]'s job) — only what
//! to do once a matching digest is known.

use crate::config::ScanConfig;
use crate::digest::Digest;
use crate::engine::ScanContext;
use crate::gateway::{self, IndexGateway, IterControl, Table};
use crate::matchmap::compile_ranges;
use crate::wire::{MatchRecord, MatchSet, MatchType};

pub struct MatchCompiler<'a> {
    gateway: &'a dyn IndexGateway,
    config: &'a ScanConfig,
}

impl<'a> MatchCompiler<'a> {
    pub fn new(gateway: &'a dyn IndexGateway, config: &'a ScanConfig) -> Self {
        MatchCompiler { gateway, config }
    }

    /// Compile `ctx`'s finished scan into a [`MatchSet`] and the (possibly
    /// downgraded) [`MatchType`] that goes with it.
    pub fn compile(&self, ctx: &ScanContext) -> (MatchSet, MatchType) {
        if ctx.match_type == MatchType::None {
            return (MatchSet::new(), MatchType::None);
        }

        let Some(matching_digest) = self.matching_digest(ctx) else {
            return (MatchSet::new(), MatchType::None);
        };

        let (lines, oss_lines, matched_percent) = self.compile_coordinates(ctx);
        let source_ext = extension_of(&ctx.file_path);

        let mut records: Vec<MatchRecord> = Vec::new();
        let component_hits = self.fetch_components(matching_digest);
        if !component_hits.is_empty() {
            for (vendor, component, version, url) in component_hits {
                self.add_hydrated(
                    &mut records, vendor, component, version, url, "all".to_string(),
                    matching_digest, matching_digest, &lines, &oss_lines, matched_percent, ctx.match_type,
                );
            }
        } else {
            self.fetch_files_and_hydrate(matching_digest, source_ext, &lines, &oss_lines, matched_percent, ctx.match_type, &mut records);
        }

        if records.is_empty() {
            return (MatchSet::new(), MatchType::None);
        }

        if records.iter().any(|r| self.config.is_in_sbom(&r.component)) {
            return (MatchSet::new(), MatchType::None);
        }

        (MatchSet { records }, ctx.match_type)
    }

    /// The digest driving metadata lookup: the target's own digest for a
    /// component/file hit, or the winning matchmap entry's digest for a snippet hit.
    fn matching_digest(&self, ctx: &ScanContext) -> Option<Digest> {
        match ctx.match_type {
            MatchType::Component | MatchType::File => Some(ctx.source_digest),
            MatchType::Snippet => ctx.matchmap.biggest_snippet().map(|e| e.md5),
            MatchType::None => None,
        }
    }

    /// `(lines, oss_lines, matched_percent)` for the current match type.
    fn compile_coordinates(&self, ctx: &ScanContext) -> (String, String, u8) {
        match ctx.match_type {
            MatchType::Component | MatchType::File => ("all".to_string(), "all".to_string(), 100),
            MatchType::Snippet => {
                let Some(entry) = ctx.matchmap.biggest_snippet() else {
                    return (String::new(), String::new(), 0);
                };
                let (lines, oss_lines, hits) = compile_ranges(&entry.ranges, &ctx.hash_table.lines);
                let total_lines = ctx.hash_table.lines.last().copied().unwrap_or(0);
                let percent = if total_lines == 0 {
                    0
                } else {
                    ((hits as u64 * 100) / total_lines as u64).min(100) as u8
                };
                (lines, oss_lines, percent)
            }
            MatchType::None => (String::new(), String::new(), 0),
        }
    }

    fn fetch_components(&self, digest: Digest) -> Vec<(String, String, String, String)> {
        let mut out = Vec::new();
        self.gateway.fetch(Table::Components, digest.as_bytes(), &mut |rec| {
            if gateway::is_oversized(rec.raw) {
                tracing::warn!(
                    error = %crate::error::ScanError::RecordOversize { table: Table::Components, key: digest.key() },
                    "skipping oversized components record"
                );
                return IterControl::Continue;
            }
            if let Some(fields) = gateway::decode_components_record(rec.raw) {
                out.push(fields);
            }
            IterControl::Continue
        });
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn fetch_files_and_hydrate(
        &self,
        digest: Digest,
        source_ext: Option<&str>,
        lines: &str,
        oss_lines: &str,
        matched_percent: u8,
        match_type: MatchType,
        records: &mut Vec<MatchRecord>,
    ) {
        let mut file_rows: Vec<(Digest, String)> = Vec::new();
        self.gateway.fetch(Table::Files, digest.as_bytes(), &mut |rec| {
            if gateway::is_oversized(rec.raw) {
                tracing::warn!(
                    error = %crate::error::ScanError::RecordOversize { table: Table::Files, key: digest.key() },
                    "skipping oversized files record"
                );
                return IterControl::Continue;
            }
            if let Some(row) = gateway::decode_files_record(rec.raw) {
                file_rows.push(row);
            }
            IterControl::Continue
        });

        for (component_digest, path) in file_rows {
            if self.skip_files_record(&path, source_ext) {
                continue;
            }
            let component_hits = self.fetch_components(component_digest);
            let Some((vendor, component, version, url)) = component_hits.into_iter().next() else {
                continue;
            };
            self.add_hydrated(
                records, vendor, component, version, url, path,
                component_digest, digest, lines, oss_lines, matched_percent, match_type,
            );
        }
    }

    /// The FILES-only skip policy: blacklisted path, blacklisted extension, or
    /// (when extension-matching is on) an extension mismatch against the target.
    fn skip_files_record(&self, path: &str, source_ext: Option<&str>) -> bool {
        if self.config.is_blacklisted_path(path) {
            return true;
        }
        let ext = extension_of(path);
        if let Some(e) = ext {
            if self.config.is_blacklisted_extension(e) {
                return true;
            }
        }
        if self.config.match_extensions_only && ext != source_ext {
            return true;
        }
        false
    }

    #[allow(clippy::too_many_arguments)]
    fn add_hydrated(
        &self,
        records: &mut Vec<MatchRecord>,
        vendor: String,
        component: String,
        version: String,
        url: String,
        file_path: String,
        component_md5: Digest,
        file_md5: Digest,
        lines: &str,
        oss_lines: &str,
        matched_percent: u8,
        match_type: MatchType,
    ) {
        if self.config.is_blacklisted_component(&component) {
            return;
        }

        let path_len = file_path.len().min(u16::MAX as usize) as u16;
        let candidate = MatchRecord {
            vendor,
            component,
            version: version.clone(),
            latest_version: version,
            url,
            file_path,
            component_md5,
            file_md5,
            lines: lines.to_string(),
            oss_lines: oss_lines.to_string(),
            matched_percent,
            path_len,
            match_type,
            selected: true,
        };

        // §3: a record with any required field empty is invalid.
        if !candidate.is_valid() {
            return;
        }

        self.add_match(records, candidate);
    }

    /// Dedup on `(vendor, component)` with byte-lexicographic version widening;
    /// otherwise insert ahead of the first existing record with a longer path, or
    /// append if there's room. A full set drops any candidate whose path isn't
    /// shorter than something already kept.
    fn add_match(&self, records: &mut Vec<MatchRecord>, candidate: MatchRecord) {
        if let Some(existing) = records
            .iter_mut()
            .find(|r| r.vendor == candidate.vendor && r.component == candidate.component)
        {
            if candidate.version < existing.version {
                existing.version = candidate.version.clone();
            }
            if candidate.latest_version > existing.latest_version {
                existing.latest_version = candidate.latest_version.clone();
            }
            return;
        }

        match records.iter().position(|r| r.path_len > candidate.path_len) {
            Some(idx) => {
                records.insert(idx, candidate);
                if records.len() > self.config.scan_limit {
                    records.pop();
                }
            }
            None => {
                if records.len() < self.config.scan_limit {
                    records.push(candidate);
                }
            }
        }
    }
}

fn extension_of(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::buffer_digest;
    use crate::engine::MatchEngine;
    use crate::gateway::{encode_components_record, encode_files_record};
    use crate::memory_gateway::MemoryGateway;

    fn scan(gw: &MemoryGateway, cfg: &ScanConfig, path: &str, content: &[u8]) -> ScanContext {
        let digest = buffer_digest(content);
        let mut ctx = ScanContext::new(cfg.max_files);
        ctx.reset_for(path.to_string(), content.len() as u64, digest);
        MatchEngine::new(gw, cfg).scan(&mut ctx, content);
        ctx
    }

    #[test]
    fn zero_byte_file_produces_no_matches() {
        let cfg = ScanConfig::default();
        let gw = MemoryGateway::new();
        let ctx = scan(&gw, &cfg, "empty.bin", b"");
        let (set, ty) = MatchCompiler::new(&gw, &cfg).compile(&ctx);
        assert_eq!(ty, MatchType::None);
        assert!(set.is_empty());
    }

    #[test]
    fn component_hit_hydrates_a_single_record() {
        let cfg = ScanConfig::default();
        let mut gw = MemoryGateway::new();
        let content = b"int add(int a, int b) { return a + b; }\n".repeat(4);
        let digest = buffer_digest(&content);
        gw.insert_component(digest, encode_components_record("acme/foo", "libfoo", "1.2.3", "https://x"));

        let ctx = scan(&gw, &cfg, "x.c", &content);
        let (set, ty) = MatchCompiler::new(&gw, &cfg).compile(&ctx);
        assert_eq!(ty, MatchType::Component);
        assert_eq!(set.records.len(), 1);
        let r = &set.records[0];
        assert_eq!(r.vendor, "acme/foo");
        assert_eq!(r.component, "libfoo");
        assert_eq!(r.version, "1.2.3");
        assert_eq!(r.latest_version, "1.2.3");
        assert_eq!(r.url, "https://x");
        assert_eq!(r.file_path, "all");
        assert_eq!(r.lines, "all");
        assert_eq!(r.matched_percent, 100);
        assert_eq!(r.component_md5, digest);
        assert_eq!(r.file_md5, digest);
    }

    #[test]
    fn two_file_paths_same_component_keep_the_shorter_path() {
        let cfg = ScanConfig::default();
        let mut gw = MemoryGateway::new();
        let content = b"int sub(int a, int b) { return a - b; }\n".repeat(4);
        let file_digest = buffer_digest(&content);
        let comp_digest = buffer_digest(b"libbar component blob");
        gw.insert_component(comp_digest, encode_components_record("acme", "libbar", "2.0.0", "https://y"));
        gw.insert_file(file_digest, encode_files_record(comp_digest, "src/x.c"));
        gw.insert_file(file_digest, encode_files_record(comp_digest, "vendor/deeply/nested/src/x.c"));

        let ctx = scan(&gw, &cfg, "x.c", &content);
        let (set, ty) = MatchCompiler::new(&gw, &cfg).compile(&ctx);
        assert_eq!(ty, MatchType::File);
        assert_eq!(set.records.len(), 1);
        assert_eq!(set.records[0].file_path, "src/x.c");
        assert_eq!(set.records[0].component_md5, comp_digest);
        assert_eq!(set.records[0].file_md5, file_digest);
    }

    #[test]
    fn sbom_match_suppresses_the_whole_set() {
        let mut cfg = ScanConfig::default();
        cfg.sbom = "libfoo,".to_string();
        let mut gw = MemoryGateway::new();
        let content = b"int mul(int a, int b) { return a * b; }\n".repeat(4);
        let digest = buffer_digest(&content);
        gw.insert_component(digest, encode_components_record("acme", "libfoo", "1.2.3", "https://x"));

        let ctx = scan(&gw, &cfg, "x.c", &content);
        let (set, ty) = MatchCompiler::new(&gw, &cfg).compile(&ctx);
        assert_eq!(ty, MatchType::None);
        assert!(set.is_empty());
    }

    #[test]
    fn blacklisted_component_is_dropped_before_insertion() {
        let mut cfg = ScanConfig::default();
        cfg.blacklisted_assets = "libfoo,".to_string();
        let mut gw = MemoryGateway::new();
        let content = b"int div(int a, int b) { return a / b; }\n".repeat(4);
        let digest = buffer_digest(&content);
        gw.insert_component(digest, encode_components_record("acme", "libfoo", "1.2.3", "https://x"));

        let ctx = scan(&gw, &cfg, "x.c", &content);
        let (set, ty) = MatchCompiler::new(&gw, &cfg).compile(&ctx);
        assert_eq!(ty, MatchType::None);
        assert!(set.is_empty());
    }

    #[test]
    fn record_with_empty_required_field_is_rejected() {
        let cfg = ScanConfig::default();
        let mut gw = MemoryGateway::new();
        let content = b"int mod(int a, int b) { return a % b; }\n".repeat(4);
        let digest = buffer_digest(&content);
        gw.insert_component(digest, encode_components_record("", "libfoo", "1.2.3", "https://x"));

        let ctx = scan(&gw, &cfg, "x.c", &content);
        let (set, ty) = MatchCompiler::new(&gw, &cfg).compile(&ctx);
        assert_eq!(ty, MatchType::None);
        assert!(set.is_empty());
    }

    #[test]
    fn oversized_component_record_is_skipped_not_decoded() {
        let cfg = ScanConfig::default();
        let mut gw = MemoryGateway::new();
        let content = b"int xor(int a, int b) { return a ^ b; }\n".repeat(4);
        let digest = buffer_digest(&content);
        gw.insert_component(digest, vec![b'a'; crate::gateway::MAX_PATH]);

        let ctx = scan(&gw, &cfg, "x.c", &content);
        let (set, ty) = MatchCompiler::new(&gw, &cfg).compile(&ctx);
        assert_eq!(ty, MatchType::None);
        assert!(set.is_empty());
    }
}
