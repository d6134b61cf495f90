//! The scan driver — owns the per-run [`ScanConfig`] and a reused [`ScanContext`],
//! and walks a single physical target (or a WFP manifest of many) through
//! digest → engine → compiler → [`ScanResult`].

use crate::compiler::MatchCompiler;
use crate::config::ScanConfig;
use crate::digest::{self, Digest};
use crate::engine::{HashTable, MatchEngine, ScanContext};
use crate::error::ScanError;
use crate::gateway::IndexGateway;
use crate::wire::{MatchType, ScanResult};
use std::path::Path;

pub struct ScanDriver<'a> {
    gateway: &'a dyn IndexGateway,
    config: ScanConfig,
    ctx: ScanContext,
}

impl<'a> ScanDriver<'a> {
    pub fn new(gateway: &'a dyn IndexGateway, config: ScanConfig) -> Self {
        let ctx = ScanContext::new(config.max_files);
        ScanDriver { gateway, config, ctx }
    }

    /// Scan a single physical file on disk.
    ///
    /// Files whose size exceeds [`ScanConfig::max_file_size`] are reported as a
    /// clean no-match without ever being read into memory (§6: "arbitrary bytes,
    /// size ≤ `MAX_FILE_SIZE`" is an implementation limit honored up front).
    pub fn scan_file(&mut self, path: &Path) -> Result<ScanResult, ScanError> {
        let file_path = path.display().to_string();
        let metadata = std::fs::metadata(path)
            .map_err(|e| ScanError::TargetUnreadable(format!("{}: {e}", path.display())))?;
        if metadata.len() > self.config.max_file_size {
            tracing::warn!(file = %file_path, size = metadata.len(), limit = self.config.max_file_size, "target exceeds max_file_size, skipping");
            self.ctx.reset_for(file_path.clone(), metadata.len(), Digest::from_bytes([0u8; 16]));
            return Ok(ScanResult::no_match(file_path, metadata.len()));
        }

        let content = std::fs::read(path)
            .map_err(|e| ScanError::TargetUnreadable(format!("{}: {e}", path.display())))?;
        let digest = digest::buffer_digest(&content);
        Ok(self.run_target(file_path, content.len() as u64, digest, Some(&content)))
    }

    /// Scan every file under `root`, recursing into subdirectories. Entries that
    /// fail to read are skipped with a `TargetUnreadable` logged, not propagated.
    pub fn scan_dir(&mut self, root: &Path) -> Vec<ScanResult> {
        let mut results = Vec::new();
        self.scan_dir_into(root, &mut results);
        results
    }

    fn scan_dir_into(&mut self, dir: &Path, results: &mut Vec<ScanResult>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "directory unreadable");
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                self.scan_dir_into(&path, results);
            } else {
                match self.scan_file(&path) {
                    Ok(result) => results.push(result),
                    Err(e) => tracing::warn!(file = %path.display(), error = %e, "target unreadable"),
                }
            }
        }
    }

    /// Replay a precomputed winnowing-fingerprint manifest instead of reading
    /// raw source. Returns one [`ScanResult`] per `file=` block, in manifest
    /// order; `component=` headers are grouping metadata only — they flush the
    /// preceding `file=` block but are never themselves scanned or emitted
    /// (§4.5; `examples/original_source/src/scan.c:539-544` only calls
    /// `ldb_scan` on the accumulated `file=` block a header closes).
    pub fn scan_wfp_manifest(&mut self, path: &Path) -> Result<Vec<ScanResult>, ScanError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ScanError::TargetUnreadable(format!("{}: {e}", path.display())))?;

        let manifest_digest = digest::buffer_digest(raw.as_bytes());
        tracing::debug!(manifest = %path.display(), digest = %manifest_digest, "loaded wfp manifest");

        let blocks = parse_wfp(&raw)?;
        let mut results = Vec::with_capacity(blocks.len());
        for block in blocks {
            results.push(self.run_wfp_file(block));
        }
        Ok(results)
    }

    /// Reset state, run the early-skip check, then the engine and compiler, for
    /// a target whose bytes (if any) are already in hand.
    fn run_target(&mut self, file_path: String, file_size: u64, source_digest: Digest, content: Option<&[u8]>) -> ScanResult {
        self.ctx.reset_for(file_path.clone(), file_size, source_digest);

        let ext = extension_of(&file_path);
        let early_skip = file_size <= 1 || ext.is_some_and(|e| self.config.is_blacklisted_extension(e));

        if !early_skip {
            match content {
                Some(bytes) => MatchEngine::new(self.gateway, &self.config).scan(&mut self.ctx, bytes),
                None => MatchEngine::new(self.gateway, &self.config).scan_precomputed(&mut self.ctx),
            }
        } else {
            tracing::debug!(file = %file_path, size = file_size, "early skip");
        }

        let (set, match_type) = MatchCompiler::new(self.gateway, &self.config).compile(&self.ctx);
        ScanResult { file_path, file_size, match_type, matches: set.into_vec() }
    }

    fn run_wfp_file(&mut self, block: WfpFile) -> ScanResult {
        let WfpFile { md5, size, path, fps, lines } = block;
        self.ctx.reset_for(path.clone(), size, md5);
        self.ctx.hash_table = HashTable { fps, lines };
        MatchEngine::new(self.gateway, &self.config).scan_precomputed(&mut self.ctx);
        let (set, match_type) = MatchCompiler::new(self.gateway, &self.config).compile(&self.ctx);
        ScanResult { file_path: path, file_size: size, match_type, matches: set.into_vec() }
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

struct WfpFile {
    md5: Digest,
    size: u64,
    path: String,
    fps: Vec<u32>,
    lines: Vec<u32>,
}

/// Parse a WFP manifest's text into a sequence of `file=` blocks.
///
/// `component=` headers are grouping metadata: they flush whatever `file=`
/// block precedes them, same as another `file=` header would, but never
/// produce a block of their own — only `file=` blocks are ever scanned
/// (§4.5; mirrors `examples/original_source/src/scan.c:539-544`, where a
/// `component=`/`file=` header only triggers `ldb_scan` on the data already
/// read, and is otherwise pure grouping).
///
/// `fp_hex` fields are 8 hex digits; the manifest writes them big-endian, which
/// decodes to the same numeric value this crate's own fingerprints are compared
/// by, so no byte-order juggling survives past `hex_to_fp`.
fn parse_wfp(raw: &str) -> Result<Vec<WfpFile>, ScanError> {
    let mut blocks = Vec::new();
    let mut current: Option<(Digest, u64, String, Vec<u32>, Vec<u32>)> = None;

    for line in raw.lines() {
        if let Some(rest) = line.strip_prefix("component=") {
            if let Some((md5, size, path, fps, lines)) = current.take() {
                blocks.push(WfpFile { md5, size, path, fps, lines });
            }
            let fields: Vec<&str> = rest.splitn(4, ',').collect();
            if fields.len() != 4 {
                return Err(ScanError::ManifestMalformed(format!("bad component line: {line}")));
            }
            // Validate the digest shape only; component lines carry no output of
            // their own (see doc comment above).
            Digest::from_hex(fields[0])
                .ok_or_else(|| ScanError::ManifestMalformed(format!("bad component digest: {}", fields[0])))?;
        } else if let Some(rest) = line.strip_prefix("file=") {
            if let Some((md5, size, path, fps, lines)) = current.take() {
                blocks.push(WfpFile { md5, size, path, fps, lines });
            }
            let fields: Vec<&str> = rest.splitn(3, ',').collect();
            if fields.len() != 3 {
                return Err(ScanError::ManifestMalformed(format!("bad file line: {line}")));
            }
            let md5 = Digest::from_hex(fields[0])
                .ok_or_else(|| ScanError::ManifestMalformed(format!("bad file digest: {}", fields[0])))?;
            let size: u64 = fields[1]
                .parse()
                .map_err(|_| ScanError::ManifestMalformed(format!("bad file size: {}", fields[1])))?;
            current = Some((md5, size, fields[2].to_string(), Vec::new(), Vec::new()));
        } else if let Some((_, _, _, ref mut fps, ref mut lines)) = current {
            let Some((lineno_text, fps_text)) = line.split_once('=') else {
                return Err(ScanError::ManifestMalformed(format!("bad fp line: {line}")));
            };
            let line_no: u32 = lineno_text
                .parse()
                .map_err(|_| ScanError::ManifestMalformed(format!("bad line number: {lineno_text}")))?;
            for fp_hex in fps_text.split(',') {
                let fp = hex_to_fp(fp_hex)
                    .ok_or_else(|| ScanError::ManifestMalformed(format!("bad fingerprint: {fp_hex}")))?;
                fps.push(fp);
                lines.push(line_no);
            }
        } else if !line.trim().is_empty() {
            return Err(ScanError::ManifestMalformed(format!("line outside any block: {line}")));
        }
    }

    if let Some((md5, size, path, fps, lines)) = current {
        blocks.push(WfpFile { md5, size, path, fps, lines });
    }

    Ok(blocks)
}

fn hex_to_fp(text: &str) -> Option<u32> {
    if text.len() != 8 {
        return None;
    }
    let bytes = hex::decode(text).ok()?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{encode_components_record, encode_files_record};
    use crate::memory_gateway::MemoryGateway;
    use std::io::Write;

    #[test]
    fn zero_byte_file_is_early_skipped() {
        let gw = MemoryGateway::new();
        let mut driver = ScanDriver::new(&gw, ScanConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.bin");
        std::fs::write(&file, b"").unwrap();

        let result = driver.scan_file(&file).unwrap();
        assert_eq!(result.match_type, MatchType::None);
        assert!(result.matches.is_empty());
    }

    #[test]
    fn blacklisted_extension_is_early_skipped_even_with_a_component_hit() {
        let mut cfg = ScanConfig::default();
        cfg.blacklisted_extensions.insert("min".to_string());
        let mut gw = MemoryGateway::new();
        let content = b"int add(int a, int b) { return a + b; }\n".repeat(4);
        let digest = digest::buffer_digest(&content);
        gw.insert_component(digest, encode_components_record("acme", "libfoo", "1.0", "https://x"));

        let mut driver = ScanDriver::new(&gw, cfg);
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bundle.min");
        std::fs::write(&file, &content).unwrap();

        let result = driver.scan_file(&file).unwrap();
        assert_eq!(result.match_type, MatchType::None);
    }

    #[test]
    fn scan_dir_recurses_and_reports_every_file() {
        let gw = MemoryGateway::new();
        let mut driver = ScanDriver::new(&gw, ScanConfig::default());
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.c"), b"alpha beta gamma delta\n").unwrap();
        std::fs::write(dir.path().join("sub/b.c"), b"epsilon zeta eta theta\n").unwrap();

        let results = driver.scan_dir(dir.path());
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn wfp_manifest_with_two_file_blocks_reports_one_hit_and_one_miss() {
        let mut gw = MemoryGateway::new();
        let hit_digest = digest::buffer_digest(b"hit file contents");
        let comp_digest = digest::buffer_digest(b"component blob");
        gw.insert_component(comp_digest, encode_components_record("acme", "libfoo", "1.0", "https://x"));
        gw.insert_file(hit_digest, encode_files_record(comp_digest, "src/hit.c"));

        let manifest = format!(
            "file={},120,src/hit.c\n10=aabbccdd\nfile=22222222222222222222222222222222,80,src/miss.c\n5=00000001\n",
            hit_digest.to_hex()
        );

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(manifest.as_bytes()).unwrap();

        let mut driver = ScanDriver::new(&gw, ScanConfig::default());
        let results = driver.scan_wfp_manifest(file.path()).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].match_type, MatchType::File);
        assert_eq!(results[1].match_type, MatchType::None);
    }

    #[test]
    fn oversized_file_is_skipped_without_reading_into_memory() {
        let mut cfg = ScanConfig::default();
        cfg.max_file_size = 4;
        let mut gw = MemoryGateway::new();
        let content = b"int add(int a, int b) { return a + b; }\n".repeat(4);
        let digest = digest::buffer_digest(&content);
        gw.insert_component(digest, encode_components_record("acme", "libfoo", "1.0", "https://x"));

        let mut driver = ScanDriver::new(&gw, cfg);
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.c");
        std::fs::write(&file, &content).unwrap();

        let result = driver.scan_file(&file).unwrap();
        assert_eq!(result.match_type, MatchType::None);
        assert!(result.matches.is_empty());
    }

    #[test]
    fn component_header_flushes_the_file_block_but_is_never_itself_emitted() {
        let mut gw = MemoryGateway::new();
        let hit_digest = digest::buffer_digest(b"hit file contents");
        let comp_digest = digest::buffer_digest(b"component blob");
        gw.insert_component(comp_digest, encode_components_record("acme", "libfoo", "1.0", "https://x"));
        gw.insert_file(hit_digest, encode_files_record(comp_digest, "src/hit.c"));

        let manifest = format!(
            "component={},acme,libfoo,1.0\nfile={},120,src/hit.c\n10=aabbccdd\n",
            comp_digest.to_hex(),
            hit_digest.to_hex()
        );

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(manifest.as_bytes()).unwrap();

        let mut driver = ScanDriver::new(&gw, ScanConfig::default());
        let results = driver.scan_wfp_manifest(file.path()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].match_type, MatchType::File);
        assert_eq!(results[0].file_path, "src/hit.c");
    }

    #[test]
    fn malformed_manifest_line_is_reported_as_manifest_malformed() {
        let gw = MemoryGateway::new();
        let mut driver = ScanDriver::new(&gw, ScanConfig::default());
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not a valid header\n").unwrap();
        let err = driver.scan_wfp_manifest(file.path()).unwrap_err();
        assert!(matches!(err, ScanError::ManifestMalformed(_)));
    }
}
