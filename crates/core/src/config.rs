//! Runtime configuration — the process-level limits and policy strings the spec
//! describes as "implementation limits" and "process-level SBOM/blacklist strings"
//! (§6, §9). Modeled as an explicit, immutable-after-construction value owned by the
//! driver rather than re-read globals, per the §9 design note.

use std::collections::HashSet;
use std::path::Path;

/// Default cap on the number of [`crate::wire::MatchRecord`]s in a [`crate::wire::MatchSet`] (§6).
pub const DEFAULT_SCAN_LIMIT: usize = 10;

/// Default cap on bytes read into memory for a single target (§6). Enforced by
/// [`crate::driver::ScanDriver::scan_file`] via a `stat` before the file is read.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Default cap on fingerprints retained per scan (§3, `HashTable`).
pub const DEFAULT_MAX_HASHES_READ: usize = 64 * 1024;

/// Default cap on distinct candidate files tracked in a single scan's matchmap (§3).
pub const DEFAULT_MAX_FILES: usize = 4096;

/// Policy and size-limit configuration for a [`crate::driver::ScanDriver`].
///
/// Read-only after construction — shared across every target scanned in a run,
/// matching §5's "Shared resources" contract for the SBOM/blacklist strings.
#[derive(Clone, Debug)]
pub struct ScanConfig {
    pub scan_limit: usize,
    pub max_file_size: u64,
    pub max_hashes_read: usize,
    pub max_files: usize,

    /// Comma-separated component names already declared in the caller's SBOM;
    /// a match on any of these suppresses the whole result (§4.4 step 5).
    pub sbom: String,
    /// Comma-separated component names to drop before they're ever inserted (§4.4 step 5).
    pub blacklisted_assets: String,
    /// Comma-separated path substrings; a FILES record whose path contains any of
    /// these is skipped (§4.4 step 2a). Distinct from `blacklisted_assets` — the
    /// original keeps `blacklist_match` (component name) and `unwanted_path`
    /// (path substring) as separate mechanisms (`scan.c:141-157` / `:307-339`),
    /// so blacklisting a component name never incidentally skips unrelated files
    /// whose path happens to contain that name.
    pub blacklisted_paths: String,
    /// File extensions (no leading dot) that are never matched, checked both at the
    /// driver's early skip and again per-record in the compiler (§4.4 step 2, §4.5 step 3).
    pub blacklisted_extensions: HashSet<String>,
    /// When true, a FILES record only survives if its extension equals the target's (§4.4 step 2c).
    pub match_extensions_only: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scan_limit: DEFAULT_SCAN_LIMIT,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_hashes_read: DEFAULT_MAX_HASHES_READ,
            max_files: DEFAULT_MAX_FILES,
            sbom: String::new(),
            blacklisted_assets: String::new(),
            blacklisted_paths: String::new(),
            blacklisted_extensions: HashSet::new(),
            match_extensions_only: false,
        }
    }
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `component` appears as a comma-terminated token in the SBOM string (§4.4 step 5, §8 property 7).
    pub fn is_in_sbom(&self, component: &str) -> bool {
        contains_comma_token(&self.sbom, component)
    }

    /// True if `component` appears as a comma-terminated token in the blacklist string.
    pub fn is_blacklisted_component(&self, component: &str) -> bool {
        contains_comma_token(&self.blacklisted_assets, component)
    }

    /// True if `path` contains any non-empty comma-separated token from
    /// `blacklisted_paths` as a substring (§4.4 step 2a). Unlike component
    /// blacklisting this is a substring match, not a whole-token match — paths
    /// aren't exact tokens the way component names are.
    pub fn is_blacklisted_path(&self, path: &str) -> bool {
        self.blacklisted_paths.split(',').any(|token| !token.is_empty() && path.contains(token))
    }

    pub fn is_blacklisted_extension(&self, ext: &str) -> bool {
        self.blacklisted_extensions.contains(ext)
    }

    /// Load a subset of fields from a `provenance.toml`-shaped TOML document.
    /// Unrecognized keys are ignored; this never fails on a missing file — callers
    /// that need `TargetUnreadable` semantics should check `Path::exists` first.
    pub fn load_toml_file(path: &Path) -> Result<Self, crate::error::ScanError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::ScanError::TargetUnreadable(format!("{}: {e}", path.display())))?;
        let table: toml::Table = content
            .parse()
            .map_err(|e| crate::error::ScanError::ManifestMalformed(e.to_string()))?;

        let mut cfg = ScanConfig::default();
        if let Some(v) = table.get("scan_limit").and_then(|v| v.as_integer()) {
            cfg.scan_limit = v.max(0) as usize;
        }
        if let Some(v) = table.get("max_file_size").and_then(|v| v.as_integer()) {
            cfg.max_file_size = v.max(0) as u64;
        }
        if let Some(v) = table.get("max_hashes_read").and_then(|v| v.as_integer()) {
            cfg.max_hashes_read = v.max(0) as usize;
        }
        if let Some(v) = table.get("max_files").and_then(|v| v.as_integer()) {
            cfg.max_files = v.max(0) as usize;
        }
        if let Some(v) = table.get("sbom").and_then(|v| v.as_str()) {
            cfg.sbom = v.to_string();
        }
        if let Some(v) = table.get("blacklisted_assets").and_then(|v| v.as_str()) {
            cfg.blacklisted_assets = v.to_string();
        }
        if let Some(v) = table.get("blacklisted_paths").and_then(|v| v.as_str()) {
            cfg.blacklisted_paths = v.to_string();
        }
        if let Some(arr) = table.get("blacklisted_extensions").and_then(|v| v.as_array()) {
            cfg.blacklisted_extensions = arr
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect();
        }
        if let Some(v) = table.get("match_extensions_only").and_then(|v| v.as_bool()) {
            cfg.match_extensions_only = v;
        }

        Ok(cfg)
    }
}

/// True if `haystack` (a comma-separated list) contains `needle` as a whole token.
/// Mirrors the original's `strstr(sbom, "name,")` lookup: append a trailing comma to
/// the needle and to the haystack before searching so a short name never matches a
/// longer one sharing a prefix.
fn contains_comma_token(haystack: &str, needle: &str) -> bool {
    if haystack.is_empty() || needle.is_empty() {
        return false;
    }
    let padded_haystack = format!("{haystack},");
    let token = format!("{needle},");
    padded_haystack.contains(&token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sbom_token_match_requires_trailing_comma() {
        let cfg = ScanConfig { sbom: "libfoo,libbar,".to_string(), ..ScanConfig::default() };
        assert!(cfg.is_in_sbom("libfoo"));
        assert!(cfg.is_in_sbom("libbar"));
        assert!(!cfg.is_in_sbom("lib"));
        assert!(!cfg.is_in_sbom("libfo"));
    }

    #[test]
    fn empty_sbom_never_matches() {
        let cfg = ScanConfig::default();
        assert!(!cfg.is_in_sbom("anything"));
    }

    #[test]
    fn path_blacklist_is_independent_of_component_blacklist() {
        let cfg = ScanConfig {
            blacklisted_assets: "libfoo,".to_string(),
            blacklisted_paths: "vendor/,".to_string(),
            ..ScanConfig::default()
        };
        assert!(cfg.is_blacklisted_component("libfoo"));
        // A path containing the blacklisted *component name* is not itself
        // path-blacklisted — the two lists are separate mechanisms.
        assert!(!cfg.is_blacklisted_path("src/libfoo/main.c"));
        assert!(cfg.is_blacklisted_path("vendor/libfoo/main.c"));
    }

    #[test]
    fn default_constants_are_documented_values() {
        let cfg = ScanConfig::default();
        assert_eq!(cfg.scan_limit, 10);
        assert_eq!(cfg.max_hashes_read, DEFAULT_MAX_HASHES_READ);
    }
}
