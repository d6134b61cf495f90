//! Output shapes handed to an external serializer (§1, §6: the JSON serializer
//! itself is out of scope, but these are the shapes it receives).

use crate::digest::Digest;
use serde::Serialize;

/// Which tier of the three-tier lookup produced a result (§3, §4.3).
///
/// Preference when tiers disagree is `Component > Snippet > File > None`, but only
/// one tier is ever active for a given scan (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    None,
    File,
    Snippet,
    Component,
}

impl MatchType {
    /// Relative preference rank; higher wins if tiers ever needed comparing directly.
    pub fn rank(self) -> u8 {
        match self {
            MatchType::None => 0,
            MatchType::File => 1,
            MatchType::Snippet => 2,
            MatchType::Component => 3,
        }
    }
}

impl Default for MatchType {
    fn default() -> Self {
        MatchType::None
    }
}

/// A single user-facing match attribution (§3).
#[derive(Debug, Clone, Serialize)]
pub struct MatchRecord {
    pub vendor: String,
    pub component: String,
    pub version: String,
    pub latest_version: String,
    pub url: String,
    pub file_path: String,
    pub component_md5: Digest,
    pub file_md5: Digest,
    /// Comma-separated inclusive line ranges in the target, or `"all"` for file/component matches.
    pub lines: String,
    /// Same, but line numbers in the matched OSS file.
    pub oss_lines: String,
    pub matched_percent: u8,
    pub path_len: u16,
    #[serde(rename = "type")]
    pub match_type: MatchType,
    pub selected: bool,
}

impl MatchRecord {
    /// A record with any of `vendor | component | url | version | file_path` empty
    /// is invalid (§3). [`crate::compiler::MatchCompiler`] calls this on every
    /// hydrated candidate before it's ever considered for insertion.
    pub fn is_valid(&self) -> bool {
        !self.vendor.is_empty()
            && !self.component.is_empty()
            && !self.url.is_empty()
            && !self.version.is_empty()
            && !self.file_path.is_empty()
    }
}

impl serde::Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

/// An ordered, bounded buffer of up to `scan_limit` [`MatchRecord`]s (§3).
///
/// Insertion order after the compiler's slotting rule is preserved — "the
/// serializer must not reorder" (§5).
#[derive(Debug, Clone, Default)]
pub struct MatchSet {
    pub records: Vec<MatchRecord>,
}

impl MatchSet {
    pub fn new() -> Self {
        Self { records: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_vec(self) -> Vec<MatchRecord> {
        self.records
    }
}

/// The final per-target result, including everything a serializer needs (§6).
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub file_path: String,
    pub file_size: u64,
    #[serde(rename = "type")]
    pub match_type: MatchType,
    pub matches: Vec<MatchRecord>,
}

impl ScanResult {
    pub fn no_match(file_path: String, file_size: u64) -> Self {
        ScanResult { file_path, file_size, match_type: MatchType::None, matches: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_record_is_invalid() {
        let record = MatchRecord {
            vendor: String::new(),
            component: String::new(),
            version: String::new(),
            latest_version: String::new(),
            url: String::new(),
            file_path: String::new(),
            component_md5: Digest::from_bytes([0u8; 16]),
            file_md5: Digest::from_bytes([0u8; 16]),
            lines: String::new(),
            oss_lines: String::new(),
            matched_percent: 0,
            path_len: 0,
            match_type: MatchType::None,
            selected: false,
        };
        assert!(!record.is_valid());
    }

    #[test]
    fn rank_orders_component_highest() {
        assert!(MatchType::Component.rank() > MatchType::Snippet.rank());
        assert!(MatchType::Snippet.rank() > MatchType::File.rank());
        assert!(MatchType::File.rank() > MatchType::None.rank());
    }
}
