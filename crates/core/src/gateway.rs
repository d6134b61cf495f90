//! Index Gateway — the abstract interface over the content-addressed key/value store
//! (§4.2). The store itself is an external collaborator (§1); this module only
//! defines the contract and the CSV/binary record encodings both sides agree on.

use crate::digest::{Digest, MD5_LEN};

/// Upper bound on a single record's raw length. A record at or beyond this size
/// is treated as oversized and skipped rather than decoded (§7, `RecordOversize`;
/// §9's `handle_component_record` guard, read as `datalen == 0 || datalen >= MAX_PATH`).
pub const MAX_PATH: usize = 4096;

/// True if `raw` is empty or at/beyond [`MAX_PATH`] — the oversize guard applied
/// before a record is ever handed to a table-specific decoder.
pub fn is_oversized(raw: &[u8]) -> bool {
    raw.is_empty() || raw.len() >= MAX_PATH
}

/// The three logical tables the core reads from (§2, §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Table {
    Components,
    Files,
    Snippets,
}

/// What a record handler tells the gateway to do next (§4.2, "the handler may
/// return *stop* to end iteration early").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IterControl {
    Continue,
    Stop,
}

/// One record streamed back from [`IndexGateway::fetch`].
pub struct Record<'a> {
    pub key: &'a [u8],
    pub subkey: &'a [u8],
    pub raw: &'a [u8],
    pub iteration: usize,
}

/// A capability over the indexed store: existence checks and streaming fetch.
///
/// Kept as a single small trait (a "capability... avoid inheritance", §9) so any
/// backing store — in-memory, on-disk, remote — can implement it uniformly.
pub trait IndexGateway: Send + Sync {
    fn exists(&self, table: Table, key: &[u8]) -> bool;

    /// Invoke `handler` once per record matching `key`, stopping early if the
    /// handler returns [`IterControl::Stop`]. Returns the number of records visited.
    fn fetch(&self, table: Table, key: &[u8], handler: &mut dyn FnMut(Record<'_>) -> IterControl) -> usize;
}

// ---------------------------------------------------------------------------
// COMPONENTS record: `vendor,component,version,url` CSV, `/` escaped as `\`.
// ---------------------------------------------------------------------------

fn escape_slashes(field: &str) -> String {
    field.replace('/', "\\")
}

fn unescape_slashes(field: &str) -> String {
    field.replace('\\', "/")
}

/// Encode a COMPONENTS value (§4.2, §6).
pub fn encode_components_record(vendor: &str, component: &str, version: &str, url: &str) -> Vec<u8> {
    let line = format!(
        "{},{},{},{}",
        escape_slashes(vendor),
        escape_slashes(component),
        escape_slashes(version),
        escape_slashes(url),
    );
    line.into_bytes()
}

/// Decode a COMPONENTS value back into `(vendor, component, version, url)`, with
/// slashes restored. Returns `None` if the record doesn't split into exactly four
/// CSV fields.
pub fn decode_components_record(raw: &[u8]) -> Option<(String, String, String, String)> {
    let text = std::str::from_utf8(raw).ok()?;
    let fields: Vec<&str> = text.splitn(4, ',').collect();
    if fields.len() != 4 {
        return None;
    }
    Some((
        unescape_slashes(fields[0]),
        unescape_slashes(fields[1]),
        unescape_slashes(fields[2]),
        unescape_slashes(fields[3]),
    ))
}

// ---------------------------------------------------------------------------
// FILES record: `<component_digest:16 bytes><path:UTF-8>`.
// ---------------------------------------------------------------------------

/// Encode a FILES value (§4.2, §6).
pub fn encode_files_record(component_digest: Digest, path: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(MD5_LEN + path.len());
    out.extend_from_slice(component_digest.as_bytes());
    out.extend_from_slice(path.as_bytes());
    out
}

/// Decode a FILES value back into `(component_digest, path)`.
pub fn decode_files_record(raw: &[u8]) -> Option<(Digest, String)> {
    if raw.len() < MD5_LEN {
        return None;
    }
    let mut digest_bytes = [0u8; MD5_LEN];
    digest_bytes.copy_from_slice(&raw[..MD5_LEN]);
    let path = std::str::from_utf8(&raw[MD5_LEN..]).ok()?.to_string();
    Some((Digest::from_bytes(digest_bytes), path))
}

// ---------------------------------------------------------------------------
// SNIPPETS row: `<file_md5:16><fp_index:2><oss_line:2>` (§6).
// ---------------------------------------------------------------------------

const SNIPPET_ROW_LEN: usize = MD5_LEN + 2 + 2;

/// Encode one SNIPPETS row.
pub fn encode_snippet_row(file_md5: Digest, fp_index: u16, oss_line: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(SNIPPET_ROW_LEN);
    out.extend_from_slice(file_md5.as_bytes());
    out.extend_from_slice(&fp_index.to_le_bytes());
    out.extend_from_slice(&oss_line.to_le_bytes());
    out
}

/// Decode one SNIPPETS row into `(file_md5, fp_index, oss_line)`.
pub fn decode_snippet_row(raw: &[u8]) -> Option<(Digest, u16, u16)> {
    if raw.len() != SNIPPET_ROW_LEN {
        return None;
    }
    let mut digest_bytes = [0u8; MD5_LEN];
    digest_bytes.copy_from_slice(&raw[..MD5_LEN]);
    let fp_index = u16::from_le_bytes([raw[MD5_LEN], raw[MD5_LEN + 1]]);
    let oss_line = u16::from_le_bytes([raw[MD5_LEN + 2], raw[MD5_LEN + 3]]);
    Some((Digest::from_bytes(digest_bytes), fp_index, oss_line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_csv_round_trip_with_slashes() {
        let raw = encode_components_record("acme/foo", "libfoo", "1.2.3", "https://x");
        assert_eq!(
            decode_components_record(&raw),
            Some((
                "acme/foo".to_string(),
                "libfoo".to_string(),
                "1.2.3".to_string(),
                "https://x".to_string(),
            ))
        );
    }

    #[test]
    fn components_csv_rejects_malformed_record() {
        assert_eq!(decode_components_record(b"too,few"), None);
    }

    #[test]
    fn files_record_round_trip() {
        let d = crate::digest::buffer_digest(b"some component");
        let raw = encode_files_record(d, "src/x.c");
        assert_eq!(decode_files_record(&raw), Some((d, "src/x.c".to_string())));
    }

    #[test]
    fn snippet_row_round_trip() {
        let d = crate::digest::buffer_digest(b"some file");
        let raw = encode_snippet_row(d, 7, 42);
        assert_eq!(decode_snippet_row(&raw), Some((d, 7, 42)));
    }

    #[test]
    fn oversize_guard_rejects_empty_and_oversized_records() {
        assert!(is_oversized(b""));
        assert!(is_oversized(&vec![b'a'; MAX_PATH]));
        assert!(!is_oversized(b"vendor,component,1.0,https://x"));
    }
}
