//! An in-memory [`IndexGateway`] implementation.
//!
//! This stands in for the real content-addressed store (§1 calls the store an
//! external collaborator); it exists so the core is testable and so the CLI has
//! something to scan against without a network dependency, the way `codescope-cli`
//! calls straight into `codescope-core` with no server in between.

use crate::digest::{Digest, MD5_LEN};
use crate::error::ScanError;
use crate::gateway::{IndexGateway, IterControl, Record, Table};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Simple `BTreeMap`-backed gateway. One entry's worth of records can collide on
/// digest (e.g. the same file digest hosted at two different repository paths,
/// §8 S4), so each bucket holds a `Vec` of raw records rather than a single one.
#[derive(Default)]
pub struct MemoryGateway {
    components: BTreeMap<[u8; MD5_LEN], Vec<u8>>,
    files: BTreeMap<[u8; MD5_LEN], Vec<Vec<u8>>>,
    snippets: BTreeMap<u32, Vec<Vec<u8>>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or overwrite) a COMPONENTS record for `digest`.
    pub fn insert_component(&mut self, digest: Digest, raw: Vec<u8>) {
        self.components.insert(*digest.as_bytes(), raw);
    }

    /// Append a FILES record under `digest` (multiple paths may share a digest).
    pub fn insert_file(&mut self, digest: Digest, raw: Vec<u8>) {
        self.files.entry(*digest.as_bytes()).or_default().push(raw);
    }

    /// Append a SNIPPETS row under fingerprint `fp`.
    pub fn insert_snippet(&mut self, fp: u32, raw: Vec<u8>) {
        self.snippets.entry(fp).or_default().push(raw);
    }

    /// Load a JSON fixture describing all three tables (used by the CLI's
    /// `load-index` subcommand and by integration tests).
    pub fn from_fixture_json(path: &Path) -> Result<Self, ScanError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ScanError::TargetUnreadable(format!("{}: {e}", path.display())))?;
        let fixture: Fixture = serde_json::from_str(&content)
            .map_err(|e| ScanError::ManifestMalformed(format!("{}: {e}", path.display())))?;

        let mut gw = MemoryGateway::new();
        for c in fixture.components {
            let digest = Digest::from_hex(&c.digest)
                .ok_or_else(|| ScanError::ManifestMalformed(format!("bad digest: {}", c.digest)))?;
            let raw = crate::gateway::encode_components_record(&c.vendor, &c.component, &c.version, &c.url);
            gw.insert_component(digest, raw);
        }
        for f in fixture.files {
            let digest = Digest::from_hex(&f.digest)
                .ok_or_else(|| ScanError::ManifestMalformed(format!("bad digest: {}", f.digest)))?;
            let component_digest = Digest::from_hex(&f.component_digest).ok_or_else(|| {
                ScanError::ManifestMalformed(format!("bad component digest: {}", f.component_digest))
            })?;
            let raw = crate::gateway::encode_files_record(component_digest, &f.path);
            gw.insert_file(digest, raw);
        }
        for s in fixture.snippets {
            let file_md5 = Digest::from_hex(&s.file_md5)
                .ok_or_else(|| ScanError::ManifestMalformed(format!("bad file_md5: {}", s.file_md5)))?;
            let raw = crate::gateway::encode_snippet_row(file_md5, s.fp_index, s.oss_line);
            gw.insert_snippet(s.fingerprint, raw);
        }
        Ok(gw)
    }
}

#[derive(Deserialize)]
struct Fixture {
    #[serde(default)]
    components: Vec<FixtureComponent>,
    #[serde(default)]
    files: Vec<FixtureFile>,
    #[serde(default)]
    snippets: Vec<FixtureSnippet>,
}

#[derive(Deserialize)]
struct FixtureComponent {
    digest: String,
    vendor: String,
    component: String,
    version: String,
    url: String,
}

#[derive(Deserialize)]
struct FixtureFile {
    digest: String,
    component_digest: String,
    path: String,
}

#[derive(Deserialize)]
struct FixtureSnippet {
    fingerprint: u32,
    file_md5: String,
    fp_index: u16,
    oss_line: u16,
}

impl IndexGateway for MemoryGateway {
    fn exists(&self, table: Table, key: &[u8]) -> bool {
        match table {
            Table::Components => digest_key(key).is_some_and(|k| self.components.contains_key(&k)),
            Table::Files => digest_key(key).is_some_and(|k| self.files.contains_key(&k)),
            Table::Snippets => fp_key(key).is_some_and(|fp| self.snippets.contains_key(&fp)),
        }
    }

    fn fetch(&self, table: Table, key: &[u8], handler: &mut dyn FnMut(Record<'_>) -> IterControl) -> usize {
        match table {
            Table::Components => {
                let Some(k) = digest_key(key) else { return 0 };
                let Some(raw) = self.components.get(&k) else { return 0 };
                handler(Record { key: &k[..4], subkey: &k[4..], raw, iteration: 0 });
                1
            }
            Table::Files => {
                let Some(k) = digest_key(key) else { return 0 };
                let Some(rows) = self.files.get(&k) else { return 0 };
                let mut visited = 0;
                for (i, raw) in rows.iter().enumerate() {
                    visited += 1;
                    if handler(Record { key: &k[..4], subkey: &k[4..], raw, iteration: i }) == IterControl::Stop {
                        break;
                    }
                }
                visited
            }
            Table::Snippets => {
                let Some(fp) = fp_key(key) else { return 0 };
                let Some(rows) = self.snippets.get(&fp) else { return 0 };
                let fp_bytes = fp.to_be_bytes();
                let mut visited = 0;
                for (i, raw) in rows.iter().enumerate() {
                    visited += 1;
                    if handler(Record { key: &fp_bytes[..2], subkey: &fp_bytes[2..], raw, iteration: i })
                        == IterControl::Stop
                    {
                        break;
                    }
                }
                visited
            }
        }
    }
}

fn digest_key(key: &[u8]) -> Option<[u8; MD5_LEN]> {
    if key.len() != MD5_LEN {
        return None;
    }
    let mut out = [0u8; MD5_LEN];
    out.copy_from_slice(key);
    Some(out)
}

fn fp_key(key: &[u8]) -> Option<u32> {
    if key.len() != 4 {
        return None;
    }
    Some(u32::from_be_bytes([key[0], key[1], key[2], key[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::buffer_digest;

    #[test]
    fn component_round_trip() {
        let mut gw = MemoryGateway::new();
        let digest = buffer_digest(b"some component source");
        gw.insert_component(digest, crate::gateway::encode_components_record("acme", "libfoo", "1.0", "https://x"));
        assert!(gw.exists(Table::Components, digest.as_bytes()));
        assert!(!gw.exists(Table::Components, buffer_digest(b"other").as_bytes()));
    }

    #[test]
    fn files_support_multiple_records_per_digest() {
        let mut gw = MemoryGateway::new();
        let digest = buffer_digest(b"shared file contents");
        let comp = buffer_digest(b"component");
        gw.insert_file(digest, crate::gateway::encode_files_record(comp, "src/x.c"));
        gw.insert_file(digest, crate::gateway::encode_files_record(comp, "vendor/deeply/nested/src/x.c"));

        let mut seen = Vec::new();
        gw.fetch(Table::Files, digest.as_bytes(), &mut |r| {
            seen.push(r.raw.to_vec());
            IterControl::Continue
        });
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn snippet_fetch_can_stop_early() {
        let mut gw = MemoryGateway::new();
        let f1 = buffer_digest(b"file one");
        let f2 = buffer_digest(b"file two");
        gw.insert_snippet(0xdead_beef, crate::gateway::encode_snippet_row(f1, 0, 10));
        gw.insert_snippet(0xdead_beef, crate::gateway::encode_snippet_row(f2, 1, 20));

        let mut count = 0;
        gw.fetch(Table::Snippets, &0xdead_beef_u32.to_be_bytes(), &mut |_| {
            count += 1;
            IterControl::Stop
        });
        assert_eq!(count, 1);
    }
}
