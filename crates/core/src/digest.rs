//! Content digests — MD5 identifiers used as keys into the content-addressed index.
//!
//! A [`Digest`] is opaque outside this module beyond its key/subkey split: the first
//! [`KEY_LEN`] bytes are the lookup key, the rest is the subkey compared on collision.

use md5::{Digest as _, Md5};
use std::fmt;
use std::path::Path;

/// Length of an MD5 digest in bytes.
pub const MD5_LEN: usize = 16;

/// Length of the primary lookup key within a digest (remaining bytes are the subkey).
pub const LDB_KEY_LN: usize = 4;

/// A 16-byte content digest, ordered lexicographically over its raw bytes.
///
/// Byte order is the comparison basis for the matchmap tie-break (§4.3) — never
/// derive a numeric interpretation from it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest(pub [u8; MD5_LEN]);

impl Digest {
    pub fn from_bytes(bytes: [u8; MD5_LEN]) -> Self {
        Digest(bytes)
    }

    /// Parse a 32-character lowercase hex string into a digest.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        if bytes.len() != MD5_LEN {
            return None;
        }
        let mut arr = [0u8; MD5_LEN];
        arr.copy_from_slice(&bytes);
        Some(Digest(arr))
    }

    pub fn key(&self) -> [u8; LDB_KEY_LN] {
        let mut k = [0u8; LDB_KEY_LN];
        k.copy_from_slice(&self.0[..LDB_KEY_LN]);
        k
    }

    pub fn subkey(&self) -> &[u8] {
        &self.0[LDB_KEY_LN..]
    }

    pub fn as_bytes(&self) -> &[u8; MD5_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// True if this digest equals the well-known MD5 of the empty byte string.
    pub fn is_empty_file(&self) -> bool {
        *self == EMPTY_FILE_DIGEST
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// MD5 of the empty byte string: d41d8cd98f00b204e9800998ecf8427e (§6, "Constants").
pub const EMPTY_FILE_DIGEST: Digest = Digest([
    0xd4, 0x1d, 0x8c, 0xd9, 0x8f, 0x00, 0xb2, 0x04, 0xe9, 0x80, 0x09, 0x98, 0xec, 0xf8, 0x42, 0x7e,
]);

/// MD5 of a byte buffer.
pub fn buffer_digest(buf: &[u8]) -> Digest {
    let mut hasher = Md5::new();
    hasher.update(buf);
    let out = hasher.finalize();
    let mut bytes = [0u8; MD5_LEN];
    bytes.copy_from_slice(&out);
    Digest(bytes)
}

/// MD5 of a file's bytes on disk (§4.1, `file_digest`).
pub fn file_digest(path: &Path) -> std::io::Result<Digest> {
    let bytes = std::fs::read(path)?;
    Ok(buffer_digest(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_matches_well_known_digest() {
        assert_eq!(buffer_digest(b""), EMPTY_FILE_DIGEST);
        assert!(EMPTY_FILE_DIGEST.is_empty_file());
    }

    #[test]
    fn hex_round_trip() {
        let d = buffer_digest(b"hello world");
        let hex = d.to_hex();
        assert_eq!(Digest::from_hex(&hex), Some(d));
    }

    #[test]
    fn key_subkey_split() {
        let d = Digest::from_bytes([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]);
        assert_eq!(d.key(), [1, 2, 3, 4]);
        assert_eq!(d.subkey(), &[5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]);
    }

    #[test]
    fn ordering_is_byte_lexicographic() {
        let a = Digest::from_bytes([0u8; 16]);
        let mut b_bytes = [0u8; 16];
        b_bytes[0] = 1;
        let b = Digest::from_bytes(b_bytes);
        assert!(a < b);
    }
}
