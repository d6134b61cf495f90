//! Source normalization and winnowing — turns a raw byte buffer into a sequence of
//! `(fingerprint, line_number)` pairs (§4.1).
//!
//! Normalization folds case, strips anything that isn't `[a-z0-9]`, and collapses
//! runs of stripped bytes to nothing, so two files differing only in whitespace or
//! punctuation normalize to the same byte stream and therefore produce the same
//! fingerprints. A 4-byte rolling hash ("4-gram", per §4.1.2) is computed over the
//! normalized stream, and a classic Schleimer/Wilkerson/Aiken local-minimum window
//! keeps only a representative subset of hashes (winnowing).

/// Width, in normalized bytes, of a single rolling-hash gram.
const GRAM: usize = 4;

/// Width, in grams, of the winnowing window. Not pinned by the spec; chosen to match
/// the ~5-gram window used by reference winnowing implementations (see DESIGN.md).
const WINNOW_WINDOW: usize = 5;

/// Below this fraction of code-class bytes in the first `DENSITY_SAMPLE` bytes, a
/// buffer is treated as binary/non-code and skipped (§4.1, `skip_snippets`).
const MIN_CODE_DENSITY: f64 = 0.15;

/// Minimum buffer length, in bytes, below which winnowing is always skipped.
const MIN_SNIPPET_LEN: usize = 16;

/// Number of leading bytes sampled when estimating code-byte density.
const DENSITY_SAMPLE: usize = 4096;

fn is_code_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
}

/// Fold a byte into its normalized form, or `None` if it should be dropped entirely.
fn normalize_byte(b: u8) -> Option<u8> {
    if b.is_ascii_alphanumeric() {
        Some(b.to_ascii_lowercase())
    } else {
        None
    }
}

/// Returns true if `buffer` must not be fingerprinted: too short, or too little
/// alphanumeric content to look like source code (binary-looking).
pub fn skip_snippets(buffer: &[u8]) -> bool {
    if buffer.len() < MIN_SNIPPET_LEN {
        return true;
    }
    if buffer.contains(&0) {
        return true;
    }
    let sample = &buffer[..buffer.len().min(DENSITY_SAMPLE)];
    let code_bytes = sample.iter().filter(|&&b| is_code_byte(b)).count();
    (code_bytes as f64) / (sample.len() as f64) < MIN_CODE_DENSITY
}

/// Normalize `buffer`, returning parallel vectors of normalized bytes and the
/// 1-based source line number each normalized byte came from.
fn normalize(buffer: &[u8]) -> (Vec<u8>, Vec<u32>) {
    let mut norm = Vec::with_capacity(buffer.len());
    let mut lines = Vec::with_capacity(buffer.len());
    let mut line: u32 = 1;

    for &b in buffer {
        if b == b'\n' {
            line += 1;
            continue;
        }
        if let Some(n) = normalize_byte(b) {
            norm.push(n);
            lines.push(line);
        }
    }

    (norm, lines)
}

/// A 4-gram rolling hash, masked to 32 bits (§4.1.2).
fn gram_hash(window: &[u8]) -> u32 {
    let mut h: u32 = 0;
    for &b in window {
        h = h.wrapping_shl(6).wrapping_add(b as u32);
    }
    h
}

/// Winnow a raw byte buffer into fingerprints with their source line numbers.
///
/// Returns at most `max_hashes` `(fingerprint, line)` pairs, ordered by increasing
/// line number (§3, `HashTable`). Deterministic: byte-identical input always
/// produces byte-identical output (§4.1 contract).
pub fn winnow(buffer: &[u8], max_hashes: usize) -> Vec<(u32, u32)> {
    let (norm, norm_lines) = normalize(buffer);
    if norm.len() < GRAM {
        return Vec::new();
    }

    // One hash per gram-sized window of normalized bytes, tagged with the last
    // source line that contributed a byte to that window.
    let n_grams = norm.len() - GRAM + 1;
    let mut grams: Vec<(u32, u32)> = Vec::with_capacity(n_grams);
    for i in 0..n_grams {
        let h = gram_hash(&norm[i..i + GRAM]);
        let line = norm_lines[i + GRAM - 1];
        grams.push((h, line));
    }

    winnow_grams(&grams, max_hashes)
}

/// Local-minimum winnowing over a sequence of `(hash, line)` grams.
///
/// For each window of `WINNOW_WINDOW` grams, selects the rightmost minimal hash;
/// consecutive windows that select the same gram only emit it once.
fn winnow_grams(grams: &[(u32, u32)], max_hashes: usize) -> Vec<(u32, u32)> {
    if grams.is_empty() {
        return Vec::new();
    }
    if grams.len() <= WINNOW_WINDOW {
        let (h, line) = pick_min(grams);
        return vec![(h, line)];
    }

    let mut out = Vec::new();
    let mut last_selected: Option<usize> = None;

    for start in 0..=(grams.len() - WINNOW_WINDOW) {
        let window = &grams[start..start + WINNOW_WINDOW];
        let (min_idx_in_window, _) = window
            .iter()
            .enumerate()
            .min_by_key(|(_, &(h, _))| h)
            .map(|(i, &(h, _))| (i, h))
            .unwrap();
        // Rightmost occurrence of the minimum within the window.
        let min_hash = window[min_idx_in_window].0;
        let rightmost = window
            .iter()
            .enumerate()
            .rev()
            .find(|(_, &(h, _))| h == min_hash)
            .map(|(i, _)| i)
            .unwrap();
        let abs_idx = start + rightmost;

        if last_selected != Some(abs_idx) {
            out.push(grams[abs_idx]);
            last_selected = Some(abs_idx);
        }

        if out.len() >= max_hashes {
            break;
        }
    }

    out.truncate(max_hashes);
    out
}

fn pick_min(grams: &[(u32, u32)]) -> (u32, u32) {
    *grams.iter().min_by_key(|(h, _)| *h).unwrap()
}
