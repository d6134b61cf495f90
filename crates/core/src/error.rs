//! Error kinds raised by the core (§7).
//!
//! `MetadataIncomplete` and `NoMatches` from the spec's error table are deliberately
//! *not* variants here: per §7 they're non-fatal control flow (a dropped record, an
//! empty match set) and are represented as `Option`/empty collections at their call
//! sites instead of propagated errors.

use crate::gateway::Table;

/// Errors that can abort a single target. None of these propagate past the driver's
/// per-target boundary (§7, "No errors propagate across target boundaries").
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error("target unreadable: {0}")]
    TargetUnreadable(String),

    #[error("manifest malformed: {0}")]
    ManifestMalformed(String),

    #[error("oversize record in table {table:?} for key {key:02x?}")]
    RecordOversize { table: Table, key: [u8; 4] },
}
