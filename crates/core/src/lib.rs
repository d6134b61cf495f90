//! `provenance-core` — the matching core of a source-code provenance scanner.
//!
//! Given a target file's bytes (or a precomputed winnowing-fingerprint manifest),
//! this crate determines whether the target — or a contiguous snippet of it —
//! matches code known to an external content-addressed index of open-source
//! components and files, and compiles the result into a bounded, deduplicated set
//! of component attributions.
//!
//! The indexed store itself, the final JSON serializer, the CLI, and file I/O
//! helpers beyond what [`driver::ScanDriver`] needs are external collaborators;
//! this crate only defines the [`gateway::IndexGateway`] contract they meet.
//!
//! See `DESIGN.md` for how each module grounds in the reference implementation.

pub mod compiler;
pub mod config;
pub mod digest;
pub mod driver;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod matchmap;
pub mod memory_gateway;
pub mod winnow;
pub mod wire;

pub use compiler::MatchCompiler;
pub use config::ScanConfig;
pub use digest::Digest;
pub use driver::ScanDriver;
pub use engine::MatchEngine;
pub use error::ScanError;
pub use gateway::{IndexGateway, IterControl, Table};
pub use memory_gateway::MemoryGateway;
pub use wire::{MatchRecord, MatchSet, MatchType, ScanResult};
