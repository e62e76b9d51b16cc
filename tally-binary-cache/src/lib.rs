//! Binary journal cache for tally.
//!
//! A parsed journal is serialized once into a compact, self-describing
//! image that loads back orders of magnitude faster than re-parsing the
//! textual source. The image records each source file's path and mtime;
//! [`BinaryCacheParser::parse`] refuses a stale image (returning 0
//! entries) so the caller regenerates from source.
//!
//! The format is single-stream and loaded whole: the account tree and
//! commodity table are linearized with dense 1-based idents, all pooled
//! strings are concentrated ahead of the fixed-shape entry records, and
//! the entry/posting/payload pool sizes are declared up front so the
//! loader can pre-size everything it builds.
//!
//! See [`journal`] for the image layout and [`wire`] for the primitive
//! encoding, including the guard-framing debug option and its distinct
//! magic word.

pub mod accounts;
pub mod amount;
pub mod arena;
pub mod commodities;
pub mod context;
pub mod error;
pub mod journal;
pub mod wire;

pub use error::{CacheError, Result};
pub use journal::{
    read_journal, write_journal, write_journal_file, BinaryCacheParser, CacheOptions,
};
pub use wire::{FORMAT_VERSION, MAGIC, MAGIC_GUARDED, NO_IDENT};
