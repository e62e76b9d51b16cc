//! # Tally Core
//!
//! Domain model for the tally accounting engine: journals, accounts,
//! commodities, entries, postings, and arbitrary-precision quantities.
//!
//! This crate is format-agnostic. Readers and writers (the text parser,
//! the binary cache) live in sibling crates and drive these types through
//! the registry in [`parse`].
//!
//! ## Design Principles
//!
//! 1. **Index-addressed graphs**: accounts, commodities, entries, and
//!    postings live in pools owned by the [`Journal`]; cross-references
//!    are slot indices, never owning pointers, so the account ↔ posting
//!    cycle carries no ownership cycle.
//! 2. **Journal-scoped state**: there is no process-global commodity map;
//!    each journal owns its [`CommodityPool`].
//! 3. **Opaque quantities**: the [`quantity`] module owns the
//!    arbitrary-precision payload wire shape; serializers never inspect a
//!    mantissa.

pub mod account;
pub mod amount;
pub mod commodity;
pub mod entry;
pub mod error;
pub mod journal;
pub mod parse;
pub mod quantity;

// Re-export main types
pub use account::{Account, AccountIdx, AccountTree, MASTER_ACCOUNT};
pub use amount::Amount;
pub use commodity::{Commodity, CommodityIdx, CommodityPool, NULL_COMMODITY};
pub use entry::{Entry, EntryIdx, EntryState, Transaction, XactIdx};
pub use error::{Error, Result};
pub use journal::{Journal, SourceFile};
pub use parse::{JournalInput, JournalParser, ParserRegistry};
pub use quantity::{read_quantity, write_quantity, Quantity};
