//! Arena loader: pre-sized pools, the string pool, and entry records.
//!
//! The pool header declares exactly how many entries, postings, and
//! quantity payloads follow:
//!
//! ```text
//! string_pool_size: u32 LE     (back-patched by the writer)
//! string_pool:      string_pool_size bytes
//! entry_count:      u32 LE
//! xact_count:       u32 LE
//! bigint_count:     u32 LE     (back-patched by the writer)
//! ```
//!
//! and, after the commodity table, `entry_count` records:
//!
//! ```text
//! date:       i64 LE
//! state:      u8
//! xact_count: u32 LE
//! xact_count × {
//!   account_ident: u32 LE
//!   amount:        amount
//!   has_cost:      u8        0 or 1
//!   [cost:         amount]
//!   flags:         u16 LE
//! }
//! ```
//!
//! Entry `code` and `payee` and posting `note` are not part of these
//! records: they were written into the string pool ahead of them and are
//! consumed from the pool cursor in the same order here. The declared
//! counts are authoritative -- the loader refuses to construct past them
//! and verifies every count, including the exact exhaustion of the string
//! pool, before the load can commit.

use std::io::Read;

use tally_core::entry::xact_flags;
use tally_core::{AccountIdx, Amount, EntryState};

use crate::amount::read_amount;
use crate::context::ReadCx;
use crate::error::{CacheError, Result};
use crate::wire::{self, take_string};

/// The three pool counts read up front from the image.
#[derive(Debug, Clone, Copy)]
pub struct PoolHeader {
    pub entry_count: u32,
    pub xact_count: u32,
    pub bigint_count: u32,
}

pub fn read_pool_header<R: Read + ?Sized>(input: &mut R) -> Result<PoolHeader> {
    Ok(PoolHeader {
        entry_count: wire::read_u32(input)?,
        xact_count: wire::read_u32(input)?,
        bigint_count: wire::read_u32(input)?,
    })
}

// ============================================================================
// String pool
// ============================================================================

/// The pooled-string region, read as one block and consumed by cursor.
pub struct StringPool {
    bytes: Vec<u8>,
    pos: usize,
    guards: bool,
}

impl StringPool {
    /// Read the declared pool size and then the whole region.
    pub fn read_from<R: Read + ?Sized>(input: &mut R, guards: bool) -> Result<Self> {
        let size = wire::read_u32(input)? as usize;
        let mut bytes = vec![0u8; size];
        input.read_exact(&mut bytes)?;
        Ok(Self {
            bytes,
            pos: 0,
            guards,
        })
    }

    /// Materialize the next pooled string.
    pub fn next_string(&mut self) -> Result<String> {
        take_string(&self.bytes, &mut self.pos, self.guards)
    }

    /// Verify the cursor consumed the pool exactly.
    pub fn finish(&self) -> Result<()> {
        if self.pos != self.bytes.len() {
            return Err(CacheError::Corrupt(format!(
                "string pool cursor stopped at byte {} of {}",
                self.pos,
                self.bytes.len()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Entry and posting pools
// ============================================================================

/// An entry record with its strings already materialized. Its postings are
/// the next `xact_count` records of the posting pool.
#[derive(Debug)]
pub struct LoadedEntry {
    pub date: i64,
    pub state: EntryState,
    pub code: String,
    pub payee: String,
    pub xact_count: u32,
}

/// A posting record with its account and commodity slots already resolved
/// to the target journal.
#[derive(Debug)]
pub struct LoadedXact {
    pub account: AccountIdx,
    pub amount: Amount,
    pub cost: Option<Amount>,
    pub flags: u16,
    pub note: String,
}

/// The loaded entry and posting pools, bounded by the header counts.
#[derive(Debug)]
pub struct Arena {
    pub entries: Vec<LoadedEntry>,
    pub xacts: Vec<LoadedXact>,
}

/// Read `entry_count` entry records and their postings, threading the
/// string-pool cursor through each, and verify pool exactness.
pub fn read_entries<R: Read + ?Sized>(
    input: &mut R,
    header: &PoolHeader,
    pool: &mut StringPool,
    cx: &mut ReadCx,
) -> Result<Arena> {
    let mut arena = Arena {
        entries: Vec::with_capacity(header.entry_count as usize),
        xacts: Vec::with_capacity(header.xact_count as usize),
    };

    for _ in 0..header.entry_count {
        let date = wire::read_i64(input)?;
        let state_raw = wire::read_u8(input)?;
        let state = EntryState::from_u8(state_raw)
            .ok_or_else(|| CacheError::Corrupt(format!("invalid entry state {state_raw}")))?;
        let code = pool.next_string()?;
        let payee = pool.next_string()?;
        let xact_count = wire::read_u32(input)?;

        arena.entries.push(LoadedEntry {
            date,
            state,
            code,
            payee,
            xact_count,
        });

        for _ in 0..xact_count {
            if arena.xacts.len() as u32 == header.xact_count {
                return Err(CacheError::Corrupt(format!(
                    "posting pool overruns the declared count of {}",
                    header.xact_count
                )));
            }
            let xact = read_transaction(input, pool, cx)?;
            arena.xacts.push(xact);
        }
    }

    if arena.xacts.len() as u32 != header.xact_count {
        return Err(CacheError::Corrupt(format!(
            "posting pool holds {} records, header declared {}",
            arena.xacts.len(),
            header.xact_count
        )));
    }
    if cx.bigints_read != header.bigint_count {
        return Err(CacheError::Corrupt(format!(
            "read {} quantity payloads, header declared {}",
            cx.bigints_read, header.bigint_count
        )));
    }
    Ok(arena)
}

fn read_transaction<R: Read + ?Sized>(
    input: &mut R,
    pool: &mut StringPool,
    cx: &mut ReadCx,
) -> Result<LoadedXact> {
    let account = cx.account_slot(wire::read_u32(input)?)?;
    let amount = read_amount(input, cx)?;
    let cost = match wire::read_u8(input)? {
        0 => None,
        1 => Some(read_amount(input, cx)?),
        other => {
            return Err(CacheError::Corrupt(format!(
                "invalid cost marker {other}"
            )))
        }
    };
    let flags = wire::read_u16(input)?;
    let note = pool.next_string()?;

    Ok(LoadedXact {
        account,
        amount,
        cost,
        // Postings materialized from the cache live in the journal's
        // posting pool, never free-standing.
        flags: flags | xact_flags::BULK_ALLOC,
        note,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Encoder;

    #[test]
    fn test_string_pool_must_be_exhausted() {
        let mut enc = Encoder::new(false);
        enc.put_string("first").unwrap();
        enc.put_string("second").unwrap();
        let body = enc.into_bytes();

        let mut image = Encoder::new(false);
        image.put_u32(body.len() as u32);
        let mut image = image.into_bytes();
        image.extend_from_slice(&body);

        let mut pool = StringPool::read_from(&mut image.as_slice(), false).unwrap();
        assert_eq!(pool.next_string().unwrap(), "first");
        assert!(pool.finish().is_err());
        assert_eq!(pool.next_string().unwrap(), "second");
        pool.finish().unwrap();
    }

    #[test]
    fn test_pool_shorter_than_declared() {
        let mut enc = Encoder::new(false);
        enc.put_u32(100);
        enc.put_u8(0);
        let image = enc.into_bytes();
        assert!(StringPool::read_from(&mut image.as_slice(), false).is_err());
    }

    #[test]
    fn test_invalid_state_rejected() {
        let header = PoolHeader {
            entry_count: 1,
            xact_count: 0,
            bigint_count: 0,
        };
        let mut enc = Encoder::new(false);
        enc.put_i64(0);
        enc.put_u8(9); // no such state
        let image = enc.into_bytes();

        let mut pool = StringPool {
            bytes: Vec::new(),
            pos: 0,
            guards: false,
        };
        let mut cx = ReadCx::new(false);
        let err = read_entries(&mut image.as_slice(), &header, &mut pool, &mut cx).unwrap_err();
        assert!(matches!(err, CacheError::Corrupt(_)));
    }

    #[test]
    fn test_posting_overrun_rejected() {
        // One entry claiming two postings against a header allowing one.
        let header = PoolHeader {
            entry_count: 1,
            xact_count: 1,
            bigint_count: 2,
        };
        let mut strings = Encoder::new(false);
        strings.put_string("").unwrap(); // code
        strings.put_string("payee").unwrap();
        strings.put_string("").unwrap(); // note of the first posting
        let mut pool = StringPool {
            bytes: strings.into_bytes(),
            pos: 0,
            guards: false,
        };

        let mut enc = Encoder::new(false);
        enc.put_i64(0);
        enc.put_u8(0);
        enc.put_u32(2); // two postings
        for _ in 0..2 {
            enc.put_u32(1); // account ident
            enc.put_u32(crate::wire::NO_IDENT);
            enc.put_u16(0); // empty quantity magnitude
            enc.put_u8(0); // sign
            enc.put_u8(0); // precision
            enc.put_u8(0); // no cost
            enc.put_u16(0); // flags
        }
        let image = enc.into_bytes();

        let mut cx = ReadCx::new(false);
        cx.accounts = vec![0];
        let err = read_entries(&mut image.as_slice(), &header, &mut pool, &mut cx).unwrap_err();
        assert!(matches!(err, CacheError::Corrupt(msg) if msg.contains("overruns")));
    }
}
