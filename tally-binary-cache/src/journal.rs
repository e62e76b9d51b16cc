//! Journal cache driver: full-image write, and `test`/`parse` for the
//! parser registry.
//!
//! ## Image layout
//!
//! ```text
//! magic:            u32 LE = 0xFFEED765 (0xFFEED766 with guard framing)
//! version:          u32 LE = 0x00020019
//! file_count:       u16 LE
//! file_count × { path: string ; mtime: i64 LE }
//! account_count:    u32 LE
//! <master account>                (recursive, pre-order)
//! string_pool_size: u32 LE        (back-patched)
//! string_pool:      string_pool_size bytes
//! entry_count:      u32 LE
//! xact_count:       u32 LE
//! bigint_count:     u32 LE        (back-patched)
//! commodity_count:  u32 LE
//! commodity_count × <commodity record>
//! entry_count × <entry record>
//! ```
//!
//! The writer buffers the whole image, so the two back-patched fields
//! never require a seekable sink. The reader loads everything into
//! operation-local state first and only commits to the caller's journal
//! once every structural check has passed; a stale or mismatched cache
//! leaves the journal untouched.

use std::fs;
use std::io::{self, Read, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::debug;

use tally_core::{
    AccountIdx, Entry, Journal, JournalInput, JournalParser, SourceFile, Transaction,
    MASTER_ACCOUNT,
};

use crate::accounts::{self, LoadedAccount};
use crate::amount::write_amount;
use crate::arena::{self, Arena, StringPool};
use crate::commodities;
use crate::context::{ReadCx, WriteCx};
use crate::error::{CacheError, Result};
use crate::wire::{self, Encoder, FORMAT_VERSION, MAGIC, MAGIC_GUARDED};

/// Runtime options for the cache format.
///
/// Both peers must use the same settings; a guard-framed image carries a
/// distinct magic word, so a mismatch reads as "not a cache".
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheOptions {
    /// Bracket every string with guard constants (debugging aid).
    pub guards: bool,
}

impl CacheOptions {
    fn magic(self) -> u32 {
        if self.guards {
            MAGIC_GUARDED
        } else {
            MAGIC
        }
    }
}

// ============================================================================
// Write side
// ============================================================================

/// Serialize `journal` into `out`.
///
/// Each source path is stat'ed for its current mtime so a later
/// [`BinaryCacheParser::parse`] can detect staleness.
pub fn write_journal<W: Write>(out: &mut W, journal: &Journal, options: CacheOptions) -> Result<()> {
    let mut enc = Encoder::new(options.guards);
    let mut cx = WriteCx::new(journal.accounts.len(), journal.commodities.len());

    enc.put_u32(options.magic());
    enc.put_u32(FORMAT_VERSION);

    // Source file table: record each path with its on-disk mtime.
    let file_count = u16::try_from(journal.sources.len())
        .map_err(|_| CacheError::corrupt("more than 65535 source files"))?;
    enc.put_u16(file_count);
    for source in &journal.sources {
        enc.put_string(&source.path.to_string_lossy())?;
        enc.put_i64(file_mtime(&source.path)?);
    }

    // Account table.
    accounts::assign_idents(&journal.accounts, &mut cx);
    accounts::write_accounts(&mut enc, &journal.accounts, &cx)?;

    // String-pool phase: every pooled string is written here, ahead of the
    // records that reference it, and the pool length is back-patched.
    let pool_patch = enc.reserve_u32();
    let pool_start = enc.position();
    for entry in journal.entries() {
        enc.put_string(&entry.code)?;
        enc.put_string(&entry.payee)?;
        for &xi in &entry.xacts {
            cx.xact_count += 1;
            enc.put_string(&posting(journal, xi)?.note)?;
        }
    }
    enc.patch_u32(pool_patch, (enc.position() - pool_start) as u32);

    // Pool counts; the quantity payload total is back-patched once known.
    enc.put_u32(journal.entry_count() as u32);
    enc.put_u32(cx.xact_count);
    let bigints_patch = enc.reserve_u32();
    cx.bigints_count = 0;

    // Commodity table, then entries.
    commodities::assign_idents(&journal.commodities, &mut cx);
    commodities::write_commodities(&mut enc, &journal.commodities, &mut cx)?;
    for entry in journal.entries() {
        write_entry(&mut enc, journal, entry, &mut cx)?;
    }

    enc.patch_u32(bigints_patch, cx.bigints_count);

    let image = enc.into_bytes();
    out.write_all(&image)?;
    debug!(
        bytes = image.len(),
        entries = journal.entry_count(),
        postings = cx.xact_count,
        "wrote binary cache"
    );
    Ok(())
}

/// Serialize `journal` into a freshly created file at `path`.
pub fn write_journal_file(path: &Path, journal: &Journal, options: CacheOptions) -> Result<()> {
    let mut out = io::BufWriter::new(fs::File::create(path)?);
    write_journal(&mut out, journal, options)?;
    out.flush()?;
    Ok(())
}

fn write_entry(enc: &mut Encoder, journal: &Journal, entry: &Entry, cx: &mut WriteCx) -> Result<()> {
    enc.put_i64(entry.date);
    enc.put_u8(entry.state as u8);
    enc.put_u32(entry.xacts.len() as u32);
    for &xi in &entry.xacts {
        let xact = posting(journal, xi)?;
        enc.put_u32(cx.account_ident(xact.account)?);
        write_amount(enc, &xact.amount, cx)?;
        match &xact.cost {
            Some(cost) => {
                enc.put_u8(1);
                write_amount(enc, cost, cx)?;
            }
            None => enc.put_u8(0),
        }
        enc.put_u16(xact.flags);
        // The note already lives in the string pool.
    }
    Ok(())
}

fn posting(journal: &Journal, idx: tally_core::XactIdx) -> Result<&Transaction> {
    journal
        .xact(idx)
        .ok_or_else(|| CacheError::corrupt("entry references a posting outside the pool"))
}

fn file_mtime(path: &Path) -> Result<i64> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(match modified.duration_since(UNIX_EPOCH) {
        Ok(since) => since.as_secs() as i64,
        Err(before) => -(before.duration().as_secs() as i64),
    })
}

// ============================================================================
// Read side
// ============================================================================

/// Read a cache image into `journal`, continuing after the magic/version
/// words (normally consumed by [`BinaryCacheParser::test`]).
///
/// Returns the number of entries loaded; `Ok(0)` means the cache is not
/// usable -- the first recorded path differs from `original_file`, or some
/// source file is newer than recorded -- and `journal` is untouched. With
/// `master` given, the serialized top-level account is discarded and its
/// children are grafted under that account; otherwise the serialized
/// master's own fields are adopted by the journal's master.
pub fn read_journal<R: Read + ?Sized>(
    input: &mut R,
    journal: &mut Journal,
    master: Option<AccountIdx>,
    original_file: Option<&Path>,
    options: CacheOptions,
) -> Result<usize> {
    let guards = options.guards;
    let attach = master.unwrap_or(MASTER_ACCOUNT);
    if journal.accounts.get(attach).is_none() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("master slot {attach} is not in the journal"),
        )
        .into());
    }

    // Source file table, with staleness gating before anything is built.
    let file_count = wire::read_u16(input)?;
    let mut sources = Vec::with_capacity(file_count as usize);
    for i in 0..file_count {
        let path = PathBuf::from(wire::read_string(input, guards)?);
        let recorded_mtime = wire::read_i64(input)?;
        if i == 0 {
            if let Some(expected) = original_file {
                if path.as_path() != expected {
                    debug!(
                        recorded = %path.display(),
                        expected = %expected.display(),
                        "cache is for a different journal file"
                    );
                    return Ok(0);
                }
            }
        }
        if file_mtime(&path)? > recorded_mtime {
            debug!(path = %path.display(), "cache is stale; source was modified");
            return Ok(0);
        }
        sources.push(SourceFile {
            path,
            mtime: recorded_mtime,
        });
    }

    // Account tree, read into local records.
    let loaded_accounts = accounts::read_accounts(input, guards)?;

    // String pool, read whole; the cursor is threaded through the entries.
    let mut pool = StringPool::read_from(input, guards)?;

    // Pool counts, then the ident → final-slot plans.
    let header = arena::read_pool_header(input)?;
    let mut cx = ReadCx::new(guards);
    cx.accounts = plan_account_slots(journal, attach, &loaded_accounts);

    // Commodities must precede entries: posting amounts reference them.
    let loaded_commodities = commodities::read_commodities(input, &mut cx, journal)?;

    // Entries and postings.
    let loaded = arena::read_entries(input, &header, &mut pool, &mut cx)?;
    pool.finish()?;

    // Everything validated; merge into the caller's journal.
    commit(
        journal,
        attach,
        master.is_none(),
        sources,
        loaded_accounts,
        &cx.accounts,
        loaded_commodities,
        loaded,
    )?;

    debug!(
        entries = header.entry_count,
        postings = header.xact_count,
        accounts = cx.accounts.len(),
        commodities = cx.commodities.len(),
        "loaded binary cache"
    );
    Ok(header.entry_count as usize)
}

/// Plan the journal slot each serialized account will land in.
///
/// Mirrors the graft walk in [`commit`]: a loaded account whose target
/// parent already has a child of the same name reuses that child's slot;
/// everything else is appended in pre-order.
fn plan_account_slots(
    journal: &Journal,
    attach: AccountIdx,
    loaded: &[LoadedAccount],
) -> Vec<AccountIdx> {
    let mut map = vec![0; loaded.len()];
    if loaded.is_empty() {
        return map;
    }
    map[0] = attach;
    let mut next = journal.accounts.len() as AccountIdx;
    plan_subtree(journal, loaded, 0, Some(attach), &mut map, &mut next);
    map
}

fn plan_subtree(
    journal: &Journal,
    loaded: &[LoadedAccount],
    local: u32,
    target: Option<AccountIdx>,
    map: &mut [AccountIdx],
    next: &mut AccountIdx,
) {
    for &child in &loaded[local as usize].children {
        let name = &loaded[child as usize].name;
        let existing = target
            .and_then(|t| journal.accounts.get(t))
            .and_then(|a| a.children.get(name))
            .copied();
        match existing {
            Some(slot) => {
                map[child as usize] = slot;
                plan_subtree(journal, loaded, child, Some(slot), map, next);
            }
            None => {
                map[child as usize] = *next;
                *next += 1;
                plan_subtree(journal, loaded, child, None, map, next);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn commit(
    journal: &mut Journal,
    attach: AccountIdx,
    adopt_master: bool,
    sources: Vec<SourceFile>,
    mut loaded_accounts: Vec<LoadedAccount>,
    account_map: &[AccountIdx],
    loaded_commodities: Vec<tally_core::Commodity>,
    arena: Arena,
) -> Result<()> {
    journal.sources.extend(sources);

    if adopt_master {
        let name = std::mem::take(&mut loaded_accounts[0].name);
        let note = std::mem::take(&mut loaded_accounts[0].note);
        let master = journal.accounts.master_mut();
        master.name = name;
        master.note = note;
    }
    graft_children(journal, &mut loaded_accounts, 0, attach, account_map);

    for commodity in loaded_commodities {
        // Freshness was checked while reading; re-map the error anyway.
        journal
            .commodities
            .insert(commodity)
            .map_err(|e| CacheError::corrupt(e.to_string()))?;
    }

    journal.reserve_pools(arena.entries.len(), arena.xacts.len());
    let mut xacts = arena.xacts.into_iter();
    for entry in arena.entries {
        let entry_idx = journal.add_entry(Entry {
            date: entry.date,
            state: entry.state,
            code: entry.code,
            payee: entry.payee,
            xacts: Vec::with_capacity(entry.xact_count as usize),
        });
        for _ in 0..entry.xact_count {
            let xact = xacts
                .next()
                .ok_or_else(|| CacheError::corrupt("posting pool exhausted during commit"))?;
            journal.add_transaction(
                entry_idx,
                Transaction {
                    account: xact.account,
                    amount: xact.amount,
                    cost: xact.cost,
                    flags: xact.flags,
                    note: xact.note,
                },
            );
        }
    }
    Ok(())
}

fn graft_children(
    journal: &mut Journal,
    loaded: &mut [LoadedAccount],
    local: u32,
    target: AccountIdx,
    map: &[AccountIdx],
) {
    let children = loaded[local as usize].children.clone();
    for child in children {
        let name = std::mem::take(&mut loaded[child as usize].name);
        let note = std::mem::take(&mut loaded[child as usize].note);
        let idx = journal.accounts.add_account(target, name);
        debug_assert_eq!(idx, map[child as usize], "graft diverged from plan");
        if let Some(account) = journal.accounts.get_mut(idx) {
            account.note = note;
        }
        graft_children(journal, loaded, child, idx, map);
    }
}

// ============================================================================
// Parser registration
// ============================================================================

/// The binary cache as a registry parser: `test` probes the magic and
/// version words, `parse` loads the rest of the stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCacheParser {
    options: CacheOptions,
}

impl BinaryCacheParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CacheOptions) -> Self {
        Self { options }
    }
}

impl JournalParser for BinaryCacheParser {
    fn test(&self, input: &mut dyn JournalInput) -> io::Result<bool> {
        let mut header = [0u8; 8];
        if input.read_exact(&mut header).is_err() {
            input.seek(SeekFrom::Start(0))?;
            return Ok(false);
        }
        let magic = u32::from_le_bytes(header[0..4].try_into().unwrap());
        let version = u32::from_le_bytes(header[4..8].try_into().unwrap());
        if magic == self.options.magic() && version == FORMAT_VERSION {
            Ok(true)
        } else {
            input.seek(SeekFrom::Start(0))?;
            Ok(false)
        }
    }

    fn parse(
        &self,
        input: &mut dyn JournalInput,
        journal: &mut Journal,
        master: Option<AccountIdx>,
        original_file: Option<&Path>,
    ) -> tally_core::Result<usize> {
        read_journal(input, journal, master, original_file, self.options).map_err(|e| match e {
            CacheError::Io(io_err) => tally_core::Error::Io(io_err),
            other => tally_core::Error::Parse(other.to_string()),
        })
    }
}
