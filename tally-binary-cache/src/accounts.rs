//! Account tree codec.
//!
//! The tree is written as a counted pre-order walk from the master
//! account, each record carrying the ident assigned during the walk:
//!
//! ```text
//! account_count: u32 LE
//! per account (recursive, pre-order):
//!   ident:        u32 LE   dense, 1-based, in write order
//!   parent_ident: u32 LE   or 0xFFFFFFFF for the master
//!   name:         string
//!   note:         string
//!   depth:        u16 LE
//!   child_count:  u32 LE
//!   <children, in name order>
//! ```
//!
//! Because idents are assigned in the same pre-order the records are
//! written in, the reader can index records by `ident - 1` and requires
//! exactly that: an out-of-order ident is structural corruption. Parents
//! always precede their children.

use std::io::Read;

use tally_core::{AccountIdx, AccountTree, MASTER_ACCOUNT};

use crate::context::WriteCx;
use crate::error::{CacheError, Result};
use crate::wire::{self, Encoder, NO_IDENT};

// ============================================================================
// Write side
// ============================================================================

/// Assign pre-order idents to the master account and every descendant.
pub fn assign_idents(tree: &AccountTree, cx: &mut WriteCx) {
    assign_subtree(tree, MASTER_ACCOUNT, cx);
}

fn assign_subtree(tree: &AccountTree, idx: AccountIdx, cx: &mut WriteCx) {
    cx.assign_account_ident(idx);
    if let Some(account) = tree.get(idx) {
        for &child in account.children.values() {
            assign_subtree(tree, child, cx);
        }
    }
}

/// Write the counted account table. [`assign_idents`] must have run.
pub fn write_accounts(enc: &mut Encoder, tree: &AccountTree, cx: &WriteCx) -> Result<()> {
    enc.put_u32(count_accounts(tree, MASTER_ACCOUNT));
    write_account(enc, tree, MASTER_ACCOUNT, cx)
}

fn count_accounts(tree: &AccountTree, idx: AccountIdx) -> u32 {
    let mut count = 1;
    if let Some(account) = tree.get(idx) {
        for &child in account.children.values() {
            count += count_accounts(tree, child);
        }
    }
    count
}

fn write_account(enc: &mut Encoder, tree: &AccountTree, idx: AccountIdx, cx: &WriteCx) -> Result<()> {
    let account = tree
        .get(idx)
        .ok_or_else(|| CacheError::corrupt("account slot vanished during write"))?;

    enc.put_u32(cx.account_ident(idx)?);
    match account.parent {
        Some(parent) => enc.put_u32(cx.account_ident(parent)?),
        None => enc.put_u32(NO_IDENT),
    }
    enc.put_string(&account.name)?;
    enc.put_string(&account.note)?;
    enc.put_u16(account.depth);
    enc.put_u32(account.children.len() as u32);

    for &child in account.children.values() {
        write_account(enc, tree, child, cx)?;
    }
    Ok(())
}

// ============================================================================
// Read side
// ============================================================================

/// An account record as read from the stream. Tree structure is by local
/// position (`ident - 1`); `children` preserves the serialized name order.
#[derive(Debug)]
pub struct LoadedAccount {
    pub parent: Option<u32>,
    pub name: String,
    pub note: String,
    pub depth: u16,
    pub children: Vec<u32>,
}

/// Read the counted account table into local records.
pub fn read_accounts<R: Read + ?Sized>(input: &mut R, guards: bool) -> Result<Vec<LoadedAccount>> {
    let count = wire::read_u32(input)?;
    if count == 0 {
        return Err(CacheError::corrupt("account table is empty (no master)"));
    }
    let mut accounts = Vec::with_capacity(count as usize);
    read_account(input, guards, count, &mut accounts)?;
    if accounts.len() as u32 != count {
        return Err(CacheError::Corrupt(format!(
            "account table holds {} records, header declared {count}",
            accounts.len()
        )));
    }
    Ok(accounts)
}

fn read_account<R: Read + ?Sized>(
    input: &mut R,
    guards: bool,
    total: u32,
    accounts: &mut Vec<LoadedAccount>,
) -> Result<u32> {
    let expected = accounts.len() as u32 + 1;
    if expected > total {
        return Err(CacheError::Corrupt(format!(
            "account table overruns the declared count of {total}"
        )));
    }

    let ident = wire::read_u32(input)?;
    if ident != expected {
        return Err(CacheError::Corrupt(format!(
            "account ident {ident} out of order, expected {expected}"
        )));
    }

    let parent_ident = wire::read_u32(input)?;
    let parent = if parent_ident == NO_IDENT {
        None
    } else {
        if parent_ident >= ident {
            return Err(CacheError::Corrupt(format!(
                "account {ident} references parent {parent_ident} which does not precede it"
            )));
        }
        Some(parent_ident - 1)
    };

    let name = wire::read_string(input, guards)?;
    let note = wire::read_string(input, guards)?;
    let depth = wire::read_u16(input)?;
    let child_count = wire::read_u32(input)?;

    let slot = accounts.len() as u32;
    accounts.push(LoadedAccount {
        parent,
        name,
        note,
        depth,
        children: Vec::new(),
    });

    for _ in 0..child_count {
        let child = read_account(input, guards, total, accounts)?;
        accounts[slot as usize].children.push(child);
    }
    Ok(slot)
}
