//! The journal: root container of an accounting dataset.

use std::path::PathBuf;

use crate::account::AccountTree;
use crate::commodity::CommodityPool;
use crate::entry::{Entry, EntryIdx, Transaction, XactIdx};

/// A source file that fed this journal, with the modification time that
/// was recorded when it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Unix mtime at read time.
    pub mtime: i64,
}

/// Root container of an accounting dataset.
///
/// The journal owns the entry and posting pools for its whole lifetime.
/// Entries and accounts refer to postings by slot, never by owning
/// reference, so the account → posting → account cycle stays acyclic in
/// ownership terms.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    /// Files that fed this journal, in read order.
    pub sources: Vec<SourceFile>,
    pub accounts: AccountTree,
    pub commodities: CommodityPool,
    entries: Vec<Entry>,
    xacts: Vec<Transaction>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size the entry and posting pools. Cache loaders call this with
    /// the counts read from the image header before constructing objects.
    pub fn reserve_pools(&mut self, entries: usize, xacts: usize) {
        self.entries.reserve_exact(entries);
        self.xacts.reserve_exact(xacts);
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn xact_count(&self) -> usize {
        self.xacts.len()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry(&self, idx: EntryIdx) -> Option<&Entry> {
        self.entries.get(idx as usize)
    }

    pub fn xact(&self, idx: XactIdx) -> Option<&Transaction> {
        self.xacts.get(idx as usize)
    }

    pub fn xacts(&self) -> &[Transaction] {
        &self.xacts
    }

    /// Append an entry to the pool. Postings are added separately through
    /// [`Journal::add_transaction`].
    pub fn add_entry(&mut self, entry: Entry) -> EntryIdx {
        let idx = self.entries.len() as EntryIdx;
        self.entries.push(entry);
        idx
    }

    /// Append a posting, linking it into its entry's posting list and its
    /// account's back-reference list.
    ///
    /// `entry` must be a slot returned by [`Journal::add_entry`], and the
    /// posting's account a slot in this journal's tree.
    pub fn add_transaction(&mut self, entry: EntryIdx, xact: Transaction) -> XactIdx {
        let idx = self.xacts.len() as XactIdx;
        let account = xact.account;
        self.xacts.push(xact);
        self.entries[entry as usize].xacts.push(idx);
        self.accounts.add_transaction(account, idx);
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::quantity::Quantity;

    #[test]
    fn test_add_transaction_links_both_sides() {
        let mut journal = Journal::new();
        let cash = journal.accounts.find_or_create("Assets:Cash");
        let food = journal.accounts.find_or_create("Expenses:Food");
        let usd = journal.commodities.find_or_create("$");

        let entry = journal.add_entry(Entry {
            payee: "Grocery".into(),
            ..Entry::default()
        });
        let x0 = journal.add_transaction(
            entry,
            Transaction {
                account: food,
                amount: Amount::new(usd, Quantity::from_scaled_i64(1000, 2)),
                ..Transaction::default()
            },
        );
        let x1 = journal.add_transaction(
            entry,
            Transaction {
                account: cash,
                amount: Amount::new(usd, Quantity::from_scaled_i64(-1000, 2)),
                ..Transaction::default()
            },
        );

        assert_eq!(journal.entry(entry).unwrap().xacts, vec![x0, x1]);
        assert_eq!(journal.accounts.get(food).unwrap().xacts, vec![x0]);
        assert_eq!(journal.accounts.get(cash).unwrap().xacts, vec![x1]);
        assert_eq!(journal.xact_count(), 2);
    }
}
