//! Entries and their postings.

use chrono::{DateTime, Utc};

use crate::account::AccountIdx;
use crate::amount::Amount;

/// Slot index into a journal's entry pool.
pub type EntryIdx = u32;

/// Slot index into a journal's posting pool.
pub type XactIdx = u32;

/// Clearing state of an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryState {
    #[default]
    Uncleared = 0,
    Cleared = 1,
    Pending = 2,
}

impl EntryState {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Uncleared),
            1 => Some(Self::Cleared),
            2 => Some(Self::Pending),
            _ => None,
        }
    }
}

/// Posting flags.
pub mod xact_flags {
    /// Virtual posting, excluded from real balances.
    pub const VIRTUAL: u16 = 0x0001;
    /// Virtual posting that must still balance.
    pub const BALANCE: u16 = 0x0002;
    /// Generated by an automated entry.
    pub const AUTO: u16 = 0x0004;
    /// Storage is pool-owned; set by cache loaders on every posting they
    /// materialize.
    pub const BULK_ALLOC: u16 = 0x0010;
}

/// A dated accounting event: an ordered set of postings.
///
/// Postings must balance to zero; balancing is enforced by the text
/// parser, not re-checked here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entry {
    /// Unix time of the entry date.
    pub date: i64,
    pub state: EntryState,
    pub code: String,
    pub payee: String,
    /// Postings in source order; slots in the journal posting pool.
    pub xacts: Vec<XactIdx>,
}

impl Entry {
    /// The entry date as a UTC datetime.
    pub fn date_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.date, 0).unwrap_or_default()
    }
}

/// A single posting against an account.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    pub account: AccountIdx,
    pub amount: Amount,
    /// Cost basis, when the posting was priced in another commodity.
    pub cost: Option<Amount>,
    /// Bit set from [`xact_flags`].
    pub flags: u16,
    pub note: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_from_u8() {
        assert_eq!(EntryState::from_u8(0), Some(EntryState::Uncleared));
        assert_eq!(EntryState::from_u8(1), Some(EntryState::Cleared));
        assert_eq!(EntryState::from_u8(2), Some(EntryState::Pending));
        assert_eq!(EntryState::from_u8(3), None);
    }

    #[test]
    fn test_date_utc() {
        let entry = Entry {
            date: chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                .and_utc()
                .timestamp(),
            ..Entry::default()
        };
        assert_eq!(entry.date_utc().date_naive().to_string(), "2024-01-15");
    }
}
