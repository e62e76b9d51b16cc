//! Per-call codec state.
//!
//! All bookkeeping a codec invocation needs -- ident side tables, the
//! deferred counters, the read-side ident → slot maps -- lives in one
//! context object created per call. Nothing is process-wide, so codec
//! invocations on different journals cannot interfere.

use tally_core::{AccountIdx, CommodityIdx, NULL_COMMODITY};

use crate::error::{CacheError, Result};
use crate::wire::NO_IDENT;

/// Write-side context: ident side tables and deferred counters.
///
/// Idents are assigned into side tables before any record is written, so
/// serialization never mutates live accounts or commodities and forward
/// references (a commodity priced in a commodity serialized later) resolve
/// correctly.
pub struct WriteCx {
    /// Account slot → assigned ident; 0 = not part of the written tree.
    account_idents: Vec<u32>,
    /// Commodity slot → assigned ident; the null commodity stays 0.
    commodity_idents: Vec<u32>,
    next_account_ident: u32,
    next_commodity_ident: u32,
    /// Quantities serialized since the bigint placeholder was reserved.
    pub bigints_count: u32,
    /// Postings tallied during the string-pool phase.
    pub xact_count: u32,
}

impl WriteCx {
    pub fn new(account_slots: usize, commodity_slots: usize) -> Self {
        Self {
            account_idents: vec![0; account_slots],
            commodity_idents: vec![0; commodity_slots],
            next_account_ident: 0,
            next_commodity_ident: 0,
            bigints_count: 0,
            xact_count: 0,
        }
    }

    /// Assign the next dense account ident to `slot`.
    pub fn assign_account_ident(&mut self, slot: AccountIdx) -> u32 {
        self.next_account_ident += 1;
        self.account_idents[slot as usize] = self.next_account_ident;
        self.next_account_ident
    }

    /// The ident assigned to an account slot.
    pub fn account_ident(&self, slot: AccountIdx) -> Result<u32> {
        match self.account_idents.get(slot as usize) {
            Some(&ident) if ident != 0 => Ok(ident),
            _ => Err(CacheError::Corrupt(format!(
                "posting references account slot {slot} outside the written tree"
            ))),
        }
    }

    /// Assign the next dense commodity ident to `slot`.
    pub fn assign_commodity_ident(&mut self, slot: CommodityIdx) -> u32 {
        self.next_commodity_ident += 1;
        self.commodity_idents[slot as usize] = self.next_commodity_ident;
        self.next_commodity_ident
    }

    /// The ident assigned to a commodity slot (never the sentinel).
    pub fn commodity_ident(&self, slot: CommodityIdx) -> Result<u32> {
        match self.commodity_idents.get(slot as usize) {
            Some(&ident) if ident != 0 => Ok(ident),
            _ => Err(CacheError::Corrupt(format!(
                "amount references commodity slot {slot} outside the pool"
            ))),
        }
    }

    /// The on-wire ident for an amount's commodity: the null commodity
    /// serializes as the "none" sentinel.
    pub fn commodity_wire_ident(&self, slot: CommodityIdx) -> Result<u32> {
        if slot == NULL_COMMODITY {
            return Ok(NO_IDENT);
        }
        self.commodity_ident(slot)
    }
}

/// Read-side context: ident → journal-slot maps and the payload counter.
///
/// The maps are planned before the records that use them are read, so
/// loaded objects are materialized with their final journal slots baked
/// in; the commit step only has to append them.
pub struct ReadCx {
    /// Account ident - 1 → target journal slot.
    pub accounts: Vec<AccountIdx>,
    /// Commodity ident - 1 → target journal slot.
    pub commodities: Vec<CommodityIdx>,
    /// Quantities deserialized so far.
    pub bigints_read: u32,
    pub guards: bool,
}

impl ReadCx {
    pub fn new(guards: bool) -> Self {
        Self {
            accounts: Vec::new(),
            commodities: Vec::new(),
            bigints_read: 0,
            guards,
        }
    }

    /// Resolve a 1-based account ident from the stream.
    pub fn account_slot(&self, ident: u32) -> Result<AccountIdx> {
        self.accounts
            .get(ident.wrapping_sub(1) as usize)
            .copied()
            .ok_or_else(|| {
                CacheError::Corrupt(format!(
                    "account ident {ident} out of range (1..={})",
                    self.accounts.len()
                ))
            })
    }

    /// Resolve a 1-based commodity ident from the stream; the "none"
    /// sentinel maps to the null commodity.
    pub fn commodity_slot(&self, ident: u32) -> Result<CommodityIdx> {
        if ident == NO_IDENT {
            return Ok(NULL_COMMODITY);
        }
        self.commodities
            .get(ident.wrapping_sub(1) as usize)
            .copied()
            .ok_or_else(|| {
                CacheError::Corrupt(format!(
                    "commodity ident {ident} out of range (1..={})",
                    self.commodities.len()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idents_are_dense_and_one_based() {
        let mut cx = WriteCx::new(3, 2);
        assert_eq!(cx.assign_account_ident(0), 1);
        assert_eq!(cx.assign_account_ident(2), 2);
        assert_eq!(cx.account_ident(0).unwrap(), 1);
        assert_eq!(cx.account_ident(2).unwrap(), 2);
        assert!(cx.account_ident(1).is_err());
    }

    #[test]
    fn test_null_commodity_writes_sentinel() {
        let mut cx = WriteCx::new(0, 2);
        cx.assign_commodity_ident(1);
        assert_eq!(cx.commodity_wire_ident(NULL_COMMODITY).unwrap(), NO_IDENT);
        assert_eq!(cx.commodity_wire_ident(1).unwrap(), 1);
    }

    #[test]
    fn test_read_ident_bounds() {
        let mut cx = ReadCx::new(false);
        cx.accounts = vec![5, 7];
        cx.commodities = vec![3];
        assert_eq!(cx.account_slot(1).unwrap(), 5);
        assert_eq!(cx.account_slot(2).unwrap(), 7);
        assert!(cx.account_slot(0).is_err());
        assert!(cx.account_slot(3).is_err());
        assert_eq!(cx.commodity_slot(NO_IDENT).unwrap(), NULL_COMMODITY);
        assert_eq!(cx.commodity_slot(1).unwrap(), 3);
        assert!(cx.commodity_slot(2).is_err());
    }
}
