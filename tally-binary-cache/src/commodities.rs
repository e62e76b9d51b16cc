//! Commodity table codec.
//!
//! ```text
//! commodity_count: u32 LE        excludes the null commodity
//! per commodity, in symbol order:
//!   ident:        u32 LE         dense, 1-based, in write order
//!   symbol:       string         non-empty
//!   name:         string
//!   note:         string
//!   precision:    u8
//!   flags:        u16 LE
//!   history_size: u32 LE
//!   history_size × { when: i64 LE ; price: amount }
//!   last_lookup:  i64 LE
//!   conversion:   amount
//! ```
//!
//! The table is read before any entry so posting amounts can resolve
//! commodity idents. History and conversion amounts may themselves
//! reference any commodity in the table -- including one serialized later --
//! which is why the read side plans the full ident → slot map before
//! decoding the first record.

use std::collections::BTreeSet;
use std::io::Read;

use tally_core::{Commodity, CommodityPool, Journal};

use crate::amount::{read_amount, write_amount};
use crate::context::{ReadCx, WriteCx};
use crate::error::{CacheError, Result};
use crate::wire::{self, Encoder};

// ============================================================================
// Write side
// ============================================================================

/// Assign dense idents to every non-null commodity, in symbol order.
pub fn assign_idents(pool: &CommodityPool, cx: &mut WriteCx) {
    for (slot, commodity) in pool.iter_by_symbol() {
        if !commodity.symbol.is_empty() {
            cx.assign_commodity_ident(slot);
        }
    }
}

/// Write the counted commodity table. [`assign_idents`] must have run.
pub fn write_commodities(enc: &mut Encoder, pool: &CommodityPool, cx: &mut WriteCx) -> Result<()> {
    enc.put_u32(pool.len() as u32 - 1);
    for (slot, commodity) in pool.iter_by_symbol() {
        if commodity.symbol.is_empty() {
            continue;
        }
        write_commodity(enc, slot, commodity, cx)?;
    }
    Ok(())
}

fn write_commodity(
    enc: &mut Encoder,
    slot: tally_core::CommodityIdx,
    commodity: &Commodity,
    cx: &mut WriteCx,
) -> Result<()> {
    enc.put_u32(cx.commodity_ident(slot)?);
    enc.put_string(&commodity.symbol)?;
    enc.put_string(&commodity.name)?;
    enc.put_string(&commodity.note)?;
    enc.put_u8(commodity.precision);
    enc.put_u16(commodity.flags);

    enc.put_u32(commodity.history.len() as u32);
    for (&when, price) in &commodity.history {
        enc.put_i64(when);
        write_amount(enc, price, cx)?;
    }

    enc.put_i64(commodity.last_lookup);
    write_amount(enc, &commodity.conversion, cx)?;
    Ok(())
}

// ============================================================================
// Read side
// ============================================================================

/// Read the commodity table into local records and plan the ident → slot
/// map in `cx`.
///
/// Every symbol must be fresh with respect to both the table itself and
/// the target journal's pool.
pub fn read_commodities<R: Read + ?Sized>(
    input: &mut R,
    cx: &mut ReadCx,
    journal: &Journal,
) -> Result<Vec<Commodity>> {
    let count = wire::read_u32(input)?;

    // Loaded commodities will be appended to the pool in ident order, so
    // their final slots are known before the first record is decoded.
    let base = journal.commodities.len() as u32;
    cx.commodities = (0..count).map(|i| base + i).collect();

    let mut seen = BTreeSet::new();
    let mut loaded = Vec::with_capacity(count as usize);
    for i in 0..count {
        let commodity = read_commodity(input, cx, i + 1)?;
        if commodity.symbol.is_empty() {
            return Err(CacheError::corrupt(
                "commodity table contains the null commodity",
            ));
        }
        if journal.commodities.find(&commodity.symbol).is_some()
            || !seen.insert(commodity.symbol.clone())
        {
            return Err(CacheError::DuplicateCommodity(commodity.symbol));
        }
        loaded.push(commodity);
    }
    Ok(loaded)
}

fn read_commodity<R: Read + ?Sized>(
    input: &mut R,
    cx: &mut ReadCx,
    expected_ident: u32,
) -> Result<Commodity> {
    let ident = wire::read_u32(input)?;
    if ident != expected_ident {
        return Err(CacheError::Corrupt(format!(
            "commodity ident {ident} out of order, expected {expected_ident}"
        )));
    }

    let symbol = wire::read_string(input, cx.guards)?;
    let name = wire::read_string(input, cx.guards)?;
    let note = wire::read_string(input, cx.guards)?;
    let precision = wire::read_u8(input)?;
    let flags = wire::read_u16(input)?;

    let history_size = wire::read_u32(input)?;
    let mut commodity = Commodity {
        symbol,
        name,
        note,
        precision,
        flags,
        ..Commodity::default()
    };
    for _ in 0..history_size {
        let when = wire::read_i64(input)?;
        let price = read_amount(input, cx)?;
        commodity.history.insert(when, price);
    }

    commodity.last_lookup = wire::read_i64(input)?;
    commodity.conversion = read_amount(input, cx)?;
    Ok(commodity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{commodity::flags, Amount, Quantity};

    fn sample_pool() -> CommodityPool {
        let mut pool = CommodityPool::new();
        let usd = pool.find_or_create("$");
        {
            let c = pool.get_mut(usd).unwrap();
            c.precision = 2;
            c.name = "US Dollar".into();
        }
        let aapl = pool.find_or_create("AAPL");
        {
            let c = pool.get_mut(aapl).unwrap();
            c.flags = flags::SUFFIXED | flags::SEPARATED;
            c.add_price(100, Amount::new(usd, Quantity::from_scaled_i64(15000, 2)));
            c.add_price(200, Amount::new(usd, Quantity::from_scaled_i64(19000, 2)));
            c.last_lookup = 250;
        }
        pool
    }

    fn encode(pool: &CommodityPool) -> (Vec<u8>, u32) {
        let mut cx = WriteCx::new(1, pool.len());
        assign_idents(pool, &mut cx);
        let mut enc = Encoder::new(false);
        write_commodities(&mut enc, pool, &mut cx).unwrap();
        (enc.into_bytes(), cx.bigints_count)
    }

    #[test]
    fn test_count_excludes_null_commodity() {
        let pool = sample_pool();
        let (bytes, _) = encode(&pool);
        assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 2);
    }

    #[test]
    fn test_roundtrip_with_history() {
        let pool = sample_pool();
        let (bytes, bigints) = encode(&pool);
        // Two history quotes plus two conversion amounts.
        assert_eq!(bigints, 4);

        let journal = Journal::new();
        let mut cx = ReadCx::new(false);
        let loaded = read_commodities(&mut bytes.as_slice(), &mut cx, &journal).unwrap();

        assert_eq!(loaded.len(), 2);
        // Symbol order: "$" before "AAPL".
        assert_eq!(loaded[0].symbol, "$");
        assert_eq!(loaded[0].name, "US Dollar");
        assert_eq!(loaded[1].symbol, "AAPL");
        assert_eq!(loaded[1].flags, flags::SUFFIXED | flags::SEPARATED);
        assert_eq!(loaded[1].last_lookup, 250);
        assert_eq!(loaded[1].history.len(), 2);
        // "$" was slot 1 in the source pool and lands at slot 1 again
        // (base 1 + ident 1 - 1) in a fresh journal.
        assert_eq!(loaded[1].history[&100].commodity, 1);
        assert_eq!(
            loaded[1].history[&100].quantity,
            Quantity::from_scaled_i64(15000, 2)
        );
        assert_eq!(cx.bigints_read, 4);
    }

    #[test]
    fn test_collision_with_journal_rejected() {
        let pool = sample_pool();
        let (bytes, _) = encode(&pool);

        let mut journal = Journal::new();
        journal.commodities.find_or_create("AAPL");
        let mut cx = ReadCx::new(false);
        let err = read_commodities(&mut bytes.as_slice(), &mut cx, &journal).unwrap_err();
        assert!(matches!(err, CacheError::DuplicateCommodity(s) if s == "AAPL"));
    }

    #[test]
    fn test_out_of_order_ident_rejected() {
        let pool = sample_pool();
        let (mut bytes, _) = encode(&pool);
        bytes[4] = 2; // first record must carry ident 1
        let journal = Journal::new();
        let mut cx = ReadCx::new(false);
        assert!(read_commodities(&mut bytes.as_slice(), &mut cx, &journal).is_err());
    }
}
