//! Commodities and the journal-scoped commodity pool.
//!
//! A commodity is any unit of value: a currency, a stock, an hour. Each
//! journal owns one [`CommodityPool`] mapping symbols to commodities; slot
//! 0 always holds the null commodity (empty symbol), which bare numbers
//! refer to.

use std::collections::BTreeMap;

use crate::amount::Amount;
use crate::error::{Error, Result};

/// Slot index into a [`CommodityPool`].
pub type CommodityIdx = u32;

/// Slot of the null commodity, present in every pool.
pub const NULL_COMMODITY: CommodityIdx = 0;

/// Display-style and market flags.
pub mod flags {
    /// Symbol is written after the quantity (`1000.00 TWD`).
    pub const SUFFIXED: u16 = 0x0001;
    /// A space separates the symbol from the quantity.
    pub const SEPARATED: u16 = 0x0002;
    /// European-style decimal comma (`1.000,00`).
    pub const EUROPEAN: u16 = 0x0004;
    /// Thousands separators when displaying the quantity.
    pub const THOUSANDS: u16 = 0x0008;
    /// Never consult the price history when valuing this commodity.
    pub const NOMARKET: u16 = 0x0010;
}

/// A unit of value with a symbol, display settings, and a price history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Commodity {
    /// Primary key within the pool.
    pub symbol: String,
    pub name: String,
    pub note: String,
    /// Decimal places shown when displaying amounts of this commodity.
    pub precision: u8,
    /// Bit set from [`flags`].
    pub flags: u16,
    /// Price history: unix time of the quote, keyed in time order.
    pub history: BTreeMap<i64, Amount>,
    /// Unix time of the most recent market lookup.
    pub last_lookup: i64,
    /// Fixed conversion rate, when one applies.
    pub conversion: Amount,
}

impl Commodity {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    /// Record a price quote at `when`.
    pub fn add_price(&mut self, when: i64, price: Amount) {
        self.history.insert(when, price);
    }

    /// The most recent quote at or before `when`, if any.
    pub fn price_at(&self, when: i64) -> Option<&Amount> {
        self.history.range(..=when).next_back().map(|(_, amount)| amount)
    }
}

/// Journal-scoped commodity registry.
///
/// Slots are stable for the pool's lifetime; symbols are unique. Slot 0 is
/// the null commodity, created at construction and never serialized.
#[derive(Debug, Clone)]
pub struct CommodityPool {
    items: Vec<Commodity>,
    by_symbol: BTreeMap<String, CommodityIdx>,
}

impl CommodityPool {
    pub fn new() -> Self {
        let mut by_symbol = BTreeMap::new();
        by_symbol.insert(String::new(), NULL_COMMODITY);
        Self {
            items: vec![Commodity::default()],
            by_symbol,
        }
    }

    /// Number of commodities, the null commodity included.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the pool holds nothing beyond the mandatory null commodity.
    pub fn is_empty(&self) -> bool {
        self.items.len() <= 1
    }

    pub fn get(&self, idx: CommodityIdx) -> Option<&Commodity> {
        self.items.get(idx as usize)
    }

    pub fn get_mut(&mut self, idx: CommodityIdx) -> Option<&mut Commodity> {
        self.items.get_mut(idx as usize)
    }

    /// Look up a commodity slot by symbol.
    pub fn find(&self, symbol: &str) -> Option<CommodityIdx> {
        self.by_symbol.get(symbol).copied()
    }

    /// Look up a commodity slot by symbol, creating it if missing.
    pub fn find_or_create(&mut self, symbol: &str) -> CommodityIdx {
        if let Some(idx) = self.find(symbol) {
            return idx;
        }
        let idx = self.items.len() as CommodityIdx;
        self.items.push(Commodity::new(symbol));
        self.by_symbol.insert(symbol.to_string(), idx);
        idx
    }

    /// Register a fully built commodity under its symbol.
    ///
    /// The symbol must be fresh; registering a symbol twice is an error.
    pub fn insert(&mut self, commodity: Commodity) -> Result<CommodityIdx> {
        if self.by_symbol.contains_key(&commodity.symbol) {
            return Err(Error::DuplicateCommodity(commodity.symbol));
        }
        let idx = self.items.len() as CommodityIdx;
        self.by_symbol.insert(commodity.symbol.clone(), idx);
        self.items.push(commodity);
        Ok(idx)
    }

    /// Iterate in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (CommodityIdx, &Commodity)> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, c)| (i as CommodityIdx, c))
    }

    /// Iterate in symbol order (the serialization order).
    pub fn iter_by_symbol(&self) -> impl Iterator<Item = (CommodityIdx, &Commodity)> {
        self.by_symbol
            .values()
            .map(move |&idx| (idx, &self.items[idx as usize]))
    }
}

impl Default for CommodityPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::Quantity;

    #[test]
    fn test_null_commodity_at_slot_zero() {
        let pool = CommodityPool::new();
        assert_eq!(pool.len(), 1);
        assert!(pool.is_empty());
        assert_eq!(pool.find(""), Some(NULL_COMMODITY));
        assert_eq!(pool.get(NULL_COMMODITY).unwrap().symbol, "");
    }

    #[test]
    fn test_find_or_create_is_idempotent() {
        let mut pool = CommodityPool::new();
        let usd = pool.find_or_create("$");
        assert_eq!(pool.find_or_create("$"), usd);
        assert_eq!(pool.len(), 2);
        assert!(!pool.is_empty());
    }

    #[test]
    fn test_insert_rejects_duplicate_symbol() {
        let mut pool = CommodityPool::new();
        pool.insert(Commodity::new("AAPL")).unwrap();
        let err = pool.insert(Commodity::new("AAPL")).unwrap_err();
        assert!(matches!(err, Error::DuplicateCommodity(s) if s == "AAPL"));
    }

    #[test]
    fn test_symbol_order_iteration() {
        let mut pool = CommodityPool::new();
        pool.find_or_create("EUR");
        pool.find_or_create("$");
        pool.find_or_create("AAPL");
        let symbols: Vec<&str> = pool
            .iter_by_symbol()
            .map(|(_, c)| c.symbol.as_str())
            .collect();
        assert_eq!(symbols, ["", "$", "AAPL", "EUR"]);
    }

    #[test]
    fn test_price_at() {
        let mut c = Commodity::new("AAPL");
        let usd = 1;
        c.add_price(100, Amount::new(usd, Quantity::from_i64(150)));
        c.add_price(200, Amount::new(usd, Quantity::from_i64(190)));
        assert_eq!(c.price_at(50), None);
        assert_eq!(c.price_at(100).unwrap().quantity, Quantity::from_i64(150));
        assert_eq!(c.price_at(150).unwrap().quantity, Quantity::from_i64(150));
        assert_eq!(c.price_at(250).unwrap().quantity, Quantity::from_i64(190));
    }
}
