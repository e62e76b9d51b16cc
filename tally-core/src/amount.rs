//! Amounts: a quantity paired with a commodity.

use crate::commodity::{CommodityIdx, NULL_COMMODITY};
use crate::quantity::Quantity;

/// A quantity denominated in a commodity.
///
/// `commodity` is a slot in the owning journal's
/// [`CommodityPool`](crate::commodity::CommodityPool); slot 0 is the null
/// commodity, which renders as a bare number. Cross-references are slot
/// indices rather than owning pointers, so amounts stay `Clone` and the
/// pool stays the single owner of every commodity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Amount {
    pub commodity: CommodityIdx,
    pub quantity: Quantity,
}

impl Amount {
    pub fn new(commodity: CommodityIdx, quantity: Quantity) -> Self {
        Self { commodity, quantity }
    }

    /// An amount with no commodity (a bare number).
    pub fn uncommoditized(quantity: Quantity) -> Self {
        Self {
            commodity: NULL_COMMODITY,
            quantity,
        }
    }

    /// The zero amount with no commodity.
    pub fn null() -> Self {
        Self::default()
    }

    pub fn has_commodity(&self) -> bool {
        self.commodity != NULL_COMMODITY
    }

    /// The same amount with the opposite sign.
    pub fn negated(&self) -> Self {
        Self {
            commodity: self.commodity,
            quantity: self.quantity.negated(),
        }
    }
}
