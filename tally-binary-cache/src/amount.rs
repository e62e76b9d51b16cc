//! Amount codec: a commodity reference plus an opaque quantity payload.
//!
//! ```text
//! commodity_ident: u32 LE     1-based, or 0xFFFFFFFF for "none"
//! quantity:        opaque     see tally_core::quantity
//! ```
//!
//! The quantity payload advances the context's bigint counter on both
//! sides; the journal driver back-patches the write-side total into the
//! pool header and verifies the read-side total against it.

use std::io::Read;

use tally_core::{quantity, Amount};

use crate::context::{ReadCx, WriteCx};
use crate::error::Result;
use crate::wire::{self, Encoder};

pub fn write_amount(enc: &mut Encoder, amount: &Amount, cx: &mut WriteCx) -> Result<()> {
    enc.put_u32(cx.commodity_wire_ident(amount.commodity)?);
    quantity::write_quantity(enc, &amount.quantity, &mut cx.bigints_count)?;
    Ok(())
}

pub fn read_amount<R: Read + ?Sized>(input: &mut R, cx: &mut ReadCx) -> Result<Amount> {
    let commodity = cx.commodity_slot(wire::read_u32(input)?)?;
    let quantity = quantity::read_quantity(input, &mut cx.bigints_read)?;
    Ok(Amount { commodity, quantity })
}
