//! Money arithmetic shared by the accountancy and order services.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::errors::ServiceError;

/// Scale used for every monetary amount.
pub const MONEY_SCALE: u32 = 2;

/// Rounds to two decimals with banker's rounding and fixes the scale at two.
pub fn round_money(amount: Decimal) -> Decimal {
    let mut rounded =
        amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// `price + price * markup`, rounded to money scale.
pub fn apply_markup(price: Decimal, markup: Decimal) -> Decimal {
    round_money(price + price * markup)
}

/// Sum of `price * quantity` over all lines.
pub fn total_of<I>(lines: I) -> Result<Decimal, ServiceError>
where
    I: IntoIterator<Item = (Decimal, i32)>,
{
    let mut total = Decimal::ZERO;
    for (price, quantity) in lines {
        total = price
            .checked_mul(Decimal::from(quantity))
            .and_then(|line| total.checked_add(line))
            .ok_or_else(|| ServiceError::ValidationError("Total amount is out of range".into()))?;
    }
    Ok(round_money(total))
}
