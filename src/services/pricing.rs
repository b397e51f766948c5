use rust_decimal::Decimal;

/// Sales tax multiplier applied to `price_with_tax`.
fn tax_rate() -> Decimal {
    Decimal::new(11, 1)
}

/// Rounds to cents and pins the scale so `20` renders as `"20.00"`.
pub fn money(value: Decimal) -> Decimal {
    let mut value = value.round_dp(2);
    value.rescale(2);
    value
}

pub fn with_tax(unit_price: Decimal) -> Decimal {
    money(unit_price * tax_rate())
}

pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    money(unit_price * Decimal::from(quantity))
}
