//! Per-token cost tables for supported models.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// (input, output) USD cost per token for a model, used for run metadata.
/// Unknown models report zero; cost is advisory, never load-bearing.
pub(crate) fn rates_for(model: &str) -> (Decimal, Decimal) {
    match model {
        m if m.starts_with("gemini-2.0-flash") => (dec!(0.0000001), dec!(0.0000004)),
        m if m.starts_with("gemini-1.5-pro") => (dec!(0.00000125), dec!(0.000005)),
        m if m.starts_with("claude-sonnet") => (dec!(0.000003), dec!(0.000015)),
        m if m.starts_with("claude-haiku") => (dec!(0.0000008), dec!(0.000004)),
        _ => (Decimal::ZERO, Decimal::ZERO),
    }
}
