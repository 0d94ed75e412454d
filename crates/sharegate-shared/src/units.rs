//! Rendering of token amounts held in base units.

use primitive_types::U256;

/// One whole token in base units, `10^decimals`.
///
/// Returns `None` when the unit does not fit in 256 bits, in which case no
/// balance can ever reach it.
pub fn one_unit(decimals: u8) -> Option<U256> {
    U256::from(10u8).checked_pow(U256::from(decimals))
}

/// Format `amount` base units with `decimals` fractional digits.
///
/// Trailing fractional zeros are trimmed: `1_500_000` with 6 decimals is
/// `"1.5"`, `1234` with 6 decimals is `"0.001234"`.
pub fn format_units(amount: U256, decimals: u8) -> String {
    let digits = amount.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = format!("{digits:0>decimals$}");
    let split = padded.len() - decimals;
    let (integer, fraction) = padded.split_at(split);
    let fraction = fraction.trim_end_matches('0');

    match (integer.is_empty(), fraction.is_empty()) {
        (true, true) => "0".to_string(),
        (true, false) => format!("0.{fraction}"),
        (false, true) => integer.to_string(),
        (false, false) => format!("{integer}.{fraction}"),
    }
}
