//! 18-decimal fixed-point arithmetic.
//!
//! All helpers are checked: multiplication overflow is reported as
//! [`ArithmeticError::Overflow`] instead of wrapping, and every division
//! truncates toward zero.
//!
//! ```text
//! mul_wad(a, b) = floor(a * b / 10^18)
//! div_wad(a, b) = floor(a * 10^18 / b)
//! ```

use crate::{Wad, BPS_DENOMINATOR, PRICE_DECIMALS, WAD};

/// Fixed-point arithmetic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ArithmeticError {
    /// A multiplication or addition exceeded `u128::MAX`.
    #[error("arithmetic overflow")]
    Overflow,

    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,
}

/// Result alias for fixed-point helpers.
pub type Result<T> = std::result::Result<T, ArithmeticError>;

/// Compute `floor(a * b / denom)`.
///
/// When `a * b` does not fit in `u128`, the product is split as
/// `a = q * denom + r` so that `a * b / denom = q * b + r * b / denom`,
/// which keeps the exact truncated result for much larger operands.
///
/// # Errors
///
/// - [`ArithmeticError::DivisionByZero`] if `denom` is zero
/// - [`ArithmeticError::Overflow`] if the result does not fit in `u128`
pub fn mul_div(a: u128, b: u128, denom: u128) -> Result<u128> {
    if denom == 0 {
        return Err(ArithmeticError::DivisionByZero);
    }
    if let Some(product) = a.checked_mul(b) {
        return Ok(product / denom);
    }

    let (big, small) = if a >= b { (a, b) } else { (b, a) };
    let quotient = big / denom;
    let remainder = big % denom;

    let whole = quotient
        .checked_mul(small)
        .ok_or(ArithmeticError::Overflow)?;
    let fraction = remainder
        .checked_mul(small)
        .ok_or(ArithmeticError::Overflow)?
        / denom;

    whole.checked_add(fraction).ok_or(ArithmeticError::Overflow)
}

/// Multiply two wads: `floor(a * b / WAD)`.
pub fn mul_wad(a: Wad, b: Wad) -> Result<Wad> {
    mul_div(a, b, WAD)
}

/// Divide two wads: `floor(a * WAD / b)`.
pub fn div_wad(a: Wad, b: Wad) -> Result<Wad> {
    mul_div(a, WAD, b)
}

/// Convert basis points to a wad fraction (`100 bps -> 0.01`).
pub fn from_bps(bps: u32) -> Wad {
    // u32::MAX * 10^18 fits comfortably in u128
    u128::from(bps) * WAD / BPS_DENOMINATOR
}

/// Convert a wad fraction to basis points, truncating.
pub fn to_bps(value: Wad) -> u128 {
    value / (WAD / BPS_DENOMINATOR)
}

/// Relative distance of `value` from `reference`: `|value - reference| / reference`.
///
/// # Errors
///
/// - [`ArithmeticError::DivisionByZero`] if `reference` is zero
/// - [`ArithmeticError::Overflow`] on overflow
pub fn relative_deviation(value: Wad, reference: Wad) -> Result<Wad> {
    div_wad(value.abs_diff(reference), reference)
}

/// Scale an integer with `decimals` places of precision to 18 decimals.
///
/// Multiplies by `10^(18 - decimals)` when `decimals < 18`, divides by
/// `10^(decimals - 18)` otherwise (truncating).
///
/// # Errors
///
/// - [`ArithmeticError::Overflow`] if the scaled value does not fit
pub fn normalize_decimals(value: u128, decimals: u8) -> Result<Wad> {
    if decimals <= PRICE_DECIMALS {
        let factor = pow10(PRICE_DECIMALS - decimals)?;
        value.checked_mul(factor).ok_or(ArithmeticError::Overflow)
    } else {
        let factor = pow10(decimals - PRICE_DECIMALS)?;
        Ok(value / factor)
    }
}

/// Convert an unsigned magnitude into a signed value.
pub fn to_signed(value: u128) -> Result<i128> {
    i128::try_from(value).map_err(|_| ArithmeticError::Overflow)
}

fn pow10(exp: u8) -> Result<u128> {
    10u128
        .checked_pow(u32::from(exp))
        .ok_or(ArithmeticError::Overflow)
}
