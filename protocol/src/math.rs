//! # Checked Arithmetic
//!
//! Thin wrappers over the `checked_*` family that turn `None` into a typed
//! [`MathError`]. Every amount in the sale (value, USD cents, token units)
//! is a `u128` and goes through here; nothing wraps, nothing saturates.

use thiserror::Error;

use crate::error::ErrorKind;

/// Failure of a checked arithmetic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    /// The result does not fit in a `u128`.
    #[error("arithmetic overflow")]
    Overflow,

    /// The result would be negative.
    #[error("arithmetic underflow")]
    Underflow,

    /// The divisor was zero.
    #[error("division by zero")]
    DivisionByZero,
}

impl MathError {
    /// Taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Arithmetic
    }
}

/// `a + b`, failing on overflow.
pub fn add(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

/// `a - b`, failing on underflow.
pub fn sub(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_sub(b).ok_or(MathError::Underflow)
}

/// `a * b`, failing on overflow.
pub fn mul(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_mul(b).ok_or(MathError::Overflow)
}

/// `a / b`, truncating toward zero; fails when `b == 0`.
pub fn div(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_div(b).ok_or(MathError::DivisionByZero)
}

/// `a * b / d` with a single final floor.
///
/// The product is formed first so no precision is lost to an intermediate
/// division. Fails if the product overflows or `d == 0`.
pub fn mul_div(a: u128, b: u128, d: u128) -> Result<u128, MathError> {
    if d == 0 {
        return Err(MathError::DivisionByZero);
    }
    div(mul(a, b)?, d)
}

/// `amount * percent / 100`, floored.
pub fn percent_of(amount: u128, percent: u8) -> Result<u128, MathError> {
    mul_div(amount, u128::from(percent), 100)
}
