/*
 * Utility functions and helpers
 */

use crate::models::{HermesError, Result};
use ethers::types::U256;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Converts a U256 amount to a Decimal for percentage math. Amounts
/// beyond Decimal's 28-digit range fail rather than silently truncate.
pub fn u256_to_decimal(value: U256) -> Result<Decimal> {
    Decimal::from_str(&value.to_string())
        .map_err(|e| HermesError::CalculationError(format!("U256 conversion error: {e}")))
}

/// Converts a non-negative Decimal back to U256, truncating toward zero.
pub fn decimal_to_u256(value: Decimal) -> Result<U256> {
    if value.is_sign_negative() {
        return Err(HermesError::CalculationError(format!(
            "Cannot convert negative value to U256: {value}"
        )));
    }
    U256::from_dec_str(&value.trunc().to_string())
        .map_err(|e| HermesError::CalculationError(format!("Decimal conversion error: {e}")))
}

pub fn format_address(address: &str) -> Result<String> {
    if !address.starts_with("0x") || address.len() != 42 {
        return Err(HermesError::ConfigError(format!(
            "Invalid address format: {address}"
        )));
    }
    Ok(address.to_lowercase())
}

/// Case-insensitive token address comparison.
#[must_use]
pub fn same_token(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u256_decimal_round_trip() {
        let v = U256::from(19_940_000_000_000u64);
        let d = u256_to_decimal(v).unwrap();
        assert_eq!(decimal_to_u256(d).unwrap(), v);
    }

    #[test]
    fn decimal_to_u256_truncates() {
        let d = Decimal::from_str("123.999").unwrap();
        assert_eq!(decimal_to_u256(d).unwrap(), U256::from(123));
    }

    #[test]
    fn negative_decimal_rejected() {
        let d = Decimal::from_str("-1").unwrap();
        assert!(decimal_to_u256(d).is_err());
    }

    #[test]
    fn format_address_validates() {
        assert!(format_address("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48").is_ok());
        assert!(format_address("A0b86991").is_err());
    }

    #[test]
    fn same_token_ignores_case() {
        assert!(same_token("0xABCD", "0xabcd"));
        assert!(!same_token("0xABCD", "0xabce"));
    }
}
