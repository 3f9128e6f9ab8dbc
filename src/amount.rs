// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Minor-unit to decimal amount formatting.
//!
//! Every network reports balances and fees as integers in the asset's smallest
//! unit. This module scales them by the asset's declared decimal precision
//! into a plain decimal string without going through floating point.

use std::str::FromStr;

use alloy::primitives::U256;

/// Largest power of ten representable in a `U256`.
pub const MAX_DECIMALS: u8 = 77;

/// A raw minor-unit amount as reported by a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawAmount {
    Integer(u128),
    Text(String),
}

impl From<u64> for RawAmount {
    fn from(value: u64) -> Self {
        RawAmount::Integer(u128::from(value))
    }
}

impl From<u128> for RawAmount {
    fn from(value: u128) -> Self {
        RawAmount::Integer(value)
    }
}

impl From<&str> for RawAmount {
    fn from(value: &str) -> Self {
        RawAmount::Text(value.to_string())
    }
}

impl From<String> for RawAmount {
    fn from(value: String) -> Self {
        RawAmount::Text(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// Format a raw minor-unit amount using `decimals` of precision.
///
/// Accepts decimal digit strings and `0x`-prefixed hex strings (as returned by
/// JSON-RPC nodes). Fails on negative `decimals`, empty or non-numeric input,
/// and negative amounts.
pub fn format_amount(raw: impl Into<RawAmount>, decimals: i32) -> Result<String, AmountError> {
    if !(0..=i32::from(MAX_DECIMALS)).contains(&decimals) {
        return Err(AmountError::InvalidAmount(format!(
            "decimals must be between 0 and {MAX_DECIMALS}, got {decimals}"
        )));
    }

    let value = match raw.into() {
        RawAmount::Integer(v) => U256::from(v),
        RawAmount::Text(text) => parse_raw(&text)?,
    };

    Ok(format_units(value, decimals as u8))
}

/// Format an already-parsed minor-unit value. Never truncates precision.
pub fn format_units(value: U256, decimals: u8) -> String {
    if value.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = value / divisor;
    let remainder = value % divisor;

    if remainder.is_zero() {
        return whole.to_string();
    }

    let fraction = format!("{:0>width$}", remainder, width = decimals as usize);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

fn parse_raw(text: &str) -> Result<U256, AmountError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AmountError::InvalidAmount("empty amount".to_string()));
    }

    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) if !hex.is_empty() => U256::from_str_radix(hex, 16),
        Some(_) => return Err(AmountError::InvalidAmount(trimmed.to_string())),
        None if trimmed.bytes().all(|b| b.is_ascii_digit()) => U256::from_str(trimmed),
        None => return Err(AmountError::InvalidAmount(trimmed.to_string())),
    };

    parsed.map_err(|_| AmountError::InvalidAmount(trimmed.to_string()))
}
