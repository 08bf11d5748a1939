// Copyright 2026 Boundless Foundation, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Fixed-point helpers over [`U256`]. All divisions truncate toward zero.

use alloy::primitives::{
    utils::{parse_units, ParseUnits},
    U256,
};

use crate::errors::DistributionError;

/// Decimals carried by subgraph decimal strings once parsed.
pub const TOKEN_DECIMALS: u8 = 18;

/// 1e18, the scale of published staking fractions.
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// 1e36, the scale of intermediate LP fractions.
pub const SHARE_SCALE: U256 = U256::from_limbs([
    0xb34b_9f10_0000_0000,
    0x00c0_97ce_7bc9_0715,
    0,
    0,
]);

/// `a * b / denominator`, truncated.
pub fn mul_div(a: U256, b: U256, denominator: U256, what: &'static str) -> Result<U256, DistributionError> {
    if denominator.is_zero() {
        return Err(DistributionError::Overflow(what));
    }
    let product = a.checked_mul(b).ok_or(DistributionError::Overflow(what))?;
    Ok(product / denominator)
}

/// `numerator / denominator` expressed at `scale`, truncated.
pub fn ratio(
    numerator: U256,
    denominator: U256,
    scale: U256,
    what: &'static str,
) -> Result<U256, DistributionError> {
    mul_div(numerator, scale, denominator, what)
}

/// Parses a base-10 decimal string (as served by the subgraph) into an integer scaled by
/// 10^[`TOKEN_DECIMALS`]. Fractional digits beyond that precision are dropped.
pub fn parse_decimal(value: &str) -> Result<U256, DistributionError> {
    let trimmed = value.trim();
    let invalid = || DistributionError::InvalidDecimal(value.to_string());
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return Err(invalid());
    }

    let truncated = match trimmed.split_once('.') {
        Some((int, frac)) if frac.len() > TOKEN_DECIMALS as usize => {
            format!("{int}.{}", &frac[..TOKEN_DECIMALS as usize])
        }
        _ => trimmed.to_string(),
    };

    match parse_units(&truncated, TOKEN_DECIMALS).map_err(|_| invalid())? {
        ParseUnits::U256(v) => Ok(v),
        ParseUnits::I256(v) if !v.is_negative() => Ok(v.into_raw()),
        ParseUnits::I256(_) => Err(invalid()),
    }
}
