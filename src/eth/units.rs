//! Ether/wei conversion and hex quantity codec
//!
//! Amounts cross the wallet boundary as hex-encoded wei; users type decimal
//! ether strings. 1 ether = 10^18 wei, carried as u128.

use crate::error::{Error, Result};

/// Number of wei decimal places in one ether
pub const ETHER_DECIMALS: u32 = 18;

const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// Parse a decimal ether string ("0.01") into wei
///
/// Rejects empty, signed, non-numeric input and fractions finer than 18
/// decimal places. Validation happens here, before anything goes on-chain.
pub fn parse_ether(input: &str) -> Result<u128> {
    let s = input.trim();
    if s.is_empty() {
        return Err(Error::Validation("amount is empty".to_string()));
    }

    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(Error::Validation(format!("invalid amount {input:?}")));
    }

    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(Error::Validation(format!("invalid amount {input:?}")));
    }

    if frac_part.len() > ETHER_DECIMALS as usize {
        return Err(Error::Validation(format!(
            "amount {input:?} has more than {ETHER_DECIMALS} decimal places"
        )));
    }

    let whole: u128 = if int_part.is_empty() {
        0
    } else {
        int_part
            .parse()
            .map_err(|_| Error::Validation(format!("amount {input:?} out of range")))?
    };

    let frac: u128 = if frac_part.is_empty() {
        0
    } else {
        let scale = 10u128.pow(ETHER_DECIMALS - frac_part.len() as u32);
        let digits: u128 = frac_part
            .parse()
            .map_err(|_| Error::Validation(format!("amount {input:?} out of range")))?;
        digits * scale
    };

    whole
        .checked_mul(WEI_PER_ETHER)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(|| Error::Validation(format!("amount {input:?} out of range")))
}

/// Format a wei amount as a decimal ether string, trailing zeros trimmed
pub fn format_ether(wei: u128) -> String {
    let whole = wei / WEI_PER_ETHER;
    let frac = wei % WEI_PER_ETHER;

    if frac == 0 {
        return whole.to_string();
    }

    let frac = format!("{frac:018}");
    let frac = frac.trim_end_matches('0');
    format!("{whole}.{frac}")
}

/// Encode a number as a JSON-RPC hex quantity ("0x0", no leading zeros)
pub fn to_hex_quantity(value: u128) -> String {
    format!("{value:#x}")
}

/// Decode a JSON-RPC hex quantity into u128
pub fn from_hex_quantity(s: &str) -> Result<u128> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| Error::Rpc(format!("quantity {s:?} missing 0x prefix")))?;
    if digits.is_empty() {
        return Err(Error::Rpc(format!("empty hex quantity {s:?}")));
    }
    u128::from_str_radix(digits, 16).map_err(|_| Error::Rpc(format!("bad hex quantity {s:?}")))
}
