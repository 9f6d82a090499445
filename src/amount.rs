//! Token amounts and the quadratic vote cost model.
//!
//! Amounts are kept in the token's smallest unit as integers so they match the
//! on-chain representation exactly. Nothing in here goes through floating point.

use crate::errors::CliError;

/// Token amount in base units.
pub type Amount = u128;

/// Largest representable amount. Used as the one-time "unlimited" approval.
pub const MAX_AMOUNT: Amount = Amount::MAX;

/// Quadratic cost of casting `amount` votes.
pub fn vote_cost(amount: u64) -> Result<Amount, CliError> {
    if amount < 1 {
        return Err(CliError::InvalidVoteAmount(amount));
    }
    let amount = Amount::from(amount);
    Ok(amount * amount)
}

/// Convert a human decimal string (e.g. `"12.5"`) into base units.
pub fn scaled_amount(human: &str, decimals: u8) -> Result<Amount, CliError> {
    let human = human.trim();
    let invalid = || CliError::InvalidAmount(human.to_string());

    let (whole, fraction) = match human.split_once('.') {
        Some((w, f)) => (w, f),
        None => (human, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if fraction.len() > usize::from(decimals) {
        return Err(CliError::InvalidAmount(format!(
            "{} has more than {} decimal places",
            human, decimals
        )));
    }

    let scale = pow10(decimals).ok_or_else(invalid)?;
    let whole_units = if whole.is_empty() {
        0
    } else {
        whole.parse::<Amount>().map_err(|_| invalid())?
    };

    let mut fraction_units: Amount = 0;
    if !fraction.is_empty() {
        let padding = u8::try_from(usize::from(decimals) - fraction.len()).map_err(|_| invalid())?;
        fraction_units = fraction
            .parse::<Amount>()
            .ok()
            .and_then(|f| f.checked_mul(pow10(padding)?))
            .ok_or_else(invalid)?;
    }

    whole_units
        .checked_mul(scale)
        .and_then(|w| w.checked_add(fraction_units))
        .ok_or_else(invalid)
}

/// Format base units for display, trimming trailing zeros of the fraction.
pub fn format_units(amount: Amount, decimals: u8) -> String {
    let Some(scale) = pow10(decimals) else {
        return amount.to_string();
    };
    let whole = amount / scale;
    let fraction = amount % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0width$}", fraction, width = usize::from(decimals));
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Unknown allowance counts as zero.
pub fn has_sufficient_allowance(allowance: Option<Amount>, required: Amount) -> bool {
    allowance.unwrap_or(0) >= required
}

/// Unknown balance counts as zero.
pub fn has_sufficient_balance(balance: Option<Amount>, required: Amount) -> bool {
    balance.unwrap_or(0) >= required
}

fn pow10(exp: u8) -> Option<Amount> {
    (10 as Amount).checked_pow(u32::from(exp))
}
