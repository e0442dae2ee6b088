use crate::distribution::{Amount, RateBps, CURRENCY_DECIMALS};

// Atomic units in one currency unit
const COIN_VALUE: u64 = 10u64.pow(CURRENCY_DECIMALS);

// Detect the available parallelism, default to 1 if it fails
pub fn detect_available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Format an amount expressed in atomic units (cents) with two decimals
pub fn format_amount(amount: Amount) -> String {
    format!(
        "{}.{:0width$}",
        amount / COIN_VALUE,
        amount % COIN_VALUE,
        width = CURRENCY_DECIMALS as usize
    )
}

/// Parse a decimal string such as `12.5` or `12.50` into atomic units.
/// More than two decimals is rejected rather than rounded.
pub fn parse_amount(value: &str) -> Option<Amount> {
    let value = value.trim();
    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (value, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return None;
    }

    if fraction.len() > CURRENCY_DECIMALS as usize
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut cents: u64 = if fraction.is_empty() { 0 } else { fraction.parse().ok()? };
    for _ in fraction.len()..CURRENCY_DECIMALS as usize {
        cents *= 10;
    }

    whole.checked_mul(COIN_VALUE)?.checked_add(cents)
}

/// Format a rate in basis points as a percentage with two decimals
pub fn format_rate(rate: RateBps) -> String {
    format!("{}.{:02}%", rate / 100, rate % 100)
}

/// Parse a percentage such as `5` or `2.5` into basis points
pub fn parse_rate(value: &str) -> Option<RateBps> {
    let value = value.trim().trim_end_matches('%');
    let bps = parse_amount(value)?;
    RateBps::try_from(bps).ok()
}
