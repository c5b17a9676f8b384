use thiserror::Error;

/// Money is stored as integer cents, so 15,000.00 is `1_500_000`.
pub type Cents = i64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("invalid money format: '{0}'")]
    InvalidFormat(String),

    #[error("at most two decimal places are allowed: '{0}'")]
    TooPrecise(String),

    #[error("amount out of range: '{0}'")]
    Overflow(String),
}

/// Render cents as a plain decimal string, e.g. `150000` -> `"1500.00"`.
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a decimal amount (`"1500"`, `"1500.5"`, `"1500.50"`) into cents.
pub fn parse_cents(input: &str) -> Result<Cents, MoneyError> {
    let raw = input.trim();
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };

    let (units, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if units.is_empty() && fraction.is_empty() {
        return Err(MoneyError::InvalidFormat(input.to_string()));
    }
    if !units.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(MoneyError::InvalidFormat(input.to_string()));
    }
    if fraction.len() > 2 {
        return Err(MoneyError::TooPrecise(input.to_string()));
    }

    let whole: i64 = if units.is_empty() {
        0
    } else {
        units
            .parse()
            .map_err(|_| MoneyError::Overflow(input.to_string()))?
    };
    let frac: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().unwrap_or(0) * 10,
        _ => fraction.parse::<i64>().unwrap_or(0),
    };

    let cents = whole
        .checked_mul(100)
        .and_then(|c| c.checked_add(frac))
        .ok_or_else(|| MoneyError::Overflow(input.to_string()))?;

    Ok(if negative { -cents } else { cents })
}

/// Price of `quantity` units, or `None` on overflow.
pub fn line_total(unit_price: Cents, quantity: i64) -> Option<Cents> {
    unit_price.checked_mul(quantity)
}
