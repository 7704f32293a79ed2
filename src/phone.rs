//! Phone number canonicalization for duplicate detection

/// Number of trailing digits that identify a subscriber regardless of country code
pub const SIGNIFICANT_DIGITS: usize = 9;

/// Canonicalize a phone number for equality comparison
///
/// Strips every non-digit character and keeps the last [`SIGNIFICANT_DIGITS`] digits, so
/// `+971 50 123 4567`, `0501234567` and `501234567` all compare equal. Inputs with fewer
/// digits come back shorter; the function never fails.
pub fn normalize(raw: &str) -> String {
    let digits: Vec<char> = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let start = digits.len().saturating_sub(SIGNIFICANT_DIGITS);
    digits[start..].iter().collect()
}

/// Strip formatting from a phone number for sending, keeping a leading `+`
///
/// Unlike [`normalize`] this keeps the country code, so the result can be handed to the
/// channel.
pub fn dialable(raw: &str) -> String {
    let trimmed = raw.trim_start();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if trimmed.starts_with('+') && !digits.is_empty() {
        format!("+{digits}")
    } else {
        digits
    }
}

/// Normalize an optional phone, returning `None` for missing or digit-less input
pub fn normalize_opt(raw: Option<&str>) -> Option<String> {
    raw.map(normalize).filter(|n| !n.is_empty())
}
