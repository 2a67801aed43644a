//! Numeric literal parsing.
//!
//! Accepted forms, after removing `_` digit-group separators and surrounding
//! whitespace:
//!
//! ```text
//! 1000     decimal
//! 0x1F     hexadecimal (also 0X)
//! $1F      hexadecimal
//! 1Fh      hexadecimal (also H)
//! 0b101    binary (also 0B)
//! ```

/// Parse a numeric literal into an unsigned value.
///
/// Returns `None` for anything that is not a valid literal in one of the
/// supported bases, including the empty string and values that overflow.
pub fn parse_number(input: &str) -> Option<u64> {
    let cleaned: String = input.chars().filter(|&c| c != '_').collect();
    let literal = cleaned.trim();

    let (digits, radix) = if let Some(rest) = literal
        .strip_prefix("0x")
        .or_else(|| literal.strip_prefix("0X"))
    {
        (rest, 16)
    } else if let Some(rest) = literal.strip_prefix('$') {
        (rest, 16)
    } else if let Some(rest) = literal
        .strip_suffix('h')
        .or_else(|| literal.strip_suffix('H'))
    {
        (rest, 16)
    } else if let Some(rest) = literal
        .strip_prefix("0b")
        .or_else(|| literal.strip_prefix("0B"))
    {
        (rest, 2)
    } else {
        (literal, 10)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }

    u64::from_str_radix(digits, radix).ok()
}

/// Like [`parse_number`], but a leading `-` negates the value.
pub fn parse_signed(input: &str) -> Option<i64> {
    let trimmed = input.trim();
    match trimmed.strip_prefix('-') {
        Some(rest) => {
            let magnitude = parse_number(rest)?;
            0i64.checked_sub_unsigned(magnitude)
        }
        None => i64::try_from(parse_number(trimmed)?).ok(),
    }
}
