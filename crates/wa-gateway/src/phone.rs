//! Destination phone number validation.

use wa_session::direct_chat_address;

/// Shortest accepted number, country code included.
const MIN_DIGITS: usize = 10;
/// Longest number E.164 allows.
const MAX_DIGITS: usize = 15;

/// Normalize a destination phone number to bare digits.
///
/// Every non-digit character is stripped; the remainder must be 10 to 15
/// digits long.
pub fn normalize_phone_number(number: &str) -> Result<String, String> {
    let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();

    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) {
        return Err("invalid phone: use E.164 without + (10 to 15 digits)".into());
    }

    Ok(digits)
}

/// Transport address for a normalized phone number.
pub fn transport_address(phone: &str) -> String {
    direct_chat_address(phone)
}
