//! Phone-digit extraction and access-code derivation.

use slk_schemas::CodeSource;

/// Strip everything that is not an ASCII digit.
pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Last four digits of a phone number, when at least four remain after
/// stripping formatting.
pub fn last_four(phone: &str) -> Option<String> {
    let digits = digits_only(phone);
    if digits.len() < 4 {
        return None;
    }
    Some(digits[digits.len() - 4..].to_string())
}

/// Mask a phone number for log output: all but the last four digits become
/// `*`. Four digits or fewer pass through unchanged.
pub fn mask_phone(phone: &str) -> String {
    let digits = digits_only(phone);
    if digits.len() <= 4 {
        return digits;
    }
    let masked_len = digits.len() - 4;
    let mut out = "*".repeat(masked_len);
    out.push_str(&digits[masked_len..]);
    out
}

/// Derive the 4-digit access code for a booking.
///
/// The guest phone wins when it carries at least four digits. Otherwise the
/// booking id's digits are used, zero-left-padded to four. `None` means no
/// code is derivable and the caller must reject the event.
pub fn derive_code(phone: &str, booking_id: &str) -> Option<(String, CodeSource)> {
    if let Some(code) = last_four(phone) {
        return Some((code, CodeSource::Phone));
    }

    let digits = digits_only(booking_id);
    if digits.is_empty() {
        return None;
    }
    let tail_start = digits.len().saturating_sub(4);
    let code = format!("{:0>4}", &digits[tail_start..]);
    Some((code, CodeSource::BookingId))
}
