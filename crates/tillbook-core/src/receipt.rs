//! Receipt number generation.
//!
//! Receipt numbers are `{actor_code}{YYMMDDHHMMSS}` - the cashier's short
//! code followed by a second-granularity UTC timestamp. The format is
//! persisted and compared elsewhere (reversals, journal references,
//! printed receipts), so it must be reproduced byte for byte.
//!
//! ## Known limitation
//! Two sales recorded by the same actor within the same second produce the
//! same number and the second insert fails on the unique key. Adding a
//! sequence or nonce changes every downstream consumer of the format and
//! needs an explicit product decision; until then the collision stands as
//! a documented limitation.

use chrono::{DateTime, Utc};

/// Timestamp layout appended to the actor code.
const RECEIPT_TIMESTAMP_FORMAT: &str = "%y%m%d%H%M%S";

/// Builds the receipt number for a sale recorded by `actor_code` at `at`.
///
/// ## Example
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use tillbook_core::receipt::receipt_number;
///
/// let at = Utc.with_ymd_and_hms(2026, 8, 26, 14, 30, 5).unwrap();
/// assert_eq!(receipt_number("AB", at), "AB260826143005");
/// ```
pub fn receipt_number(actor_code: &str, at: DateTime<Utc>) -> String {
    format!("{}{}", actor_code, at.format(RECEIPT_TIMESTAMP_FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_is_actor_code_then_yymmddhhmmss() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(receipt_number("JK", at), "JK260102030405");
    }

    #[test]
    fn single_digit_fields_are_zero_padded() {
        let at = Utc.with_ymd_and_hms(2030, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(receipt_number("X9", at), "X9301231235959");
    }

    #[test]
    fn same_actor_same_second_collides() {
        // Documented limitation: the number carries no uniquifier beyond
        // the timestamp.
        let at = Utc.with_ymd_and_hms(2026, 8, 26, 10, 0, 0).unwrap();
        assert_eq!(receipt_number("AB", at), receipt_number("AB", at));
    }
}
