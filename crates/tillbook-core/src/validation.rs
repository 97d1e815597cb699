//! # Validation Module
//!
//! Input validation utilities for Tillbook.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (UI dialog)                                           │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation before any write      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  └── NOT NULL / UNIQUE / foreign key constraints                       │
//! │                                                                         │
//! │  Defense in depth: multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::types::{OrderItemInput, SaleLineInput};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product code.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use tillbook_core::validation::validate_product_code;
///
/// assert!(validate_product_code("P001").is_ok());
/// assert!(validate_product_code("").is_err());
/// ```
pub fn validate_product_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "product_code".to_string(),
        });
    }

    if code.chars().count() > 50 {
        return Err(ValidationError::TooLong {
            field: "product_code".to_string(),
            max: 50,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "product_code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product or customer display name.
pub fn validate_name(field: &'static str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity (must be strictly positive).
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

/// Validates a unit price or amount in cents (must not be negative).
pub fn validate_amount_cents(field: &'static str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Line-Set Validators
// =============================================================================

/// Validates a sale cart before recording.
///
/// A product may appear on one line only. Sale items are keyed by
/// (receipt, product) downstream - reversal posting reduces every row
/// matching that pair - so duplicate lines would let one reversal cut
/// the recorded quantity more than once.
pub fn validate_sale_lines(lines: &[SaleLineInput]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Empty {
            context: "sale".to_string(),
        });
    }
    let mut seen = HashSet::new();
    for line in lines {
        validate_product_code(&line.product_code)?;
        validate_name("product_name", &line.product_name)?;
        validate_quantity(line.quantity)?;
        validate_amount_cents("unit_price", line.unit_price_cents)?;
        if !seen.insert(line.product_code.as_str()) {
            return Err(ValidationError::DuplicateLine {
                product_code: line.product_code.clone(),
            });
        }
    }
    Ok(())
}

/// Validates one order line before insert or edit.
pub fn validate_order_item(item: &OrderItemInput) -> ValidationResult<()> {
    validate_product_code(&item.product_code)?;
    validate_name("product_name", &item.product_name)?;
    validate_quantity(item.quantity)?;
    validate_amount_cents("unit_price", item.unit_price_cents)?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(code: &str, qty: i64, price: i64) -> SaleLineInput {
        SaleLineInput {
            product_code: code.to_string(),
            product_name: "Widget".to_string(),
            quantity: qty,
            unit_price_cents: price,
        }
    }

    #[test]
    fn valid_product_codes() {
        assert!(validate_product_code("P001").is_ok());
        assert!(validate_product_code("SKU-42_A").is_ok());
    }

    #[test]
    fn invalid_product_codes() {
        assert!(validate_product_code("").is_err());
        assert!(validate_product_code("  ").is_err());
        assert!(validate_product_code("has space").is_err());
        assert!(validate_product_code(&"A".repeat(51)).is_err());
    }

    #[test]
    fn quantity_must_be_positive() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
    }

    #[test]
    fn amounts_must_not_be_negative() {
        assert!(validate_amount_cents("unit_price", 0).is_ok());
        assert!(validate_amount_cents("unit_price", 25_000).is_ok());
        assert!(validate_amount_cents("unit_price", -1).is_err());
    }

    #[test]
    fn empty_cart_rejected() {
        let err = validate_sale_lines(&[]).unwrap_err();
        assert_eq!(err.to_string(), "sale must contain at least one line");
    }

    #[test]
    fn bad_line_rejected() {
        assert!(validate_sale_lines(&[line("P001", 2, 25_000)]).is_ok());
        assert!(validate_sale_lines(&[line("P001", 0, 25_000)]).is_err());
        assert!(validate_sale_lines(&[line("", 1, 25_000)]).is_err());
        assert!(validate_sale_lines(&[line("P001", 1, -5)]).is_err());
    }

    #[test]
    fn duplicate_product_lines_rejected() {
        let cart = vec![
            line("P001", 2, 25_000),
            line("P002", 1, 10_000),
            line("P001", 3, 25_000),
        ];
        let err = validate_sale_lines(&cart).unwrap_err();
        assert_eq!(err.to_string(), "P001 appears on more than one line");
    }

    #[test]
    fn length_limits_count_characters_not_bytes() {
        // 200 two-byte characters is 400 bytes but exactly at the limit.
        let name = "é".repeat(200);
        assert!(validate_name("product_name", &name).is_ok());
        assert!(validate_name("product_name", &"é".repeat(201)).is_err());

        assert!(validate_product_code(&"é".repeat(50)).is_ok());
        assert!(validate_product_code(&"é".repeat(51)).is_err());
    }
}
