//! # Validation Module
//!
//! Input validation for sales documents and line items.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: DTO deserialization (sales-service)                          │
//! │  ├── Type validation (dates, decimals)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Required fields, lengths                                          │
//! │  ├── Quantities, prices, percentages                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Document methods                                             │
//! │  └── Status preconditions, progress invariants                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use rust_decimal::Decimal;
//! use sales_core::validation::{validate_quantity, validate_subject};
//!
//! validate_subject("Office chairs").unwrap();
//! validate_quantity("quantity", Decimal::from(5)).unwrap();
//! ```

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{Address, Percent};
use crate::{MAX_DESCRIPTION_LENGTH, MAX_QUANTITY, MAX_SUBJECT_LENGTH, MAX_UNIT_PRICE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates that a text field is present (non-blank).
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(())
}

/// Validates a document subject.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
///
/// ## Example
/// ```rust
/// use sales_core::validation::validate_subject;
///
/// assert!(validate_subject("Quarterly restock").is_ok());
/// assert!(validate_subject("  ").is_err());
/// ```
pub fn validate_subject(subject: &str) -> ValidationResult<()> {
    validate_required("subject", subject)?;

    if subject.trim().chars().count() > MAX_SUBJECT_LENGTH {
        return Err(ValidationError::TooLong {
            field: "subject".to_string(),
            max: MAX_SUBJECT_LENGTH,
        });
    }

    Ok(())
}

/// Validates an optional free-text description.
pub fn validate_description(description: Option<&str>) -> ValidationResult<()> {
    if let Some(text) = description {
        if text.chars().count() > MAX_DESCRIPTION_LENGTH {
            return Err(ValidationError::TooLong {
                field: "description".to_string(),
                max: MAX_DESCRIPTION_LENGTH,
            });
        }
    }
    Ok(())
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (no filtering)
/// - Maximum 100 characters
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "search".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

/// Validates a postal address. Every part is required.
pub fn validate_address(field: &str, address: &Address) -> ValidationResult<()> {
    let parts = [
        ("name", &address.name),
        ("street", &address.street),
        ("postalCode", &address.postal_code),
        ("city", &address.city),
        ("country", &address.country),
    ];

    for (part, value) in parts {
        if value.trim().is_empty() {
            return Err(ValidationError::required(format!("{}.{}", field, part)));
        }
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed [`MAX_QUANTITY`]
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Order: Add Item                                                        │
/// │                                                                         │
/// │  User enters quantity: 2.5                                             │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity("quantity", 2.5) ← THIS FUNCTION                    │
/// │       │                                                                 │
/// │       ├── qty <= 0? → Error: "quantity must be positive"               │
/// │       │                                                                 │
/// │       └── OK → line recomputed, totals recomputed                      │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(field: &str, qty: Decimal) -> ValidationResult<()> {
    if qty <= Decimal::ZERO {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    if qty > Decimal::from(MAX_QUANTITY) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: "0".to_string(),
            max: MAX_QUANTITY.to_string(),
        });
    }
    Ok(())
}

/// Validates a unit price.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free items)
/// - Must not exceed [`MAX_UNIT_PRICE`]
///
/// ## Example
/// ```rust
/// use sales_core::money::Money;
/// use sales_core::validation::validate_unit_price;
///
/// assert!(validate_unit_price(Money::from_major(10)).is_ok());
/// assert!(validate_unit_price(Money::zero()).is_ok());
/// assert!(validate_unit_price(Money::from_major(-1)).is_err());
/// ```
pub fn validate_unit_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "unitPrice".to_string(),
        });
    }
    if price.amount() > Decimal::from(MAX_UNIT_PRICE) {
        return Err(ValidationError::OutOfRange {
            field: "unitPrice".to_string(),
            min: "0".to_string(),
            max: MAX_UNIT_PRICE.to_string(),
        });
    }
    Ok(())
}

/// Validates a percentage (discount or tax rate).
///
/// ## Rules
/// - Must be between 0 and 100 inclusive
pub fn validate_percent(field: &str, percent: Percent) -> ValidationResult<()> {
    let value = percent.value();
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: "0".to_string(),
            max: "100".to_string(),
        });
    }
    Ok(())
}

/// Validates a requested page size against the configured cap.
pub fn validate_page_size(page_size: u32, max: u32) -> ValidationResult<()> {
    if page_size == 0 || page_size > max {
        return Err(ValidationError::OutOfRange {
            field: "pageSize".to_string(),
            min: "1".to_string(),
            max: max.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn address() -> Address {
        Address {
            name: "Acme GmbH".to_string(),
            street: "Hauptstr. 1".to_string(),
            postal_code: "10115".to_string(),
            city: "Berlin".to_string(),
            country: "DE".to_string(),
        }
    }

    #[test]
    fn test_validate_subject() {
        assert!(validate_subject("Office chairs").is_ok());
        assert!(validate_subject("").is_err());
        assert!(validate_subject("   ").is_err());
        assert!(validate_subject(&"A".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_description() {
        assert!(validate_description(None).is_ok());
        assert!(validate_description(Some("")).is_ok());
        assert!(validate_description(Some(&"x".repeat(2001))).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity("quantity", dec!(1)).is_ok());
        assert!(validate_quantity("quantity", dec!(0.5)).is_ok());

        assert!(validate_quantity("quantity", dec!(0)).is_err());
        assert!(validate_quantity("quantity", dec!(-1)).is_err());

        assert!(validate_quantity("quantity", Decimal::from(MAX_QUANTITY)).is_ok());
        let err = validate_quantity("quantity", Decimal::from(MAX_QUANTITY) + dec!(1)).unwrap_err();
        assert_eq!(err.to_string(), "quantity must be between 0 and 1000000000");
    }

    #[test]
    fn test_validate_unit_price_bound() {
        assert!(validate_unit_price(Money::from_major(MAX_UNIT_PRICE)).is_ok());
        assert!(validate_unit_price(Money::new(dec!(1e15))).is_err());
    }

    #[test]
    fn test_validate_percent() {
        assert!(validate_percent("taxRate", Percent::from_whole(0)).is_ok());
        assert!(validate_percent("taxRate", Percent::new(dec!(19))).is_ok());
        assert!(validate_percent("taxRate", Percent::from_whole(100)).is_ok());
        assert!(validate_percent("taxRate", Percent::new(dec!(100.01))).is_err());
        assert!(validate_percent("discountPercent", Percent::from_whole(-1)).is_err());
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address("deliveryAddress", &address()).is_ok());

        let mut missing_city = address();
        missing_city.city = " ".to_string();
        let err = validate_address("deliveryAddress", &missing_city).unwrap_err();
        assert_eq!(err.to_string(), "deliveryAddress.city is required");
    }

    #[test]
    fn test_validate_page_size() {
        assert!(validate_page_size(20, 100).is_ok());
        assert!(validate_page_size(100, 100).is_ok());
        assert!(validate_page_size(0, 100).is_err());
        assert!(validate_page_size(101, 100).is_err());
    }
}
