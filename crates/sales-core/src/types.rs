//! # Domain Types
//!
//! Shared value types used by every sales document.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  DocumentMeta   │   │ DocumentTotals  │   │    Address      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  subtotal       │   │  name           │       │
//! │  │  number (biz)   │   │  tax            │   │  street         │       │
//! │  │  customer_id    │   │  total          │   │  postal_code    │       │
//! │  │  version        │   └─────────────────┘   │  city, country  │       │
//! │  └─────────────────┘                         └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │    Percent      │   │  DocumentKind   │                             │
//! │  │  ─────────────  │   │  ─────────────  │                             │
//! │  │  19 = 19%       │   │  Offer / Order  │                             │
//! │  │  discount, tax  │   │  Delivery / Inv │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every document has:
//! - `id`: UUID v4 - immutable, used for cross references
//! - `number`: `<PREFIX>-<YYMMDD>-<suffix>` - human-readable, unique

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::money::Money;

// =============================================================================
// Percent
// =============================================================================

/// A percentage value (discounts and tax rates).
///
/// Stored as the human value: `19` means 19%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percent(Decimal);

impl Percent {
    /// Creates a percentage from its decimal value (`19.5` = 19.5%).
    #[inline]
    pub const fn new(value: Decimal) -> Self {
        Percent(value)
    }

    /// Creates a percentage from a whole number.
    #[inline]
    pub fn from_whole(value: i64) -> Self {
        Percent(Decimal::from(value))
    }

    /// Returns the percentage value (`19` for 19%).
    #[inline]
    pub const fn value(&self) -> Decimal {
        self.0
    }

    /// Returns the rate as a fraction (`0.19` for 19%).
    #[inline]
    pub fn fraction(&self) -> Decimal {
        self.0 / Decimal::ONE_HUNDRED
    }

    /// Zero percent.
    #[inline]
    pub const fn zero() -> Self {
        Percent(Decimal::ZERO)
    }

    /// Checks if the percentage is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Default for Percent {
    fn default() -> Self {
        Percent::zero()
    }
}

// =============================================================================
// Address
// =============================================================================

/// A postal address used for billing and delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub name: String,
    pub street: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
}

impl Address {
    /// Single-line rendering for search text and logs.
    pub fn one_line(&self) -> String {
        format!(
            "{}, {}, {} {}, {}",
            self.name, self.street, self.postal_code, self.city, self.country
        )
    }
}

// =============================================================================
// Document Kind
// =============================================================================

/// The four document types of the order-to-cash chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Offer,
    Order,
    DeliveryNote,
    Invoice,
}

impl DocumentKind {
    /// Storage key for this kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Offer => "offer",
            DocumentKind::Order => "order",
            DocumentKind::DeliveryNote => "delivery_note",
            DocumentKind::Invoice => "invoice",
        }
    }

    /// Human label used in error messages.
    pub const fn label(&self) -> &'static str {
        match self {
            DocumentKind::Offer => "offer",
            DocumentKind::Order => "order",
            DocumentKind::DeliveryNote => "delivery note",
            DocumentKind::Invoice => "invoice",
        }
    }

    /// Number prefix used when nothing else is configured.
    pub const fn default_prefix(&self) -> &'static str {
        match self {
            DocumentKind::Offer => "OFF",
            DocumentKind::Order => "SO",
            DocumentKind::DeliveryNote => "DN",
            DocumentKind::Invoice => "INV",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Generates a document number in format: `<PREFIX>-<YYMMDD>-<suffix>`.
///
/// ## Format
/// - PREFIX: document series (`SO`, `DN`, ...)
/// - YYMMDD: document date
/// - suffix: 6 upper-case hex characters from a fresh UUID
///
/// The repository rejects duplicates, so a clash surfaces as an error
/// instead of two documents sharing a number.
///
/// ## Example
/// `SO-240501-3F2A1C`
pub fn generate_document_number(prefix: &str, date: NaiveDate) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(6)
        .collect::<String>()
        .to_uppercase();

    format!("{}-{}-{}", prefix, date.format("%y%m%d"), suffix)
}

// =============================================================================
// Document Meta
// =============================================================================

/// Identity, cross-reference and audit fields shared by all documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    pub id: String,
    pub number: String,
    pub customer_id: String,
    pub source_document_id: Option<String>,
    /// Optimistic concurrency counter: 1 on construction, +1 per mutation.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl DocumentMeta {
    /// Creates fresh metadata with a generated id and number.
    pub fn new(
        prefix: &str,
        date: NaiveDate,
        customer_id: impl Into<String>,
        source_document_id: Option<String>,
        actor: &str,
    ) -> Self {
        let now = Utc::now();
        DocumentMeta {
            id: Uuid::new_v4().to_string(),
            number: generate_document_number(prefix, date),
            customer_id: customer_id.into(),
            source_document_id,
            version: 1,
            created_at: now,
            created_by: actor.to_string(),
            updated_at: now,
            updated_by: actor.to_string(),
        }
    }

    /// Stamps the update audit fields and bumps the version.
    pub fn touch(&mut self, actor: &str) -> DateTime<Utc> {
        let now = Utc::now();
        self.updated_at = now;
        self.updated_by = actor.to_string();
        self.version += 1;
        now
    }
}

// =============================================================================
// Document Totals
// =============================================================================

/// Aggregate amounts of a document. Always derived from the items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTotals {
    pub subtotal_amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
}

impl DocumentTotals {
    /// Sums line amounts into document totals.
    pub fn from_lines<'a, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = (&'a Money, &'a Money)>,
    {
        let mut subtotal = Money::zero();
        let mut tax = Money::zero();
        for (net, line_tax) in lines {
            subtotal += *net;
            tax += *line_tax;
        }
        DocumentTotals {
            subtotal_amount: subtotal,
            tax_amount: tax,
            total_amount: subtotal + tax,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_percent_fraction() {
        let rate = Percent::new(dec!(19));
        assert_eq!(rate.fraction(), dec!(0.19));
        assert_eq!(Percent::from_whole(7).value(), dec!(7));
    }

    #[test]
    fn test_percent_default_is_zero() {
        assert!(Percent::default().is_zero());
    }

    #[test]
    fn test_document_number_format() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let number = generate_document_number("SO", date);
        let parts: Vec<&str> = number.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "SO");
        assert_eq!(parts[1], "240501");
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_meta_touch_bumps_version() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let mut meta = DocumentMeta::new("SO", date, "cust-1", None, "alice");
        assert_eq!(meta.version, 1);

        meta.touch("bob");
        assert_eq!(meta.version, 2);
        assert_eq!(meta.updated_by, "bob");
        assert_eq!(meta.created_by, "alice");
    }

    #[test]
    fn test_totals_from_lines() {
        let lines = [
            (Money::from_major(500), Money::from_major(95)),
            (Money::from_major(100), Money::from_major(7)),
        ];
        let totals = DocumentTotals::from_lines(lines.iter().map(|(n, t)| (n, t)));
        assert_eq!(totals.subtotal_amount, Money::from_major(600));
        assert_eq!(totals.tax_amount, Money::from_major(102));
        assert_eq!(totals.total_amount, Money::from_major(702));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(DocumentKind::DeliveryNote.as_str(), "delivery_note");
        assert_eq!(DocumentKind::DeliveryNote.to_string(), "delivery note");
        assert_eq!(DocumentKind::Invoice.default_prefix(), "INV");
    }
}
