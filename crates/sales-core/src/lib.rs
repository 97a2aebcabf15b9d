//! # sales-core: Pure Business Logic for the Order-to-Cash Pipeline
//!
//! This crate holds the sales documents, their state machines and the
//! arithmetic that ties them together. It has zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Order-to-Cash Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 sales-service (Service Layer)                   │   │
//! │  │   Offer/Order/Delivery/Invoice services, Conversion, Workflow   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ sales-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ documents │  │ line_item │  │ derivation│  │ workflow  │  │   │
//! │  │   │ Offer     │  │ ItemLedger│  │ plan qty  │  │ aggregate │  │   │
//! │  │   │ Order ... │  │ amounts   │  │ per item  │  │ status    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    sales-db (Storage Layer)                     │   │
//! │  │          repositories, query model, SQLite migrations           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Shared value types (Percent, Address, DocumentMeta, ...)
//! - [`money`] - Exact decimal Money
//! - [`line_item`] - Line items and the item ledger
//! - [`document`] - Traits shared by all documents
//! - [`offer`], [`order`], [`delivery`], [`invoice`] - The four documents
//! - [`derivation`] - Per-item quantity planning for conversions
//! - [`workflow`] - Fulfillment aggregation
//! - [`projection`] - JSON views
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: time enters as a `today` argument, never read from a clock
//!    in business rules
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Exact Decimals**: quantities, prices and percentages are `Decimal`
//! 4. **All-or-Nothing**: a failed operation leaves the document untouched
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use rust_decimal::Decimal;
//! use sales_core::{Money, NewLineItem, NewOrder, OrderStatus, Percent, SalesOrder};
//!
//! let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
//! let mut order = SalesOrder::new(
//!     "SO",
//!     NewOrder {
//!         customer_id: "cust-1".to_string(),
//!         subject: "Office chairs".to_string(),
//!         description: None,
//!         order_date: None,
//!         requested_delivery_date: None,
//!         billing_address: None,
//!         delivery_address: None,
//!         source_document_id: None,
//!         items: vec![NewLineItem::new("Chair", Decimal::from(100), Money::from_major(10))
//!             .with_tax_rate(Percent::from_whole(19))],
//!     },
//!     today,
//!     "alice",
//! )
//! .unwrap();
//!
//! order.confirm("alice").unwrap();
//! assert_eq!(order.status, OrderStatus::Confirmed);
//! assert_eq!(order.totals.total_amount, Money::from_major(1190));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod delivery;
pub mod derivation;
pub mod document;
pub mod error;
pub mod invoice;
pub mod line_item;
pub mod money;
pub mod offer;
pub mod order;
pub mod projection;
pub mod types;
pub mod validation;
pub mod workflow;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use delivery::{DeliveryBasicInfo, DeliveryNote, DeliveryStatus, NewDeliveryNote};
pub use document::{DocumentStatus, SalesDocument};
pub use error::{CoreError, CoreResult, ValidationError};
pub use invoice::{InvoiceBasicInfo, InvoiceStatus, NewInvoice, Payment, SalesInvoice};
pub use line_item::{ItemLedger, ItemPatch, LineItem, NewLineItem};
pub use money::Money;
pub use offer::{NewOffer, OfferBasicInfo, OfferStatus, SalesOffer};
pub use order::{NewOrder, OrderBasicInfo, OrderStatus, SalesOrder};
pub use types::*;
pub use workflow::{FulfillmentState, ItemProgress};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of a document subject.
pub const MAX_SUBJECT_LENGTH: usize = 200;

/// Maximum length of a document description.
pub const MAX_DESCRIPTION_LENGTH: usize = 2000;

/// Largest quantity accepted on a line item.
pub const MAX_QUANTITY: i64 = 1_000_000_000;

/// Largest unit price accepted on a line item, in currency units.
///
/// Together with [`MAX_QUANTITY`] this keeps every line amount far inside the
/// range of `Decimal`.
pub const MAX_UNIT_PRICE: i64 = 1_000_000_000_000;

/// Payment terms applied when configuration does not say otherwise.
pub const DEFAULT_PAYMENT_TERMS_DAYS: u32 = 30;

/// Offer validity applied when configuration does not say otherwise.
pub const DEFAULT_OFFER_VALIDITY_DAYS: u32 = 30;
