//! # Operation Inputs
//!
//! Serde DTOs for status actions and conversions. Creation inputs and
//! patches (`NewOrder`, `OrderBasicInfo`, `ItemPatch`, ...) live in
//! `sales-core` next to the documents they build.
//!
//! Every input carries the acting user and, optionally, the version the
//! caller last saw. A stale version is rejected before anything changes.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sales_core::{Address, Money, Percent};

// =============================================================================
// Status Actions
// =============================================================================

/// Input for a plain status transition (`confirm`, `send`, `cancel`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusAction {
    pub actor: String,
    #[serde(default)]
    pub expected_version: Option<u64>,
    /// Cancellation, rejection or return reason where the action takes one.
    #[serde(default)]
    pub reason: Option<String>,
}

impl StatusAction {
    pub fn by(actor: impl Into<String>) -> Self {
        StatusAction {
            actor: actor.into(),
            ..Default::default()
        }
    }

    pub fn at_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }

    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Hand a delivery note to the carrier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipDelivery {
    pub actor: String,
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

/// Customer acknowledged receipt of a delivery note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmReceipt {
    pub actor: String,
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(default)]
    pub received_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPayment {
    pub actor: String,
    #[serde(default)]
    pub expected_version: Option<u64>,
    pub amount: Money,
    #[serde(default)]
    pub reference: Option<String>,
}

// =============================================================================
// Conversions
// =============================================================================

/// Offer → Order.
///
/// `partial_quantities` maps offer item ids to the quantity to order. When
/// absent, every item is ordered in full and an active order for the same
/// offer is a conflict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertOfferToOrder {
    pub offer_id: String,
    pub actor: String,
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(default)]
    pub partial_quantities: Option<HashMap<String, Decimal>>,
    #[serde(default)]
    pub subject: Option<String>,
    /// Defaults to today.
    #[serde(default)]
    pub order_date: Option<NaiveDate>,
    #[serde(default)]
    pub requested_delivery_date: Option<NaiveDate>,
    /// Defaults to the offer's billing address.
    #[serde(default)]
    pub billing_address: Option<Address>,
    /// Defaults to the offer's delivery address.
    #[serde(default)]
    pub delivery_address: Option<Address>,
    #[serde(default)]
    pub tax_rate_override: Option<Percent>,
}

/// Order → Delivery Note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertOrderToDelivery {
    pub order_id: String,
    pub actor: String,
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(default)]
    pub partial_quantities: Option<HashMap<String, Decimal>>,
    #[serde(default)]
    pub subject: Option<String>,
    /// Defaults to today.
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,
    /// Defaults to the order's delivery address, then its billing address.
    #[serde(default)]
    pub delivery_address: Option<Address>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub tax_rate_override: Option<Percent>,
}

/// Delivery Note → Invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertDeliveryToInvoice {
    pub delivery_note_id: String,
    pub actor: String,
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(default)]
    pub partial_quantities: Option<HashMap<String, Decimal>>,
    #[serde(default)]
    pub subject: Option<String>,
    /// Defaults to today.
    #[serde(default)]
    pub invoice_date: Option<NaiveDate>,
    /// Defaults to invoice date + configured payment terms.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Defaults to the billing address of the order behind the note.
    #[serde(default)]
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub tax_rate_override: Option<Percent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_conversion_input_from_json() {
        let input: ConvertOrderToDelivery = serde_json::from_str(
            r#"{
                "orderId": "o-1",
                "actor": "alice",
                "expectedVersion": 2,
                "partialQuantities": { "item-1": "50" },
                "deliveryDate": "2024-05-02"
            }"#,
        )
        .unwrap();

        assert_eq!(input.expected_version, Some(2));
        assert_eq!(
            input.partial_quantities.unwrap().get("item-1"),
            Some(&dec!(50))
        );
        assert_eq!(input.delivery_date, NaiveDate::from_ymd_opt(2024, 5, 2));
        assert!(input.delivery_address.is_none());
    }

    #[test]
    fn test_payment_amount_from_json() {
        let input: RecordPayment =
            serde_json::from_str(r#"{ "actor": "bob", "amount": "200.00" }"#).unwrap();
        assert_eq!(input.amount, Money::from_major(200));
    }
}
