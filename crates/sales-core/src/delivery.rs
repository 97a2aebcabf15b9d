//! # Delivery Note
//!
//! Records goods leaving the warehouse for an order. Invoices are derived
//! from delivered (or customer-confirmed) notes.
//!
//! ## State Machine
//! ```text
//! ┌──────────┐ ready ┌──────────────────┐ ship ┌────────────┐
//! │ PREPARED │──────►│ READY_FOR_PICKUP │─────►│ IN_TRANSIT │
//! └──────────┘       └──────────────────┘      └─────┬──────┘
//!                                           deliver  │  return
//!                                     ┌──────────────┴──────────────┐
//!                                     ▼                             ▼
//!                               ┌───────────┐                  ┌──────────┐
//!                               │ DELIVERED │───── return ────►│ RETURNED │
//!                               └─────┬─────┘                  └──────────┘
//!                                     │ confirm
//!                                     ▼
//!                               ┌───────────┐
//!                               │ CONFIRMED │
//!                               └───────────┘
//! CANCELLED from anything except CONFIRMED and CANCELLED.
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::document::{
    ensure_editable, ensure_has_items, ensure_items_editable, ensure_status, merge_progress,
    DocumentStatus, SalesDocument,
};
use crate::error::{CoreError, CoreResult};
use crate::line_item::{DeliveryQuantities, ItemLedger, ItemPatch, LineItem, NewLineItem};
use crate::types::{Address, DocumentKind, DocumentMeta, DocumentTotals};
use crate::validation::{
    validate_address, validate_description, validate_required, validate_subject,
};
use crate::workflow::{aggregate, FulfillmentState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Prepared,
    ReadyForPickup,
    InTransit,
    Delivered,
    Confirmed,
    Returned,
    Cancelled,
}

impl DocumentStatus for DeliveryStatus {
    const INITIAL: Self = DeliveryStatus::Prepared;

    fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Prepared => "PREPARED",
            DeliveryStatus::ReadyForPickup => "READY_FOR_PICKUP",
            DeliveryStatus::InTransit => "IN_TRANSIT",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Confirmed => "CONFIRMED",
            DeliveryStatus::Returned => "RETURNED",
            DeliveryStatus::Cancelled => "CANCELLED",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Confirmed | DeliveryStatus::Cancelled)
    }
}

/// Statuses from which an invoice may be derived.
pub const INVOICEABLE_STATUSES: [DeliveryStatus; 2] =
    [DeliveryStatus::Delivered, DeliveryStatus::Confirmed];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDeliveryNote {
    pub customer_id: String,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Defaults to today.
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,
    pub delivery_address: Address,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    /// The order this note delivers, if any.
    #[serde(default)]
    pub source_document_id: Option<String>,
    #[serde(default)]
    pub items: Vec<NewLineItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryBasicInfo {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub delivery_address: Option<Address>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryNote {
    pub meta: DocumentMeta,
    pub status: DeliveryStatus,
    pub subject: String,
    pub description: Option<String>,
    pub delivery_date: NaiveDate,
    pub delivery_address: Address,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub items: ItemLedger<DeliveryQuantities>,
    pub totals: DocumentTotals,
    pub ready_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub received_by: Option<String>,
    pub returned_at: Option<DateTime<Utc>>,
    pub return_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

impl DeliveryNote {
    pub fn new(
        prefix: &str,
        input: NewDeliveryNote,
        today: NaiveDate,
        actor: &str,
    ) -> CoreResult<Self> {
        validate_required("customerId", &input.customer_id)?;
        validate_subject(&input.subject)?;
        validate_description(input.description.as_deref())?;
        validate_address("deliveryAddress", &input.delivery_address)?;

        let items = ItemLedger::from_inputs(input.items)?;
        let totals = items.totals();
        let delivery_date = input.delivery_date.unwrap_or(today);

        Ok(DeliveryNote {
            meta: DocumentMeta::new(
                prefix,
                delivery_date,
                input.customer_id,
                input.source_document_id,
                actor,
            ),
            status: DeliveryStatus::Prepared,
            subject: input.subject.trim().to_string(),
            description: input.description,
            delivery_date,
            delivery_address: input.delivery_address,
            carrier: input.carrier,
            tracking_number: input.tracking_number,
            items,
            totals,
            ready_at: None,
            shipped_at: None,
            delivered_at: None,
            confirmed_at: None,
            received_by: None,
            returned_at: None,
            return_reason: None,
            cancelled_at: None,
            cancellation_reason: None,
        })
    }

    /// Order this note was derived from.
    pub fn order_id(&self) -> Option<&str> {
        self.meta.source_document_id.as_deref()
    }

    pub fn update_basic_info(&mut self, patch: DeliveryBasicInfo, actor: &str) -> CoreResult<()> {
        ensure_editable(self)?;
        if let Some(subject) = &patch.subject {
            validate_subject(subject)?;
        }
        validate_description(patch.description.as_deref())?;
        if let Some(address) = &patch.delivery_address {
            validate_address("deliveryAddress", address)?;
        }

        if let Some(subject) = patch.subject {
            self.subject = subject.trim().to_string();
        }
        if patch.description.is_some() {
            self.description = patch.description;
        }
        if let Some(date) = patch.delivery_date {
            self.delivery_date = date;
        }
        if let Some(address) = patch.delivery_address {
            self.delivery_address = address;
        }
        if patch.carrier.is_some() {
            self.carrier = patch.carrier;
        }
        if patch.tracking_number.is_some() {
            self.tracking_number = patch.tracking_number;
        }
        self.meta.touch(actor);
        Ok(())
    }

    pub fn add_item(&mut self, input: NewLineItem, actor: &str) -> CoreResult<String> {
        ensure_items_editable(self)?;
        let id = self.items.add(input)?;
        self.totals = self.items.totals();
        self.meta.touch(actor);
        Ok(id)
    }

    pub fn update_item(&mut self, item_id: &str, patch: ItemPatch, actor: &str) -> CoreResult<()> {
        ensure_items_editable(self)?;
        self.items.update(item_id, patch)?;
        self.totals = self.items.totals();
        self.meta.touch(actor);
        Ok(())
    }

    pub fn remove_item(
        &mut self,
        item_id: &str,
        actor: &str,
    ) -> CoreResult<LineItem<DeliveryQuantities>> {
        ensure_items_editable(self)?;
        let removed = self.items.remove(item_id)?;
        self.totals = self.items.totals();
        self.meta.touch(actor);
        Ok(removed)
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    pub fn mark_ready(&mut self, actor: &str) -> CoreResult<()> {
        ensure_status(self, &[DeliveryStatus::Prepared], "mark ready for pickup")?;
        ensure_has_items(self, !self.items.is_empty(), "mark ready for pickup")?;
        let now = self.meta.touch(actor);
        self.status = DeliveryStatus::ReadyForPickup;
        self.ready_at = Some(now);
        Ok(())
    }

    /// `READY_FOR_PICKUP → IN_TRANSIT`, optionally recording carrier details.
    pub fn ship(
        &mut self,
        carrier: Option<String>,
        tracking_number: Option<String>,
        actor: &str,
    ) -> CoreResult<()> {
        ensure_status(self, &[DeliveryStatus::ReadyForPickup], "ship")?;
        let now = self.meta.touch(actor);
        self.status = DeliveryStatus::InTransit;
        self.shipped_at = Some(now);
        if carrier.is_some() {
            self.carrier = carrier;
        }
        if tracking_number.is_some() {
            self.tracking_number = tracking_number;
        }
        Ok(())
    }

    pub fn mark_delivered(&mut self, actor: &str) -> CoreResult<()> {
        ensure_status(self, &[DeliveryStatus::InTransit], "mark delivered")?;
        let now = self.meta.touch(actor);
        self.status = DeliveryStatus::Delivered;
        self.delivered_at = Some(now);
        Ok(())
    }

    /// Customer acknowledged receipt.
    pub fn confirm(&mut self, received_by: Option<String>, actor: &str) -> CoreResult<()> {
        ensure_status(self, &[DeliveryStatus::Delivered], "confirm")?;
        let now = self.meta.touch(actor);
        self.status = DeliveryStatus::Confirmed;
        self.confirmed_at = Some(now);
        self.received_by = received_by;
        Ok(())
    }

    pub fn mark_returned(&mut self, reason: Option<String>, actor: &str) -> CoreResult<()> {
        ensure_status(
            self,
            &[DeliveryStatus::InTransit, DeliveryStatus::Delivered],
            "return",
        )?;
        let now = self.meta.touch(actor);
        self.status = DeliveryStatus::Returned;
        self.returned_at = Some(now);
        self.return_reason = reason;
        Ok(())
    }

    pub fn cancel(&mut self, reason: Option<String>, actor: &str) -> CoreResult<()> {
        if !self.can_be_cancelled() {
            return Err(CoreError::transition(
                DocumentKind::DeliveryNote.label(),
                &self.meta.number,
                self.status.as_str(),
                "cancel",
            ));
        }
        let now = self.meta.touch(actor);
        self.status = DeliveryStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.cancellation_reason = reason;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Invoicing progress
    // -------------------------------------------------------------------------

    /// Adds invoiced quantities, all-or-nothing.
    pub fn apply_invoicing_progress(
        &mut self,
        progress: &[(String, Decimal)],
        actor: &str,
    ) -> CoreResult<()> {
        ensure_status(self, &INVOICEABLE_STATUSES, "record invoicing for")?;
        let merged = merge_progress(progress)?;

        for (item_id, quantity) in &merged {
            let item = self.items.require(item_id)?;
            let remaining = item.quantities.remaining_to_invoice();
            if *quantity > remaining {
                return Err(CoreError::invalid_state(format!(
                    "Cannot invoice {} of item {} on delivery note {}: only {} remaining",
                    quantity, item_id, self.meta.number, remaining
                )));
            }
        }

        for (item_id, quantity) in merged {
            self.items.get_mut(&item_id)?.quantities.invoiced_quantity += quantity;
        }
        self.meta.touch(actor);
        Ok(())
    }

    pub fn can_be_cancelled(&self) -> bool {
        !matches!(
            self.status,
            DeliveryStatus::Confirmed | DeliveryStatus::Cancelled
        )
    }

    pub fn invoicing_state(&self) -> FulfillmentState {
        aggregate(
            self.items
                .iter()
                .map(|i| (i.quantities.invoiced_quantity, i.quantities.delivered_quantity)),
        )
    }

    pub fn is_fully_invoiced(&self) -> bool {
        self.invoicing_state() == FulfillmentState::Full
    }
}

impl SalesDocument for DeliveryNote {
    type Status = DeliveryStatus;

    const KIND: DocumentKind = DocumentKind::DeliveryNote;

    fn meta(&self) -> &DocumentMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut DocumentMeta {
        &mut self.meta
    }

    fn status(&self) -> DeliveryStatus {
        self.status
    }

    fn subject(&self) -> &str {
        &self.subject
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn document_date(&self) -> NaiveDate {
        self.delivery_date
    }

    fn totals(&self) -> &DocumentTotals {
        &self.totals
    }

    fn is_active(&self) -> bool {
        !matches!(
            self.status,
            DeliveryStatus::Cancelled | DeliveryStatus::Returned | DeliveryStatus::Confirmed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::Percent;
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

    fn note() -> DeliveryNote {
        let mut item = NewLineItem::new("Office chair", dec!(50), Money::from_major(10))
            .with_tax_rate(Percent::from_whole(19));
        item.reference_quantity = Some(dec!(100));

        DeliveryNote::new(
            "DN",
            NewDeliveryNote {
                customer_id: "cust-1".to_string(),
                subject: "Chairs, first batch".to_string(),
                description: None,
                delivery_date: None,
                delivery_address: address(),
                carrier: None,
                tracking_number: None,
                source_document_id: Some("order-1".to_string()),
                items: vec![item],
            },
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            "dave",
        )
        .unwrap()
    }

    fn delivered_note() -> DeliveryNote {
        let mut note = note();
        note.mark_ready("dave").unwrap();
        note.ship(Some("DHL".to_string()), Some("JD0001".to_string()), "dave")
            .unwrap();
        note.mark_delivered("dave").unwrap();
        note
    }

    #[test]
    fn test_amounts_follow_delivered_quantity() {
        let note = note();
        assert_eq!(note.totals.total_amount.amount(), dec!(595));
        assert_eq!(note.order_id(), Some("order-1"));
    }

    #[test]
    fn test_derived_note_items_are_fixed() {
        let mut note = note();
        let item_id = note.items.items()[0].id.clone();

        let patch = ItemPatch {
            quantity: Some(dec!(100)),
            ..Default::default()
        };
        let err = note.update_item(&item_id, patch, "dave").unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
        assert!(note.remove_item(&item_id, "dave").is_err());
        assert!(note
            .add_item(NewLineItem::new("Desk", dec!(1), Money::from_major(90)), "dave")
            .is_err());

        assert_eq!(note.meta.version, 1);
        assert_eq!(note.totals.total_amount.amount(), dec!(595));
    }

    #[test]
    fn test_full_lifecycle() {
        let mut note = delivered_note();
        assert_eq!(note.carrier.as_deref(), Some("DHL"));
        assert!(note.is_active());

        note.confirm(Some("Front desk".to_string()), "dave").unwrap();
        assert_eq!(note.status, DeliveryStatus::Confirmed);
        assert!(!note.is_active());
        assert!(!note.can_be_cancelled());
    }

    #[test]
    fn test_no_skipping() {
        let mut note = note();
        assert!(note.mark_delivered("dave").is_err());
        assert!(note.ship(None, None, "dave").is_err());
        assert_eq!(note.meta.version, 1);
    }

    #[test]
    fn test_return_only_from_transit_or_delivered() {
        let mut prepared = note();
        assert!(prepared.mark_returned(None, "dave").is_err());

        let mut delivered = delivered_note();
        delivered
            .mark_returned(Some("damaged".to_string()), "dave")
            .unwrap();
        assert_eq!(delivered.status, DeliveryStatus::Returned);
        assert!(!delivered.is_active());
    }

    #[test]
    fn test_invoicing_progress_bounded_by_delivered() {
        let mut note = delivered_note();
        let item_id = note.items.items()[0].id.clone();

        assert!(note
            .apply_invoicing_progress(&[(item_id.clone(), dec!(51))], "erin")
            .is_err());
        note.apply_invoicing_progress(&[(item_id.clone(), dec!(30))], "erin")
            .unwrap();
        assert_eq!(note.invoicing_state(), FulfillmentState::Partial);

        note.apply_invoicing_progress(&[(item_id, dec!(20))], "erin")
            .unwrap();
        assert!(note.is_fully_invoiced());
    }

    #[test]
    fn test_invoicing_requires_delivered_status() {
        let mut note = note();
        let item_id = note.items.items()[0].id.clone();
        let err = note
            .apply_invoicing_progress(&[(item_id, dec!(1))], "erin")
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }
}
