//! # Sales Order
//!
//! The order is the hub of the chain: delivery notes draw from its
//! quantities, and invoices of those notes feed its invoiced counters.
//!
//! ## State Machine
//! ```text
//! ┌───────┐ confirm ┌───────────┐ start  ┌─────────────┐
//! │ DRAFT │────────►│ CONFIRMED │───────►│ IN_PROGRESS │
//! └───────┘         └─────┬─────┘        └──────┬──────┘
//!                         │   deliveries (aggregator)
//!                         ▼                     ▼
//!               ┌─────────────────────┐   ┌───────────┐
//!               │ PARTIALLY_DELIVERED │──►│ DELIVERED │
//!               └─────────────────────┘   └─────┬─────┘
//!                                               │ all invoiced
//!                                               ▼
//!               ┌───────────┐ complete     ┌──────────┐
//!               │ COMPLETED │◄─────────────│ INVOICED │
//!               └───────────┘              └──────────┘
//!
//! CANCELLED from anything except DELIVERED, INVOICED, COMPLETED, CANCELLED.
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::document::{
    ensure_editable, ensure_has_items, ensure_items_editable, ensure_status, merge_progress,
    DocumentStatus, SalesDocument,
};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::line_item::{ItemLedger, ItemPatch, LineItem, NewLineItem, OrderQuantities};
use crate::types::{Address, DocumentKind, DocumentMeta, DocumentTotals};
use crate::validation::{
    validate_address, validate_description, validate_required, validate_subject,
};
use crate::workflow::{aggregate, FulfillmentState, ItemProgress};

// =============================================================================
// Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Draft,
    Confirmed,
    InProgress,
    PartiallyDelivered,
    Delivered,
    Invoiced,
    Completed,
    Cancelled,
}

impl DocumentStatus for OrderStatus {
    const INITIAL: Self = OrderStatus::Draft;

    fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "DRAFT",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::InProgress => "IN_PROGRESS",
            OrderStatus::PartiallyDelivered => "PARTIALLY_DELIVERED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Invoiced => "INVOICED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

/// Statuses in which deliveries can still be drawn from the order.
pub const DELIVERABLE_STATUSES: [OrderStatus; 3] = [
    OrderStatus::Confirmed,
    OrderStatus::InProgress,
    OrderStatus::PartiallyDelivered,
];

// =============================================================================
// Inputs
// =============================================================================

/// Input for creating an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub customer_id: String,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Defaults to today.
    #[serde(default)]
    pub order_date: Option<NaiveDate>,
    #[serde(default)]
    pub requested_delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub delivery_address: Option<Address>,
    #[serde(default)]
    pub source_document_id: Option<String>,
    #[serde(default)]
    pub items: Vec<NewLineItem>,
}

/// Patch of an order's header fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBasicInfo {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub order_date: Option<NaiveDate>,
    pub requested_delivery_date: Option<NaiveDate>,
    pub billing_address: Option<Address>,
    pub delivery_address: Option<Address>,
}

// =============================================================================
// Sales Order
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesOrder {
    pub meta: DocumentMeta,
    pub status: OrderStatus,
    pub subject: String,
    pub description: Option<String>,
    pub order_date: NaiveDate,
    pub requested_delivery_date: Option<NaiveDate>,
    pub billing_address: Option<Address>,
    pub delivery_address: Option<Address>,
    pub items: ItemLedger<OrderQuantities>,
    pub totals: DocumentTotals,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub confirmed_by: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub invoiced_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub cancellation_reason: Option<String>,
}

impl SalesOrder {
    /// Creates a draft order with totals computed from the given items.
    pub fn new(prefix: &str, input: NewOrder, today: NaiveDate, actor: &str) -> CoreResult<Self> {
        validate_required("customerId", &input.customer_id)?;
        validate_subject(&input.subject)?;
        validate_description(input.description.as_deref())?;
        if let Some(address) = &input.billing_address {
            validate_address("billingAddress", address)?;
        }
        if let Some(address) = &input.delivery_address {
            validate_address("deliveryAddress", address)?;
        }

        let items = ItemLedger::from_inputs(input.items)?;
        let order_date = input.order_date.unwrap_or(today);

        let mut order = SalesOrder {
            meta: DocumentMeta::new(
                prefix,
                order_date,
                input.customer_id,
                input.source_document_id,
                actor,
            ),
            status: OrderStatus::Draft,
            subject: input.subject.trim().to_string(),
            description: input.description,
            order_date,
            requested_delivery_date: input.requested_delivery_date,
            billing_address: input.billing_address,
            delivery_address: input.delivery_address,
            items,
            totals: DocumentTotals::default(),
            confirmed_at: None,
            confirmed_by: None,
            delivered_at: None,
            invoiced_at: None,
            completed_at: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
        };
        order.recompute_totals();
        Ok(order)
    }

    fn recompute_totals(&mut self) {
        self.totals = self.items.totals();
    }

    // -------------------------------------------------------------------------
    // Draft editing
    // -------------------------------------------------------------------------

    pub fn update_basic_info(&mut self, patch: OrderBasicInfo, actor: &str) -> CoreResult<()> {
        ensure_editable(self)?;
        if let Some(subject) = &patch.subject {
            validate_subject(subject)?;
        }
        validate_description(patch.description.as_deref())?;
        if let Some(address) = &patch.billing_address {
            validate_address("billingAddress", address)?;
        }
        if let Some(address) = &patch.delivery_address {
            validate_address("deliveryAddress", address)?;
        }

        if let Some(subject) = patch.subject {
            self.subject = subject.trim().to_string();
        }
        if patch.description.is_some() {
            self.description = patch.description;
        }
        if let Some(date) = patch.order_date {
            self.order_date = date;
        }
        if patch.requested_delivery_date.is_some() {
            self.requested_delivery_date = patch.requested_delivery_date;
        }
        if patch.billing_address.is_some() {
            self.billing_address = patch.billing_address;
        }
        if patch.delivery_address.is_some() {
            self.delivery_address = patch.delivery_address;
        }
        self.meta.touch(actor);
        Ok(())
    }

    pub fn add_item(&mut self, input: NewLineItem, actor: &str) -> CoreResult<String> {
        ensure_items_editable(self)?;
        let id = self.items.add(input)?;
        self.recompute_totals();
        self.meta.touch(actor);
        Ok(id)
    }

    pub fn update_item(&mut self, item_id: &str, patch: ItemPatch, actor: &str) -> CoreResult<()> {
        ensure_items_editable(self)?;
        self.items.update(item_id, patch)?;
        self.recompute_totals();
        self.meta.touch(actor);
        Ok(())
    }

    pub fn remove_item(
        &mut self,
        item_id: &str,
        actor: &str,
    ) -> CoreResult<LineItem<OrderQuantities>> {
        ensure_items_editable(self)?;
        let removed = self.items.remove(item_id)?;
        self.recompute_totals();
        self.meta.touch(actor);
        Ok(removed)
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// `DRAFT → CONFIRMED`. Requires at least one item.
    pub fn confirm(&mut self, actor: &str) -> CoreResult<()> {
        ensure_status(self, &[OrderStatus::Draft], "confirm")?;
        ensure_has_items(self, !self.items.is_empty(), "confirm")?;

        let now = self.meta.touch(actor);
        self.status = OrderStatus::Confirmed;
        self.confirmed_at = Some(now);
        self.confirmed_by = Some(actor.to_string());
        Ok(())
    }

    /// `CONFIRMED → IN_PROGRESS`.
    pub fn start_processing(&mut self, actor: &str) -> CoreResult<()> {
        ensure_status(self, &[OrderStatus::Confirmed], "start processing")?;
        self.meta.touch(actor);
        self.status = OrderStatus::InProgress;
        Ok(())
    }

    /// Marks the order partially delivered. Re-marking is a no-op.
    pub fn mark_partially_delivered(&mut self, actor: &str) -> CoreResult<()> {
        if self.status == OrderStatus::PartiallyDelivered {
            return Ok(());
        }
        ensure_status(
            self,
            &[OrderStatus::Confirmed, OrderStatus::InProgress],
            "mark partially delivered",
        )?;
        self.meta.touch(actor);
        self.status = OrderStatus::PartiallyDelivered;
        Ok(())
    }

    pub fn mark_delivered(&mut self, actor: &str) -> CoreResult<()> {
        ensure_status(self, &DELIVERABLE_STATUSES, "mark delivered")?;
        let now = self.meta.touch(actor);
        self.status = OrderStatus::Delivered;
        self.delivered_at = Some(now);
        Ok(())
    }

    /// `DELIVERED → INVOICED`, once every item is fully invoiced.
    pub fn mark_invoiced(&mut self, actor: &str) -> CoreResult<()> {
        ensure_status(self, &[OrderStatus::Delivered], "mark invoiced")?;
        if !self.is_fully_invoiced() {
            return Err(CoreError::invalid_state(format!(
                "Order {} still has uninvoiced quantities",
                self.meta.number
            )));
        }
        let now = self.meta.touch(actor);
        self.status = OrderStatus::Invoiced;
        self.invoiced_at = Some(now);
        Ok(())
    }

    /// `INVOICED → COMPLETED`.
    pub fn complete(&mut self, actor: &str) -> CoreResult<()> {
        ensure_status(self, &[OrderStatus::Invoiced], "complete")?;
        let now = self.meta.touch(actor);
        self.status = OrderStatus::Completed;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self, reason: Option<String>, actor: &str) -> CoreResult<()> {
        if !self.can_be_cancelled() {
            return Err(CoreError::transition(
                DocumentKind::Order.label(),
                &self.meta.number,
                self.status.as_str(),
                "cancel",
            ));
        }
        let now = self.meta.touch(actor);
        self.status = OrderStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.cancelled_by = Some(actor.to_string());
        self.cancellation_reason = reason;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Progress counters
    // -------------------------------------------------------------------------

    /// Adds delivered quantities, all-or-nothing.
    ///
    /// Fails with `InvalidState` naming the item if any entry would push
    /// `deliveredQuantity` above `quantity`.
    pub fn apply_delivery_progress(
        &mut self,
        progress: &[(String, Decimal)],
        actor: &str,
    ) -> CoreResult<()> {
        ensure_status(self, &DELIVERABLE_STATUSES, "record deliveries for")?;
        let merged = merge_progress(progress)?;

        for (item_id, quantity) in &merged {
            let item = self.items.require(item_id)?;
            let remaining = item.quantities.remaining_to_deliver();
            if *quantity > remaining {
                return Err(CoreError::invalid_state(format!(
                    "Cannot deliver {} of item {} on order {}: only {} remaining",
                    quantity, item_id, self.meta.number, remaining
                )));
            }
        }

        for (item_id, quantity) in merged {
            self.items.get_mut(&item_id)?.quantities.delivered_quantity += quantity;
        }
        self.meta.touch(actor);
        Ok(())
    }

    /// Adds invoiced quantities, all-or-nothing.
    ///
    /// `invoicedQuantity` may never exceed `deliveredQuantity`.
    pub fn apply_invoicing_progress(
        &mut self,
        progress: &[(String, Decimal)],
        actor: &str,
    ) -> CoreResult<()> {
        ensure_status(
            self,
            &[
                OrderStatus::Confirmed,
                OrderStatus::InProgress,
                OrderStatus::PartiallyDelivered,
                OrderStatus::Delivered,
            ],
            "record invoicing for",
        )?;
        let merged = merge_progress(progress)?;

        for (item_id, quantity) in &merged {
            let item = self.items.require(item_id)?;
            let remaining = item.quantities.remaining_to_invoice();
            if *quantity > remaining {
                return Err(CoreError::invalid_state(format!(
                    "Cannot invoice {} of item {} on order {}: \
                     only {} delivered and not yet invoiced",
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

    /// Re-derives the order status from its item counters.
    ///
    /// Returns `true` if the status changed. Calling it again without new
    /// progress changes nothing.
    pub fn recompute_status(&mut self, actor: &str) -> CoreResult<bool> {
        let mut changed = false;
        loop {
            let next = match (self.status, self.delivery_state(), self.invoicing_state()) {
                (s, FulfillmentState::Full, _) if DELIVERABLE_STATUSES.contains(&s) => {
                    OrderStatus::Delivered
                }
                (
                    OrderStatus::Confirmed | OrderStatus::InProgress,
                    FulfillmentState::Partial,
                    _,
                ) => OrderStatus::PartiallyDelivered,
                (OrderStatus::Delivered, _, FulfillmentState::Full) => OrderStatus::Invoiced,
                _ => break,
            };
            match next {
                OrderStatus::Delivered => self.mark_delivered(actor)?,
                OrderStatus::PartiallyDelivered => self.mark_partially_delivered(actor)?,
                OrderStatus::Invoiced => self.mark_invoiced(actor)?,
                _ => break,
            }
            changed = true;
        }
        Ok(changed)
    }

    // -------------------------------------------------------------------------
    // Predicates
    // -------------------------------------------------------------------------

    pub fn can_be_cancelled(&self) -> bool {
        !matches!(
            self.status,
            OrderStatus::Delivered
                | OrderStatus::Invoiced
                | OrderStatus::Completed
                | OrderStatus::Cancelled
        )
    }

    pub fn delivery_state(&self) -> FulfillmentState {
        aggregate(
            self.items
                .iter()
                .map(|i| (i.quantities.delivered_quantity, i.quantities.quantity)),
        )
    }

    pub fn invoicing_state(&self) -> FulfillmentState {
        aggregate(
            self.items
                .iter()
                .map(|i| (i.quantities.invoiced_quantity, i.quantities.quantity)),
        )
    }

    pub fn is_fully_delivered(&self) -> bool {
        self.delivery_state() == FulfillmentState::Full
    }

    pub fn is_fully_invoiced(&self) -> bool {
        self.invoicing_state() == FulfillmentState::Full
    }

    /// Delivered share of the ordered quantity, in percent.
    pub fn delivery_progress(&self) -> Decimal {
        let ordered: Decimal = self.items.iter().map(|i| i.quantities.quantity).sum();
        if ordered.is_zero() {
            return Decimal::ZERO;
        }
        let delivered: Decimal = self
            .items
            .iter()
            .map(|i| i.quantities.delivered_quantity)
            .sum();
        delivered * Decimal::ONE_HUNDRED / ordered
    }

    pub fn item_progress(&self) -> Vec<ItemProgress> {
        self.items
            .iter()
            .map(|item| ItemProgress {
                item_id: item.id.clone(),
                quantity: item.quantities.quantity,
                delivered_quantity: item.quantities.delivered_quantity,
                invoiced_quantity: item.quantities.invoiced_quantity,
            })
            .collect()
    }

    /// Checks the order item invariant `0 ≤ invoiced ≤ delivered ≤ quantity`.
    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        for item in self.items.iter() {
            let q = &item.quantities;
            if q.delivered_quantity < Decimal::ZERO
                || q.invoiced_quantity < Decimal::ZERO
                || q.invoiced_quantity > q.delivered_quantity
                || q.delivered_quantity > q.quantity
            {
                return Err(ValidationError::OutOfRange {
                    field: format!("items[{}]", item.id),
                    min: "0".to_string(),
                    max: q.quantity.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl SalesDocument for SalesOrder {
    type Status = OrderStatus;

    const KIND: DocumentKind = DocumentKind::Order;

    fn meta(&self) -> &DocumentMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut DocumentMeta {
        &mut self.meta
    }

    fn status(&self) -> OrderStatus {
        self.status
    }

    fn subject(&self) -> &str {
        &self.subject
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn document_date(&self) -> NaiveDate {
        self.order_date
    }

    fn totals(&self) -> &DocumentTotals {
        &self.totals
    }

    fn is_active(&self) -> bool {
        !matches!(self.status, OrderStatus::Cancelled | OrderStatus::Completed)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::Percent;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn order_with_items(items: Vec<NewLineItem>) -> SalesOrder {
        SalesOrder::new(
            "SO",
            NewOrder {
                customer_id: "cust-1".to_string(),
                subject: "Office furniture".to_string(),
                description: None,
                order_date: None,
                requested_delivery_date: None,
                billing_address: None,
                delivery_address: None,
                source_document_id: None,
                items,
            },
            today(),
            "alice",
        )
        .unwrap()
    }

    fn chairs(qty: Decimal) -> NewLineItem {
        NewLineItem::new("Office chair", qty, Money::from_major(10))
            .with_tax_rate(Percent::from_whole(19))
    }

    fn confirmed_order() -> (SalesOrder, String) {
        let mut order = order_with_items(vec![chairs(dec!(100))]);
        order.confirm("alice").unwrap();
        let item_id = order.items.items()[0].id.clone();
        (order, item_id)
    }

    #[test]
    fn test_new_order_is_draft_with_totals() {
        let order = order_with_items(vec![chairs(dec!(100))]);

        assert_eq!(order.status, OrderStatus::Draft);
        assert_eq!(order.meta.version, 1);
        assert!(order.meta.number.starts_with("SO-240501-"));
        assert_eq!(order.totals.total_amount.amount(), dec!(1190));
    }

    #[test]
    fn test_confirm_requires_items() {
        let mut order = order_with_items(Vec::new());
        let err = order.confirm("alice").unwrap_err();

        assert!(matches!(err, CoreError::InvalidState(_)));
        assert_eq!(order.status, OrderStatus::Draft);
        assert_eq!(order.meta.version, 1);
    }

    #[test]
    fn test_items_locked_after_confirm() {
        let (mut order, item_id) = confirmed_order();

        assert!(order.add_item(chairs(dec!(1)), "bob").is_err());
        assert!(order.remove_item(&item_id, "bob").is_err());
        assert!(order.update_basic_info(OrderBasicInfo::default(), "bob").is_err());
    }

    #[test]
    fn test_offer_derived_order_items_are_fixed() {
        let mut order = order_with_items(vec![chairs(dec!(100))]);
        order.meta.source_document_id = Some("offer-1".to_string());
        let item_id = order.items.items()[0].id.clone();

        let patch = ItemPatch {
            quantity: Some(dec!(150)),
            ..Default::default()
        };
        let err = order.update_item(&item_id, patch, "bob").unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
        assert!(order.add_item(chairs(dec!(1)), "bob").is_err());
        assert!(order.remove_item(&item_id, "bob").is_err());
        assert_eq!(order.meta.version, 1);

        order.confirm("bob").unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[test]
    fn test_item_edits_keep_totals_in_sync() {
        let mut order = order_with_items(vec![chairs(dec!(100))]);
        let id = order.add_item(chairs(dec!(10)), "alice").unwrap();
        assert_eq!(order.totals.total_amount.amount(), dec!(1309));

        order.remove_item(&id, "alice").unwrap();
        assert_eq!(order.totals.total_amount.amount(), dec!(1190));
        assert_eq!(order.meta.version, 3);
    }

    #[test]
    fn test_partial_delivery_then_full() {
        let (mut order, item_id) = confirmed_order();

        order
            .apply_delivery_progress(&[(item_id.clone(), dec!(50))], "bob")
            .unwrap();
        assert!(order.recompute_status("bob").unwrap());
        assert_eq!(order.status, OrderStatus::PartiallyDelivered);

        order
            .apply_delivery_progress(&[(item_id, dec!(50))], "bob")
            .unwrap();
        order.recompute_status("bob").unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.delivery_progress(), dec!(100));
    }

    #[test]
    fn test_over_delivery_rejected_without_mutation() {
        let (mut order, item_id) = confirmed_order();
        let before = order.clone();

        let err = order
            .apply_delivery_progress(&[(item_id.clone(), dec!(101))], "bob")
            .unwrap_err();

        assert!(err.to_string().contains(&item_id));
        assert_eq!(order, before);
    }

    #[test]
    fn test_over_invoicing_rejected() {
        let (mut order, item_id) = confirmed_order();
        order
            .apply_delivery_progress(&[(item_id.clone(), dec!(40))], "bob")
            .unwrap();

        assert!(order
            .apply_invoicing_progress(&[(item_id.clone(), dec!(41))], "bob")
            .is_err());
        order
            .apply_invoicing_progress(&[(item_id, dec!(40))], "bob")
            .unwrap();
        order.check_invariants().unwrap();
    }

    #[test]
    fn test_recompute_status_is_idempotent() {
        let (mut order, item_id) = confirmed_order();
        order
            .apply_delivery_progress(&[(item_id, dec!(30))], "bob")
            .unwrap();

        assert!(order.recompute_status("bob").unwrap());
        let version = order.meta.version;
        assert!(!order.recompute_status("bob").unwrap());
        assert_eq!(order.meta.version, version);
    }

    #[test]
    fn test_fully_invoiced_order_becomes_invoiced_then_completed() {
        let (mut order, item_id) = confirmed_order();
        order
            .apply_delivery_progress(&[(item_id.clone(), dec!(100))], "bob")
            .unwrap();
        order
            .apply_invoicing_progress(&[(item_id, dec!(100))], "bob")
            .unwrap();

        order.recompute_status("bob").unwrap();
        assert_eq!(order.status, OrderStatus::Invoiced);

        order.complete("bob").unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert!(!order.is_active());
    }

    #[test]
    fn test_cancel_rules() {
        let (mut order, _) = confirmed_order();
        order.cancel(Some("customer withdrew".to_string()), "bob").unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(order.cancel(None, "bob").is_err());

        let (mut delivered, item_id2) = confirmed_order();
        delivered
            .apply_delivery_progress(&[(item_id2, dec!(100))], "bob")
            .unwrap();
        delivered.recompute_status("bob").unwrap();
        let version = delivered.meta.version;

        let err = delivered.cancel(None, "bob").unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        assert_eq!(delivered.meta.version, version);
    }

    #[test]
    fn test_start_processing() {
        let (mut order, _) = confirmed_order();
        order.start_processing("bob").unwrap();
        assert_eq!(order.status, OrderStatus::InProgress);
        assert!(order.start_processing("bob").is_err());
    }
}
