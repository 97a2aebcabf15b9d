//! # JSON Projections
//!
//! Outbound views of the four documents, shaped for API consumers.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Domain (exact)                    View (JSON)                          │
//! │  ──────────────                    ───────────                          │
//! │  Money(Decimal)          ──►       number                               │
//! │  NaiveDate               ──►       "2024-05-01"                         │
//! │  DateTime<Utc>           ──►       "2024-05-01T09:30:00+00:00"          │
//! │  OrderStatus::InProgress ──►       "IN_PROGRESS"                        │
//! │  (derived)               ──►       paymentProgress, daysOverdue, ...    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! TypeScript definitions are generated by `ts-rs` when tests run.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use ts_rs::TS;

use crate::delivery::DeliveryNote;
use crate::document::SalesDocument;
use crate::invoice::SalesInvoice;
use crate::line_item::{
    DeliveryQuantities, InvoiceQuantities, LineItem, LineQuantities, OfferQuantities,
    OrderQuantities,
};
use crate::offer::SalesOffer;
use crate::order::SalesOrder;
use crate::types::Address;

fn num(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

fn timestamp(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|t| t.to_rfc3339())
}

// =============================================================================
// Shared Pieces
// =============================================================================

/// Fields every document view carries.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct HeaderView {
    pub id: String,
    pub number: String,
    pub status: String,
    pub customer_id: String,
    pub source_document_id: Option<String>,
    pub subject: String,
    pub description: Option<String>,
    pub document_date: String,
    #[ts(type = "number")]
    pub version: u64,
    pub created_at: String,
    pub created_by: String,
    pub updated_at: String,
    pub updated_by: String,
    pub subtotal_amount: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
}

impl HeaderView {
    fn of<D: SalesDocument>(doc: &D) -> Self {
        let meta = doc.meta();
        let totals = doc.totals();
        HeaderView {
            id: meta.id.clone(),
            number: meta.number.clone(),
            status: doc.status_str().to_string(),
            customer_id: meta.customer_id.clone(),
            source_document_id: meta.source_document_id.clone(),
            subject: doc.subject().to_string(),
            description: doc.description().map(str::to_string),
            document_date: doc.document_date().to_string(),
            version: meta.version,
            created_at: meta.created_at.to_rfc3339(),
            created_by: meta.created_by.clone(),
            updated_at: meta.updated_at.to_rfc3339(),
            updated_by: meta.updated_by.clone(),
            subtotal_amount: totals.subtotal_amount.to_f64(),
            tax_amount: totals.tax_amount.to_f64(),
            total_amount: totals.total_amount.to_f64(),
        }
    }
}

/// Quantities of a line, whichever the document tracks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QuantityView {
    pub quantity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordered_quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoiced_quantity: Option<f64>,
}

/// Maps a quantity block onto [`QuantityView`].
pub trait ProjectQuantities: LineQuantities {
    fn project(&self) -> QuantityView;
}

impl ProjectQuantities for OfferQuantities {
    fn project(&self) -> QuantityView {
        QuantityView {
            quantity: num(self.quantity),
            ..Default::default()
        }
    }
}

impl ProjectQuantities for OrderQuantities {
    fn project(&self) -> QuantityView {
        QuantityView {
            quantity: num(self.quantity),
            ordered_quantity: None,
            delivered_quantity: Some(num(self.delivered_quantity)),
            invoiced_quantity: Some(num(self.invoiced_quantity)),
        }
    }
}

impl ProjectQuantities for DeliveryQuantities {
    fn project(&self) -> QuantityView {
        QuantityView {
            quantity: num(self.delivered_quantity),
            ordered_quantity: Some(num(self.ordered_quantity)),
            delivered_quantity: Some(num(self.delivered_quantity)),
            invoiced_quantity: Some(num(self.invoiced_quantity)),
        }
    }
}

impl ProjectQuantities for InvoiceQuantities {
    fn project(&self) -> QuantityView {
        QuantityView {
            quantity: num(self.invoiced_quantity),
            ordered_quantity: None,
            delivered_quantity: Some(num(self.delivered_quantity)),
            invoiced_quantity: Some(num(self.invoiced_quantity)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LineItemView {
    pub id: String,
    pub source_item_id: Option<String>,
    pub position: u32,
    pub article_id: Option<String>,
    pub description: String,
    pub unit: String,
    #[serde(flatten)]
    pub quantities: QuantityView,
    pub unit_price: f64,
    pub discount_percent: f64,
    pub tax_rate: f64,
    pub net_amount: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
}

impl<Q: ProjectQuantities> From<&LineItem<Q>> for LineItemView {
    fn from(item: &LineItem<Q>) -> Self {
        LineItemView {
            id: item.id.clone(),
            source_item_id: item.source_item_id.clone(),
            position: item.position,
            article_id: item.article_id.clone(),
            description: item.description.clone(),
            unit: item.unit.clone(),
            quantities: item.quantities.project(),
            unit_price: item.unit_price.to_f64(),
            discount_percent: num(item.discount_percent.value()),
            tax_rate: num(item.tax_rate.value()),
            net_amount: item.net_amount.to_f64(),
            tax_amount: item.tax_amount.to_f64(),
            total_amount: item.total_amount.to_f64(),
        }
    }
}

// =============================================================================
// Document Views
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OfferView {
    #[serde(flatten)]
    pub header: HeaderView,
    pub valid_until: String,
    pub billing_address: Option<Address>,
    pub delivery_address: Option<Address>,
    pub is_expired: bool,
    pub sent_at: Option<String>,
    pub accepted_at: Option<String>,
    pub rejected_at: Option<String>,
    pub rejection_reason: Option<String>,
    pub items: Vec<LineItemView>,
}

impl OfferView {
    /// Projects an offer as seen on `today`.
    pub fn at(offer: &SalesOffer, today: NaiveDate) -> Self {
        OfferView {
            header: HeaderView::of(offer),
            valid_until: offer.valid_until.to_string(),
            billing_address: offer.billing_address.clone(),
            delivery_address: offer.delivery_address.clone(),
            is_expired: offer.is_expired(today),
            sent_at: timestamp(offer.sent_at),
            accepted_at: timestamp(offer.accepted_at),
            rejected_at: timestamp(offer.rejected_at),
            rejection_reason: offer.rejection_reason.clone(),
            items: offer.items.iter().map(LineItemView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub header: HeaderView,
    pub requested_delivery_date: Option<String>,
    pub billing_address: Option<Address>,
    pub delivery_address: Option<Address>,
    pub delivery_progress: f64,
    pub is_fully_delivered: bool,
    pub is_fully_invoiced: bool,
    pub can_be_cancelled: bool,
    pub confirmed_at: Option<String>,
    pub confirmed_by: Option<String>,
    pub delivered_at: Option<String>,
    pub completed_at: Option<String>,
    pub cancelled_at: Option<String>,
    pub cancellation_reason: Option<String>,
    pub items: Vec<LineItemView>,
}

impl From<&SalesOrder> for OrderView {
    fn from(order: &SalesOrder) -> Self {
        OrderView {
            header: HeaderView::of(order),
            requested_delivery_date: order.requested_delivery_date.map(|d| d.to_string()),
            billing_address: order.billing_address.clone(),
            delivery_address: order.delivery_address.clone(),
            delivery_progress: num(order.delivery_progress()),
            is_fully_delivered: order.is_fully_delivered(),
            is_fully_invoiced: order.is_fully_invoiced(),
            can_be_cancelled: order.can_be_cancelled(),
            confirmed_at: timestamp(order.confirmed_at),
            confirmed_by: order.confirmed_by.clone(),
            delivered_at: timestamp(order.delivered_at),
            completed_at: timestamp(order.completed_at),
            cancelled_at: timestamp(order.cancelled_at),
            cancellation_reason: order.cancellation_reason.clone(),
            items: order.items.iter().map(LineItemView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryNoteView {
    #[serde(flatten)]
    pub header: HeaderView,
    pub order_id: Option<String>,
    pub delivery_address: Address,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub is_fully_invoiced: bool,
    pub shipped_at: Option<String>,
    pub delivered_at: Option<String>,
    pub confirmed_at: Option<String>,
    pub received_by: Option<String>,
    pub returned_at: Option<String>,
    pub return_reason: Option<String>,
    pub cancelled_at: Option<String>,
    pub items: Vec<LineItemView>,
}

impl From<&DeliveryNote> for DeliveryNoteView {
    fn from(note: &DeliveryNote) -> Self {
        DeliveryNoteView {
            header: HeaderView::of(note),
            order_id: note.order_id().map(str::to_string),
            delivery_address: note.delivery_address.clone(),
            carrier: note.carrier.clone(),
            tracking_number: note.tracking_number.clone(),
            is_fully_invoiced: note.is_fully_invoiced(),
            shipped_at: timestamp(note.shipped_at),
            delivered_at: timestamp(note.delivered_at),
            confirmed_at: timestamp(note.confirmed_at),
            received_by: note.received_by.clone(),
            returned_at: timestamp(note.returned_at),
            return_reason: note.return_reason.clone(),
            cancelled_at: timestamp(note.cancelled_at),
            items: note.items.iter().map(LineItemView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceView {
    #[serde(flatten)]
    pub header: HeaderView,
    pub order_id: Option<String>,
    pub due_date: String,
    pub billing_address: Address,
    pub paid_amount: f64,
    pub remaining_amount: f64,
    pub payment_progress: f64,
    pub is_overdue: bool,
    #[ts(type = "number")]
    pub days_overdue: i64,
    pub issued_at: Option<String>,
    pub sent_at: Option<String>,
    pub paid_at: Option<String>,
    pub cancelled_at: Option<String>,
    pub items: Vec<LineItemView>,
}

impl InvoiceView {
    /// Projects an invoice as seen on `today`.
    pub fn at(invoice: &SalesInvoice, today: NaiveDate) -> Self {
        InvoiceView {
            header: HeaderView::of(invoice),
            order_id: invoice.order_id.clone(),
            due_date: invoice.due_date.to_string(),
            billing_address: invoice.billing_address.clone(),
            paid_amount: invoice.paid_amount.to_f64(),
            remaining_amount: invoice.remaining_amount().to_f64(),
            payment_progress: num(invoice.payment_progress()),
            is_overdue: invoice.is_overdue(today),
            days_overdue: invoice.days_overdue(today),
            issued_at: timestamp(invoice.issued_at),
            sent_at: timestamp(invoice.sent_at),
            paid_at: timestamp(invoice.paid_at),
            cancelled_at: timestamp(invoice.cancelled_at),
            items: invoice.items.iter().map(LineItemView::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line_item::NewLineItem;
    use crate::money::Money;
    use crate::order::NewOrder;
    use crate::types::Percent;
    use rust_decimal_macros::dec;

    fn order() -> SalesOrder {
        SalesOrder::new(
            "SO",
            NewOrder {
                customer_id: "cust-1".to_string(),
                subject: "Chairs".to_string(),
                description: None,
                order_date: None,
                requested_delivery_date: None,
                billing_address: None,
                delivery_address: None,
                source_document_id: None,
                items: vec![NewLineItem::new("Office chair", dec!(100), Money::from_major(10))
                    .with_tax_rate(Percent::from_whole(19))],
            },
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            "alice",
        )
        .unwrap()
    }

    #[test]
    fn test_order_view_json_shape() {
        let view = OrderView::from(&order());
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["status"], "DRAFT");
        assert_eq!(json["documentDate"], "2024-05-01");
        assert_eq!(json["totalAmount"], 1190.0);
        assert_eq!(json["deliveryProgress"], 0.0);
        assert_eq!(json["items"][0]["quantity"], 100.0);
        assert_eq!(json["items"][0]["deliveredQuantity"], 0.0);
        assert!(json["items"][0].get("orderedQuantity").is_none());
        assert_eq!(json["version"], 1);
    }
}
