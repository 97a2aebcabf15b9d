//! # Sales Invoice
//!
//! Bills delivered quantities and tracks incoming payments.
//!
//! ## State Machine
//! ```text
//! ┌───────┐ issue ┌────────┐ send ┌──────┐ payment ┌──────────────┐ payment ┌──────┐
//! │ DRAFT │──────►│ ISSUED │─────►│ SENT │────────►│ PARTIAL_PAID │────────►│ PAID │
//! └───────┘       └────────┘      └──┬───┘         └──────┬───────┘         └──────┘
//!                                    │  past due date     │
//!                                    ▼                    ▼
//!                               ┌─────────────────────────────┐  payment
//!                               │           OVERDUE           │──────────► PARTIAL_PAID / PAID
//!                               └─────────────────────────────┘
//! CANCELLED from anything except PAID and CANCELLED.
//! ```
//!
//! ## Payment Rules
//! - amount must be positive
//! - `paidAmount + amount` may never exceed `totalAmount`
//! - exactly zero remaining ⇒ PAID, otherwise PARTIAL_PAID

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::document::{
    ensure_editable, ensure_has_items, ensure_items_editable, ensure_status, DocumentStatus,
    SalesDocument,
};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::line_item::{InvoiceQuantities, ItemLedger, ItemPatch, LineItem, NewLineItem};
use crate::money::Money;
use crate::types::{Address, DocumentKind, DocumentMeta, DocumentTotals};
use crate::validation::{
    validate_address, validate_description, validate_required, validate_subject,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Sent,
    PartialPaid,
    Paid,
    Overdue,
    Cancelled,
}

impl DocumentStatus for InvoiceStatus {
    const INITIAL: Self = InvoiceStatus::Draft;

    fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Issued => "ISSUED",
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::PartialPaid => "PARTIAL_PAID",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Overdue => "OVERDUE",
            InvoiceStatus::Cancelled => "CANCELLED",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }
}

/// Statuses that accept payments.
pub const PAYABLE_STATUSES: [InvoiceStatus; 4] = [
    InvoiceStatus::Issued,
    InvoiceStatus::Sent,
    InvoiceStatus::PartialPaid,
    InvoiceStatus::Overdue,
];

/// A recorded incoming payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub amount: Money,
    pub reference: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub recorded_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvoice {
    pub customer_id: String,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Defaults to today.
    #[serde(default)]
    pub invoice_date: Option<NaiveDate>,
    /// Defaults to invoice date + payment terms.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub billing_address: Address,
    #[serde(default)]
    pub order_id: Option<String>,
    /// The delivery note this invoice bills, if any.
    #[serde(default)]
    pub source_document_id: Option<String>,
    #[serde(default)]
    pub items: Vec<NewLineItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceBasicInfo {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub billing_address: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesInvoice {
    pub meta: DocumentMeta,
    pub status: InvoiceStatus,
    pub subject: String,
    pub description: Option<String>,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub billing_address: Address,
    pub order_id: Option<String>,
    pub items: ItemLedger<InvoiceQuantities>,
    pub totals: DocumentTotals,
    pub paid_amount: Money,
    pub payments: Vec<Payment>,
    pub issued_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub overdue_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

impl SalesInvoice {
    pub fn new(
        prefix: &str,
        input: NewInvoice,
        today: NaiveDate,
        payment_terms_days: u32,
        actor: &str,
    ) -> CoreResult<Self> {
        validate_required("customerId", &input.customer_id)?;
        validate_subject(&input.subject)?;
        validate_description(input.description.as_deref())?;
        validate_address("billingAddress", &input.billing_address)?;

        let invoice_date = input.invoice_date.unwrap_or(today);
        let due_date = input
            .due_date
            .unwrap_or_else(|| invoice_date + Duration::days(i64::from(payment_terms_days)));
        check_due_date(invoice_date, due_date)?;

        let items = ItemLedger::from_inputs(input.items)?;
        let totals = items.totals();

        Ok(SalesInvoice {
            meta: DocumentMeta::new(
                prefix,
                invoice_date,
                input.customer_id,
                input.source_document_id,
                actor,
            ),
            status: InvoiceStatus::Draft,
            subject: input.subject.trim().to_string(),
            description: input.description,
            invoice_date,
            due_date,
            billing_address: input.billing_address,
            order_id: input.order_id,
            items,
            totals,
            paid_amount: Money::zero(),
            payments: Vec::new(),
            issued_at: None,
            sent_at: None,
            paid_at: None,
            overdue_at: None,
            cancelled_at: None,
            cancellation_reason: None,
        })
    }

    /// Delivery note this invoice was derived from.
    pub fn delivery_note_id(&self) -> Option<&str> {
        self.meta.source_document_id.as_deref()
    }

    pub fn update_basic_info(&mut self, patch: InvoiceBasicInfo, actor: &str) -> CoreResult<()> {
        ensure_editable(self)?;
        if let Some(subject) = &patch.subject {
            validate_subject(subject)?;
        }
        validate_description(patch.description.as_deref())?;
        if let Some(address) = &patch.billing_address {
            validate_address("billingAddress", address)?;
        }
        check_due_date(
            patch.invoice_date.unwrap_or(self.invoice_date),
            patch.due_date.unwrap_or(self.due_date),
        )?;

        if let Some(subject) = patch.subject {
            self.subject = subject.trim().to_string();
        }
        if patch.description.is_some() {
            self.description = patch.description;
        }
        if let Some(date) = patch.invoice_date {
            self.invoice_date = date;
        }
        if let Some(date) = patch.due_date {
            self.due_date = date;
        }
        if let Some(address) = patch.billing_address {
            self.billing_address = address;
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
    ) -> CoreResult<LineItem<InvoiceQuantities>> {
        ensure_items_editable(self)?;
        let removed = self.items.remove(item_id)?;
        self.totals = self.items.totals();
        self.meta.touch(actor);
        Ok(removed)
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    pub fn issue(&mut self, actor: &str) -> CoreResult<()> {
        ensure_status(self, &[InvoiceStatus::Draft], "issue")?;
        ensure_has_items(self, !self.items.is_empty(), "issue")?;
        let now = self.meta.touch(actor);
        self.status = InvoiceStatus::Issued;
        self.issued_at = Some(now);
        Ok(())
    }

    pub fn send(&mut self, actor: &str) -> CoreResult<()> {
        ensure_status(self, &[InvoiceStatus::Issued], "send")?;
        let now = self.meta.touch(actor);
        self.status = InvoiceStatus::Sent;
        self.sent_at = Some(now);
        Ok(())
    }

    /// Records a payment and returns the resulting status.
    ///
    /// ## User Workflow
    /// ```text
    /// total 357.00, paid 0.00
    ///      │ record_payment(200.00)
    ///      ▼
    /// PARTIAL_PAID, remaining 157.00
    ///      │ record_payment(200.00)
    ///      ▼
    /// InvalidAmount: "payment of 200.00 exceeds remaining 157.00 ..."
    /// ```
    pub fn record_payment(
        &mut self,
        amount: Money,
        reference: Option<String>,
        actor: &str,
    ) -> CoreResult<InvoiceStatus> {
        ensure_status(self, &PAYABLE_STATUSES, "record a payment on")?;
        if !amount.is_positive() {
            return Err(CoreError::invalid_amount(format!(
                "payment must be positive, got {}",
                amount
            )));
        }
        let remaining = self.remaining_amount();
        if amount > remaining {
            return Err(CoreError::invalid_amount(format!(
                "payment of {} exceeds remaining {} on invoice {}",
                amount, remaining, self.meta.number
            )));
        }

        let now = self.meta.touch(actor);
        self.paid_amount += amount;
        self.payments.push(Payment {
            amount,
            reference,
            recorded_at: now,
            recorded_by: actor.to_string(),
        });

        if self.remaining_amount().is_zero() {
            self.status = InvoiceStatus::Paid;
            self.paid_at = Some(now);
        } else {
            self.status = InvoiceStatus::PartialPaid;
        }
        Ok(self.status)
    }

    /// Marks the invoice overdue.
    ///
    /// Returns `Ok(false)` if it already was overdue.
    pub fn mark_overdue(&mut self, today: NaiveDate, actor: &str) -> CoreResult<bool> {
        if self.status == InvoiceStatus::Overdue {
            return Ok(false);
        }
        ensure_status(
            self,
            &[InvoiceStatus::Sent, InvoiceStatus::PartialPaid],
            "mark overdue",
        )?;
        if today <= self.due_date {
            return Err(CoreError::transition(
                DocumentKind::Invoice.label(),
                &self.meta.number,
                format!("not yet due (due {})", self.due_date),
                "mark overdue",
            ));
        }
        let now = self.meta.touch(actor);
        self.status = InvoiceStatus::Overdue;
        self.overdue_at = Some(now);
        Ok(true)
    }

    pub fn cancel(&mut self, reason: Option<String>, actor: &str) -> CoreResult<()> {
        if !self.can_be_cancelled() {
            return Err(CoreError::transition(
                DocumentKind::Invoice.label(),
                &self.meta.number,
                self.status.as_str(),
                "cancel",
            ));
        }
        let now = self.meta.touch(actor);
        self.status = InvoiceStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.cancellation_reason = reason;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Predicates
    // -------------------------------------------------------------------------

    pub fn can_be_cancelled(&self) -> bool {
        !matches!(self.status, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }

    pub fn remaining_amount(&self) -> Money {
        self.totals.total_amount - self.paid_amount
    }

    /// Paid share of the total, in percent.
    pub fn payment_progress(&self) -> Decimal {
        self.paid_amount.percent_of(self.totals.total_amount)
    }

    /// Open and past its due date on `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        matches!(
            self.status,
            InvoiceStatus::Sent | InvoiceStatus::PartialPaid | InvoiceStatus::Overdue
        ) && today > self.due_date
    }

    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        if self.is_overdue(today) {
            (today - self.due_date).num_days()
        } else {
            0
        }
    }
}

fn check_due_date(invoice_date: NaiveDate, due_date: NaiveDate) -> CoreResult<()> {
    if due_date < invoice_date {
        return Err(ValidationError::InvalidFormat {
            field: "dueDate".to_string(),
            reason: "must not be before the invoice date".to_string(),
        }
        .into());
    }
    Ok(())
}

impl SalesDocument for SalesInvoice {
    type Status = InvoiceStatus;

    const KIND: DocumentKind = DocumentKind::Invoice;

    fn meta(&self) -> &DocumentMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut DocumentMeta {
        &mut self.meta
    }

    fn status(&self) -> InvoiceStatus {
        self.status
    }

    fn subject(&self) -> &str {
        &self.subject
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn document_date(&self) -> NaiveDate {
        self.invoice_date
    }

    fn totals(&self) -> &DocumentTotals {
        &self.totals
    }

    fn is_active(&self) -> bool {
        !matches!(self.status, InvoiceStatus::Cancelled | InvoiceStatus::Paid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Percent;
    use rust_decimal_macros::dec;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    fn sent_invoice() -> SalesInvoice {
        let mut item = NewLineItem::new("Office chair", dec!(30), Money::from_major(10))
            .with_tax_rate(Percent::from_whole(19));
        item.reference_quantity = Some(dec!(50));

        let mut invoice = SalesInvoice::new(
            "INV",
            NewInvoice {
                customer_id: "cust-1".to_string(),
                subject: "Chairs".to_string(),
                description: None,
                invoice_date: None,
                due_date: None,
                billing_address: Address {
                    name: "Acme GmbH".to_string(),
                    street: "Hauptstr. 1".to_string(),
                    postal_code: "10115".to_string(),
                    city: "Berlin".to_string(),
                    country: "DE".to_string(),
                },
                order_id: Some("order-1".to_string()),
                source_document_id: Some("dn-1".to_string()),
                items: vec![item],
            },
            date(5, 3),
            30,
            "erin",
        )
        .unwrap();
        invoice.issue("erin").unwrap();
        invoice.send("erin").unwrap();
        invoice
    }

    #[test]
    fn test_due_date_from_payment_terms() {
        let invoice = sent_invoice();
        assert_eq!(invoice.due_date, date(6, 2));
        assert_eq!(invoice.totals.total_amount.amount(), dec!(357));
    }

    #[test]
    fn test_partial_then_full_payment() {
        let mut invoice = sent_invoice();

        let status = invoice
            .record_payment(Money::from_major(200), Some("BANK-1".to_string()), "frank")
            .unwrap();
        assert_eq!(status, InvoiceStatus::PartialPaid);
        assert_eq!(invoice.remaining_amount().amount(), dec!(157));

        let status = invoice
            .record_payment(Money::from_major(157), None, "frank")
            .unwrap();
        assert_eq!(status, InvoiceStatus::Paid);
        assert_eq!(invoice.payment_progress(), dec!(100));
        assert_eq!(invoice.payments.len(), 2);
    }

    #[test]
    fn test_overpayment_rejected_without_mutation() {
        let mut invoice = sent_invoice();
        let before = invoice.clone();

        let err = invoice
            .record_payment(Money::new(dec!(357.01)), None, "frank")
            .unwrap_err();

        assert!(matches!(err, CoreError::InvalidAmount { .. }));
        assert_eq!(invoice, before);
    }

    #[test]
    fn test_non_positive_payment_rejected() {
        let mut invoice = sent_invoice();
        assert!(invoice.record_payment(Money::zero(), None, "frank").is_err());
        assert!(invoice
            .record_payment(Money::from_major(-5), None, "frank")
            .is_err());
    }

    #[test]
    fn test_payment_on_draft_is_invalid_transition() {
        let mut invoice = sent_invoice();
        invoice.status = InvoiceStatus::Draft;
        let err = invoice
            .record_payment(Money::from_major(1), None, "frank")
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[test]
    fn test_overdue_marking() {
        let mut invoice = sent_invoice();

        assert!(!invoice.is_overdue(date(6, 2)));
        assert!(invoice.mark_overdue(date(6, 2), "system").is_err());

        assert!(invoice.mark_overdue(date(6, 12), "system").unwrap());
        assert_eq!(invoice.days_overdue(date(6, 12)), 10);

        let version = invoice.meta.version;
        assert!(!invoice.mark_overdue(date(6, 13), "system").unwrap());
        assert_eq!(invoice.meta.version, version);
    }

    #[test]
    fn test_overdue_invoice_accepts_payment() {
        let mut invoice = sent_invoice();
        invoice.mark_overdue(date(7, 1), "system").unwrap();

        let status = invoice
            .record_payment(Money::from_major(357), None, "frank")
            .unwrap();
        assert_eq!(status, InvoiceStatus::Paid);
        assert_eq!(invoice.days_overdue(date(7, 1)), 0);
    }

    #[test]
    fn test_cancel_paid_invoice_fails() {
        let mut invoice = sent_invoice();
        invoice
            .record_payment(Money::from_major(357), None, "frank")
            .unwrap();
        let version = invoice.meta.version;

        let err = invoice.cancel(None, "frank").unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        assert_eq!(invoice.meta.version, version);
    }

    #[test]
    fn test_derived_invoice_items_are_fixed() {
        let mut invoice = sent_invoice();
        invoice.status = InvoiceStatus::Draft;
        let version = invoice.meta.version;
        let item_id = invoice.items.items()[0].id.clone();

        let patch = ItemPatch {
            quantity: Some(dec!(50)),
            ..Default::default()
        };
        let err = invoice.update_item(&item_id, patch, "erin").unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));

        let extra = NewLineItem::new("Cushion", dec!(1), Money::from_major(5));
        assert!(matches!(
            invoice.add_item(extra, "erin"),
            Err(CoreError::InvalidState(_))
        ));
        assert!(matches!(
            invoice.remove_item(&item_id, "erin"),
            Err(CoreError::InvalidState(_))
        ));
        assert_eq!(invoice.meta.version, version);
        assert_eq!(invoice.totals.total_amount.amount(), dec!(357));

        // Header fields stay editable
        let info = InvoiceBasicInfo {
            subject: Some("Chairs, May".to_string()),
            ..Default::default()
        };
        invoice.update_basic_info(info, "erin").unwrap();
        assert_eq!(invoice.meta.version, version + 1);
    }
}
