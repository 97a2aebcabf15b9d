//! # Invoice Service
//!
//! ```text
//! DRAFT ─issue─► ISSUED ─send─► SENT ─payment─► PARTIAL_PAID ─payment─► PAID
//!                   │             │                  │
//!                   │             └──── due date passed ──► OVERDUE ─payment─►
//!                   └──────────── cancel (anything but PAID) ──► CANCELLED
//! ```
//!
//! ## Payment Rules
//!
//! Payments are accepted in `ISSUED`, `SENT`, `PARTIAL_PAID` and `OVERDUE`.
//! A payment larger than the remaining amount is rejected with
//! `InvalidAmount` and the invoice stays as it was.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use sales_core::{
    DocumentKind, DocumentStatus, InvoiceBasicInfo, ItemPatch, NewInvoice, NewLineItem,
    SalesDocument, SalesInvoice,
};
use sales_db::{ListQuery, Page};

use super::{delete_initial, ensure_no_source, list, load, mutate, mutate_with, today, Repo};
use crate::config::SalesConfig;
use crate::dto::{RecordPayment, StatusAction};
use crate::error::ServiceResult;

#[derive(Clone)]
pub struct InvoiceService {
    repo: Repo<SalesInvoice>,
    config: Arc<SalesConfig>,
}

impl InvoiceService {
    pub fn new(repo: Repo<SalesInvoice>, config: Arc<SalesConfig>) -> Self {
        InvoiceService { repo, config }
    }

    /// Creates a standalone draft invoice. The due date defaults to the
    /// invoice date plus the configured payment terms.
    pub async fn create(&self, input: NewInvoice, actor: &str) -> ServiceResult<SalesInvoice> {
        ensure_no_source(input.source_document_id.as_ref())?;
        self.insert(input, actor).await
    }

    pub(crate) fn build(&self, input: NewInvoice, actor: &str) -> ServiceResult<SalesInvoice> {
        Ok(SalesInvoice::new(
            self.config.prefix(DocumentKind::Invoice),
            input,
            today(),
            self.config.invoicing.payment_terms_days,
            actor,
        )?)
    }

    async fn insert(&self, input: NewInvoice, actor: &str) -> ServiceResult<SalesInvoice> {
        let invoice = self.build(input, actor)?;
        self.repo.create(&invoice).await?;

        info!(
            id = %invoice.id(),
            number = %invoice.number(),
            delivery_note = ?invoice.delivery_note_id(),
            total = %invoice.totals.total_amount,
            due = %invoice.due_date,
            "Invoice created"
        );
        Ok(invoice)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<SalesInvoice> {
        load(&self.repo, id, None).await
    }

    pub async fn find_by_number(&self, number: &str) -> ServiceResult<Option<SalesInvoice>> {
        Ok(self.repo.find_by_number(number).await?)
    }

    pub async fn list(&self, query: ListQuery) -> ServiceResult<Page<SalesInvoice>> {
        list(&self.repo, query, &self.config).await
    }

    /// Invoices derived from the given delivery note.
    pub async fn list_by_delivery_note(
        &self,
        delivery_note_id: &str,
    ) -> ServiceResult<Vec<SalesInvoice>> {
        Ok(self.repo.find_by_source(delivery_note_id).await?)
    }

    pub async fn update_basic_info(
        &self,
        id: &str,
        patch: InvoiceBasicInfo,
        expected_version: Option<u64>,
        actor: &str,
    ) -> ServiceResult<SalesInvoice> {
        mutate(&self.repo, id, expected_version, |invoice| {
            invoice.update_basic_info(patch, actor)
        })
        .await
    }

    pub async fn add_item(
        &self,
        id: &str,
        input: NewLineItem,
        expected_version: Option<u64>,
        actor: &str,
    ) -> ServiceResult<(SalesInvoice, String)> {
        mutate_with(&self.repo, id, expected_version, |invoice| {
            invoice.add_item(input, actor)
        })
        .await
    }

    pub async fn update_item(
        &self,
        id: &str,
        item_id: &str,
        patch: ItemPatch,
        expected_version: Option<u64>,
        actor: &str,
    ) -> ServiceResult<SalesInvoice> {
        mutate(&self.repo, id, expected_version, |invoice| {
            invoice.update_item(item_id, patch, actor)
        })
        .await
    }

    pub async fn remove_item(
        &self,
        id: &str,
        item_id: &str,
        expected_version: Option<u64>,
        actor: &str,
    ) -> ServiceResult<SalesInvoice> {
        mutate(&self.repo, id, expected_version, |invoice| {
            invoice.remove_item(item_id, actor).map(|_| ())
        })
        .await
    }

    pub async fn issue(&self, id: &str, action: StatusAction) -> ServiceResult<SalesInvoice> {
        let invoice = mutate(&self.repo, id, action.expected_version, |invoice| {
            invoice.issue(&action.actor)
        })
        .await?;
        info!(number = %invoice.number(), "Invoice issued");
        Ok(invoice)
    }

    pub async fn send(&self, id: &str, action: StatusAction) -> ServiceResult<SalesInvoice> {
        mutate(&self.repo, id, action.expected_version, |invoice| {
            invoice.send(&action.actor)
        })
        .await
    }

    pub async fn record_payment(
        &self,
        id: &str,
        input: RecordPayment,
    ) -> ServiceResult<SalesInvoice> {
        let (invoice, status) = mutate_with(&self.repo, id, input.expected_version, |invoice| {
            invoice.record_payment(input.amount, input.reference, &input.actor)
        })
        .await?;

        info!(
            number = %invoice.number(),
            amount = %input.amount,
            remaining = %invoice.remaining_amount(),
            status = %status.as_str(),
            "Payment recorded"
        );
        Ok(invoice)
    }

    /// Marks one invoice overdue as of `today`. Already overdue invoices
    /// are returned unchanged.
    pub async fn mark_overdue(
        &self,
        id: &str,
        today: NaiveDate,
        action: StatusAction,
    ) -> ServiceResult<(SalesInvoice, bool)> {
        let (invoice, marked) = mutate_with(&self.repo, id, action.expected_version, |invoice| {
            invoice.mark_overdue(today, &action.actor)
        })
        .await?;
        if marked {
            info!(number = %invoice.number(), due = %invoice.due_date, "Invoice overdue");
        }
        Ok((invoice, marked))
    }

    pub async fn cancel(&self, id: &str, action: StatusAction) -> ServiceResult<SalesInvoice> {
        let invoice = mutate(&self.repo, id, action.expected_version, |invoice| {
            invoice.cancel(action.reason, &action.actor)
        })
        .await?;
        info!(
            number = %invoice.number(),
            reason = ?invoice.cancellation_reason,
            "Invoice cancelled"
        );
        Ok(invoice)
    }

    /// Drafts only.
    pub async fn delete(&self, id: &str, expected_version: Option<u64>) -> ServiceResult<()> {
        delete_initial(&self.repo, id, expected_version).await?;
        info!(id = %id, "Invoice deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use sales_core::{Address, InvoiceStatus, Money, Percent};
    use sales_db::InMemoryRepository;

    fn service() -> InvoiceService {
        InvoiceService::new(
            Arc::new(InMemoryRepository::<SalesInvoice>::new()),
            Arc::new(SalesConfig::default()),
        )
    }

    fn input() -> NewInvoice {
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
            order_id: None,
            source_document_id: None,
            items: vec![NewLineItem::new("Chair", dec!(30), Money::from_major(10))
                .with_tax_rate(Percent::from_whole(19))],
        }
    }

    fn payment(amount: Money) -> RecordPayment {
        RecordPayment {
            actor: "carol".to_string(),
            expected_version: None,
            amount,
            reference: Some("BANK-1".to_string()),
        }
    }

    async fn sent_invoice(svc: &InvoiceService) -> SalesInvoice {
        let invoice = svc.create(input(), "alice").await.unwrap();
        svc.issue(invoice.id(), StatusAction::by("alice")).await.unwrap();
        svc.send(invoice.id(), StatusAction::by("alice")).await.unwrap()
    }

    #[tokio::test]
    async fn test_due_date_from_payment_terms() {
        let svc = service();
        let invoice = svc.create(input(), "alice").await.unwrap();
        assert_eq!(invoice.due_date, invoice.invoice_date + Duration::days(30));
        assert_eq!(invoice.totals.total_amount, Money::new(dec!(357)));
    }

    #[tokio::test]
    async fn test_payments_until_paid() {
        let svc = service();
        let invoice = sent_invoice(&svc).await;

        let partly = svc
            .record_payment(invoice.id(), payment(Money::from_major(157)))
            .await
            .unwrap();
        assert_eq!(partly.status, InvoiceStatus::PartialPaid);
        assert_eq!(partly.remaining_amount(), Money::from_major(200));

        let paid = svc
            .record_payment(invoice.id(), payment(Money::from_major(200)))
            .await
            .unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert_eq!(paid.payments.len(), 2);
    }

    #[tokio::test]
    async fn test_overpayment_leaves_invoice_unchanged() {
        let svc = service();
        let invoice = sent_invoice(&svc).await;

        let err = svc
            .record_payment(invoice.id(), payment(Money::from_major(400)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidAmount(_)));

        let stored = svc.get(invoice.id()).await.unwrap();
        assert_eq!(stored.version(), invoice.version());
        assert!(stored.paid_amount.is_zero());
        assert_eq!(stored.status, InvoiceStatus::Sent);
    }

    #[tokio::test]
    async fn test_mark_overdue_is_idempotent() {
        let svc = service();
        let invoice = sent_invoice(&svc).await;
        let late = invoice.due_date + Duration::days(1);

        let err = svc
            .mark_overdue(invoice.id(), invoice.due_date, StatusAction::by("system"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition(_)));

        let (overdue, marked) = svc
            .mark_overdue(invoice.id(), late, StatusAction::by("system"))
            .await
            .unwrap();
        assert!(marked);
        assert_eq!(overdue.status.as_str(), "OVERDUE");

        let (again, marked) = svc
            .mark_overdue(invoice.id(), late, StatusAction::by("system"))
            .await
            .unwrap();
        assert!(!marked);
        assert_eq!(again.version(), overdue.version());
    }

    #[tokio::test]
    async fn test_cancel_paid_invoice_is_rejected() {
        let svc = service();
        let invoice = sent_invoice(&svc).await;
        let paid = svc
            .record_payment(invoice.id(), payment(Money::from_major(357)))
            .await
            .unwrap();

        let err = svc
            .cancel(invoice.id(), StatusAction::by("alice").because("duplicate"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition(_)));
        assert_eq!(svc.get(invoice.id()).await.unwrap().version(), paid.version());
    }
}
