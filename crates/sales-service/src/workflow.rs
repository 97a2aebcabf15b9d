//! # Workflow Service
//!
//! Operations that look across documents: guarded cancellation, the overdue
//! sweep and order status re-aggregation.
//!
//! ## Cancellation Guards
//!
//! ```text
//! cancel order          ── active delivery notes?      ──► InvalidState
//! cancel delivery note  ── non-cancelled invoices?     ──► InvalidState
//! ```
//!
//! Progress counters are cumulative. Cancelling a delivery note does not
//! give its quantity back to the order.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use sales_core::{DeliveryNote, InvoiceStatus, SalesDocument, SalesInvoice, SalesOrder};
use sales_db::{DbError, ListQuery};

use crate::dto::StatusAction;
use crate::error::{ServiceError, ServiceResult};
use crate::services::{collect_all, load, mutate_with, DeliveryLookup, Repo};
use crate::SalesRepositories;

pub struct WorkflowService {
    orders: Repo<SalesOrder>,
    deliveries: Repo<DeliveryNote>,
    invoices: Repo<SalesInvoice>,
    delivery_lookup: Arc<dyn DeliveryLookup>,
}

impl WorkflowService {
    pub fn new(repos: &SalesRepositories, delivery_lookup: Arc<dyn DeliveryLookup>) -> Self {
        WorkflowService {
            orders: repos.orders.clone(),
            deliveries: repos.deliveries.clone(),
            invoices: repos.invoices.clone(),
            delivery_lookup,
        }
    }

    /// Cancels an order that has no active delivery notes.
    pub async fn cancel_order(&self, id: &str, action: StatusAction) -> ServiceResult<SalesOrder> {
        let mut order = load(&self.orders, id, action.expected_version).await?;

        let active = self.delivery_lookup.list_active_by_order_id(id).await?;
        if !active.is_empty() {
            let numbers: Vec<&str> = active.iter().map(|note| note.number()).collect();
            return Err(ServiceError::invalid_state(format!(
                "Cannot cancel order {}: active delivery notes {}",
                order.number(),
                numbers.join(", ")
            )));
        }

        let loaded = order.version();
        order.cancel(action.reason, &action.actor)?;
        self.orders.update(&order, loaded).await?;

        info!(number = %order.number(), actor = %action.actor, "Order cancelled");
        Ok(order)
    }

    /// Cancels a delivery note that no live invoice references.
    pub async fn cancel_delivery_note(
        &self,
        id: &str,
        action: StatusAction,
    ) -> ServiceResult<DeliveryNote> {
        let mut note = load(&self.deliveries, id, action.expected_version).await?;

        let invoices = self.invoices.find_by_source(id).await?;
        if let Some(invoice) = invoices
            .iter()
            .find(|invoice| invoice.status != InvoiceStatus::Cancelled)
        {
            return Err(ServiceError::invalid_state(format!(
                "Cannot cancel delivery note {}: referenced by invoice {} ({})",
                note.number(),
                invoice.number(),
                invoice.status_str()
            )));
        }

        let loaded = note.version();
        note.cancel(action.reason, &action.actor)?;
        self.deliveries.update(&note, loaded).await?;

        info!(number = %note.number(), actor = %action.actor, "Delivery note cancelled");
        Ok(note)
    }

    /// Marks every open invoice past its due date as overdue.
    ///
    /// Returns the ids marked by this call. Invoices already overdue are
    /// skipped, so running the sweep twice marks nothing the second time.
    /// An invoice changed concurrently is left for the next sweep.
    pub async fn mark_overdue_invoices(
        &self,
        today: NaiveDate,
        actor: &str,
    ) -> ServiceResult<Vec<String>> {
        let invoices = collect_all(&self.invoices, ListQuery::default()).await?;

        let mut marked = Vec::new();
        for mut invoice in invoices {
            if invoice.status == InvoiceStatus::Overdue || !invoice.is_overdue(today) {
                continue;
            }
            let loaded = invoice.version();
            invoice.mark_overdue(today, actor)?;

            match self.invoices.update(&invoice, loaded).await {
                Ok(()) => marked.push(invoice.id().to_string()),
                Err(DbError::VersionConflict { .. }) => {
                    warn!(
                        number = %invoice.number(),
                        "Invoice changed during overdue sweep, skipped"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        info!(%today, marked = marked.len(), "Overdue sweep finished");
        Ok(marked)
    }

    /// Re-derives the order status from its item counters.
    ///
    /// Writes only when the status changes; returns whether it did.
    pub async fn recompute_order_status(
        &self,
        order_id: &str,
        actor: &str,
    ) -> ServiceResult<(SalesOrder, bool)> {
        mutate_with(&self.orders, order_id, None, |order| order.recompute_status(actor)).await
    }
}
