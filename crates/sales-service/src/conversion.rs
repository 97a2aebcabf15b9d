//! # Document Conversion
//!
//! Derives the next document in the order-to-cash chain from its source and
//! writes the fulfilled quantities back onto the source.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Conversion Pipeline                              │
//! │                                                                         │
//! │   1. load source            NotFound / VersionConflict                  │
//! │   2. status allowed?        InvalidState                                │
//! │   3. active derivative?     Conflict (unless partial mode)              │
//! │   4. plan quantities        NotFound / Validation / InvalidState        │
//! │   5. addresses, progress    Validation / InvalidState                   │
//! │   6. build target           Validation                                  │
//! │      (all on clones, nothing written yet)                               │
//! │  ───────────────────────────────────────────────────────────────────    │
//! │   7. create target + version-checked source write-backs                 │
//! │      with a UnitOfWork:  one WriteBatch, rolled back on any failure     │
//! │      without:            sequential writes; on failure delete the       │
//! │                          target, restore sources already written        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! | Conversion         | Source statuses                           | Already derived            |
//! |--------------------|-------------------------------------------|----------------------------|
//! | Offer → Order      | ACCEPTED                                  | Σ non-cancelled order qty  |
//! | Order → Delivery   | CONFIRMED, IN_PROGRESS, PARTIALLY_DELIVERED | order `deliveredQuantity` |
//! | Delivery → Invoice | DELIVERED, CONFIRMED                      | note `invoicedQuantity`    |
//!
//! Every conversion writes its source, even when only the version moves
//! (Offer → Order), so two conversions racing on one source cannot both
//! succeed.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info, warn};

use sales_core::delivery::INVOICEABLE_STATUSES;
use sales_core::derivation::{plan_derivation, PlannedLine, SourceLine};
use sales_core::line_item::LineQuantities;
use sales_core::order::DELIVERABLE_STATUSES;
use sales_core::{
    CoreResult, DeliveryNote, ItemLedger, LineItem, NewDeliveryNote, NewInvoice, NewLineItem,
    NewOrder, OfferStatus, OrderStatus, Percent, SalesDocument, SalesInvoice, SalesOffer,
    SalesOrder, ValidationError,
};
use sales_db::{UnitOfWork, WriteBatch};

use crate::dto::{ConvertDeliveryToInvoice, ConvertOfferToOrder, ConvertOrderToDelivery};
use crate::error::{ServiceError, ServiceResult};
use crate::services::{load, DeliveryService, InvoiceService, OrderService, Repo};
use crate::SalesRepositories;

pub struct ConversionService {
    offers: Repo<SalesOffer>,
    orders: Repo<SalesOrder>,
    deliveries: Repo<DeliveryNote>,
    invoices: Repo<SalesInvoice>,
    unit_of_work: Option<Arc<dyn UnitOfWork>>,
    order_service: OrderService,
    delivery_service: DeliveryService,
    invoice_service: InvoiceService,
}

impl ConversionService {
    pub fn new(
        repos: &SalesRepositories,
        order_service: OrderService,
        delivery_service: DeliveryService,
        invoice_service: InvoiceService,
    ) -> Self {
        ConversionService {
            offers: repos.offers.clone(),
            orders: repos.orders.clone(),
            deliveries: repos.deliveries.clone(),
            invoices: repos.invoices.clone(),
            unit_of_work: repos.unit_of_work.clone(),
            order_service,
            delivery_service,
            invoice_service,
        }
    }

    // =========================================================================
    // Offer → Order
    // =========================================================================

    /// Creates an order from an accepted offer.
    ///
    /// Ordered quantities are derived from the offer's existing,
    /// non-cancelled orders. The offer's content is unchanged but its
    /// version is bumped, so a concurrent conversion of the same offer
    /// fails with `VersionConflict` instead of over-ordering.
    pub async fn offer_to_order(&self, input: ConvertOfferToOrder) -> ServiceResult<SalesOrder> {
        let offer = load(&self.offers, &input.offer_id, input.expected_version).await?;
        if offer.status != OfferStatus::Accepted {
            return Err(not_convertible(&offer, "ACCEPTED"));
        }

        let existing = self.orders.find_by_source(offer.id()).await?;
        let partial = input.partial_quantities.as_ref();
        ensure_no_active_derivative(&offer, &existing, partial.is_some())?;

        let lines: Vec<SourceLine> = offer
            .items
            .iter()
            .map(|item| SourceLine {
                item_id: item.id.clone(),
                quantity: item.quantities.quantity,
                already_derived: existing
                    .iter()
                    .filter(|order| order.status != OrderStatus::Cancelled)
                    .flat_map(|order| order.items.iter())
                    .filter(|line| line.source_item_id.as_deref() == Some(item.id.as_str()))
                    .map(|line| line.quantities.quantity)
                    .sum(),
            })
            .collect();
        let plan = plan_derivation(&label(&offer), &lines, partial)?;
        let items = derive_items(&offer.items, &plan, input.tax_rate_override, |_| None)?;

        let mut touched_offer = offer.clone();
        touched_offer.meta_mut().touch(&input.actor);

        let order = self.order_service.build(
            NewOrder {
                customer_id: offer.meta.customer_id.clone(),
                subject: input.subject.unwrap_or_else(|| offer.subject.clone()),
                description: offer.description.clone(),
                order_date: input.order_date,
                requested_delivery_date: input.requested_delivery_date,
                billing_address: input
                    .billing_address
                    .or_else(|| offer.billing_address.clone()),
                delivery_address: input
                    .delivery_address
                    .or_else(|| offer.delivery_address.clone()),
                source_document_id: Some(offer.id().to_string()),
                items,
            },
            &input.actor,
        )?;

        match &self.unit_of_work {
            Some(uow) => {
                let mut batch = WriteBatch::new();
                batch
                    .create(&order)?
                    .update(&touched_offer, offer.version())?;
                commit(uow.as_ref(), batch, &label(&offer)).await?;
            }
            None => {
                self.orders.create(&order).await?;
                if let Err(err) = self.offers.update(&touched_offer, offer.version()).await {
                    warn!(
                        offer = %offer.number(),
                        order = %order.number(),
                        error = %err,
                        "Offer write-back failed, discarding order"
                    );
                    discard(&self.orders, order.id()).await;
                    return Err(err.into());
                }
            }
        }

        info!(
            offer = %offer.number(),
            order = %order.number(),
            lines = plan.len(),
            total = %order.totals.total_amount,
            "Offer converted to order"
        );
        Ok(order)
    }

    // =========================================================================
    // Order → Delivery Note
    // =========================================================================

    /// Creates a delivery note for the order's outstanding quantities and
    /// records them as delivered on the order.
    pub async fn order_to_delivery(
        &self,
        input: ConvertOrderToDelivery,
    ) -> ServiceResult<DeliveryNote> {
        let order = load(&self.orders, &input.order_id, input.expected_version).await?;
        if !DELIVERABLE_STATUSES.contains(&order.status) {
            return Err(not_convertible(
                &order,
                "CONFIRMED, IN_PROGRESS or PARTIALLY_DELIVERED",
            ));
        }

        let existing = self.deliveries.find_by_source(order.id()).await?;
        let partial = input.partial_quantities.as_ref();
        ensure_no_active_derivative(&order, &existing, partial.is_some())?;

        let lines: Vec<SourceLine> = order
            .items
            .iter()
            .map(|item| SourceLine {
                item_id: item.id.clone(),
                quantity: item.quantities.quantity,
                already_derived: item.quantities.delivered_quantity,
            })
            .collect();
        let plan = plan_derivation(&label(&order), &lines, partial)?;
        let items = derive_items(&order.items, &plan, input.tax_rate_override, |item| {
            Some(item.quantities.quantity)
        })?;

        let delivery_address = input
            .delivery_address
            .or_else(|| order.delivery_address.clone())
            .or_else(|| order.billing_address.clone())
            .ok_or_else(|| ValidationError::required("deliveryAddress"))?;

        let mut updated_order = order.clone();
        updated_order.apply_delivery_progress(&progress_of(&plan), &input.actor)?;
        updated_order.recompute_status(&input.actor)?;

        let note = self.delivery_service.build(
            NewDeliveryNote {
                customer_id: order.meta.customer_id.clone(),
                subject: input.subject.unwrap_or_else(|| order.subject.clone()),
                description: order.description.clone(),
                delivery_date: input.delivery_date,
                delivery_address,
                carrier: input.carrier,
                tracking_number: input.tracking_number,
                source_document_id: Some(order.id().to_string()),
                items,
            },
            &input.actor,
        )?;

        match &self.unit_of_work {
            Some(uow) => {
                let mut batch = WriteBatch::new();
                batch
                    .create(&note)?
                    .update(&updated_order, order.version())?;
                commit(uow.as_ref(), batch, &label(&order)).await?;
            }
            None => {
                self.deliveries.create(&note).await?;
                if let Err(err) = self.orders.update(&updated_order, order.version()).await {
                    warn!(
                        order = %order.number(),
                        delivery_note = %note.number(),
                        error = %err,
                        "Order write-back failed, discarding delivery note"
                    );
                    discard(&self.deliveries, note.id()).await;
                    return Err(err.into());
                }
            }
        }

        info!(
            order = %order.number(),
            delivery_note = %note.number(),
            order_status = %updated_order.status_str(),
            "Order converted to delivery note"
        );
        Ok(note)
    }

    // =========================================================================
    // Delivery Note → Invoice
    // =========================================================================

    /// Invoices delivered quantities of a note and records them as invoiced
    /// on the note and on the order behind it.
    pub async fn delivery_to_invoice(
        &self,
        input: ConvertDeliveryToInvoice,
    ) -> ServiceResult<SalesInvoice> {
        let actor = input.actor.as_str();
        let note = load(
            &self.deliveries,
            &input.delivery_note_id,
            input.expected_version,
        )
        .await?;
        if !INVOICEABLE_STATUSES.contains(&note.status) {
            return Err(not_convertible(&note, "DELIVERED or CONFIRMED"));
        }

        let existing = self.invoices.find_by_source(note.id()).await?;
        let partial = input.partial_quantities.as_ref();
        ensure_no_active_derivative(&note, &existing, partial.is_some())?;

        let lines: Vec<SourceLine> = note
            .items
            .iter()
            .map(|item| SourceLine {
                item_id: item.id.clone(),
                quantity: item.quantities.delivered_quantity,
                already_derived: item.quantities.invoiced_quantity,
            })
            .collect();
        let plan = plan_derivation(&label(&note), &lines, partial)?;
        let items = derive_items(&note.items, &plan, input.tax_rate_override, |item| {
            Some(item.quantities.delivered_quantity)
        })?;

        let order = match note.order_id() {
            Some(order_id) => Some(self.orders.get(order_id).await?),
            None => None,
        };
        let billing_address = input
            .billing_address
            .or_else(|| order.as_ref().and_then(|o| o.billing_address.clone()))
            .ok_or_else(|| ValidationError::required("billingAddress"))?;

        let mut updated_note = note.clone();
        updated_note.apply_invoicing_progress(&progress_of(&plan), actor)?;

        // Note items point at the order items they were delivered from.
        let order_progress: Vec<(String, Decimal)> = plan
            .iter()
            .filter_map(|line| {
                note.items
                    .get(&line.item_id)
                    .and_then(|item| item.source_item_id.clone())
                    .map(|order_item| (order_item, line.quantity))
            })
            .collect();
        let order_write = match order {
            Some(mut order) if !order_progress.is_empty() => {
                let loaded = order.version();
                order.apply_invoicing_progress(&order_progress, actor)?;
                order.recompute_status(actor)?;
                Some((loaded, order))
            }
            _ => None,
        };

        let invoice = self.invoice_service.build(
            NewInvoice {
                customer_id: note.meta.customer_id.clone(),
                subject: input.subject.unwrap_or_else(|| note.subject.clone()),
                description: note.description.clone(),
                invoice_date: input.invoice_date,
                due_date: input.due_date,
                billing_address,
                order_id: note.order_id().map(str::to_string),
                source_document_id: Some(note.id().to_string()),
                items,
            },
            actor,
        )?;

        match &self.unit_of_work {
            Some(uow) => {
                let mut batch = WriteBatch::new();
                batch
                    .create(&invoice)?
                    .update(&updated_note, note.version())?;
                if let Some((loaded, updated_order)) = &order_write {
                    batch.update(updated_order, *loaded)?;
                }
                commit(uow.as_ref(), batch, &label(&note)).await?;
            }
            None => {
                self.invoices.create(&invoice).await?;
                if let Err(err) = self.deliveries.update(&updated_note, note.version()).await {
                    warn!(
                        delivery_note = %note.number(),
                        invoice = %invoice.number(),
                        error = %err,
                        "Delivery note write-back failed, discarding invoice"
                    );
                    discard(&self.invoices, invoice.id()).await;
                    return Err(err.into());
                }

                if let Some((loaded, updated_order)) = &order_write {
                    if let Err(err) = self.orders.update(updated_order, *loaded).await {
                        warn!(
                            order = %updated_order.number(),
                            invoice = %invoice.number(),
                            error = %err,
                            "Order write-back failed, discarding invoice and restoring note"
                        );
                        discard(&self.invoices, invoice.id()).await;
                        restore(&self.deliveries, &note, &updated_note, actor).await;
                        return Err(err.into());
                    }
                }
            }
        }

        info!(
            delivery_note = %note.number(),
            invoice = %invoice.number(),
            total = %invoice.totals.total_amount,
            "Delivery note converted to invoice"
        );
        Ok(invoice)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn label<D: SalesDocument>(doc: &D) -> String {
    format!("{} {}", D::KIND.label(), doc.number())
}

fn not_convertible<D: SalesDocument>(doc: &D, allowed: &str) -> ServiceError {
    ServiceError::invalid_state(format!(
        "Cannot convert {} {}: status is {}, expected {}",
        D::KIND.label(),
        doc.number(),
        doc.status_str(),
        allowed
    ))
}

/// Without partial mode, a source may have only one active derivative.
fn ensure_no_active_derivative<S, T>(source: &S, existing: &[T], partial: bool) -> ServiceResult<()>
where
    S: SalesDocument,
    T: SalesDocument,
{
    if partial {
        return Ok(());
    }
    match existing.iter().find(|doc| doc.is_active()) {
        Some(active) => Err(ServiceError::conflict(format!(
            "{} {} already has active {} {}; use partial mode",
            S::KIND.label(),
            source.number(),
            T::KIND.label(),
            active.number()
        ))),
        None => Ok(()),
    }
}

/// Builds target line inputs from planned quantities.
fn derive_items<Q: LineQuantities>(
    ledger: &ItemLedger<Q>,
    plan: &[PlannedLine],
    tax_rate_override: Option<Percent>,
    reference: impl Fn(&LineItem<Q>) -> Option<Decimal>,
) -> CoreResult<Vec<NewLineItem>> {
    plan.iter()
        .map(|line| {
            let item = ledger.require(&line.item_id)?;
            Ok(item.derive_input(line.quantity, reference(item), tax_rate_override))
        })
        .collect()
}

fn progress_of(plan: &[PlannedLine]) -> Vec<(String, Decimal)> {
    plan.iter()
        .map(|line| (line.item_id.clone(), line.quantity))
        .collect()
}

/// Applies a conversion's writes in one transaction.
async fn commit(uow: &dyn UnitOfWork, batch: WriteBatch, source: &str) -> ServiceResult<()> {
    let writes = batch.len();
    if let Err(err) = uow.commit(batch).await {
        warn!(source = %source, writes, error = %err, "Conversion rolled back");
        return Err(err.into());
    }
    Ok(())
}

/// Deletes a target created by a conversion that could not complete.
async fn discard<D: SalesDocument>(repo: &Repo<D>, id: &str) {
    if let Err(err) = repo.delete(id).await {
        error!(
            kind = D::KIND.as_str(),
            id = %id,
            error = %err,
            "Failed to discard converted document"
        );
    }
}

/// Writes `snapshot`'s content back over `written`, as a new version.
async fn restore<D: SalesDocument>(repo: &Repo<D>, snapshot: &D, written: &D, actor: &str) {
    let mut restored = snapshot.clone();
    restored.meta_mut().version = written.version();
    restored.meta_mut().touch(actor);

    if let Err(err) = repo.update(&restored, written.version()).await {
        error!(
            kind = D::KIND.as_str(),
            number = %snapshot.number(),
            error = %err,
            "Failed to restore document after aborted conversion"
        );
    }
}
