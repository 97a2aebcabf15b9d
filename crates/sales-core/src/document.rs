//! # Document Traits
//!
//! Behaviour shared by offers, orders, delivery notes and invoices.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SalesDocument                                                          │
//! │  ├── meta()          id, number, customer, source, version, audit       │
//! │  ├── status()        per-type state machine (DocumentStatus)           │
//! │  ├── totals()        subtotal / tax / total, derived from items        │
//! │  └── is_active()     counts as a live derivative of its source         │
//! │                                                                         │
//! │  Repositories filter, sort and store through this trait only.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt::Debug;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::types::{DocumentKind, DocumentMeta, DocumentTotals};

/// A document status enum.
pub trait DocumentStatus: Debug + Copy + Eq + Send + Sync + 'static {
    /// Status every document of this type starts in.
    const INITIAL: Self;

    /// Wire/storage name (`PARTIALLY_DELIVERED`, ...).
    fn as_str(&self) -> &'static str;

    /// Terminal statuses accept no further transitions.
    fn is_terminal(&self) -> bool;
}

/// Common read surface of the four document types.
pub trait SalesDocument:
    Debug + Clone + Send + Sync + Serialize + DeserializeOwned + 'static
{
    type Status: DocumentStatus;

    const KIND: DocumentKind;

    fn meta(&self) -> &DocumentMeta;

    fn meta_mut(&mut self) -> &mut DocumentMeta;

    fn status(&self) -> Self::Status;

    fn subject(&self) -> &str;

    fn description(&self) -> Option<&str>;

    /// Offer date, order date, delivery date or invoice date.
    fn document_date(&self) -> NaiveDate;

    fn totals(&self) -> &DocumentTotals;

    /// Whether the document blocks a full re-conversion of its source.
    fn is_active(&self) -> bool;

    fn id(&self) -> &str {
        &self.meta().id
    }

    fn number(&self) -> &str {
        &self.meta().number
    }

    fn version(&self) -> u64 {
        self.meta().version
    }

    fn status_str(&self) -> &'static str {
        self.status().as_str()
    }

    /// Case-insensitive substring match over number, subject and description.
    ///
    /// `needle` must already be lower-cased.
    fn matches_search(&self, needle: &str) -> bool {
        self.number().to_lowercase().contains(needle)
            || self.subject().to_lowercase().contains(needle)
            || self
                .description()
                .map(|d| d.to_lowercase().contains(needle))
                .unwrap_or(false)
    }
}

/// Fails with `InvalidState` unless the document is still in its initial status.
pub(crate) fn ensure_editable<D: SalesDocument>(doc: &D) -> CoreResult<()> {
    let status = doc.status();
    if status != D::Status::INITIAL {
        return Err(CoreError::invalid_state(format!(
            "{} {} can only be edited while {}; it is {}",
            D::KIND,
            doc.number(),
            D::Status::INITIAL.as_str(),
            status.as_str()
        )));
    }
    Ok(())
}

/// Like [`ensure_editable`], and also refuses documents created by a conversion.
///
/// A derived document's quantities are already counted on its source, so its
/// items stay fixed for its whole life.
pub(crate) fn ensure_items_editable<D: SalesDocument>(doc: &D) -> CoreResult<()> {
    ensure_editable(doc)?;
    if let Some(source) = &doc.meta().source_document_id {
        return Err(CoreError::invalid_state(format!(
            "Items of {} {} are fixed: it was derived from {}",
            D::KIND,
            doc.number(),
            source
        )));
    }
    Ok(())
}

/// Fails with `InvalidTransition` unless the current status is one of `allowed`.
pub(crate) fn ensure_status<D: SalesDocument>(
    doc: &D,
    allowed: &[D::Status],
    action: &str,
) -> CoreResult<()> {
    let status = doc.status();
    if !allowed.contains(&status) {
        return Err(CoreError::transition(
            D::KIND.label(),
            doc.number(),
            status.as_str(),
            action,
        ));
    }
    Ok(())
}

/// Fails with `InvalidState` when a document has no items to carry forward.
pub(crate) fn ensure_has_items<D: SalesDocument>(
    doc: &D,
    has_items: bool,
    action: &str,
) -> CoreResult<()> {
    if !has_items {
        return Err(CoreError::invalid_state(format!(
            "Cannot {} {} {} without line items",
            action,
            D::KIND,
            doc.number()
        )));
    }
    Ok(())
}

/// Merges per-item progress entries, summing repeated item ids.
///
/// Every amount must be positive. Order of first appearance is kept.
pub(crate) fn merge_progress(
    entries: &[(String, Decimal)],
) -> CoreResult<Vec<(String, Decimal)>> {
    let mut merged: Vec<(String, Decimal)> = Vec::with_capacity(entries.len());
    for (item_id, quantity) in entries {
        if *quantity <= Decimal::ZERO {
            return Err(CoreError::invalid_state(format!(
                "Progress for item {} must be positive, got {}",
                item_id, quantity
            )));
        }
        match merged.iter_mut().find(|(id, _)| id == item_id) {
            Some((_, total)) => *total += *quantity,
            None => merged.push((item_id.clone(), *quantity)),
        }
    }
    Ok(merged)
}
