//! # Document Services
//!
//! One service per document type. Each operation follows the same shape:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  load(id)                     NotFound                                  │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  caller's expected version?   VersionConflict (nothing changed)         │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  document method              InvalidState / InvalidTransition / ...    │
//! │    │                          (document untouched on error)             │
//! │    ▼                                                                    │
//! │  repo.update(doc, loaded)     VersionConflict if someone wrote first    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Order and delivery services see each other only through the narrow
//! read-only traits [`OrderProgressSource`] and [`DeliveryLookup`].

pub mod delivery;
pub mod invoice;
pub mod offer;
pub mod order;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use sales_core::validation::{validate_page_size, validate_search_query};
use sales_core::{
    CoreResult, DeliveryNote, DocumentStatus, ItemProgress, SalesDocument, ValidationError,
};
use sales_db::{DocumentRepository, ListQuery, Page};

use crate::config::SalesConfig;
use crate::error::{ServiceError, ServiceResult};

pub use delivery::DeliveryService;
pub use invoice::InvoiceService;
pub use offer::OfferService;
pub use order::OrderService;

/// Shared handle to a document repository.
pub type Repo<D> = Arc<dyn DocumentRepository<D>>;

// =============================================================================
// Cross-Document Seams
// =============================================================================

/// Read-only view of an order's per-item progress.
#[async_trait]
pub trait OrderProgressSource: Send + Sync {
    async fn get_item_progress(&self, order_id: &str) -> ServiceResult<Vec<ItemProgress>>;
}

/// Read-only lookup of delivery notes by order.
#[async_trait]
pub trait DeliveryLookup: Send + Sync {
    /// Delivery notes of the order that still count as active.
    async fn list_active_by_order_id(&self, order_id: &str) -> ServiceResult<Vec<DeliveryNote>>;
}

// =============================================================================
// Shared Helpers
// =============================================================================

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Rejects a caller that saw an older (or newer) version.
pub(crate) fn check_version<D: SalesDocument>(doc: &D, expected: Option<u64>) -> ServiceResult<()> {
    match expected {
        Some(expected) if expected != doc.version() => Err(ServiceError::VersionConflict {
            entity: D::KIND.label().to_string(),
            id: doc.id().to_string(),
            expected,
            actual: doc.version(),
        }),
        _ => Ok(()),
    }
}

/// Loads a document and checks the caller's expected version.
pub(crate) async fn load<D: SalesDocument>(
    repo: &Repo<D>,
    id: &str,
    expected: Option<u64>,
) -> ServiceResult<D> {
    let doc = repo.get(id).await?;
    check_version(&doc, expected)?;
    Ok(doc)
}

/// Load, apply `change`, write back against the loaded version.
///
/// Nothing is written when `change` fails or leaves the version untouched.
pub(crate) async fn mutate_with<D, R, F>(
    repo: &Repo<D>,
    id: &str,
    expected: Option<u64>,
    change: F,
) -> ServiceResult<(D, R)>
where
    D: SalesDocument,
    F: FnOnce(&mut D) -> CoreResult<R>,
{
    let mut doc = load(repo, id, expected).await?;
    let loaded = doc.version();

    let out = change(&mut doc)?;

    if doc.version() != loaded {
        repo.update(&doc, loaded).await?;
    }
    Ok((doc, out))
}

pub(crate) async fn mutate<D, F>(
    repo: &Repo<D>,
    id: &str,
    expected: Option<u64>,
    change: F,
) -> ServiceResult<D>
where
    D: SalesDocument,
    F: FnOnce(&mut D) -> CoreResult<()>,
{
    mutate_with(repo, id, expected, change)
        .await
        .map(|(doc, ())| doc)
}

/// Manually created documents may not claim a source; links come from conversions.
pub(crate) fn ensure_no_source(source_document_id: Option<&String>) -> ServiceResult<()> {
    if source_document_id.is_some() {
        return Err(ValidationError::InvalidFormat {
            field: "sourceDocumentId".to_string(),
            reason: "set by conversion only".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Deletes a manually created document that is still in its initial status.
///
/// Derived documents are cancelled instead, so the quantities they took from
/// their source stay accounted for.
pub(crate) async fn delete_initial<D: SalesDocument>(
    repo: &Repo<D>,
    id: &str,
    expected: Option<u64>,
) -> ServiceResult<()> {
    let doc = load(repo, id, expected).await?;
    let status = doc.status();
    if status != D::Status::INITIAL {
        return Err(ServiceError::invalid_state(format!(
            "Only {} documents can be deleted; {} {} is {}",
            D::Status::INITIAL.as_str(),
            D::KIND,
            doc.number(),
            status.as_str()
        )));
    }
    if let Some(source) = &doc.meta().source_document_id {
        return Err(ServiceError::invalid_state(format!(
            "{} {} was derived from {} and can only be cancelled",
            D::KIND,
            doc.number(),
            source
        )));
    }
    repo.delete(id).await?;
    Ok(())
}

/// Lists with configured page limits and a validated search string.
pub(crate) async fn list<D: SalesDocument>(
    repo: &Repo<D>,
    query: ListQuery,
    config: &SalesConfig,
) -> ServiceResult<Page<D>> {
    let mut query = query.limits(config.page_limits());

    if let Some(size) = query.page_size {
        validate_page_size(size.min(config.query.max_page_size), config.query.max_page_size)?;
    }
    if let Some(search) = query.filter.search.take() {
        let search = validate_search_query(&search)?;
        query.filter.search = (!search.is_empty()).then_some(search);
    }

    Ok(repo.list(&query).await?)
}

/// Every document matching `query`'s filter, across all pages.
pub(crate) async fn collect_all<D: SalesDocument>(
    repo: &Repo<D>,
    query: ListQuery,
) -> ServiceResult<Vec<D>> {
    let mut all = Vec::new();
    let mut page_number = 1;
    loop {
        let limits = query.limits;
        let page = repo
            .list(&query.clone().page(page_number, limits.max_page_size))
            .await?;
        all.extend(page.items);
        if !page.has_next {
            return Ok(all);
        }
        page_number += 1;
    }
}
