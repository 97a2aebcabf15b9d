//! # Query Model
//!
//! Filter, sort and pagination shared by every repository implementation.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  stored documents (insertion order)                                    │
//! │       │                                                                 │
//! │       ▼  DocumentFilter::matches                                       │
//! │  matching documents                                                    │
//! │       │                                                                 │
//! │       ▼  stable sort by SortField / SortDirection                      │
//! │  ordered documents (ties keep insertion order)                         │
//! │       │                                                                 │
//! │       ▼  page window (1-based)                                         │
//! │  Page { items, total, page, pageSize, totalPages, hasNext, hasPrev }   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::cmp::Ordering;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sales_core::SalesDocument;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

// =============================================================================
// Filter
// =============================================================================

/// Exact-match, range and free-text criteria. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentFilter {
    pub customer_id: Option<String>,
    /// Wire name, e.g. `PARTIALLY_DELIVERED`.
    pub status: Option<String>,
    pub source_document_id: Option<String>,
    /// Inclusive lower bound on the document date.
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on the document date.
    pub date_to: Option<NaiveDate>,
    pub min_total: Option<Decimal>,
    pub max_total: Option<Decimal>,
    /// Case-insensitive substring over number, subject and description.
    pub search: Option<String>,
}

impl DocumentFilter {
    pub fn customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn source(mut self, source_document_id: impl Into<String>) -> Self {
        self.source_document_id = Some(source_document_id.into());
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// Whether `doc` satisfies every criterion that is set.
    pub fn matches<D: SalesDocument>(&self, doc: &D) -> bool {
        let meta = doc.meta();

        if let Some(customer_id) = &self.customer_id {
            if &meta.customer_id != customer_id {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if !doc.status_str().eq_ignore_ascii_case(status) {
                return false;
            }
        }
        if let Some(source) = &self.source_document_id {
            if meta.source_document_id.as_deref() != Some(source.as_str()) {
                return false;
            }
        }

        let date = doc.document_date();
        if self.date_from.is_some_and(|from| date < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| date > to) {
            return false;
        }

        let total = doc.totals().total_amount.amount();
        if self.min_total.is_some_and(|min| total < min) {
            return false;
        }
        if self.max_total.is_some_and(|max| total > max) {
            return false;
        }

        match self.search.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => doc.matches_search(&text.to_lowercase()),
            _ => true,
        }
    }
}

// =============================================================================
// Sorting
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Number,
    DocumentDate,
    #[default]
    CreatedAt,
    UpdatedAt,
    TotalAmount,
    Status,
    CustomerId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortField {
    fn compare<D: SalesDocument>(&self, a: &D, b: &D) -> Ordering {
        match self {
            SortField::Number => a.number().cmp(b.number()),
            SortField::DocumentDate => a.document_date().cmp(&b.document_date()),
            SortField::CreatedAt => a.meta().created_at.cmp(&b.meta().created_at),
            SortField::UpdatedAt => a.meta().updated_at.cmp(&b.meta().updated_at),
            SortField::TotalAmount => a.totals().total_amount.cmp(&b.totals().total_amount),
            SortField::Status => a.status_str().cmp(b.status_str()),
            SortField::CustomerId => a.meta().customer_id.cmp(&b.meta().customer_id),
        }
    }
}

// =============================================================================
// List Query
// =============================================================================

/// Page-size bounds, normally taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        PageLimits {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

/// A list request: filter, ordering and page window.
///
/// ## Example
/// ```rust,ignore
/// let query = ListQuery::default()
///     .filter(DocumentFilter::default().status("CONFIRMED"))
///     .sort_by(SortField::TotalAmount, SortDirection::Desc)
///     .page(2, 10);
/// let page = repo.list(&query).await?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListQuery {
    pub filter: DocumentFilter,
    pub sort: SortField,
    pub direction: SortDirection,
    /// 1-based page number.
    pub page: u32,
    pub page_size: Option<u32>,
    #[serde(skip)]
    pub limits: PageLimits,
}

impl Default for ListQuery {
    fn default() -> Self {
        ListQuery {
            filter: DocumentFilter::default(),
            sort: SortField::default(),
            direction: SortDirection::default(),
            page: 1,
            page_size: None,
            limits: PageLimits::default(),
        }
    }
}

impl ListQuery {
    pub fn filter(mut self, filter: DocumentFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sort_by(mut self, field: SortField, direction: SortDirection) -> Self {
        self.sort = field;
        self.direction = direction;
        self
    }

    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = Some(page_size);
        self
    }

    pub fn limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Requested page size, defaulted and capped by `limits`.
    pub fn resolved_page_size(&self) -> u32 {
        self.page_size
            .unwrap_or(self.limits.default_page_size)
            .clamp(1, self.limits.max_page_size.max(1))
    }

    /// Page number, never below 1.
    pub fn resolved_page(&self) -> u32 {
        self.page.max(1)
    }

    /// Filters, sorts and slices `docs`, which must be in insertion order.
    pub fn apply<D: SalesDocument>(&self, docs: Vec<D>) -> Page<D> {
        let mut matching: Vec<D> = docs
            .into_iter()
            .filter(|doc| self.filter.matches(doc))
            .collect();

        // sort_by is stable, so ties keep insertion order in both directions
        matching.sort_by(|a, b| match self.direction {
            SortDirection::Asc => self.sort.compare(a, b),
            SortDirection::Desc => self.sort.compare(b, a),
        });

        let page = self.resolved_page();
        let page_size = self.resolved_page_size();
        let total = matching.len() as u64;
        let offset = (page as usize - 1).saturating_mul(page_size as usize);

        let items = matching
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .collect();

        Page::new(items, total, page, page_size)
    }
}

// =============================================================================
// Page
// =============================================================================

/// One page of a list result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, page: u32, page_size: u32) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size as u64) as u32
        };

        Page {
            items,
            total,
            page,
            page_size,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }

    /// Maps the items, keeping the page envelope.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sales_core::{Money, NewLineItem, NewOrder, Percent, SalesOrder};

    fn order(customer: &str, subject: &str, qty: Decimal, day: u32) -> SalesOrder {
        let date = NaiveDate::from_ymd_opt(2024, 5, day).unwrap();
        SalesOrder::new(
            "SO",
            NewOrder {
                customer_id: customer.to_string(),
                subject: subject.to_string(),
                description: None,
                order_date: Some(date),
                requested_delivery_date: None,
                billing_address: None,
                delivery_address: None,
                source_document_id: None,
                items: vec![NewLineItem::new("Chair", qty, Money::from_major(10))
                    .with_tax_rate(Percent::zero())],
            },
            date,
            "alice",
        )
        .unwrap()
    }

    fn fixtures() -> Vec<SalesOrder> {
        vec![
            order("c1", "Office chairs", dec!(10), 3),
            order("c2", "Standing desks", dec!(30), 1),
            order("c1", "Lamps", dec!(10), 2),
        ]
    }

    #[test]
    fn test_filter_by_customer_and_search() {
        let query = ListQuery::default().filter(DocumentFilter::default().customer("c1"));
        let page = query.apply(fixtures());
        assert_eq!(page.total, 2);

        let query = ListQuery::default().filter(DocumentFilter::default().search("  DESKS "));
        let page = query.apply(fixtures());
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].subject, "Standing desks");
    }

    #[test]
    fn test_filter_by_ranges() {
        let mut filter = DocumentFilter::default();
        filter.min_total = Some(dec!(200));
        assert_eq!(ListQuery::default().filter(filter).apply(fixtures()).total, 1);

        let mut filter = DocumentFilter::default();
        filter.date_from = NaiveDate::from_ymd_opt(2024, 5, 2);
        filter.date_to = NaiveDate::from_ymd_opt(2024, 5, 3);
        assert_eq!(ListQuery::default().filter(filter).apply(fixtures()).total, 2);
    }

    #[test]
    fn test_sort_ties_keep_insertion_order() {
        let docs = fixtures();
        let expected = vec![docs[0].meta.id.clone(), docs[2].meta.id.clone()];

        for direction in [SortDirection::Asc, SortDirection::Desc] {
            let page = ListQuery::default()
                .sort_by(SortField::CustomerId, direction)
                .apply(docs.clone());
            let c1: Vec<String> = page
                .items
                .iter()
                .filter(|o| o.meta.customer_id == "c1")
                .map(|o| o.meta.id.clone())
                .collect();
            assert_eq!(c1, expected);
        }
    }

    #[test]
    fn test_sort_by_document_date_desc() {
        let page = ListQuery::default()
            .sort_by(SortField::DocumentDate, SortDirection::Desc)
            .apply(fixtures());
        let subjects: Vec<&str> = page.items.iter().map(|o| o.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Office chairs", "Lamps", "Standing desks"]);
    }

    #[test]
    fn test_pagination_envelope() {
        let page = ListQuery::default().page(2, 2).apply(fixtures());
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert!(!page.has_next);
        assert!(page.has_prev);

        let page = ListQuery::default().page(0, 500).apply(fixtures());
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_empty_result_has_no_pages() {
        let page = ListQuery::default()
            .filter(DocumentFilter::default().customer("nobody"))
            .apply(fixtures());
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next);
        assert!(!page.has_prev);
    }
}
