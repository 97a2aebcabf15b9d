//! # Repository Module
//!
//! Storage contract for sales documents and its two implementations.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One Contract, Two Stores                             │
//! │                                                                         │
//! │  OrderService / ConversionService                                      │
//! │       │                                                                 │
//! │       │  repo.update(&order, loaded_version)                           │
//! │       ▼                                                                 │
//! │  Arc<dyn DocumentRepository<SalesOrder>>                               │
//! │       │                                                                 │
//! │       ├──► InMemoryRepository     (tests, default backend)             │
//! │       └──► SqliteDocumentRepository (sales_documents table)            │
//! │                                                                         │
//! │  Both stores:                                                          │
//! │  • reject duplicate ids and numbers                                   │
//! │  • reject stale writes (stored version ≠ expected version)            │
//! │  • list through the same ListQuery::apply                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes that must land together go through a [`batch::WriteBatch`] and a
//! [`batch::UnitOfWork`]. Only the SQLite store provides one; callers on the
//! in-memory store fall back to compensating writes.
//!
//! Repositories hold no business rules. Deleting only drafts, for example,
//! is enforced by the services.

pub mod batch;
pub mod memory;
pub mod query;
pub mod sqlite;

use async_trait::async_trait;

use sales_core::SalesDocument;

use crate::error::{DbError, DbResult};
use query::{ListQuery, Page};

/// Persistence operations for one document type.
#[async_trait]
pub trait DocumentRepository<D: SalesDocument>: Send + Sync {
    /// Stores a new document.
    ///
    /// ## Errors
    /// - `Duplicate` if the id or number is already taken
    async fn create(&self, doc: &D) -> DbResult<()>;

    async fn find_by_id(&self, id: &str) -> DbResult<Option<D>>;

    async fn find_by_number(&self, number: &str) -> DbResult<Option<D>>;

    /// Replaces a stored document if its stored version is `expected_version`.
    ///
    /// ## Errors
    /// - `NotFound` if the id is unknown
    /// - `VersionConflict` if the stored version differs
    async fn update(&self, doc: &D, expected_version: u64) -> DbResult<()>;

    /// Removes a document unconditionally.
    async fn delete(&self, id: &str) -> DbResult<()>;

    async fn list(&self, query: &ListQuery) -> DbResult<Page<D>>;

    /// All documents whose `source_document_id` is `source_id`, in insertion order.
    async fn find_by_source(&self, source_id: &str) -> DbResult<Vec<D>>;

    /// Like `find_by_id`, but a missing document is an error.
    async fn get(&self, id: &str) -> DbResult<D> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found(D::KIND.label(), id))
    }
}
