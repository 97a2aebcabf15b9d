//! # sales-db: Storage Layer for the Order-to-Cash Pipeline
//!
//! This crate stores offers, orders, delivery notes and invoices. It offers
//! one repository contract with an in-memory and a SQLite implementation.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Order-to-Cash Data Flow                          │
//! │                                                                         │
//! │  sales-service (OrderService, ConversionService, ...)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     sales-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ InMemory      │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ Sqlite        │    │ 001_docs.sql │  │   │
//! │  │   │               │    │ ListQuery     │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (sales_documents)                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository contract, query model, stores, write batches
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sales_db::{Database, DbConfig, DocumentRepository, ListQuery};
//!
//! let db = Database::new(DbConfig::new("path/to/sales.db")).await?;
//! let page = db.orders().list(&ListQuery::default()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::batch::{UnitOfWork, WriteBatch};
pub use repository::memory::InMemoryRepository;
pub use repository::query::{
    DocumentFilter, ListQuery, Page, PageLimits, SortDirection, SortField, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
pub use repository::sqlite::{SqliteDocumentRepository, SqliteUnitOfWork};
pub use repository::DocumentRepository;
