//! # Write Batches
//!
//! Several document writes that must land together, such as a conversion
//! creating an invoice while advancing the delivery note and order it came
//! from.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  WriteBatch::new()                                                     │
//! │    .create(&invoice)               INSERT                              │
//! │    .update(&note, loaded_version)  UPDATE ... AND version = ?          │
//! │    .update(&order, loaded_version) UPDATE ... AND version = ?          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UnitOfWork::commit(batch)                                             │
//! │       │                                                                 │
//! │       ├── all writes applied ──► COMMIT                                │
//! │       └── any write fails    ──► ROLLBACK, first error returned        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Documents are encoded when they are added, so one batch can mix kinds.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use sales_core::SalesDocument;

use crate::error::DbResult;

/// A document flattened into the columns of `sales_documents`.
#[derive(Debug, Clone)]
pub(crate) struct DocumentRow {
    pub kind: &'static str,
    pub label: &'static str,
    pub id: String,
    pub number: String,
    pub customer_id: String,
    pub status: &'static str,
    pub source_document_id: Option<String>,
    pub document_date: NaiveDate,
    pub total_amount: String,
    pub version: i64,
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRow {
    pub(crate) fn encode<D: SalesDocument>(doc: &D) -> DbResult<Self> {
        let meta = doc.meta();
        Ok(DocumentRow {
            kind: D::KIND.as_str(),
            label: D::KIND.label(),
            id: meta.id.clone(),
            number: meta.number.clone(),
            customer_id: meta.customer_id.clone(),
            status: doc.status_str(),
            source_document_id: meta.source_document_id.clone(),
            document_date: doc.document_date(),
            total_amount: doc.totals().total_amount.amount().to_string(),
            version: meta.version as i64,
            payload: serde_json::to_string(doc)?,
            created_at: meta.created_at,
            updated_at: meta.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) enum PendingWrite {
    Create(DocumentRow),
    Update {
        row: DocumentRow,
        expected_version: u64,
    },
}

/// Ordered document writes to apply atomically.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    writes: Vec<PendingWrite>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the insert of a new document.
    pub fn create<D: SalesDocument>(&mut self, doc: &D) -> DbResult<&mut Self> {
        self.writes.push(PendingWrite::Create(DocumentRow::encode(doc)?));
        Ok(self)
    }

    /// Queues a version-checked replace, as [`DocumentRepository::update`] does.
    ///
    /// [`DocumentRepository::update`]: super::DocumentRepository::update
    pub fn update<D: SalesDocument>(
        &mut self,
        doc: &D,
        expected_version: u64,
    ) -> DbResult<&mut Self> {
        self.writes.push(PendingWrite::Update {
            row: DocumentRow::encode(doc)?,
            expected_version,
        });
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub(crate) fn into_writes(self) -> Vec<PendingWrite> {
        self.writes
    }
}

/// A store that can apply a [`WriteBatch`] all-or-nothing.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Applies every queued write, or none of them.
    ///
    /// ## Errors
    /// The first failing write's error (`Duplicate`, `NotFound`,
    /// `VersionConflict`, ...). Nothing from the batch is kept.
    async fn commit(&self, batch: WriteBatch) -> DbResult<()>;
}
