//! # SQLite Repository
//!
//! Stores documents in the `sales_documents` table.
//!
//! ## Row Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  seq │ id │ kind │ number │ customer_id │ status │ source_document_id │ │
//! │  document_date │ total_amount │ version │ payload (JSON) │ timestamps  │
//! │                                                                         │
//! │  • header columns mirror the payload and are rewritten on every update  │
//! │  • UPDATE ... WHERE id = ? AND version = ? is the optimistic lock       │
//! │  • seq (AUTOINCREMENT) is the insertion order used for stable sorting   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`SqliteUnitOfWork`] runs the same row writes inside one transaction.
//!
//! Listing loads the rows of one kind in `seq` order and hands them to
//! [`ListQuery::apply`], so both stores sort and filter identically.

use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use sales_core::SalesDocument;

use super::batch::{DocumentRow, PendingWrite, UnitOfWork, WriteBatch};
use super::query::{ListQuery, Page};
use super::DocumentRepository;
use crate::error::{DbError, DbResult};

// =============================================================================
// Row Writes
// =============================================================================
// Shared by single-document writes and batches, so both paths run the same
// statements and the same version check.

async fn insert_row(conn: &mut SqliteConnection, row: &DocumentRow) -> DbResult<()> {
    debug!(kind = row.kind, id = %row.id, number = %row.number, "Inserting document");

    sqlx::query(
        r#"
        INSERT INTO sales_documents (
            id, kind, number, customer_id, status, source_document_id,
            document_date, total_amount, version, payload,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&row.id)
    .bind(row.kind)
    .bind(&row.number)
    .bind(&row.customer_id)
    .bind(row.status)
    .bind(row.source_document_id.as_deref())
    .bind(row.document_date)
    .bind(&row.total_amount)
    .bind(row.version)
    .bind(&row.payload)
    .bind(row.created_at)
    .bind(row.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn update_row(
    conn: &mut SqliteConnection,
    row: &DocumentRow,
    expected_version: u64,
) -> DbResult<()> {
    debug!(
        kind = row.kind,
        id = %row.id,
        from = expected_version,
        to = row.version,
        "Updating document"
    );

    let result = sqlx::query(
        r#"
        UPDATE sales_documents SET
            customer_id = ?1,
            status = ?2,
            source_document_id = ?3,
            document_date = ?4,
            total_amount = ?5,
            version = ?6,
            payload = ?7,
            updated_at = ?8
        WHERE kind = ?9 AND id = ?10 AND version = ?11
        "#,
    )
    .bind(&row.customer_id)
    .bind(row.status)
    .bind(row.source_document_id.as_deref())
    .bind(row.document_date)
    .bind(&row.total_amount)
    .bind(row.version)
    .bind(&row.payload)
    .bind(row.updated_at)
    .bind(row.kind)
    .bind(&row.id)
    .bind(expected_version as i64)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let stored: Option<i64> = sqlx::query_scalar(
            "SELECT version FROM sales_documents WHERE kind = ?1 AND id = ?2",
        )
        .bind(row.kind)
        .bind(&row.id)
        .fetch_optional(&mut *conn)
        .await?;

        return Err(match stored {
            Some(actual) => {
                DbError::version_conflict(row.label, &row.id, expected_version, actual as u64)
            }
            None => DbError::not_found(row.label, &row.id),
        });
    }

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for one document kind backed by SQLite.
#[derive(Debug, Clone)]
pub struct SqliteDocumentRepository<D> {
    pool: SqlitePool,
    _kind: PhantomData<fn() -> D>,
}

impl<D: SalesDocument> SqliteDocumentRepository<D> {
    /// Creates a new repository for `D` over the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        SqliteDocumentRepository {
            pool,
            _kind: PhantomData,
        }
    }

    fn decode(payload: &str) -> DbResult<D> {
        Ok(serde_json::from_str(payload)?)
    }

    fn decode_all(payloads: Vec<String>) -> DbResult<Vec<D>> {
        payloads.iter().map(|p| Self::decode(p)).collect()
    }
}

#[async_trait]
impl<D: SalesDocument> DocumentRepository<D> for SqliteDocumentRepository<D> {
    async fn create(&self, doc: &D) -> DbResult<()> {
        let row = DocumentRow::encode(doc)?;
        let mut conn = self.pool.acquire().await?;
        insert_row(&mut conn, &row).await
    }

    async fn find_by_id(&self, id: &str) -> DbResult<Option<D>> {
        let payload: Option<String> = sqlx::query_scalar(
            "SELECT payload FROM sales_documents WHERE kind = ?1 AND id = ?2",
        )
        .bind(D::KIND.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        payload.as_deref().map(Self::decode).transpose()
    }

    async fn find_by_number(&self, number: &str) -> DbResult<Option<D>> {
        let payload: Option<String> = sqlx::query_scalar(
            "SELECT payload FROM sales_documents WHERE kind = ?1 AND number = ?2",
        )
        .bind(D::KIND.as_str())
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        payload.as_deref().map(Self::decode).transpose()
    }

    async fn update(&self, doc: &D, expected_version: u64) -> DbResult<()> {
        let row = DocumentRow::encode(doc)?;
        let mut conn = self.pool.acquire().await?;
        update_row(&mut conn, &row, expected_version).await
    }

    async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(kind = D::KIND.as_str(), id = %id, "Deleting document");

        let result = sqlx::query("DELETE FROM sales_documents WHERE kind = ?1 AND id = ?2")
            .bind(D::KIND.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(D::KIND.label(), id));
        }
        Ok(())
    }

    async fn list(&self, query: &ListQuery) -> DbResult<Page<D>> {
        let payloads: Vec<String> = sqlx::query_scalar(
            "SELECT payload FROM sales_documents WHERE kind = ?1 ORDER BY seq",
        )
        .bind(D::KIND.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(query.apply(Self::decode_all(payloads)?))
    }

    async fn find_by_source(&self, source_id: &str) -> DbResult<Vec<D>> {
        let payloads: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT payload FROM sales_documents
            WHERE kind = ?1 AND source_document_id = ?2
            ORDER BY seq
            "#,
        )
        .bind(D::KIND.as_str())
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;

        Self::decode_all(payloads)
    }
}

// =============================================================================
// Unit of Work
// =============================================================================

/// Applies write batches inside one SQLite transaction.
#[derive(Debug, Clone)]
pub struct SqliteUnitOfWork {
    pool: SqlitePool,
}

impl SqliteUnitOfWork {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteUnitOfWork { pool }
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    async fn commit(&self, batch: WriteBatch) -> DbResult<()> {
        let writes = batch.into_writes();
        debug!(writes = writes.len(), "Committing write batch");

        // Dropping `tx` on an early return rolls everything back.
        let mut tx = self.pool.begin().await?;
        for write in &writes {
            match write {
                PendingWrite::Create(row) => insert_row(&mut *tx, row).await?,
                PendingWrite::Update {
                    row,
                    expected_version,
                } => update_row(&mut *tx, row, *expected_version).await?,
            }
        }
        tx.commit().await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::query::{DocumentFilter, SortDirection, SortField};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use sales_core::{Money, NewLineItem, NewOrder, OrderStatus, Percent, SalesOrder};

    fn order(customer: &str, qty: rust_decimal::Decimal) -> SalesOrder {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        SalesOrder::new(
            "SO",
            NewOrder {
                customer_id: customer.to_string(),
                subject: "Office chairs".to_string(),
                description: Some("Second floor".to_string()),
                order_date: None,
                requested_delivery_date: None,
                billing_address: None,
                delivery_address: None,
                source_document_id: Some("offer-1".to_string()),
                items: vec![NewLineItem::new("Chair", qty, Money::from_major(10))
                    .with_tax_rate(Percent::from_whole(19))],
            },
            today,
            "alice",
        )
        .unwrap()
    }

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_through_payload() {
        let db = setup().await;
        let repo = db.orders();
        let doc = order("c1", dec!(100));
        repo.create(&doc).await.unwrap();

        let loaded = repo.find_by_id(doc.id()).await.unwrap().unwrap();
        assert_eq!(loaded, doc);
        assert_eq!(loaded.totals.total_amount, Money::from_major(1190));

        let by_number = repo.find_by_number(doc.number()).await.unwrap();
        assert!(by_number.is_some());
    }

    #[tokio::test]
    async fn test_kinds_are_isolated() {
        let db = setup().await;
        let doc = order("c1", dec!(1));
        db.orders().create(&doc).await.unwrap();

        assert!(db.offers().find_by_id(doc.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let db = setup().await;
        let doc = order("c1", dec!(1));
        db.orders().create(&doc).await.unwrap();

        let err = db.orders().create(&doc).await.unwrap_err();
        assert!(matches!(err, DbError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn test_optimistic_lock() {
        let db = setup().await;
        let repo = db.orders();
        let mut doc = order("c1", dec!(1));
        repo.create(&doc).await.unwrap();

        doc.confirm("alice").unwrap();
        repo.update(&doc, 1).await.unwrap();
        let stored = repo.get(doc.id()).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Confirmed);
        assert_eq!(stored.version(), 2);

        let err = repo.update(&doc, 1).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::VersionConflict { expected: 1, actual: 2, .. }
        ));

        repo.delete(doc.id()).await.unwrap();
        let err = repo.update(&doc, 2).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_batch_commits_all_writes() {
        let db = setup().await;
        let mut existing = order("c1", dec!(5));
        db.orders().create(&existing).await.unwrap();
        let fresh = order("c2", dec!(7));

        existing.confirm("alice").unwrap();
        let mut batch = WriteBatch::new();
        batch.create(&fresh).unwrap().update(&existing, 1).unwrap();
        assert_eq!(batch.len(), 2);
        db.unit_of_work().commit(batch).await.unwrap();

        assert!(db.orders().find_by_id(fresh.id()).await.unwrap().is_some());
        let stored = db.orders().get(existing.id()).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Confirmed);
        assert_eq!(stored.version(), 2);
    }

    #[tokio::test]
    async fn test_batch_rolls_back_on_stale_update() {
        let db = setup().await;
        let mut existing = order("c1", dec!(5));
        db.orders().create(&existing).await.unwrap();
        let fresh = order("c2", dec!(7));

        existing.confirm("alice").unwrap();
        let mut batch = WriteBatch::new();
        batch.create(&fresh).unwrap().update(&existing, 7).unwrap();
        let err = db.unit_of_work().commit(batch).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::VersionConflict { expected: 7, actual: 1, .. }
        ));

        // The insert queued before the failing update is gone too
        assert!(db.orders().find_by_id(fresh.id()).await.unwrap().is_none());
        let stored = db.orders().get(existing.id()).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Draft);
        assert_eq!(stored.version(), 1);
    }

    #[tokio::test]
    async fn test_list_and_find_by_source() {
        let db = setup().await;
        let repo = db.orders();
        let small = order("c1", dec!(1));
        let large = order("c2", dec!(50));
        repo.create(&small).await.unwrap();
        repo.create(&large).await.unwrap();

        let page = repo
            .list(&ListQuery::default().sort_by(SortField::TotalAmount, SortDirection::Desc))
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].id(), large.id());

        let page = repo
            .list(&ListQuery::default().filter(DocumentFilter::default().customer("c1")))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);

        let derived = repo.find_by_source("offer-1").await.unwrap();
        assert_eq!(derived.len(), 2);
        assert_eq!(derived[0].id(), small.id());
    }
}
