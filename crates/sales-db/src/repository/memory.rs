//! # In-Memory Repository
//!
//! A `Vec` behind a tokio `RwLock`. Insertion order is the vector order,
//! which is what stable sorting falls back to.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use sales_core::SalesDocument;

use super::query::{ListQuery, Page};
use super::DocumentRepository;
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct InMemoryRepository<D> {
    docs: Arc<RwLock<Vec<D>>>,
}

impl<D> Default for InMemoryRepository<D> {
    fn default() -> Self {
        InMemoryRepository {
            docs: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<D: SalesDocument> InMemoryRepository<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

#[async_trait]
impl<D: SalesDocument> DocumentRepository<D> for InMemoryRepository<D> {
    async fn create(&self, doc: &D) -> DbResult<()> {
        let mut docs = self.docs.write().await;

        if docs.iter().any(|d| d.id() == doc.id()) {
            return Err(DbError::duplicate("id", doc.id()));
        }
        if docs.iter().any(|d| d.number() == doc.number()) {
            return Err(DbError::duplicate("number", doc.number()));
        }

        debug!(
            kind = D::KIND.as_str(),
            id = %doc.id(),
            number = %doc.number(),
            "Inserting document"
        );
        docs.push(doc.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> DbResult<Option<D>> {
        let docs = self.docs.read().await;
        Ok(docs.iter().find(|d| d.id() == id).cloned())
    }

    async fn find_by_number(&self, number: &str) -> DbResult<Option<D>> {
        let docs = self.docs.read().await;
        Ok(docs.iter().find(|d| d.number() == number).cloned())
    }

    async fn update(&self, doc: &D, expected_version: u64) -> DbResult<()> {
        let mut docs = self.docs.write().await;

        let slot = docs
            .iter_mut()
            .find(|d| d.id() == doc.id())
            .ok_or_else(|| DbError::not_found(D::KIND.label(), doc.id()))?;

        if slot.version() != expected_version {
            return Err(DbError::version_conflict(
                D::KIND.label(),
                doc.id(),
                expected_version,
                slot.version(),
            ));
        }

        debug!(
            kind = D::KIND.as_str(),
            id = %doc.id(),
            from = expected_version,
            to = doc.version(),
            "Updating document"
        );
        *slot = doc.clone();
        Ok(())
    }

    async fn delete(&self, id: &str) -> DbResult<()> {
        let mut docs = self.docs.write().await;

        let index = docs
            .iter()
            .position(|d| d.id() == id)
            .ok_or_else(|| DbError::not_found(D::KIND.label(), id))?;

        debug!(kind = D::KIND.as_str(), id = %id, "Deleting document");
        docs.remove(index);
        Ok(())
    }

    async fn list(&self, query: &ListQuery) -> DbResult<Page<D>> {
        let snapshot = self.docs.read().await.clone();
        Ok(query.apply(snapshot))
    }

    async fn find_by_source(&self, source_id: &str) -> DbResult<Vec<D>> {
        let docs = self.docs.read().await;
        Ok(docs
            .iter()
            .filter(|d| d.meta().source_document_id.as_deref() == Some(source_id))
            .cloned()
            .collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::query::DocumentFilter;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use sales_core::{Money, NewLineItem, NewOffer, SalesOffer};

    fn offer(subject: &str) -> SalesOffer {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        SalesOffer::new(
            "OFF",
            NewOffer {
                customer_id: "cust-1".to_string(),
                subject: subject.to_string(),
                description: None,
                offer_date: None,
                valid_until: None,
                billing_address: None,
                delivery_address: None,
                items: vec![NewLineItem::new("Chair", dec!(2), Money::from_major(50))],
            },
            today,
            30,
            "alice",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let repo = InMemoryRepository::new();
        let doc = offer("Chairs");
        repo.create(&doc).await.unwrap();

        let by_id = repo.find_by_id(doc.id()).await.unwrap().unwrap();
        assert_eq!(by_id, doc);
        let by_number = repo.find_by_number(doc.number()).await.unwrap().unwrap();
        assert_eq!(by_number.id(), doc.id());
        assert!(repo.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let repo = InMemoryRepository::new();
        let doc = offer("Chairs");
        repo.create(&doc).await.unwrap();

        let err = repo.create(&doc).await.unwrap_err();
        assert!(matches!(err, DbError::Duplicate { .. }));
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_checks_version() {
        let repo = InMemoryRepository::new();
        let mut doc = offer("Chairs");
        repo.create(&doc).await.unwrap();

        let loaded = doc.version();
        doc.send("alice").unwrap();
        repo.update(&doc, loaded).await.unwrap();

        // A second writer still holding version 1
        let err = repo.update(&doc, loaded).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::VersionConflict { expected: 1, actual: 2, .. }
        ));

        let err = repo.update(&offer("Other"), 1).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let repo = InMemoryRepository::new();
        let first = offer("Chairs");
        let second = offer("Desks");
        repo.create(&first).await.unwrap();
        repo.create(&second).await.unwrap();

        repo.delete(first.id()).await.unwrap();
        assert!(matches!(
            repo.delete(first.id()).await,
            Err(DbError::NotFound { .. })
        ));

        let page = repo
            .list(&ListQuery::default().filter(DocumentFilter::default().search("desk")))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id(), second.id());
    }
}
