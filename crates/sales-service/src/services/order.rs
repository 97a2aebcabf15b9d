//! # Order Service
//!
//! Manual order lifecycle. Delivery and invoicing progress is written by
//! the conversion pipeline; cancellation goes through `WorkflowService`
//! because it depends on the order's delivery notes.
//!
//! ```text
//! DRAFT ─confirm─► CONFIRMED ─start_processing─► IN_PROGRESS
//!                      │                              │
//!                      └──────── deliveries ──────────┴─► PARTIALLY_DELIVERED
//!                                                          │
//!                                 DELIVERED ◄──────────────┘
//!                                     │ invoices
//!                                     ▼
//!                                 INVOICED ─complete─► COMPLETED
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use sales_core::{
    DocumentKind, ItemPatch, ItemProgress, NewLineItem, NewOrder, OrderBasicInfo, SalesDocument,
    SalesOrder,
};
use sales_db::{ListQuery, Page};

use super::{
    delete_initial, ensure_no_source, list, load, mutate, mutate_with, today, OrderProgressSource,
    Repo,
};
use crate::config::SalesConfig;
use crate::dto::StatusAction;
use crate::error::ServiceResult;

#[derive(Clone)]
pub struct OrderService {
    repo: Repo<SalesOrder>,
    config: Arc<SalesConfig>,
}

impl OrderService {
    pub fn new(repo: Repo<SalesOrder>, config: Arc<SalesConfig>) -> Self {
        OrderService { repo, config }
    }

    /// Creates a standalone draft order.
    pub async fn create(&self, input: NewOrder, actor: &str) -> ServiceResult<SalesOrder> {
        ensure_no_source(input.source_document_id.as_ref())?;
        self.insert(input, actor).await
    }

    /// Numbers and validates a new order without storing it.
    pub(crate) fn build(&self, input: NewOrder, actor: &str) -> ServiceResult<SalesOrder> {
        let prefix = self.config.prefix(DocumentKind::Order);
        Ok(SalesOrder::new(prefix, input, today(), actor)?)
    }

    async fn insert(&self, input: NewOrder, actor: &str) -> ServiceResult<SalesOrder> {
        let order = self.build(input, actor)?;
        self.repo.create(&order).await?;

        info!(
            id = %order.id(),
            number = %order.number(),
            source = ?order.meta.source_document_id,
            total = %order.totals.total_amount,
            "Order created"
        );
        Ok(order)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<SalesOrder> {
        load(&self.repo, id, None).await
    }

    pub async fn find_by_number(&self, number: &str) -> ServiceResult<Option<SalesOrder>> {
        Ok(self.repo.find_by_number(number).await?)
    }

    pub async fn list(&self, query: ListQuery) -> ServiceResult<Page<SalesOrder>> {
        list(&self.repo, query, &self.config).await
    }

    /// Orders converted from `offer_id`, oldest first.
    pub async fn list_by_offer(&self, offer_id: &str) -> ServiceResult<Vec<SalesOrder>> {
        Ok(self.repo.find_by_source(offer_id).await?)
    }

    pub async fn update_basic_info(
        &self,
        id: &str,
        patch: OrderBasicInfo,
        expected_version: Option<u64>,
        actor: &str,
    ) -> ServiceResult<SalesOrder> {
        mutate(&self.repo, id, expected_version, |order| {
            order.update_basic_info(patch, actor)
        })
        .await
    }

    pub async fn add_item(
        &self,
        id: &str,
        input: NewLineItem,
        expected_version: Option<u64>,
        actor: &str,
    ) -> ServiceResult<(SalesOrder, String)> {
        mutate_with(&self.repo, id, expected_version, |order| order.add_item(input, actor)).await
    }

    pub async fn update_item(
        &self,
        id: &str,
        item_id: &str,
        patch: ItemPatch,
        expected_version: Option<u64>,
        actor: &str,
    ) -> ServiceResult<SalesOrder> {
        mutate(&self.repo, id, expected_version, |order| {
            order.update_item(item_id, patch, actor)
        })
        .await
    }

    pub async fn remove_item(
        &self,
        id: &str,
        item_id: &str,
        expected_version: Option<u64>,
        actor: &str,
    ) -> ServiceResult<SalesOrder> {
        mutate(&self.repo, id, expected_version, |order| {
            order.remove_item(item_id, actor).map(|_| ())
        })
        .await
    }

    /// `DRAFT → CONFIRMED`; the order needs at least one item.
    pub async fn confirm(&self, id: &str, action: StatusAction) -> ServiceResult<SalesOrder> {
        let order = mutate(&self.repo, id, action.expected_version, |order| {
            order.confirm(&action.actor)
        })
        .await?;
        info!(number = %order.number(), actor = %action.actor, "Order confirmed");
        Ok(order)
    }

    pub async fn start_processing(
        &self,
        id: &str,
        action: StatusAction,
    ) -> ServiceResult<SalesOrder> {
        mutate(&self.repo, id, action.expected_version, |order| {
            order.start_processing(&action.actor)
        })
        .await
    }

    /// `INVOICED → COMPLETED`.
    pub async fn complete(&self, id: &str, action: StatusAction) -> ServiceResult<SalesOrder> {
        let order = mutate(&self.repo, id, action.expected_version, |order| {
            order.complete(&action.actor)
        })
        .await?;
        info!(number = %order.number(), "Order completed");
        Ok(order)
    }

    /// Drafts only.
    pub async fn delete(&self, id: &str, expected_version: Option<u64>) -> ServiceResult<()> {
        delete_initial(&self.repo, id, expected_version).await?;
        info!(id = %id, "Order deleted");
        Ok(())
    }
}

#[async_trait]
impl OrderProgressSource for OrderService {
    async fn get_item_progress(&self, order_id: &str) -> ServiceResult<Vec<ItemProgress>> {
        Ok(self.get(order_id).await?.item_progress())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use rust_decimal_macros::dec;
    use sales_core::{Money, OrderStatus, Percent};
    use sales_db::InMemoryRepository;

    fn service() -> OrderService {
        OrderService::new(
            Arc::new(InMemoryRepository::<SalesOrder>::new()),
            Arc::new(SalesConfig::default()),
        )
    }

    fn input(items: Vec<NewLineItem>) -> NewOrder {
        NewOrder {
            customer_id: "cust-1".to_string(),
            subject: "Office chairs".to_string(),
            description: None,
            order_date: None,
            requested_delivery_date: None,
            billing_address: None,
            delivery_address: None,
            source_document_id: None,
            items,
        }
    }

    fn chairs() -> NewLineItem {
        NewLineItem::new("Chair", dec!(100), Money::from_major(10))
            .with_tax_rate(Percent::from_whole(19))
    }

    #[tokio::test]
    async fn test_confirm_requires_items() {
        let svc = service();
        let empty = svc.create(input(vec![]), "alice").await.unwrap();
        let err = svc
            .confirm(empty.id(), StatusAction::by("alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(svc.get(empty.id()).await.unwrap().version(), 1);

        let order = svc.create(input(vec![chairs()]), "alice").await.unwrap();
        let order = svc
            .confirm(order.id(), StatusAction::by("alice").at_version(1))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.confirmed_by.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_manual_order_cannot_claim_a_source() {
        let svc = service();
        let mut with_source = input(vec![chairs()]);
        with_source.source_document_id = Some("offer-1".to_string());

        let err = svc.create(with_source, "alice").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_item_progress_source() {
        let svc = service();
        let order = svc.create(input(vec![chairs()]), "alice").await.unwrap();

        let progress = svc.get_item_progress(order.id()).await.unwrap();
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].quantity, dec!(100));
        assert_eq!(progress[0].delivered_quantity, dec!(0));

        assert!(matches!(
            svc.get_item_progress("missing").await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_item_recomputes_totals() {
        let svc = service();
        let order = svc.create(input(vec![chairs()]), "alice").await.unwrap();
        let item_id = order.items.items()[0].id.clone();

        let patch = ItemPatch {
            quantity: Some(dec!(50)),
            ..Default::default()
        };
        let order = svc
            .update_item(order.id(), &item_id, patch, None, "alice")
            .await
            .unwrap();
        assert_eq!(order.totals.total_amount, Money::new(dec!(595)));
        assert_eq!(order.version(), 2);
    }
}
