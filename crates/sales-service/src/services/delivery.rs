//! # Delivery Service
//!
//! ```text
//! PREPARED ─ready─► READY_FOR_PICKUP ─ship─► IN_TRANSIT ─deliver─► DELIVERED ─confirm─► CONFIRMED
//!                                                 │                    │
//!                                                 └───────return───────┴──► RETURNED
//! ```
//!
//! The service reads order progress through [`OrderProgressSource`] and never
//! writes to orders; progress write-back belongs to the conversion pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use sales_core::{
    DeliveryBasicInfo, DeliveryNote, DocumentKind, ItemPatch, ItemProgress, NewDeliveryNote,
    NewLineItem, SalesDocument,
};
use sales_db::{ListQuery, Page};

use super::{
    delete_initial, ensure_no_source, list, load, mutate, mutate_with, today, DeliveryLookup,
    OrderProgressSource, Repo,
};
use crate::config::SalesConfig;
use crate::dto::{ConfirmReceipt, ShipDelivery, StatusAction};
use crate::error::ServiceResult;

#[derive(Clone)]
pub struct DeliveryService {
    repo: Repo<DeliveryNote>,
    orders: Arc<dyn OrderProgressSource>,
    config: Arc<SalesConfig>,
}

impl DeliveryService {
    pub fn new(
        repo: Repo<DeliveryNote>,
        orders: Arc<dyn OrderProgressSource>,
        config: Arc<SalesConfig>,
    ) -> Self {
        DeliveryService {
            repo,
            orders,
            config,
        }
    }

    /// Creates a standalone delivery note in `PREPARED`.
    pub async fn create(&self, input: NewDeliveryNote, actor: &str) -> ServiceResult<DeliveryNote> {
        ensure_no_source(input.source_document_id.as_ref())?;
        self.insert(input, actor).await
    }

    pub(crate) fn build(
        &self,
        input: NewDeliveryNote,
        actor: &str,
    ) -> ServiceResult<DeliveryNote> {
        Ok(DeliveryNote::new(
            self.config.prefix(DocumentKind::DeliveryNote),
            input,
            today(),
            actor,
        )?)
    }

    async fn insert(&self, input: NewDeliveryNote, actor: &str) -> ServiceResult<DeliveryNote> {
        let note = self.build(input, actor)?;
        self.repo.create(&note).await?;

        info!(
            id = %note.id(),
            number = %note.number(),
            order = ?note.order_id(),
            items = note.items.len(),
            "Delivery note created"
        );
        Ok(note)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<DeliveryNote> {
        load(&self.repo, id, None).await
    }

    pub async fn find_by_number(&self, number: &str) -> ServiceResult<Option<DeliveryNote>> {
        Ok(self.repo.find_by_number(number).await?)
    }

    pub async fn list(&self, query: ListQuery) -> ServiceResult<Page<DeliveryNote>> {
        list(&self.repo, query, &self.config).await
    }

    /// Every delivery note of the order, cancelled ones included.
    pub async fn list_by_order(&self, order_id: &str) -> ServiceResult<Vec<DeliveryNote>> {
        Ok(self.repo.find_by_source(order_id).await?)
    }

    /// Order items that still have quantity left to deliver.
    pub async fn outstanding_for_order(&self, order_id: &str) -> ServiceResult<Vec<ItemProgress>> {
        let progress = self.orders.get_item_progress(order_id).await?;
        Ok(progress
            .into_iter()
            .filter(|item| !item.is_fully_delivered())
            .collect())
    }

    pub async fn update_basic_info(
        &self,
        id: &str,
        patch: DeliveryBasicInfo,
        expected_version: Option<u64>,
        actor: &str,
    ) -> ServiceResult<DeliveryNote> {
        mutate(&self.repo, id, expected_version, |note| {
            note.update_basic_info(patch, actor)
        })
        .await
    }

    pub async fn add_item(
        &self,
        id: &str,
        input: NewLineItem,
        expected_version: Option<u64>,
        actor: &str,
    ) -> ServiceResult<(DeliveryNote, String)> {
        mutate_with(&self.repo, id, expected_version, |note| note.add_item(input, actor)).await
    }

    pub async fn update_item(
        &self,
        id: &str,
        item_id: &str,
        patch: ItemPatch,
        expected_version: Option<u64>,
        actor: &str,
    ) -> ServiceResult<DeliveryNote> {
        mutate(&self.repo, id, expected_version, |note| {
            note.update_item(item_id, patch, actor)
        })
        .await
    }

    pub async fn remove_item(
        &self,
        id: &str,
        item_id: &str,
        expected_version: Option<u64>,
        actor: &str,
    ) -> ServiceResult<DeliveryNote> {
        mutate(&self.repo, id, expected_version, |note| {
            note.remove_item(item_id, actor).map(|_| ())
        })
        .await
    }

    pub async fn mark_ready(&self, id: &str, action: StatusAction) -> ServiceResult<DeliveryNote> {
        mutate(&self.repo, id, action.expected_version, |note| {
            note.mark_ready(&action.actor)
        })
        .await
    }

    pub async fn ship(&self, id: &str, input: ShipDelivery) -> ServiceResult<DeliveryNote> {
        let note = mutate(&self.repo, id, input.expected_version, |note| {
            note.ship(input.carrier, input.tracking_number, &input.actor)
        })
        .await?;
        info!(number = %note.number(), carrier = ?note.carrier, "Delivery note shipped");
        Ok(note)
    }

    pub async fn mark_delivered(
        &self,
        id: &str,
        action: StatusAction,
    ) -> ServiceResult<DeliveryNote> {
        mutate(&self.repo, id, action.expected_version, |note| {
            note.mark_delivered(&action.actor)
        })
        .await
    }

    pub async fn confirm(&self, id: &str, input: ConfirmReceipt) -> ServiceResult<DeliveryNote> {
        let note = mutate(&self.repo, id, input.expected_version, |note| {
            note.confirm(input.received_by, &input.actor)
        })
        .await?;
        info!(number = %note.number(), received_by = ?note.received_by, "Delivery confirmed");
        Ok(note)
    }

    pub async fn mark_returned(
        &self,
        id: &str,
        action: StatusAction,
    ) -> ServiceResult<DeliveryNote> {
        let note = mutate(&self.repo, id, action.expected_version, |note| {
            note.mark_returned(action.reason, &action.actor)
        })
        .await?;
        info!(number = %note.number(), reason = ?note.return_reason, "Delivery returned");
        Ok(note)
    }

    /// `PREPARED` notes only.
    pub async fn delete(&self, id: &str, expected_version: Option<u64>) -> ServiceResult<()> {
        delete_initial(&self.repo, id, expected_version).await?;
        info!(id = %id, "Delivery note deleted");
        Ok(())
    }
}

#[async_trait]
impl DeliveryLookup for DeliveryService {
    async fn list_active_by_order_id(&self, order_id: &str) -> ServiceResult<Vec<DeliveryNote>> {
        let notes = self.repo.find_by_source(order_id).await?;
        Ok(notes.into_iter().filter(|note| note.is_active()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use rust_decimal_macros::dec;
    use sales_core::{Address, DeliveryStatus, Money};
    use sales_db::InMemoryRepository;

    /// Order progress stub with one half-delivered and one finished item.
    struct FixedProgress;

    #[async_trait]
    impl OrderProgressSource for FixedProgress {
        async fn get_item_progress(&self, order_id: &str) -> ServiceResult<Vec<ItemProgress>> {
            if order_id != "order-1" {
                return Err(ServiceError::not_found("Sales order", order_id));
            }
            Ok(vec![
                ItemProgress {
                    item_id: "chairs".to_string(),
                    quantity: dec!(100),
                    delivered_quantity: dec!(50),
                    invoiced_quantity: dec!(0),
                },
                ItemProgress {
                    item_id: "desks".to_string(),
                    quantity: dec!(10),
                    delivered_quantity: dec!(10),
                    invoiced_quantity: dec!(10),
                },
            ])
        }
    }

    fn service() -> DeliveryService {
        DeliveryService::new(
            Arc::new(InMemoryRepository::<DeliveryNote>::new()),
            Arc::new(FixedProgress),
            Arc::new(SalesConfig::default()),
        )
    }

    fn address() -> Address {
        Address {
            name: "Acme GmbH".to_string(),
            street: "Hauptstr. 1".to_string(),
            postal_code: "10115".to_string(),
            city: "Berlin".to_string(),
            country: "DE".to_string(),
        }
    }

    fn input() -> NewDeliveryNote {
        NewDeliveryNote {
            customer_id: "cust-1".to_string(),
            subject: "Chairs, first batch".to_string(),
            description: None,
            delivery_date: None,
            delivery_address: address(),
            carrier: None,
            tracking_number: None,
            source_document_id: None,
            items: vec![NewLineItem::new("Chair", dec!(5), Money::from_major(10))],
        }
    }

    #[tokio::test]
    async fn test_shipping_lifecycle() {
        let svc = service();
        let note = svc.create(input(), "alice").await.unwrap();
        let id = note.id().to_string();

        svc.mark_ready(&id, StatusAction::by("alice")).await.unwrap();
        let shipped = svc
            .ship(
                &id,
                ShipDelivery {
                    actor: "alice".to_string(),
                    expected_version: Some(2),
                    carrier: Some("DHL".to_string()),
                    tracking_number: Some("TRK-1".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(shipped.status, DeliveryStatus::InTransit);
        assert_eq!(shipped.carrier.as_deref(), Some("DHL"));

        svc.mark_delivered(&id, StatusAction::by("bob")).await.unwrap();
        let confirmed = svc
            .confirm(
                &id,
                ConfirmReceipt {
                    actor: "bob".to_string(),
                    expected_version: None,
                    received_by: Some("Front desk".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(confirmed.status, DeliveryStatus::Confirmed);
        assert_eq!(confirmed.version(), 5);
    }

    #[tokio::test]
    async fn test_ship_requires_ready() {
        let svc = service();
        let note = svc.create(input(), "alice").await.unwrap();

        let err = svc
            .ship(
                note.id(),
                ShipDelivery {
                    actor: "alice".to_string(),
                    expected_version: None,
                    carrier: None,
                    tracking_number: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition(_)));
        assert_eq!(svc.get(note.id()).await.unwrap().status, DeliveryStatus::Prepared);
    }

    #[tokio::test]
    async fn test_outstanding_for_order() {
        let svc = service();
        let outstanding = svc.outstanding_for_order("order-1").await.unwrap();
        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].item_id, "chairs");

        assert!(matches!(
            svc.outstanding_for_order("order-2").await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_only_prepared() {
        let svc = service();
        let note = svc.create(input(), "alice").await.unwrap();
        svc.mark_ready(note.id(), StatusAction::by("alice"))
            .await
            .unwrap();

        let err = svc.delete(note.id(), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
}
