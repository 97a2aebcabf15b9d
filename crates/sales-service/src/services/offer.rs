//! # Offer Service
//!
//! ```text
//! DRAFT ──send──► SENT ──accept──► ACCEPTED ──► (ConversionService → order)
//!   │               ├────reject──► REJECTED
//!   └───reject──────┤
//!                   └────expire──► EXPIRED
//! ```

use std::sync::Arc;

use tracing::info;

use sales_core::{
    DocumentKind, ItemPatch, NewLineItem, NewOffer, OfferBasicInfo, SalesDocument, SalesOffer,
};
use sales_db::{ListQuery, Page};

use super::{delete_initial, list, load, mutate, mutate_with, today, Repo};
use crate::config::SalesConfig;
use crate::dto::StatusAction;
use crate::error::ServiceResult;

#[derive(Clone)]
pub struct OfferService {
    repo: Repo<SalesOffer>,
    config: Arc<SalesConfig>,
}

impl OfferService {
    pub fn new(repo: Repo<SalesOffer>, config: Arc<SalesConfig>) -> Self {
        OfferService { repo, config }
    }

    pub async fn create(&self, input: NewOffer, actor: &str) -> ServiceResult<SalesOffer> {
        let offer = SalesOffer::new(
            self.config.prefix(DocumentKind::Offer),
            input,
            today(),
            self.config.offers.validity_days,
            actor,
        )?;
        self.repo.create(&offer).await?;

        info!(
            id = %offer.id(),
            number = %offer.number(),
            total = %offer.totals.total_amount,
            "Offer created"
        );
        Ok(offer)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<SalesOffer> {
        load(&self.repo, id, None).await
    }

    pub async fn find_by_number(&self, number: &str) -> ServiceResult<Option<SalesOffer>> {
        Ok(self.repo.find_by_number(number).await?)
    }

    pub async fn list(&self, query: ListQuery) -> ServiceResult<Page<SalesOffer>> {
        list(&self.repo, query, &self.config).await
    }

    pub async fn update_basic_info(
        &self,
        id: &str,
        patch: OfferBasicInfo,
        expected_version: Option<u64>,
        actor: &str,
    ) -> ServiceResult<SalesOffer> {
        mutate(&self.repo, id, expected_version, |offer| {
            offer.update_basic_info(patch, actor)
        })
        .await
    }

    /// Adds a line; returns the offer and the new item id.
    pub async fn add_item(
        &self,
        id: &str,
        input: NewLineItem,
        expected_version: Option<u64>,
        actor: &str,
    ) -> ServiceResult<(SalesOffer, String)> {
        mutate_with(&self.repo, id, expected_version, |offer| offer.add_item(input, actor)).await
    }

    pub async fn update_item(
        &self,
        id: &str,
        item_id: &str,
        patch: ItemPatch,
        expected_version: Option<u64>,
        actor: &str,
    ) -> ServiceResult<SalesOffer> {
        mutate(&self.repo, id, expected_version, |offer| {
            offer.update_item(item_id, patch, actor)
        })
        .await
    }

    pub async fn remove_item(
        &self,
        id: &str,
        item_id: &str,
        expected_version: Option<u64>,
        actor: &str,
    ) -> ServiceResult<SalesOffer> {
        mutate(&self.repo, id, expected_version, |offer| {
            offer.remove_item(item_id, actor).map(|_| ())
        })
        .await
    }

    pub async fn send(&self, id: &str, action: StatusAction) -> ServiceResult<SalesOffer> {
        let offer = mutate(&self.repo, id, action.expected_version, |offer| {
            offer.send(&action.actor)
        })
        .await?;
        info!(number = %offer.number(), "Offer sent");
        Ok(offer)
    }

    /// Fails with `InvalidTransition` once `validUntil` has passed.
    pub async fn accept(&self, id: &str, action: StatusAction) -> ServiceResult<SalesOffer> {
        let offer = mutate(&self.repo, id, action.expected_version, |offer| {
            offer.accept(today(), &action.actor)
        })
        .await?;
        info!(number = %offer.number(), "Offer accepted");
        Ok(offer)
    }

    pub async fn reject(&self, id: &str, action: StatusAction) -> ServiceResult<SalesOffer> {
        let StatusAction {
            actor,
            expected_version,
            reason,
        } = action;
        mutate(&self.repo, id, expected_version, |offer| offer.reject(reason, &actor)).await
    }

    pub async fn expire(&self, id: &str, action: StatusAction) -> ServiceResult<SalesOffer> {
        mutate(&self.repo, id, action.expected_version, |offer| {
            offer.expire(&action.actor)
        })
        .await
    }

    /// Drafts only.
    pub async fn delete(&self, id: &str, expected_version: Option<u64>) -> ServiceResult<()> {
        delete_initial(&self.repo, id, expected_version).await?;
        info!(id = %id, "Offer deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use rust_decimal_macros::dec;
    use sales_core::{Money, OfferStatus};
    use sales_db::InMemoryRepository;

    fn service() -> OfferService {
        OfferService::new(
            Arc::new(InMemoryRepository::<SalesOffer>::new()),
            Arc::new(SalesConfig::default()),
        )
    }

    fn input() -> NewOffer {
        NewOffer {
            customer_id: "cust-1".to_string(),
            subject: "Chairs".to_string(),
            description: None,
            offer_date: None,
            valid_until: None,
            billing_address: None,
            delivery_address: None,
            items: vec![NewLineItem::new("Chair", dec!(4), Money::from_major(25))],
        }
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let svc = service();
        let offer = svc.create(input(), "alice").await.unwrap();
        assert!(offer.number().starts_with("OFF-"));
        assert_eq!(offer.valid_until, offer.offer_date + chrono::Duration::days(30));

        svc.send(offer.id(), StatusAction::by("alice")).await.unwrap();
        let accepted = svc.accept(offer.id(), StatusAction::by("bob")).await.unwrap();
        assert_eq!(accepted.status, OfferStatus::Accepted);
        assert_eq!(accepted.version(), 3);
    }

    #[tokio::test]
    async fn test_stale_expected_version_changes_nothing() {
        let svc = service();
        let offer = svc.create(input(), "alice").await.unwrap();
        svc.send(offer.id(), StatusAction::by("alice")).await.unwrap();

        let err = svc
            .reject(offer.id(), StatusAction::by("bob").at_version(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::VersionConflict { expected: 1, actual: 2, .. }));
        assert_eq!(svc.get(offer.id()).await.unwrap().status, OfferStatus::Sent);
    }

    #[tokio::test]
    async fn test_items_editable_only_as_draft() {
        let svc = service();
        let offer = svc.create(input(), "alice").await.unwrap();

        let (offer, item_id) = svc
            .add_item(
                offer.id(),
                NewLineItem::new("Desk", dec!(1), Money::from_major(300)),
                None,
                "alice",
            )
            .await
            .unwrap();
        assert_eq!(offer.totals.total_amount, Money::from_major(400));

        svc.send(offer.id(), StatusAction::by("alice")).await.unwrap();
        let err = svc
            .remove_item(offer.id(), &item_id, None, "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_delete_only_drafts() {
        let svc = service();
        let draft = svc.create(input(), "alice").await.unwrap();
        svc.delete(draft.id(), None).await.unwrap();
        assert!(matches!(
            svc.get(draft.id()).await,
            Err(ServiceError::NotFound { .. })
        ));

        let sent = svc.create(input(), "alice").await.unwrap();
        svc.send(sent.id(), StatusAction::by("alice")).await.unwrap();
        assert!(matches!(
            svc.delete(sent.id(), None).await,
            Err(ServiceError::InvalidState(_))
        ));
    }
}
