//! # Sales Offer
//!
//! A quotation sent to a customer. An accepted offer can be converted into
//! one or more sales orders.
//!
//! ```text
//! ┌───────┐  send  ┌──────┐  accept  ┌──────────┐
//! │ DRAFT │───────►│ SENT │─────────►│ ACCEPTED │
//! └───┬───┘        └──┬───┘          └──────────┘
//!     │ reject        │ reject / expire
//!     ▼               ▼
//! ┌──────────┐   ┌─────────┐
//! │ REJECTED │   │ EXPIRED │
//! └──────────┘   └─────────┘
//! ```

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{
    ensure_editable, ensure_has_items, ensure_items_editable, ensure_status, DocumentStatus,
    SalesDocument,
};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::line_item::{ItemLedger, ItemPatch, LineItem, NewLineItem, OfferQuantities};
use crate::types::{Address, DocumentKind, DocumentMeta, DocumentTotals};
use crate::validation::{
    validate_address, validate_description, validate_required, validate_subject,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
}

impl DocumentStatus for OfferStatus {
    const INITIAL: Self = OfferStatus::Draft;

    fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Draft => "DRAFT",
            OfferStatus::Sent => "SENT",
            OfferStatus::Accepted => "ACCEPTED",
            OfferStatus::Rejected => "REJECTED",
            OfferStatus::Expired => "EXPIRED",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            OfferStatus::Accepted | OfferStatus::Rejected | OfferStatus::Expired
        )
    }
}

/// Input for creating an offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOffer {
    pub customer_id: String,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub offer_date: Option<NaiveDate>,
    /// Defaults to offer date + configured validity days.
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
    #[serde(default)]
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub delivery_address: Option<Address>,
    #[serde(default)]
    pub items: Vec<NewLineItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferBasicInfo {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub valid_until: Option<NaiveDate>,
    pub billing_address: Option<Address>,
    pub delivery_address: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesOffer {
    pub meta: DocumentMeta,
    pub status: OfferStatus,
    pub subject: String,
    pub description: Option<String>,
    pub offer_date: NaiveDate,
    pub valid_until: NaiveDate,
    pub billing_address: Option<Address>,
    pub delivery_address: Option<Address>,
    pub items: ItemLedger<OfferQuantities>,
    pub totals: DocumentTotals,
    pub sent_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub accepted_by: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub expired_at: Option<DateTime<Utc>>,
}

impl SalesOffer {
    pub fn new(
        prefix: &str,
        input: NewOffer,
        today: NaiveDate,
        validity_days: u32,
        actor: &str,
    ) -> CoreResult<Self> {
        validate_required("customerId", &input.customer_id)?;
        validate_subject(&input.subject)?;
        validate_description(input.description.as_deref())?;
        if let Some(address) = &input.billing_address {
            validate_address("billingAddress", address)?;
        }
        if let Some(address) = &input.delivery_address {
            validate_address("deliveryAddress", address)?;
        }

        let offer_date = input.offer_date.unwrap_or(today);
        let valid_until = input
            .valid_until
            .unwrap_or_else(|| offer_date + Duration::days(i64::from(validity_days)));
        check_validity(offer_date, valid_until)?;

        let items = ItemLedger::from_inputs(input.items)?;
        let totals = items.totals();

        Ok(SalesOffer {
            meta: DocumentMeta::new(prefix, offer_date, input.customer_id, None, actor),
            status: OfferStatus::Draft,
            subject: input.subject.trim().to_string(),
            description: input.description,
            offer_date,
            valid_until,
            billing_address: input.billing_address,
            delivery_address: input.delivery_address,
            items,
            totals,
            sent_at: None,
            accepted_at: None,
            accepted_by: None,
            rejected_at: None,
            rejection_reason: None,
            expired_at: None,
        })
    }

    pub fn update_basic_info(&mut self, patch: OfferBasicInfo, actor: &str) -> CoreResult<()> {
        ensure_editable(self)?;
        if let Some(subject) = &patch.subject {
            validate_subject(subject)?;
        }
        validate_description(patch.description.as_deref())?;
        if let Some(valid_until) = patch.valid_until {
            check_validity(self.offer_date, valid_until)?;
        }
        if let Some(address) = &patch.billing_address {
            validate_address("billingAddress", address)?;
        }
        if let Some(address) = &patch.delivery_address {
            validate_address("deliveryAddress", address)?;
        }

        if let Some(subject) = patch.subject {
            self.subject = subject.trim().to_string();
        }
        if patch.description.is_some() {
            self.description = patch.description;
        }
        if let Some(valid_until) = patch.valid_until {
            self.valid_until = valid_until;
        }
        if patch.billing_address.is_some() {
            self.billing_address = patch.billing_address;
        }
        if patch.delivery_address.is_some() {
            self.delivery_address = patch.delivery_address;
        }
        self.meta.touch(actor);
        Ok(())
    }

    pub fn add_item(&mut self, input: NewLineItem, actor: &str) -> CoreResult<String> {
        ensure_items_editable(self)?;
        let id = self.items.add(input)?;
        self.totals = self.items.totals();
        self.meta.touch(actor);
        Ok(id)
    }

    pub fn update_item(&mut self, item_id: &str, patch: ItemPatch, actor: &str) -> CoreResult<()> {
        ensure_items_editable(self)?;
        self.items.update(item_id, patch)?;
        self.totals = self.items.totals();
        self.meta.touch(actor);
        Ok(())
    }

    pub fn remove_item(
        &mut self,
        item_id: &str,
        actor: &str,
    ) -> CoreResult<LineItem<OfferQuantities>> {
        ensure_items_editable(self)?;
        let removed = self.items.remove(item_id)?;
        self.totals = self.items.totals();
        self.meta.touch(actor);
        Ok(removed)
    }

    /// `DRAFT → SENT`. Requires at least one item.
    pub fn send(&mut self, actor: &str) -> CoreResult<()> {
        ensure_status(self, &[OfferStatus::Draft], "send")?;
        ensure_has_items(self, !self.items.is_empty(), "send")?;
        let now = self.meta.touch(actor);
        self.status = OfferStatus::Sent;
        self.sent_at = Some(now);
        Ok(())
    }

    /// `SENT → ACCEPTED`, only while the offer is still valid on `today`.
    pub fn accept(&mut self, today: NaiveDate, actor: &str) -> CoreResult<()> {
        ensure_status(self, &[OfferStatus::Sent], "accept")?;
        if today > self.valid_until {
            return Err(CoreError::transition(
                DocumentKind::Offer.label(),
                &self.meta.number,
                format!("past its validity date {}", self.valid_until),
                "accept",
            ));
        }
        let now = self.meta.touch(actor);
        self.status = OfferStatus::Accepted;
        self.accepted_at = Some(now);
        self.accepted_by = Some(actor.to_string());
        Ok(())
    }

    /// `DRAFT | SENT → REJECTED`.
    pub fn reject(&mut self, reason: Option<String>, actor: &str) -> CoreResult<()> {
        ensure_status(self, &[OfferStatus::Draft, OfferStatus::Sent], "reject")?;
        let now = self.meta.touch(actor);
        self.status = OfferStatus::Rejected;
        self.rejected_at = Some(now);
        self.rejection_reason = reason;
        Ok(())
    }

    /// `SENT → EXPIRED`.
    pub fn expire(&mut self, actor: &str) -> CoreResult<()> {
        ensure_status(self, &[OfferStatus::Sent], "expire")?;
        let now = self.meta.touch(actor);
        self.status = OfferStatus::Expired;
        self.expired_at = Some(now);
        Ok(())
    }

    /// Expired by status, or an open offer whose validity has run out.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        match self.status {
            OfferStatus::Expired => true,
            OfferStatus::Draft | OfferStatus::Sent => today > self.valid_until,
            _ => false,
        }
    }
}

fn check_validity(offer_date: NaiveDate, valid_until: NaiveDate) -> CoreResult<()> {
    if valid_until < offer_date {
        return Err(ValidationError::InvalidFormat {
            field: "validUntil".to_string(),
            reason: "must not be before the offer date".to_string(),
        }
        .into());
    }
    Ok(())
}

impl SalesDocument for SalesOffer {
    type Status = OfferStatus;

    const KIND: DocumentKind = DocumentKind::Offer;

    fn meta(&self) -> &DocumentMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut DocumentMeta {
        &mut self.meta
    }

    fn status(&self) -> OfferStatus {
        self.status
    }

    fn subject(&self) -> &str {
        &self.subject
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn document_date(&self) -> NaiveDate {
        self.offer_date
    }

    fn totals(&self) -> &DocumentTotals {
        &self.totals
    }

    /// Draft or sent.
    fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::Percent;
    use rust_decimal_macros::dec;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn offer() -> SalesOffer {
        SalesOffer::new(
            "OFF",
            NewOffer {
                customer_id: "cust-1".to_string(),
                subject: "Chairs for the new office".to_string(),
                description: Some("Includes assembly".to_string()),
                offer_date: None,
                valid_until: None,
                billing_address: None,
                delivery_address: None,
                items: vec![NewLineItem::new("Office chair", dec!(20), Money::from_major(120))
                    .with_tax_rate(Percent::from_whole(19))],
            },
            date(1),
            14,
            "alice",
        )
        .unwrap()
    }

    #[test]
    fn test_validity_defaults_from_config() {
        let offer = offer();
        assert_eq!(offer.valid_until, date(15));
        assert!(offer.meta.number.starts_with("OFF-240501-"));
    }

    #[test]
    fn test_send_and_accept() {
        let mut offer = offer();
        offer.send("alice").unwrap();
        offer.accept(date(10), "carol").unwrap();

        assert_eq!(offer.status, OfferStatus::Accepted);
        assert_eq!(offer.accepted_by.as_deref(), Some("carol"));
        assert_eq!(offer.meta.version, 3);
    }

    #[test]
    fn test_accept_after_validity_fails() {
        let mut offer = offer();
        offer.send("alice").unwrap();

        let err = offer.accept(date(16), "carol").unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        assert_eq!(offer.status, OfferStatus::Sent);
        assert!(offer.is_expired(date(16)));
    }

    #[test]
    fn test_accept_from_draft_is_invalid() {
        let mut offer = offer();
        assert!(offer.accept(date(2), "carol").is_err());
    }

    #[test]
    fn test_reject_and_expire_rules() {
        let mut draft = offer();
        draft.reject(Some("too expensive".to_string()), "carol").unwrap();
        assert_eq!(draft.status, OfferStatus::Rejected);
        assert!(draft.expire("carol").is_err());

        let mut sent = offer();
        assert!(sent.expire("alice").is_err());
        sent.send("alice").unwrap();
        sent.expire("alice").unwrap();
        assert_eq!(sent.status, OfferStatus::Expired);
        assert!(sent.reject(None, "alice").is_err());
    }

    #[test]
    fn test_valid_until_before_offer_date_rejected() {
        let mut offer = offer();
        let patch = OfferBasicInfo {
            valid_until: Some(NaiveDate::from_ymd_opt(2024, 4, 30).unwrap()),
            ..Default::default()
        };
        assert!(offer.update_basic_info(patch, "alice").is_err());
        assert_eq!(offer.meta.version, 1);
    }
}
