//! # Line Items and the Item Ledger
//!
//! Every document embeds an ordered list of line items. The four document
//! types share the pricing fields and differ only in which quantities they
//! track, so a line item is generic over its quantity block.
//!
//! ## Amount Calculation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  effective qty × unit price × (1 − discount/100) = net                 │
//! │  net × tax rate/100                              = tax                 │
//! │  net + tax                                       = total               │
//! │                                                                         │
//! │  Effective quantity by document:                                       │
//! │    Offer / Order  → quantity                                           │
//! │    Delivery note  → deliveredQuantity                                  │
//! │    Invoice        → invoicedQuantity                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No rounding happens here. Amounts keep full decimal precision.

use std::fmt::Debug;

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{DocumentTotals, Percent};
use crate::validation::{
    validate_percent, validate_quantity, validate_required, validate_unit_price,
};

/// Unit used when the caller does not name one.
pub const DEFAULT_UNIT: &str = "pcs";

// =============================================================================
// Quantity Blocks
// =============================================================================

/// Quantity tracking for one document type.
pub trait LineQuantities:
    Debug + Clone + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Quantity used for amount calculation.
    fn effective(&self) -> Decimal;

    /// Builds the block for a freshly added item.
    ///
    /// `reference` is the upstream quantity the item refers to (ordered
    /// quantity for delivery notes, delivered quantity for invoices).
    fn for_new_item(quantity: Decimal, reference: Option<Decimal>) -> Self;

    /// Replaces the primary quantity when an item is edited.
    fn set_quantity(&mut self, quantity: Decimal);

    /// Upstream quantity the primary quantity may not exceed, if any.
    fn reference(&self) -> Option<Decimal> {
        None
    }
}

/// Offer line: a single quoted quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferQuantities {
    pub quantity: Decimal,
}

impl LineQuantities for OfferQuantities {
    fn effective(&self) -> Decimal {
        self.quantity
    }

    fn for_new_item(quantity: Decimal, _reference: Option<Decimal>) -> Self {
        OfferQuantities { quantity }
    }

    fn set_quantity(&mut self, quantity: Decimal) {
        self.quantity = quantity;
    }
}

/// Order line: ordered quantity plus cumulative progress counters.
///
/// `0 ≤ invoiced_quantity ≤ delivered_quantity ≤ quantity` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuantities {
    pub quantity: Decimal,
    pub delivered_quantity: Decimal,
    pub invoiced_quantity: Decimal,
}

impl OrderQuantities {
    /// Quantity not yet carried into a delivery note.
    pub fn remaining_to_deliver(&self) -> Decimal {
        self.quantity - self.delivered_quantity
    }

    /// Delivered quantity not yet invoiced.
    pub fn remaining_to_invoice(&self) -> Decimal {
        self.delivered_quantity - self.invoiced_quantity
    }
}

impl LineQuantities for OrderQuantities {
    fn effective(&self) -> Decimal {
        self.quantity
    }

    fn for_new_item(quantity: Decimal, _reference: Option<Decimal>) -> Self {
        OrderQuantities {
            quantity,
            delivered_quantity: Decimal::ZERO,
            invoiced_quantity: Decimal::ZERO,
        }
    }

    fn set_quantity(&mut self, quantity: Decimal) {
        self.quantity = quantity;
    }
}

/// Delivery note line.
///
/// `invoiced_quantity` counts what invoices derived from this note have
/// taken; it never exceeds `delivered_quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryQuantities {
    pub ordered_quantity: Decimal,
    pub delivered_quantity: Decimal,
    pub invoiced_quantity: Decimal,
}

impl DeliveryQuantities {
    pub fn remaining_to_invoice(&self) -> Decimal {
        self.delivered_quantity - self.invoiced_quantity
    }
}

impl LineQuantities for DeliveryQuantities {
    fn effective(&self) -> Decimal {
        self.delivered_quantity
    }

    fn for_new_item(quantity: Decimal, reference: Option<Decimal>) -> Self {
        DeliveryQuantities {
            ordered_quantity: reference.unwrap_or(quantity),
            delivered_quantity: quantity,
            invoiced_quantity: Decimal::ZERO,
        }
    }

    fn set_quantity(&mut self, quantity: Decimal) {
        self.delivered_quantity = quantity;
    }

    fn reference(&self) -> Option<Decimal> {
        Some(self.ordered_quantity)
    }
}

/// Invoice line: delivered quantity (copied from the note) and the
/// quantity billed on this invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceQuantities {
    pub delivered_quantity: Decimal,
    pub invoiced_quantity: Decimal,
}

impl LineQuantities for InvoiceQuantities {
    fn effective(&self) -> Decimal {
        self.invoiced_quantity
    }

    fn for_new_item(quantity: Decimal, reference: Option<Decimal>) -> Self {
        InvoiceQuantities {
            delivered_quantity: reference.unwrap_or(quantity),
            invoiced_quantity: quantity,
        }
    }

    fn set_quantity(&mut self, quantity: Decimal) {
        self.invoiced_quantity = quantity;
    }

    fn reference(&self) -> Option<Decimal> {
        Some(self.delivered_quantity)
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// One position of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem<Q> {
    pub id: String,
    /// Item of the source document this line was derived from.
    pub source_item_id: Option<String>,
    /// 1-based position within the document.
    pub position: u32,
    pub article_id: Option<String>,
    pub description: String,
    pub unit: String,
    pub unit_price: Money,
    pub discount_percent: Percent,
    pub tax_rate: Percent,
    pub quantities: Q,
    pub net_amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
}

impl<Q: LineQuantities> LineItem<Q> {
    /// Recomputes net, tax and total from price, discount and quantity.
    pub fn recompute(&mut self) {
        self.net_amount = self
            .unit_price
            .multiply_quantity(self.quantities.effective())
            .apply_percentage_discount(self.discount_percent);
        self.tax_amount = self.net_amount.calculate_tax(self.tax_rate);
        self.total_amount = self.net_amount + self.tax_amount;
    }

    /// Quantity used for amounts.
    pub fn effective_quantity(&self) -> Decimal {
        self.quantities.effective()
    }

    /// Carries price fields of this line into a new input for a derived document.
    ///
    /// The derived line keeps unit price and discount; the tax rate can be
    /// overridden by the conversion.
    pub fn derive_input(
        &self,
        quantity: Decimal,
        reference: Option<Decimal>,
        tax_rate_override: Option<Percent>,
    ) -> NewLineItem {
        NewLineItem {
            article_id: self.article_id.clone(),
            description: self.description.clone(),
            unit: Some(self.unit.clone()),
            quantity,
            unit_price: self.unit_price,
            discount_percent: self.discount_percent,
            tax_rate: tax_rate_override.unwrap_or(self.tax_rate),
            source_item_id: Some(self.id.clone()),
            reference_quantity: reference,
        }
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// Input for adding a line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLineItem {
    #[serde(default)]
    pub article_id: Option<String>,
    pub description: String,
    #[serde(default)]
    pub unit: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Money,
    #[serde(default)]
    pub discount_percent: Percent,
    #[serde(default)]
    pub tax_rate: Percent,
    #[serde(default)]
    pub source_item_id: Option<String>,
    #[serde(default)]
    pub reference_quantity: Option<Decimal>,
}

impl NewLineItem {
    /// Input with the required fields; discount and tax default to zero.
    pub fn new(description: impl Into<String>, quantity: Decimal, unit_price: Money) -> Self {
        NewLineItem {
            article_id: None,
            description: description.into(),
            unit: None,
            quantity,
            unit_price,
            discount_percent: Percent::zero(),
            tax_rate: Percent::zero(),
            source_item_id: None,
            reference_quantity: None,
        }
    }

    pub fn with_tax_rate(mut self, rate: Percent) -> Self {
        self.tax_rate = rate;
        self
    }

    pub fn with_discount(mut self, discount: Percent) -> Self {
        self.discount_percent = discount;
        self
    }

    pub fn with_article(mut self, article_id: impl Into<String>) -> Self {
        self.article_id = Some(article_id.into());
        self
    }

    /// Checks field rules that do not depend on the document.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_required("description", &self.description)?;
        validate_quantity("quantity", self.quantity)?;
        validate_unit_price(self.unit_price)?;
        validate_percent("discountPercent", self.discount_percent)?;
        validate_percent("taxRate", self.tax_rate)?;
        Ok(())
    }
}

/// Partial update of a line item. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    pub article_id: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Money>,
    pub discount_percent: Option<Percent>,
    pub tax_rate: Option<Percent>,
}

impl ItemPatch {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(description) = &self.description {
            validate_required("description", description)?;
        }
        if let Some(quantity) = self.quantity {
            validate_quantity("quantity", quantity)?;
        }
        if let Some(price) = self.unit_price {
            validate_unit_price(price)?;
        }
        if let Some(discount) = self.discount_percent {
            validate_percent("discountPercent", discount)?;
        }
        if let Some(rate) = self.tax_rate {
            validate_percent("taxRate", rate)?;
        }
        Ok(())
    }
}

// =============================================================================
// Item Ledger
// =============================================================================

/// Ordered collection of line items with amount bookkeeping.
///
/// The ledger owns positions (1..n, contiguous) and keeps every line's
/// amounts current. Document totals are read from [`ItemLedger::totals`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
#[serde(bound(serialize = "Q: Serialize", deserialize = "Q: DeserializeOwned"))]
pub struct ItemLedger<Q> {
    items: Vec<LineItem<Q>>,
}

impl<Q: LineQuantities> Default for ItemLedger<Q> {
    fn default() -> Self {
        ItemLedger { items: Vec::new() }
    }
}

impl<Q: LineQuantities> ItemLedger<Q> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a ledger from inputs, validating every one before adding any.
    pub fn from_inputs(inputs: Vec<NewLineItem>) -> CoreResult<Self> {
        for input in &inputs {
            Self::check_input(input)?;
        }
        let mut ledger = Self::new();
        for input in inputs {
            ledger.push(input);
        }
        Ok(ledger)
    }

    pub fn items(&self) -> &[LineItem<Q>] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &LineItem<Q>> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, item_id: &str) -> Option<&LineItem<Q>> {
        self.items.iter().find(|item| item.id == item_id)
    }

    /// Looks up an item or fails with `NotFound`.
    pub fn require(&self, item_id: &str) -> CoreResult<&LineItem<Q>> {
        self.get(item_id)
            .ok_or_else(|| CoreError::not_found("line item", item_id))
    }

    pub(crate) fn get_mut(&mut self, item_id: &str) -> CoreResult<&mut LineItem<Q>> {
        self.items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| CoreError::not_found("line item", item_id))
    }

    /// Validates and appends a new item. Returns the new item's id.
    pub fn add(&mut self, input: NewLineItem) -> CoreResult<String> {
        Self::check_input(&input)?;
        Ok(self.push(input))
    }

    /// Applies a patch to one item and recomputes its amounts.
    pub fn update(&mut self, item_id: &str, patch: ItemPatch) -> CoreResult<()> {
        patch.validate()?;
        let item = self.get_mut(item_id)?;

        if let Some(quantity) = patch.quantity {
            Self::check_reference(quantity, item.quantities.reference())?;
            item.quantities.set_quantity(quantity);
        }
        if let Some(article_id) = patch.article_id {
            item.article_id = Some(article_id);
        }
        if let Some(description) = patch.description {
            item.description = description;
        }
        if let Some(unit) = patch.unit {
            item.unit = unit;
        }
        if let Some(price) = patch.unit_price {
            item.unit_price = price;
        }
        if let Some(discount) = patch.discount_percent {
            item.discount_percent = discount;
        }
        if let Some(rate) = patch.tax_rate {
            item.tax_rate = rate;
        }

        item.recompute();
        Ok(())
    }

    /// Removes an item and renumbers the remaining positions.
    pub fn remove(&mut self, item_id: &str) -> CoreResult<LineItem<Q>> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or_else(|| CoreError::not_found("line item", item_id))?;

        let removed = self.items.remove(index);
        for (i, item) in self.items.iter_mut().enumerate() {
            item.position = i as u32 + 1;
        }
        Ok(removed)
    }

    /// Sums all line amounts.
    pub fn totals(&self) -> DocumentTotals {
        DocumentTotals::from_lines(self.items.iter().map(|i| (&i.net_amount, &i.tax_amount)))
    }

    fn check_input(input: &NewLineItem) -> CoreResult<()> {
        input.validate()?;
        let quantities = Q::for_new_item(input.quantity, input.reference_quantity);
        Self::check_reference(input.quantity, quantities.reference())
    }

    fn check_reference(quantity: Decimal, reference: Option<Decimal>) -> CoreResult<()> {
        if let Some(reference) = reference {
            if quantity > reference {
                return Err(ValidationError::OutOfRange {
                    field: "quantity".to_string(),
                    min: "0".to_string(),
                    max: reference.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn push(&mut self, input: NewLineItem) -> String {
        let id = Uuid::new_v4().to_string();
        let mut item = LineItem {
            id: id.clone(),
            source_item_id: input.source_item_id,
            position: self.items.len() as u32 + 1,
            article_id: input.article_id,
            description: input.description.trim().to_string(),
            unit: input.unit.unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            unit_price: input.unit_price,
            discount_percent: input.discount_percent,
            tax_rate: input.tax_rate,
            quantities: Q::for_new_item(input.quantity, input.reference_quantity),
            net_amount: Money::zero(),
            tax_amount: Money::zero(),
            total_amount: Money::zero(),
        };
        item.recompute();
        self.items.push(item);
        id
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn chairs() -> NewLineItem {
        NewLineItem::new("Office chair", dec!(100), Money::from_major(10))
            .with_tax_rate(Percent::from_whole(19))
    }

    #[test]
    fn test_line_amounts() {
        let mut ledger: ItemLedger<OrderQuantities> = ItemLedger::new();
        let id = ledger.add(chairs()).unwrap();
        let item = ledger.get(&id).unwrap();

        assert_eq!(item.net_amount.amount(), dec!(1000));
        assert_eq!(item.tax_amount.amount(), dec!(190));
        assert_eq!(item.total_amount.amount(), dec!(1190));
        assert_eq!(item.unit, DEFAULT_UNIT);
        assert_eq!(item.position, 1);
    }

    #[test]
    fn test_discount_applies_before_tax() {
        let mut ledger: ItemLedger<OfferQuantities> = ItemLedger::new();
        let id = ledger
            .add(chairs().with_discount(Percent::from_whole(10)))
            .unwrap();
        let item = ledger.get(&id).unwrap();

        assert_eq!(item.net_amount.amount(), dec!(900));
        assert_eq!(item.tax_amount.amount(), dec!(171));
    }

    #[test]
    fn test_totals_match_sum_of_lines() {
        let mut ledger: ItemLedger<OfferQuantities> = ItemLedger::new();
        ledger.add(chairs()).unwrap();
        ledger
            .add(
                NewLineItem::new("Desk", dec!(3), Money::new(dec!(249.99)))
                    .with_tax_rate(Percent::from_whole(7)),
            )
            .unwrap();

        let totals = ledger.totals();
        let sum: Money = ledger.iter().map(|i| i.total_amount).sum();
        assert_eq!(totals.total_amount, sum);
        assert_eq!(totals.total_amount, totals.subtotal_amount + totals.tax_amount);
    }

    #[test]
    fn test_update_recomputes_line() {
        let mut ledger: ItemLedger<OrderQuantities> = ItemLedger::new();
        let id = ledger.add(chairs()).unwrap();

        ledger
            .update(
                &id,
                ItemPatch {
                    quantity: Some(dec!(50)),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(ledger.get(&id).unwrap().total_amount.amount(), dec!(595));
    }

    #[test]
    fn test_update_unknown_item_is_not_found() {
        let mut ledger: ItemLedger<OrderQuantities> = ItemLedger::new();
        let err = ledger.update("missing", ItemPatch::default()).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn test_remove_renumbers_positions() {
        let mut ledger: ItemLedger<OfferQuantities> = ItemLedger::new();
        let first = ledger.add(chairs()).unwrap();
        ledger.add(chairs()).unwrap();
        let third = ledger.add(chairs()).unwrap();

        ledger.remove(&first).unwrap();

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get(&third).unwrap().position, 2);
        assert!(ledger.remove(&first).is_err());
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let mut ledger: ItemLedger<OfferQuantities> = ItemLedger::new();

        let zero_qty = NewLineItem::new("Chair", dec!(0), Money::from_major(1));
        assert!(ledger.add(zero_qty).is_err());

        let bad_tax = chairs().with_tax_rate(Percent::from_whole(101));
        assert!(ledger.add(bad_tax).is_err());

        let negative_price = NewLineItem::new("Chair", dec!(1), Money::from_major(-1));
        assert!(ledger.add(negative_price).is_err());

        assert!(ledger.is_empty());
    }

    #[test]
    fn test_oversized_values_are_rejected_not_overflowed() {
        let mut ledger: ItemLedger<OrderQuantities> = ItemLedger::new();

        let bulk = NewLineItem::new("Bulk", dec!(1e15), Money::new(dec!(1e15)));
        let err = ledger.add(bulk).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { .. })
        ));

        let id = ledger.add(chairs()).unwrap();
        let patch = ItemPatch {
            unit_price: Some(Money::new(dec!(1e20))),
            ..Default::default()
        };
        assert!(ledger.update(&id, patch).is_err());
        assert_eq!(ledger.totals().total_amount, Money::from_major(1190));

        // Largest accepted line stays exact
        let largest = NewLineItem::new(
            "Largest",
            Decimal::from(crate::MAX_QUANTITY),
            Money::from_major(crate::MAX_UNIT_PRICE),
        )
        .with_tax_rate(Percent::from_whole(100));
        let id = ledger.add(largest).unwrap();
        assert_eq!(ledger.get(&id).unwrap().total_amount.amount(), dec!(2e21));
    }

    #[test]
    fn test_from_inputs_is_all_or_nothing() {
        let inputs = vec![chairs(), NewLineItem::new("", dec!(1), Money::from_major(1))];
        let result: CoreResult<ItemLedger<OfferQuantities>> = ItemLedger::from_inputs(inputs);
        assert!(result.is_err());
    }

    #[test]
    fn test_delivery_line_uses_delivered_quantity() {
        let mut input = chairs();
        input.quantity = dec!(50);
        input.reference_quantity = Some(dec!(100));

        let mut ledger: ItemLedger<DeliveryQuantities> = ItemLedger::new();
        let id = ledger.add(input).unwrap();
        let item = ledger.get(&id).unwrap();

        assert_eq!(item.quantities.ordered_quantity, dec!(100));
        assert_eq!(item.quantities.delivered_quantity, dec!(50));
        assert_eq!(item.total_amount.amount(), dec!(595));
    }

    #[test]
    fn test_bounded_line_cannot_exceed_reference() {
        let mut input = chairs();
        input.quantity = dec!(40);
        input.reference_quantity = Some(dec!(30));

        let mut ledger: ItemLedger<InvoiceQuantities> = ItemLedger::new();
        assert!(ledger.add(input).is_err());
    }

    #[test]
    fn test_derive_input_keeps_price_and_links_source() {
        let mut ledger: ItemLedger<OrderQuantities> = ItemLedger::new();
        let id = ledger.add(chairs().with_discount(Percent::from_whole(5))).unwrap();
        let source = ledger.get(&id).unwrap();

        let derived = source.derive_input(dec!(10), Some(dec!(100)), Some(Percent::from_whole(7)));
        assert_eq!(derived.source_item_id.as_deref(), Some(id.as_str()));
        assert_eq!(derived.unit_price, source.unit_price);
        assert_eq!(derived.discount_percent, Percent::from_whole(5));
        assert_eq!(derived.tax_rate, Percent::from_whole(7));
    }
}
