//! # Workflow Aggregation
//!
//! Pure status aggregation: a source document's own status is derived by
//! scanning the cumulative progress counters of all of its items.
//!
//! ```text
//! items:   [ 100/100 ]  [ 40/60 ]  [ 0/10 ]
//!              full       some       none
//!                    └───────┬────────┘
//!                            ▼
//!                FulfillmentState::Partial
//! ```
//!
//! Aggregation is idempotent: running it again on unchanged counters yields
//! the same state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How much of a document's items has been carried downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentState {
    /// No item has progressed.
    None,
    /// At least one item has progressed, not all fully.
    Partial,
    /// Every item has reached its target quantity.
    Full,
}

/// Aggregates `(progress, target)` pairs, one per item.
///
/// An empty item list is never fulfilled.
pub fn aggregate<I>(items: I) -> FulfillmentState
where
    I: IntoIterator<Item = (Decimal, Decimal)>,
{
    let mut any_item = false;
    let mut all_full = true;
    let mut any_progress = false;

    for (progress, target) in items {
        any_item = true;
        if progress > Decimal::ZERO {
            any_progress = true;
        }
        if progress < target {
            all_full = false;
        }
    }

    match (any_item, all_full, any_progress) {
        (false, _, _) => FulfillmentState::None,
        (true, true, true) => FulfillmentState::Full,
        (true, _, true) => FulfillmentState::Partial,
        _ => FulfillmentState::None,
    }
}

/// Progress snapshot of one order item, read by other document services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemProgress {
    pub item_id: String,
    pub quantity: Decimal,
    pub delivered_quantity: Decimal,
    pub invoiced_quantity: Decimal,
}

impl ItemProgress {
    pub fn is_fully_delivered(&self) -> bool {
        self.delivered_quantity >= self.quantity
    }

    pub fn is_fully_invoiced(&self) -> bool {
        self.invoiced_quantity >= self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_aggregate_states() {
        assert_eq!(aggregate(Vec::new()), FulfillmentState::None);
        assert_eq!(aggregate(vec![(dec!(0), dec!(10))]), FulfillmentState::None);
        assert_eq!(
            aggregate(vec![(dec!(10), dec!(10)), (dec!(0), dec!(5))]),
            FulfillmentState::Partial
        );
        assert_eq!(
            aggregate(vec![(dec!(10), dec!(10)), (dec!(5), dec!(5))]),
            FulfillmentState::Full
        );
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let items = vec![(dec!(50), dec!(100)), (dec!(3), dec!(3))];
        let first = aggregate(items.clone());
        let second = aggregate(items);
        assert_eq!(first, second);
        assert_eq!(first, FulfillmentState::Partial);
    }

    #[test]
    fn test_item_progress_flags() {
        let progress = ItemProgress {
            item_id: "i-1".to_string(),
            quantity: dec!(100),
            delivered_quantity: dec!(100),
            invoiced_quantity: dec!(30),
        };
        assert!(progress.is_fully_delivered());
        assert!(!progress.is_fully_invoiced());
    }
}
