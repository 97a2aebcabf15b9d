//! # Derivation Planning
//!
//! Decides how much of each source item goes into a derived document.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  source item      quantity   already derived   remaining                │
//! │  ───────────      ────────   ───────────────   ─────────                │
//! │  chairs              100            50             50                   │
//! │  desks                10            10              0                   │
//! │                                                                         │
//! │  default mode  → chairs 50           (desks skipped, nothing left)      │
//! │  partial {chairs: 30} → chairs 30                                      │
//! │  partial {chairs: 80} → chairs 50    (clamped to remaining)            │
//! │  partial {desks: 5}   → InvalidState (desks has nothing left)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Planning is pure; nothing is written until every line has been planned.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::error::{CoreError, CoreResult, ValidationError};

/// One source item as seen by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub item_id: String,
    /// Upper bound for everything derived from this item.
    pub quantity: Decimal,
    /// Cumulative quantity already carried into earlier derivatives.
    pub already_derived: Decimal,
}

impl SourceLine {
    pub fn remaining(&self) -> Decimal {
        (self.quantity - self.already_derived).max(Decimal::ZERO)
    }
}

/// Quantity to derive for one source item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLine {
    pub item_id: String,
    pub quantity: Decimal,
}

/// Plans derived quantities.
///
/// - `partial == None`: every item with remaining quantity is derived in
///   full; items with nothing left are skipped.
/// - `partial == Some(map)`: only the named items are derived, each at
///   `min(requested, remaining)`.
///
/// The result follows the order of `lines`.
///
/// ## Errors
/// - `NotFound` for an item id the source does not have
/// - `Validation` for a requested quantity ≤ 0
/// - `InvalidState` when a named item, or the whole source, has nothing left
pub fn plan_derivation(
    source_label: &str,
    lines: &[SourceLine],
    partial: Option<&HashMap<String, Decimal>>,
) -> CoreResult<Vec<PlannedLine>> {
    let planned: Vec<PlannedLine> = match partial {
        None => lines
            .iter()
            .filter(|line| line.remaining() > Decimal::ZERO)
            .map(|line| PlannedLine {
                item_id: line.item_id.clone(),
                quantity: line.remaining(),
            })
            .collect(),
        Some(requested) => plan_partial(source_label, lines, requested)?,
    };

    if planned.is_empty() {
        return Err(CoreError::invalid_state(format!(
            "Nothing left to convert on {}",
            source_label
        )));
    }
    Ok(planned)
}

fn plan_partial(
    source_label: &str,
    lines: &[SourceLine],
    requested: &HashMap<String, Decimal>,
) -> CoreResult<Vec<PlannedLine>> {
    let mut ids: Vec<&String> = requested.keys().collect();
    ids.sort();

    for id in ids {
        if requested[id] <= Decimal::ZERO {
            return Err(ValidationError::MustBePositive {
                field: format!("partialQuantities[{}]", id),
            }
            .into());
        }
        if !lines.iter().any(|line| &line.item_id == id) {
            return Err(CoreError::not_found("line item", id.as_str()));
        }
    }

    let mut planned = Vec::with_capacity(requested.len());
    for line in lines {
        let Some(wanted) = requested.get(&line.item_id) else {
            continue;
        };
        let quantity = (*wanted).min(line.remaining());
        if quantity <= Decimal::ZERO {
            return Err(CoreError::invalid_state(format!(
                "Item {} on {} has no remaining quantity to convert",
                line.item_id, source_label
            )));
        }
        planned.push(PlannedLine {
            item_id: line.item_id.clone(),
            quantity,
        });
    }
    Ok(planned)
}
