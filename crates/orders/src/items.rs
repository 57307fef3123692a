//! Order lines and the stock they consume.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, Quantity};
use stockledger_products::{ComboComponent, VariantId};

/// Free item granted with a line (other-variant promotions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftItem {
    pub variant_id: VariantId,
    pub quantity: Quantity,
}

/// One order line.
///
/// `components` is the resolved combo recipe when `variant_id` is a combo; empty for
/// simple variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub variant_id: VariantId,
    pub quantity: Quantity,
    #[serde(default)]
    pub components: Vec<ComboComponent>,
    #[serde(default)]
    pub gifts: Vec<GiftItem>,
}

impl OrderLine {
    pub fn is_combo(&self) -> bool {
        !self.components.is_empty()
    }

    pub(crate) fn validate(&self) -> DomainResult<()> {
        if !self.quantity.is_positive() {
            return Err(DomainError::validation("line quantity must be positive"));
        }
        if self.components.iter().any(|c| !c.quantity.is_positive()) {
            return Err(DomainError::validation("combo component quantity must be positive"));
        }
        if self.gifts.iter().any(|g| !g.quantity.is_positive()) {
            return Err(DomainError::validation("gift quantity must be positive"));
        }
        Ok(())
    }
}

/// Stock an order consumes, per simple variant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StockItems {
    /// Number of order lines (not of distinct variants).
    pub line_count: usize,
    pub items: BTreeMap<VariantId, Quantity>,
}

impl StockItems {
    pub fn quantity_of(&self, variant_id: &VariantId) -> Option<Quantity> {
        self.items.get(variant_id).copied()
    }
}

/// Flatten lines into stock quantities.
///
/// Simple lines count their quantity, combo lines count `component × line quantity`
/// for each component, gifts count their own quantity.
pub fn stock_items(lines: &[OrderLine]) -> DomainResult<StockItems> {
    let mut items: BTreeMap<VariantId, Quantity> = BTreeMap::new();

    let mut add = |variant_id: VariantId, quantity: Quantity| -> DomainResult<()> {
        let entry = items.entry(variant_id).or_insert(Quantity::ZERO);
        *entry = entry.checked_add(quantity)?;
        Ok(())
    };

    for line in lines {
        if line.is_combo() {
            for c in &line.components {
                add(c.variant_id, c.quantity.checked_mul(line.quantity)?)?;
            }
        } else {
            add(line.variant_id, line.quantity)?;
        }
        for gift in &line.gifts {
            add(gift.variant_id, gift.quantity)?;
        }
    }

    Ok(StockItems {
        line_count: lines.len(),
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(v: i64) -> Quantity {
        Quantity::from_i64(v).unwrap()
    }

    #[test]
    fn combos_expand_and_gifts_accumulate() {
        let tea = VariantId::generate();
        let cup = VariantId::generate();
        let gift_box = VariantId::generate();

        let lines = vec![
            OrderLine {
                variant_id: tea,
                quantity: q(2),
                components: vec![],
                gifts: vec![GiftItem {
                    variant_id: cup,
                    quantity: q(1),
                }],
            },
            OrderLine {
                variant_id: gift_box,
                quantity: q(3),
                components: vec![
                    ComboComponent {
                        variant_id: tea,
                        quantity: q(2),
                    },
                    ComboComponent {
                        variant_id: cup,
                        quantity: q(1),
                    },
                ],
                gifts: vec![],
            },
        ];

        let stock = stock_items(&lines).unwrap();
        assert_eq!(stock.line_count, 2);
        assert_eq!(stock.quantity_of(&tea), Some(q(8)));
        assert_eq!(stock.quantity_of(&cup), Some(q(4)));
        assert_eq!(stock.quantity_of(&gift_box), None);
    }
}
