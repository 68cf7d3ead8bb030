//! Reorder recommendations derived from ledger + catalog.
//!
//! Always recomputed on demand; never stored.

use serde::Serialize;

use reqflow_core::PartNumber;

use crate::catalog::Catalog;
use crate::ledger::StockLedger;

/// A catalog part at or below its reorder threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderItem {
    pub part_number: PartNumber,
    pub description: String,
    pub current_stock: i64,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub rol: Option<i64>,
    pub roq: Option<i64>,
    /// The threshold actually applied: `rol`, else `min`, else 0.
    pub threshold: i64,
    pub recommended_qty: i64,
    pub location: Option<String>,
    pub category: Option<String>,
    pub gl_code: Option<String>,
    pub cost_center: Option<String>,
}

/// Every catalog part whose ledger quantity is `<= rol ?? min ?? 0`.
///
/// `recommended_qty` is `roq`, else `max - current_stock`, floored at zero.
/// Output follows catalog (part-number) order.
pub fn compute_reorder_list(ledger: &StockLedger, catalog: &Catalog) -> Vec<ReorderItem> {
    catalog
        .iter()
        .filter_map(|product| {
            let current_stock = ledger.quantity_of(&product.part_number);
            let threshold = product.rol.or(product.min).unwrap_or(0);
            if current_stock > threshold {
                return None;
            }

            let recommended_qty = product
                .roq
                .unwrap_or_else(|| product.max.unwrap_or(0).saturating_sub(current_stock))
                .max(0);

            Some(ReorderItem {
                part_number: product.part_number.clone(),
                description: product.description.clone(),
                current_stock,
                min: product.min,
                max: product.max,
                rol: product.rol,
                roq: product.roq,
                threshold,
                recommended_qty,
                location: product.location.clone(),
                category: product.category.clone(),
                gl_code: product.gl_code.clone(),
                cost_center: product.cost_center.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;
    use crate::ledger::SnapshotRow;
    use proptest::prelude::*;

    fn part(s: &str) -> PartNumber {
        PartNumber::parse(s).unwrap()
    }

    fn entry(p: &str, min: Option<i64>, max: Option<i64>, rol: Option<i64>, roq: Option<i64>) -> CatalogEntry {
        CatalogEntry {
            min,
            max,
            rol,
            roq,
            ..CatalogEntry::new(part(p), p)
        }
    }

    fn ledger_with(rows: &[(&str, i64)]) -> StockLedger {
        let mut ledger = StockLedger::new();
        ledger
            .load_snapshot(rows.iter().map(|(p, q)| SnapshotRow {
                part_number: part(p),
                description: String::new(),
                quantity: *q,
            }))
            .unwrap();
        ledger
    }

    #[test]
    fn low_stock_part_uses_max_minus_stock_without_roq() {
        let catalog = Catalog::from_entries([entry("P1", None, Some(20), Some(5), None)]).unwrap();
        let ledger = ledger_with(&[("P1", 2)]);

        let list = compute_reorder_list(&ledger, &catalog);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].part_number, part("P1"));
        assert_eq!(list[0].current_stock, 2);
        assert_eq!(list[0].recommended_qty, 18);
    }

    #[test]
    fn extreme_catalog_max_saturates_instead_of_overflowing() {
        let catalog = Catalog::from_entries([entry("P1", None, Some(i64::MIN), Some(5), None)]).unwrap();
        let list = compute_reorder_list(&ledger_with(&[("P1", 3)]), &catalog);
        assert_eq!(list[0].recommended_qty, 0);
    }

    #[test]
    fn roq_wins_over_max_when_present() {
        let catalog = Catalog::from_entries([entry("P1", None, Some(20), Some(5), Some(50))]).unwrap();
        let list = compute_reorder_list(&ledger_with(&[("P1", 5)]), &catalog);
        assert_eq!(list[0].recommended_qty, 50);
    }

    #[test]
    fn min_is_threshold_when_rol_absent() {
        let catalog = Catalog::from_entries([
            entry("A", Some(3), Some(10), None, None),
            entry("B", Some(3), Some(10), None, None),
        ])
        .unwrap();
        let list = compute_reorder_list(&ledger_with(&[("A", 3), ("B", 4)]), &catalog);

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].part_number, part("A"));
        assert_eq!(list[0].threshold, 3);
    }

    #[test]
    fn untracked_catalog_part_counts_as_zero_stock() {
        let catalog = Catalog::from_entries([entry("P7", None, None, None, None)]).unwrap();
        let list = compute_reorder_list(&StockLedger::new(), &catalog);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].current_stock, 0);
        assert_eq!(list[0].recommended_qty, 0);
    }

    #[test]
    fn recommendation_is_floored_at_zero() {
        // Over-stocked relative to max but still under a generous rol.
        let catalog = Catalog::from_entries([entry("P1", None, Some(5), Some(100), None)]).unwrap();
        let list = compute_reorder_list(&ledger_with(&[("P1", 40)]), &catalog);
        assert_eq!(list[0].recommended_qty, 0);
    }

    proptest! {
        /// Property: a part is listed iff its stock is at or below the threshold.
        #[test]
        fn inclusion_matches_threshold(
            stock in 0i64..100,
            min in prop::option::of(0i64..100),
            rol in prop::option::of(0i64..100),
        ) {
            let catalog = Catalog::from_entries([entry("P1", min, Some(100), rol, None)]).unwrap();
            let list = compute_reorder_list(&ledger_with(&[("P1", stock)]), &catalog);

            let threshold = rol.or(min).unwrap_or(0);
            prop_assert_eq!(list.len() == 1, stock <= threshold);
            for item in &list {
                prop_assert!(item.recommended_qty >= 0);
            }
        }
    }
}
