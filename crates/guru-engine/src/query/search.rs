//! Budget-constrained catalog pre-search.
//!
//! Runs before the first model consultation when the analyzer found both
//! a budget and requested categories. Allocates the budget across
//! categories proportionally to priority, searches highest priority
//! first, then drops lowest-priority categories until the total fits.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{CatalogSearch, DietaryTag, ProductRecord, SearchFilters};
use crate::error::Result;
use crate::query::analyzer::{Exclusion, ProductKind, QueryConstraints};

/// Headroom multiplier on per-category allocations; cheap picks in one
/// category free up budget for another.
const ALLOCATION_HEADROOM: f64 = 1.5;

/// A beginner asking for more than this many categories gets a warning
const BEGINNER_CATEGORY_LIMIT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    /// Everything requested fits
    Under,
    /// Even after drops the total exceeds the budget
    Over,
    /// Fits only after dropping the listed categories
    UnderAfterDrops,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstrainedSearchResult {
    pub products: Vec<ProductRecord>,
    pub total_price: f64,
    pub budget: f64,
    pub status: BudgetStatus,
    /// Categories dropped to fit the budget, lowest priority first
    pub dropped: Vec<ProductKind>,
    /// Beginner asked for more categories than advisable
    pub beginner_overload: bool,
}

fn lower(name: &str) -> String {
    name.to_lowercase()
}

/// Name-level heuristic; catalogs rarely carry structured dietary data.
pub fn is_lactose_free(product: &ProductRecord) -> bool {
    let name = lower(&product.name);
    name.contains("isolate")
        || name.contains("vegan")
        || name.contains("plant")
        || name.contains("lactose free")
        || name.contains("lactose-free")
}

pub fn is_vegan(product: &ProductRecord) -> bool {
    let name = lower(&product.name);
    name.contains("vegan") || name.contains("plant")
}

pub fn is_gluten_free(product: &ProductRecord) -> bool {
    let name = lower(&product.name);
    // Whey, creatine and most capsules are gluten-free unless flavored
    // with cereal additives; only explicit mentions disqualify.
    !name.contains("oat") && !name.contains("cookie") && !name.contains("cereal")
}

pub fn is_sugar_free(product: &ProductRecord) -> bool {
    let name = lower(&product.name);
    name.contains("sugar free")
        || name.contains("sugar-free")
        || name.contains("zero")
        || !name.contains("sugar")
}

pub fn is_caffeine_free(product: &ProductRecord) -> bool {
    let name = lower(&product.name);
    if name.contains("caffeine free") || name.contains("caffeine-free") || name.contains("stim-free")
    {
        return true;
    }
    !(name.contains("caffeine")
        || name.contains("energy")
        || name.contains("stim")
        || product.category == "preworkout")
}

fn passes_filters(product: &ProductRecord, constraints: &QueryConstraints) -> bool {
    for tag in &constraints.dietary {
        let ok = match tag {
            DietaryTag::LactoseFree => {
                product.category != "protein" || is_lactose_free(product)
            }
            DietaryTag::Vegan => product.category != "protein" || is_vegan(product),
            DietaryTag::GlutenFree => is_gluten_free(product),
        };
        if !ok {
            return false;
        }
    }
    for exclusion in &constraints.exclusions {
        let ok = match exclusion {
            Exclusion::Sugar => is_sugar_free(product),
            Exclusion::Caffeine => is_caffeine_free(product),
            Exclusion::Lactose => product.category != "protein" || is_lactose_free(product),
            Exclusion::Gluten => is_gluten_free(product),
            Exclusion::Soy => !lower(&product.name).contains("soy"),
        };
        if !ok {
            return false;
        }
    }
    true
}

struct CategoryPick {
    kind: ProductKind,
    products: Vec<ProductRecord>,
    subtotal: f64,
}

/// Search the catalog for every requested category under the budget.
pub async fn search_with_constraints(
    catalog: &Arc<dyn CatalogSearch>,
    constraints: &QueryConstraints,
    max_per_category: usize,
) -> Result<Option<ConstrainedSearchResult>> {
    let budget = match constraints.budget {
        Some(budget) if !constraints.products.is_empty() => budget,
        _ => return Ok(None),
    };

    let mut kinds = constraints.products.clone();
    kinds.sort_by(|a, b| b.priority().cmp(&a.priority()));
    kinds.dedup();

    let total_priority: f64 = kinds.iter().map(|k| f64::from(k.priority())).sum();

    let mut picks: Vec<CategoryPick> = Vec::new();
    let mut dropped = Vec::new();
    for kind in &kinds {
        let share = f64::from(kind.priority()) / total_priority;
        let allocation = budget * share * ALLOCATION_HEADROOM;

        let filters = SearchFilters {
            max_price: Some(allocation),
            dietary: constraints.dietary.clone(),
            in_stock_only: true,
        };
        let mut found = catalog.search(kind.search_query(), &filters).await?;
        found.retain(|product| product.in_stock && passes_filters(product, constraints));
        let had_candidates = !found.is_empty();
        found.retain(|product| product.price <= allocation);
        // Cheapest first so the category fits its allocation
        found.sort_by(|a, b| a.price.total_cmp(&b.price));
        found.truncate(max_per_category);

        debug!(
            category = ?kind,
            allocation,
            found = found.len(),
            "constrained search for category"
        );

        if !found.is_empty() {
            let subtotal = found.iter().map(|p| p.price).sum();
            picks.push(CategoryPick {
                kind: *kind,
                products: found,
                subtotal,
            });
        } else if had_candidates {
            // Existed in the catalog but nothing fit this allocation
            dropped.push(*kind);
        }
    }

    // Drop lowest-priority categories until the total fits
    let mut total: f64 = picks.iter().map(|pick| pick.subtotal).sum();
    while total > budget && picks.len() > 1 {
        // picks are ordered highest priority first
        if let Some(pick) = picks.pop() {
            total -= pick.subtotal;
            dropped.push(pick.kind);
        }
    }

    let status = if total > budget {
        BudgetStatus::Over
    } else if dropped.is_empty() {
        BudgetStatus::Under
    } else {
        BudgetStatus::UnderAfterDrops
    };

    let beginner_overload = constraints.is_beginner && kinds.len() > BEGINNER_CATEGORY_LIMIT;

    let products: Vec<ProductRecord> = picks.into_iter().flat_map(|pick| pick.products).collect();

    Ok(Some(ConstrainedSearchResult {
        products,
        total_price: total,
        budget,
        status,
        dropped,
        beginner_overload,
    }))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::query::analyzer::analyze;

    struct FixedCatalog {
        products: Vec<ProductRecord>,
    }

    #[async_trait]
    impl CatalogSearch for FixedCatalog {
        async fn search(
            &self,
            query: &str,
            _filters: &SearchFilters,
        ) -> Result<Vec<ProductRecord>> {
            let needle = query.split_whitespace().next().unwrap_or(query);
            Ok(self
                .products
                .iter()
                .filter(|p| p.category.contains(needle) || lower(&p.name).contains(needle))
                .cloned()
                .collect())
        }
    }

    fn product(id: &str, name: &str, category: &str, price: f64) -> ProductRecord {
        ProductRecord {
            id: id.into(),
            name: name.into(),
            brand: None,
            price,
            category: category.into(),
            in_stock: true,
        }
    }

    fn catalog() -> Arc<dyn CatalogSearch> {
        Arc::new(FixedCatalog {
            products: vec![
                product("w1", "Whey Protein 1kg", "protein", 110.0),
                product("w2", "Whey Isolate 900g", "protein", 140.0),
                product("w3", "Vegan Plant Protein", "protein", 125.0),
                product("c1", "Creatine Monohydrate 300g", "creatine", 45.0),
                product("c2", "Creatine HCL", "creatine", 60.0),
                product("o1", "Omega 3 Fish Oil", "omega", 35.0),
                product("col1", "Collagen Peptides", "collagen", 55.0),
                product("pw1", "Energy Pre-Workout Blast", "preworkout", 50.0),
                product("pw2", "Stim-Free Pre-Workout", "preworkout", 55.0),
                product("g1", "Sugar Blast Mass Gainer", "gainer", 90.0),
                product("g2", "Zero Mass Gainer", "gainer", 95.0),
            ],
        })
    }

    #[tokio::test]
    async fn test_no_presearch_without_budget() {
        let constraints = analyze("recommend some protein", &[]);
        let result = search_with_constraints(&catalog(), &constraints, 3)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_under_budget_keeps_all_categories() {
        let constraints = analyze("I have 200 in budget, want protein and creatine", &[]);
        let result = search_with_constraints(&catalog(), &constraints, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.status, BudgetStatus::Under);
        assert!(result.dropped.is_empty());
        // protein first (priority 10 beats 9), cheapest pick each
        assert_eq!(result.products[0].id, "w1");
        assert_eq!(result.products[1].id, "c1");
        assert!(result.total_price <= 200.0);
    }

    #[tokio::test]
    async fn test_lowest_priority_dropped_first() {
        let constraints = analyze(
            "I have 160 in budget, want protein, creatine and collagen",
            &[],
        );
        let result = search_with_constraints(&catalog(), &constraints, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.status, BudgetStatus::UnderAfterDrops);
        assert_eq!(result.dropped, vec![ProductKind::Collagen]);
        assert!(result.products.iter().all(|p| p.category != "collagen"));
        assert!(result.total_price <= 160.0);
    }

    #[tokio::test]
    async fn test_lactose_filter_prefers_isolate_or_vegan() {
        let constraints = analyze(
            "I have dairy intolerance and 250 in budget, want protein",
            &[],
        );
        let result = search_with_constraints(&catalog(), &constraints, 2)
            .await
            .unwrap()
            .unwrap();
        assert!(!result.products.is_empty());
        assert!(result.products.iter().all(is_lactose_free));
    }

    #[tokio::test]
    async fn test_beginner_overload_flagged() {
        let constraints = analyze(
            "I'm a beginner with 300 in budget, want protein, creatine and omega",
            &[],
        );
        let result = search_with_constraints(&catalog(), &constraints, 1)
            .await
            .unwrap()
            .unwrap();
        assert!(result.beginner_overload);
    }

    #[tokio::test]
    async fn test_caffeine_exclusion_filters_presearch() {
        let constraints = analyze("I have 100 in budget, want pre-workout without caffeine", &[]);
        let result = search_with_constraints(&catalog(), &constraints, 3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.products.len(), 1);
        assert_eq!(result.products[0].id, "pw2");
    }

    #[tokio::test]
    async fn test_sugar_exclusion_filters_presearch() {
        let constraints = analyze("I have 200 in budget, want mass gainer without sugar", &[]);
        let result = search_with_constraints(&catalog(), &constraints, 3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.products.len(), 1);
        assert_eq!(result.products[0].id, "g2");
    }

    #[test]
    fn test_dietary_name_heuristics() {
        assert!(is_lactose_free(&product("x", "Whey Isolate", "protein", 1.0)));
        assert!(!is_lactose_free(&product("x", "Whey Concentrate", "protein", 1.0)));
        assert!(is_vegan(&product("x", "Plant Protein Blend", "protein", 1.0)));
        assert!(!is_caffeine_free(&product("x", "Energy Pre-Workout", "preworkout", 1.0)));
        assert!(is_sugar_free(&product("x", "Creatine Zero", "creatine", 1.0)));
    }
}
