//! Recursive crafting planner (C16).

use agent_bridge::bridge::{BridgeClient, RawRecipe, RecipeItem};
use agent_core::error::BridgeError;
use agent_registry::conversion::ConversionTable;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

const MAX_DEPTH: u32 = 128;

pub type Inventory = HashMap<String, u32>;

#[derive(Debug, Clone)]
pub struct CraftStep {
    pub item: String,
    pub qty: u32,
    pub use_table: bool,
    pub recipe: RawRecipe,
}

#[derive(Debug, Error)]
pub enum PlanFailure {
    #[error("depth limit reached planning {item}")]
    DepthExceeded { item: String },
    #[error("have {have} of {item}, need {need}, and no recipe can be recursed into")]
    Insufficient { item: String, have: u32, need: u32 },
    #[error("no valid recipe for {item} and not enough on hand (have {have}, need {need})")]
    NoRecipe { item: String, have: u32, need: u32 },
    #[error("every candidate recipe for {item} failed on at least one ingredient")]
    AllCandidatesFailed { item: String },
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

fn is_empty_marker(name: &str) -> bool {
    matches!(name, "" | "empty" | "air")
}

/// Flattens a recipe's `ingredients` (if present) or `inShape` into a
/// tallied `(name, count)` list, dropping empty-cell markers.
pub fn effective_ingredients(recipe: &RawRecipe) -> Vec<(String, u32)> {
    let mut tally: HashMap<String, u32> = HashMap::new();
    if let Some(ingredients) = &recipe.ingredients {
        for item in ingredients {
            if is_empty_marker(&item.name) || item.count == 0 {
                continue;
            }
            *tally.entry(item.name.clone()).or_insert(0) += item.count;
        }
    } else if let Some(shape) = &recipe.in_shape {
        for row in shape {
            for cell in row.iter().flatten() {
                if is_empty_marker(&cell.name) {
                    continue;
                }
                *tally.entry(cell.name.clone()).or_insert(0) += cell.count.max(1);
            }
        }
    }
    tally.into_iter().collect()
}

pub fn is_valid_recipe(recipe: &RawRecipe) -> bool {
    !effective_ingredients(recipe).is_empty()
}

fn summed_ingredient_count(recipe: &RawRecipe) -> u32 {
    effective_ingredients(recipe).iter().map(|(_, c)| c).sum()
}

fn div_ceil(qty: u32, per_batch: u32) -> u32 {
    let per_batch = per_batch.max(1);
    (qty + per_batch - 1) / per_batch
}

pub struct CraftingPlanner<'a> {
    bridge: &'a dyn BridgeClient,
    conversions: &'a ConversionTable,
}

impl<'a> CraftingPlanner<'a> {
    pub fn new(bridge: &'a dyn BridgeClient, conversions: &'a ConversionTable) -> Self {
        Self { bridge, conversions }
    }

    /// Fetches valid recipes in `preferred` table mode, falling back to the
    /// other mode if empty (§4.16).
    async fn valid_recipes(&self, item: &str, preferred_table: bool) -> Result<Vec<RawRecipe>, PlanFailure> {
        let mut recipes: Vec<RawRecipe> = self
            .bridge
            .query_raw_recipe(item, preferred_table)
            .await?
            .into_iter()
            .filter(is_valid_recipe)
            .collect();
        if recipes.is_empty() {
            recipes = self
                .bridge
                .query_raw_recipe(item, !preferred_table)
                .await?
                .into_iter()
                .filter(is_valid_recipe)
                .collect();
        }
        Ok(recipes)
    }

    /// Recursive plan search. Boxed because `async fn` cannot recurse
    /// directly; the inventory is never mutated, every decision below
    /// compares against the caller's original snapshot.
    pub fn try_craft<'b>(
        &'b self,
        item: &'b str,
        qty: u32,
        inventory: &'b Inventory,
        has_table: bool,
        depth: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CraftStep>, PlanFailure>> + Send + 'b>> {
        Box::pin(async move {
            if depth >= MAX_DEPTH {
                return Err(PlanFailure::DepthExceeded { item: item.to_string() });
            }
            let item_norm = self.conversions.normalize(item).to_string();
            let have = *inventory.get(&item_norm).unwrap_or(&0);

            if self.conversions.is_priority_item(&item_norm) {
                return if have >= qty {
                    Ok(Vec::new())
                } else {
                    Err(PlanFailure::Insufficient {
                        item: item_norm,
                        have,
                        need: qty,
                    })
                };
            }

            let candidates = self.valid_recipes(&item_norm, has_table).await?;
            if candidates.is_empty() {
                return if have >= qty {
                    Ok(Vec::new())
                } else {
                    Err(PlanFailure::NoRecipe {
                        item: item_norm,
                        have,
                        need: qty,
                    })
                };
            }

            let mut ranked = candidates;
            ranked.sort_by_key(summed_ingredient_count);

            for recipe in &ranked {
                if let Some(steps) = self
                    .try_recipe(&item_norm, qty, recipe, inventory, has_table, depth)
                    .await?
                {
                    return Ok(steps);
                }
            }

            Err(PlanFailure::AllCandidatesFailed { item: item_norm })
        })
    }

    /// Attempts one candidate recipe's full ingredient loop. `Ok(None)`
    /// means this candidate failed and the caller should try the next one;
    /// a `Bridge` error still propagates immediately.
    async fn try_recipe(
        &self,
        item: &str,
        qty: u32,
        recipe: &RawRecipe,
        inventory: &Inventory,
        has_table: bool,
        depth: u32,
    ) -> Result<Option<Vec<CraftStep>>, PlanFailure> {
        let batches = div_ceil(qty, recipe.result.count);
        let mut steps = Vec::new();

        for (ing_name, per) in effective_ingredients(recipe) {
            let ing_norm = self.conversions.normalize(&ing_name).to_string();
            let need_total = per * batches;
            let have = *inventory.get(&ing_norm).unwrap_or(&0);

            if self.conversions.blocks_recursion(item, &ing_norm) {
                if have < need_total {
                    return Ok(None);
                }
                continue;
            }

            if have >= need_total {
                continue;
            }
            let missing = need_total - have;
            match self.try_craft(&ing_norm, missing, inventory, has_table, depth + 1).await {
                Ok(mut sub_steps) => steps.append(&mut sub_steps),
                Err(PlanFailure::Bridge(e)) => return Err(PlanFailure::Bridge(e)),
                Err(_) => return Ok(None),
            }
        }

        steps.push(CraftStep {
            item: item.to_string(),
            qty,
            use_table: has_table,
            recipe: recipe.clone(),
        });
        Ok(Some(steps))
    }
}

/// Executes a plan sequentially, stopping at the first step failure.
pub async fn execute_plan(bridge: &dyn BridgeClient, steps: &[CraftStep]) -> Result<String, BridgeError> {
    let mut log = String::new();
    for step in steps {
        let count = div_ceil(step.qty, step.recipe.result.count);
        bridge
            .craft_with_recipe(&step.recipe, count, !step.use_table)
            .await?;
        log.push_str(&format!("crafted {count} batch(es) of {}\n", step.item));
    }
    Ok(log)
}

#[derive(Debug, Clone)]
pub struct IngredientShortfall {
    pub name: String,
    pub missing: u32,
}

#[derive(Debug, Clone)]
pub struct RecipeFeasibility {
    pub batches: u32,
    pub result_count: u32,
    pub shortfalls: Vec<IngredientShortfall>,
}

#[derive(Debug, Clone)]
pub struct FeasibilityReport {
    pub item: String,
    pub qty: u32,
    pub recipes: Vec<RecipeFeasibility>,
    pub aggregate_missing: HashMap<String, u32>,
}

/// Produces the per-recipe feasibility breakdown used when no plan is
/// found (§4.16's "Feasibility report").
pub fn feasibility_report(
    item: &str,
    qty: u32,
    candidates: &[RawRecipe],
    inventory: &Inventory,
    conversions: &ConversionTable,
) -> FeasibilityReport {
    let mut aggregate_missing: HashMap<String, u32> = HashMap::new();
    let recipes = candidates
        .iter()
        .filter(|r| is_valid_recipe(r))
        .map(|recipe| {
            let batches = div_ceil(qty, recipe.result.count);
            let mut shortfalls = Vec::new();
            for (name, per) in effective_ingredients(recipe) {
                let norm = conversions.normalize(&name).to_string();
                let need_total = per * batches;
                let have = *inventory.get(&norm).unwrap_or(&0);
                if have < need_total {
                    let missing = need_total - have;
                    *aggregate_missing.entry(norm.clone()).or_insert(0) += missing;
                    shortfalls.push(IngredientShortfall { name: norm, missing });
                }
            }
            RecipeFeasibility {
                batches,
                result_count: recipe.result.count,
                shortfalls,
            }
        })
        .collect();

    FeasibilityReport {
        item: item.to_string(),
        qty,
        recipes,
        aggregate_missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use agent_bridge::bridge::{BridgeResult, MineBlockRequest};
    use serde_json::Value;
    use std::sync::Mutex;

    struct FakeBridge {
        recipes: HashMap<String, Vec<RawRecipe>>,
        crafted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BridgeClient for FakeBridge {
        async fn query_area_blocks(
            &self,
            _start: (i64, i64, i64),
            _end: (i64, i64, i64),
            _use_relative_coords: bool,
            _max_blocks: u32,
        ) -> BridgeResult<Value> {
            Ok(Value::Null)
        }

        async fn mine_block(&self, _request: MineBlockRequest) -> BridgeResult<Value> {
            Ok(Value::Null)
        }

        async fn kill_mob(&self, _mob: &str) -> BridgeResult<Value> {
            Ok(Value::Null)
        }

        async fn chat(&self, _message: &str) -> BridgeResult<()> {
            Ok(())
        }

        async fn query_raw_recipe(&self, item: &str, _use_crafting_table: bool) -> BridgeResult<Vec<RawRecipe>> {
            Ok(self.recipes.get(item).cloned().unwrap_or_default())
        }

        async fn craft_with_recipe(&self, recipe: &RawRecipe, _count: u32, _without_crafting_table: bool) -> BridgeResult<Value> {
            self.crafted.lock().unwrap().push(recipe.result.name.clone());
            Ok(Value::Null)
        }
    }

    fn recipe_item(name: &str, count: u32) -> RecipeItem {
        RecipeItem {
            id: 0,
            name: name.to_string(),
            metadata: 0,
            count,
        }
    }

    #[tokio::test]
    async fn crafts_a_single_step_recipe_when_inventory_is_short() {
        let mut recipes = HashMap::new();
        recipes.insert(
            "wooden_pickaxe".to_string(),
            vec![RawRecipe {
                result: recipe_item("wooden_pickaxe", 1),
                requires_table: true,
                in_shape: None,
                ingredients: Some(vec![recipe_item("oak_planks", 3), recipe_item("stick", 2)]),
            }],
        );
        let bridge = FakeBridge {
            recipes,
            crafted: Mutex::new(Vec::new()),
        };
        let conversions = ConversionTable::with_defaults();
        let planner = CraftingPlanner::new(&bridge, &conversions);

        let mut inventory = Inventory::new();
        inventory.insert("oak_planks".to_string(), 5);
        inventory.insert("stick".to_string(), 4);

        let steps = planner.try_craft("wooden_pickaxe", 1, &inventory, true, 0).await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].item, "wooden_pickaxe");
    }

    #[tokio::test]
    async fn recurses_to_craft_a_missing_ingredient() {
        let mut recipes = HashMap::new();
        recipes.insert(
            "stick".to_string(),
            vec![RawRecipe {
                result: recipe_item("stick", 4),
                requires_table: false,
                in_shape: None,
                ingredients: Some(vec![recipe_item("oak_planks", 2)]),
            }],
        );
        recipes.insert(
            "wooden_pickaxe".to_string(),
            vec![RawRecipe {
                result: recipe_item("wooden_pickaxe", 1),
                requires_table: true,
                in_shape: None,
                ingredients: Some(vec![recipe_item("oak_planks", 3), recipe_item("stick", 2)]),
            }],
        );
        let bridge = FakeBridge {
            recipes,
            crafted: Mutex::new(Vec::new()),
        };
        let conversions = ConversionTable::with_defaults();
        let planner = CraftingPlanner::new(&bridge, &conversions);

        let mut inventory = Inventory::new();
        inventory.insert("oak_planks".to_string(), 10);

        let steps = planner.try_craft("wooden_pickaxe", 1, &inventory, true, 0).await.unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].item, "stick");
        assert_eq!(steps[1].item, "wooden_pickaxe");
    }

    #[tokio::test]
    async fn priority_item_never_recurses_into_its_own_pair() {
        let bridge = FakeBridge {
            recipes: HashMap::new(),
            crafted: Mutex::new(Vec::new()),
        };
        let conversions = ConversionTable::with_defaults();
        let planner = CraftingPlanner::new(&bridge, &conversions);

        let mut inventory = Inventory::new();
        inventory.insert("coal_block".to_string(), 2);

        let steps = planner.try_craft("coal_block", 2, &inventory, false, 0).await.unwrap();
        assert!(steps.is_empty());

        let err = planner.try_craft("coal_block", 3, &inventory, false, 0).await.unwrap_err();
        assert!(matches!(err, PlanFailure::Insufficient { .. }));
    }

    #[tokio::test]
    async fn depth_limit_is_enforced() {
        let bridge = FakeBridge {
            recipes: HashMap::new(),
            crafted: Mutex::new(Vec::new()),
        };
        let conversions = ConversionTable::with_defaults();
        let planner = CraftingPlanner::new(&bridge, &conversions);
        let inventory = Inventory::new();

        let err = planner.try_craft("stick", 1, &inventory, false, 128).await.unwrap_err();
        assert!(matches!(err, PlanFailure::DepthExceeded { .. }));
    }

    #[test]
    fn feasibility_report_aggregates_missing_counts() {
        let recipe = RawRecipe {
            result: recipe_item("wooden_pickaxe", 1),
            requires_table: true,
            in_shape: None,
            ingredients: Some(vec![recipe_item("oak_planks", 3), recipe_item("stick", 2)]),
        };
        let conversions = ConversionTable::with_defaults();
        let inventory = Inventory::new();
        let report = feasibility_report("wooden_pickaxe", 1, &[recipe], &inventory, &conversions);
        assert_eq!(report.recipes.len(), 1);
        assert_eq!(report.aggregate_missing.get("oak_planks"), Some(&3));
        assert_eq!(report.aggregate_missing.get("stick"), Some(&2));
    }
}
