//! Recursive crafting planner and feasibility reporting (C16).

pub mod planner;

pub use planner::{
    effective_ingredients, execute_plan, feasibility_report, is_valid_recipe, CraftStep,
    CraftingPlanner, FeasibilityReport, Inventory, PlanFailure,
};
