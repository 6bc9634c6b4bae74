//! Conversion pairs and canonical name normalization (§3, §4.16).

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ConversionPair {
    pub items: Vec<String>,
    pub priority: String,
    pub ratio: HashMap<String, f64>,
}

impl ConversionPair {
    /// True iff `item` is this pair's designated terminal/priority item.
    pub fn is_priority(&self, item: &str) -> bool {
        self.priority == item
    }

    pub fn contains(&self, item: &str) -> bool {
        self.items.iter().any(|i| i == item)
    }
}

/// Looks up, by item name, the conversion pair it belongs to (if any), and
/// provides the name alias table the planner normalizes every comparison
/// through.
#[derive(Debug, Clone, Default)]
pub struct ConversionTable {
    pairs: Vec<ConversionPair>,
    aliases: HashMap<String, String>,
}

impl ConversionTable {
    pub fn with_defaults() -> Self {
        let mut table = Self::default();

        let mut coal_ratio = HashMap::new();
        coal_ratio.insert("coal".to_string(), 9.0);
        coal_ratio.insert("coal_block".to_string(), 1.0);
        table.pairs.push(ConversionPair {
            items: vec!["coal".to_string(), "coal_block".to_string()],
            priority: "coal_block".to_string(),
            ratio: coal_ratio,
        });

        let mut iron_ratio = HashMap::new();
        iron_ratio.insert("iron_ingot".to_string(), 9.0);
        iron_ratio.insert("iron_block".to_string(), 1.0);
        table.pairs.push(ConversionPair {
            items: vec!["iron_ingot".to_string(), "iron_block".to_string()],
            priority: "iron_block".to_string(),
            ratio: iron_ratio,
        });

        table.aliases.insert("stick".to_string(), "stick".to_string());
        table.aliases.insert("planks".to_string(), "oak_planks".to_string());
        table
    }

    pub fn normalize<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(|s| s.as_str()).unwrap_or(name)
    }

    pub fn pair_for(&self, item: &str) -> Option<&ConversionPair> {
        self.pairs.iter().find(|p| p.contains(item))
    }

    pub fn is_priority_item(&self, item: &str) -> bool {
        self.pair_for(item)
            .map(|p| p.is_priority(item))
            .unwrap_or(false)
    }

    /// True iff `item` is blocked from recursing into `ingredient` because
    /// `item` is the priority member of a pair that `ingredient` also
    /// belongs to (§4.16's cycle-prevention rule).
    pub fn blocks_recursion(&self, item: &str, ingredient: &str) -> bool {
        if !self.is_priority_item(item) {
            return false;
        }
        match self.pair_for(item) {
            Some(pair) => pair.contains(ingredient),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_item_blocks_recursion_into_its_own_pair() {
        let table = ConversionTable::with_defaults();
        assert!(table.blocks_recursion("coal_block", "coal"));
        assert!(!table.blocks_recursion("coal", "coal_block"));
    }

    #[test]
    fn normalize_applies_alias_table() {
        let table = ConversionTable::with_defaults();
        assert_eq!(table.normalize("planks"), "oak_planks");
        assert_eq!(table.normalize("diamond"), "diamond");
    }
}
