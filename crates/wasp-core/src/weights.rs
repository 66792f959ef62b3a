//! Named selection weights with configurable overrides.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Built-in default weights for one kind of component (generators, templates, mutators)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightTable {
    kind: String,
    entries: Vec<(String, u32)>,
}

impl WeightTable {
    pub fn new(kind: &str, defaults: &[(&str, u32)]) -> Self {
        Self {
            kind: kind.to_string(),
            entries: defaults
                .iter()
                .map(|(name, weight)| (name.to_string(), *weight))
                .collect(),
        }
    }

    /// Replace default weights. Names that are not in the table are a configuration error.
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, u32>) -> Result<()> {
        for (name, weight) in overrides {
            let entry = self
                .entries
                .iter_mut()
                .find(|(known, _)| known == name)
                .ok_or_else(|| Error::Config(format!("unknown {} name '{}'", self.kind, name)))?;
            entry.1 = *weight;
        }
        Ok(())
    }

    pub fn weight(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(known, _)| known == name)
            .map(|(_, weight)| *weight)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(name, weight)| (name.as_str(), *weight))
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, weight)| *weight as u64).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_known_name() {
        let mut table = WeightTable::new("generator", &[("A", 1), ("B", 5)]);
        let mut overrides = BTreeMap::new();
        overrides.insert("B".to_string(), 0);
        table.apply_overrides(&overrides).unwrap();
        assert_eq!(table.weight("A"), Some(1));
        assert_eq!(table.weight("B"), Some(0));
        assert_eq!(table.total(), 1);
    }

    #[test]
    fn test_unknown_name_is_config_error() {
        let mut table = WeightTable::new("template", &[("A", 1)]);
        let mut overrides = BTreeMap::new();
        overrides.insert("Nope".to_string(), 3);
        let err = table.apply_overrides(&overrides).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("Nope")));
    }
}
