//! Property set files.
//!
//! A property set file is a list of named categories, each holding typed
//! `name=type|value` entries:
//!
//! ```text
//! [SYCL/specialization constants]
//! SC0=1|0
//! SC1=1|1
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

use crate::spec_const::SpecIdMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyValue {
    Uint32(u32),
}

impl PropertyValue {
    /// Type tag written before the value.
    pub const fn type_tag(&self) -> u32 {
        match self {
            PropertyValue::Uint32(_) => 1,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Uint32(v) => write!(f, "{}|{}", self.type_tag(), v),
        }
    }
}

pub type PropertySet = BTreeMap<String, PropertyValue>;

/// Property sets grouped by category name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySetRegistry {
    sets: BTreeMap<String, PropertySet>,
}

impl PropertySetRegistry {
    pub const SYCL_SPECIALIZATION_CONSTANTS: &'static str = "SYCL/specialization constants";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, category: &str, name: impl Into<String>, value: PropertyValue) {
        self.sets
            .entry(category.to_string())
            .or_default()
            .insert(name.into(), value);
    }

    /// Add every entry of a specialization constant ID map.
    ///
    /// The category is created even for an empty map.
    pub fn add_spec_constants(&mut self, ids: &SpecIdMap) {
        let set = self
            .sets
            .entry(Self::SYCL_SPECIALIZATION_CONSTANTS.to_string())
            .or_default();
        for (name, &id) in ids {
            set.insert(name.clone(), PropertyValue::Uint32(id));
        }
    }

    pub fn get(&self, category: &str) -> Option<&PropertySet> {
        self.sets.get(category)
    }

    pub fn write(&self, out: &mut impl Write) -> io::Result<()> {
        write!(out, "{self}")
    }
}

impl fmt::Display for PropertySetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (category, set) in &self.sets {
            writeln!(f, "[{category}]")?;
            for (name, value) in set {
                writeln!(f, "{name}={value}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_constant_set() {
        let ids: SpecIdMap = [("SC1".to_string(), 1), ("SC0".to_string(), 0)]
            .into_iter()
            .collect();
        let mut registry = PropertySetRegistry::new();
        registry.add_spec_constants(&ids);
        assert_eq!(
            registry.to_string(),
            "[SYCL/specialization constants]\nSC0=1|0\nSC1=1|1\n"
        );
    }

    #[test]
    fn test_empty_map_still_writes_category() {
        let mut registry = PropertySetRegistry::new();
        registry.add_spec_constants(&SpecIdMap::new());
        let mut out = Vec::new();
        registry.write(&mut out).unwrap();
        assert_eq!(out, b"[SYCL/specialization constants]\n");
    }

    #[test]
    fn test_categories_are_sorted() {
        let mut registry = PropertySetRegistry::new();
        registry.add("b", "x", PropertyValue::Uint32(7));
        registry.add("a", "y", PropertyValue::Uint32(8));
        assert_eq!(registry.to_string(), "[a]\ny=1|8\n[b]\nx=1|7\n");
        assert_eq!(registry.get("b").unwrap()["x"], PropertyValue::Uint32(7));
    }
}
