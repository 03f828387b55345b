//! # Enum Factory
//!
//! Builds immutable key↔value maps with introspection metadata.
//!
//! ```text
//! Enum::new([("Cat", 1), ("Dog", 2), ("Fox", 4)])
//! ────────────────────────────────────────────────
//! value("Cat")      → Some(1)
//! value_to_key(2)   → Some("Dog")
//! meta().min / max  → 1 / 4
//! meta().sequential → false (gap at 3)
//! ```

use indexmap::IndexMap;
use std::collections::BTreeMap;

use crate::error::DefinitionError;

/// Keys that would shadow the factory's own members.
const RESERVED_KEYS: &[&str] = &[
    "$",
    "hasKey",
    "hasValue",
    "keyToValue",
    "valueToKey",
    "prototype",
];

/// Largest integer magnitude that is exactly representable in a double.
const MAX_SAFE: i64 = (1 << 53) - 1;

/// Immutable enum built by [`Enum::new`].
#[derive(Debug, Clone)]
pub struct Enum {
    meta: EnumMeta,
}

/// Introspection metadata for an [`Enum`].
#[derive(Debug, Clone)]
pub struct EnumMeta {
    /// Key → value, in insertion order.
    pub key_map: IndexMap<String, i64>,
    /// Keys in insertion order.
    pub key_array: Vec<String>,
    /// Values sorted ascending (duplicates kept).
    pub value_array: Vec<i64>,
    /// Value → first key in insertion order when values collide.
    pub value_map: BTreeMap<i64, String>,
    /// Smallest value.
    pub min: i64,
    /// Largest value.
    pub max: i64,
    /// All magnitudes within the 53-bit safe range.
    pub safe: bool,
    /// No duplicate values.
    pub unique: bool,
    /// Distinct values form a contiguous block starting at `min`.
    pub sequential: bool,
}

impl Enum {
    /// Builds an enum from `(key, value)` pairs in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError`] if a key shadows a factory member, if a
    /// value is not a finite integer, or if no pairs are given.
    pub fn new<K, I>(pairs: I) -> Result<Self, DefinitionError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, f64)>,
    {
        let mut key_map: IndexMap<String, i64> = IndexMap::new();
        for (key, raw) in pairs {
            let key = key.into();
            if RESERVED_KEYS.contains(&key.as_str()) {
                return Err(DefinitionError::ReservedEnumKey(key));
            }
            if !raw.is_finite() {
                return Err(DefinitionError::InvalidEnumValue {
                    key,
                    reason: "value is not finite".into(),
                });
            }
            if raw.fract() != 0.0 {
                return Err(DefinitionError::InvalidEnumValue {
                    key,
                    reason: "value is not an integer".into(),
                });
            }
            key_map.insert(key, raw as i64);
        }
        if key_map.is_empty() {
            return Err(DefinitionError::InvalidDescriptor(
                "enum requires at least one key".into(),
            ));
        }

        let key_array: Vec<String> = key_map.keys().cloned().collect();
        let mut value_array: Vec<i64> = key_map.values().copied().collect();
        value_array.sort_unstable();

        let mut value_map: BTreeMap<i64, String> = BTreeMap::new();
        for (key, value) in &key_map {
            value_map.entry(*value).or_insert_with(|| key.clone());
        }

        let min = value_array[0];
        let max = value_array[value_array.len() - 1];
        let safe = value_array.iter().all(|v| v.abs() <= MAX_SAFE);
        let unique = value_map.len() == value_array.len();
        let distinct = value_map.len() as i128;
        let sequential = i128::from(max) - i128::from(min) + 1 == distinct;

        Ok(Self {
            meta: EnumMeta {
                key_map,
                key_array,
                value_array,
                value_map,
                min,
                max,
                safe,
                unique,
                sequential,
            },
        })
    }

    /// Direct value access, the `Enum.Cat` form.
    pub fn value(&self, key: &str) -> Option<i64> {
        self.meta.key_map.get(key).copied()
    }

    /// Returns true if `key` is defined.
    pub fn has_key(&self, key: &str) -> bool {
        self.meta.key_map.contains_key(key)
    }

    /// Returns true if any key maps to `value`.
    pub fn has_value(&self, value: i64) -> bool {
        self.meta.value_map.contains_key(&value)
    }

    /// Key → value lookup.
    pub fn key_to_value(&self, key: &str) -> Option<i64> {
        self.value(key)
    }

    /// Value → key lookup; on colliding values, the first key in
    /// insertion order wins.
    pub fn value_to_key(&self, value: i64) -> Option<&str> {
        self.meta.value_map.get(&value).map(String::as_str)
    }

    /// The introspection metadata (the `$` member).
    pub fn meta(&self) -> &EnumMeta {
        &self.meta
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn animals() -> Enum {
        Enum::new([("Cat", 1.0), ("Dog", 2.0), ("Fox", 3.0)]).unwrap()
    }

    #[test]
    fn test_direct_access() {
        let e = animals();
        assert_eq!(e.value("Cat"), Some(1));
        assert_eq!(e.value("Fox"), Some(3));
        assert_eq!(e.value("Wolf"), None);
    }

    #[test]
    fn test_lookups() {
        let e = animals();
        assert!(e.has_key("Dog"));
        assert!(!e.has_key("hasKey"));
        assert!(e.has_value(2));
        assert!(!e.has_value(9));
        assert_eq!(e.key_to_value("Dog"), Some(2));
        assert_eq!(e.value_to_key(2), Some("Dog"));
    }

    #[test]
    fn test_roundtrip_when_unique() {
        let e = animals();
        for key in &e.meta().key_array {
            let value = e.key_to_value(key).unwrap();
            assert_eq!(e.value_to_key(value), Some(key.as_str()));
        }
    }

    #[test]
    fn test_metadata() {
        let e = animals();
        let meta = e.meta();
        assert_eq!(meta.key_array, vec!["Cat", "Dog", "Fox"]);
        assert_eq!(meta.value_array, vec![1, 2, 3]);
        assert_eq!(meta.min, 1);
        assert_eq!(meta.max, 3);
        assert!(meta.safe);
        assert!(meta.unique);
        assert!(meta.sequential);
    }

    #[test]
    fn test_non_sequential() {
        let e = Enum::new([("A", 1.0), ("B", 4.0)]).unwrap();
        assert!(!e.meta().sequential);
        assert!(e.meta().unique);
    }

    #[test]
    fn test_duplicate_values_keep_first_key() {
        let e = Enum::new([("First", 1.0), ("Alias", 1.0), ("B", 2.0)]).unwrap();
        let meta = e.meta();
        assert!(!meta.unique);
        assert_eq!(e.value_to_key(1), Some("First"));
        assert_eq!(meta.value_array, vec![1, 1, 2]);
        // Distinct values 1..=2 are contiguous.
        assert!(meta.sequential);
    }

    #[test]
    fn test_unsafe_range() {
        let big = (1i64 << 54) as f64;
        let e = Enum::new([("Big", big)]).unwrap();
        assert!(!e.meta().safe);
    }

    #[test]
    fn test_reserved_keys_rejected() {
        for key in ["$", "hasKey", "hasValue", "keyToValue", "valueToKey", "prototype"] {
            let result = Enum::new([(key, 1.0)]);
            assert!(
                matches!(result, Err(DefinitionError::ReservedEnumKey(_))),
                "{key}"
            );
        }
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(Enum::new([("A", f64::NAN)]).is_err());
        assert!(Enum::new([("A", f64::INFINITY)]).is_err());
        assert!(Enum::new([("A", 1.5)]).is_err());
    }

    #[test]
    fn test_empty_rejected() {
        let pairs: Vec<(&str, f64)> = vec![];
        assert!(Enum::new(pairs).is_err());
    }
}
