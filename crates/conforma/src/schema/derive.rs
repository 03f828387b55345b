//! # Derived Object Metadata
//!
//! Computes the per-object maps surfaced for external consumers: field
//! groups, primary/foreign keys and uniqueness groups.
//!
//! ## Unique-group expansion
//!
//! ```text
//! a: $unique "ac|ad"      named groups  ac = {a,c}, ad = {a,d}
//! b: $unique true         singleton     (b)
//! c: $unique "ac"
//! d: $unique "ad"
//!               ──►  $uniqueArray = {(a,c), (a,d), (b)}
//!
//! PK fields add: one tuple of all PK fields together, plus (pk, f)
//! pairs for every other member f of each named group the PK field
//! participates in. Tuples are sorted, the set is deduplicated.
//! ```

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::schema::{ForeignKey, Node, ObjectSpec, UniqueDirective};

/// Builds an [`ObjectSpec`] from normalized fields.
pub(crate) fn object_spec(fields: IndexMap<String, Node>) -> ObjectSpec {
    let mut group_map: IndexMap<String, Vec<String>> = IndexMap::new();
    let mut pk_array: Vec<String> = Vec::new();
    let mut fk_map: IndexMap<String, ForeignKey> = IndexMap::new();

    for (name, node) in &fields {
        if let Some(group) = node.group.name() {
            group_map
                .entry(group.to_string())
                .or_default()
                .push(name.clone());
        }
        if node.pk {
            pk_array.push(name.clone());
        }
        if let Some(fk) = &node.fk {
            fk_map.insert(name.clone(), fk.clone());
        }
    }

    let mut id_array = pk_array.clone();
    for name in fk_map.keys() {
        if !id_array.contains(name) {
            id_array.push(name.clone());
        }
    }

    let unique_array = unique_array(&fields, &pk_array);

    ObjectSpec {
        fields,
        group_map,
        pk_array,
        fk_map,
        id_array,
        unique_array,
    }
}

/// Derives `$uniqueArray` per the expansion rules above.
fn unique_array(fields: &IndexMap<String, Node>, pk_array: &[String]) -> Vec<Vec<String>> {
    let mut named: IndexMap<&str, Vec<String>> = IndexMap::new();
    let mut tuples: BTreeSet<Vec<String>> = BTreeSet::new();

    for (name, node) in fields {
        match &node.unique {
            None => {}
            Some(UniqueDirective::Singleton) => {
                tuples.insert(vec![name.clone()]);
            }
            Some(UniqueDirective::Groups(groups)) => {
                for group in groups {
                    named.entry(group.as_str()).or_default().push(name.clone());
                }
            }
        }
    }

    for members in named.values() {
        let mut tuple = members.clone();
        tuple.sort();
        tuples.insert(tuple);
    }

    if !pk_array.is_empty() {
        let mut pk_tuple = pk_array.to_vec();
        pk_tuple.sort();
        tuples.insert(pk_tuple);

        // Each PK field pairs with every other member of any named group
        // it participates in.
        for members in named.values() {
            for pk in pk_array {
                if !members.contains(pk) {
                    continue;
                }
                for member in members {
                    if member != pk {
                        let mut pair = vec![pk.clone(), member.clone()];
                        pair.sort();
                        tuples.insert(pair);
                    }
                }
            }
        }
    }

    tuples.into_iter().collect()
}

// ============================================================================
// TESTS
// ============================================================================
