//! Entity identifiers and link keys.
//!
//! Vertices, vertex sets and edges are identified by caller-supplied ids
//! (numbers or strings) or, when no identity key is configured, by their
//! positional index. Edge sets and edge-set collections are keyed by the
//! canonical `"low_high"` link key of their endpoint pair.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a vertex, vertex set or edge.
///
/// Numeric ids order before string ids; the ordering only matters for link
/// key canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Numeric id (also used for positional indices).
    Index(u64),
    /// String id.
    Name(String),
}

impl EntityId {
    /// Read an id from a JSON value.
    ///
    /// Non-negative integral numbers become [`EntityId::Index`], other numbers
    /// and strings become [`EntityId::Name`]. Anything else is not an id.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_u64() {
                    Some(EntityId::Index(i))
                } else if let Some(f) = n.as_f64() {
                    Some(Self::from_f64(f))
                } else {
                    Some(EntityId::Name(n.to_string()))
                }
            }
            Value::String(s) => Some(EntityId::Name(s.clone())),
            _ => None,
        }
    }

    /// Id from a float, as produced by JavaScript numbers.
    pub fn from_f64(f: f64) -> Self {
        if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
            EntityId::Index(f as u64)
        } else {
            EntityId::Name(f.to_string())
        }
    }

    /// JSON representation of the id.
    pub fn to_value(&self) -> Value {
        match self {
            EntityId::Index(i) => Value::from(*i),
            EntityId::Name(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Index(i) => write!(f, "{i}"),
            EntityId::Name(s) => f.write_str(s),
        }
    }
}

impl From<u64> for EntityId {
    fn from(i: u64) -> Self {
        EntityId::Index(i)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId::Name(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        EntityId::Name(s)
    }
}

/// Order an endpoint pair canonically (low id first).
pub fn canonical_pair<'a>(a: &'a EntityId, b: &'a EntityId) -> (&'a EntityId, &'a EntityId) {
    if b < a { (b, a) } else { (a, b) }
}

/// Canonical link key of an unordered endpoint pair.
pub fn link_key(a: &EntityId, b: &EntityId) -> String {
    let (low, high) = canonical_pair(a, b);
    format!("{low}_{high}")
}

/// Canonical endpoint pair, the identity of edge sets and collections.
///
/// Link keys are for display and lookup only: distinct pairs such as
/// `("a_b", "c")` and `("a", "b_c")` share the key `"a_b_c"`.
pub type PairKey = (EntityId, EntityId);

/// Canonical pair of an unordered endpoint pair.
pub fn pair_key(a: &EntityId, b: &EntityId) -> PairKey {
    let (low, high) = canonical_pair(a, b);
    (low.clone(), high.clone())
}

/// Directed `"source_target"` key of a pair, without canonicalization.
pub fn directed_key(source: &EntityId, target: &EntityId) -> String {
    format!("{source}_{target}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value() {
        assert_eq!(EntityId::from_value(&json!(3)), Some(EntityId::Index(3)));
        assert_eq!(EntityId::from_value(&json!(3.0)), Some(EntityId::Index(3)));
        assert_eq!(EntityId::from_value(&json!("a")), Some(EntityId::from("a")));
        assert_eq!(EntityId::from_value(&json!(-2)), Some(EntityId::from("-2")));
        assert_eq!(EntityId::from_value(&json!(null)), None);
        assert_eq!(EntityId::from_value(&json!({"x": 1})), None);
    }

    #[test]
    fn test_link_key_is_canonical() {
        let a = EntityId::from(7);
        let b = EntityId::from(2);
        assert_eq!(link_key(&a, &b), "2_7");
        assert_eq!(link_key(&b, &a), "2_7");
        assert_eq!(directed_key(&a, &b), "7_2");
    }

    #[test]
    fn test_pair_key_tells_apart_colliding_link_keys() {
        let (a_b, c) = (EntityId::from("a_b"), EntityId::from("c"));
        let (a, b_c) = (EntityId::from("a"), EntityId::from("b_c"));
        assert_eq!(link_key(&a_b, &c), link_key(&a, &b_c));
        assert_ne!(pair_key(&a_b, &c), pair_key(&a, &b_c));

        let (three, name_three) = (EntityId::from(3), EntityId::from("3"));
        let one = EntityId::from(1);
        assert_eq!(link_key(&one, &three), link_key(&one, &name_three));
        assert_ne!(pair_key(&one, &three), pair_key(&one, &name_three));
        assert_eq!(pair_key(&c, &a_b), (a_b.clone(), c.clone()));
    }

    #[test]
    fn test_numeric_ids_order_numerically() {
        assert_eq!(link_key(&EntityId::from(10), &EntityId::from(9)), "9_10");
        assert_eq!(link_key(&EntityId::from("b"), &EntityId::from(1)), "1_b");
    }

    #[test]
    fn test_round_trip_value() {
        for id in [EntityId::from(4), EntityId::from("node-4")] {
            assert_eq!(EntityId::from_value(&id.to_value()), Some(id));
        }
    }
}
