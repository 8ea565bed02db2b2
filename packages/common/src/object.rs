//! Object utilities for nested JSON props
//!
//! - [`flatten`] turns a nested object into a one-level map keyed by dotted
//!   paths (`potato.title`). Arrays are kept whole.
//! - [`transform_leaves`] / [`map_leaves`] rebuild a value with the same shape,
//!   letting a callback replace (or remove) each scalar leaf. Arrays are
//!   descended into.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One-level view of a nested object, keyed by dotted path
pub type FlatProps = BTreeMap<String, Value>;

/// Flatten a nested object into dotted-path keys
///
/// Only objects are descended into. Arrays and scalars are emitted under the
/// path that reached them, and empty objects contribute nothing. A value that
/// is not an object flattens to an empty map.
///
/// ```
/// use serde_json::json;
/// use vtree_common::flatten;
///
/// let flat = flatten(&json!({ "a": { "b": 1 }, "c": [1, 2] }));
/// assert_eq!(flat["a.b"], json!(1));
/// assert_eq!(flat["c"], json!([1, 2]));
/// ```
pub fn flatten(value: &Value) -> FlatProps {
    let mut flat = FlatProps::new();
    if let Value::Object(map) = value {
        flatten_into(&mut flat, None, map);
    }
    flat
}

fn flatten_into(flat: &mut FlatProps, prefix: Option<&str>, map: &Map<String, Value>) {
    for (key, value) in map {
        let path = match prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key.clone(),
        };

        match value {
            Value::Object(nested) => flatten_into(flat, Some(&path), nested),
            leaf => {
                flat.insert(path, leaf.clone());
            }
        }
    }
}

/// Re-nest dotted keys produced by [`flatten`] into an object
///
/// If two keys disagree about whether a segment is a leaf or an object
/// (`a` and `a.b`), the later key in iteration order wins.
pub fn unflatten(flat: &FlatProps) -> Value {
    let mut root = Map::new();

    for (path, value) in flat {
        let mut segments: Vec<&str> = path.split('.').collect();
        let Some(last) = segments.pop() else {
            continue;
        };

        let mut cursor = &mut root;
        for segment in segments {
            let entry = cursor
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            cursor = match entry {
                Value::Object(map) => map,
                _ => unreachable!("entry was just replaced with an object"),
            };
        }

        cursor.insert(last.to_string(), value.clone());
    }

    Value::Object(root)
}

/// A scalar leaf being visited by [`transform_leaves`] or [`map_leaves`]
#[derive(Debug, Clone, Copy)]
pub struct LeafContext<'a> {
    /// Current leaf value
    pub value: &'a Value,
    /// Keys from the root to this leaf (array positions as decimal indices)
    pub path: &'a [String],
}

/// What [`map_leaves`] should do with a leaf
#[derive(Debug, Clone, PartialEq)]
pub enum LeafAction {
    Keep,
    Replace(Value),
    /// Drop the entry from its object. Inside arrays (and at the root) the
    /// leaf becomes `null` so lengths are preserved.
    Remove,
}

/// Rebuild `value` with each scalar leaf optionally replaced
///
/// `transform` returns `Some(replacement)` to swap a leaf, or `None` to keep
/// it. Objects and arrays keep their keys, key order and lengths.
pub fn transform_leaves<F>(value: &Value, mut transform: F) -> Value
where
    F: FnMut(LeafContext<'_>) -> Option<Value>,
{
    map_leaves(value, |ctx| match transform(ctx) {
        Some(replacement) => LeafAction::Replace(replacement),
        None => LeafAction::Keep,
    })
}

/// Rebuild `value`, deciding per scalar leaf whether to keep, replace or remove it
pub fn map_leaves<F>(value: &Value, mut action: F) -> Value
where
    F: FnMut(LeafContext<'_>) -> LeafAction,
{
    let mut path = Vec::new();
    walk_value(value, &mut path, &mut action).unwrap_or(Value::Null)
}

/// Returns `None` when the leaf was removed
fn walk_value<F>(value: &Value, path: &mut Vec<String>, action: &mut F) -> Option<Value>
where
    F: FnMut(LeafContext<'_>) -> LeafAction,
{
    match value {
        Value::Object(map) => {
            let mut rebuilt = Map::new();
            for (key, child) in map {
                path.push(key.clone());
                if let Some(child) = walk_value(child, path, action) {
                    rebuilt.insert(key.clone(), child);
                }
                path.pop();
            }
            Some(Value::Object(rebuilt))
        }
        Value::Array(items) => {
            let mut rebuilt = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                path.push(index.to_string());
                rebuilt.push(walk_value(item, path, action).unwrap_or(Value::Null));
                path.pop();
            }
            Some(Value::Array(rebuilt))
        }
        leaf => match action(LeafContext { value: leaf, path }) {
            LeafAction::Keep => Some(leaf.clone()),
            LeafAction::Replace(replacement) => Some(replacement),
            LeafAction::Remove => None,
        },
    }
}
