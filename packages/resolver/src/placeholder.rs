//! Placeholder substitution (`"$title"`, `"$potato.title"`)
//!
//! A prop leaf that is exactly `$` followed by a dotted path is replaced
//! wholesale by the value at that path in the flattened ambient props, keeping
//! the value's own type. Placeholders embedded in longer strings are left alone.

use crate::node::Props;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use vtree_common::{map_leaves, FlatProps, LeafAction};

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\$[A-Za-z0-9_.]+$").expect("placeholder pattern is valid")
    })
}

/// Path referenced by a placeholder string, without the leading `$`
pub fn placeholder_path(value: &str) -> Option<&str> {
    if placeholder_pattern().is_match(value) {
        Some(&value[1..])
    } else {
        None
    }
}

/// Look up the value a placeholder leaf stands for
///
/// Returns `None` when the leaf is not a placeholder or names a missing path.
pub fn resolve_placeholder<'a>(value: &Value, flat: &'a FlatProps) -> Option<&'a Value> {
    value
        .as_str()
        .and_then(placeholder_path)
        .and_then(|path| flat.get(path))
}

/// Substitute every placeholder leaf in `props`
///
/// Placeholders naming a missing path are dropped from the props (or become
/// `null` inside arrays).
pub fn substitute_props(props: &Props, flat: &FlatProps) -> Props {
    let substituted = map_leaves(&Value::Object(props.clone()), |ctx| {
        let Some(path) = ctx.value.as_str().and_then(placeholder_path) else {
            return LeafAction::Keep;
        };

        match flat.get(path) {
            Some(value) => LeafAction::Replace(value.clone()),
            None => LeafAction::Remove,
        }
    });

    match substituted {
        Value::Object(map) => map,
        _ => Props::new(),
    }
}
