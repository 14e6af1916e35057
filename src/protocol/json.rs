//! Path helpers over the codec's JSON shape.
//!
//! Room-OS wraps every leaf as `{"Value": "..."}`, gives list items an `"id"`,
//! marks removed list items with `"ghost": "True"`, and sends a single object where
//! a list holds only one item. These helpers hide all of that; a missing path is
//! simply `None`.

use serde_json::Value;

/// Walk `path` from `root`. Numeric segments index arrays; a non-numeric segment
/// applied to an array descends into its first element.
pub fn at<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cur = root;
    for seg in path {
        cur = match cur {
            Value::Object(map) => map.get(*seg)?,
            Value::Array(items) => match seg.parse::<usize>() {
                Ok(idx) => items.get(idx)?,
                Err(_) => items.first()?.get(*seg)?,
            },
            _ => return None,
        };
    }
    Some(cur)
}

/// Leaf text at `path`: the `Value` member if present, else the node itself when
/// it is a string or number.
pub fn text<'a>(root: &'a Value, path: &[&str]) -> Option<String> {
    let node = at(root, path)?;
    leaf_text(node)
}

pub fn leaf_text(node: &Value) -> Option<String> {
    let node = node.get("Value").unwrap_or(node);
    match node {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "True" } else { "False" }.to_string()),
        _ => None,
    }
}

/// Leaf at `path` parsed as an integer.
pub fn int(root: &Value, path: &[&str]) -> Option<i64> {
    text(root, path)?.trim().parse().ok()
}

/// Leaf at `path` compared case-insensitively against `True`/`On`/`Active`.
pub fn flag(root: &Value, path: &[&str]) -> Option<bool> {
    let t = text(root, path)?.to_lowercase();
    Some(matches!(t.as_str(), "true" | "on" | "active" | "1"))
}

/// The item list at `path`, accepting a single object as a one-item list.
pub fn items<'a>(root: &'a Value, path: &[&str]) -> Vec<&'a Value> {
    match at(root, path) {
        Some(Value::Array(v)) => v.iter().collect(),
        Some(obj @ Value::Object(_)) => vec![obj],
        _ => Vec::new(),
    }
}

/// The `"id"` of a list item, as text.
pub fn id_of(item: &Value) -> Option<String> {
    match item.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// True when the item carries the ghost marker.
pub fn is_ghost(item: &Value) -> bool {
    match item.get("ghost") {
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(Value::Bool(b)) => *b,
        _ => false,
    }
}

/// First `Reason` found anywhere under `node` (depth-first), as text.
pub fn find_reason(node: &Value) -> Option<String> {
    match node {
        Value::Object(map) => {
            if let Some(reason) = map.get("Reason") {
                return Some(leaf_text(reason).unwrap_or_else(|| reason.to_string()));
            }
            map.values().find_map(find_reason)
        }
        Value::Array(items) => items.iter().find_map(find_reason),
        _ => None,
    }
}

/// True for `null`, `{}` and `[]`.
pub fn is_empty(node: &Value) -> bool {
    match node {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn walks_value_wrapped_leaves() {
        let v = json!({"SystemUnit": {"Software": {"Version": {"Value": "ce9.15.3.17"}}}});
        assert_eq!(
            text(&v, &["SystemUnit", "Software", "Version"]).as_deref(),
            Some("ce9.15.3.17")
        );
        assert_eq!(text(&v, &["SystemUnit", "Hardware"]), None);
    }

    #[test]
    fn arrays_index_numerically_or_default_to_first() {
        let v = json!({"Network": [{"id": "1", "IPv4": {"Address": {"Value": "10.0.0.5"}}}]});
        assert_eq!(text(&v, &["Network", "0", "IPv4", "Address"]).as_deref(), Some("10.0.0.5"));
        assert_eq!(text(&v, &["Network", "IPv4", "Address"]).as_deref(), Some("10.0.0.5"));
        assert_eq!(text(&v, &["Network", "3", "IPv4"]), None);
    }

    #[test]
    fn single_object_is_a_one_item_list() {
        let v = json!({"Call": {"id": "3", "ghost": "True"}});
        let calls = items(&v, &["Call"]);
        assert_eq!(calls.len(), 1);
        assert_eq!(id_of(calls[0]).as_deref(), Some("3"));
        assert!(is_ghost(calls[0]));
    }

    #[test]
    fn numeric_ids_and_flags() {
        let v = json!({"id": 7, "Mute": {"Value": "On"}, "Rows": {"Value": "12"}});
        assert_eq!(id_of(&v).as_deref(), Some("7"));
        assert_eq!(flag(&v, &["Mute"]), Some(true));
        assert_eq!(int(&v, &["Rows"]), Some(12));
        assert!(!is_ghost(&v));
    }

    #[test]
    fn reason_is_found_at_any_depth() {
        let v = json!({"PhonebookSearchResult": {"status": "Error", "Reason": {"Value": "No match"}}});
        assert_eq!(find_reason(&v).as_deref(), Some("No match"));
        assert_eq!(find_reason(&json!({"Call": [{"id": "1"}]})), None);
    }
}
