//! Path addressing over a JSON tree, following realtime-database semantics:
//! `null` means absent, writing `null` deletes, and emptied parents disappear.

use serde_json::{Map, Value};

pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

pub fn get_at<'a>(root: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    let mut node = root;
    for segment in segments {
        node = node.as_object()?.get(*segment)?;
    }
    if node.is_null() {
        None
    } else {
        Some(node)
    }
}

pub fn set_at(node: &mut Value, segments: &[&str], value: Value) {
    let value = normalize(value);
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    if value.is_null() {
        let now_empty = match node {
            Value::Object(map) => {
                if let Some(child) = map.get_mut(*head) {
                    set_at(child, rest, Value::Null);
                    if child.is_null() {
                        map.remove(*head);
                    }
                }
                map.is_empty()
            }
            _ => false,
        };
        if now_empty {
            *node = Value::Null;
        }
        return;
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(head.to_string()).or_insert(Value::Null);
        set_at(child, rest, value);
    }
}

/// Applies every key of `patch` below `segments`. Keys may themselves contain
/// `/` to address deeper children.
pub fn merge_at(root: &mut Value, segments: &[&str], patch: Map<String, Value>) {
    for (key, value) in patch {
        let mut full: Vec<&str> = segments.to_vec();
        full.extend(split_path(&key));
        set_at(root, &full, value);
    }
}

fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn set_creates_intermediate_objects() {
        let mut root = Value::Null;
        set_at(&mut root, &["requests", "r1", "status"], json!("pending"));
        assert_eq!(root, json!({ "requests": { "r1": { "status": "pending" } } }));
        assert_eq!(
            get_at(&root, &split_path("/requests/r1/status")),
            Some(&json!("pending"))
        );
    }

    #[test]
    fn deleting_last_child_prunes_parents() {
        let mut root = json!({ "requests": { "r1": { "status": "pending" } }, "other": 1 });
        set_at(&mut root, &["requests", "r1", "status"], Value::Null);
        assert_eq!(root, json!({ "other": 1 }));
        assert_eq!(get_at(&root, &["requests", "r1"]), None);
    }

    #[test]
    fn merge_touches_only_named_children() {
        let mut root = json!({ "r1": { "status": "pending", "offers": { "d1": { "price": 5 } } } });
        let patch = json!({ "status": "confirmed", "driverName": "A", "offers/d2/price": 7 });
        let Value::Object(patch) = patch else {
            unreachable!()
        };
        merge_at(&mut root, &["r1"], patch);
        assert_eq!(
            root,
            json!({ "r1": {
                "status": "confirmed",
                "driverName": "A",
                "offers": { "d1": { "price": 5 }, "d2": { "price": 7 } }
            } })
        );
    }

    #[test]
    fn writing_empty_object_is_a_delete() {
        let mut root = json!({ "r1": { "status": "pending" } });
        set_at(&mut root, &["r1"], json!({}));
        assert_eq!(root, Value::Null);
    }
}
