// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Read-only helpers over message bodies.

use serde_json::Value;

/// Descend `data` along a dot-separated `path`.
///
/// Object segments are looked up by key; array segments must parse as an
/// index. Returns `None` as soon as a segment does not resolve. A JSON `null`
/// that is present counts as defined.
pub fn lookup_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    path.split('.').try_fold(data, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Visit every leaf of `data` with its dotted path and final key.
///
/// Objects are descended. Arrays (including `[hex, length]` bit-string tuples)
/// and primitives are leaves. Empty objects have no leaves. A non-object root
/// is not visited.
pub fn for_each_leaf<'a, F>(data: &'a Value, mut visit: F)
where
    F: FnMut(&str, &'a str, &'a Value),
{
    if let Value::Object(map) = data {
        let mut path = String::new();
        for (key, value) in map {
            walk(key, value, &mut path, &mut visit);
        }
    }
}

fn walk<'a, F>(key: &'a str, value: &'a Value, path: &mut String, visit: &mut F)
where
    F: FnMut(&str, &'a str, &'a Value),
{
    let mark = path.len();
    if !path.is_empty() {
        path.push('.');
    }
    path.push_str(key);
    match value {
        Value::Object(map) => {
            for (child_key, child) in map {
                walk(child_key, child, path, visit);
            }
        }
        _ => visit(path, key, value),
    }
    path.truncate(mark);
}

/// String form of a leaf: strings verbatim, everything else as compact JSON.
pub fn leaf_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_descends_objects_and_arrays() {
        let data = json!({"a": {"b": [{"c": 7}]}, "n": null});
        assert_eq!(lookup_path(&data, "a.b.0.c"), Some(&json!(7)));
        assert_eq!(lookup_path(&data, "n"), Some(&Value::Null));
        assert!(lookup_path(&data, "a.b.x").is_none());
        assert!(lookup_path(&data, "a.b.3").is_none());
        assert!(lookup_path(&data, "a.b.0.c.d").is_none());
        assert!(lookup_path(&data, "").is_none());
    }

    #[test]
    fn leaves_keep_arrays_opaque_and_skip_empty_objects() {
        let data = json!({
            "outer": {"ue-Identity": ["0xAB", 40], "inner": {"rrcState": "CONNECTED"}},
            "empty": {},
            "hollow": {"inner": {}},
            "flag": true
        });
        let mut seen = Vec::new();
        for_each_leaf(&data, |path, key, value| {
            seen.push((path.to_owned(), key.to_owned(), value.clone()));
        });
        assert_eq!(
            seen,
            vec![
                ("outer.ue-Identity".into(), "ue-Identity".into(), json!(["0xAB", 40])),
                ("outer.inner.rrcState".into(), "rrcState".into(), json!("CONNECTED")),
                ("flag".into(), "flag".into(), json!(true)),
            ]
        );
    }

    #[test]
    fn non_object_root_has_no_leaves() {
        let mut count = 0;
        for_each_leaf(&json!([1, 2]), |_, _, _| count += 1);
        for_each_leaf(&json!("text"), |_, _, _| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn leaf_text_forms() {
        assert_eq!(leaf_text(&json!("x")), "x");
        assert_eq!(leaf_text(&json!(5)), "5");
        assert_eq!(leaf_text(&json!(["0xAB", 8])), "[\"0xAB\",8]");
    }
}
