//! Deep-merge of one OpenAPI document into another.
//!
//! Merging powers both aggregation (many resources into one spec, where a
//! collision is an authoring error) and overlays (shared `info`/`servers`
//! content stamped over an aggregate, where the overlay wins).

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::refs::escape_pointer_token;

/// Deep-merges `source` into `target`.
///
/// With `replace` false, a path operation, component or extension present in
/// both documents with different content is a [`Error::Conflict`] naming the
/// first differing JSON pointer; identical content merges cleanly, which
/// makes the operation idempotent. With `replace` true the source always
/// wins. `servers`, `tags` and `security` are concatenated and
/// deduplicated; other top-level fields follow the replace/keep rule.
pub fn merge(target: &mut Value, source: &Value, replace: bool) -> Result<()> {
    merge_labeled(target, source, replace, ("target", "source"))
}

/// [`merge`] with caller-supplied document names for conflict reporting, in
/// (target, source) order.
pub fn merge_labeled(
    target: &mut Value,
    source: &Value,
    replace: bool,
    labels: (&str, &str),
) -> Result<()> {
    let source = match source.as_object() {
        Some(map) => map,
        None => return Ok(()),
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }

    for (key, value) in source {
        match key.as_str() {
            "paths" => merge_paths(target, value, replace, labels)?,
            "components" => merge_components(target, value, replace, labels)?,
            "servers" | "tags" | "security" => merge_array(target, key, value, replace),
            k if k.starts_with("x-") => {
                let pointer = format!("#/{}", escape_pointer_token(key));
                let tgt = target.as_object_mut().expect("target is an object");
                merge_entry(tgt, key, value, replace, labels, &pointer)?;
            }
            _ => {
                // info, externalDocs, openapi and the rest: replace
                // overwrites, otherwise the target's value is kept.
                let tgt = target.as_object_mut().expect("target is an object");
                if replace || !tgt.contains_key(key) {
                    tgt.insert(key.clone(), value.clone());
                }
            }
        }
    }
    Ok(())
}

// Paths merge member-wise: a whole path item is inserted when new, and an
// existing one merges per method (and per shared key such as `parameters`).
fn merge_paths(
    target: &mut Value,
    source: &Value,
    replace: bool,
    labels: (&str, &str),
) -> Result<()> {
    let source = match source.as_object() {
        Some(map) => map,
        None => return Ok(()),
    };
    let paths = member_object(target, "paths");
    for (path, item) in source {
        let path_ptr = format!("#/paths/{}", escape_pointer_token(path));
        if !paths.contains_key(path) {
            paths.insert(path.clone(), item.clone());
            continue;
        }
        let members = match item.as_object() {
            Some(members) => members,
            None => {
                merge_entry(paths, path, item, replace, labels, &path_ptr)?;
                continue;
            }
        };
        if !paths[path].is_object() {
            merge_entry(paths, path, item, replace, labels, &path_ptr)?;
            continue;
        }
        let existing = paths
            .get_mut(path)
            .and_then(Value::as_object_mut)
            .expect("checked above");
        for (member, node) in members {
            let pointer = format!("{path_ptr}/{}", escape_pointer_token(member));
            merge_entry(existing, member, node, replace, labels, &pointer)?;
        }
    }
    Ok(())
}

// Components merge by kind then by name; the conflict rule applies to whole
// named definitions.
fn merge_components(
    target: &mut Value,
    source: &Value,
    replace: bool,
    labels: (&str, &str),
) -> Result<()> {
    let source = match source.as_object() {
        Some(map) => map,
        None => return Ok(()),
    };
    let components = {
        let tgt = target.as_object_mut().expect("target is an object");
        tgt.entry("components".to_string())
            .or_insert_with(|| Value::Object(Map::new()))
    };
    for (kind, entries) in source {
        let entries = match entries.as_object() {
            Some(map) => map,
            None => continue,
        };
        let slot = member_object(components, kind);
        for (name, node) in entries {
            let pointer = format!(
                "#/components/{}/{}",
                escape_pointer_token(kind),
                escape_pointer_token(name)
            );
            merge_entry(slot, name, node, replace, labels, &pointer)?;
        }
    }
    Ok(())
}

// Inserts value under name; equal values merge, differing values conflict
// unless replace.
fn merge_entry(
    parent: &mut Map<String, Value>,
    name: &str,
    value: &Value,
    replace: bool,
    labels: (&str, &str),
    pointer: &str,
) -> Result<()> {
    match parent.get(name) {
        None => {
            parent.insert(name.to_string(), value.clone());
            Ok(())
        }
        Some(existing) if existing == value => Ok(()),
        Some(_) if replace => {
            parent.insert(name.to_string(), value.clone());
            Ok(())
        }
        Some(_) => Err(Error::Conflict {
            pointer: pointer.to_string(),
            sources: format!("{}, {}", labels.0, labels.1),
        }),
    }
}

// servers/tags/security: an overlay with replace=true overwrites the whole
// array; otherwise entries concatenate with structural dedup.
fn merge_array(target: &mut Value, key: &str, source: &Value, replace: bool) {
    let items = match source.as_array() {
        Some(items) => items,
        None => return,
    };
    let tgt = target.as_object_mut().expect("target is an object");
    if replace {
        tgt.insert(key.to_string(), Value::Array(items.clone()));
        return;
    }
    let entry = tgt
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(existing) = entry {
        for item in items {
            if !existing.contains(item) {
                existing.push(item.clone());
            }
        }
    }
}

// Rewrites a merge conflict so it names the document that first contributed
// the pointer alongside the one that collided with it. `owners` maps the
// pointer prefixes recorded by [`record_owners`] to contributor names.
pub(crate) fn name_conflict_sources(
    err: Error,
    owners: &std::collections::HashMap<String, String>,
    source: &str,
) -> Error {
    match err {
        Error::Conflict { pointer, .. } => {
            let owner = owners
                .iter()
                .filter(|(prefix, _)| pointer.starts_with(prefix.as_str()))
                .max_by_key(|(prefix, _)| prefix.len())
                .map(|(_, name)| name.as_str())
                .unwrap_or("another source");
            Error::Conflict {
                pointer,
                sources: format!("{owner}, {source}"),
            }
        }
        other => other,
    }
}

// Records which contributor supplied each path and component so later
// conflicts can name both sides.
pub(crate) fn record_owners(
    owners: &mut std::collections::HashMap<String, String>,
    doc: &Value,
    name: &str,
) {
    if let Some(paths) = doc.get("paths").and_then(Value::as_object) {
        for path in paths.keys() {
            owners
                .entry(format!("#/paths/{}", escape_pointer_token(path)))
                .or_insert_with(|| name.to_string());
        }
    }
    if let Some(components) = doc.get("components").and_then(Value::as_object) {
        for (kind, entries) in components {
            if let Some(entries) = entries.as_object() {
                for entry in entries.keys() {
                    owners
                        .entry(format!(
                            "#/components/{}/{}",
                            escape_pointer_token(kind),
                            escape_pointer_token(entry)
                        ))
                        .or_insert_with(|| name.to_string());
                }
            }
        }
    }
}

fn member_object<'a>(target: &'a mut Value, key: &str) -> &'a mut Map<String, Value> {
    let tgt = target.as_object_mut().expect("target is an object");
    tgt.entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .expect("just inserted an object")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_disjoint_paths() {
        let mut target = json!({"openapi": "3.0.3", "paths": {"/a": {"get": {}}}});
        let source = json!({"paths": {"/b": {"get": {}}}});
        merge(&mut target, &source, false).unwrap();
        assert!(target["paths"]["/a"].is_object());
        assert!(target["paths"]["/b"].is_object());
    }

    #[test]
    fn test_merge_conflicting_operation() {
        let mut target = json!({"paths": {"/a": {"get": {"summary": "one"}}}});
        let source = json!({"paths": {"/a": {"get": {"summary": "two"}}}});
        let err = merge(&mut target, &source, false).unwrap_err();
        match err {
            Error::Conflict { pointer, .. } => assert_eq!(pointer, "#/paths/~1a/get"),
            other => panic!("unexpected error {other}"),
        }
        // replace=true lets the source win
        merge(&mut target, &source, true).unwrap();
        assert_eq!(target["paths"]["/a"]["get"]["summary"], "two");
    }

    #[test]
    fn test_merge_same_path_different_methods() {
        let mut target = json!({"paths": {"/a": {"get": {}}}});
        let source = json!({"paths": {"/a": {"post": {}}}});
        merge(&mut target, &source, false).unwrap();
        assert!(target["paths"]["/a"]["get"].is_object());
        assert!(target["paths"]["/a"]["post"].is_object());
    }

    #[test]
    fn test_merge_idempotent() {
        let mut target = json!({"paths": {"/a": {"get": {"summary": "x"}}}, "tags": [{"name": "t"}]});
        let source = target.clone();
        merge(&mut target, &source, false).unwrap();
        merge(&mut target, &source, false).unwrap();
        assert_eq!(target["tags"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_merge_components_conflict_pointer() {
        let mut target = json!({"components": {"schemas": {"Thing": {"type": "object"}}}});
        let source = json!({"components": {"schemas": {"Thing": {"type": "string"}}}});
        let err = merge(&mut target, &source, false).unwrap_err();
        match err {
            Error::Conflict { pointer, .. } => {
                assert_eq!(pointer, "#/components/schemas/Thing")
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_merge_servers_replace_and_concat() {
        let mut target = json!({"servers": [{"url": "/api/v3"}]});
        let source = json!({"servers": [{"url": "https://example.com/api/v3"}]});
        // replace=true overwrites the whole servers block
        let mut replaced = target.clone();
        merge(&mut replaced, &source, true).unwrap();
        assert_eq!(
            replaced["servers"],
            json!([{"url": "https://example.com/api/v3"}])
        );
        // replace=false concatenates with structural dedup
        merge(&mut target, &source, false).unwrap();
        assert_eq!(target["servers"].as_array().unwrap().len(), 2);
        merge(&mut target, &source, false).unwrap();
        assert_eq!(target["servers"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_merge_info_kept_unless_replace() {
        let mut target = json!({"info": {"title": "A"}});
        let source = json!({"info": {"title": "B"}});
        merge(&mut target, &source, false).unwrap();
        assert_eq!(target["info"]["title"], "A");
        merge(&mut target, &source, true).unwrap();
        assert_eq!(target["info"]["title"], "B");
    }

    #[test]
    fn test_merge_extensions() {
        let mut target = json!({"x-api-owner": "team-a"});
        let source = json!({"x-api-owner": "team-b", "x-extra": true});
        let err = merge(&mut target, &source, false).unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        merge(&mut target, &source, true).unwrap();
        assert_eq!(target["x-api-owner"], "team-b");
        assert_eq!(target["x-extra"], true);
    }
}
