//! Localization of external `$ref`s.
//!
//! Aggregated documents must be self-contained: every reference into a
//! sibling file is rewritten to an internal `#/components/<kind>/<name>`
//! slot and the referent is copied in, transitively. A work queue keyed by
//! (source URL, JSON pointer) with a visited map breaks reference cycles by
//! pointing back at the already-allocated slot.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use url::Url;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::refs::{self, DocumentCache, RefKey};

static COMPONENT_POINTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/components/([^/]+)/([^/]+)$").expect("component pointer pattern"));

/// Rewrites every external `$ref` in `doc` into an internal components slot.
///
/// After a successful return, no `$ref` value in the document points outside
/// of it. A slot that is already occupied by a structurally different
/// definition is a [`Error::Conflict`].
pub fn localize(doc: &mut Document) -> Result<()> {
    let mut localizer = Localizer {
        doc_url: doc.url().clone(),
        cache: DocumentCache::new(),
        visited: HashMap::new(),
        slot_owners: HashMap::new(),
        staged: Vec::new(),
    };
    let mut root = std::mem::take(doc.value_mut());
    let base = localizer.doc_url.clone();
    localizer.rewrite(&mut root, &base, None)?;
    localizer.install_staged(&mut root)?;
    *doc.value_mut() = root;
    Ok(())
}

// A components slot: kind plus name.
type Slot = (String, String);

struct Localizer {
    doc_url: Url,
    cache: DocumentCache,
    visited: HashMap<RefKey, Slot>,
    slot_owners: HashMap<Slot, RefKey>,
    staged: Vec<(Slot, Value)>,
}

impl Localizer {
    // Depth-first rewrite of every $ref under `node`. `base` is the document
    // the subtree was authored in; `kind` is the component kind implied by
    // the surrounding context.
    fn rewrite(&mut self, node: &mut Value, base: &Url, kind: Option<&str>) -> Result<()> {
        match node {
            Value::Object(map) => {
                if let Some(Value::String(ref_str)) = map.get("$ref") {
                    let key = refs::parse_ref(base, ref_str)?;
                    let rewritten = if key.url == self.doc_url {
                        // Already (or effectively) internal; normalize form.
                        format!("#{}", key.pointer)
                    } else {
                        let (kind, name) = self.localize_target(key, kind)?;
                        format!("#/components/{kind}/{name}")
                    };
                    map.insert("$ref".to_string(), Value::String(rewritten));
                }
                let keys: Vec<String> = map.keys().cloned().collect();
                for k in keys {
                    // The include-headers extension is consumed and stripped
                    // by expansion; its ref is not part of the document graph.
                    if k == "$ref" || k == crate::include_headers::INCLUDE_HEADERS_EXT {
                        continue;
                    }
                    let child_kind = kind_for_key(&k).or(kind);
                    if let Some(child) = map.get_mut(&k) {
                        self.rewrite(child, base, child_kind)?;
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.rewrite(item, base, kind)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    // Copies the referent behind `key` into a components slot (allocating it
    // first so cycles can point back at it) and returns the slot.
    fn localize_target(&mut self, key: RefKey, kind_hint: Option<&str>) -> Result<Slot> {
        if let Some(slot) = self.visited.get(&key) {
            return Ok(slot.clone());
        }
        let slot = self.allocate_slot(&key, kind_hint)?;
        self.visited.insert(key.clone(), slot.clone());
        self.slot_owners.insert(slot.clone(), key.clone());

        let mut referent = self.cache.resolve(&key)?;
        self.rewrite(&mut referent, &key.url, Some(slot.0.as_str()))?;
        self.staged.push((slot.clone(), referent));
        Ok(slot)
    }

    // Picks (kind, name) for a referent: the target's own components
    // coordinates when it has them, otherwise the context kind plus a name
    // derived from the fragment or the referent's filename.
    fn allocate_slot(&mut self, key: &RefKey, kind_hint: Option<&str>) -> Result<Slot> {
        if let Some(caps) = COMPONENT_POINTER_RE.captures(&key.pointer) {
            let kind = caps.get(1).expect("kind").as_str().to_string();
            let name = component_name(caps.get(2).expect("name").as_str());
            return self.claim(key, kind, name);
        }
        let kind = kind_hint.unwrap_or("schemas").to_string();
        let name = match key.pointer.rsplit('/').next() {
            Some(last) if !last.is_empty() => component_name(last),
            _ => component_name(&file_stem(&key.url)),
        };
        self.claim(key, kind, name)
    }

    // Reserves the slot, disambiguating by filename when two distinct
    // referents want the same name.
    fn claim(&mut self, key: &RefKey, kind: String, name: String) -> Result<Slot> {
        let slot = (kind.clone(), name.clone());
        match self.slot_owners.get(&slot) {
            None => Ok(slot),
            Some(owner) if owner == key => Ok(slot),
            Some(_) => {
                let prefixed = (kind.clone(), format!("{}_{}", file_stem(&key.url), name));
                match self.slot_owners.get(&prefixed) {
                    None => Ok(prefixed),
                    Some(owner) if owner == key => Ok(prefixed),
                    Some(_) => Err(Error::Conflict {
                        pointer: format!("#/components/{kind}/{name}"),
                        sources: format!("{}#{}", key.url, key.pointer),
                    }),
                }
            }
        }
    }

    // Merges staged components into the document, refusing to overwrite a
    // structurally different pre-existing definition.
    fn install_staged(&mut self, root: &mut Value) -> Result<()> {
        if self.staged.is_empty() {
            return Ok(());
        }
        let root = root.as_object_mut().ok_or_else(|| Error::Ref {
            reference: self.doc_url.to_string(),
            reason: "document root is not an object".to_string(),
        })?;
        let components = root
            .entry("components".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        for ((kind, name), value) in self.staged.drain(..) {
            let slot = components
                .as_object_mut()
                .expect("components is an object")
                .entry(kind.clone())
                .or_insert_with(|| Value::Object(Map::new()))
                .as_object_mut()
                .expect("component kind is an object");
            match slot.get(&name) {
                None => {
                    slot.insert(name, value);
                }
                Some(existing) if *existing == value => {}
                Some(_) => {
                    return Err(Error::Conflict {
                        pointer: format!(
                            "#/components/{}/{}",
                            refs::escape_pointer_token(&kind),
                            refs::escape_pointer_token(&name)
                        ),
                        sources: "localized reference, existing component".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

// Maps an OpenAPI object key to the component kind its children live under.
fn kind_for_key(key: &str) -> Option<&'static str> {
    match key {
        "schema" | "schemas" | "items" | "properties" | "additionalProperties" | "allOf"
        | "anyOf" | "oneOf" | "not" => Some("schemas"),
        "parameters" => Some("parameters"),
        "responses" => Some("responses"),
        "headers" => Some("headers"),
        "requestBody" | "requestBodies" => Some("requestBodies"),
        "examples" => Some("examples"),
        "links" => Some("links"),
        "callbacks" => Some("callbacks"),
        "securitySchemes" => Some("securitySchemes"),
        _ => None,
    }
}

fn file_stem(url: &Url) -> String {
    let path = url.path();
    let base = path.rsplit('/').next().unwrap_or(path);
    base.split('.').next().unwrap_or(base).to_string()
}

// Component names are restricted to [A-Za-z0-9._-].
fn component_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_for_key() {
        assert_eq!(kind_for_key("schema"), Some("schemas"));
        assert_eq!(kind_for_key("headers"), Some("headers"));
        assert_eq!(kind_for_key("get"), None);
    }

    #[test]
    fn test_component_name() {
        assert_eq!(component_name("HelloWorld"), "HelloWorld");
        assert_eq!(component_name("x common/thing"), "x_common_thing");
    }

    #[test]
    fn test_file_stem() {
        let url = Url::parse("file:///work/schemas/common-types.yaml").unwrap();
        assert_eq!(file_stem(&url), "common-types");
    }
}
