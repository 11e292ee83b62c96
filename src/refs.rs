//! `$ref` parsing and resolution shared by validation, localization and
//! header inclusion.

use std::collections::HashMap;

use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};

/// Identity of a referent: the document it lives in plus the JSON pointer
/// within that document. An empty pointer denotes the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefKey {
    pub url: Url,
    pub pointer: String,
}

/// True when `ref_str` points outside the owning document.
pub fn is_external_ref(ref_str: &str) -> bool {
    !ref_str.starts_with('#')
}

/// Splits a `$ref` into its target document URL and JSON pointer, resolving
/// relative file parts against the owning document's URL.
pub fn parse_ref(base: &Url, ref_str: &str) -> Result<RefKey> {
    let (file, fragment) = match ref_str.split_once('#') {
        Some((file, fragment)) => (file, fragment),
        None => (ref_str, ""),
    };
    if !fragment.is_empty() && !fragment.starts_with('/') {
        return Err(Error::Ref {
            reference: ref_str.to_string(),
            reason: "fragment is not a JSON pointer".to_string(),
        });
    }
    let url = if file.is_empty() {
        base.clone()
    } else {
        base.join(file).map_err(|e| Error::Ref {
            reference: ref_str.to_string(),
            reason: e.to_string(),
        })?
    };
    Ok(RefKey {
        url,
        pointer: fragment.to_string(),
    })
}

/// RFC 6901 pointer lookup over a JSON tree.
pub fn lookup_pointer<'a>(value: &'a Value, pointer: &str) -> Option<&'a Value> {
    if pointer.is_empty() {
        return Some(value);
    }
    let mut node = value;
    for token in pointer.split('/').skip(1) {
        let token = unescape_pointer_token(token);
        node = match node {
            Value::Object(map) => map.get(&token)?,
            Value::Array(items) => items.get(token.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(node)
}

pub fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape_pointer_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Loads and memoizes referenced documents by URL.
#[derive(Debug, Default)]
pub struct DocumentCache {
    docs: HashMap<Url, Value>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, url: &Url) -> Result<&Value> {
        if !self.docs.contains_key(url) {
            let path = url.to_file_path().map_err(|_| Error::Ref {
                reference: url.to_string(),
                reason: "not a file URL".to_string(),
            })?;
            let text = std::fs::read_to_string(&path)?;
            let value: Value = serde_yaml::from_str(&text).map_err(|e| Error::ParseDocument {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            self.docs.insert(url.clone(), value);
        }
        Ok(&self.docs[url])
    }

    /// Resolves `key` to the referent node, cloned out of the cached source
    /// document.
    pub fn resolve(&mut self, key: &RefKey) -> Result<Value> {
        let doc = self.load(&key.url)?;
        lookup_pointer(doc, &key.pointer)
            .cloned()
            .ok_or_else(|| Error::Ref {
                reference: format!("{}#{}", key.url, key.pointer),
                reason: "pointer target not found".to_string(),
            })
    }
}
