//! OpenAPI document loading and validation.
//!
//! A [`Document`] owns a parsed OpenAPI 3 tree together with the URL it was
//! loaded from, which anchors relative `$ref` resolution. The tree is held
//! as [`serde_json::Value`] so the merger and localizer can rewrite it;
//! typed validation goes through the `oas3` crate on demand.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use crate::refs::{self, DocumentCache, RefKey};

/// Cooperative cancellation flag for long validations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<()> {
        if self.is_canceled() {
            Err(Error::Canceled)
        } else {
            Ok(())
        }
    }
}

/// A single problem found during validation.
#[derive(Debug)]
pub struct ValidationIssue {
    pub location: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            location: location.into(),
            message: message.into(),
        }
    }
}

/// An OpenAPI 3 document plus the URL it was loaded from.
#[derive(Debug, Clone)]
pub struct Document {
    url: Url,
    value: Value,
}

impl Document {
    /// Loads a document from a YAML or JSON file. The format is decided by
    /// content (YAML is a superset of JSON), not by file extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Document> {
        let path = std::fs::canonicalize(path.as_ref())?;
        let text = std::fs::read_to_string(&path)?;
        let url = Url::from_file_path(&path).map_err(|_| Error::Ref {
            reference: path.display().to_string(),
            reason: "cannot form a file URL".to_string(),
        })?;
        Self::from_str(url, &text)
    }

    /// Parses a document from a string, anchored at `url` for relative
    /// `$ref` resolution.
    pub fn from_str(url: Url, text: &str) -> Result<Document> {
        let value: Value = serde_yaml::from_str(text).map_err(|e| Error::ParseDocument {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !value.is_object() {
            return Err(Error::ParseDocument {
                url: url.to_string(),
                reason: "document root is not an object".to_string(),
            });
        }
        Ok(Document { url, value })
    }

    /// Wraps an already-built document tree, anchored at `url`.
    pub fn from_value(url: Url, value: Value) -> Result<Document> {
        if !value.is_object() {
            return Err(Error::ParseDocument {
                url: url.to_string(),
                reason: "document root is not an object".to_string(),
            });
        }
        Ok(Document { url, value })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Structural OpenAPI 3 validation with full `$ref` traversal.
    ///
    /// Checks the document deserializes as OpenAPI 3, carries the required
    /// top-level fields, and that every reference (internal or external,
    /// transitively) resolves to an existing node. `cancel` is checked at
    /// each traversal step.
    pub fn validate(&self, cancel: &CancelToken) -> Result<()> {
        cancel.check()?;
        let mut issues = Vec::new();

        match self.value.get("openapi").and_then(Value::as_str) {
            Some(v) if v.starts_with("3.") => {}
            Some(v) => issues.push(ValidationIssue::new(
                "#/openapi",
                format!("unsupported OpenAPI version {v:?}"),
            )),
            None => issues.push(ValidationIssue::new("#/openapi", "missing version field")),
        }
        if self.value.get("info").map_or(true, |v| !v.is_object()) {
            issues.push(ValidationIssue::new("#/info", "missing info object"));
        }
        if self.value.get("paths").map_or(true, |v| !v.is_object()) {
            issues.push(ValidationIssue::new("#/paths", "missing paths object"));
        }

        if let Err(e) = serde_json::from_value::<oas3::OpenApiV3Spec>(self.value.clone()) {
            issues.push(ValidationIssue::new("#", e.to_string()));
        }

        self.validate_refs(cancel, &mut issues)?;

        if issues.is_empty() {
            Ok(())
        } else {
            let reason = issues
                .iter()
                .map(|i| format!("{}: {}", i.location, i.message))
                .collect::<Vec<_>>()
                .join("; ");
            Err(Error::Validation {
                url: self.url.to_string(),
                reason,
            })
        }
    }

    // Walks every $ref in the document and, transitively, in referenced
    // documents, checking that each one resolves.
    fn validate_refs(&self, cancel: &CancelToken, issues: &mut Vec<ValidationIssue>) -> Result<()> {
        let mut cache = DocumentCache::new();
        let mut visited: HashSet<RefKey> = HashSet::new();
        let mut queue: Vec<(Url, Value)> = vec![(self.url.clone(), self.value.clone())];

        while let Some((base, node)) = queue.pop() {
            cancel.check()?;
            for (location, ref_str) in collect_refs(&node) {
                let key = match refs::parse_ref(&base, &ref_str) {
                    Ok(key) => key,
                    Err(e) => {
                        issues.push(ValidationIssue::new(location, e.to_string()));
                        continue;
                    }
                };
                // Refs into this document resolve against the in-memory
                // tree; anything else goes through the file cache.
                let resolved = if key.url == self.url {
                    refs::lookup_pointer(&self.value, &key.pointer)
                        .cloned()
                        .ok_or_else(|| Error::Ref {
                            reference: ref_str.clone(),
                            reason: "pointer target not found".to_string(),
                        })
                } else {
                    cache.resolve(&key)
                };
                match resolved {
                    Ok(value) => {
                        if key.url != self.url && visited.insert(key.clone()) {
                            queue.push((key.url, value));
                        }
                    }
                    Err(e) => issues.push(ValidationIssue::new(location, e.to_string())),
                }
            }
        }
        Ok(())
    }
}

// Collects (JSON pointer, $ref string) pairs from a document tree.
fn collect_refs(value: &Value) -> Vec<(String, String)> {
    let mut found = Vec::new();
    walk_refs(value, "#", &mut found);
    found
}

fn walk_refs(value: &Value, location: &str, found: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(r)) = map.get("$ref") {
                found.push((location.to_string(), r.clone()));
            }
            for (k, v) in map {
                let child = format!("{location}/{}", refs::escape_pointer_token(k));
                walk_refs(v, &child, found);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                walk_refs(v, &format!("{location}/{i}"), found);
            }
        }
        _ => {}
    }
}
