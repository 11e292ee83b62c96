//! Expansion of the `x-snyk-include-headers` response extension.
//!
//! Authors attach a shared header set to responses by reference instead of
//! repeating the header objects in every operation. Expansion copies each
//! referenced header into the response's `headers` mapping (explicitly
//! authored headers win) and strips the extension.

use serde_json::Value;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::refs::{self, DocumentCache};

pub const INCLUDE_HEADERS_EXT: &str = "x-snyk-include-headers";

const METHODS: [&str; 8] = [
    "get", "post", "put", "delete", "patch", "options", "head", "trace",
];

/// Expands `x-snyk-include-headers` on every response of every operation
/// (and on shared `components/responses` entries), then removes the
/// extension.
pub fn include_headers(doc: &mut Document) -> Result<()> {
    let mut cache = DocumentCache::new();
    let base = doc.url().clone();
    let snapshot = doc.value().clone();
    let root = match doc.value_mut().as_object_mut() {
        Some(map) => map,
        None => return Ok(()),
    };

    if let Some(paths) = root.get_mut("paths").and_then(Value::as_object_mut) {
        for item in paths.values_mut() {
            let item = match item.as_object_mut() {
                Some(map) => map,
                None => continue,
            };
            for method in METHODS {
                let responses = item
                    .get_mut(method)
                    .and_then(Value::as_object_mut)
                    .and_then(|op| op.get_mut("responses"))
                    .and_then(Value::as_object_mut);
                if let Some(responses) = responses {
                    for response in responses.values_mut() {
                        expand_response(response, &snapshot, &base, &mut cache)?;
                    }
                }
            }
        }
    }

    let shared = root
        .get_mut("components")
        .and_then(Value::as_object_mut)
        .and_then(|c| c.get_mut("responses"))
        .and_then(Value::as_object_mut);
    if let Some(shared) = shared {
        for response in shared.values_mut() {
            expand_response(response, &snapshot, &base, &mut cache)?;
        }
    }
    Ok(())
}

fn expand_response(
    response: &mut Value,
    doc: &Value,
    base: &url::Url,
    cache: &mut DocumentCache,
) -> Result<()> {
    let response = match response.as_object_mut() {
        Some(map) => map,
        None => return Ok(()),
    };
    let ext = match response.remove(INCLUDE_HEADERS_EXT) {
        Some(ext) => ext,
        None => return Ok(()),
    };
    let ref_str = ext
        .get("$ref")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Ref {
            reference: ext.to_string(),
            reason: format!("{INCLUDE_HEADERS_EXT} must be a {{ $ref }} object"),
        })?;

    let included = resolve_included(doc, base, ref_str, cache)?;
    let included = included.as_object().ok_or_else(|| Error::Ref {
        reference: ref_str.to_string(),
        reason: "included headers must be a mapping of Header objects".to_string(),
    })?;
    for (name, header) in included {
        if !header.is_object() {
            return Err(Error::Ref {
                reference: ref_str.to_string(),
                reason: format!("included header {name:?} is not a Header object or reference"),
            });
        }
    }

    let headers = response
        .entry("headers".to_string())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    if let Some(headers) = headers.as_object_mut() {
        for (name, header) in included {
            // Explicitly authored headers win over included ones.
            if !headers.contains_key(name) {
                headers.insert(name.clone(), header.clone());
            }
        }
    }
    Ok(())
}

fn resolve_included(
    doc: &Value,
    base: &url::Url,
    ref_str: &str,
    cache: &mut DocumentCache,
) -> Result<Value> {
    let key = refs::parse_ref(base, ref_str)?;
    if key.url == *base {
        refs::lookup_pointer(doc, &key.pointer)
            .cloned()
            .ok_or_else(|| Error::Ref {
                reference: ref_str.to_string(),
                reason: "pointer target not found".to_string(),
            })
    } else {
        cache.resolve(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use url::Url;

    #[test]
    fn test_explicit_headers_win_and_extension_is_removed() {
        let text = r#"
openapi: 3.0.3
info: { title: X, version: '1' }
components:
  x-common-headers:
    request-id:
      schema: { type: string }
    location:
      schema: { type: string }
paths:
  /things:
    get:
      responses:
        '200':
          description: OK
          headers:
            location:
              schema: { type: string, format: uri }
          x-snyk-include-headers:
            $ref: '#/components/x-common-headers'
"#;
        let mut doc =
            Document::from_str(Url::parse("file:///spec.yaml").unwrap(), text).unwrap();
        include_headers(&mut doc).unwrap();
        let response = &doc.value()["paths"]["/things"]["get"]["responses"]["200"];
        assert!(response.get(INCLUDE_HEADERS_EXT).is_none());
        let headers = response["headers"].as_object().unwrap();
        assert_eq!(headers.len(), 2);
        // the explicit definition kept its format
        assert_eq!(headers["location"]["schema"]["format"], "uri");
    }

    #[test]
    fn test_rejects_non_header_mapping() {
        let text = r#"
openapi: 3.0.3
info: { title: X, version: '1' }
components:
  x-common-headers: [not, a, mapping]
paths:
  /things:
    get:
      responses:
        '200':
          description: OK
          x-snyk-include-headers:
            $ref: '#/components/x-common-headers'
"#;
        let mut doc =
            Document::from_str(Url::parse("file:///spec.yaml").unwrap(), text).unwrap();
        let err = include_headers(&mut doc).unwrap_err();
        assert!(matches!(err, Error::Ref { .. }));
    }
}
