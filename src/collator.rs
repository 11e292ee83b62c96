//! Collation of specs published by independent services.
//!
//! Each service ships already-compiled aggregate documents at its own set of
//! versions. Collation computes the union of versions and, for each one,
//! merges every service's effective document into a single aggregate. A
//! disagreement between two services at the same pointer is an authoring
//! error across team boundaries and is always fatal.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::merge::{merge_labeled, name_conflict_sources, record_owners};
use crate::version::Version;

/// One spec blob a service published at a version.
#[derive(Debug, Clone)]
pub struct ContentRevision {
    pub version: Version,
    pub blob: Vec<u8>,
}

/// Accumulates service revisions for collation.
#[derive(Debug, Default)]
pub struct Collator {
    revisions: BTreeMap<String, Vec<ContentRevision>>,
}

impl Collator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, service: &str, revision: ContentRevision) {
        self.revisions
            .entry(service.to_string())
            .or_default()
            .push(revision);
    }

    /// Merges every service's effective document at every known version.
    ///
    /// Returns the sorted union of versions and the aggregate per version.
    /// Failures across versions are accumulated and reported together; no
    /// partial output is returned on error.
    pub fn collate(&self) -> Result<(Vec<Version>, BTreeMap<Version, Value>)> {
        let versions: Vec<Version> = self
            .revisions
            .values()
            .flatten()
            .map(|r| r.version)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut aggregates = BTreeMap::new();
        let mut errors = Vec::new();
        for version in &versions {
            match self.collate_version(version) {
                Ok(aggregate) => {
                    aggregates.insert(*version, aggregate);
                }
                Err(e) => errors.push(e),
            }
        }
        match errors.len() {
            0 => Ok((versions, aggregates)),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Multiple(errors)),
        }
    }

    fn collate_version(&self, version: &Version) -> Result<Value> {
        let mut aggregate = Value::Object(Map::new());
        let mut owners: HashMap<String, String> = HashMap::new();
        for (service, revisions) in &self.revisions {
            let available: Vec<Version> = revisions.iter().map(|r| r.version).collect();
            let resolved = match Version::resolve(version, &available) {
                Ok(resolved) => *resolved,
                Err(Error::NoMatchingVersion) => continue,
                Err(e) => return Err(e),
            };
            let revision = revisions
                .iter()
                .find(|r| r.version == resolved)
                .expect("resolved version is present");
            debug!(%service, version = %resolved, "collating service revision");

            let url = Url::parse(&format!("collator:///{service}/{resolved}")).map_err(|e| {
                Error::Ref {
                    reference: service.clone(),
                    reason: e.to_string(),
                }
            })?;
            let text = String::from_utf8_lossy(&revision.blob);
            let document = Document::from_str(url, &text)?;
            merge_labeled(&mut aggregate, document.value(), false, ("", service))
                .map_err(|e| name_conflict_sources(e, &owners, service))?;
            record_owners(&mut owners, document.value(), service);
        }
        Ok(aggregate)
    }
}
