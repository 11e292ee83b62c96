//! Aggregation of many resources into effective-at-a-version documents.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde_json::{Map, Value};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::merge::{merge_labeled, name_conflict_sources, record_owners};
use crate::resource::{
    load_resource_from_specs, version_dir_date, ResourceVersions, SPEC_FILENAME,
};
use crate::version::Version;

/// All resources of an API, each with its own version timeline.
#[derive(Debug)]
pub struct SpecVersions {
    resources: Vec<ResourceVersions>,
}

impl SpecVersions {
    pub fn resources(&self) -> &[ResourceVersions] {
        &self.resources
    }

    /// The deduplicated, sorted union of all resources' versions.
    pub fn versions(&self) -> Vec<Version> {
        let set: BTreeSet<Version> = self
            .resources
            .iter()
            .flat_map(|r| r.versions())
            .collect();
        set.into_iter().collect()
    }

    /// The aggregate document effective at `query`.
    ///
    /// Every resource that resolves at `query` is merged into one document;
    /// resources with no matching version are skipped. A cross-resource
    /// collision is a [`Error::Conflict`] naming the pointer and both
    /// resources. When nothing resolves, [`Error::NoMatchingVersion`].
    pub fn at(&self, query: &Version) -> Result<Value> {
        let mut aggregate = Value::Object(Map::new());
        let mut owners: HashMap<String, String> = HashMap::new();
        let mut matched = false;

        for rv in &self.resources {
            let resource = match rv.at(query) {
                Ok(resource) => resource,
                Err(Error::NoMatchingVersion) => continue,
                Err(e) => return Err(e),
            };
            debug!(resource = %rv.name(), version = %resource.version, "merging resource");
            merge_labeled(
                &mut aggregate,
                resource.document.value(),
                false,
                ("", rv.name()),
            )
            .map_err(|e| name_conflict_sources(e, &owners, rv.name()))?;
            record_owners(&mut owners, resource.document.value(), rv.name());
            matched = true;
        }
        if !matched {
            return Err(Error::NoMatchingVersion);
        }
        Ok(aggregate)
    }
}

/// Loads every resource under `root` (any directory whose children include
/// `YYYY-MM-DD/spec.yaml`). Resource directories starting with `_` are
/// reserved for examples and skipped.
pub fn load_spec_versions(root: impl AsRef<Path>) -> Result<SpecVersions> {
    load_spec_versions_at(root, chrono::Utc::now().date_naive())
}

pub(crate) fn load_spec_versions_at(
    root: impl AsRef<Path>,
    today: NaiveDate,
) -> Result<SpecVersions> {
    let root = root.as_ref();
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Config(e.to_string()))?;
        if entry.file_type().is_file() && entry.file_name() == SPEC_FILENAME {
            files.push(entry.into_path());
        }
    }
    load_spec_versions_fileset_at(&files, today)
}

/// Builds [`SpecVersions`] from an explicit set of spec files, typically
/// produced by config-driven glob matching.
pub fn load_spec_versions_fileset(files: &[PathBuf]) -> Result<SpecVersions> {
    load_spec_versions_fileset_at(files, chrono::Utc::now().date_naive())
}

pub(crate) fn load_spec_versions_fileset_at(
    files: &[PathBuf],
    today: NaiveDate,
) -> Result<SpecVersions> {
    let mut resources = Vec::new();
    for (resource_dir, specs) in group_spec_files(files) {
        let name = resource_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        if name.starts_with('_') {
            debug!(resource = %name, "skipping reserved resource directory");
            continue;
        }
        info!(resource = %name, versions = specs.len(), "loading resource");
        resources.push(load_resource_from_specs(name, specs, today)?);
    }
    if resources.is_empty() {
        return Err(Error::Config(
            "no resource spec files found".to_string(),
        ));
    }
    resources.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(SpecVersions { resources })
}

// Groups <resource>/<date>/spec.yaml paths by resource directory. Files
// whose parent directory is not a version date are ignored.
fn group_spec_files(files: &[PathBuf]) -> BTreeMap<PathBuf, Vec<(NaiveDate, PathBuf)>> {
    let mut groups: BTreeMap<PathBuf, Vec<(NaiveDate, PathBuf)>> = BTreeMap::new();
    for file in files {
        let version_dir = match file.parent() {
            Some(dir) => dir,
            None => continue,
        };
        let date = match version_dir
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(version_dir_date)
        {
            Some(date) => date,
            None => continue,
        };
        let resource_dir = match version_dir.parent() {
            Some(dir) => dir.to_path_buf(),
            None => continue,
        };
        groups
            .entry(resource_dir)
            .or_default()
            .push((date, file.clone()));
    }
    groups
}

