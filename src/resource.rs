//! Loading one resource's versioned spec directories.
//!
//! A resource is a directory of `YYYY-MM-DD/spec.yaml` snapshots. Loading
//! validates and localizes each snapshot, stamps version metadata into every
//! operation, and produces a timeline the resolver can answer queries
//! against.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde_json::{Map, Value};
use tracing::debug;

use crate::document::{CancelToken, Document};
use crate::error::{Error, Result};
use crate::include_headers::include_headers;
use crate::localize::localize;
use crate::version::{Lifecycle, Stability, Version};

/// File name of a versioned resource snapshot within its date directory.
pub const SPEC_FILENAME: &str = "spec.yaml";

/// Top-level extension declaring a snapshot's stability. Defaults to `ga`.
pub const STABILITY_EXT: &str = "x-snyk-api-stability";
/// Operation-level extension carrying the canonical resolved version.
pub const API_VERSION_EXT: &str = "x-snyk-api-version";
/// Operation-level extension carrying the lifecycle at load time.
pub const LIFECYCLE_EXT: &str = "x-snyk-api-lifecycle";
/// Operation-level extension naming the version that deprecates this one.
pub const DEPRECATED_BY_EXT: &str = "x-snyk-deprecated-by";
/// Operation-level extension listing the sub-GA versions a GA release
/// supersedes.
pub const RELEASES_EXT: &str = "x-snyk-api-releases";

const METHODS: [&str; 8] = [
    "get", "post", "put", "delete", "patch", "options", "head", "trace",
];

/// One loaded snapshot of a resource at a version.
#[derive(Debug, Clone)]
pub struct Resource {
    pub name: String,
    pub version: Version,
    pub document: Document,
    pub source_path: PathBuf,
}

/// A resource's full version timeline, sorted ascending.
#[derive(Debug, Clone)]
pub struct ResourceVersions {
    name: String,
    resources: Vec<Resource>,
}

impl ResourceVersions {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All versions of this resource, ascending.
    pub fn versions(&self) -> Vec<Version> {
        self.resources.iter().map(|r| r.version).collect()
    }

    /// The snapshot effective for `query`, or [`Error::NoMatchingVersion`].
    ///
    /// Resolution walks the stability ladder: a `ga` query only matches GA
    /// snapshots, `beta` matches beta or GA, `experimental` and `wip` match
    /// anything released at or before the queried date.
    pub fn at(&self, query: &Version) -> Result<&Resource> {
        let versions = self.versions();
        let resolved = Version::resolve(query, &versions)?;
        self.resources
            .iter()
            .find(|r| r.version == *resolved)
            .ok_or(Error::NoMatchingVersion)
    }
}

/// Loads all versioned snapshots under one resource directory.
pub fn load_resource_versions(dir: impl AsRef<Path>) -> Result<ResourceVersions> {
    load_resource_versions_at(dir, chrono::Utc::now().date_naive())
}

// Split out so tests can pin "today" for lifecycle stamping.
pub(crate) fn load_resource_versions_at(
    dir: impl AsRef<Path>,
    today: NaiveDate,
) -> Result<ResourceVersions> {
    let dir = dir.as_ref();
    let name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let mut specs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let dir_name = entry.file_name();
        let date = match version_dir_date(&dir_name.to_string_lossy()) {
            Some(date) => date,
            None => continue,
        };
        let spec_path = entry.path().join(SPEC_FILENAME);
        if spec_path.is_file() {
            specs.push((date, spec_path));
        }
    }
    if specs.is_empty() {
        return Err(Error::Config(format!(
            "no resource versions found in {}",
            dir.display()
        )));
    }
    load_resource_from_specs(name, specs, today)
}

// Builds a timeline from explicit (date, spec.yaml) pairs. Also the entry
// point for config-driven filesets, where exclusion globs have already been
// applied.
pub(crate) fn load_resource_from_specs(
    name: String,
    specs: Vec<(NaiveDate, PathBuf)>,
    today: NaiveDate,
) -> Result<ResourceVersions> {
    let mut resources: Vec<Resource> = Vec::new();
    let cancel = CancelToken::new();
    for (date, spec_path) in specs {
        debug!(resource = %name, version = %date, "loading resource version");
        let mut document = Document::from_file(&spec_path)?;
        document.validate(&cancel)?;
        localize(&mut document)?;
        include_headers(&mut document)?;

        let stability = read_stability(document.value())?;
        let version = Version::new(date, stability);
        if resources.iter().any(|r| r.version == version) {
            return Err(Error::Config(format!(
                "duplicate version {version} in resource {name}"
            )));
        }
        resources.push(Resource {
            name: name.clone(),
            version,
            document,
            source_path: spec_path,
        });
    }
    resources.sort_by_key(|r| r.version);

    let versions: Vec<Version> = resources.iter().map(|r| r.version).collect();
    for resource in &mut resources {
        stamp_operations(resource, &versions, today);
    }
    Ok(ResourceVersions { name, resources })
}

/// Parses a directory name as a version date, or `None` when the directory
/// is not a version directory.
pub fn version_dir_date(name: &str) -> Option<NaiveDate> {
    if name.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(name, "%Y-%m-%d").ok()
}

fn read_stability(value: &Value) -> Result<Stability> {
    match value.get(STABILITY_EXT) {
        None => Ok(Stability::default()),
        Some(Value::String(s)) => s.parse(),
        Some(other) => Err(Error::ParseVersion {
            input: other.to_string(),
            reason: format!("{STABILITY_EXT} must be a string"),
        }),
    }
}

// Writes version, lifecycle and deprecation extensions into every operation
// of the snapshot.
fn stamp_operations(resource: &mut Resource, timeline: &[Version], today: NaiveDate) {
    let version = resource.version;
    let deprecated_by = version.deprecated_by(timeline).copied();
    let lifecycle = version.lifecycle_at(deprecated_by.as_ref(), today);
    let releases: Vec<Value> = if version.stability == Stability::Ga {
        timeline
            .iter()
            .filter(|v| **v < version && v.stability < Stability::Ga)
            .map(|v| Value::String(v.to_string()))
            .collect()
    } else {
        Vec::new()
    };

    for_each_operation(resource.document.value_mut(), |operation| {
        operation.insert(
            API_VERSION_EXT.to_string(),
            Value::String(version.to_string()),
        );
        if lifecycle != Lifecycle::Unreleased {
            operation.insert(
                LIFECYCLE_EXT.to_string(),
                Value::String(lifecycle.to_string()),
            );
        }
        if let Some(dep) = deprecated_by {
            operation.insert(
                DEPRECATED_BY_EXT.to_string(),
                Value::String(dep.to_string()),
            );
        }
        if !releases.is_empty() {
            operation.insert(RELEASES_EXT.to_string(), Value::Array(releases.clone()));
        }
    });
}

fn for_each_operation(value: &mut Value, mut f: impl FnMut(&mut Map<String, Value>)) {
    let paths = match value.get_mut("paths").and_then(Value::as_object_mut) {
        Some(paths) => paths,
        None => return,
    };
    for item in paths.values_mut() {
        let item = match item.as_object_mut() {
            Some(item) => item,
            None => continue,
        };
        for method in METHODS {
            if let Some(operation) = item.get_mut(method).and_then(Value::as_object_mut) {
                f(operation);
            }
        }
    }
}
