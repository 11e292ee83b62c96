//! The build pipeline: from a project configuration to aggregate versioned
//! OpenAPI documents on disk.
//!
//! For every API the compiler matches its resource spec files, loads them as
//! [`crate::spec_versions::SpecVersions`], and writes one directory per
//! effective version containing `spec.json` and `spec.yaml`, with overlays
//! stamped over each aggregate.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glob::Pattern;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::info;
use url::Url;

use crate::config::{Project, ResourceSet};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::localize::localize;
use crate::merge::merge;
use crate::output::{to_spec_json, to_spec_yaml};
use crate::resource::SPEC_FILENAME;
use crate::spec_versions::load_spec_versions_fileset;
use crate::version::{version_date_strings, Version};

// Stability suffixes enumerated per output date, weakest first. GA is the
// empty suffix.
const OUTPUT_SUFFIXES: [&str; 3] = ["~experimental", "~beta", ""];

/// Builds aggregate versioned OpenAPI documents for a project's APIs.
pub struct Compiler {
    apis: BTreeMap<String, ApiPlan>,
}

struct ApiPlan {
    spec_files: Vec<PathBuf>,
    overlays: Vec<Document>,
    output: Option<PathBuf>,
}

impl Compiler {
    /// Prepares a compiler from a project configuration: matches resource
    /// spec files and loads overlay documents.
    pub fn new(project: &Project) -> Result<Compiler> {
        let mut apis = BTreeMap::new();
        for (api_name, api) in &project.apis {
            let mut spec_files = Vec::new();
            for (i, rc) in api.resources.iter().enumerate() {
                let mut matched = resource_spec_files(rc).map_err(|e| {
                    Error::Config(format!("{e} (apis.{api_name}.resources[{i}].path)"))
                })?;
                spec_files.append(&mut matched);
            }

            let mut overlays = Vec::new();
            for (i, overlay) in api.overlays.iter().enumerate() {
                let doc = if let Some(include) = &overlay.include {
                    let mut doc = Document::from_file(include).map_err(|e| {
                        Error::Config(format!(
                            "failed to load overlay {include:?}: {e} (apis.{api_name}.overlays[{i}])"
                        ))
                    })?;
                    localize(&mut doc).map_err(|e| {
                        Error::Config(format!(
                            "failed to localize references in {include:?}: {e} (apis.{api_name}.overlays[{i}])"
                        ))
                    })?;
                    doc
                } else {
                    let inline = overlay.inline.as_deref().unwrap_or_default();
                    let url = Url::parse(&format!("vervet:///{api_name}/overlays/{i}"))
                        .expect("static overlay URL");
                    Document::from_str(url, &expand_env(inline)).map_err(|e| {
                        Error::Config(format!(
                            "failed to load inline overlay: {e} (apis.{api_name}.overlays[{i}])"
                        ))
                    })?
                };
                overlays.push(doc);
            }

            apis.insert(
                api_name.clone(),
                ApiPlan {
                    spec_files,
                    overlays,
                    output: api.output.as_ref().map(|o| PathBuf::from(&o.path)),
                },
            );
        }
        Ok(Compiler { apis })
    }

    /// Builds one API's aggregate versioned documents into its output
    /// directory. APIs without an output are skipped.
    pub fn build(&self, api_name: &str) -> Result<()> {
        let api = self
            .apis
            .get(api_name)
            .ok_or_else(|| Error::Config(format!("api not found (apis.{api_name})")))?;
        let output = match &api.output {
            Some(output) => output,
            None => return Ok(()),
        };
        match std::fs::remove_dir_all(output) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        std::fs::create_dir_all(output)?;
        info!(api = %api_name, output = %output.display(), "compiling API versions");

        let spec_versions = load_spec_versions_fileset(&api.spec_files)?;
        let versions = spec_versions.versions();
        for date in version_date_strings(&versions) {
            for suffix in OUTPUT_SUFFIXES {
                let version: Version = format!("{date}{suffix}").parse()?;
                let mut spec = match spec_versions.at(&version) {
                    Ok(spec) => spec,
                    Err(Error::NoMatchingVersion) => continue,
                    Err(e) => return Err(e),
                };
                for overlay in &api.overlays {
                    merge(&mut spec, overlay.value(), true)?;
                }
                self.write_version(output, &version, &spec)?;
            }
        }
        Ok(())
    }

    /// Builds every API in the project, in name order.
    pub fn build_all(&self) -> Result<()> {
        for api_name in self.apis.keys() {
            self.build(api_name)?;
        }
        Ok(())
    }

    fn write_version(&self, output: &Path, version: &Version, spec: &Value) -> Result<()> {
        let version_dir = output.join(version.to_string());
        std::fs::create_dir_all(&version_dir)?;
        let json_path = version_dir.join("spec.json");
        std::fs::write(&json_path, to_spec_json(spec)?)?;
        info!(path = %json_path.display(), "wrote spec");
        let yaml_path = version_dir.join("spec.yaml");
        std::fs::write(&yaml_path, to_spec_yaml(spec)?)?;
        info!(path = %yaml_path.display(), "wrote spec");
        Ok(())
    }
}

/// All `*/YYYY-MM-DD/spec.yaml` files under a resource set's path, minus its
/// exclusion globs, sorted.
pub fn resource_spec_files(rc: &ResourceSet) -> Result<Vec<PathBuf>> {
    let excludes: Vec<Pattern> = rc
        .excludes
        .iter()
        .map(|e| Pattern::new(e))
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::Config(format!("invalid exclude pattern: {e}")))?;

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(&rc.path).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Config(e.to_string()))?;
        if !entry.file_type().is_file() || entry.file_name() != SPEC_FILENAME {
            continue;
        }
        let version_dir = entry
            .path()
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str());
        if version_dir.map_or(true, |d| crate::resource::version_dir_date(d).is_none()) {
            continue;
        }
        if excludes.iter().any(|p| p.matches_path(entry.path())) {
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}

static ENV_VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern"));

// ${VAR} expansion for inline overlays; unset variables expand to empty.
fn expand_env(text: &str) -> String {
    ENV_VAR_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}
