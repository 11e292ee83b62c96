//! Project configuration.
//!
//! A project file enumerates the APIs to compile: where their versioned
//! resources live, which files to exclude, which overlay documents to stamp
//! on top, and where the aggregate output goes.
//!
//! ```yaml
//! version: "1"
//! apis:
//!   registry:
//!     resources:
//!       - path: resources
//!         excludes:
//!           - resources/schemas/**
//!     overlays:
//!       - include: spec/overlay.yaml
//!     output:
//!       path: versions
//! ```
//!
//! Unknown keys are ignored so projects carrying sections for external
//! tooling still load.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A project: a collection of APIs compiled from versioned resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub apis: BTreeMap<String, Api>,
}

/// How and where to build one API's aggregate versioned documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Api {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub resources: Vec<ResourceSet>,
    #[serde(default)]
    pub overlays: Vec<Overlay>,
    #[serde(default)]
    pub output: Option<Output>,
}

/// A directory of versioned resources plus exclusion globs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSet {
    pub path: String,
    #[serde(default)]
    pub excludes: Vec<String>,
}

/// An OpenAPI fragment merged over the aggregate: either a file include or
/// an inline YAML literal (with `${ENV}` expansion).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Overlay {
    #[serde(default)]
    pub include: Option<String>,
    #[serde(default)]
    pub inline: Option<String>,
}

/// Where aggregate versioned documents are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub path: String,
}

impl Project {
    /// Loads a project configuration from its YAML representation, applying
    /// defaults and validating.
    pub fn load(mut reader: impl Read) -> Result<Project> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let mut project: Project = serde_yaml::from_str(&text)?;
        project.normalize();
        project.validate()?;
        Ok(project)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Project> {
        let file = std::fs::File::open(path)?;
        Self::load(file)
    }

    /// API names in deterministic ascending order.
    pub fn api_names(&self) -> Vec<&str> {
        self.apis.keys().map(String::as_str).collect()
    }

    fn normalize(&mut self) {
        if self.version.is_empty() {
            self.version = "1".to_string();
        }
        for (name, api) in &mut self.apis {
            api.name = name.clone();
        }
    }

    fn validate(&self) -> Result<()> {
        if self.version != "1" {
            return Err(Error::Config(format!(
                "unsupported version {:?}",
                self.version
            )));
        }
        if self.apis.is_empty() {
            return Err(Error::Config("no apis defined".to_string()));
        }
        for (name, api) in &self.apis {
            if api.resources.is_empty() {
                return Err(Error::Config(format!(
                    "no resources defined (apis.{name}.resources)"
                )));
            }
            for (i, rc) in api.resources.iter().enumerate() {
                for exclude in &rc.excludes {
                    Pattern::new(exclude).map_err(|e| {
                        Error::Config(format!(
                            "invalid exclude pattern {exclude:?}: {e} (apis.{name}.resources[{i}])"
                        ))
                    })?;
                }
            }
            for (i, overlay) in api.overlays.iter().enumerate() {
                if overlay.include.is_some() == overlay.inline.is_some() {
                    return Err(Error::Config(format!(
                        "exactly one of include or inline must be set (apis.{name}.overlays[{i}])"
                    )));
                }
            }
        }
        Ok(())
    }
}
