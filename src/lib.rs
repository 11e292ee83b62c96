//! # vervet
//!
//! A toolkit for managing versioned OpenAPI resources. Individual resource
//! specs are authored as dated snapshots (`<resource>/<YYYY-MM-DD>/spec.yaml`)
//! with a stability level, and vervet aggregates them into one effective
//! OpenAPI document per requested version.
//!
//! The pipeline:
//! - [`document`] loads and validates individual OpenAPI 3 files
//! - [`localize`] rewrites external `$ref`s so aggregates are self-contained
//! - [`resource`] assembles one resource's version timeline and stamps
//!   version metadata into every operation
//! - [`spec_versions`] unions resources and merges them per version
//! - [`merge`] provides conflict-checked deep-merge for aggregation and
//!   overlays
//! - [`compiler`] drives the whole build from a project configuration
//! - [`collator`] merges specs published independently by several services
//!
//! ## Resolving a version
//!
//! ```no_run
//! use vervet::{load_spec_versions, Version};
//!
//! # fn main() -> vervet::Result<()> {
//! let specs = load_spec_versions("resources")?;
//! let version: Version = "2021-07-01~beta".parse()?;
//! let doc = specs.at(&version)?;
//! println!("{}", vervet::to_spec_yaml(&doc)?);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod collator;
pub mod compiler;
pub mod config;
pub mod document;
pub mod error;
pub mod include_headers;
pub mod localize;
pub mod merge;
pub mod output;
pub mod refs;
pub mod resource;
pub mod spec_versions;
pub mod version;

pub use collator::{Collator, ContentRevision};
pub use compiler::Compiler;
pub use document::{CancelToken, Document};
pub use error::{Error, Result};
pub use include_headers::include_headers;
pub use localize::localize;
pub use merge::merge;
pub use output::{to_spec_json, to_spec_yaml, with_generated_comment};
pub use resource::{load_resource_versions, Resource, ResourceVersions};
pub use spec_versions::{load_spec_versions, load_spec_versions_fileset, SpecVersions};
pub use version::{version_date_strings, Lifecycle, Stability, Version};
