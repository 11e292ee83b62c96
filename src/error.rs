use thiserror::Error;

/// Errors produced while loading, merging and resolving versioned OpenAPI
/// documents.
#[derive(Debug, Error)]
pub enum Error {
    /// A version string did not match the `YYYY-MM-DD[~stability]` grammar.
    #[error("invalid version {input:?}: {reason}")]
    ParseVersion { input: String, reason: String },

    /// A document could not be parsed as YAML or JSON.
    #[error("failed to parse document {url}: {reason}")]
    ParseDocument { url: String, reason: String },

    /// A document failed OpenAPI 3 structural validation.
    #[error("validation failed for {url}: {reason}")]
    Validation { url: String, reason: String },

    /// Validation was interrupted by the caller.
    #[error("validation canceled")]
    Canceled,

    /// Two sources disagree on the same JSON pointer.
    #[error("conflict in {pointer}: {sources}")]
    Conflict { pointer: String, sources: String },

    /// The resolver found no candidate for the requested version.
    ///
    /// The message is load-bearing: callers iterate stability ladders by
    /// matching on this variant.
    #[error("no matching version")]
    NoMatchingVersion,

    /// An external `$ref` could not be resolved.
    #[error("failed to resolve reference {reference:?}: {reason}")]
    Ref { reference: String, reason: String },

    /// A project configuration problem, naming the offending config path.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Several independent failures from a multi-source operation, reported
    /// together.
    #[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<Error>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// True when this error is the resolver's "no candidate" sentinel.
    pub fn is_no_matching_version(&self) -> bool {
        matches!(self, Error::NoMatchingVersion)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
