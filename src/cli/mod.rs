//! Command-line interface: thin glue over the library.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use url::Url;

use crate::compiler::Compiler;
use crate::config::Project;
use crate::document::{CancelToken, Document};
use crate::output::to_spec_yaml;
use crate::spec_versions::load_spec_versions;
use crate::version::Version;

#[derive(Parser)]
#[command(name = "vervet")]
#[command(about = "Versioned OpenAPI toolkit", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aggregate, render and validate resource specs at a version
    Resolve {
        /// Directory containing versioned resources
        spec_dir: PathBuf,

        /// Version to resolve at (YYYY-MM-DD[~stability] or a stability)
        #[arg(long)]
        at: String,
    },
    /// List the versions provided by a directory of resources
    Versions {
        /// Directory containing versioned resources
        spec_dir: PathBuf,
    },
    /// Compile aggregate versioned specs for the project's APIs
    Build {
        #[arg(short, long, default_value = "vervet.yaml")]
        config: PathBuf,
    },
}

pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match &cli.command {
        Commands::Resolve { spec_dir, at } => {
            let spec_versions = load_spec_versions(spec_dir)
                .with_context(|| format!("failed to load {}", spec_dir.display()))?;
            let version = Version::parse_query(at, chrono::Utc::now().date_naive())?;
            let spec = spec_versions.at(&version)?;
            print!("{}", to_spec_yaml(&spec)?);
            let url = Url::parse("vervet:///resolved").expect("static URL");
            Document::from_value(url, spec)?
                .validate(&CancelToken::new())
                .context("spec validation failed")?;
            Ok(())
        }
        Commands::Versions { spec_dir } => {
            let spec_versions = load_spec_versions(spec_dir)
                .with_context(|| format!("failed to load {}", spec_dir.display()))?;
            for version in spec_versions.versions() {
                println!("{version}");
            }
            Ok(())
        }
        Commands::Build { config } => {
            let project = Project::from_file(config)
                .with_context(|| format!("failed to load {}", config.display()))?;
            if let Some(dir) = config.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::env::set_current_dir(dir)?;
            }
            let compiler = Compiler::new(&project)?;
            compiler.build_all()?;
            Ok(())
        }
    }
}
