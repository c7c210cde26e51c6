use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RouterError>;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Failed to read stdin: {0}")]
    StdinRead(#[source] io::Error),

    #[error("Failed to parse input JSON: {0}")]
    InputParse(#[from] serde_json::Error),

    #[error("Failed to read trigger registry from {path}: {source}")]
    RegistryRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse trigger registry {path}: {message}")]
    RegistryParse { path: PathBuf, message: String },

    #[error("skill-triggers.json not found in any of: {}", display_paths(.0))]
    TriggersNotFound(Vec<PathBuf>),

    #[error("No usable skills found in trigger registry")]
    NoSkills,

    #[error("Keyword index not found at {0}")]
    IndexNotFound(PathBuf),

    #[error("Failed to read keyword index from {path}: {source}")]
    IndexRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse keyword index: {0}")]
    IndexParse(String),

    #[error("Keyword index is stale (index mtime {index_mtime:.3}, triggers {triggers_mtime:.3})")]
    StaleIndex { index_mtime: f64, triggers_mtime: f64 },

    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Home directory not found")]
    NoHomeDir,
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
