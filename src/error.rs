use std::path::PathBuf;

use crate::catalog::{CatalogError, LookupError};
use crate::convert::Unconvertible;
use crate::diagnostics::Position;

/// Everything a generation request can fail with. Generation is
/// all-or-nothing: any of these means no output was produced.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("can't find {name}: {source}")]
    Lookup { name: String, source: LookupError },

    #[error("can't find field replacement type {name}: {source}")]
    OverrideLookup { name: String, source: LookupError },

    #[error("{pos}: override field {name} must be a named, exported field")]
    OverrideShape { pos: Position, name: String },

    #[error("{pos}: no matching field for {name} in original type {owner}")]
    NoMatchingField { pos: Position, name: String, owner: String },

    #[error("{pos}: invalid field override: {reason}")]
    InvalidOverride { pos: Position, reason: Unconvertible },

    #[error("unknown format {0:?} (expected json or yaml)")]
    UnknownFormat(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("formatter failed: {0}")]
    Format(String),

    #[error("can't access {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("{}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },
}
