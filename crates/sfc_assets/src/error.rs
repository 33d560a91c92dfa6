//! Error types for the asset pipeline.
//!
//! Fatal failures are [`Error`] values and abort the document transform that
//! produced them. Stale graph edges found while assembling bundles are not
//! fatal; they surface as [`AssemblyGraphWarning`]s alongside the output.

use std::io;
use std::path::PathBuf;

use crate::document::Span;

/// Boxed error returned by user-supplied collaborators (transformers, scopers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An external stylesheet reference could not be read from disk.
    #[error("cannot resolve stylesheet `{}`", path.display())]
    ResourceResolution {
        path: PathBuf,
        span: Option<Span>,
        #[source]
        source: io::Error,
    },

    /// The external preprocessing transformer rejected the resource.
    #[error("transform of `{path}` failed: {source}")]
    Transform {
        path: String,
        span: Option<Span>,
        #[source]
        source: BoxError,
    },

    /// A source map handed to the pipeline is structurally invalid.
    #[error("invalid source map for `{path}`: {message}")]
    MapComposition { path: String, message: String },

    /// The CSS scoping collaborator failed.
    #[error("cannot scope `{path}`: {message}")]
    Scope { path: String, message: String },

    /// Two different contents were registered under the same virtual path.
    #[error("virtual module `{path}` is already registered with different content")]
    VirtualModuleCollision { path: String },

    /// The code generator collaborator failed.
    #[error("code generation failed: {message}")]
    Codegen { message: String },
}

impl Error {
    /// The template span the error points at, when one is known.
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::ResourceResolution { span, .. } | Self::Transform { span, .. } => *span,
            _ => None,
        }
    }

    pub(crate) fn map_composition(path: &str, message: impl ToString) -> Self {
        Self::MapComposition {
            path: path.to_string(),
            message: message.to_string(),
        }
    }
}

/// A module id returned by the host graph that the host itself cannot describe.
///
/// Expected transiently during incremental rebuilds; the edge is skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("module `{module}` is unknown to the module graph")]
pub struct AssemblyGraphWarning {
    /// The module whose import list named `module`; `None` for an entry.
    pub importer: Option<String>,
    pub module: String,
}
