use std::path::PathBuf;

/// Errors produced while resolving, compiling, or synthesizing an `asc:` import.
///
/// Every variant is fatal for the module being processed. The host decides
/// whether that aborts the whole build.
#[derive(Debug, thiserror::Error)]
pub enum AscError {
    /// The inner path of a tagged specifier could not be resolved by the host.
    #[error("Could not resolve `{specifier}`: {source}")]
    Resolve {
        specifier: String,
        #[source]
        source: anyhow::Error,
    },

    /// The compiler produced no binary, or reported a failed completion.
    /// `diagnostics` is the compiler's own output, unmodified.
    #[error("Failed to compile {}:\n{diagnostics}", module.display())]
    Compile { module: PathBuf, diagnostics: String },

    /// Invalid plugin configuration (matcher, URL pattern, option values).
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The compiler could not be made ready or could not be started.
    #[error("Compiler unavailable: {0}")]
    Compiler(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AscError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = AscError> = std::result::Result<T, E>;
