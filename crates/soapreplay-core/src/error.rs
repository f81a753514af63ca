//! Error types for a replay generation run

use soapreplay_codegen::CodegenError;
use soapreplay_contract::{ContractError, DeserializeError};
use soapreplay_trace::TraceError;
use std::path::PathBuf;

/// Fatal errors of a run; nothing is written once one is raised
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// Trace structure or envelope failure
    #[error("trace error: {0}")]
    Trace(#[from] TraceError),

    /// Type container or type-name failure
    #[error("contract error: {0}")]
    Contract(#[from] ContractError),

    /// Parameter reconstruction failure
    #[error("deserialization error: {0}")]
    Deserialize(#[from] DeserializeError),

    /// Source generation failure
    #[error("code generation error: {0}")]
    Codegen(#[from] CodegenError),

    /// Invalid run configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// No reader registered under the configured name
    #[error("unknown trace reader '{name}' (available: {available})")]
    UnknownReader { name: String, available: String },

    /// Nothing usable was left after filtering and resolution
    #[error("no calls could be generated from trace {file}")]
    NoCalls { file: PathBuf },

    /// File could not be opened or written
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReplayError {
    /// Create configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create I/O error for `path`
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error comes from the run configuration
    #[inline]
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::UnknownReader { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_cause() {
        let err = ReplayError::config("no trace file");
        assert_eq!(err.to_string(), "configuration error: no trace file");
        assert!(err.is_config());

        let err = ReplayError::NoCalls {
            file: PathBuf::from("calls.svclog"),
        };
        assert!(err.to_string().contains("calls.svclog"));
        assert!(!err.is_config());
    }

    #[test]
    fn wraps_lower_layers() {
        let err: ReplayError = TraceError::NotSetUp.into();
        assert!(matches!(err, ReplayError::Trace(_)));

        let err: ReplayError = CodegenError::Unsupported("multi-rank".into()).into();
        assert!(err.to_string().starts_with("code generation error"));
    }
}
