//! Error types for contract metadata and deserialization

use std::path::PathBuf;

/// Errors from type names and type containers
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// Type name does not follow the type-name grammar
    #[error("invalid type name '{input}': {reason}")]
    InvalidTypeRef { input: String, reason: String },

    /// Type container file could not be read
    #[error("type container {path} could not be loaded: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Type container file is not a valid manifest
    #[error("type container {path} is not a valid manifest: {message}")]
    Manifest { path: PathBuf, message: String },
}

impl ContractError {
    /// Create invalid type-name error
    pub fn invalid_type(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTypeRef {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create manifest error
    pub fn manifest(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Manifest {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Errors while rebuilding call parameters from a message body
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    /// Body has no element where the operation's wrapper was expected
    #[error("message body for '{operation}' is empty")]
    EmptyBody { operation: String },

    /// Element text cannot be read as the expected type
    #[error("cannot read '{text}' as {ty}")]
    InvalidValue { ty: String, text: String },

    /// Type is not described by any loaded container
    #[error("type '{0}' is not known to any loaded type container")]
    UnknownType(String),

    /// `xsi:type` names a type that cannot be resolved
    #[error("cannot resolve xsi:type '{0}'")]
    UnknownXsiType(String),

    /// Type cannot be read with the active serialization rules
    #[error("type '{ty}' is not serializable with {strategy} rules")]
    NotSerializable { ty: String, strategy: String },

    /// Dataset payload is malformed
    #[error("invalid dataset payload: {0}")]
    DataSet(String),
}

impl DeserializeError {
    /// Create invalid-value error
    pub fn invalid(ty: impl ToString, text: impl Into<String>) -> Self {
        Self::InvalidValue {
            ty: ty.to_string(),
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_error_names_path() {
        let err = ContractError::manifest("calc.json", "missing field `name`");
        assert_eq!(
            err.to_string(),
            "type container calc.json is not a valid manifest: missing field `name`"
        );
    }

    #[test]
    fn invalid_value_display() {
        let err = DeserializeError::invalid("int", "abc");
        assert_eq!(err.to_string(), "cannot read 'abc' as int");
    }
}
