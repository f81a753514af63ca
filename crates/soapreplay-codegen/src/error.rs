//! Error types for code generation

/// Errors while turning captured values into construction code
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    /// Nesting exceeded the generator's depth ceiling
    #[error("object graph for '{target}' is nested deeper than {limit} levels (possible cycle)")]
    DepthExceeded { limit: usize, target: String },

    /// Runtime type of a value cannot be stored in the declared slot
    #[error("value for '{target}' has type {runtime}, which does not fit declared type {declared}")]
    TypeMismatch {
        target: String,
        declared: String,
        runtime: String,
    },

    /// Nullable wrapper on one side only, or a different wrapped type
    #[error("value for '{target}' has type {runtime}, which does not match nullable type {declared}")]
    NullableMismatch {
        target: String,
        declared: String,
        runtime: String,
    },

    /// Compound type cannot be rebuilt under the active member rules
    #[error("type '{ty}' is not serializable with {strategy} rules")]
    NotSerializable { ty: String, strategy: String },

    /// Shape the generator does not construct
    #[error("unsupported value: {0}")]
    Unsupported(String),

    /// Compound type is missing from every loaded container
    #[error("type '{0}' is not known to any loaded type container")]
    UnknownType(String),
}

impl CodegenError {
    /// Create type-mismatch error
    pub fn mismatch(target: impl Into<String>, declared: impl ToString, runtime: impl ToString) -> Self {
        Self::TypeMismatch {
            target: target.into(),
            declared: declared.to_string(),
            runtime: runtime.to_string(),
        }
    }

    /// Create nullable-mismatch error
    pub fn nullable_mismatch(target: impl Into<String>, declared: impl ToString, runtime: impl ToString) -> Self {
        Self::NullableMismatch {
            target: target.into(),
            declared: declared.to_string(),
            runtime: runtime.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_error_mentions_cycle() {
        let err = CodegenError::DepthExceeded {
            limit: 20,
            target: "order".into(),
        };
        assert!(err.to_string().contains("possible cycle"));
    }

    #[test]
    fn mismatch_display() {
        let err = CodegenError::mismatch("a", "int", "string");
        assert_eq!(
            err.to_string(),
            "value for 'a' has type string, which does not fit declared type int"
        );
    }
}
