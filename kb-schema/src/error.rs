use serde_json::Value;

/// Errors raised while building or applying the schema model.
///
/// This is deliberately narrower than the full domain error taxonomy in
/// `kb-connector::error::DomainError` — callers at the `kb-core` boundary
/// fold every variant here into `DomainError::Validation`.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("unknown class '{0}'")]
    UnknownClass(String),

    #[error("unknown property '{property}' on class '{class}'")]
    UnknownProperty { class: String, property: String },

    #[error("property '{0}' is mandatory")]
    MissingMandatory(String),

    #[error("property '{0}' must not be empty")]
    EmptyNotAllowed(String),

    #[error("value {value} is not one of the allowed choices for property '{property}'")]
    InvalidChoice { property: String, value: Value },

    #[error("unexpected property '{0}'")]
    UnexpectedProperty(String),

    #[error("embedded value for property '{0}' is missing an explicit 'class' tag")]
    MissingEmbeddedClass(String),

    #[error("failed to cast value {value} for property '{property}': {reason}")]
    CastFailure {
        property: String,
        value: Value,
        reason: String,
    },

    #[error("schema class graph contains a cycle among: {0:?}")]
    Cycle(Vec<String>),

    #[error("class '{class}' does not match stored description: {reason}")]
    SchemaMismatch { class: String, reason: String },
}

pub type SchemaResult<T> = Result<T, SchemaError>;
