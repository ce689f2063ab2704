use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Schema(#[from] kb_schema::SchemaError),

    #[error("invalid attribute path '{0}'")]
    InvalidPath(String),

    #[error("unknown edge class '{0}'")]
    UnknownEdge(String),

    #[error("unknown traversal direction '{0}'")]
    UnknownDirection(String),

    #[error("operator {operator} is not valid for property '{property}': {reason}")]
    InvalidOperator {
        property: String,
        operator: String,
        reason: String,
    },

    #[error("value {value} is not a valid operand for property '{property}': {reason}")]
    InvalidValue {
        property: String,
        value: Value,
        reason: String,
    },

    #[error("{field} must be in range [{min}, {max}], got {got}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        got: i64,
    },

    #[error("{0}")]
    Validation(String),
}

pub type QueryResult<T> = Result<T, QueryError>;
