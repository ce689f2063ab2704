use serde_json::Value;

/// The full domain error taxonomy (spec §7). `kb-schema::SchemaError` and
/// `kb-query::QueryError` fold into `Validation` at this boundary.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("{message}")]
    Validation { message: String, payload: Option<Value> },

    #[error("{message}")]
    NoRecordFound { message: String, payload: Option<Value> },

    #[error("{message}")]
    MultipleRecordsFound { message: String, payload: Option<Value> },

    #[error("{message}")]
    RecordExists { message: String, payload: Option<Value> },

    #[error("{message}")]
    Permission { message: String, payload: Option<Value> },

    #[error("{message}")]
    Authentication { message: String, payload: Option<Value> },

    #[error("{message}")]
    NotImplemented { message: String, payload: Option<Value> },

    #[error("{message}")]
    DatabaseConnection { message: String, payload: Option<Value> },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation { message: message.into(), payload: None }
    }

    pub fn no_record_found(message: impl Into<String>) -> Self {
        DomainError::NoRecordFound { message: message.into(), payload: None }
    }

    pub fn multiple_records_found(message: impl Into<String>) -> Self {
        DomainError::MultipleRecordsFound { message: message.into(), payload: None }
    }

    pub fn record_exists(message: impl Into<String>) -> Self {
        DomainError::RecordExists { message: message.into(), payload: None }
    }

    pub fn permission(message: impl Into<String>) -> Self {
        DomainError::Permission { message: message.into(), payload: None }
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        DomainError::NotImplemented { message: message.into(), payload: None }
    }

    pub fn database_connection(message: impl Into<String>) -> Self {
        DomainError::DatabaseConnection { message: message.into(), payload: None }
    }

    /// The kind name, as surfaced in the `{name, message, ...}` wire
    /// payload of spec.md §7.
    pub fn name(&self) -> &'static str {
        match self {
            DomainError::Validation { .. } => "ValidationError",
            DomainError::NoRecordFound { .. } => "NoRecordFoundError",
            DomainError::MultipleRecordsFound { .. } => "MultipleRecordsFoundError",
            DomainError::RecordExists { .. } => "RecordExistsError",
            DomainError::Permission { .. } => "PermissionError",
            DomainError::Authentication { .. } => "AuthenticationError",
            DomainError::NotImplemented { .. } => "NotImplementedError",
            DomainError::DatabaseConnection { .. } => "DatabaseConnectionError",
        }
    }

    /// The HTTP status the (excluded) routing layer should map this to
    /// (spec.md §6).
    pub fn status_hint(&self) -> u16 {
        match self {
            DomainError::Validation { .. } => 400,
            DomainError::Authentication { .. } => 401,
            DomainError::Permission { .. } => 403,
            DomainError::NoRecordFound { .. } => 404,
            DomainError::RecordExists { .. } => 409,
            DomainError::NotImplemented { .. } => 501,
            DomainError::MultipleRecordsFound { .. } | DomainError::DatabaseConnection { .. } => 500,
        }
    }

    /// Whether this error class may be retried once by the session layer
    /// (spec §7 Propagation: infrastructure errors, not recoverable ones).
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::DatabaseConnection { .. })
    }
}

impl From<kb_schema::SchemaError> for DomainError {
    fn from(err: kb_schema::SchemaError) -> Self {
        DomainError::Validation { message: err.to_string(), payload: None }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
