/// Storage-layer errors for SQLite operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    Sqlite { message: String },

    #[error("migration failed at version {version}: {reason}")]
    MigrationFailed { version: u32, reason: String },

    #[error("database corruption detected: {details}")]
    Corrupt { details: String },

    #[error("constraint violation: {what}")]
    ConstraintViolation { what: String },

    #[error("not found: {id}")]
    NotFound { id: String },

    #[error("legacy vector dump not in any recognized layout: {details}")]
    LegacyFormatUnrecognized { details: String },
}
