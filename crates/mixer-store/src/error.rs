use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid stored value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
