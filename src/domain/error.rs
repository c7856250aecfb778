use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("gateway auth: {0}")]
    Auth(String),

    #[error("gateway: {0}")]
    Gateway(String),

    #[error("malformed callback: {0}")]
    MalformedCallback(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("notification: {0}")]
    Notification(String),
}
