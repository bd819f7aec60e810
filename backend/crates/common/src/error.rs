use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubsyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type HubsyncResult<T> = Result<T, HubsyncError>;
