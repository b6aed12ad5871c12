use thiserror::Error;

use loadline_core::StoreError;

pub mod call;
pub mod carrier;
pub mod load;

pub use call::SqlCallStore;
pub use carrier::SqlCarrierStore;
pub use load::{LoadSearch, SqlLoadCatalog};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => StoreError::Unavailable(error.to_string()),
            RepositoryError::Decode(message) => StoreError::Decode(message),
        }
    }
}

pub(crate) fn db_err(error: sqlx::Error) -> StoreError {
    RepositoryError::Database(error).into()
}

pub(crate) fn decode_err(message: impl Into<String>) -> StoreError {
    RepositoryError::Decode(message.into()).into()
}
