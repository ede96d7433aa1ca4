use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("LMDB error: {0}")]
    Heed(#[from] heed::Error),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

impl From<LmdbError> for windex_store::StoreError {
    fn from(e: LmdbError) -> Self {
        match e {
            LmdbError::NotFound(key) => windex_store::StoreError::NotFound(key),
            LmdbError::Serialization(e) => windex_store::StoreError::Serialization(e.to_string()),
            LmdbError::Heed(e) => windex_store::StoreError::Backend(e.to_string()),
        }
    }
}
