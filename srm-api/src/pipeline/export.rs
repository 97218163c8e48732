//! Export pipeline: read all records, encode

use thiserror::Error;
use tracing::info;

use crate::codec::{self, EncodeError};
use crate::db::{StoreError, StudentStore};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to read records: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to encode document: {0}")]
    Encode(#[from] EncodeError),
}

/// Encode every stored record ordered by display identifier
///
/// Read-only: the store is never modified, whether or not export succeeds.
pub async fn export_document(store: &StudentStore) -> Result<Vec<u8>, ExportError> {
    let records = store.list_all().await?;
    let document = codec::encode(&records)?;

    info!(
        count = records.len(),
        bytes = document.len(),
        "Export: document encoded"
    );

    Ok(document)
}
