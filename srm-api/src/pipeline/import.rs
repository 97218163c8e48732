//! Import pipeline: decode, clear, reset, re-sequenced insert
//!
//! The default [`ImportMode::Sequential`] commits each step on its own. A
//! failure partway through the insert loop leaves the store cleared and
//! holding records `1..k-1`; re-running the import is the recovery path.
//!
//! [`ImportMode::Atomic`] runs the same steps inside one transaction and
//! rolls everything back on the first failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::{self, DecodeError};
use crate::db::students::{clear_in, insert_in};
use crate::db::{StoreError, StudentStore};
use crate::models::StudentFields;

/// How the store is repopulated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Each step commits independently (partial state on failure)
    #[default]
    Sequential,
    /// All steps in one transaction
    Atomic,
}

/// Last step an import committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStage {
    Decoded,
    Cleared,
    SequenceReset,
    Inserting,
    Completed,
}

/// Progress marker for an import in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportProgress {
    pub stage: ImportStage,
    /// Records committed so far
    pub inserted: usize,
    /// Records decoded from the document
    pub total: usize,
}

impl ImportProgress {
    fn new(total: usize) -> Self {
        Self {
            stage: ImportStage::Decoded,
            inserted: 0,
            total,
        }
    }
}

/// Successful import summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported_count: usize,
    pub mode: ImportMode,
    /// False when the sequence could not be reset and identifiers continued
    pub sequence_reset: bool,
}

#[derive(Debug, Error)]
pub enum ImportError {
    /// Document rejected; the store was not touched
    #[error("Invalid document: {0}")]
    Decode(#[from] DecodeError),

    /// Clear or transaction setup failed before any insert
    #[error("Import failed: {0}")]
    Store(#[from] StoreError),

    /// Sequential mode: record `index` (1-based) failed; records before it
    /// remain committed
    #[error("Import stopped at record {index}: {source}")]
    Partial {
        index: usize,
        progress: ImportProgress,
        source: StoreError,
    },

    /// Atomic mode: record `index` (1-based) failed; nothing was changed
    #[error("Import rolled back at record {index}: {source}")]
    RolledBack { index: usize, source: StoreError },
}

impl ImportError {
    /// 1-based position of the record that failed, if the insert loop was reached
    pub fn failed_index(&self) -> Option<usize> {
        match self {
            ImportError::Partial { index, .. } | ImportError::RolledBack { index, .. } => {
                Some(*index)
            }
            _ => None,
        }
    }

    /// Records left committed in the store after this failure
    pub fn imported_count(&self) -> usize {
        match self {
            ImportError::Partial { progress, .. } => progress.inserted,
            _ => 0,
        }
    }

    /// Underlying store error of a failed insert
    pub fn insert_error(&self) -> Option<&StoreError> {
        match self {
            ImportError::Partial { source, .. } | ImportError::RolledBack { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// Replace the collection with the records of `document`
///
/// Decode failures abort before the store is touched.
pub async fn import_document(
    store: &StudentStore,
    document: &[u8],
    mode: ImportMode,
) -> Result<ImportReport, ImportError> {
    let records = codec::decode(document)?;
    let mut progress = ImportProgress::new(records.len());
    info!(total = progress.total, ?mode, "Import: document decoded");

    let sequence_reset = match mode {
        ImportMode::Sequential => import_sequential(store, records, &mut progress).await?,
        ImportMode::Atomic => import_atomic(store, records, &mut progress).await?,
    };

    info!(count = progress.inserted, ?mode, sequence_reset, "Import: completed");
    Ok(ImportReport {
        imported_count: progress.inserted,
        mode,
        sequence_reset,
    })
}

async fn import_sequential(
    store: &StudentStore,
    records: Vec<StudentFields>,
    progress: &mut ImportProgress,
) -> Result<bool, ImportError> {
    let removed = store.clear().await?;
    progress.stage = ImportStage::Cleared;
    debug!(removed, "Import: store cleared");

    // Best effort: a failed reset is logged and the import continues
    let sequence_reset = match store.sequence().reset(store.pool()).await {
        Ok(()) => {
            progress.stage = ImportStage::SequenceReset;
            true
        }
        Err(e) => {
            warn!(
                sequence = store.sequence().name(),
                error = %e,
                "Import: sequence reset failed, identifiers continue from previous value"
            );
            false
        }
    };

    progress.stage = ImportStage::Inserting;
    for (i, fields) in records.into_iter().enumerate() {
        match store.insert(fields).await {
            Ok(record) => {
                progress.inserted += 1;
                debug!(index = i + 1, display_id = record.display_id, "Import: record inserted");
            }
            Err(source) => {
                warn!(
                    index = i + 1,
                    inserted = progress.inserted,
                    total = progress.total,
                    error = %source,
                    "Import: stopped, store left partially repopulated"
                );
                return Err(ImportError::Partial {
                    index: i + 1,
                    progress: *progress,
                    source,
                });
            }
        }
    }

    progress.stage = ImportStage::Completed;
    Ok(sequence_reset)
}

async fn import_atomic(
    store: &StudentStore,
    records: Vec<StudentFields>,
    progress: &mut ImportProgress,
) -> Result<bool, ImportError> {
    let mut tx = store.pool().begin().await.map_err(StoreError::from)?;

    let removed = clear_in(&mut tx).await?;
    progress.stage = ImportStage::Cleared;
    debug!(removed, "Import: store cleared (pending commit)");

    store
        .sequence()
        .reset(&mut *tx)
        .await
        .map_err(StoreError::from)?;
    progress.stage = ImportStage::SequenceReset;

    progress.stage = ImportStage::Inserting;
    for (i, fields) in records.into_iter().enumerate() {
        if let Err(source) = insert_in(&mut tx, store.sequence(), fields).await {
            warn!(
                index = i + 1,
                total = progress.total,
                error = %source,
                "Import: rolling back"
            );
            if let Err(e) = tx.rollback().await {
                warn!(error = %e, "Import: rollback failed");
            }
            progress.inserted = 0;
            return Err(ImportError::RolledBack {
                index: i + 1,
                source,
            });
        }
        progress.inserted += 1;
    }

    tx.commit().await.map_err(StoreError::from)?;
    progress.stage = ImportStage::Completed;
    Ok(true)
}
