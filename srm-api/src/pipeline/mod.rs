//! Import and export pipelines
//!
//! Import replaces the whole collection from a document and renumbers display
//! identifiers `1..N` in document order. Export reads every record ordered by
//! display identifier and encodes it.

pub mod export;
pub mod import;

pub use export::{export_document, ExportError};
pub use import::{import_document, ImportError, ImportMode, ImportProgress, ImportReport, ImportStage};
