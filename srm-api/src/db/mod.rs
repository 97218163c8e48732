//! Database access layer for srm-api
//!
//! - `students`: the record store
//! - `sequence`: persistent display identifier allocation

pub mod sequence;
pub mod students;

pub use sequence::{SequenceAllocator, STUDENT_SEQUENCE};
pub use students::{StoreError, StudentStore};
