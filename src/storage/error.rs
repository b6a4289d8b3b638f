use thiserror::Error;

use crate::storage::record::RecordId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("temperature with id={0} not found")]
    NotFound(RecordId),
}
