use crate::fetcher::SyncResource;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to fetch {resource} page {page}: {message}")]
    Fetch {
        resource: SyncResource,
        page: u32,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("A sync pass is already in progress")]
    PassInProgress,

    #[error("Sync cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SyncError>;
