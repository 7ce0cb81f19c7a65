use thiserror::Error;

use super::types::PageId;

/// Database error types
#[derive(Error, Debug)]
pub enum BurrowError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page {0} not found")]
    PageNotFound(PageId),

    #[error("Buffer pool is full, no evictable frames available")]
    BufferPoolFull,

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Disk scheduler error: {0}")]
    DiskScheduler(String),

    #[error("Header page has no room for another index record")]
    HeaderFull,

    #[error("Index {0} not found in header page")]
    IndexNotFound(String),

    #[error("Invalid database file")]
    InvalidDatabaseFile,
}

pub type Result<T> = std::result::Result<T, BurrowError>;
