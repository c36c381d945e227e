pub mod record_store;

pub use record_store::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid section name: {0}")]
    InvalidSectionName(String),

    #[error("Internal lock error")]
    LockPoisoned,
}
