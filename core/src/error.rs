use crate::DocId;
use thiserror::Error;

/// Errors surfaced by the read-only index backend and the expansion engine.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("failed to open database: {0}")]
    DatabaseOpen(String),

    #[error("term not found: {0}")]
    TermNotFound(String),

    #[error("document not found: {0}")]
    DocNotFound(DocId),

    #[error("illegal iterator state: {0}")]
    IllegalState(&'static str),

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    pub(crate) fn term_not_found(term: &[u8]) -> Self {
        IndexError::TermNotFound(String::from_utf8_lossy(term).into_owned())
    }

    /// Iterator protocol violations are programmer errors, so they are logged loudly.
    pub(crate) fn illegal_state(what: &'static str) -> Self {
        tracing::error!(what, "iterator protocol violation");
        IndexError::IllegalState(what)
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        IndexError::CorruptIndex(msg.into())
    }

    /// Expected lookup misses that callers are meant to branch on.
    pub fn is_not_found(&self) -> bool {
        matches!(self, IndexError::TermNotFound(_) | IndexError::DocNotFound(_))
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, IndexError::CorruptIndex(_))
    }
}
