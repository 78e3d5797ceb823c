use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};

pub type DocId = u32;
pub type DocCount = u32;
pub type TermCount = u32;

/// Term names are opaque byte strings compared byte-wise.
pub type TermName = Vec<u8>;

/// Past-the-end marker for any list; never a stored document id.
pub const DOC_ID_END: DocId = u32::MAX;

pub const MAX_TERM_LEN: usize = 255;

pub fn is_valid_doc_id(doc_id: DocId) -> bool {
    doc_id != 0 && doc_id != DOC_ID_END
}

pub fn validate_term(term: &[u8]) -> Result<()> {
    if term.is_empty() || term.len() > MAX_TERM_LEN {
        return Err(IndexError::InvalidInput(format!(
            "term length {} outside 1..={MAX_TERM_LEN}",
            term.len()
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Posting {
    pub doc_id: DocId,
    pub weight: f32,
}

/// Location of a term's posting run inside the postings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingsPointer {
    pub(crate) offset: usize,
    pub(crate) len: usize,
}

/// Dictionary metadata for one term. Immutable once decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermInfo {
    pub termfreq: DocCount,
    pub postings: PostingsPointer,
}

/// One entry of a document's term vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermEntry {
    pub term: TermName,
    pub wdf: TermCount,
    pub termfreq: DocCount,
}

/// Raw stored record for a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub doc_id: DocId,
    /// Sum of wdf over the document's terms.
    pub length: TermCount,
    pub data: Vec<u8>,
}

/// Record payload written by the indexer CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocMeta {
    pub external_id: String,
    pub title: String,
    pub url: Option<String>,
}

impl DocMeta {
    pub fn to_record(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| IndexError::InvalidInput(e.to_string()))
    }

    pub fn from_record(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| IndexError::corrupt(format!("document record: {e}")))
    }
}

impl Document {
    pub fn meta(&self) -> Result<DocMeta> {
        DocMeta::from_record(&self.data)
    }
}
