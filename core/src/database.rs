//! Read-only database handle over the postings and term-vector stores.

use crate::dictionary::TermDictionary;
use crate::error::{IndexError, Result};
use crate::index::{DocCount, DocId, Document, TermCount};
use crate::persist::IndexPaths;
use crate::postlist::{DaPostList, PostingList};
use crate::store::{StoreFile, StoreKind};
use crate::termlist::{DaTermList, TermList};
use crate::termvec::TermVectorStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseParams {
    /// Directory holding `postings.db` and `termvec.db`.
    pub root: PathBuf,
}

impl DatabaseParams {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Safe to share across threads; the iterators it hands out are not.
pub struct Database {
    dictionary: TermDictionary,
    termvecs: TermVectorStore,
    doc_count: DocCount,
}

impl Database {
    /// Open both stores. Either one missing, corrupt, or disagreeing with the
    /// other fails the whole open.
    pub fn open(params: &DatabaseParams) -> Result<Self> {
        let paths = IndexPaths::new(&params.root);
        let postings = StoreFile::open(&paths.postings(), StoreKind::Postings)?;
        let termvecs = StoreFile::open(&paths.termvecs(), StoreKind::TermVectors)?;
        let doc_count = termvecs.header().doc_count;
        if postings.header().doc_count != doc_count || termvecs.entry_count() != doc_count as usize {
            return Err(IndexError::DatabaseOpen(format!(
                "{}: postings store counts {} documents, term-vector store {} ({} records)",
                paths.root.display(),
                postings.header().doc_count,
                doc_count,
                termvecs.entry_count()
            )));
        }
        tracing::info!(
            root = %paths.root.display(),
            doc_count,
            terms = postings.entry_count(),
            "opened database"
        );
        Ok(Self {
            dictionary: TermDictionary::new(postings),
            termvecs: TermVectorStore::new(termvecs),
            doc_count,
        })
    }

    pub fn doc_count(&self) -> DocCount {
        self.doc_count
    }

    pub fn avg_doc_length(&self) -> f64 {
        if self.doc_count == 0 {
            return 0.0;
        }
        self.termvecs.total_length() as f64 / f64::from(self.doc_count)
    }

    pub fn doc_length(&self, doc_id: DocId) -> Result<TermCount> {
        Ok(self.termvecs.record(doc_id)?.length)
    }

    pub fn dictionary(&self) -> &TermDictionary {
        &self.dictionary
    }

    pub fn term_exists(&self, term: &[u8]) -> bool {
        self.dictionary.term_exists(term)
    }

    /// Document frequency via a throwaway posting list; absent terms count 0.
    pub fn term_frequency(&self, term: &[u8]) -> Result<DocCount> {
        match self.open_posting_list(term) {
            Ok(pl) => Ok(pl.termfreq()),
            Err(e) if e.is_not_found() => Ok(0),
            Err(e) => Err(e),
        }
    }

    pub fn open_posting_list(&self, term: &[u8]) -> Result<Box<dyn PostingList>> {
        let info = self.dictionary.lookup(term)?;
        let store = self.dictionary.store().shared();
        Ok(Box::new(DaPostList::new(term.to_vec(), info, store)))
    }

    pub fn open_term_list(&self, doc_id: DocId) -> Result<Box<dyn TermList + '_>> {
        let record = self.termvecs.record(doc_id)?;
        Ok(Box::new(DaTermList::new(&self.dictionary, record.term_count, record.entries)))
    }

    pub fn open_document(&self, doc_id: DocId) -> Result<Document> {
        let record = self.termvecs.record(doc_id)?;
        Ok(Document { doc_id, length: record.length, data: record.data.to_vec() })
    }

    /// Stored document ids in ascending order.
    pub fn doc_ids(&self) -> impl Iterator<Item = Result<DocId>> + '_ {
        self.termvecs.doc_ids()
    }

    pub fn make_term(&self, _term: &[u8]) -> Result<()> {
        Err(IndexError::NotImplemented("Database::make_term on read-only backend"))
    }

    pub fn make_doc(&self, _data: &[u8]) -> Result<DocId> {
        Err(IndexError::NotImplemented("Database::make_doc on read-only backend"))
    }

    pub fn make_posting(&self, _term: &[u8], _doc_id: DocId, _position: TermCount) -> Result<()> {
        Err(IndexError::NotImplemented("Database::make_posting on read-only backend"))
    }
}
