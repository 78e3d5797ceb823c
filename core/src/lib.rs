//! Read-only inverted index backend with relevance-feedback query expansion.
//!
//! A [`Database`] owns two immutable store files: the postings store, keyed
//! by term, and the term-vector store, keyed by document. It hands out
//! [`PostingList`] and [`TermList`] iterators that decode on demand, and the
//! [`ExpansionEngine`] drains term lists of a relevance set to propose new
//! query terms.

pub mod codec;
pub mod database;
pub mod dictionary;
pub mod error;
pub mod expand;
pub mod index;
pub mod persist;
pub mod postlist;
pub mod store;
pub mod termlist;
pub mod termvec;
pub mod tokenizer;

pub use database::{Database, DatabaseParams};
pub use error::{IndexError, Result};
pub use expand::{
    AcceptAll, ESet, ESetItem, ExpandDecider, ExpandStats, ExpandWeight, ExpansionEngine,
    MissingDocPolicy, RSet, RejectTerms, RelevanceCount, RobertsonSelection,
};
pub use index::{
    DocCount, DocId, DocMeta, Document, Posting, TermCount, TermEntry, TermInfo, TermName,
    DOC_ID_END, MAX_TERM_LEN,
};
pub use persist::{BuildStats, IndexBuilder, IndexPaths, PostingWeighting};
pub use postlist::PostingList;
pub use termlist::TermList;
