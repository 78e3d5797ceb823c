//! Forward-only iteration over one document's term vector.

use crate::codec::Reader;
use crate::dictionary::TermDictionary;
use crate::error::{IndexError, Result};
use crate::index::{DocCount, TermCount, TermEntry};

/// External iterator over `(term, wdf, termfreq)` for a single document.
///
/// Entries come out in the order the term vector was encoded (ascending
/// term bytes for stores written by `IndexBuilder`).
pub trait TermList {
    /// Cardinality hint, valid in any state. May overcount.
    fn approx_size(&self) -> TermCount;

    fn next(&mut self) -> Result<()>;

    fn current_term(&self) -> Result<&[u8]>;

    fn current_wdf(&self) -> Result<TermCount>;

    /// Collection document frequency of the current term.
    fn current_termfreq(&self) -> Result<DocCount>;

    fn at_end(&self) -> Result<bool>;
}

#[derive(Debug)]
enum Cursor {
    Unstarted,
    At(TermEntry),
    Ended,
}

pub struct DaTermList<'db> {
    dictionary: &'db TermDictionary,
    entries: Reader<'db>,
    approx_size: TermCount,
    remaining: TermCount,
    cursor: Cursor,
}

impl<'db> DaTermList<'db> {
    pub(crate) fn new(dictionary: &'db TermDictionary, term_count: TermCount, entries: &'db [u8]) -> Self {
        Self {
            dictionary,
            entries: Reader::new(entries),
            approx_size: term_count,
            remaining: term_count,
            cursor: Cursor::Unstarted,
        }
    }

    fn decode_next(&mut self) -> Result<Option<TermEntry>> {
        if self.remaining == 0 {
            if !self.entries.is_empty() {
                return Err(IndexError::corrupt(format!(
                    "{} trailing bytes after term vector",
                    self.entries.remaining()
                )));
            }
            return Ok(None);
        }
        let term = self.entries.read_term_key()?;
        let wdf = self.entries.read_varint_u32()?;
        if let Cursor::At(prev) = &self.cursor {
            if prev.term.as_slice() >= term {
                return Err(IndexError::corrupt("term vector out of order"));
            }
        }
        let termfreq = match self.dictionary.lookup(term) {
            Ok(info) => info.termfreq,
            Err(e) if e.is_not_found() => {
                return Err(IndexError::corrupt(format!(
                    "term vector references unknown term {}",
                    String::from_utf8_lossy(term)
                )))
            }
            Err(e) => return Err(e),
        };
        self.remaining -= 1;
        Ok(Some(TermEntry { term: term.to_vec(), wdf, termfreq }))
    }

    fn current(&self) -> Result<&TermEntry> {
        match &self.cursor {
            Cursor::At(entry) => Ok(entry),
            Cursor::Unstarted => Err(IndexError::illegal_state("termlist read before first next")),
            Cursor::Ended => Err(IndexError::illegal_state("termlist read after end")),
        }
    }
}

impl TermList for DaTermList<'_> {
    fn approx_size(&self) -> TermCount {
        self.approx_size
    }

    fn next(&mut self) -> Result<()> {
        if matches!(self.cursor, Cursor::Ended) {
            return Err(IndexError::illegal_state("termlist next after end"));
        }
        self.cursor = match self.decode_next()? {
            Some(entry) => Cursor::At(entry),
            None => {
                tracing::debug!(size = self.approx_size, "termlist ended");
                Cursor::Ended
            }
        };
        Ok(())
    }

    fn current_term(&self) -> Result<&[u8]> {
        self.current().map(|e| e.term.as_slice())
    }

    fn current_wdf(&self) -> Result<TermCount> {
        self.current().map(|e| e.wdf)
    }

    fn current_termfreq(&self) -> Result<DocCount> {
        self.current().map(|e| e.termfreq)
    }

    fn at_end(&self) -> Result<bool> {
        match self.cursor {
            Cursor::Unstarted => Err(IndexError::illegal_state("termlist at_end before first next")),
            Cursor::At(_) => Ok(false),
            Cursor::Ended => Ok(true),
        }
    }
}
