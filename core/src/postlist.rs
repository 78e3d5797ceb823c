//! Forward-only iteration over one term's postings.

use crate::codec::Reader;
use crate::error::{IndexError, Result};
use crate::index::{is_valid_doc_id, DocCount, DocId, Posting, TermInfo, TermName};
use std::sync::Arc;

/// External iterator over `(doc_id, weight)` in strictly increasing doc id order.
///
/// A fresh list is unstarted: call `next` or `skip_to` before reading the
/// current position. `w_min` lets ranking callers drop postings that can no
/// longer matter; pass `0.0` to see every posting.
pub trait PostingList: Send {
    /// Number of documents indexed by the term. Valid in any state.
    fn termfreq(&self) -> DocCount;

    fn next(&mut self, w_min: f32) -> Result<()>;

    /// Advance to the first posting with `doc_id >= did`. A target that is
    /// not ahead of the current position behaves as `next`.
    fn skip_to(&mut self, did: DocId, w_min: f32) -> Result<()>;

    fn current_doc_id(&self) -> Result<DocId>;

    fn current_weight(&self) -> Result<f32>;

    fn at_end(&self) -> Result<bool>;

    fn description(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Cursor {
    Unstarted,
    At(Posting),
    Ended,
}

/// Posting list decoding its run lazily out of the postings store arena.
pub struct DaPostList {
    term: TermName,
    termfreq: DocCount,
    bytes: Arc<[u8]>,
    pos: usize,
    end: usize,
    remaining: DocCount,
    last_doc: DocId,
    cursor: Cursor,
}

impl DaPostList {
    pub(crate) fn new(term: TermName, info: TermInfo, bytes: Arc<[u8]>) -> Self {
        let pos = info.postings.offset;
        Self {
            term,
            termfreq: info.termfreq,
            bytes,
            pos,
            end: pos + info.postings.len,
            remaining: info.termfreq,
            last_doc: 0,
            cursor: Cursor::Unstarted,
        }
    }

    fn decode_next(&mut self) -> Result<Option<Posting>> {
        if self.remaining == 0 {
            if self.pos != self.end {
                return Err(IndexError::corrupt(format!(
                    "{} trailing bytes after postings for {}",
                    self.end - self.pos,
                    self.description()
                )));
            }
            return Ok(None);
        }
        let (delta, weight, pos) = {
            let mut r = Reader::at(&self.bytes[..self.end], self.pos);
            (r.read_varint_u32()?, r.read_f32()?, r.position())
        };
        let doc_id = match self.last_doc.checked_add(delta) {
            Some(d) if delta > 0 && is_valid_doc_id(d) => d,
            _ => {
                return Err(IndexError::corrupt(format!(
                    "bad doc id delta {delta} after {} in {}",
                    self.last_doc,
                    self.description()
                )))
            }
        };
        self.pos = pos;
        self.remaining -= 1;
        self.last_doc = doc_id;
        Ok(Some(Posting { doc_id, weight }))
    }

    /// Decode until a posting satisfies `accept`, or the run ends.
    fn advance_until(&mut self, accept: impl Fn(&Posting) -> bool) -> Result<()> {
        loop {
            match self.decode_next()? {
                None => {
                    tracing::debug!(list = %self.description(), "postlist ended");
                    self.cursor = Cursor::Ended;
                    return Ok(());
                }
                Some(p) if accept(&p) => {
                    self.cursor = Cursor::At(p);
                    return Ok(());
                }
                Some(_) => {}
            }
        }
    }

    fn current(&self) -> Result<&Posting> {
        match &self.cursor {
            Cursor::At(p) => Ok(p),
            Cursor::Unstarted => Err(IndexError::illegal_state("postlist read before first advance")),
            Cursor::Ended => Err(IndexError::illegal_state("postlist read after end")),
        }
    }
}

fn passes(p: &Posting, w_min: f32) -> bool {
    w_min <= 0.0 || p.weight >= w_min
}

impl PostingList for DaPostList {
    fn termfreq(&self) -> DocCount {
        self.termfreq
    }

    fn next(&mut self, w_min: f32) -> Result<()> {
        if self.cursor == Cursor::Ended {
            return Err(IndexError::illegal_state("postlist next after end"));
        }
        self.advance_until(|p| passes(p, w_min))
    }

    fn skip_to(&mut self, did: DocId, w_min: f32) -> Result<()> {
        let cursor = self.cursor;
        match cursor {
            Cursor::Ended => Err(IndexError::illegal_state("postlist skip_to after end")),
            Cursor::At(p) if p.doc_id >= did => self.next(w_min),
            _ => self.advance_until(|p| p.doc_id >= did && passes(p, w_min)),
        }
    }

    fn current_doc_id(&self) -> Result<DocId> {
        self.current().map(|p| p.doc_id)
    }

    fn current_weight(&self) -> Result<f32> {
        self.current().map(|p| p.weight)
    }

    fn at_end(&self) -> Result<bool> {
        match self.cursor {
            Cursor::Unstarted => Err(IndexError::illegal_state("postlist at_end before first advance")),
            Cursor::At(_) => Ok(false),
            Cursor::Ended => Ok(true),
        }
    }

    fn description(&self) -> String {
        format!("{}:{}", String::from_utf8_lossy(&self.term), self.termfreq)
    }
}
