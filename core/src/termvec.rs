//! Per-document records: stored data plus the encoded term vector.

use crate::codec::Reader;
use crate::error::{IndexError, Result};
use crate::index::{DocId, TermCount};
use crate::store::StoreFile;
use std::cmp::Ordering;

// length byte, one term byte, one wdf byte
const MIN_ENTRY_LEN: usize = 3;

/// Borrowed view of one decoded record header.
#[derive(Debug, Clone, Copy)]
pub struct DocRecord<'a> {
    pub doc_id: DocId,
    pub length: TermCount,
    pub data: &'a [u8],
    pub term_count: TermCount,
    pub entries: &'a [u8],
}

pub struct TermVectorStore {
    store: StoreFile,
}

impl TermVectorStore {
    pub fn new(store: StoreFile) -> Self {
        Self { store }
    }

    pub fn doc_count(&self) -> usize {
        self.store.entry_count()
    }

    pub fn total_length(&self) -> u64 {
        self.store.header().total_length
    }

    fn slot(&self, idx: usize) -> Result<(DocId, u64)> {
        let mut r = self.store.directory_slot(idx);
        Ok((r.read_u32_le()?, r.read_u64_le()?))
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = Result<DocId>> + '_ {
        (0..self.doc_count()).map(move |idx| self.slot(idx).map(|(doc_id, _)| doc_id))
    }

    pub fn record(&self, doc_id: DocId) -> Result<DocRecord<'_>> {
        let (mut lo, mut hi) = (0usize, self.doc_count());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let (found, raw) = self.slot(mid)?;
            match found.cmp(&doc_id) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return self.decode(doc_id, raw),
            }
        }
        Err(IndexError::DocNotFound(doc_id))
    }

    fn decode(&self, doc_id: DocId, raw: u64) -> Result<DocRecord<'_>> {
        let offset = self.store.record_offset(raw)?;
        let mut r = Reader::at(self.store.records(), offset);
        let length = r.read_varint_u32()?;
        let data_len = r.read_len()?;
        let data = r.read_bytes(data_len)?;
        let term_count = r.read_varint_u32()?;
        let entries_len = r.read_len()?;
        if term_count as usize > entries_len / MIN_ENTRY_LEN {
            return Err(IndexError::corrupt(format!(
                "doc {doc_id} claims {term_count} terms in {entries_len} bytes"
            )));
        }
        let entries = r.read_bytes(entries_len)?;
        Ok(DocRecord { doc_id, length, data, term_count, entries })
    }
}
