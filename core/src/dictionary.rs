//! Term name -> TermInfo lookup over the postings store.
//!
//! The store directory is sorted by term bytes, so a lookup is a binary
//! search that decodes only the keys it touches. Decoded metadata is cached
//! for the life of the handle; the store never changes, so the cache never
//! evicts and racing writers always insert the same value.

use crate::codec::Reader;
use crate::error::{IndexError, Result};
use crate::index::{validate_term, PostingsPointer, TermInfo, TermName};
use crate::store::StoreFile;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;

pub struct TermDictionary {
    store: StoreFile,
    cache: RwLock<HashMap<TermName, TermInfo>>,
}

impl TermDictionary {
    pub fn new(store: StoreFile) -> Self {
        Self { store, cache: RwLock::new(HashMap::new()) }
    }

    pub fn lookup(&self, term: &[u8]) -> Result<TermInfo> {
        if let Some(info) = self.cache.read().get(term) {
            return Ok(*info);
        }
        if validate_term(term).is_err() {
            return Err(IndexError::term_not_found(term));
        }
        let info = self.find(term)?.ok_or_else(|| IndexError::term_not_found(term))?;
        let mut cache = self.cache.write();
        let cached = *cache.entry(term.to_vec()).or_insert(info);
        tracing::debug!(term = %String::from_utf8_lossy(term), termfreq = cached.termfreq, "cached terminfo");
        Ok(cached)
    }

    /// Never fails: misses and decode problems both read as "absent".
    pub fn term_exists(&self, term: &[u8]) -> bool {
        match self.lookup(term) {
            Ok(_) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                tracing::warn!(error = %e, "term_exists treating unreadable entry as absent");
                false
            }
        }
    }

    pub fn term_count(&self) -> usize {
        self.store.entry_count()
    }

    pub fn cached_terms(&self) -> usize {
        self.cache.read().len()
    }

    pub(crate) fn store(&self) -> &StoreFile {
        &self.store
    }

    /// All term names in store order. Does not touch the cache.
    pub fn terms(&self) -> impl Iterator<Item = Result<TermName>> + '_ {
        (0..self.term_count()).map(move |idx| {
            let mut r = self.record(idx)?;
            Ok(r.read_term_key()?.to_vec())
        })
    }

    fn record(&self, idx: usize) -> Result<Reader<'_>> {
        let raw = self.store.directory_slot(idx).read_u64_le()?;
        let offset = self.store.record_offset(raw)?;
        Ok(Reader::at(self.store.records(), offset))
    }

    fn find(&self, term: &[u8]) -> Result<Option<TermInfo>> {
        let (mut lo, mut hi) = (0usize, self.term_count());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let mut r = self.record(mid)?;
            match r.read_term_key()?.cmp(term) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return decode_info(&mut r).map(Some),
            }
        }
        Ok(None)
    }
}

fn decode_info(r: &mut Reader<'_>) -> Result<TermInfo> {
    let termfreq = r.read_varint_u32()?;
    let len = r.read_len()?;
    let offset = r.position();
    r.read_bytes(len)?;
    if termfreq == 0 {
        return Err(IndexError::corrupt("term with zero document frequency"));
    }
    Ok(TermInfo { termfreq, postings: PostingsPointer { offset, len } })
}
