use crate::codec::{put_f32, put_term_key, put_varint};
use crate::error::{IndexError, Result};
use crate::index::{is_valid_doc_id, validate_term, DocId, TermCount, TermName};
use crate::store::{encode_store, StoreKind};
use crate::tokenizer::GeneratedTerm;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn postings(&self) -> PathBuf { self.root.join("postings.db") }
    pub fn termvecs(&self) -> PathBuf { self.root.join("termvec.db") }
}

/// What the builder stores as each posting's weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingWeighting {
    /// Raw within-document frequency.
    #[default]
    Wdf,
    /// Length-normalized `(1 + ln wdf) * idf`; smoothed uses `ln(1 + N/df)`.
    TfIdf { smoothed: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub doc_count: u32,
    pub term_count: u32,
    pub total_length: u64,
}

struct PendingDoc {
    data: Vec<u8>,
    terms: BTreeMap<TermName, TermCount>,
}

impl PendingDoc {
    fn length(&self) -> TermCount {
        self.terms.values().fold(0u32, |acc, wdf| acc.saturating_add(*wdf))
    }
}

/// Collects documents in memory and writes both store files.
///
/// This is the only write path; an opened `Database` is read-only.
#[derive(Default)]
pub struct IndexBuilder {
    docs: BTreeMap<DocId, PendingDoc>,
    weighting: PostingWeighting,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weighting(mut self, weighting: PostingWeighting) -> Self {
        self.weighting = weighting;
        self
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Add a document. Repeated terms have their wdf summed.
    pub fn add_document<T, I>(&mut self, doc_id: DocId, data: Vec<u8>, terms: I) -> Result<()>
    where
        T: AsRef<[u8]>,
        I: IntoIterator<Item = (T, TermCount)>,
    {
        if !is_valid_doc_id(doc_id) {
            return Err(IndexError::InvalidInput(format!("reserved doc id {doc_id}")));
        }
        if self.docs.contains_key(&doc_id) {
            return Err(IndexError::InvalidInput(format!("duplicate doc id {doc_id}")));
        }
        let mut acc: BTreeMap<TermName, TermCount> = BTreeMap::new();
        for (term, wdf) in terms {
            let term = term.as_ref();
            validate_term(term)?;
            if wdf == 0 {
                return Err(IndexError::InvalidInput(format!(
                    "zero wdf for {}",
                    String::from_utf8_lossy(term)
                )));
            }
            let slot = acc.entry(term.to_vec()).or_insert(0);
            *slot = slot.saturating_add(wdf);
        }
        self.docs.insert(doc_id, PendingDoc { data, terms: acc });
        Ok(())
    }

    /// Add a document from term generator output.
    pub fn add_generated(&mut self, doc_id: DocId, data: Vec<u8>, terms: &[GeneratedTerm]) -> Result<()> {
        self.add_document(doc_id, data, terms.iter().map(|t| (t.term.as_bytes(), t.wdf_inc)))
    }

    fn postings_by_term(&self) -> BTreeMap<&[u8], Vec<(DocId, TermCount)>> {
        let mut out: BTreeMap<&[u8], Vec<(DocId, TermCount)>> = BTreeMap::new();
        // docs iterate in id order, so each list comes out sorted
        for (doc_id, doc) in &self.docs {
            for (term, wdf) in &doc.terms {
                out.entry(term.as_slice()).or_default().push((*doc_id, *wdf));
            }
        }
        out
    }

    fn weights<'a>(
        &self,
        postings: &BTreeMap<&'a [u8], Vec<(DocId, TermCount)>>,
    ) -> BTreeMap<(&'a [u8], DocId), f32> {
        let smoothed = match self.weighting {
            PostingWeighting::Wdf => return BTreeMap::new(),
            PostingWeighting::TfIdf { smoothed } => smoothed,
        };
        let n = self.docs.len().max(1) as f32;
        let mut raw = BTreeMap::new();
        let mut norms: BTreeMap<DocId, f32> = BTreeMap::new();
        for (term, plist) in postings {
            let df = plist.len().max(1) as f32;
            let idf = if smoothed { (1.0 + n / df).ln() } else { (n / df).ln() };
            for (doc_id, wdf) in plist {
                let tf = 1.0 + (*wdf as f32).ln();
                let tfidf = tf * idf;
                *norms.entry(*doc_id).or_insert(0.0) += tfidf * tfidf;
                raw.insert((*term, *doc_id), tfidf);
            }
        }
        for ((_, doc_id), w) in raw.iter_mut() {
            let norm = norms.get(doc_id).map(|n| n.sqrt()).unwrap_or(0.0);
            if norm > 0.0 {
                *w /= norm;
            }
        }
        raw
    }

    /// Encode both stores: `(postings, termvecs)`.
    pub fn to_bytes(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let doc_count = u32::try_from(self.docs.len())
            .map_err(|_| IndexError::InvalidInput("too many documents".into()))?;
        let total_length: u64 = self.docs.values().map(|d| u64::from(d.length())).sum();

        let postings = self.postings_by_term();
        let weights = self.weights(&postings);
        let mut records = Vec::new();
        let mut offsets = Vec::with_capacity(postings.len());
        for (term, plist) in &postings {
            offsets.push(records.len() as u64);
            let mut run = Vec::new();
            let mut last = 0;
            for (doc_id, wdf) in plist {
                put_varint(&mut run, u64::from(doc_id - last));
                let weight = weights.get(&(*term, *doc_id)).copied().unwrap_or(*wdf as f32);
                put_f32(&mut run, weight);
                last = *doc_id;
            }
            put_term_key(&mut records, term);
            put_varint(&mut records, plist.len() as u64);
            put_varint(&mut records, run.len() as u64);
            records.extend_from_slice(&run);
        }
        let postings_bytes = encode_store(
            StoreKind::Postings,
            doc_count,
            total_length,
            offsets.len() as u32,
            &records,
            |base| offsets.iter().flat_map(|o| (o + base).to_le_bytes()).collect(),
        )?;

        let mut records = Vec::new();
        let mut slots = Vec::with_capacity(self.docs.len());
        for (doc_id, doc) in &self.docs {
            slots.push((*doc_id, records.len() as u64));
            let mut entries = Vec::new();
            for (term, wdf) in &doc.terms {
                put_term_key(&mut entries, term);
                put_varint(&mut entries, u64::from(*wdf));
            }
            put_varint(&mut records, u64::from(doc.length()));
            put_varint(&mut records, doc.data.len() as u64);
            records.extend_from_slice(&doc.data);
            put_varint(&mut records, doc.terms.len() as u64);
            put_varint(&mut records, entries.len() as u64);
            records.extend_from_slice(&entries);
        }
        let termvec_bytes = encode_store(
            StoreKind::TermVectors,
            doc_count,
            total_length,
            doc_count,
            &records,
            |base| {
                let mut dir = Vec::with_capacity(slots.len() * 12);
                for (doc_id, off) in &slots {
                    dir.extend_from_slice(&doc_id.to_le_bytes());
                    dir.extend_from_slice(&(off + base).to_le_bytes());
                }
                dir
            },
        )?;
        Ok((postings_bytes, termvec_bytes))
    }

    pub fn write(&self, paths: &IndexPaths) -> Result<BuildStats> {
        create_dir_all(&paths.root)?;
        let (postings, termvecs) = self.to_bytes()?;
        fs::write(paths.postings(), postings)?;
        fs::write(paths.termvecs(), termvecs)?;
        let stats = BuildStats {
            doc_count: self.docs.len() as u32,
            term_count: self.postings_by_term().len() as u32,
            total_length: self.docs.values().map(|d| u64::from(d.length())).sum(),
        };
        tracing::info!(root = %paths.root.display(), doc_count = stats.doc_count, term_count = stats.term_count, "wrote index");
        Ok(stats)
    }
}
