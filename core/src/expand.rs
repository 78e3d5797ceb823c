//! Relevance-feedback query expansion.
//!
//! Every term list of the relevance set is drained into an accumulator of
//! `rtermfreq` per term, each candidate is scored by a pluggable weight, and
//! a bounded min-heap keeps the best `max_esize` of them.

use crate::database::Database;
use crate::error::{IndexError, Result};
use crate::index::{DocCount, DocId, TermName};
use crate::termlist::TermList;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};

/// Upper bound on the per-document pre-allocation taken from `approx_size`.
const RESERVE_HINT_CAP: usize = 1 << 16;

/// Accept/reject predicate over candidate term names.
pub trait ExpandDecider {
    fn want_term(&self, term: &[u8]) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ExpandDecider for AcceptAll {
    fn want_term(&self, _term: &[u8]) -> bool {
        true
    }
}

/// Rejects a fixed set of terms, typically those already in the query.
#[derive(Debug, Clone, Default)]
pub struct RejectTerms {
    terms: HashSet<TermName>,
}

impl RejectTerms {
    pub fn new<T: AsRef<[u8]>>(terms: impl IntoIterator<Item = T>) -> Self {
        Self { terms: terms.into_iter().map(|t| t.as_ref().to_vec()).collect() }
    }
}

impl ExpandDecider for RejectTerms {
    fn want_term(&self, term: &[u8]) -> bool {
        !self.terms.contains(term)
    }
}

impl<F: Fn(&[u8]) -> bool> ExpandDecider for F {
    fn want_term(&self, term: &[u8]) -> bool {
        self(term)
    }
}

/// Statistics available to a weighting function for one candidate.
#[derive(Debug, Clone, Copy)]
pub struct ExpandStats<'a> {
    pub term: &'a [u8],
    /// Relevant documents containing the term.
    pub rtermfreq: DocCount,
    /// Documents in the whole collection containing the term.
    pub termfreq: DocCount,
    pub rset_size: DocCount,
    pub doc_count: DocCount,
}

pub trait ExpandWeight {
    fn weight(&self, stats: &ExpandStats<'_>) -> f64;
}

/// Scores a term by the number of relevant documents containing it.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelevanceCount;

impl ExpandWeight for RelevanceCount {
    fn weight(&self, stats: &ExpandStats<'_>) -> f64 {
        f64::from(stats.rtermfreq)
    }
}

/// Robertson/Sparck-Jones relevance weight scaled by `rtermfreq`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RobertsonSelection;

impl ExpandWeight for RobertsonSelection {
    fn weight(&self, stats: &ExpandStats<'_>) -> f64 {
        let r = f64::from(stats.rtermfreq);
        let big_r = f64::from(stats.rset_size);
        let n = f64::from(stats.termfreq);
        let big_n = f64::from(stats.doc_count);
        // Each factor is >= 0.5 for consistent statistics; clamp for the rest.
        let num = (r + 0.5) * (big_n - big_r - n + r + 0.5).max(0.5);
        let den = (big_r - r + 0.5).max(0.5) * (n - r + 0.5).max(0.5);
        let mut tw = num / den;
        if tw < 2.0 {
            tw = tw / 2.0 + 1.0;
        }
        r * tw.ln()
    }
}

impl<F: Fn(&ExpandStats<'_>) -> f64> ExpandWeight for F {
    fn weight(&self, stats: &ExpandStats<'_>) -> f64 {
        self(stats)
    }
}

/// Documents judged relevant. Iterates in ascending doc id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RSet {
    docs: BTreeSet<DocId>,
}

impl RSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, doc_id: DocId) -> bool {
        self.docs.insert(doc_id)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = DocId> + '_ {
        self.docs.iter().copied()
    }
}

impl FromIterator<DocId> for RSet {
    fn from_iter<I: IntoIterator<Item = DocId>>(iter: I) -> Self {
        Self { docs: iter.into_iter().collect() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ESetItem {
    #[serde(serialize_with = "lossy_term")]
    pub term: TermName,
    pub weight: f64,
}

fn lossy_term<S: serde::Serializer>(term: &TermName, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&String::from_utf8_lossy(term))
}

/// Expansion terms, best first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ESet {
    pub items: Vec<ESetItem>,
    /// Accepted candidates that competed for a slot.
    pub ebound: usize,
}

impl ESet {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ESetItem> {
        self.items.iter()
    }

    pub fn terms(&self) -> impl Iterator<Item = &[u8]> {
        self.items.iter().map(|i| i.term.as_slice())
    }
}

/// What to do with relevance-set documents that are not in the database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDocPolicy {
    /// Propagate `DocNotFound`.
    #[default]
    Fail,
    /// Ignore the document; it does not count towards `rset_size`.
    Skip,
}

/// Heap entry ordered so that "greater" means "ranks higher":
/// larger score first, then smaller term bytes.
#[derive(Debug)]
struct Candidate {
    score: f64,
    term: TermName,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.term.cmp(&self.term))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Keeps the best `k` candidates; the worst kept one sits on top.
struct TopK {
    k: usize,
    heap: BinaryHeap<Reverse<Candidate>>,
}

impl TopK {
    fn new(k: usize) -> Self {
        Self { k, heap: BinaryHeap::with_capacity(k) }
    }

    fn offer(&mut self, candidate: Candidate) {
        if self.heap.len() < self.k {
            self.heap.push(Reverse(candidate));
        } else if let Some(mut worst) = self.heap.peek_mut() {
            if candidate > worst.0 {
                *worst = Reverse(candidate);
            }
        }
    }

    fn into_sorted(self) -> Vec<Candidate> {
        self.heap.into_sorted_vec().into_iter().map(|Reverse(c)| c).collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct Accumulated {
    rtermfreq: DocCount,
    termfreq: DocCount,
}

pub struct ExpansionEngine<'db> {
    db: &'db Database,
    missing_docs: MissingDocPolicy,
}

impl<'db> ExpansionEngine<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db, missing_docs: MissingDocPolicy::default() }
    }

    pub fn with_missing_docs(mut self, policy: MissingDocPolicy) -> Self {
        self.missing_docs = policy;
        self
    }

    /// Propose up to `max_esize` expansion terms for `rset`.
    pub fn expand(
        &self,
        rset: &RSet,
        max_esize: usize,
        decider: &dyn ExpandDecider,
        weight: &dyn ExpandWeight,
    ) -> Result<ESet> {
        if rset.is_empty() || max_esize == 0 {
            tracing::debug!(rset = rset.len(), max_esize, "nothing to expand");
            return Ok(ESet::default());
        }
        let (acc, rset_size) = self.accumulate(rset)?;
        let doc_count = self.db.doc_count();

        let mut top = TopK::new(max_esize);
        let mut ebound = 0;
        for (term, a) in acc {
            if !decider.want_term(&term) {
                continue;
            }
            let score = weight.weight(&ExpandStats {
                term: &term,
                rtermfreq: a.rtermfreq,
                termfreq: a.termfreq,
                rset_size,
                doc_count,
            });
            if score.is_nan() {
                tracing::debug!(term = %String::from_utf8_lossy(&term), "dropping NaN score");
                continue;
            }
            ebound += 1;
            top.offer(Candidate { score, term });
        }

        let items: Vec<ESetItem> = top
            .into_sorted()
            .into_iter()
            .map(|c| ESetItem { term: c.term, weight: c.score })
            .collect();
        tracing::info!(rset_size, ebound, esize = items.len(), "expanded relevance set");
        Ok(ESet { items, ebound })
    }

    fn accumulate(&self, rset: &RSet) -> Result<(HashMap<TermName, Accumulated>, DocCount)> {
        let mut acc: HashMap<TermName, Accumulated> = HashMap::new();
        let mut rset_size: DocCount = 0;
        for doc_id in rset.iter() {
            let mut tl = match self.db.open_term_list(doc_id) {
                Ok(tl) => tl,
                Err(IndexError::DocNotFound(missing)) if self.missing_docs == MissingDocPolicy::Skip => {
                    tracing::warn!(doc_id = missing, "skipping relevance document missing from database");
                    continue;
                }
                Err(e) => return Err(e),
            };
            rset_size += 1;
            acc.reserve((tl.approx_size() as usize).min(RESERVE_HINT_CAP));
            tl.next()?;
            while !tl.at_end()? {
                let term = tl.current_term()?;
                match acc.get_mut(term) {
                    Some(a) => a.rtermfreq += 1,
                    None => {
                        let termfreq = tl.current_termfreq()?;
                        acc.insert(term.to_vec(), Accumulated { rtermfreq: 1, termfreq });
                    }
                }
                tl.next()?;
            }
        }
        Ok((acc, rset_size))
    }
}
