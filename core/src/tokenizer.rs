use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;
use std::collections::HashSet;

use crate::index::{TermCount, MAX_TERM_LEN};

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// One generated term: positions start at 1 and increase monotonically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedTerm {
    pub term: String,
    pub position: TermCount,
    pub wdf_inc: TermCount,
}

/// Turns free text into index terms using NFKC normalization, lowercase,
/// stopword removal, and English stemming.
///
/// Positions carry on across calls, so several fields of one document can be
/// fed through the same generator.
#[derive(Debug, Clone)]
pub struct TermGenerator {
    termpos: TermCount,
    max_word_length: usize,
}

impl Default for TermGenerator {
    fn default() -> Self {
        Self { termpos: 0, max_word_length: 64 }
    }
}

impl TermGenerator {
    pub fn new() -> Self { Self::default() }

    pub fn with_max_word_length(mut self, len: usize) -> Self {
        self.max_word_length = len.min(MAX_TERM_LEN);
        self
    }

    pub fn termpos(&self) -> TermCount { self.termpos }

    /// Leave a gap so phrases cannot match across field boundaries.
    pub fn increase_termpos(&mut self, delta: TermCount) {
        self.termpos = self.termpos.saturating_add(delta);
    }

    pub fn index_text(&mut self, text: &str, wdf_inc: TermCount) -> Vec<GeneratedTerm> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let mut terms = Vec::new();
        for mat in RE.find_iter(&normalized) {
            self.termpos = self.termpos.saturating_add(1);
            let token = mat.as_str();
            if is_stopword(token) || token.len() > self.max_word_length { continue; }
            let stem = STEMMER.stem(token).to_string();
            terms.push(GeneratedTerm { term: stem, position: self.termpos, wdf_inc });
        }
        terms
    }
}

/// Tokenize one span of text with a fresh generator and unit wdf increments.
pub fn tokenize(text: &str) -> Vec<GeneratedTerm> {
    TermGenerator::new().index_text(text, 1)
}
