//! Ranked full-text index over package metadata.
//!
//! Terms come from a package's name, description and tags. Each posting
//! remembers which field it came from; field boosts put tag matches ahead
//! of name or description matches with the same token overlap.

use std::collections::{BTreeMap, HashMap, HashSet};

/// Indexed package field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Description,
    Tags,
}

impl Field {
    pub fn boost(self) -> f64 {
        match self {
            Field::Name => 1.0,
            Field::Description => 1.0,
            Field::Tags => 10.0,
        }
    }
}

/// Weight applied when a query token only matches as a term prefix
const PREFIX_WEIGHT: f64 = 0.5;

/// Prefix matching starts at this many characters
const MIN_PREFIX_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq)]
struct Posting {
    doc: usize,
    field: Field,
    tf: u32,
}

/// A document handed to [`SearchIndex::build`]
#[derive(Debug, Clone, Copy)]
pub struct IndexDocument<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub tags: &'a [&'a str],
}

#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    postings: BTreeMap<String, Vec<Posting>>,
    doc_count: usize,
}

/// Lowercase alphanumeric runs
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
        .collect()
}

impl SearchIndex {
    /// Build an index; document ids are positions in `docs`.
    pub fn build<'a>(docs: impl IntoIterator<Item = IndexDocument<'a>>) -> Self {
        let mut postings: BTreeMap<String, Vec<Posting>> = BTreeMap::new();
        let mut doc_count = 0;

        for (doc, document) in docs.into_iter().enumerate() {
            doc_count += 1;
            let tag_text = document.tags.join(" ");
            let fields = [
                (Field::Name, document.name),
                (Field::Description, document.description),
                (Field::Tags, tag_text.as_str()),
            ];
            for (field, text) in fields {
                let mut counts: HashMap<String, u32> = HashMap::new();
                for token in tokenize(text) {
                    *counts.entry(token).or_default() += 1;
                }
                for (term, tf) in counts {
                    postings
                        .entry(term)
                        .or_default()
                        .push(Posting { doc, field, tf });
                }
            }
        }

        Self {
            postings,
            doc_count,
        }
    }

    pub fn doc_count(&self) -> usize {
        self.doc_count
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Score documents against `query`; highest score first, ties by document id.
    pub fn search(&self, query: &str) -> Vec<(usize, f64)> {
        let mut tokens = tokenize(query);
        tokens.sort();
        tokens.dedup();

        let mut scores: HashMap<usize, f64> = HashMap::new();
        for token in &tokens {
            if let Some(postings) = self.postings.get(token) {
                self.accumulate(postings, 1.0, &mut scores);
            }
            if token.chars().count() < MIN_PREFIX_LEN {
                continue;
            }
            let expansions = self
                .postings
                .range::<str, _>((
                    std::ops::Bound::Excluded(token.as_str()),
                    std::ops::Bound::Unbounded,
                ))
                .take_while(|(term, _)| term.starts_with(token.as_str()));
            for (_, postings) in expansions {
                self.accumulate(postings, PREFIX_WEIGHT, &mut scores);
            }
        }

        let mut ranked: Vec<(usize, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }

    fn accumulate(&self, postings: &[Posting], weight: f64, scores: &mut HashMap<usize, f64>) {
        let df = postings
            .iter()
            .map(|posting| posting.doc)
            .collect::<HashSet<_>>()
            .len();
        let idf = (1.0 + self.doc_count as f64 / df.max(1) as f64).ln();
        for posting in postings {
            let score = weight * posting.field.boost() * idf * f64::from(posting.tf).sqrt();
            *scores.entry(posting.doc).or_default() += score;
        }
    }
}
