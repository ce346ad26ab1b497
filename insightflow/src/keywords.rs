//! Per-document keyword ranking.
//!
//! Scores single-word terms with a YAKE-style relevance statistic built only
//! from the document itself: where a term first shows up, how it is cased,
//! how often it repeats, how many sentences it spans, and how varied its
//! neighbours are. Lower scores are more relevant.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::models::{KeywordSet, NormalizedDocument};
use crate::summarize::split_sentences;

static WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:['\u{2019}-][\p{L}\p{N}]+)*").expect("word pattern is valid")
});

static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and",
        "any", "are", "aren't", "as", "at", "be", "because", "been", "before", "being", "below",
        "between", "both", "but", "by", "can", "cannot", "could", "did", "didn't", "do", "does",
        "doesn't", "doing", "don't", "down", "during", "each", "either", "else", "even", "ever",
        "every", "few", "for", "from", "further", "had", "has", "hasn't", "have", "haven't",
        "having", "he", "her", "here", "hers", "herself", "him", "himself", "his", "how",
        "however", "i", "if", "in", "into", "is", "isn't", "it", "it's", "its", "itself",
        "just", "let", "many", "may", "me", "might", "more", "most", "much", "must", "my",
        "myself", "neither", "no", "nor", "not", "now", "of", "off", "often", "on", "once",
        "one", "only", "or", "other", "others", "our", "ours", "ourselves", "out", "over", "own",
        "per", "quite", "rather", "same", "she", "should", "since", "so", "some", "such",
        "than", "that", "that's", "the", "their", "theirs", "them", "themselves", "then",
        "there", "these", "they", "this", "those", "though", "through", "thus", "to", "too",
        "under", "until", "up", "upon", "us", "very", "was", "wasn't", "we", "were", "weren't",
        "what", "when", "where", "whether", "which", "while", "who", "whom", "whose", "why",
        "will", "with", "within", "without", "would", "yet", "you", "your", "yours", "yourself",
        "yourselves",
    ]
    .into_iter()
    .collect()
});

/// Occurrence statistics for one lowercased term.
#[derive(Debug, Default)]
struct TermStats {
    surface: String,
    first_seen: usize,
    tf: usize,
    tf_upper: usize,
    tf_acronym: usize,
    sentence_ids: Vec<usize>,
    left: Vec<String>,
    right: Vec<String>,
}

impl TermStats {
    fn median_sentence(&self) -> f64 {
        let mut ids = self.sentence_ids.clone();
        ids.sort_unstable();
        let mid = ids.len() / 2;
        if ids.len() % 2 == 0 {
            (ids[mid - 1] + ids[mid]) as f64 / 2.0
        } else {
            ids[mid] as f64
        }
    }

    fn distinct_sentences(&self) -> usize {
        self.sentence_ids.iter().collect::<HashSet<_>>().len()
    }
}

fn dispersion(neighbours: &[String]) -> f64 {
    if neighbours.is_empty() {
        return 0.0;
    }
    neighbours.iter().collect::<HashSet<_>>().len() as f64 / neighbours.len() as f64
}

fn is_acronym(token: &str) -> bool {
    token.chars().count() > 1
        && token.chars().any(char::is_alphabetic)
        && token.chars().filter(|c| c.is_alphabetic()).all(char::is_uppercase)
}

/// Ranks single-word terms of a document by statistical relevance.
#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    min_term_chars: usize,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self { min_term_chars: 3 }
    }
}

impl KeywordExtractor {
    /// Creates an extractor that ignores terms shorter than three characters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum candidate length in characters.
    #[must_use]
    pub fn with_min_term_chars(mut self, min: usize) -> Self {
        self.min_term_chars = min;
        self
    }

    fn is_candidate(&self, key: &str) -> bool {
        key.chars().count() >= self.min_term_chars
            && key.chars().any(char::is_alphabetic)
            && !STOPWORDS.contains(key)
    }

    /// Returns up to `top_k` terms, most relevant first.
    ///
    /// Terms are compared case-insensitively and reported in the form of
    /// their first occurrence. Equal scores keep first-occurrence order.
    /// Documents without candidate terms yield an empty set.
    #[must_use]
    pub fn extract(&self, doc: &NormalizedDocument, top_k: usize) -> KeywordSet {
        if doc.is_empty() || top_k == 0 {
            return KeywordSet::empty();
        }

        let sentences = split_sentences(doc.as_str());
        let mut terms: HashMap<String, TermStats> = HashMap::new();
        let mut position = 0;

        for (sentence_id, sentence) in sentences.iter().enumerate() {
            let tokens: Vec<&str> = WORD.find_iter(sentence).map(|m| m.as_str()).collect();
            let keys: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();

            for (idx, token) in tokens.iter().enumerate() {
                let stats = terms.entry(keys[idx].clone()).or_insert_with(|| TermStats {
                    surface: (*token).to_string(),
                    first_seen: position,
                    ..TermStats::default()
                });
                stats.tf += 1;
                if is_acronym(token) {
                    stats.tf_acronym += 1;
                } else if idx > 0 && token.chars().next().is_some_and(char::is_uppercase) {
                    stats.tf_upper += 1;
                }
                stats.sentence_ids.push(sentence_id);
                if idx > 0 {
                    stats.left.push(keys[idx - 1].clone());
                }
                if let Some(next) = keys.get(idx + 1) {
                    stats.right.push(next.clone());
                }
                position += 1;
            }
        }

        let candidates: Vec<&TermStats> = terms
            .iter()
            .filter(|(key, _)| self.is_candidate(key))
            .map(|(_, stats)| stats)
            .collect();
        if candidates.is_empty() {
            return KeywordSet::empty();
        }

        let n = candidates.len() as f64;
        let mean_tf = candidates.iter().map(|s| s.tf as f64).sum::<f64>() / n;
        let std_tf = (candidates
            .iter()
            .map(|s| (s.tf as f64 - mean_tf).powi(2))
            .sum::<f64>()
            / n)
            .sqrt();
        let max_tf = candidates.iter().map(|s| s.tf).max().unwrap_or(1) as f64;
        let sentence_count = sentences.len().max(1) as f64;

        let mut scored: Vec<(f64, &TermStats)> = candidates
            .into_iter()
            .map(|s| {
                let tf = s.tf as f64;
                let t_case = s.tf_upper.max(s.tf_acronym) as f64 / (1.0 + tf.ln());
                let t_pos = (3.0 + s.median_sentence()).ln().ln();
                let t_freq = tf / (mean_tf + std_tf);
                let t_rel = 1.0 + (dispersion(&s.left) + dispersion(&s.right)) * (tf / max_tf);
                let t_sent = s.distinct_sentences() as f64 / sentence_count;
                let score = (t_rel * t_pos) / (t_case + t_freq / t_rel + t_sent / t_rel);
                (score, s)
            })
            .collect();

        scored.sort_by(|(a, sa), (b, sb)| a.total_cmp(b).then(sa.first_seen.cmp(&sb.first_seen)));
        KeywordSet::from_ranked(scored.into_iter().map(|(_, s)| s.surface.clone()), top_k)
    }
}

/// Ranks the keywords of `doc` with the default extractor.
#[must_use]
pub fn extract_keywords(doc: &NormalizedDocument, top_k: usize) -> KeywordSet {
    KeywordExtractor::default().extract(doc, top_k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_has_no_keywords() {
        assert!(extract_keywords(&normalize(""), 5).is_empty());
    }

    #[test]
    fn test_stopwords_and_numbers_are_skipped() {
        let doc = normalize("The 2024 and of 12 it is. On to 99 at.");
        assert!(extract_keywords(&doc, 5).is_empty());
    }

    #[test]
    fn test_ranking_and_tie_break() {
        let doc = normalize(
            "Solar panels convert sunlight. Solar farms need land. \
             Solar power is cheap. Wind also helps.",
        );
        let keywords = extract_keywords(&doc, 5);
        assert_eq!(
            keywords.as_slice(),
            &["sunlight", "panels", "convert", "Solar", "land"]
        );
    }

    #[test]
    fn test_bounded_and_unique() {
        let doc = normalize(
            "Grid storage matters. GRID storage is growing. grid operators buy Storage. \
             Batteries help the grid. Storage lowers costs for every grid.",
        );
        for top_k in 1..=8 {
            let keywords = extract_keywords(&doc, top_k);
            assert!(keywords.len() <= top_k);
            let lowered: HashSet<String> = keywords.iter().map(str::to_lowercase).collect();
            assert_eq!(lowered.len(), keywords.len());
        }
    }

    #[test]
    fn test_surface_form_is_first_occurrence() {
        let doc = normalize("Quantum research grows. Many labs study quantum effects.");
        let keywords = extract_keywords(&doc, 10);
        assert!(keywords.iter().any(|k| k == "Quantum"));
        assert!(!keywords.iter().any(|k| k == "quantum"));
    }

    #[test]
    fn test_min_term_chars() {
        let doc = normalize("AI and ML drive new tooling.");
        let default = extract_keywords(&doc, 10);
        assert!(!default.iter().any(|k| k == "AI"));

        let relaxed = KeywordExtractor::new().with_min_term_chars(2).extract(&doc, 10);
        assert!(relaxed.iter().any(|k| k == "AI"));
    }

    #[test]
    fn test_deterministic() {
        let doc = normalize(
            "Rust compiles fast code. Cargo manages crates. Crates publish to the registry.",
        );
        assert_eq!(extract_keywords(&doc, 5), extract_keywords(&doc, 5));
    }
}
