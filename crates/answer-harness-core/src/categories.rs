//! Category vocabulary and fuzzy term normalization.
//!
//! Retrieval broadening and ingestion-time normalization both need to map
//! free text onto a fixed set of service categories. The vocabulary holds
//! each category with its synonym list; [`CategoryVocabulary::normalize`]
//! resolves a candidate term to a category, trying exact matches first and
//! falling back to edit-distance similarity against every synonym.
//!
//! The similarity threshold is deliberately a parameter rather than a
//! constant: corpora differ, and callers pass the configured value through.

use serde_json::Value;

/// Built-in categories with their synonym lists.
///
/// Order matters for deterministic tie-breaking: the first category whose
/// synonym reaches the best score wins.
const DEFAULT_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "food",
        &[
            "food", "meal", "nutrition", "hunger", "feeding", "grocery", "pantry", "snap", "ebt",
            "food bank", "meals", "food stamps",
        ],
    ),
    (
        "housing",
        &[
            "housing",
            "shelter",
            "lodging",
            "home",
            "apartment",
            "rent",
            "homeless",
            "accommodation",
            "eviction",
            "housing assistance",
        ],
    ),
    (
        "healthcare",
        &[
            "healthcare",
            "medical",
            "health",
            "clinic",
            "hospital",
            "doctor",
            "medicine",
            "dental",
            "mental health",
            "prescription",
        ],
    ),
    (
        "financial",
        &[
            "financial",
            "money",
            "cash",
            "assistance",
            "aid",
            "stipend",
            "subsidy",
            "income",
            "welfare",
            "tanf",
            "financial aid",
        ],
    ),
    (
        "employment",
        &[
            "employment",
            "job",
            "career",
            "work",
            "hiring",
            "resume",
            "interview",
            "unemployment",
            "workforce",
            "job training",
        ],
    ),
    (
        "education",
        &[
            "education",
            "school",
            "training",
            "class",
            "course",
            "learning",
            "tuition",
            "scholarship",
            "academic",
            "college",
        ],
    ),
    (
        "childcare",
        &[
            "childcare",
            "daycare",
            "child care",
            "babysitting",
            "children",
            "kids",
            "youth",
            "family",
            "after school",
            "child support",
        ],
    ),
    (
        "transportation",
        &[
            "transportation",
            "transit",
            "bus",
            "ride",
            "car",
            "vehicle",
            "train",
            "travel",
            "transport",
            "transportation assistance",
        ],
    ),
    (
        "legal",
        &[
            "legal",
            "law",
            "attorney",
            "lawyer",
            "rights",
            "advocacy",
            "court",
            "justice",
            "representation",
            "legal aid",
        ],
    ),
    (
        "utilities",
        &[
            "utilities",
            "utility",
            "electric",
            "gas",
            "water",
            "bill",
            "power",
            "energy",
            "liheap",
            "utility assistance",
        ],
    ),
    (
        "seniors",
        &[
            "seniors",
            "elderly",
            "aging",
            "older adults",
            "retirement",
            "medicare",
            "social security",
            "senior services",
        ],
    ),
    (
        "veterans",
        &[
            "veterans",
            "military",
            "service member",
            "va",
            "veteran affairs",
            "veteran benefits",
            "veteran services",
        ],
    ),
    (
        "disaster",
        &[
            "disaster",
            "emergency",
            "crisis",
            "relief",
            "fema",
            "natural disaster",
            "hurricane",
            "flood",
            "fire",
            "emergency relief",
        ],
    ),
    (
        "immigration",
        &[
            "immigration",
            "immigrant",
            "refugee",
            "asylum",
            "citizenship",
            "documentation",
            "migrant",
            "immigration services",
        ],
    ),
    (
        "counseling",
        &[
            "counseling",
            "therapy",
            "support group",
            "mental health",
            "crisis",
            "hotline",
            "suicide",
            "addiction",
            "recovery",
        ],
    ),
];

/// A category vocabulary with synonym lists and fuzzy normalization.
#[derive(Debug, Clone)]
pub struct CategoryVocabulary {
    categories: Vec<(String, Vec<String>)>,
}

impl Default for CategoryVocabulary {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES
                .iter()
                .map(|(name, syns)| {
                    (
                        name.to_string(),
                        syns.iter().map(|s| s.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl CategoryVocabulary {
    /// Merge custom categories from a JSON object of
    /// `{ "category": ["synonym", ...] }`. New synonyms extend existing
    /// categories; unknown categories are appended.
    pub fn merge_json(&mut self, value: &Value) {
        let Some(map) = value.as_object() else {
            return;
        };
        for (name, syns) in map {
            let syns: Vec<String> = syns
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(|s| s.to_lowercase()))
                        .collect()
                })
                .unwrap_or_default();
            if let Some((_, existing)) = self.categories.iter_mut().find(|(n, _)| n == name) {
                for s in syns {
                    if !existing.contains(&s) {
                        existing.push(s);
                    }
                }
            } else {
                self.categories.push((name.clone(), syns));
            }
        }
    }

    /// All category names, in vocabulary order.
    pub fn category_names(&self) -> Vec<&str> {
        self.categories.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Resolve a candidate term to `(category, confidence)`.
    ///
    /// Exact category-name and synonym matches score 1.0. Otherwise the term
    /// is compared against every synonym by normalized edit-distance
    /// similarity, and the best match wins if it reaches `threshold`.
    pub fn normalize(&self, term: &str, threshold: f64) -> Option<(String, f64)> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return None;
        }

        for (name, synonyms) in &self.categories {
            if *name == term || synonyms.iter().any(|s| *s == term) {
                return Some((name.clone(), 1.0));
            }
        }

        let mut best: Option<(String, f64)> = None;
        for (name, synonyms) in &self.categories {
            for synonym in synonyms {
                let score = normalized_similarity(&term, synonym);
                if score >= threshold && best.as_ref().map(|(_, b)| score > *b).unwrap_or(true) {
                    best = Some((name.clone(), score));
                }
            }
        }
        best
    }

    /// Scan free text for category mentions.
    ///
    /// Candidate terms are single words longer than 3 characters and
    /// adjacent-word pairs (both words longer than 2 characters), matched
    /// case-insensitively. Returns matched categories deduplicated in order
    /// of first appearance.
    pub fn detect(&self, text: &str, threshold: f64) -> Vec<String> {
        let words: Vec<String> = text
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect();

        let mut found: Vec<String> = Vec::new();
        let mut push = |category: String| {
            if !found.contains(&category) {
                found.push(category);
            }
        };

        for word in &words {
            if word.len() > 3 {
                if let Some((category, _)) = self.normalize(word, threshold) {
                    push(category);
                }
            }
        }
        for pair in words.windows(2) {
            if pair[0].len() > 2 && pair[1].len() > 2 {
                let bigram = format!("{} {}", pair[0], pair[1]);
                if let Some((category, _)) = self.normalize(&bigram, threshold) {
                    push(category);
                }
            }
        }

        found
    }
}

/// Similarity in `[0, 1]` derived from Levenshtein distance over characters.
fn normalized_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

/// Classic two-row Levenshtein distance.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_category_name_scores_one() {
        let vocab = CategoryVocabulary::default();
        let (cat, score) = vocab.normalize("housing", 0.7).unwrap();
        assert_eq!(cat, "housing");
        assert_eq!(score, 1.0);
    }

    #[test]
    fn synonym_resolves_to_category() {
        let vocab = CategoryVocabulary::default();
        let (cat, score) = vocab.normalize("pantry", 0.7).unwrap();
        assert_eq!(cat, "food");
        assert_eq!(score, 1.0);
    }

    #[test]
    fn misspelling_within_threshold_matches() {
        let vocab = CategoryVocabulary::default();
        let (cat, score) = vocab.normalize("housng", 0.7).unwrap();
        assert_eq!(cat, "housing");
        assert!(score < 1.0 && score >= 0.7);
    }

    #[test]
    fn distant_term_yields_none() {
        let vocab = CategoryVocabulary::default();
        assert!(vocab.normalize("xylophone", 0.7).is_none());
    }

    #[test]
    fn bigram_synonym_detected() {
        let vocab = CategoryVocabulary::default();
        let found = vocab.detect("where is the nearest food bank open today", 0.8);
        assert!(found.contains(&"food".to_string()));
    }

    #[test]
    fn detection_preserves_first_appearance_order() {
        let vocab = CategoryVocabulary::default();
        let found = vocab.detect("eviction notice and childcare options", 0.85);
        assert_eq!(found, vec!["housing".to_string(), "childcare".to_string()]);
    }

    #[test]
    fn merge_json_extends_vocabulary() {
        let mut vocab = CategoryVocabulary::default();
        vocab.merge_json(&serde_json::json!({
            "pets": ["veterinary", "pet food"],
            "food": ["community fridge"],
        }));
        let (cat, _) = vocab.normalize("veterinary", 0.7).unwrap();
        assert_eq!(cat, "pets");
        let (cat, _) = vocab.normalize("community fridge", 0.7).unwrap();
        assert_eq!(cat, "food");
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }
}
