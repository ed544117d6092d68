//! Ingestion-time structured normalization.
//!
//! Before chunking, each document is mined for category terms, contact
//! fields, and a service-description digest, and a labeled block is
//! prepended to the text:
//!
//! ```text
//! CATEGORIES: food, housing
//!
//! CONTACT INFORMATION:
//! Email: help@example.org
//! Phone: (555) 123-4567
//!
//! DESCRIPTION:
//! We provide weekly grocery deliveries to families.
//! ```
//!
//! Query-time extraction prefers these labels over raw-text scanning, so
//! normalizing here makes retrieval results parse cleanly later. Free-text
//! category inference happens only at this stage.

use std::sync::OnceLock;

use regex::Regex;

use answer_harness_core::categories::CategoryVocabulary;

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email pattern")
    })
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:\(\d{3}\)\s*|\b\d{3}[-.\s]?)?\d{3}[-.\s]?\d{4}\b").expect("phone pattern")
    })
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]+[^\s<>"{}|\\^`\[\].,;!?]"#).expect("url pattern")
    })
}

fn address_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b\d+\s+[A-Za-z0-9 ,.-]+?(?:avenue|ave|street|st|road|rd|boulevard|blvd|drive|dr|lane|ln|court|ct|way|parkway|pkwy|place|pl)\b",
        )
        .expect("address pattern")
    })
}

/// Sentence keywords that mark service descriptions.
const SERVICE_KEYWORDS: &[&str] = &[
    "provide",
    "offer",
    "service",
    "assist",
    "help",
    "support",
    "available",
    "resource",
];

/// Build the labeled normalization block for a document, or `None` when
/// nothing worth labeling was found.
pub fn normalize_document(
    text: &str,
    vocabulary: &CategoryVocabulary,
    confidence: f64,
) -> Option<String> {
    let categories = vocabulary.detect(text, confidence);
    let emails = collect_unique(email_re(), text);
    let phones: Vec<String> = phone_re()
        .find_iter(text)
        .filter_map(|m| normalize_phone(m.as_str()))
        .collect();
    let phones = dedupe(phones);
    let urls: Vec<String> = url_re()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|u| u.len() > 10 && !u.ends_with(".."))
        .collect();
    let urls = dedupe(urls);
    let addresses = collect_unique(address_re(), text);
    let description = service_description(text);

    let has_contacts =
        !emails.is_empty() || !phones.is_empty() || !urls.is_empty() || !addresses.is_empty();

    if categories.is_empty() && !has_contacts && description.is_empty() {
        return None;
    }

    let mut block = String::new();

    if !categories.is_empty() {
        block.push_str(&format!("CATEGORIES: {}\n\n", categories.join(", ")));
    }

    if has_contacts {
        block.push_str("CONTACT INFORMATION:\n");
        if !emails.is_empty() {
            block.push_str(&format!("Email: {}\n", emails.join(", ")));
        }
        if !phones.is_empty() {
            block.push_str(&format!("Phone: {}\n", phones.join(", ")));
        }
        if !urls.is_empty() {
            block.push_str(&format!("Website: {}\n", urls.join(", ")));
        }
        if !addresses.is_empty() {
            block.push_str(&format!("Address: {}\n", addresses.join(", ")));
        }
        block.push('\n');
    }

    if !description.is_empty() {
        block.push_str(&format!("DESCRIPTION:\n{}\n", description));
    }

    Some(block.trim_end().to_string())
}

fn collect_unique(re: &Regex, text: &str) -> Vec<String> {
    dedupe(re.find_iter(text).map(|m| m.as_str().to_string()).collect())
}

fn dedupe(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let value = value.trim().to_string();
        if !value.is_empty() && !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

fn normalize_phone(candidate: &str) -> Option<String> {
    let digits: String = candidate.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 10 {
        return None;
    }
    Some(format!(
        "({}) {}-{}",
        &digits[..3],
        &digits[3..6],
        &digits[6..]
    ))
}

/// Digest the sentences that talk about services; fall back to the leading
/// sentences when none do.
fn service_description(text: &str) -> String {
    let sentences: Vec<&str> = text
        .split('.')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    let service_sentences: Vec<&str> = sentences
        .iter()
        .filter(|s| {
            let lower = s.to_lowercase();
            SERVICE_KEYWORDS.iter().any(|kw| lower.contains(kw))
        })
        .copied()
        .collect();

    let chosen = if service_sentences.is_empty() {
        sentences.into_iter().take(3).collect::<Vec<_>>()
    } else {
        service_sentences
    };

    if chosen.is_empty() {
        return String::new();
    }
    format!("{}.", chosen.join(". "))
}
