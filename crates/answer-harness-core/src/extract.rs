//! Structured-field extraction from retrieved passages.
//!
//! Mines provider names, categories, contact fields, and a best-effort
//! description out of passage text. Documents normalized at ingestion carry
//! labeled `CATEGORIES:` / `CONTACT INFORMATION:` / `PROVIDER:` /
//! `DESCRIPTION:` sections which are preferred; otherwise contact fields are
//! recovered from raw text with pattern matching.
//!
//! Contact extraction is driven by an ordered rule table, one
//! `(field, line label, pattern, validator)` entry per field, evaluated
//! uniformly over the labeled block. Noise lines (URL-encoded fragments, API
//! query parameters, repeated `..` runs, high encoded-character density) are
//! rejected before any pattern runs.
//!
//! Extraction never fails: a parse miss yields an empty field.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::{ContactSheet, StructuredExtraction};

/// Per-field result cap, to keep answers readable.
const MAX_FIELD_ITEMS: usize = 3;

/// Substrings that mark a line as machine noise rather than prose.
const NOISE_MARKERS: &[&str] = &[
    "%22",
    "%2",
    "field_specialty_ids",
    "geo_location=",
    "network_id=",
    "locale=en_us",
    "radius%22:%22",
    "sort%22:%22score",
];

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

fn bullet_provider_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Bullet entry ending in a 2-3 letter credential after a comma,
        // e.g. "• Jane Roe, MD - family medicine".
        Regex::new(r"[•●]\s*([^•●\n]+?,\s*[A-Z]{2,3}\b[^•●\n]*)").expect("provider pattern")
    })
}

/// Which contact list a rule feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContactField {
    Email,
    Phone,
    Website,
    Address,
}

/// One row of the contact rule table: the line labels that select it and the
/// extractor (pattern + validator) run against matching lines.
struct ContactRule {
    field: ContactField,
    labels: &'static [&'static str],
    extract: fn(&str) -> Vec<String>,
}

/// Ordered rule table evaluated over labeled "CONTACT INFORMATION:" blocks.
const CONTACT_RULES: &[ContactRule] = &[
    ContactRule {
        field: ContactField::Email,
        labels: &["Email:"],
        extract: extract_emails,
    },
    ContactRule {
        field: ContactField::Phone,
        labels: &["Phone:"],
        extract: extract_phones,
    },
    ContactRule {
        field: ContactField::Website,
        labels: &["Website:", "URL:"],
        extract: extract_urls,
    },
    ContactRule {
        field: ContactField::Address,
        labels: &["Address:"],
        extract: extract_address_line,
    },
];

fn extract_emails(line: &str) -> Vec<String> {
    email_re()
        .find_iter(line)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn extract_phones(line: &str) -> Vec<String> {
    phone_re()
        .find_iter(line)
        .filter_map(|m| normalize_phone(m.as_str()))
        .collect()
}

fn extract_urls(line: &str) -> Vec<String> {
    url_re()
        .find_iter(line)
        .map(|m| m.as_str())
        .filter(|url| is_valid_url(url))
        .map(|url| url.to_string())
        .collect()
}

fn extract_address_line(line: &str) -> Vec<String> {
    if let Some(idx) = line.find("Address:") {
        let address = line[idx + "Address:".len()..].trim();
        if !address.is_empty() {
            return vec![address.to_string()];
        }
    }
    Vec::new()
}

/// Reduce a phone candidate to digits; accept exactly 10 and format as
/// `(NNN) NNN-NNNN`.
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

fn is_valid_url(url: &str) -> bool {
    url.len() > 10 && url.contains('.') && !url.ends_with("..") && !url.starts_with("http://www..")
}

/// True when a line is machine noise that should never feed extraction.
fn is_noise_line(line: &str) -> bool {
    if NOISE_MARKERS.iter().any(|marker| line.contains(marker)) {
        return true;
    }

    if !line.is_empty() {
        let encoded = line.chars().filter(|c| "%=&?".contains(*c)).count();
        if encoded as f64 / line.len() as f64 > 0.3 {
            return true;
        }
    }

    line.matches("..").count() > 2
}

/// Extract structured fields from retrieved passages.
pub fn extract(passages: &[String]) -> StructuredExtraction {
    StructuredExtraction {
        providers: extract_providers(passages),
        categories: extract_categories(passages),
        contacts: extract_contacts(passages),
        description: best_description(passages),
    }
}

/// Categories come only from labeled `CATEGORIES:` lines. Free-text category
/// inference happens at ingestion time, not here.
pub fn extract_categories(passages: &[String]) -> Vec<String> {
    let mut categories: Vec<String> = Vec::new();
    for passage in passages {
        for line in passage.lines() {
            if let Some(idx) = line.find("CATEGORIES:") {
                let rest = &line[idx + "CATEGORIES:".len()..];
                for cat in rest.split(',') {
                    let cat = cat.trim();
                    if !cat.is_empty() && !categories.iter().any(|c| c == cat) {
                        categories.push(cat.to_string());
                    }
                }
            }
        }
    }
    categories
}

/// Contact extraction: labeled blocks first, raw-text scan as a fallback.
pub fn extract_contacts(passages: &[String]) -> ContactSheet {
    let mut sheet = ContactSheet::default();

    for passage in passages {
        if !passage.contains("CONTACT INFORMATION:") {
            continue;
        }
        for line in passage.lines() {
            if is_noise_line(line) {
                continue;
            }
            for rule in CONTACT_RULES {
                if rule.labels.iter().any(|label| line.contains(label)) {
                    push_field(&mut sheet, rule.field, (rule.extract)(line));
                }
            }
        }
    }

    // No labeled block produced anything: scan raw passage text.
    if sheet.is_empty() {
        for passage in passages {
            for line in passage.lines() {
                if is_noise_line(line) {
                    continue;
                }
                push_field(&mut sheet, ContactField::Email, extract_emails(line));
                push_field(&mut sheet, ContactField::Phone, extract_phones(line));
                push_field(&mut sheet, ContactField::Website, extract_urls(line));
            }
        }
    }

    truncate_sheet(&mut sheet);
    sheet
}

fn push_field(sheet: &mut ContactSheet, field: ContactField, values: Vec<String>) {
    let target = match field {
        ContactField::Email => &mut sheet.emails,
        ContactField::Phone => &mut sheet.phones,
        ContactField::Website => &mut sheet.websites,
        ContactField::Address => &mut sheet.addresses,
    };
    for value in values {
        if !target.contains(&value) {
            target.push(value);
        }
    }
}

fn truncate_sheet(sheet: &mut ContactSheet) {
    sheet.emails.truncate(MAX_FIELD_ITEMS);
    sheet.phones.truncate(MAX_FIELD_ITEMS);
    sheet.websites.truncate(MAX_FIELD_ITEMS);
    sheet.addresses.truncate(MAX_FIELD_ITEMS);
}

/// Provider names from labeled `PROVIDER:` lines or bullet entries carrying
/// a professional credential. First-appearance order, deduplicated.
pub fn extract_providers(passages: &[String]) -> Vec<String> {
    let mut providers: Vec<String> = Vec::new();
    let mut push = |name: String| {
        if !name.is_empty() && !providers.contains(&name) {
            providers.push(name);
        }
    };

    for passage in passages {
        for line in passage.lines() {
            if let Some(idx) = line.find("PROVIDER:") {
                push(line[idx + "PROVIDER:".len()..].trim().to_string());
            }
        }
        for cap in bullet_provider_re().captures_iter(passage) {
            push(cap[1].trim().to_string());
        }
    }

    providers
}

/// Pick the most readable description among the passages.
///
/// Each passage contributes either its labeled `DESCRIPTION:` segment or its
/// cleaned prose (section labels stripped, noise lines dropped). Candidates
/// are scored for readability; the highest score wins and ties keep the
/// earliest candidate.
pub fn best_description(passages: &[String]) -> Option<String> {
    let mut candidates: Vec<String> = Vec::new();

    for passage in passages {
        if let Some(idx) = passage.find("DESCRIPTION:") {
            let desc = clean_text(&passage[idx + "DESCRIPTION:".len()..]);
            if !desc.is_empty() {
                candidates.push(desc);
            }
        } else {
            let prose: Vec<&str> = passage
                .lines()
                .map(|l| l.trim())
                .filter(|l| {
                    !l.is_empty()
                        && !l.contains("CATEGORIES:")
                        && !l.contains("CONTACT INFORMATION:")
                        && !l.contains("PROVIDER:")
                        && !is_noise_line(l)
                })
                .collect();
            if !prose.is_empty() {
                let cleaned = clean_text(&prose.join(" "));
                if !cleaned.is_empty() {
                    candidates.push(cleaned);
                }
            }
        }
    }

    let mut best: Option<(f64, String)> = None;
    for candidate in candidates {
        let score = readability_score(&candidate);
        if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, desc)| desc)
}

/// Readability heuristic: longer prose with real words and sentence
/// boundaries scores up; encoded or URL-dominated text scores down.
fn readability_score(desc: &str) -> f64 {
    let mut score = desc.len() as f64 * 0.1;

    if desc.contains('%') || desc.contains('&') {
        score -= 30.0;
    }

    if desc.matches("http").count() > 2 || desc.matches("www").count() > 3 {
        score -= 20.0;
    }

    let word_count = desc
        .split_whitespace()
        .filter(|w| w.len() > 2 && w.chars().all(|c| c.is_alphabetic()))
        .count();
    score += word_count as f64 * 0.5;

    if desc.contains(". ") {
        score += 20.0;
    }

    score
}

fn encoded_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S*%[0-9A-Fa-f]{2}\S*").expect("encoded url pattern"))
}

fn broken_coord_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d+\.\.\s*\d+").expect("coord pattern"))
}

fn dot_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.{3,}").expect("dot run pattern"))
}

fn space_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]{2,}").expect("space run pattern"))
}

fn broken_www_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"www\.\.\s*").expect("www pattern"))
}

/// Normalize raw text: drop fragment lines, decode common URL escapes, strip
/// broken URL and coordinate fragments, and collapse runs.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let kept: Vec<&str> = text
        .lines()
        .map(|l| l.trim())
        .filter(|l| {
            l.len() > 10 && !is_noise_line(l) && !l.starts_with("t%22:") && !l.starts_with("field_")
        })
        .collect();

    let mut text = kept.join("\n").replace("%22", "\"").replace("%20", " ");
    text = broken_www_re().replace_all(&text, "www.").to_string();
    text = encoded_url_re().replace_all(&text, "").to_string();
    text = broken_coord_re().replace_all(&text, "").to_string();
    text = dot_run_re().replace_all(&text, "...").to_string();
    text = space_run_re().replace_all(&text, " ").to_string();

    text.trim().to_string()
}
