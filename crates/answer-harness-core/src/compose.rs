//! Deterministic answer composition.
//!
//! Builds the structured plain-text answer from extracted fields when no LLM
//! backend is available (or when the backend call fails). The section
//! grammar here (intro, categories, providers, description, contact, next
//! steps, with header lines ending in `:` and `•` bullets) is the same one
//! the LLM prompt mandates, so the streaming transcoder never needs to know
//! which backend produced the text.

use crate::extract;
use crate::models::{StructuredExtraction, SynthesizedAnswer};

/// Fixed terminal answer when retrieval produced nothing.
pub const NO_INFORMATION_ANSWER: &str = "I couldn't find any specific information related to \
your question in the available documents. You might want to try rephrasing your question or \
asking about a different topic that's covered in the uploaded resources.";

/// Longest description carried into an answer before truncation.
const MAX_DESCRIPTION_CHARS: usize = 300;

/// Providers listed before collapsing into an "...and N more" line.
const MAX_LISTED_PROVIDERS: usize = 5;

/// Primary question intent, decided by the first matching keyword family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryIntent {
    HelpSeeking,
    Search,
    Services,
    Contact,
    General,
}

/// Classified question intent. Urgency and gratitude are independent flags;
/// only the primary intent is exclusive.
#[derive(Debug, Clone, Copy)]
pub struct QuestionIntent {
    pub primary: PrimaryIntent,
    pub urgent: bool,
    pub grateful: bool,
}

/// Classify a question by keyword families.
pub fn classify_intent(question: &str) -> QuestionIntent {
    let q = question.to_lowercase();
    let contains_any = |words: &[&str]| words.iter().any(|w| q.contains(w));

    let primary = if contains_any(&["help", "support", "assistance", "need"]) {
        PrimaryIntent::HelpSeeking
    } else if contains_any(&["find", "looking for", "search"]) {
        PrimaryIntent::Search
    } else if contains_any(&["services", "programs", "resources"]) {
        PrimaryIntent::Services
    } else if contains_any(&["contact", "call", "reach"]) {
        PrimaryIntent::Contact
    } else {
        PrimaryIntent::General
    };

    QuestionIntent {
        primary,
        urgent: contains_any(&["emergency", "urgent", "crisis"]),
        grateful: contains_any(&["thank", "thanks", "appreciate"]),
    }
}

/// The terminal no-results answer, with empty structured fields.
pub fn no_information_answer() -> SynthesizedAnswer {
    SynthesizedAnswer {
        text: NO_INFORMATION_ANSWER.to_string(),
        sources: Vec::new(),
        structured: StructuredExtraction::default(),
    }
}

/// Run extraction and render the template answer for `passages`.
///
/// Empty `passages` is a terminal case and returns the fixed
/// no-information answer regardless of the question.
pub fn render_answer(question: &str, passages: &[String]) -> SynthesizedAnswer {
    if passages.is_empty() {
        return no_information_answer();
    }

    let structured = extract::extract(passages);
    let text = render(question, &structured);

    SynthesizedAnswer {
        text,
        sources: passages.to_vec(),
        structured,
    }
}

/// Render the section grammar from already-extracted fields.
pub fn render(question: &str, structured: &StructuredExtraction) -> String {
    let intent = classify_intent(question);
    let mut lines: Vec<String> = Vec::new();

    lines.push(contextual_intro(&intent, &structured.categories));
    lines.push(String::new());

    if !structured.categories.is_empty() {
        if structured.categories.len() == 1 {
            lines.push(format!("Service Category: {}", structured.categories[0]));
        } else {
            lines.push(format!(
                "Related Categories: {}",
                structured.categories.join(", ")
            ));
        }
        lines.push(String::new());
    }

    if !structured.providers.is_empty() {
        if structured.providers.len() == 1 {
            lines.push("Available Provider:".to_string());
        } else {
            lines.push(format!(
                "Available Providers ({} found):",
                structured.providers.len()
            ));
        }
        for provider in structured.providers.iter().take(MAX_LISTED_PROVIDERS) {
            lines.push(format!("• {}", provider));
        }
        if structured.providers.len() > MAX_LISTED_PROVIDERS {
            lines.push(format!(
                "• ...and {} more providers",
                structured.providers.len() - MAX_LISTED_PROVIDERS
            ));
        }
        lines.push(String::new());
    }

    if let Some(description) = &structured.description {
        lines.push("About This Service:".to_string());
        lines.push(truncate_description(description));
        lines.push(String::new());
    }

    lines.push("How to Get Started:".to_string());
    let contacts = &structured.contacts;
    if contacts.is_empty() {
        lines.push("• Contact the providers listed above for more information".to_string());
        lines.push("• Check the documents for specific contact details".to_string());
    } else {
        for phone in &contacts.phones {
            lines.push(format!("• Call: {}", phone));
        }
        for email in &contacts.emails {
            lines.push(format!("• Email: {}", email));
        }
        for website in &contacts.websites {
            lines.push(format!("• Visit: {}", website));
        }
        if let Some(address) = contacts.addresses.first() {
            lines.push(format!("• Location: {}", address));
        }
    }
    lines.push(String::new());

    let steps = next_steps(&intent, structured);
    if !steps.is_empty() {
        lines.push("Next Steps:".to_string());
        for step in steps {
            lines.push(format!("• {}", step));
        }
    }

    let mut text = lines.join("\n");
    while text.ends_with('\n') {
        text.pop();
    }
    text
}

/// Pick an introduction sentence matching the question's intent.
fn contextual_intro(intent: &QuestionIntent, categories: &[String]) -> String {
    let joined = categories.join(", ").to_lowercase();
    let mut intro = match intent.primary {
        PrimaryIntent::HelpSeeking => {
            if categories.is_empty() {
                "I found some resources that might be helpful for your situation.".to_string()
            } else {
                format!("I found some resources that might help you with {joined} services.")
            }
        }
        PrimaryIntent::Search => {
            if categories.is_empty() {
                "Here's what I found based on your search:".to_string()
            } else {
                format!("Here's what I found related to {joined}:")
            }
        }
        PrimaryIntent::Services => {
            "Based on the available resources, here are the relevant services:".to_string()
        }
        PrimaryIntent::Contact => {
            "Here's the contact information for the services you're looking for:".to_string()
        }
        PrimaryIntent::General => {
            "Based on your question, here's the relevant information:".to_string()
        }
    };

    if intent.grateful {
        intro = format!("Happy to help. {intro}");
    }
    intro
}

/// Practical follow-up suggestions keyed to what was actually found.
fn next_steps(intent: &QuestionIntent, structured: &StructuredExtraction) -> Vec<String> {
    let mut steps = Vec::new();
    let contacts = &structured.contacts;

    if !contacts.phones.is_empty() {
        steps.push("Call the phone number above to speak with someone directly".to_string());
    } else if !contacts.emails.is_empty() {
        steps.push("Send an email to inquire about services and availability".to_string());
    } else if !contacts.websites.is_empty() {
        steps.push("Visit their website for more information and to get started".to_string());
    }

    if structured.providers.len() > 1 {
        steps.push("Compare the different providers to find the best fit for your needs".to_string());
    }

    if intent.urgent {
        steps.push(
            "If this is an emergency, please call 911 or go to your nearest emergency room"
                .to_string(),
        );
    }

    steps
}

/// Truncate a long description at a sentence boundary where possible.
fn truncate_description(description: &str) -> String {
    if description.len() <= MAX_DESCRIPTION_CHARS {
        return description.to_string();
    }

    let search_from = snap_to_char_boundary(description, 200);
    if let Some(pos) = description[search_from..].find(". ") {
        let end = search_from + pos + 1;
        if end < description.len() {
            return description[..end].to_string();
        }
    }

    let cut = snap_to_char_boundary(description, MAX_DESCRIPTION_CHARS);
    format!("{}...", &description[..cut])
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
