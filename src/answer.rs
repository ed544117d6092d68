//! Answer synthesis.
//!
//! Combines retrieved passages and extracted fields into the final answer.
//! The LLM path sends a persona system prompt with explicit plain-text
//! formatting rules; when the backend fails (or is disabled), the same
//! section structure is assembled deterministically from the extracted
//! fields, so downstream streaming never cares which path produced the
//! text.

use std::sync::Arc;

use tracing::{debug, warn};

use answer_harness_core::compose;
use answer_harness_core::extract;
use answer_harness_core::models::{StructuredExtraction, SynthesizedAnswer};

use crate::llm::ChatBackend;

pub struct Synthesizer {
    chat: Arc<dyn ChatBackend>,
    persona: String,
}

impl Synthesizer {
    pub fn new(chat: Arc<dyn ChatBackend>, persona: impl Into<String>) -> Self {
        Self {
            chat,
            persona: persona.into(),
        }
    }

    /// Synthesize an answer for `question` from retrieved `passages`.
    ///
    /// Empty `passages` is terminal: the fixed no-information answer comes
    /// back with empty structured fields. Otherwise the LLM backend is
    /// tried first and the template renderer covers any failure.
    pub async fn synthesize(&self, question: &str, passages: &[String]) -> SynthesizedAnswer {
        if passages.is_empty() {
            return compose::no_information_answer();
        }

        let structured = extract::extract(passages);

        let text = match self
            .chat
            .generate(
                &self.system_prompt(),
                &user_prompt(question, passages, &structured),
            )
            .await
        {
            Ok(text) => {
                debug!(backend = self.chat.name(), "llm synthesis succeeded");
                text
            }
            Err(err) => {
                warn!(error = %err, "llm synthesis failed; using template answer");
                compose::render(question, &structured)
            }
        };

        SynthesizedAnswer {
            text,
            sources: passages.to_vec(),
            structured,
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are {persona}, a helpful and empathetic assistant that connects people with \
local aid services and resources.

Your personality:
- Warm, caring, and encouraging
- Patient and understanding of people's situations
- Professional but approachable
- Acknowledge when someone seems urgent or stressed

IMPORTANT FORMATTING RULES:
1. Use plain text formatting, NOT markdown
2. For bullet points, use \"\u{2022}\" (bullet character), not \"*\" or \"-\"
3. For section headers, use plain text ending with a colon (like \"Available Providers (3 found):\")
4. Always include a blank line between sections
5. Keep sections in this order: introduction, categories, providers, description, contact \
information, next steps

When someone asks about services, provide the relevant information in that structure with \
practical next steps. Handle emergency situations with appropriate urgency. Always be \
encouraging and remind people that help is available.",
            persona = self.persona
        )
    }
}

/// Assemble the user prompt: the question plus the structured context mined
/// from the retrieved passages.
fn user_prompt(question: &str, passages: &[String], structured: &StructuredExtraction) -> String {
    let mut prompt = format!("User Question: {question}\n\nAvailable Information:\n");

    let list_or_none = |items: &[String]| {
        if items.is_empty() {
            "Not specified".to_string()
        } else {
            items.join(", ")
        }
    };

    prompt.push_str(&format!(
        "Service Categories: {}\n",
        list_or_none(&structured.categories)
    ));
    prompt.push_str(&format!(
        "Providers: {}\n",
        list_or_none(&structured.providers)
    ));
    prompt.push_str(&format!(
        "Description: {}\n",
        structured
            .description
            .as_deref()
            .unwrap_or("Not available")
    ));

    prompt.push_str("\nContact Information:\n");
    prompt.push_str(&format!(
        "- Phones: {}\n",
        list_or_none(&structured.contacts.phones)
    ));
    prompt.push_str(&format!(
        "- Emails: {}\n",
        list_or_none(&structured.contacts.emails)
    ));
    prompt.push_str(&format!(
        "- Websites: {}\n",
        list_or_none(&structured.contacts.websites)
    ));
    prompt.push_str(&format!(
        "- Addresses: {}\n",
        list_or_none(&structured.contacts.addresses)
    ));

    prompt.push_str("\nRetrieved Passages:\n");
    for passage in passages {
        prompt.push_str(&format!("---\n{passage}\n"));
    }

    prompt.push_str("\nPlease provide a helpful response based on this information.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::DisabledChat;
    use answer_harness_core::compose::NO_INFORMATION_ANSWER;

    fn synthesizer() -> Synthesizer {
        Synthesizer::new(Arc::new(DisabledChat), "Clara")
    }

    #[tokio::test]
    async fn empty_passages_return_fixed_answer() {
        let answer = synthesizer().synthesize("any question", &[]).await;
        assert_eq!(answer.text, NO_INFORMATION_ANSWER);
        assert!(answer.sources.is_empty());
        assert!(answer.structured.categories.is_empty());
    }

    #[tokio::test]
    async fn backend_failure_falls_back_to_template() {
        let passages = vec![
            "CATEGORIES: food\nCONTACT INFORMATION:\nPhone: 555-123-4567\nDESCRIPTION:\nWe hand \
             out weekly grocery boxes to local families."
                .to_string(),
        ];
        let answer = synthesizer().synthesize("I need help with food", &passages).await;

        // Same text the template renderer produces on its own.
        let structured = extract::extract(&passages);
        assert_eq!(answer.text, compose::render("I need help with food", &structured));
        assert!(answer.text.contains("(555) 123-4567"));
        assert_eq!(answer.sources, passages);
    }

    #[tokio::test]
    async fn sources_are_verbatim_passages() {
        let passages = vec!["Passage one text.".to_string(), "Passage two text.".to_string()];
        let answer = synthesizer().synthesize("question", &passages).await;
        assert_eq!(answer.sources, passages);
    }

    #[test]
    fn user_prompt_includes_structured_context() {
        let structured = StructuredExtraction {
            categories: vec!["food".to_string()],
            ..Default::default()
        };
        let prompt = user_prompt("where do I get meals?", &["p".to_string()], &structured);
        assert!(prompt.contains("Service Categories: food"));
        assert!(prompt.contains("User Question: where do I get meals?"));
        assert!(prompt.contains("Retrieved Passages:"));
    }
}
