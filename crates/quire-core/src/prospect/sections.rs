//! The four-section markdown body of a prospect document.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static SECTION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^## (Business Context|Research Notes|Personalization Hooks|Interaction History)[ \t]*\r?$",
    )
    .unwrap()
});

static ANY_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^## ").unwrap());

/// Parsed prospect body sections, each trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProspectSections {
    /// What the prospect's business does.
    #[serde(default)]
    pub business_context: String,
    /// Findings from research (news, signals).
    #[serde(default)]
    pub research_notes: String,
    /// Hooks for personalizing outreach.
    #[serde(default)]
    pub personalization_hooks: String,
    /// Append-only log of interactions.
    #[serde(default)]
    pub interaction_history: String,
}

impl ProspectSections {
    /// Extract the known sections. A section runs from its heading to the
    /// next `## ` heading of any kind; unknown headings are ignored.
    pub fn parse(markdown: &str) -> Self {
        let mut sections = Self::default();

        for caps in SECTION_HEADER.captures_iter(markdown) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let start = whole.end();
            let end = ANY_HEADING
                .find_at(markdown, start)
                .map_or(markdown.len(), |m| m.start());
            let content = markdown[start..end].trim().to_string();

            match name.as_str() {
                "Business Context" => sections.business_context = content,
                "Research Notes" => sections.research_notes = content,
                "Personalization Hooks" => sections.personalization_hooks = content,
                _ => sections.interaction_history = content,
            }
        }

        sections
    }

    /// Render the canonical body.
    pub fn render(&self) -> String {
        [
            "## Business Context",
            &self.business_context,
            "",
            "## Research Notes",
            &self.research_notes,
            "",
            "## Personalization Hooks",
            &self.personalization_hooks,
            "",
            "## Interaction History",
            &self.interaction_history,
        ]
        .join("\n")
    }

    /// Append an entry to the interaction history, separated by a blank line.
    pub fn append_history(&mut self, entry: &str) {
        if self.interaction_history.is_empty() {
            self.interaction_history = entry.to_string();
        } else {
            self.interaction_history.push_str("\n\n");
            self.interaction_history.push_str(entry);
        }
    }
}
