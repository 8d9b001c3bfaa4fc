//! Keyword-scored reply intent classification.
//!
//! Each intent owns a keyword list. A keyword scores once when it occurs in
//! the lower-cased text, unless every occurrence lies inside the occurrence
//! of a longer matched keyword (`interested` inside `not interested`). The
//! highest score wins; ties go to the intent declared first.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::campaign::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Intent {
    Interested,
    MeetingRequest,
    NotInterested,
    Unsubscribe,
    OutOfOffice,
    Question,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SuggestedAction {
    FollowUpWithDetails,
    ScheduleMeeting,
    CloseTarget,
    MarkUnsubscribed,
    WaitAndRetry,
    AnswerQuestion,
    ReviewManually,
}

impl Intent {
    /// Scored intents, in tie-break order.
    pub const SCORED: [Intent; 6] = [
        Intent::Interested,
        Intent::MeetingRequest,
        Intent::NotInterested,
        Intent::Unsubscribe,
        Intent::OutOfOffice,
        Intent::Question,
    ];

    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Intent::Interested => &[
                "interested",
                "tell me more",
                "sounds good",
                "let's chat",
                "let's talk",
                "would love to",
                "yes please",
                "send me",
                "share more",
                "learn more",
                "curious about",
            ],
            Intent::MeetingRequest => &[
                "schedule a call",
                "book a meeting",
                "set up a time",
                "calendar",
                "available",
                "free time",
                "next week",
                "this week",
                "tomorrow",
                "let's meet",
                "15 minutes",
                "30 minutes",
                "quick call",
            ],
            Intent::NotInterested => &[
                "not interested",
                "no thank you",
                "no thanks",
                "not a good fit",
                "not for us",
                "pass on this",
                "not right now",
                "maybe later",
                "not at this time",
                "we're all set",
                "already have",
            ],
            Intent::Unsubscribe => &[
                "unsubscribe",
                "stop emailing",
                "stop contacting",
                "remove me",
                "opt out",
                "opt-out",
                "do not contact",
                "leave me alone",
                "remove my email",
                "take me off",
            ],
            Intent::OutOfOffice => &[
                "out of office",
                "on vacation",
                "away from",
                "limited access",
                "return on",
                "back on",
                "auto-reply",
                "automatic reply",
            ],
            Intent::Question => &[
                "how does",
                "what is",
                "can you explain",
                "more information",
                "how much",
                "pricing",
                "cost",
                "features",
                "?",
            ],
            Intent::Unknown => &[],
        }
    }

    pub fn sentiment(self) -> Sentiment {
        match self {
            Intent::Interested | Intent::MeetingRequest => Sentiment::Positive,
            Intent::NotInterested | Intent::Unsubscribe => Sentiment::Negative,
            Intent::OutOfOffice | Intent::Question | Intent::Unknown => Sentiment::Neutral,
        }
    }

    /// Stage the target should move to; out-of-office replies change nothing.
    pub fn suggested_stage(self) -> Option<Stage> {
        match self {
            Intent::Interested | Intent::Question | Intent::Unknown => Some(Stage::Replied),
            Intent::MeetingRequest => Some(Stage::Qualified),
            Intent::NotInterested | Intent::Unsubscribe => Some(Stage::Lost),
            Intent::OutOfOffice => None,
        }
    }

    pub fn suggested_action(self) -> SuggestedAction {
        match self {
            Intent::Interested => SuggestedAction::FollowUpWithDetails,
            Intent::MeetingRequest => SuggestedAction::ScheduleMeeting,
            Intent::NotInterested => SuggestedAction::CloseTarget,
            Intent::Unsubscribe => SuggestedAction::MarkUnsubscribed,
            Intent::OutOfOffice => SuggestedAction::WaitAndRetry,
            Intent::Question => SuggestedAction::AnswerQuestion,
            Intent::Unknown => SuggestedAction::ReviewManually,
        }
    }
}

/// Classification of one reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyAnalysis {
    pub sentiment: Sentiment,
    pub intent: Intent,
    /// `min(0.9, 0.3 + 0.15 * score)`.
    pub confidence: f64,
    pub suggested_stage: Option<Stage>,
    pub suggested_action: SuggestedAction,
    pub keywords_matched: Vec<String>,
}

/// Whether an automatic transition from `current` to `suggested` applies:
/// `lost` always does, anything else must move forward.
pub fn should_advance(current: Stage, suggested: Stage) -> bool {
    current.allows_transition_to(suggested)
}

/// Byte spans of every occurrence of `needle` in `haystack`.
fn occurrences(haystack: &str, needle: &str) -> Vec<(usize, usize)> {
    haystack
        .match_indices(needle)
        .map(|(start, m)| (start, start + m.len()))
        .collect()
}

/// Classify a reply body.
pub fn classify(text: &str) -> ReplyAnalysis {
    let lower = text.to_lowercase();

    let found: Vec<(Intent, &'static str, Vec<(usize, usize)>)> = Intent::SCORED
        .iter()
        .flat_map(|intent| intent.keywords().iter().map(move |kw| (*intent, *kw)))
        .filter_map(|(intent, kw)| {
            let spans = occurrences(&lower, kw);
            (!spans.is_empty()).then_some((intent, kw, spans))
        })
        .collect();

    let shadowed = |span: (usize, usize)| {
        found.iter().any(|(_, _, others)| {
            others.iter().any(|&(start, end)| {
                end - start > span.1 - span.0 && start <= span.0 && span.1 <= end
            })
        })
    };

    let counted: Vec<(Intent, &'static str)> = found
        .iter()
        .filter(|(_, _, spans)| spans.iter().any(|span| !shadowed(*span)))
        .map(|(intent, kw, _)| (*intent, *kw))
        .collect();

    let mut best = Intent::Unknown;
    let mut best_score = 0usize;
    for intent in Intent::SCORED {
        let score = counted.iter().filter(|(i, _)| *i == intent).count();
        if score > best_score {
            best = intent;
            best_score = score;
        }
    }

    ReplyAnalysis {
        sentiment: best.sentiment(),
        intent: best,
        confidence: (0.3 + 0.15 * best_score as f64).min(0.9),
        suggested_stage: best.suggested_stage(),
        suggested_action: best.suggested_action(),
        keywords_matched: counted.iter().map(|(_, kw)| kw.to_string()).collect(),
    }
}
