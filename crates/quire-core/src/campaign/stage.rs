//! Campaign pipeline stages.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Position of a target in the outreach pipeline.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    #[default]
    Identified,
    Researched,
    Contacted,
    Replied,
    Qualified,
    Booked,
    Won,
    Lost,
}

impl Stage {
    /// Every stage in pipeline order.
    pub const ALL: [Stage; 8] = [
        Stage::Identified,
        Stage::Researched,
        Stage::Contacted,
        Stage::Replied,
        Stage::Qualified,
        Stage::Booked,
        Stage::Won,
        Stage::Lost,
    ];

    /// Position in [`Stage::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn description(self) -> &'static str {
        match self {
            Stage::Identified => "Target identified, not yet researched",
            Stage::Researched => "Research completed, ready for outreach",
            Stage::Contacted => "Initial outreach sent",
            Stage::Replied => "Received response from target",
            Stage::Qualified => "Target qualified as potential customer",
            Stage::Booked => "Meeting or call scheduled",
            Stage::Won => "Deal closed successfully",
            Stage::Lost => "Target declined or unresponsive",
        }
    }

    /// Whether an automatic transition from `self` to `next` is allowed:
    /// `lost` is always reachable, anything else must move forward.
    /// Administrative updates bypass this check.
    pub fn allows_transition_to(self, next: Stage) -> bool {
        next == Stage::Lost || next.index() > self.index()
    }

    /// Stages that a recorded touch promotes to `contacted`.
    pub fn is_pre_contact(self) -> bool {
        matches!(self, Stage::Identified | Stage::Researched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order() {
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn test_monotonic_transitions_from_contacted() {
        let current = Stage::Contacted;
        assert!(!current.allows_transition_to(Stage::Identified));
        assert!(!current.allows_transition_to(Stage::Contacted));
        assert!(current.allows_transition_to(Stage::Qualified));
        assert!(current.allows_transition_to(Stage::Lost));
        assert!(Stage::Won.allows_transition_to(Stage::Lost));
    }

    #[test]
    fn test_string_forms() {
        assert_eq!(Stage::Booked.to_string(), "booked");
        assert_eq!("replied".parse::<Stage>().unwrap(), Stage::Replied);
        assert_eq!(serde_json::to_string(&Stage::Won).unwrap(), "\"won\"");
    }
}
