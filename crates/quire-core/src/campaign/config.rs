//! Campaign configuration document.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum::{Display, EnumString};

use crate::document::{timestamp, JsonMap};
use crate::error::{QuireError, QuireResult};

/// Campaign lifecycle status.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CampaignStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Completed,
    Archived,
}

/// Who the campaign is aimed at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Audience {
    pub description: String,
    pub industries: Vec<String>,
    pub company_size: String,
    pub titles: Vec<String>,
    pub locations: Vec<String>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

/// One outreach channel toggle. Templates or scripts live in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelToggle {
    pub enabled: bool,
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl ChannelToggle {
    fn with_list(enabled: bool, list: &str) -> Self {
        let mut extra = JsonMap::new();
        extra.insert(list.to_string(), json!([]));
        Self { enabled, extra }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Channels {
    pub email: ChannelToggle,
    pub linkedin: ChannelToggle,
    pub sms: ChannelToggle,
    pub calls: ChannelToggle,
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl Default for Channels {
    fn default() -> Self {
        Self {
            email: ChannelToggle::with_list(true, "templates"),
            linkedin: ChannelToggle::with_list(false, "templates"),
            sms: ChannelToggle::with_list(false, "templates"),
            calls: ChannelToggle::with_list(false, "scripts"),
            extra: JsonMap::new(),
        }
    }
}

/// Outreach pacing and approval settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignSettings {
    pub max_daily_outreach: u32,
    pub min_days_between_touches: u32,
    pub max_touches_per_target: u32,
    pub require_approval: bool,
    pub auto_research: bool,
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl Default for CampaignSettings {
    fn default() -> Self {
        Self {
            max_daily_outreach: 20,
            min_days_between_touches: 3,
            max_touches_per_target: 5,
            require_approval: true,
            auto_research: true,
            extra: JsonMap::new(),
        }
    }
}

/// `config.md` frontmatter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub version: i64,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: CampaignStatus,
    #[serde(default)]
    pub owner_phone: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(rename = "lastUpdated", default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub audience: Audience,
    #[serde(default)]
    pub channels: Channels,
    #[serde(default)]
    pub settings: CampaignSettings,
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl CampaignConfig {
    /// Fresh draft configuration with default channels and settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: 1,
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            status: CampaignStatus::Draft,
            owner_phone: String::new(),
            goal: String::new(),
            created_at: timestamp(),
            last_updated: None,
            audience: Audience::default(),
            channels: Channels::default(),
            settings: CampaignSettings::default(),
            extra: JsonMap::new(),
        }
    }

    /// Apply caller overrides: `owner_phone`, `goal` and `status` overwrite;
    /// `audience` and `settings` are shallow-updated; each named channel that
    /// already exists is shallow-updated. Other keys are ignored.
    pub fn apply_updates(&mut self, updates: &JsonMap) -> QuireResult<()> {
        let Value::Object(mut current) = serde_json::to_value(&*self)? else {
            return Err(QuireError::Internal(
                "campaign config did not serialize to an object".to_string(),
            ));
        };

        for key in ["owner_phone", "goal", "status"] {
            if let Some(value) = updates.get(key) {
                current.insert(key.to_string(), value.clone());
            }
        }

        for section in ["audience", "settings"] {
            if let (Some(Value::Object(changes)), Some(Value::Object(target))) =
                (updates.get(section), current.get_mut(section))
            {
                shallow_update(target, changes);
            }
        }

        if let (Some(Value::Object(changes)), Some(Value::Object(channels))) =
            (updates.get("channels"), current.get_mut("channels"))
        {
            for (channel, change) in changes {
                if let (Some(Value::Object(target)), Value::Object(change)) =
                    (channels.get_mut(channel), change)
                {
                    shallow_update(target, change);
                }
            }
        }

        *self = serde_json::from_value(Value::Object(current))
            .map_err(|e| QuireError::validation(format!("Invalid campaign config: {}", e)))?;
        Ok(())
    }
}

fn shallow_update(target: &mut JsonMap, changes: &JsonMap) {
    for (key, value) in changes {
        target.insert(key.clone(), value.clone());
    }
}

/// Row returned by campaign listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: String,
    /// Folder name under the campaigns root.
    pub folder: String,
}
