//! Outreach campaigns: configuration, targets, metrics and log.
//!
//! A campaign is a folder of five frontmatter documents. Targets exist in
//! two schemas (inline legacy targets and prospect references); every
//! operation accepts both and [`CampaignStore::migrate_targets_to_prospects`]
//! converts the former to the latter.

mod config;
mod documents;
mod migration;
mod stage;
mod store;
mod targets;

pub use config::{
    Audience, CampaignConfig, CampaignSettings, CampaignStatus, CampaignSummary, ChannelToggle,
    Channels,
};
pub use documents::{
    CampaignFile, LogDocument, LogEvent, MetricsDocument, MetricsSummary, SequenceDocument,
    StageInfo,
};
pub use migration::{MigrationAction, MigrationDetail, MigrationReport, MIGRATION_SOURCE};
pub use stage::Stage;
pub use store::{campaign_slug, CampaignStore};
pub use targets::{
    LegacyTarget, LegacyTargets, NewTarget, ReferenceTargets, TargetRecord, TargetRef,
    TargetSummary, TargetUpdate, TargetView, TargetsDocument, Touch, TouchInput,
};
