//! quire-core - Core library for quire.
//!
//! quire keeps an agent's durable memory and outreach campaign state as
//! human-readable files: a JSON frontmatter block followed by a markdown
//! body. This crate provides the document codec, path mutations, locked
//! atomic writes, and the stores built on them.
//!
//! # Example
//!
//! ```ignore
//! use quire_core::{CampaignStore, NewProspect, StoreConfig};
//!
//! let config = StoreConfig::from_env();
//! let campaigns = CampaignStore::from_config(&config);
//!
//! campaigns.create("Q1 Outreach", &Default::default())?;
//! let prospect = campaigns.prospects().create(NewProspect::new("Jane Doe", "jane@acme.com"))?;
//! campaigns.add_target_by_prospect("Q1 Outreach", &prospect.slug)?;
//! ```

pub mod approval;
pub mod campaign;
pub mod config;
pub mod document;
pub mod error;
pub mod life;
pub mod prospect;
pub mod reply;

// Re-export commonly used types
pub use approval::{ApprovalQueue, ApprovalSelection, NewAction, SenderRegistry};
pub use campaign::{CampaignStore, MigrationReport, Stage, TargetsDocument};
pub use config::StoreConfig;
pub use document::{Document, DocumentRepository, JsonMap, Operation, WriteRequest};
pub use error::{ErrorCode, QuireError, QuireResult};
pub use life::LifeStore;
pub use prospect::{NewProspect, Prospect, ProspectStore, ProspectUpdate};
pub use reply::{classify, ReplyAnalysis, ReplyProcessor, ReplyRequest};
