//! Prospects: people being reached out to, one document per person.

mod sections;
mod store;

pub use sections::ProspectSections;
pub use store::{slugify, NewProspect, Prospect, ProspectFrontmatter, ProspectStore, ProspectUpdate};
