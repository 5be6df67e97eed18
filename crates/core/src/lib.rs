//! Domain library for Kometa-AI.
//!
//! Holds everything that does not talk to an external service: catalog
//! snapshot models and the metadata fingerprint, collection configuration
//! and its comment-block extractor, the persistent decision store, and
//! schedule arithmetic. The `kometa-cli` crate supplies the Radarr and
//! Claude clients and the run orchestration on top.

pub mod collection;
pub mod error;
pub mod kometa;
pub mod movie;
pub mod schedule;
pub mod state;

pub use collection::{slugify, CollectionConfig, TAG_PREFIX};
pub use error::KometaError;
pub use kometa::{Diagnostic, KometaParser, ParseOutcome};
pub use movie::{AlternateTitle, Movie, Tag};
pub use state::{ChangeRecord, DecisionRecord, ErrorRecord, StateManager, STATE_FORMAT_VERSION};

/// Crate version, surfaced in the state document and reports.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
