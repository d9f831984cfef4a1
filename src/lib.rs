//! reshelf - sort a directory by file type, download source or category,
//! and undo it
//!
//! This library provides the reorganization modes, the public-suffix based
//! source classifier, the persisted undo history with reboot detection, and
//! the TOML configuration shared by all of them.

pub mod action_log;
pub mod boot;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod mover;
pub mod organize;
pub mod output;
pub mod paths;
pub mod pipeline;
pub mod presets;
pub mod provenance;
pub mod psl;
pub mod undo;

pub use action_log::ActionLog;
pub use boot::{BootStatus, BootTracker, UptimeSource};
pub use classify::DomainClassifier;
pub use config::{AppConfig, CompiledFilters, ConfigError};
pub use error::{ActionLogError, OrganizeError, OrganizeResult};
pub use mover::Action;
pub use organize::{Organizer, PullMode, RunReport};
pub use paths::StatePaths;
pub use pipeline::ClassificationPipeline;
pub use presets::Presets;
pub use psl::PublicSuffixList;
pub use undo::{UndoManager, UndoReport};

pub use cli::{Cli, run};
