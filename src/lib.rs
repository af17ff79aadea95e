pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;
pub use crate::config::{cli::LocalStorage, toml_config::TomlConfig};

pub use crate::app::pipelines::PlacementPipeline;
pub use crate::core::engine::{match_students, MatchEngine, MatchOptions};
pub use crate::core::runner::MatchRunner;
pub use crate::core::scoring::Weights;
pub use crate::domain::model::{Assignment, Site, Student};
pub use crate::utils::error::{MatchError, Result};
