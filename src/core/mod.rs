pub mod columns;
pub mod engine;
pub mod partners;
pub mod runner;
pub mod scoring;

pub use crate::domain::model::{InputTables, MatchReport, Record};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
