pub mod placement_pipeline;

pub use placement_pipeline::{parse_table, BindingPreview, PlacementPipeline};
