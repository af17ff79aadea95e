use crate::core::columns::{ColumnSchema, IdPolicy};
use crate::core::engine::MatchOptions;
use crate::core::scoring::{RequestMarkers, Weights};
use crate::domain::model::{EntityKind, HeaderLanguage, InputTables, MatchReport};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn students_path(&self) -> &str;
    fn sites_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn output_formats(&self) -> &[String];
    fn compress_output(&self) -> bool;

    fn archive_name(&self) -> &str {
        "placements.zip"
    }

    fn header_language(&self) -> HeaderLanguage;
    fn weights(&self) -> Weights;

    fn request_markers(&self) -> RequestMarkers {
        RequestMarkers::default()
    }

    fn match_options(&self) -> MatchOptions;
    fn id_policy(&self) -> IdPolicy;

    fn column_schema(&self, entity: EntityKind) -> ColumnSchema {
        ColumnSchema::for_entity(entity)
    }
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<InputTables>;
    async fn transform(&self, input: InputTables) -> Result<MatchReport>;
    async fn load(&self, report: MatchReport) -> Result<String>;
}
