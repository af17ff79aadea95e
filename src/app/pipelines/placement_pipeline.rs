use crate::core::columns::{ColumnBinding, ColumnResolver};
use crate::core::engine::{MatchEngine, MatchOutcome};
use crate::core::scoring::Scorer;
use crate::core::{ConfigProvider, InputTables, MatchReport, Pipeline, Storage};
use crate::domain::model::{
    Assignment, EntityKind, ExportRow, HeaderLanguage, RawTable, RunSummary, Site, SiteUsage,
    Student,
};
use crate::utils::error::{MatchError, Result};
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

const UTF8_BOM: &str = "\u{feff}";
const OUTPUT_STEM: &str = "assignments";

pub struct PlacementPipeline<S: Storage, C: ConfigProvider> {
    pub(crate) storage: S,
    pub(crate) config: C,
}

/// dry-run 用：兩張表的欄位對應結果
#[derive(Debug, Clone)]
pub struct BindingPreview {
    pub students: ColumnBinding,
    pub sites: ColumnBinding,
    pub student_rows: usize,
    pub site_rows: usize,
}

impl<S: Storage, C: ConfigProvider> PlacementPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    fn resolver(&self) -> ColumnResolver {
        ColumnResolver::default().with_id_policy(self.config.id_policy())
    }

    async fn read_table(&self, path: &str) -> Result<RawTable> {
        let bytes = self.storage.read_file(path).await?;
        let delimiter = if path.to_lowercase().ends_with(".tsv") {
            b'\t'
        } else {
            b','
        };
        let mut table = parse_table(&bytes, delimiter)?;

        let dropped = table.drop_unnamed_columns();
        if dropped > 0 {
            tracing::debug!("Dropped {} unnamed columns from {}", dropped, path);
        }
        tracing::debug!(
            "📄 {}: {} rows, columns {:?}",
            path,
            table.len(),
            table.columns
        );
        Ok(table)
    }

    /// 只解析欄位，不執行配對
    pub async fn preview(&self) -> Result<BindingPreview> {
        let input = self.extract().await?;
        let resolver = self.resolver();

        let students = resolver.bind(
            &input.students.columns,
            &self.config.column_schema(EntityKind::Student),
        )?;
        let sites = resolver.bind(
            &input.sites.columns,
            &self.config.column_schema(EntityKind::Site),
        )?;

        Ok(BindingPreview {
            students,
            sites,
            student_rows: input.students.len(),
            site_rows: input.sites.len(),
        })
    }

    fn output_file(&self, file_name: &str) -> String {
        format!(
            "{}/{}",
            self.config.output_path().trim_end_matches('/'),
            file_name
        )
    }

    fn render(&self, format: &str, report: &MatchReport) -> Result<Vec<u8>> {
        let language = self.config.header_language();
        match format {
            "csv" => {
                let mut data = UTF8_BOM.as_bytes().to_vec();
                data.extend(write_delimited(&report.rows, language, b',')?);
                Ok(data)
            }
            "tsv" => write_delimited(&report.rows, language, b'\t'),
            "json" => Ok(serde_json::to_vec_pretty(report)?),
            other => Err(MatchError::InvalidConfigValueError {
                field: "output_formats".to_string(),
                value: other.to_string(),
                reason: "Unsupported output format".to_string(),
            }),
        }
    }
}

/// 解析 CSV/TSV 位元組：容忍 BOM、長短不一的列，略過全空白列
pub fn parse_table(bytes: &[u8], delimiter: u8) -> Result<RawTable> {
    let content = std::str::from_utf8(bytes).map_err(|e| {
        MatchError::processing(format!("Input file is not valid UTF-8: {}", e))
    })?;
    let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(|cell| cell.to_string()).collect::<Vec<_>>());
    }

    Ok(RawTable::from_rows(headers, rows))
}

fn write_delimited(rows: &[ExportRow], language: HeaderLanguage, delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    writer.write_record(ExportRow::headers(language))?;
    for row in rows {
        writer.write_record(row.values())?;
    }

    writer
        .into_inner()
        .map_err(|e| MatchError::processing(format!("Failed to flush output: {}", e)))
}

fn export_row(
    student: &Student,
    assignment: &Assignment,
    sites: &[Site],
    language: HeaderLanguage,
) -> ExportRow {
    let site = assignment.site_index.and_then(|i| sites.get(i));
    let (status, site_type) = match (site, language) {
        (Some(site), HeaderLanguage::He) => ("שובץ", site.site_type.label_he()),
        (Some(site), HeaderLanguage::En) => ("assigned", site.site_type.as_str()),
        (None, HeaderLanguage::He) => ("לא שובץ", ""),
        (None, HeaderLanguage::En) => ("unassigned", ""),
    };

    ExportRow {
        student_id: student.id.clone(),
        first_name: student.first_name.clone(),
        last_name: student.last_name.clone(),
        address: student.address.clone(),
        city: student.city.clone(),
        phone: student.phone.clone(),
        email: student.email.clone(),
        match_percent: assignment.score.map(|s| (s * 10.0).round() / 10.0),
        site_name: site.map(|s| s.name.clone()).unwrap_or_default(),
        site_city: site.map(|s| s.city.clone()).unwrap_or_default(),
        site_type: site_type.to_string(),
        site_field: site.map(|s| s.field.clone()).unwrap_or_default(),
        status: status.to_string(),
    }
}

fn build_report(
    students: &[Student],
    sites: &[Site],
    outcome: MatchOutcome,
    language: HeaderLanguage,
) -> MatchReport {
    let rows = outcome
        .assignments
        .iter()
        .map(|a| export_row(&students[a.student_index], a, sites, language))
        .collect();

    let usage = sites
        .iter()
        .map(|site| SiteUsage {
            name: site.name.clone(),
            capacity: site.capacity,
            assigned: site.capacity - site.remaining_capacity,
            remaining: site.remaining_capacity,
        })
        .collect();

    MatchReport {
        rows,
        summary: RunSummary {
            generated_at: chrono::Utc::now(),
            stats: outcome.stats,
            partner_pairs: outcome.partners.pair_count(),
            sites: usage,
        },
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for PlacementPipeline<S, C> {
    async fn extract(&self) -> Result<InputTables> {
        let students = self.read_table(self.config.students_path()).await?;
        let sites = self.read_table(self.config.sites_path()).await?;
        Ok(InputTables { students, sites })
    }

    async fn transform(&self, input: InputTables) -> Result<MatchReport> {
        let resolver = self.resolver();
        let students = resolver.resolve_students(
            &input.students,
            &self.config.column_schema(EntityKind::Student),
        )?;
        let mut sites =
            resolver.resolve_sites(&input.sites, &self.config.column_schema(EntityKind::Site))?;

        let weights = self.config.weights();
        weights.validate()?;
        let scorer = Scorer::new(weights).with_markers(self.config.request_markers());
        let engine = MatchEngine::new(scorer, self.config.match_options());
        let outcome = engine.run(&students, &mut sites);

        if outcome.stats.unassigned > 0 {
            tracing::warn!(
                "⚠️ {} students could not be placed (total capacity {})",
                outcome.stats.unassigned,
                outcome.stats.total_capacity
            );
        }

        Ok(build_report(
            &students,
            &sites,
            outcome,
            self.config.header_language(),
        ))
    }

    async fn load(&self, report: MatchReport) -> Result<String> {
        let formats = self.config.output_formats();
        let mut files = Vec::with_capacity(formats.len());
        for format in formats {
            let name = format!("{}.{}", OUTPUT_STEM, format);
            files.push((name, self.render(format, &report)?));
        }

        if self.config.compress_output() {
            let archive = self.output_file(self.config.archive_name());
            tracing::debug!("Creating ZIP file with {} files", files.len());

            let zip_data = {
                let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
                for (name, data) in &files {
                    zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
                    zip.write_all(data)?;
                }
                let cursor = zip.finish()?;
                cursor.into_inner()
            };

            self.storage.write_file(&archive, &zip_data).await?;
            return Ok(archive);
        }

        for (name, data) in &files {
            let path = self.output_file(name);
            tracing::debug!("Writing {} ({} bytes)", path, data.len());
            self.storage.write_file(&path, data).await?;
        }

        Ok(self.config.output_path().to_string())
    }
}
