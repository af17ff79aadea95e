pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::core::columns::IdPolicy;
#[cfg(feature = "cli")]
use crate::core::engine::{MatchOptions, DEFAULT_TOP_K};
#[cfg(feature = "cli")]
use crate::core::scoring::Weights;
#[cfg(feature = "cli")]
use crate::core::ConfigProvider;
use crate::domain::model::HeaderLanguage;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use crate::config::toml_config::{CompressionConfig, TomlConfig};
#[cfg(feature = "cli")]
use clap::{parser::ValueSource, ArgMatches, Parser};

pub const OUTPUT_FORMATS: [&str; 3] = ["csv", "tsv", "json"];
pub const INPUT_EXTENSIONS: [&str; 2] = ["csv", "tsv"];

pub fn parse_header_language(value: &str) -> std::result::Result<HeaderLanguage, String> {
    match value.trim().to_lowercase().as_str() {
        "he" | "hebrew" => Ok(HeaderLanguage::He),
        "en" | "english" => Ok(HeaderLanguage::En),
        other => Err(format!("unsupported header language '{}', use 'he' or 'en'", other)),
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "placement-match")]
#[command(about = "Assign students to internship sites by field, city and special requests")]
pub struct CliConfig {
    /// Students CSV/TSV file
    #[arg(long)]
    pub students: Option<String>,

    /// Sites (institutions/mentors) CSV/TSV file
    #[arg(long)]
    pub sites: Option<String>,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, value_delimiter = ',', default_value = "csv")]
    pub formats: Vec<String>,

    /// Candidate sites considered per partner when placing couples
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Allow registered partners to share a supervisor
    #[arg(long)]
    pub allow_shared_supervisor: bool,

    /// Generate sequential student ids when the students file has no id column
    #[arg(long)]
    pub generate_ids: bool,

    /// Bundle all output files into a single zip archive
    #[arg(long)]
    pub zip: bool,

    #[arg(long, default_value = "he", value_parser = parse_header_language)]
    pub header_language: HeaderLanguage,

    /// TOML configuration file; --students/--sites override its input paths
    #[arg(short, long)]
    pub config: Option<String>,

    /// Resolve columns and report bindings without matching
    #[arg(long)]
    pub dry_run: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 命令列上明確給定的參數覆寫 TOML 設定，回傳被覆寫的參數名稱
    pub fn apply_to(&self, arg_matches: &ArgMatches, config: &mut TomlConfig) -> Vec<&'static str> {
        let explicit = |id: &str| arg_matches.value_source(id) == Some(ValueSource::CommandLine);
        let mut applied = Vec::new();

        if let Some(students) = &self.students {
            config.input.students_path = students.clone();
            applied.push("students");
        }
        if let Some(sites) = &self.sites {
            config.input.sites_path = sites.clone();
            applied.push("sites");
        }
        if explicit("output_path") {
            config.load.output_path = self.output_path.clone();
            applied.push("output-path");
        }
        if explicit("formats") {
            config.load.output_formats = self.formats.clone();
            applied.push("formats");
        }
        if explicit("header_language") {
            config.load.header_language = Some(self.header_language);
            applied.push("header-language");
        }
        if self.zip {
            config
                .load
                .compression
                .get_or_insert(CompressionConfig {
                    enabled: true,
                    filename: None,
                })
                .enabled = true;
            applied.push("zip");
        }

        let matching = config.matching.get_or_insert_with(Default::default);
        if explicit("top_k") {
            matching.top_k = Some(self.top_k);
            applied.push("top-k");
        }
        if self.allow_shared_supervisor {
            matching.separate_partners = Some(false);
            applied.push("allow-shared-supervisor");
        }
        if self.generate_ids {
            matching.generate_missing_ids = Some(true);
            applied.push("generate-ids");
        }

        applied
    }
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn students_path(&self) -> &str {
        self.students.as_deref().unwrap_or_default()
    }

    fn sites_path(&self) -> &str {
        self.sites.as_deref().unwrap_or_default()
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.formats
    }

    fn compress_output(&self) -> bool {
        self.zip
    }

    fn header_language(&self) -> HeaderLanguage {
        self.header_language
    }

    fn weights(&self) -> Weights {
        Weights::default()
    }

    fn match_options(&self) -> MatchOptions {
        MatchOptions {
            top_k: self.top_k,
            separate_partners: !self.allow_shared_supervisor,
        }
    }

    fn id_policy(&self) -> IdPolicy {
        if self.generate_ids {
            IdPolicy::GenerateSequential
        } else {
            IdPolicy::Require
        }
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        let students = validation::validate_required_field("students", &self.students)?;
        let sites = validation::validate_required_field("sites", &self.sites)?;
        validation::validate_path("students", students)?;
        validation::validate_path("sites", sites)?;
        validation::validate_file_extension("students", students, &INPUT_EXTENSIONS)?;
        validation::validate_file_extension("sites", sites, &INPUT_EXTENSIONS)?;
        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_positive_number("top_k", self.top_k, 1)?;
        validation::validate_positive_number("formats", self.formats.len(), 1)?;
        for format in &self.formats {
            validation::validate_one_of("formats", format, &OUTPUT_FORMATS)?;
        }
        Ok(())
    }
}
