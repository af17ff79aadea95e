use crate::config::{INPUT_EXTENSIONS, OUTPUT_FORMATS};
use crate::core::columns::{ColumnSchema, IdPolicy};
use crate::core::engine::{MatchOptions, DEFAULT_TOP_K};
use crate::core::scoring::{RequestMarkers, Weights};
use crate::core::ConfigProvider;
use crate::domain::model::{CanonicalField, EntityKind, HeaderLanguage};
use crate::utils::error::{MatchError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub run: RunConfig,
    pub input: InputConfig,
    pub matching: Option<MatchingConfig>,
    pub columns: Option<ColumnsConfig>,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub students_path: String,
    pub sites_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub w_field: Option<f64>,
    pub w_city: Option<f64>,
    pub w_special: Option<f64>,
    pub top_k: Option<usize>,
    pub separate_partners: Option<bool>,
    pub generate_missing_ids: Option<bool>,
    pub markers: Option<MarkersConfig>,
}

/// `[matching.markers]`：覆寫特殊需求的判斷片語
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkersConfig {
    pub no_hospital: Option<Vec<String>>,
    pub close_to_home: Option<Vec<String>>,
}

/// 額外欄位同義詞：`[columns.students]` / `[columns.sites]`，鍵為標準欄位名
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnsConfig {
    pub students: Option<HashMap<String, Vec<String>>>,
    pub sites: Option<HashMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    pub output_formats: Vec<String>,
    pub header_language: Option<HeaderLanguage>,
    pub compression: Option<CompressionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(MatchError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| MatchError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATA_DIR})，未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::LazyLock;

        static ENV_VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid")
        });

        ENV_VAR_RE
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    fn matching(&self) -> MatchingConfig {
        self.matching.clone().unwrap_or_default()
    }

    fn synonym_overrides(&self, entity: EntityKind) -> Option<&HashMap<String, Vec<String>>> {
        let columns = self.columns.as_ref()?;
        match entity {
            EntityKind::Student => columns.students.as_ref(),
            EntityKind::Site => columns.sites.as_ref(),
        }
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty("run.name", &self.run.name)?;
        validation::validate_path("input.students_path", &self.input.students_path)?;
        validation::validate_path("input.sites_path", &self.input.sites_path)?;
        validation::validate_file_extension(
            "input.students_path",
            &self.input.students_path,
            &INPUT_EXTENSIONS,
        )?;
        validation::validate_file_extension(
            "input.sites_path",
            &self.input.sites_path,
            &INPUT_EXTENSIONS,
        )?;
        validation::validate_path("load.output_path", &self.load.output_path)?;

        validation::validate_positive_number(
            "load.output_formats",
            self.load.output_formats.len(),
            1,
        )?;
        for format in &self.load.output_formats {
            validation::validate_one_of("load.output_formats", format, &OUTPUT_FORMATS)?;
        }

        let matching = self.matching();
        for (field, value) in [
            ("matching.w_field", matching.w_field),
            ("matching.w_city", matching.w_city),
            ("matching.w_special", matching.w_special),
        ] {
            if let Some(value) = value {
                validation::validate_range(field, value, 0.0, 1.0)?;
            }
        }
        self.weights().validate()?;

        if let Some(markers) = &matching.markers {
            for (field, phrases) in [
                ("matching.markers.no_hospital", &markers.no_hospital),
                ("matching.markers.close_to_home", &markers.close_to_home),
            ] {
                if let Some(phrases) = phrases {
                    validation::validate_positive_number(field, phrases.len(), 1)?;
                    for phrase in phrases {
                        validation::validate_non_empty(field, phrase)?;
                    }
                }
            }
        }

        if let Some(top_k) = matching.top_k {
            validation::validate_positive_number("matching.top_k", top_k, 1)?;
        }

        for entity in [EntityKind::Student, EntityKind::Site] {
            if let Some(overrides) = self.synonym_overrides(entity) {
                for key in overrides.keys() {
                    if CanonicalField::from_config_key(entity, key).is_none() {
                        return Err(MatchError::InvalidConfigValueError {
                            field: format!("columns.{}", entity),
                            value: key.clone(),
                            reason: "Unknown canonical field".to_string(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn students_path(&self) -> &str {
        &self.input.students_path
    }

    fn sites_path(&self) -> &str {
        &self.input.sites_path
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.load.output_formats
    }

    fn compress_output(&self) -> bool {
        self.load
            .compression
            .as_ref()
            .map(|c| c.enabled)
            .unwrap_or(false)
    }

    fn archive_name(&self) -> &str {
        self.load
            .compression
            .as_ref()
            .and_then(|c| c.filename.as_deref())
            .unwrap_or("placements.zip")
    }

    fn header_language(&self) -> HeaderLanguage {
        self.load.header_language.unwrap_or_default()
    }

    fn weights(&self) -> Weights {
        let defaults = Weights::default();
        let matching = self.matching();
        Weights {
            field: matching.w_field.unwrap_or(defaults.field),
            city: matching.w_city.unwrap_or(defaults.city),
            special: matching.w_special.unwrap_or(defaults.special),
        }
    }

    fn request_markers(&self) -> RequestMarkers {
        let markers = self.matching().markers.unwrap_or_default();
        RequestMarkers::default().with_overrides(markers.no_hospital, markers.close_to_home)
    }

    fn match_options(&self) -> MatchOptions {
        let matching = self.matching();
        MatchOptions {
            top_k: matching.top_k.unwrap_or(DEFAULT_TOP_K),
            separate_partners: matching.separate_partners.unwrap_or(true),
        }
    }

    fn id_policy(&self) -> IdPolicy {
        if self.matching().generate_missing_ids.unwrap_or(false) {
            IdPolicy::GenerateSequential
        } else {
            IdPolicy::Require
        }
    }

    fn column_schema(&self, entity: EntityKind) -> ColumnSchema {
        let mut schema = ColumnSchema::for_entity(entity);
        if let Some(overrides) = self.synonym_overrides(entity) {
            for (key, synonyms) in overrides {
                if let Some(field) = CanonicalField::from_config_key(entity, key) {
                    schema.prepend_synonyms(field, synonyms);
                }
            }
        }
        schema
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
