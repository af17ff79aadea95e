//! Column resolution: maps inconsistently-named spreadsheet headers onto the
//! canonical student and site schemas.
//!
//! Each canonical field carries literal synonyms (tried first, in priority
//! order, then again after header normalization) and keyword fragments for
//! a normalized-substring fallback. The strategies themselves are a plain
//! list on the resolver so they can be reordered or disabled. A column bound
//! to one field is never offered to another.

use crate::domain::model::{CanonicalField, CanonicalRecord, EntityKind, RawTable, Site, Student};
use crate::utils::error::{MatchError, Result};
use crate::utils::text::{cell_to_text, normalize_header};
use std::collections::{HashMap, HashSet};

const DEFAULT_CAPACITY: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: CanonicalField,
    pub synonyms: Vec<String>,
    pub keywords: Vec<String>,
    pub required: bool,
}

impl FieldSpec {
    fn new(field: CanonicalField, synonyms: &[&str], keywords: &[&str], required: bool) -> Self {
        Self {
            field,
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            required,
        }
    }
}

/// Ordered field specs for one entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub entity: EntityKind,
    pub fields: Vec<FieldSpec>,
}

impl ColumnSchema {
    pub fn students() -> Self {
        use CanonicalField::*;
        Self {
            entity: EntityKind::Student,
            fields: vec![
                FieldSpec::new(
                    StudentId,
                    &["מספר תעודת זהות", "תעודת זהות", "ת\"ז", "תז", "תעודת זהות הסטודנט", "id", "student id"],
                    &["תעודת זהות", "תז", "student id", "id number"],
                    true,
                ),
                FieldSpec::new(FirstName, &["שם פרטי", "first name"], &["פרטי", "first"], true),
                FieldSpec::new(LastName, &["שם משפחה", "last name"], &["משפחה", "last", "surname"], true),
                FieldSpec::new(
                    Address,
                    &["כתובת", "כתובת הסטודנט", "רחוב", "address"],
                    &["כתובת", "address"],
                    false,
                ),
                FieldSpec::new(City, &["עיר מגורים", "עיר", "city"], &["עיר", "city", "town"], false),
                FieldSpec::new(Phone, &["טלפון", "מספר טלפון", "phone"], &["טלפון", "נייד", "phone"], false),
                FieldSpec::new(
                    Email,
                    &["דוא\"ל", "דוא״ל", "אימייל", "כתובת אימייל", "כתובת מייל", "email"],
                    &["דואל", "מייל", "mail"],
                    false,
                ),
                FieldSpec::new(
                    PreferredField,
                    &["תחום מועדף", "תחומים מועדפים", "preferred field"],
                    &["מועדף", "preferred", "preference"],
                    false,
                ),
                FieldSpec::new(
                    SpecialRequest,
                    &["בקשה מיוחדת", "special request"],
                    &["בקשה", "request"],
                    false,
                ),
                FieldSpec::new(
                    Partner,
                    &["בן/בת זוג להכשרה", "בן\\בת זוג להכשרה", "בן/בת זוג", "בן\\בת זוג", "partner"],
                    &["זוג", "partner"],
                    false,
                ),
            ],
        }
    }

    pub fn sites() -> Self {
        use CanonicalField::*;
        Self {
            entity: EntityKind::Site,
            fields: vec![
                FieldSpec::new(
                    SiteName,
                    &["מוסד / שירות הכשרה", "מוסד", "שם מוסד ההתמחות", "site", "institution"],
                    &["מוסד", "שירות", "institution", "site name"],
                    true,
                ),
                FieldSpec::new(
                    SiteField,
                    &["תחום ההתמחות", "תחום התמחות", "field", "specialization"],
                    &["תחום", "specialization", "field"],
                    true,
                ),
                FieldSpec::new(Street, &["רחוב", "street"], &["רחוב", "street"], false),
                FieldSpec::new(SiteCity, &["עיר", "city"], &["עיר", "city", "town"], false),
                FieldSpec::new(
                    Capacity,
                    &["מספר סטודנטים שניתן לקלוט השנה", "מספר סטודנטים שניתן לקלוט", "קיבולת", "capacity"],
                    &["קיבולת", "לקלוט", "capacity"],
                    false,
                ),
                FieldSpec::new(
                    SupervisorFirstName,
                    &["שם פרטי", "supervisor first name"],
                    &["פרטי", "first"],
                    false,
                ),
                FieldSpec::new(
                    SupervisorLastName,
                    &["שם משפחה", "supervisor last name"],
                    &["משפחה", "last"],
                    false,
                ),
                FieldSpec::new(SitePhone, &["טלפון", "phone"], &["טלפון", "phone"], false),
                FieldSpec::new(
                    SiteEmail,
                    &["אימייל", "כתובת מייל", "דוא\"ל", "דוא״ל", "email"],
                    &["דואל", "מייל", "mail"],
                    false,
                ),
            ],
        }
    }

    pub fn for_entity(entity: EntityKind) -> Self {
        match entity {
            EntityKind::Student => Self::students(),
            EntityKind::Site => Self::sites(),
        }
    }

    pub fn spec(&self, field: CanonicalField) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.field == field)
    }

    /// 額外同義詞放在預設同義詞之前，優先比對
    pub fn prepend_synonyms(&mut self, field: CanonicalField, synonyms: &[String]) {
        if let Some(spec) = self.fields.iter_mut().find(|f| f.field == field) {
            let mut merged = synonyms.to_vec();
            merged.extend(spec.synonyms.iter().filter(|s| !synonyms.contains(s)).cloned());
            spec.synonyms = merged;
        }
    }
}

/// How a column was matched to a canonical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchStrategy {
    ExactSynonym,
    /// Synonym equality after `normalize_header` (case, accents, punctuation).
    NormalizedSynonym,
    NormalizedKeyword,
}

impl MatchStrategy {
    pub fn find<'a>(&self, spec: &FieldSpec, columns: &'a [String]) -> Option<&'a str> {
        self.find_unclaimed(spec, columns, &HashSet::new())
    }

    /// 同 `find`，但跳過已被其他欄位認領的欄
    pub fn find_unclaimed<'a>(
        &self,
        spec: &FieldSpec,
        columns: &'a [String],
        claimed: &HashSet<&str>,
    ) -> Option<&'a str> {
        let available = move || {
            columns
                .iter()
                .filter(move |c| !claimed.contains(c.as_str()))
                .map(String::as_str)
        };

        match self {
            MatchStrategy::ExactSynonym => spec
                .synonyms
                .iter()
                .find_map(|synonym| available().find(|c| *c == synonym.as_str())),
            MatchStrategy::NormalizedSynonym => {
                let normalized: Vec<(&str, String)> =
                    available().map(|c| (c, normalize_header(c))).collect();
                spec.synonyms.iter().find_map(|synonym| {
                    let synonym = normalize_header(synonym);
                    if synonym.is_empty() {
                        return None;
                    }
                    normalized
                        .iter()
                        .find(|(_, n)| *n == synonym)
                        .map(|(c, _)| *c)
                })
            }
            MatchStrategy::NormalizedKeyword => {
                let keywords: Vec<String> = spec
                    .keywords
                    .iter()
                    .map(|k| normalize_header(k))
                    .filter(|k| !k.is_empty())
                    .collect();
                available().find(|c| {
                    let normalized = normalize_header(c);
                    keywords.iter().any(|k| normalized.contains(k.as_str()))
                })
            }
        }
    }
}

/// What to do when no student id column exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdPolicy {
    #[default]
    Require,
    /// Generate ids "1", "2", ... in row order.
    GenerateSequential,
}

/// Canonical field -> source column, resolved once per table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnBinding {
    columns: HashMap<CanonicalField, (String, MatchStrategy)>,
}

impl ColumnBinding {
    pub fn column(&self, field: CanonicalField) -> Option<&str> {
        self.columns.get(&field).map(|(c, _)| c.as_str())
    }

    pub fn strategy(&self, field: CanonicalField) -> Option<MatchStrategy> {
        self.columns.get(&field).map(|(_, s)| *s)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Bound fields in canonical order, for logging and dry runs.
    pub fn entries(&self) -> Vec<(CanonicalField, &str, MatchStrategy)> {
        let mut entries: Vec<_> = self
            .columns
            .iter()
            .map(|(f, (c, s))| (*f, c.as_str(), *s))
            .collect();
        entries.sort_by_key(|(f, _, _)| *f);
        entries
    }
}

#[derive(Debug, Clone)]
pub struct ColumnResolver {
    strategies: Vec<MatchStrategy>,
    id_policy: IdPolicy,
}

impl Default for ColumnResolver {
    fn default() -> Self {
        Self {
            strategies: vec![
                MatchStrategy::ExactSynonym,
                MatchStrategy::NormalizedSynonym,
                MatchStrategy::NormalizedKeyword,
            ],
            id_policy: IdPolicy::Require,
        }
    }
}

impl ColumnResolver {
    pub fn new(strategies: Vec<MatchStrategy>) -> Self {
        Self {
            strategies,
            ..Default::default()
        }
    }

    pub fn with_id_policy(mut self, id_policy: IdPolicy) -> Self {
        self.id_policy = id_policy;
        self
    }

    pub fn find_column<'a>(&self, spec: &FieldSpec, columns: &'a [String]) -> Option<(&'a str, MatchStrategy)> {
        self.strategies
            .iter()
            .find_map(|strategy| strategy.find(spec, columns).map(|c| (c, *strategy)))
    }

    /// Bind every schema field to a column; fails listing all unresolved
    /// required fields.
    ///
    /// Strategies run one at a time over all fields, so every exact match
    /// is claimed before any fuzzy match is attempted.
    pub fn bind(&self, columns: &[String], schema: &ColumnSchema) -> Result<ColumnBinding> {
        let mut binding = ColumnBinding::default();
        let mut claimed: HashSet<&str> = HashSet::new();

        for strategy in &self.strategies {
            for spec in &schema.fields {
                if binding.columns.contains_key(&spec.field) {
                    continue;
                }
                let Some(column) = strategy.find_unclaimed(spec, columns, &claimed) else {
                    continue;
                };
                tracing::debug!(
                    "🔗 {}.{} <- '{}' ({:?})",
                    schema.entity,
                    spec.field,
                    column,
                    strategy
                );
                claimed.insert(column);
                binding
                    .columns
                    .insert(spec.field, (column.to_string(), *strategy));
            }
        }

        let mut missing = Vec::new();
        for spec in schema.fields.iter().filter(|s| s.required) {
            if binding.columns.contains_key(&spec.field) {
                continue;
            }
            if spec.field == CanonicalField::StudentId && self.id_policy == IdPolicy::GenerateSequential {
                tracing::warn!("⚠️ No student id column found, generating sequential ids");
                continue;
            }
            missing.push(spec.field.as_str().to_string());
        }

        if !missing.is_empty() {
            return Err(MatchError::MissingRequiredColumn {
                entity: schema.entity.as_str().to_string(),
                fields: missing,
            });
        }
        Ok(binding)
    }

    /// Map every row of `table` onto `schema`.
    pub fn resolve(&self, table: &RawTable, schema: &ColumnSchema) -> Result<Vec<CanonicalRecord>> {
        let binding = self.bind(&table.columns, schema)?;
        let generate_ids = schema.entity == EntityKind::Student
            && binding.column(CanonicalField::StudentId).is_none();

        let records = table
            .records
            .iter()
            .enumerate()
            .map(|(row, record)| {
                let mut canonical = CanonicalRecord::default();
                for spec in &schema.fields {
                    if let Some(column) = binding.column(spec.field) {
                        let value = record
                            .data
                            .get(column)
                            .map(cell_to_text)
                            .unwrap_or_default();
                        canonical.set(spec.field, value);
                    }
                }
                if generate_ids {
                    canonical.set(CanonicalField::StudentId, (row + 1).to_string());
                }
                canonical
            })
            .collect();

        Ok(records)
    }

    pub fn resolve_students(&self, table: &RawTable, schema: &ColumnSchema) -> Result<Vec<Student>> {
        use CanonicalField::*;
        let students: Vec<Student> = self
            .resolve(table, schema)?
            .into_iter()
            .map(|r| Student {
                id: r.get(StudentId).to_string(),
                first_name: r.get(FirstName).to_string(),
                last_name: r.get(LastName).to_string(),
                address: r.get(Address).to_string(),
                city: r.get(City).to_string(),
                phone: r.get(Phone).to_string(),
                email: r.get(Email).to_string(),
                preferred_field: r.get(PreferredField).to_string(),
                special_request: r.get(SpecialRequest).to_string(),
                partner_reference: r.get(Partner).to_string(),
            })
            .collect();

        tracing::debug!("Resolved {} students", students.len());
        Ok(students)
    }

    pub fn resolve_sites(&self, table: &RawTable, schema: &ColumnSchema) -> Result<Vec<Site>> {
        use CanonicalField::*;
        let sites: Vec<Site> = self
            .resolve(table, schema)?
            .into_iter()
            .map(|r| {
                let supervisor = format!("{} {}", r.get(SupervisorFirstName), r.get(SupervisorLastName));
                let mut site = Site::new(
                    r.get(SiteName),
                    r.get(SiteField),
                    r.get(SiteCity),
                    parse_capacity(r.get(Capacity)),
                )
                .with_supervisor(supervisor);
                site.street = r.get(Street).to_string();
                site.phone = r.get(SitePhone).to_string();
                site.email = r.get(SiteEmail).to_string();
                site
            })
            .collect();

        tracing::debug!("Resolved {} sites", sites.len());
        Ok(sites)
    }
}

/// 容量解析：無法解析時預設 1，負值視為 0，小數無條件捨去
pub fn parse_capacity(raw: &str) -> u32 {
    let raw = raw.trim();
    if raw.is_empty() {
        return DEFAULT_CAPACITY;
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => value.max(0.0).min(u32::MAX as f64) as u32,
        _ => {
            tracing::warn!("⚠️ Unparseable capacity '{}', using {}", raw, DEFAULT_CAPACITY);
            DEFAULT_CAPACITY
        }
    }
}
