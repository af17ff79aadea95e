use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 原始資料列：欄位名稱 -> 儲存格值
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, serde_json::Value>,
}

impl Record {
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        Self {
            data: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// 已解析的表格：欄位順序 + 資料列
///
/// Column order is kept because the fuzzy column fallback returns the
/// first matching column in table order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    /// Build a table from header names and string rows, as read from CSV.
    pub fn from_rows<H, R, C>(headers: impl IntoIterator<Item = H>, rows: R) -> Self
    where
        H: Into<String>,
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let columns: Vec<String> = headers.into_iter().map(Into::into).collect();
        let mut table = Self::new(columns);
        for row in rows {
            let data = table
                .columns
                .iter()
                .cloned()
                .zip(row.into_iter().map(|v| serde_json::Value::String(v.into())))
                .collect();
            table.records.push(Record { data });
        }
        table
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 移除試算表匯出時產生的空白或 `Unnamed: N` 欄位
    pub fn drop_unnamed_columns(&mut self) -> usize {
        let dropped: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.trim().is_empty() || c.starts_with("Unnamed"))
            .cloned()
            .collect();

        if dropped.is_empty() {
            return 0;
        }

        self.columns.retain(|c| !dropped.contains(c));
        for record in &mut self.records {
            for column in &dropped {
                record.data.remove(column);
            }
        }
        dropped.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Student,
    Site,
}

impl EntityKind {
    /// 用於錯誤訊息與設定檔區段名稱（`[columns.students]`）
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Student => "students",
            EntityKind::Site => "sites",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical field names of the student and site schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    StudentId,
    FirstName,
    LastName,
    Address,
    City,
    Phone,
    Email,
    PreferredField,
    SpecialRequest,
    Partner,
    SiteName,
    SiteField,
    Street,
    SiteCity,
    Capacity,
    SupervisorFirstName,
    SupervisorLastName,
    SitePhone,
    SiteEmail,
}

impl CanonicalField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::StudentId => "id",
            CanonicalField::FirstName => "first_name",
            CanonicalField::LastName => "last_name",
            CanonicalField::Address => "address",
            CanonicalField::City => "city",
            CanonicalField::Phone => "phone",
            CanonicalField::Email => "email",
            CanonicalField::PreferredField => "preferred_field",
            CanonicalField::SpecialRequest => "special_request",
            CanonicalField::Partner => "partner",
            CanonicalField::SiteName => "name",
            CanonicalField::SiteField => "field",
            CanonicalField::Street => "street",
            CanonicalField::SiteCity => "city",
            CanonicalField::Capacity => "capacity",
            CanonicalField::SupervisorFirstName => "supervisor_first_name",
            CanonicalField::SupervisorLastName => "supervisor_last_name",
            CanonicalField::SitePhone => "phone",
            CanonicalField::SiteEmail => "email",
        }
    }

    /// 依設定檔鍵名查找欄位（`[columns.<entity>]` 下的鍵）
    pub fn from_config_key(entity: EntityKind, key: &str) -> Option<Self> {
        let fields: &[CanonicalField] = match entity {
            EntityKind::Student => &[
                CanonicalField::StudentId,
                CanonicalField::FirstName,
                CanonicalField::LastName,
                CanonicalField::Address,
                CanonicalField::City,
                CanonicalField::Phone,
                CanonicalField::Email,
                CanonicalField::PreferredField,
                CanonicalField::SpecialRequest,
                CanonicalField::Partner,
            ],
            EntityKind::Site => &[
                CanonicalField::SiteName,
                CanonicalField::SiteField,
                CanonicalField::Street,
                CanonicalField::SiteCity,
                CanonicalField::Capacity,
                CanonicalField::SupervisorFirstName,
                CanonicalField::SupervisorLastName,
                CanonicalField::SitePhone,
                CanonicalField::SiteEmail,
            ],
        };
        fields.iter().copied().find(|f| f.as_str() == key)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row mapped onto a canonical schema. Absent fields read as "".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalRecord {
    values: HashMap<CanonicalField, String>,
}

impl CanonicalRecord {
    pub fn get(&self, field: CanonicalField) -> &str {
        self.values.get(&field).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, field: CanonicalField, value: String) {
        self.values.insert(field, value);
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.values.contains_key(&field)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub phone: String,
    pub email: String,
    pub preferred_field: String,
    pub special_request: String,
    pub partner_reference: String,
}

impl Student {
    pub fn new(id: impl Into<String>, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Default::default()
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// 實習場所分類，由名稱與領域文字推導
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteType {
    Prison,
    Hospital,
    HealthClinic,
    School,
    Kindergarten,
    Community,
    Welfare,
    MentalHealth,
    Education,
    Other,
}

impl SiteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteType::Prison => "prison",
            SiteType::Hospital => "hospital",
            SiteType::HealthClinic => "health_clinic",
            SiteType::School => "school",
            SiteType::Kindergarten => "kindergarten",
            SiteType::Community => "community",
            SiteType::Welfare => "welfare",
            SiteType::MentalHealth => "mental_health",
            SiteType::Education => "education",
            SiteType::Other => "other",
        }
    }

    /// Hebrew label used in exported result files.
    pub fn label_he(&self) -> &'static str {
        match self {
            SiteType::Prison => "כלא",
            SiteType::Hospital => "בית חולים",
            SiteType::HealthClinic => "בריאות",
            SiteType::School => "בית ספר",
            SiteType::Kindergarten => "גן ילדים",
            SiteType::Community => "קהילה",
            SiteType::Welfare => "רווחה",
            SiteType::MentalHealth => "בריאות הנפש",
            SiteType::Education => "חינוך",
            SiteType::Other => "אחר",
        }
    }
}

impl fmt::Display for SiteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    pub field: String,
    pub city: String,
    pub street: String,
    pub capacity: u32,
    pub remaining_capacity: u32,
    pub supervisor_name: String,
    pub phone: String,
    pub email: String,
    pub site_type: SiteType,
}

impl Site {
    /// 建立場所並推導類型；剩餘名額初始化為容量
    pub fn new(
        name: impl Into<String>,
        field: impl Into<String>,
        city: impl Into<String>,
        capacity: u32,
    ) -> Self {
        let name = name.into();
        let field = field.into();
        let site_type = crate::core::scoring::detect_site_type(&name, &field);
        Self {
            name,
            field,
            city: city.into(),
            street: String::new(),
            capacity,
            remaining_capacity: capacity,
            supervisor_name: String::new(),
            phone: String::new(),
            email: String::new(),
            site_type,
        }
    }

    pub fn with_supervisor(mut self, supervisor_name: impl Into<String>) -> Self {
        self.supervisor_name = supervisor_name.into().trim().to_string();
        self
    }

    pub fn has_capacity(&self) -> bool {
        self.remaining_capacity > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    Couples,
    Singles,
}

/// 單一學生的分配結果；`site_index == None` 表示未分配
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub student_index: usize,
    pub student_id: String,
    pub site_index: Option<usize>,
    pub score: Option<f64>,
    pub phase: MatchPhase,
}

impl Assignment {
    pub fn is_assigned(&self) -> bool {
        self.site_index.is_some()
    }
}

/// 兩份輸入表格（學生、場所）
#[derive(Debug, Clone, Default)]
pub struct InputTables {
    pub students: RawTable,
    pub sites: RawTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderLanguage {
    #[default]
    He,
    En,
}

/// One line of the exported result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub phone: String,
    pub email: String,
    /// Rounded to one decimal; `None` when unassigned.
    pub match_percent: Option<f64>,
    pub site_name: String,
    pub site_city: String,
    pub site_type: String,
    pub site_field: String,
    pub status: String,
}

impl ExportRow {
    pub fn headers(language: HeaderLanguage) -> [&'static str; 13] {
        match language {
            HeaderLanguage::He => [
                "ת\"ז הסטודנט",
                "שם פרטי",
                "שם משפחה",
                "כתובת",
                "עיר",
                "מספר טלפון",
                "אימייל",
                "אחוז התאמה",
                "שם מקום ההתמחות",
                "עיר המוסד",
                "סוג מקום השיבוץ",
                "תחום ההתמחות במוסד",
                "סטטוס",
            ],
            HeaderLanguage::En => [
                "student_id",
                "first_name",
                "last_name",
                "address",
                "city",
                "phone",
                "email",
                "match_percent",
                "site_name",
                "site_city",
                "site_type",
                "site_field",
                "status",
            ],
        }
    }

    pub fn values(&self) -> [String; 13] {
        [
            self.student_id.clone(),
            self.first_name.clone(),
            self.last_name.clone(),
            self.address.clone(),
            self.city.clone(),
            self.phone.clone(),
            self.email.clone(),
            self.match_percent
                .map(|p| format!("{:.1}", p))
                .unwrap_or_default(),
            self.site_name.clone(),
            self.site_city.clone(),
            self.site_type.clone(),
            self.site_field.clone(),
            self.status.clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteUsage {
    pub name: String,
    pub capacity: u32,
    pub assigned: u32,
    pub remaining: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub stats: crate::core::engine::MatchStats,
    pub partner_pairs: usize,
    pub sites: Vec<SiteUsage>,
}

/// transform 階段輸出：匯出列 + 執行摘要
#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    pub rows: Vec<ExportRow>,
    pub summary: RunSummary,
}
