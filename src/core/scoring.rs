//! Student/site compatibility scoring.
//!
//! A score is the weighted sum of three components, each in `0..=100`:
//! field match, city match and special-request match. The bands are fixed
//! so scores stay informative without any fuzzy text similarity.

use crate::domain::model::{Site, SiteType, Student};
use crate::utils::error::{MatchError, Result};
use crate::utils::text::tokens;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const FIELD_NO_PREFERENCE: f64 = 50.0;
const FIELD_SITE_EMPTY: f64 = 40.0;
const FIELD_CONTAINED: f64 = 90.0;
const FIELD_TOKEN_OVERLAP: f64 = 75.0;
const FIELD_MISMATCH: f64 = 45.0;

const CITY_SAME: f64 = 100.0;
const CITY_DIFFERENT: f64 = 65.0;

const REQUEST_NONE: f64 = 70.0;
const REQUEST_VETO: f64 = 0.0;
const REQUEST_CLOSE_SAME_CITY: f64 = 90.0;
const REQUEST_CLOSE_OTHER_CITY: f64 = 55.0;
const REQUEST_OTHER: f64 = 75.0;

/// Ordered keyword -> site type rules. First hit wins.
const SITE_TYPE_RULES: &[(&str, SiteType)] = &[
    ("כלא", SiteType::Prison),
    ("בית סוהר", SiteType::Prison),
    ("prison", SiteType::Prison),
    ("בית חולים", SiteType::Hospital),
    ("מרכז רפואי", SiteType::Hospital),
    ("hospital", SiteType::Hospital),
    ("medical center", SiteType::Hospital),
    ("מרפאה", SiteType::HealthClinic),
    ("clinic", SiteType::HealthClinic),
    ("בי\"ס", SiteType::School),
    ("בית ספר", SiteType::School),
    ("תיכון", SiteType::School),
    ("school", SiteType::School),
    ("גן", SiteType::Kindergarten),
    ("kindergarten", SiteType::Kindergarten),
    ("מרכז קהילתי", SiteType::Community),
    ("community center", SiteType::Community),
    ("רווחה", SiteType::Welfare),
    ("welfare", SiteType::Welfare),
    ("חוסן", SiteType::MentalHealth),
    ("בריאות הנפש", SiteType::MentalHealth),
    ("mental health", SiteType::MentalHealth),
];

const EDUCATION_KEYWORDS: &[&str] = &["חינוך", "education"];

/// 推導場所類型：名稱 + 領域，連字號與 maqaf 視為空白，不分大小寫
pub fn detect_site_type(name: &str, field: &str) -> SiteType {
    let text = format!("{} {}", name, field)
        .replace(['־', '-'], " ")
        .to_lowercase();

    for (keyword, site_type) in SITE_TYPE_RULES {
        if text.contains(keyword) {
            return *site_type;
        }
    }

    let field_lower = field.to_lowercase();
    if EDUCATION_KEYWORDS.iter().any(|k| field_lower.contains(k)) {
        return SiteType::Education;
    }
    SiteType::Other
}

/// Component weights. Must be non-negative and sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub field: f64,
    pub city: f64,
    pub special: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            field: 0.70,
            city: 0.20,
            special: 0.10,
        }
    }
}

impl Weights {
    pub fn new(field: f64, city: f64, special: f64) -> Result<Self> {
        let weights = Self {
            field,
            city,
            special,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("matching.w_field", self.field),
            ("matching.w_city", self.city),
            ("matching.w_special", self.special),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(MatchError::InvalidConfigValueError {
                    field: name.to_string(),
                    value: value.to_string(),
                    reason: "Weight must be a non-negative number".to_string(),
                });
            }
        }

        let sum = self.field + self.city + self.special;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(MatchError::ConfigValidationError {
                field: "matching".to_string(),
                message: format!("Weights must sum to 1.0, got {:.4}", sum),
            });
        }
        Ok(())
    }
}

/// Phrases recognised inside a student's free-text special request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMarkers {
    pub no_hospital: Vec<String>,
    pub close_to_home: Vec<String>,
}

impl Default for RequestMarkers {
    fn default() -> Self {
        Self {
            no_hospital: ["לא בבית חולים", "not in hospital", "not in a hospital", "no hospital"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            close_to_home: ["קרוב", "close to home", "near home", "near my home"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl RequestMarkers {
    /// Replace the phrase lists that are given, keep defaults for the rest.
    pub fn with_overrides(
        mut self,
        no_hospital: Option<Vec<String>>,
        close_to_home: Option<Vec<String>>,
    ) -> Self {
        if let Some(no_hospital) = no_hospital {
            self.no_hospital = no_hospital;
        }
        if let Some(close_to_home) = close_to_home {
            self.close_to_home = close_to_home;
        }
        self
    }

    fn mentions(markers: &[String], request: &str) -> bool {
        let lower = request.to_lowercase();
        markers
            .iter()
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .any(|m| lower.contains(&m))
    }
}

/// Per-component scores, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub field: f64,
    pub city: f64,
    pub special: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Scorer {
    weights: Weights,
    markers: RequestMarkers,
}

impl Scorer {
    pub fn new(weights: Weights) -> Self {
        Self {
            weights,
            markers: RequestMarkers::default(),
        }
    }

    pub fn with_markers(mut self, markers: RequestMarkers) -> Self {
        self.markers = markers;
        self
    }

    pub fn weights(&self) -> Weights {
        self.weights
    }

    pub fn score(&self, student: &Student, site: &Site) -> f64 {
        self.breakdown(student, site).total
    }

    pub fn breakdown(&self, student: &Student, site: &Site) -> ScoreBreakdown {
        let same_city = same_city(student, site);
        let field = field_component(&student.preferred_field, &site.field);
        let city = if same_city { CITY_SAME } else { CITY_DIFFERENT };
        let special = self.special_component(&student.special_request, site.site_type, same_city);

        let total = (self.weights.field * field
            + self.weights.city * city
            + self.weights.special * special)
            .clamp(0.0, 100.0);

        ScoreBreakdown {
            field,
            city,
            special,
            total,
        }
    }

    fn special_component(&self, request: &str, site_type: SiteType, same_city: bool) -> f64 {
        let request = request.trim();
        if request.is_empty() {
            return REQUEST_NONE;
        }
        if site_type == SiteType::Hospital
            && RequestMarkers::mentions(&self.markers.no_hospital, request)
        {
            return REQUEST_VETO;
        }
        if RequestMarkers::mentions(&self.markers.close_to_home, request) {
            return if same_city {
                REQUEST_CLOSE_SAME_CITY
            } else {
                REQUEST_CLOSE_OTHER_CITY
            };
        }
        REQUEST_OTHER
    }
}

fn same_city(student: &Student, site: &Site) -> bool {
    let a = student.city.trim();
    let b = site.city.trim();
    !a.is_empty() && !b.is_empty() && a == b
}

pub fn field_component(preferred: &str, site_field: &str) -> f64 {
    let preferred = preferred.trim();
    if preferred.is_empty() {
        return FIELD_NO_PREFERENCE;
    }
    let site_field = site_field.trim();
    if site_field.is_empty() {
        return FIELD_SITE_EMPTY;
    }
    if site_field.contains(preferred) {
        return FIELD_CONTAINED;
    }

    let preferred_tokens: HashSet<&str> = tokens(preferred).into_iter().collect();
    if tokens(site_field)
        .iter()
        .any(|t| preferred_tokens.contains(t))
    {
        FIELD_TOKEN_OVERLAP
    } else {
        FIELD_MISMATCH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(preferred_field: &str, city: &str, request: &str) -> Student {
        Student {
            id: "1".to_string(),
            first_name: "Ruth".to_string(),
            last_name: "Cohen".to_string(),
            city: city.to_string(),
            preferred_field: preferred_field.to_string(),
            special_request: request.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_field_component_bands() {
        assert_eq!(field_component("welfare", "welfare services"), 90.0);
        assert_eq!(field_component("", "welfare services"), 50.0);
        assert_eq!(field_component("welfare", "  "), 40.0);
        assert_eq!(field_component("child welfare", "welfare/youth"), 75.0);
        assert_eq!(field_component("education", "mental health"), 45.0);
    }

    #[test]
    fn test_field_component_ignores_single_character_tokens() {
        assert_eq!(field_component("a b", "a-b c"), 45.0);
    }

    #[test]
    fn test_city_component() {
        let scorer = Scorer::default();
        let site = Site::new("Beit Lev", "welfare", "Tel Aviv", 1);

        assert_eq!(scorer.breakdown(&student("", "Tel Aviv", ""), &site).city, 100.0);
        assert_eq!(scorer.breakdown(&student("", "Haifa", ""), &site).city, 65.0);
        assert_eq!(scorer.breakdown(&student("", "tel aviv", ""), &site).city, 65.0);
        assert_eq!(scorer.breakdown(&student("", "", ""), &Site::new("x", "y", "", 1)).city, 65.0);
    }

    #[test]
    fn test_special_request_component() {
        let scorer = Scorer::default();
        let hospital = Site::new("Ichilov Hospital", "psychiatry", "Tel Aviv", 1);
        let welfare = Site::new("Beit Lev", "welfare", "Tel Aviv", 1);

        assert_eq!(scorer.breakdown(&student("", "Tel Aviv", ""), &welfare).special, 70.0);
        assert_eq!(
            scorer.breakdown(&student("", "Tel Aviv", "not in hospital please"), &hospital).special,
            0.0
        );
        assert_eq!(
            scorer.breakdown(&student("", "Tel Aviv", "not in hospital please"), &welfare).special,
            75.0
        );
        assert_eq!(
            scorer.breakdown(&student("", "Tel Aviv", "must be close to home"), &welfare).special,
            90.0
        );
        assert_eq!(
            scorer.breakdown(&student("", "Haifa", "must be close to home"), &welfare).special,
            55.0
        );
        assert_eq!(scorer.breakdown(&student("", "Haifa", "mornings only"), &welfare).special, 75.0);
    }

    #[test]
    fn test_close_marker_needs_the_full_phrase() {
        let scorer = Scorer::default();
        let welfare = Site::new("Beit Lev", "welfare", "Tel Aviv", 1);

        assert_eq!(
            scorer.breakdown(&student("", "Haifa", "closed on Fridays"), &welfare).special,
            75.0
        );
        assert_eq!(
            scorer.breakdown(&student("", "Tel Aviv", "somewhere near home"), &welfare).special,
            90.0
        );
    }

    #[test]
    fn test_custom_markers() {
        let markers = RequestMarkers::default()
            .with_overrides(None, Some(vec!["walking distance".to_string()]));
        let scorer = Scorer::default().with_markers(markers);
        let hospital = Site::new("Ichilov Hospital", "psychiatry", "Tel Aviv", 1);

        assert_eq!(
            scorer
                .breakdown(&student("", "Tel Aviv", "Walking distance please"), &hospital)
                .special,
            90.0
        );
        assert_eq!(
            scorer.breakdown(&student("", "Tel Aviv", "close to home"), &hospital).special,
            75.0
        );
        // 未覆寫的清單保留預設值
        assert_eq!(
            scorer.breakdown(&student("", "Tel Aviv", "no hospital"), &hospital).special,
            0.0
        );
    }

    #[test]
    fn test_hebrew_markers() {
        let scorer = Scorer::default();
        let hospital = Site::new("מרכז רפואי שיבא", "", "רמת גן", 1);
        assert_eq!(hospital.site_type, SiteType::Hospital);
        assert_eq!(
            scorer.breakdown(&student("", "רמת גן", "לא בבית חולים"), &hospital).special,
            0.0
        );
        assert_eq!(
            scorer.breakdown(&student("", "רמת גן", "קרוב לבית"), &hospital).special,
            90.0
        );
    }

    #[test]
    fn test_weighted_total() {
        let scorer = Scorer::default();
        let site = Site::new("Beit Lev", "welfare services", "Tel Aviv", 1);
        let total = scorer.score(&student("welfare", "Tel Aviv", ""), &site);
        // 0.7 * 90 + 0.2 * 100 + 0.1 * 70
        assert!((total - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_is_pure() {
        let scorer = Scorer::default();
        let site = Site::new("Beit Lev", "welfare services", "Haifa", 1);
        let s = student("youth", "Tel Aviv", "close to home");
        assert_eq!(scorer.score(&s, &site), scorer.score(&s, &site));
    }

    #[test]
    fn test_weights_validation() {
        assert!(Weights::default().validate().is_ok());
        assert!(Weights::new(0.5, 0.3, 0.2).is_ok());
        assert!(Weights::new(0.5, 0.5, 0.5).is_err());
        assert!(Weights::new(1.2, -0.1, -0.1).is_err());
    }

    #[test]
    fn test_detect_site_type_rules() {
        assert_eq!(detect_site_type("בית סוהר מעשיהו", ""), SiteType::Prison);
        assert_eq!(detect_site_type("מרפאת שיניים", "מרפאה"), SiteType::HealthClinic);
        assert_eq!(detect_site_type("תיכון עירוני", ""), SiteType::School);
        assert_eq!(detect_site_type("מרכז חוסן תל אביב", "בריאות הנפש"), SiteType::MentalHealth);
        assert_eq!(detect_site_type("Mental-Health Center", ""), SiteType::MentalHealth);
        assert_eq!(detect_site_type("Municipality", "special education"), SiteType::Education);
        assert_eq!(detect_site_type("Municipality", "youth"), SiteType::Other);
    }

    #[test]
    fn test_detect_site_type_first_rule_wins() {
        // "hospital" precedes "school" in the rule list
        assert_eq!(detect_site_type("Hospital School", ""), SiteType::Hospital);
    }
}
