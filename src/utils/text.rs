//! 文字正規化工具：欄位名稱比對、儲存格轉字串、斷詞

use unicode_normalization::UnicodeNormalization;

/// 儲存格值轉成去除前後空白的字串
///
/// 整數值的浮點數（試算表常見的 `2.0`）會輸出成 `2`。
pub fn cell_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => {
            if n.is_f64() {
                match n.as_f64() {
                    Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
                        format!("{}", f as i64)
                    }
                    _ => n.to_string(),
                }
            } else {
                n.to_string()
            }
        }
        other => other.to_string().trim().to_string(),
    }
}

/// Normalize a column header or keyword for fuzzy comparison.
///
/// Decomposes to NFD and drops combining marks (Latin accents, Hebrew
/// niqqud), replaces punctuation with spaces, lowercases, and collapses
/// whitespace. Quote marks are removed outright so that abbreviations such
/// as `ת"ז` normalize to `תז`.
pub fn normalize_header(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.nfd() {
        if unicode_normalization::char::is_combining_mark(c) {
            continue;
        }
        if matches!(c, '"' | '\'' | '״' | '׳' | '`' | '\u{201C}' | '\u{201D}') {
            continue;
        }
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else {
            out.push(' ');
        }
    }
    collapse_whitespace(&out)
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 斷詞：以逗號、斜線、連字號與空白切分，丟棄長度 <= 1 的詞
pub fn tokens(s: &str) -> Vec<&str> {
    s.split(|c: char| c == ',' || c == '/' || c == '-' || c.is_whitespace())
        .filter(|t| t.chars().count() > 1)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell_to_text() {
        assert_eq!(cell_to_text(&json!("  Tel Aviv ")), "Tel Aviv");
        assert_eq!(cell_to_text(&json!(null)), "");
        assert_eq!(cell_to_text(&json!(123456789)), "123456789");
        assert_eq!(cell_to_text(&json!(2.0)), "2");
        assert_eq!(cell_to_text(&json!(2.5)), "2.5");
        assert_eq!(cell_to_text(&json!(true)), "true");
    }

    #[test]
    fn test_normalize_header_strips_marks_and_punctuation() {
        assert_eq!(normalize_header("  Preferred   Field: "), "preferred field");
        assert_eq!(normalize_header("Café-Name"), "cafe name");
        assert_eq!(normalize_header("ת\"ז"), "תז");
        assert_eq!(normalize_header("בן/בת זוג"), "בן בת זוג");
    }

    #[test]
    fn test_tokens_drop_single_characters() {
        assert_eq!(
            tokens("welfare, mental-health / a  youth"),
            vec!["welfare", "mental", "health", "youth"]
        );
        assert!(tokens("").is_empty());
    }
}
