use crate::domain::model::Student;
use std::collections::{HashMap, HashSet};

/// Student id -> partner id, holding only mutually declared pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartnerMap {
    pairs: HashMap<String, String>,
}

impl PartnerMap {
    /// 從學生名單建立對稱的搭檔對應
    pub fn resolve(students: &[Student]) -> Self {
        let declared = declared_partners(students);

        let pairs: HashMap<String, String> = declared
            .iter()
            .filter(|&(a, b)| declared.get(b.as_str()) == Some(a))
            .map(|(a, b)| (a.clone(), b.clone()))
            .collect();

        for (a, b) in &declared {
            if !pairs.contains_key(a) {
                tracing::debug!("👥 One-sided partner declaration ignored: {} -> {}", a, b);
            }
        }

        Self { pairs }
    }

    pub fn partner_of(&self, student_id: &str) -> Option<&str> {
        self.pairs.get(student_id).map(String::as_str)
    }

    /// Number of pairs (each pair counted once).
    pub fn pair_count(&self) -> usize {
        self.pairs.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(a, b)| (a.as_str(), b.as_str()))
    }
}

/// Raw (possibly one-sided) partner declarations.
///
/// A reference equal to another student's id wins; otherwise the first
/// other student, in input order, whose full name contains the reference.
pub fn declared_partners(students: &[Student]) -> HashMap<String, String> {
    let ids: HashSet<&str> = students.iter().map(|s| s.id.as_str()).collect();
    let mut declared = HashMap::new();

    for student in students {
        let reference = student.partner_reference.trim();
        if reference.is_empty() {
            continue;
        }

        if reference != student.id && ids.contains(reference) {
            declared.insert(student.id.clone(), reference.to_string());
            continue;
        }

        let by_name = students.iter().find(|other| {
            if other.id == student.id {
                return false;
            }
            let full_name = other.full_name();
            !full_name.is_empty() && full_name.contains(reference)
        });

        match by_name {
            Some(other) => {
                declared.insert(student.id.clone(), other.id.clone());
            }
            None => {
                tracing::debug!(
                    "👥 Partner reference '{}' of student {} matched nobody",
                    reference,
                    student.id
                );
            }
        }
    }

    declared
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: &str, first: &str, last: &str, partner: &str) -> Student {
        Student {
            partner_reference: partner.to_string(),
            ..Student::new(id, first, last)
        }
    }

    #[test]
    fn test_mutual_id_references_pair_up() {
        let students = vec![
            student("1", "Ruth", "Cohen", "2"),
            student("2", "Yoav", "Levi", "1"),
            student("3", "Noa", "Katz", ""),
        ];

        let map = PartnerMap::resolve(&students);
        assert_eq!(map.partner_of("1"), Some("2"));
        assert_eq!(map.partner_of("2"), Some("1"));
        assert_eq!(map.partner_of("3"), None);
        assert_eq!(map.pair_count(), 1);
    }

    #[test]
    fn test_name_fragment_reference() {
        let students = vec![
            student("1", "Ruth", "Cohen", "Yoav Levi"),
            student("2", "Yoav", "Levi", "Cohen"),
        ];

        let map = PartnerMap::resolve(&students);
        assert_eq!(map.partner_of("1"), Some("2"));
        assert_eq!(map.partner_of("2"), Some("1"));
    }

    #[test]
    fn test_one_sided_declaration_is_dropped() {
        let students = vec![
            student("1", "Ruth", "Cohen", "2"),
            student("2", "Yoav", "Levi", ""),
        ];

        let declared = declared_partners(&students);
        assert_eq!(declared.get("1").map(String::as_str), Some("2"));
        assert!(PartnerMap::resolve(&students).is_empty());
    }

    #[test]
    fn test_self_reference_is_ignored() {
        let students = vec![student("1", "Ruth", "Cohen", "1")];
        assert!(declared_partners(&students).is_empty());
    }

    #[test]
    fn test_ambiguous_name_takes_first_in_input_order() {
        let students = vec![
            student("1", "Ruth", "Cohen", "Levi"),
            student("2", "Yoav", "Levi", "1"),
            student("3", "Dana", "Levi", "1"),
        ];

        let map = PartnerMap::resolve(&students);
        assert_eq!(map.partner_of("1"), Some("2"));
        assert_eq!(map.partner_of("3"), None);
    }

    #[test]
    fn test_map_is_symmetric() {
        let students = vec![
            student("1", "Ruth", "Cohen", "2"),
            student("2", "Yoav", "Levi", "1"),
            student("3", "Dana", "Katz", "Ruth"),
            student("4", "Omer", "Bar", "Dana Katz"),
            student("5", "Tal", "Gil", "4"),
        ];

        let map = PartnerMap::resolve(&students);
        for (a, b) in map.iter() {
            assert_eq!(map.partner_of(b), Some(a));
        }
    }
}
