//! Greedy assignment of students to sites.
//!
//! A run goes `Init -> CouplesPhase -> SinglesPhase -> Done`. Mutual
//! partners are placed first, at two different sites (and, unless
//! disabled, under two different supervisors), maximizing the sum of their
//! scores over both top-K candidate lists. Everyone left is then placed at
//! their best remaining site in input order. Nothing is ever reassigned.

use crate::core::partners::PartnerMap;
use crate::core::scoring::{Scorer, Weights};
use crate::domain::model::{Assignment, MatchPhase, Site, Student};
use serde::Serialize;
use std::collections::HashMap;

pub const DEFAULT_TOP_K: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    /// Candidate list length per student in the couples phase.
    pub top_k: usize,
    /// Keep partners away from a shared (non-empty) supervisor.
    pub separate_partners: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            separate_partners: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Init,
    CouplesPhase,
    SinglesPhase,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub site_index: usize,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchStats {
    pub students: usize,
    pub couples_placed: usize,
    pub singles_placed: usize,
    pub unassigned: usize,
    pub total_capacity: u64,
    pub remaining_capacity: u64,
}

#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// One assignment per student, in student input order.
    pub assignments: Vec<Assignment>,
    pub partners: PartnerMap,
    pub stats: MatchStats,
}

#[derive(Debug, Clone, Default)]
pub struct MatchEngine {
    scorer: Scorer,
    options: MatchOptions,
}

/// Run-local bookkeeping.
struct MatchRun {
    state: EngineState,
    processed: Vec<bool>,
    slots: Vec<Option<Assignment>>,
}

impl MatchRun {
    fn new(students: usize) -> Self {
        Self {
            state: EngineState::Init,
            processed: vec![false; students],
            slots: vec![None; students],
        }
    }

    fn advance(&mut self, next: EngineState) {
        tracing::debug!("⚙️ Matching state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn record(&mut self, students: &[Student], index: usize, candidate: Option<Candidate>, phase: MatchPhase) {
        self.processed[index] = true;
        self.slots[index] = Some(Assignment {
            student_index: index,
            student_id: students[index].id.clone(),
            site_index: candidate.map(|c| c.site_index),
            score: candidate.map(|c| c.score),
            phase,
        });
    }
}

impl MatchEngine {
    pub fn new(scorer: Scorer, options: MatchOptions) -> Self {
        Self { scorer, options }
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn options(&self) -> MatchOptions {
        self.options
    }

    /// Sites with remaining capacity, best first, ties in site order,
    /// truncated to `top_k`.
    pub fn candidates(&self, student: &Student, sites: &[Site]) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = sites
            .iter()
            .enumerate()
            .filter(|(_, site)| site.has_capacity())
            .map(|(site_index, site)| Candidate {
                site_index,
                score: self.scorer.score(student, site),
            })
            .collect();

        // sort_by 為穩定排序，同分保留原始場所順序
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(self.options.top_k.max(1));
        candidates
    }

    pub fn run(&self, students: &[Student], sites: &mut [Site]) -> MatchOutcome {
        let partners = PartnerMap::resolve(students);
        self.run_with_partners(students, sites, partners)
    }

    pub fn run_with_partners(
        &self,
        students: &[Student],
        sites: &mut [Site],
        partners: PartnerMap,
    ) -> MatchOutcome {
        let mut run = MatchRun::new(students.len());
        let first_index = index_by_id(students);

        run.advance(EngineState::CouplesPhase);
        let mut couples_placed = 0;

        for index in 0..students.len() {
            if run.processed[index] {
                continue;
            }
            let student = &students[index];
            let Some(partner_id) = partners.partner_of(&student.id) else {
                continue;
            };
            if partners.partner_of(partner_id) != Some(student.id.as_str()) {
                continue;
            }
            let Some(&partner_index) = first_index.get(partner_id) else {
                continue;
            };
            if partner_index == index || run.processed[partner_index] {
                continue;
            }

            let first = self.candidates(student, sites);
            let second = self.candidates(&students[partner_index], sites);

            match self.best_pair(&first, &second, sites) {
                Some((a, b)) => {
                    sites[a.site_index].remaining_capacity -= 1;
                    sites[b.site_index].remaining_capacity -= 1;
                    run.record(students, index, Some(a), MatchPhase::Couples);
                    run.record(students, partner_index, Some(b), MatchPhase::Couples);
                    couples_placed += 1;
                    tracing::debug!(
                        "👥 Couple {} + {} -> '{}' / '{}'",
                        student.id,
                        partner_id,
                        sites[a.site_index].name,
                        sites[b.site_index].name
                    );
                }
                None => {
                    tracing::debug!(
                        "👥 No valid site pair for {} + {}, placing them individually",
                        student.id,
                        partner_id
                    );
                }
            }
        }

        run.advance(EngineState::SinglesPhase);
        let mut singles_placed = 0;
        let mut unassigned = 0;

        for index in 0..students.len() {
            if run.processed[index] {
                continue;
            }
            let best = self.candidates(&students[index], sites).into_iter().next();
            match best {
                Some(candidate) => {
                    sites[candidate.site_index].remaining_capacity -= 1;
                    singles_placed += 1;
                }
                None => {
                    tracing::debug!("🚫 No capacity left for student {}", students[index].id);
                    unassigned += 1;
                }
            }
            run.record(students, index, best, MatchPhase::Singles);
        }

        run.advance(EngineState::Done);

        let stats = MatchStats {
            students: students.len(),
            couples_placed,
            singles_placed,
            unassigned,
            total_capacity: sites.iter().map(|s| u64::from(s.capacity)).sum(),
            remaining_capacity: sites.iter().map(|s| u64::from(s.remaining_capacity)).sum(),
        };

        MatchOutcome {
            assignments: run.slots.into_iter().flatten().collect(),
            partners,
            stats,
        }
    }

    /// Best `(site_i, site_j)` over the cross product of both candidate
    /// lists; the first strictly better pair wins ties.
    fn best_pair(
        &self,
        first: &[Candidate],
        second: &[Candidate],
        sites: &[Site],
    ) -> Option<(Candidate, Candidate)> {
        let mut best: Option<(f64, Candidate, Candidate)> = None;

        for a in first {
            for b in second {
                if a.site_index == b.site_index {
                    continue;
                }
                if self.options.separate_partners
                    && share_supervisor(&sites[a.site_index], &sites[b.site_index])
                {
                    continue;
                }
                let total = a.score + b.score;
                if best.map_or(true, |(score, _, _)| total > score) {
                    best = Some((total, *a, *b));
                }
            }
        }

        best.map(|(_, a, b)| (a, b))
    }
}

fn share_supervisor(a: &Site, b: &Site) -> bool {
    !a.supervisor_name.is_empty() && a.supervisor_name == b.supervisor_name
}

/// First row index for each student id.
fn index_by_id(students: &[Student]) -> HashMap<&str, usize> {
    let mut first_index = HashMap::with_capacity(students.len());
    for (index, student) in students.iter().enumerate() {
        if first_index.contains_key(student.id.as_str()) {
            tracing::warn!("⚠️ Duplicate student id '{}' at row {}", student.id, index + 1);
            continue;
        }
        first_index.insert(student.id.as_str(), index);
    }
    first_index
}

/// Match with default options and the given weights.
pub fn match_students(students: &[Student], sites: &mut [Site], weights: Weights) -> Vec<Assignment> {
    MatchEngine::new(Scorer::new(weights), MatchOptions::default())
        .run(students, sites)
        .assignments
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn student(id: &str, field: &str, city: &str, partner: &str) -> Student {
        Student {
            preferred_field: field.to_string(),
            city: city.to_string(),
            partner_reference: partner.to_string(),
            ..Student::new(id, format!("First{id}"), format!("Last{id}"))
        }
    }

    fn site(name: &str, field: &str, city: &str, capacity: u32, supervisor: &str) -> Site {
        Site::new(name, field, city, capacity).with_supervisor(supervisor)
    }

    fn placements_per_site(assignments: &[Assignment], sites: usize) -> Vec<u32> {
        let mut counts = vec![0; sites];
        for a in assignments {
            if let Some(i) = a.site_index {
                counts[i] += 1;
            }
        }
        counts
    }

    #[test]
    fn test_singles_take_best_site_in_input_order() {
        let students = vec![
            student("1", "welfare", "Haifa", ""),
            student("2", "welfare", "Haifa", ""),
        ];
        let mut sites = vec![
            site("Beit Lev", "education", "Eilat", 1, ""),
            site("Welfare Office", "welfare services", "Haifa", 1, ""),
        ];

        let outcome = MatchEngine::default().run(&students, &mut sites);

        assert_eq!(outcome.assignments[0].site_index, Some(1));
        assert_eq!(outcome.assignments[1].site_index, Some(0));
        assert!(outcome
            .assignments
            .iter()
            .all(|a| a.phase == MatchPhase::Singles));
        assert_eq!(sites[0].remaining_capacity, 0);
        assert_eq!(sites[1].remaining_capacity, 0);
    }

    #[test]
    fn test_mutual_partners_placed_in_couples_phase() {
        let students = vec![
            student("1", "welfare", "Tel Aviv", "2"),
            student("2", "welfare", "Tel Aviv", "1"),
        ];
        let mut sites = vec![
            site("Welfare North", "welfare", "Tel Aviv", 2, "Dana Levi"),
            site("Welfare South", "welfare", "Tel Aviv", 2, "Avi Cohen"),
        ];

        let outcome = MatchEngine::default().run(&students, &mut sites);

        let a = &outcome.assignments[0];
        let b = &outcome.assignments[1];
        assert_eq!(a.phase, MatchPhase::Couples);
        assert_eq!(b.phase, MatchPhase::Couples);
        assert!(a.is_assigned() && b.is_assigned());
        assert_ne!(a.site_index, b.site_index);
        assert_eq!(outcome.stats.couples_placed, 1);
        assert_eq!(outcome.stats.singles_placed, 0);
    }

    #[test]
    fn test_shared_supervisor_sends_couple_to_singles_phase() {
        let students = vec![
            student("1", "welfare", "Tel Aviv", "2"),
            student("2", "welfare", "Tel Aviv", "1"),
        ];
        let mut sites = vec![
            site("Welfare North", "welfare", "Tel Aviv", 1, "Dana Levi"),
            site("Welfare South", "welfare", "Tel Aviv", 1, "Dana Levi"),
        ];

        let outcome = MatchEngine::default().run(&students, &mut sites);

        assert!(outcome
            .assignments
            .iter()
            .all(|a| a.phase == MatchPhase::Singles && a.is_assigned()));
        assert_eq!(outcome.stats.couples_placed, 0);
    }

    #[test]
    fn test_shared_supervisor_allowed_when_separation_disabled() {
        let students = vec![
            student("1", "welfare", "Tel Aviv", "2"),
            student("2", "welfare", "Tel Aviv", "1"),
        ];
        let mut sites = vec![
            site("Welfare North", "welfare", "Tel Aviv", 1, "Dana Levi"),
            site("Welfare South", "welfare", "Tel Aviv", 1, "Dana Levi"),
        ];
        let engine = MatchEngine::new(
            Scorer::default(),
            MatchOptions {
                separate_partners: false,
                ..Default::default()
            },
        );

        let outcome = engine.run(&students, &mut sites);
        assert_eq!(outcome.stats.couples_placed, 1);
    }

    #[test]
    fn test_couple_never_shares_a_site() {
        let students = vec![
            student("1", "welfare", "Tel Aviv", "2"),
            student("2", "welfare", "Tel Aviv", "1"),
        ];
        let mut sites = vec![site("Welfare North", "welfare", "Tel Aviv", 2, "")];

        let outcome = MatchEngine::default().run(&students, &mut sites);

        // only one site: no couple pair exists, both are placed as singles
        assert_eq!(outcome.stats.couples_placed, 0);
        assert_eq!(outcome.stats.singles_placed, 2);
        assert_eq!(sites[0].remaining_capacity, 0);
    }

    #[test]
    fn test_top_k_bounds_couple_search() {
        let students = vec![
            student("1", "welfare", "Tel Aviv", "2"),
            student("2", "welfare", "Tel Aviv", "1"),
        ];
        let sites = vec![
            site("Welfare North", "welfare", "Tel Aviv", 2, ""),
            site("Youth Club", "youth", "Haifa", 2, ""),
        ];

        let narrow = MatchEngine::new(
            Scorer::default(),
            MatchOptions {
                top_k: 1,
                ..Default::default()
            },
        );
        let outcome = narrow.run(&students, &mut sites.clone());
        assert_eq!(outcome.stats.couples_placed, 0);

        let outcome = MatchEngine::default().run(&students, &mut sites.clone());
        assert_eq!(outcome.stats.couples_placed, 1);
    }

    #[test]
    fn test_all_sites_full_yields_unassigned() {
        let students = vec![student("1", "welfare", "Haifa", ""), student("2", "", "", "")];
        let mut sites = vec![site("Welfare Office", "welfare", "Haifa", 1, "")];

        let outcome = MatchEngine::default().run(&students, &mut sites);

        assert!(outcome.assignments[0].is_assigned());
        let last = &outcome.assignments[1];
        assert_eq!(last.site_index, None);
        assert_eq!(last.score, None);
        assert_eq!(outcome.stats.unassigned, 1);
    }

    #[test]
    fn test_zero_capacity_site_is_never_used() {
        let students = vec![student("1", "welfare", "Haifa", "")];
        let mut sites = vec![
            site("Welfare Office", "welfare", "Haifa", 0, ""),
            site("Youth Club", "youth", "Eilat", 1, ""),
        ];

        let outcome = MatchEngine::default().run(&students, &mut sites);
        assert_eq!(outcome.assignments[0].site_index, Some(1));
    }

    #[test]
    fn test_capacity_and_single_assignment_invariants() {
        let fields = ["welfare", "education", "mental health", ""];
        let cities = ["Haifa", "Tel Aviv", ""];
        let students: Vec<Student> = (0..40)
            .map(|i| {
                let partner = if i % 5 == 0 {
                    (i + 1).to_string()
                } else if i % 5 == 1 {
                    (i - 1).to_string()
                } else {
                    String::new()
                };
                student(&i.to_string(), fields[i % 4], cities[i % 3], &partner)
            })
            .collect();
        let mut sites: Vec<Site> = (0..8)
            .map(|i| {
                site(
                    &format!("Site {i}"),
                    fields[i % 4],
                    cities[i % 3],
                    (i % 4) as u32 + 1,
                    if i % 2 == 0 { "Dana" } else { "" },
                )
            })
            .collect();
        let capacities: Vec<u32> = sites.iter().map(|s| s.capacity).collect();

        let outcome = MatchEngine::default().run(&students, &mut sites);

        assert_eq!(outcome.assignments.len(), students.len());
        let indices: HashSet<usize> = outcome.assignments.iter().map(|a| a.student_index).collect();
        assert_eq!(indices.len(), students.len());

        let counts = placements_per_site(&outcome.assignments, sites.len());
        for (i, count) in counts.iter().enumerate() {
            assert!(*count <= capacities[i]);
            assert_eq!(sites[i].remaining_capacity, capacities[i] - count);
        }

        let total: u32 = capacities.iter().sum();
        assert_eq!(outcome.stats.unassigned, students.len() - total as usize);
    }

    #[test]
    fn test_run_is_deterministic() {
        let students = vec![
            student("1", "welfare", "Haifa", "3"),
            student("2", "education", "Haifa", ""),
            student("3", "welfare", "Tel Aviv", "1"),
            student("4", "", "Tel Aviv", ""),
        ];
        let sites = vec![
            site("A", "welfare", "Haifa", 1, "Dana"),
            site("B", "welfare", "Tel Aviv", 1, "Dana"),
            site("C", "education", "Haifa", 1, "Avi"),
            site("D", "education", "Tel Aviv", 1, ""),
        ];

        let first = MatchEngine::default().run(&students, &mut sites.clone());
        let second = MatchEngine::default().run(&students, &mut sites.clone());
        assert_eq!(first.assignments, second.assignments);
    }

    #[test]
    fn test_duplicate_ids_still_get_one_assignment_each() {
        let students = vec![student("7", "welfare", "Haifa", ""), student("7", "welfare", "Haifa", "")];
        let mut sites = vec![site("Welfare Office", "welfare", "Haifa", 2, "")];

        let assignments = match_students(&students, &mut sites, Weights::default());
        assert_eq!(assignments.len(), 2);
        assert!(assignments.iter().all(Assignment::is_assigned));
    }
}
