//! End-to-end engine facade.
//!
//! [`Engine`] holds one student snapshot and one rule set and runs
//! assignment requests against them: compile the rules, validate the
//! constraint graph, collapse the cohort, search, evaluate, assemble.
//! Build it once and run several requests to compare methods or seeds
//! over the same snapshot.

use chrono::Utc;
use tracing::{debug, info};

use crate::assemble::assemble_detail;
use crate::cohort::Cohort;
use crate::compile::compile_rules;
use crate::constraint::ConstraintGraph;
use crate::error::{EngineError, EngineResult};
use crate::model::{AssignmentDetail, AssignmentRequest, Rule, Student};
use crate::optimize::{optimize, RunControl, SearchContext};

pub struct Engine<'a> {
    students: &'a [Student],
    rules: &'a [Rule],
}

impl<'a> Engine<'a> {
    pub fn new(students: &'a [Student], rules: &'a [Rule]) -> Self {
        Self { students, rules }
    }

    /// Runs one request with default controls: random seed, no time
    /// limit, no cancellation.
    pub fn run(&self, request: &AssignmentRequest) -> EngineResult<AssignmentDetail> {
        self.run_with_control(request, &RunControl::default())
    }

    /// Runs one request end to end.
    pub fn run_with_control(
        &self,
        request: &AssignmentRequest,
        control: &RunControl,
    ) -> EngineResult<AssignmentDetail> {
        self.validate_request(request)?;
        info!(
            school_id = request.school_id,
            grade = request.grade,
            num_classes = request.num_classes,
            method = ?request.method,
            "starting assignment run"
        );

        let compiled = compile_rules(self.rules)?;
        let graph = ConstraintGraph::build(self.students, &compiled.constraints)?;
        let cohort = Cohort::collapse(self.students, &graph);
        debug!(
            students = self.students.len(),
            units = cohort.unit_count(),
            scorers = compiled.scorers.len(),
            constraints = compiled.constraints.len(),
            "cohort prepared"
        );

        let ctx = SearchContext {
            cohort: &cohort,
            scorers: &compiled.scorers,
            distribution_matchers: &compiled.distribution_matchers,
            num_classes: request.num_classes,
        };
        let partition = optimize(&ctx, request.method, request.clamped_iterations(), control)?;
        let detail = assemble_detail(request, &cohort, &partition, &compiled, Utc::now());
        info!(
            method = ?request.method,
            total_score = detail.assignment.total_score,
            "assignment complete"
        );
        Ok(detail)
    }

    fn validate_request(&self, request: &AssignmentRequest) -> EngineResult<()> {
        if self.students.is_empty() {
            return Err(EngineError::InvalidRequest {
                reason: "student list is empty".into(),
            });
        }
        if request.num_classes == 0 {
            return Err(EngineError::InvalidRequest {
                reason: "num_classes must be at least 1".into(),
            });
        }
        if self.students.len() < request.num_classes as usize {
            return Err(EngineError::InvalidRequest {
                reason: format!(
                    "cannot fill {} classes from {} students",
                    request.num_classes,
                    self.students.len()
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BalanceTarget, Method, RuleDefinition};
    use crate::optimize::GeneticConfig;

    fn gendered_students(n: i64) -> Vec<Student> {
        (1..=n)
            .map(|i| {
                Student::new(i, format!("s{i}"), if i % 2 == 0 { "여" } else { "남" })
                    .with_field("성적", 50.0 + (i % 40) as f64)
            })
            .collect()
    }

    fn request(num_classes: u32, method: Method) -> AssignmentRequest {
        AssignmentRequest::new(1, 1, 2025, num_classes, "1학년 배정").with_method(method)
    }

    // ---- request validation ----

    #[test]
    fn test_empty_snapshot_rejected() {
        let engine = Engine::new(&[], &[]);
        let err = engine.run(&request(2, Method::Greedy)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest { .. }));
    }

    #[test]
    fn test_zero_classes_rejected() {
        let students = gendered_students(4);
        let engine = Engine::new(&students, &[]);
        let err = engine.run(&request(0, Method::Greedy)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest { .. }));
    }

    #[test]
    fn test_more_classes_than_students_rejected() {
        let students = gendered_students(3);
        let engine = Engine::new(&students, &[]);
        let err = engine.run(&request(5, Method::Greedy)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest { .. }));
    }

    #[test]
    fn test_conflicting_constraints_surface() {
        let students = gendered_students(4);
        let rules = vec![
            Rule::new(1, "함께", RuleDefinition::together(vec![1, 2])),
            Rule::new(2, "분리", RuleDefinition::separate(vec![1, 2])),
        ];
        let engine = Engine::new(&students, &rules);
        let err = engine.run(&request(2, Method::Greedy)).unwrap_err();
        assert_eq!(
            err,
            EngineError::ConstraintConflict {
                student_a: 1,
                student_b: 2
            }
        );
    }

    // ---- end-to-end scenarios ----

    #[test]
    fn test_gender_balance_end_to_end() {
        let students = gendered_students(20);
        let rules = vec![Rule::new(
            1,
            "성별 균형",
            RuleDefinition::balance("gender", BalanceTarget::Equal, 1.0),
        )];
        let engine = Engine::new(&students, &rules);

        let detail = engine.run(&request(2, Method::Greedy)).unwrap();
        let stats = &detail.assignment.statistics;
        assert_eq!(stats.total_students, 20);
        assert_eq!(stats.class_sizes.values().sum::<usize>(), 20);
        assert!(stats.class_sizes[&0].abs_diff(stats.class_sizes[&1]) <= 1);
        for class in 0..2 {
            let genders = &stats.gender_distribution[&class];
            assert!(genders["남"].abs_diff(genders["여"]) <= 1);
        }
        assert!(detail.assignment.total_score >= 99.0);
    }

    #[test]
    fn test_every_method_respects_hard_constraints() {
        let students = gendered_students(10);
        let rules = vec![
            Rule::new(1, "균형", RuleDefinition::balance("gender", BalanceTarget::Equal, 2.0)),
            Rule::new(2, "함께", RuleDefinition::together(vec![1, 2])),
            Rule::new(3, "분리", RuleDefinition::separate(vec![3, 4])),
        ];
        let engine = Engine::new(&students, &rules);

        for method in [Method::Random, Method::Greedy, Method::Genetic] {
            let control = RunControl::new().with_seed(17);
            let detail = engine
                .run_with_control(&request(3, method), &control)
                .unwrap();

            let class_of = |id: i64| {
                detail
                    .classes
                    .iter()
                    .find(|(_, roster)| roster.iter().any(|s| s.id == id))
                    .map(|(class, _)| *class)
            };
            assert_eq!(class_of(1), class_of(2), "{method:?} split a together pair");
            assert_ne!(class_of(3), class_of(4), "{method:?} joined a separate pair");
        }
    }

    #[test]
    fn test_seeded_runs_return_identical_rosters() {
        let students = gendered_students(18);
        let rules = vec![Rule::new(
            1,
            "성적 균형",
            RuleDefinition::balance("성적", BalanceTarget::Average, 5.0),
        )];
        let engine = Engine::new(&students, &rules);
        let control = RunControl::new().with_seed(99);

        let first = engine
            .run_with_control(&request(3, Method::Genetic), &control)
            .unwrap();
        let second = engine
            .run_with_control(&request(3, Method::Genetic), &control)
            .unwrap();
        assert_eq!(first.classes, second.classes);
        assert_eq!(first.assignment.total_score, second.assignment.total_score);
    }

    #[test]
    fn test_inactive_rules_never_affect_the_result() {
        let students = gendered_students(12);
        let active = vec![Rule::new(
            1,
            "성별 균형",
            RuleDefinition::balance("gender", BalanceTarget::Equal, 2.0),
        )];
        let mut with_inactive = active.clone();
        with_inactive.push(
            Rule::new(2, "쉬는 분리", RuleDefinition::separate(vec![1, 2])).with_active(false),
        );

        let control = RunControl::new().with_seed(31);
        let base = Engine::new(&students, &active)
            .run_with_control(&request(3, Method::Genetic), &control)
            .unwrap();
        let same = Engine::new(&students, &with_inactive)
            .run_with_control(&request(3, Method::Genetic), &control)
            .unwrap();
        assert_eq!(base.assignment.total_score, same.assignment.total_score);
        assert_eq!(base.assignment.rule_scores, same.assignment.rule_scores);
        assert_eq!(base.classes, same.classes);
    }

    #[test]
    fn test_sample_scale_cohort_converges() {
        // the product's sample shape: 161 students, 7 classes, five
        // separate and five together pairs
        let students = gendered_students(161);
        let separate_pairs = [(11, 12), (41, 42), (71, 72), (101, 102), (131, 132)];
        let together_pairs = [(5, 6), (35, 36), (65, 66), (95, 96), (125, 126)];
        let mut rules = vec![
            Rule::new(1, "성별 균형", RuleDefinition::balance("gender", BalanceTarget::Equal, 1.0)),
            Rule::new(2, "성적 균형", RuleDefinition::balance("성적", BalanceTarget::Average, 3.0)),
        ];
        for (k, (a, b)) in separate_pairs.into_iter().enumerate() {
            rules.push(Rule::new(
                10 + k as i64,
                format!("분리 {k}"),
                RuleDefinition::separate(vec![a, b]),
            ));
        }
        for (k, (a, b)) in together_pairs.into_iter().enumerate() {
            rules.push(Rule::new(
                20 + k as i64,
                format!("함께 {k}"),
                RuleDefinition::together(vec![a, b]),
            ));
        }
        let engine = Engine::new(&students, &rules);

        // reduced budget and population keep the test quick; the bench
        // runs the full budget on this shape
        let control = RunControl::new()
            .with_seed(2024)
            .with_genetic(GeneticConfig::default().with_population_size(30));
        let detail = engine
            .run_with_control(&request(7, Method::Genetic).with_iterations(100), &control)
            .unwrap();

        let stats = &detail.assignment.statistics;
        assert_eq!(stats.total_students, 161);
        assert_eq!(stats.class_sizes.values().sum::<usize>(), 161);
        assert!((0.0..=100.0).contains(&detail.assignment.total_score));

        let class_of = |id: i64| {
            detail
                .classes
                .iter()
                .find(|(_, roster)| roster.iter().any(|s| s.id == id))
                .map(|(class, _)| *class)
        };
        for (a, b) in together_pairs {
            assert_eq!(class_of(a), class_of(b), "together pair {a}/{b} split");
        }
        for (a, b) in separate_pairs {
            assert_ne!(class_of(a), class_of(b), "separate pair {a}/{b} joined");
        }
    }

    #[test]
    fn test_genetic_beats_or_matches_greedy() {
        let students = gendered_students(63);
        let mut rules = vec![
            Rule::new(1, "성별 균형", RuleDefinition::balance("gender", BalanceTarget::Equal, 1.0)),
            Rule::new(2, "성적 균형", RuleDefinition::balance("성적", BalanceTarget::Average, 3.0)),
        ];
        for (offset, pair) in [(11, 12), (21, 22), (31, 32), (41, 42), (51, 52)]
            .into_iter()
            .enumerate()
        {
            rules.push(Rule::new(
                10 + offset as i64,
                format!("분리 {offset}"),
                RuleDefinition::separate(vec![pair.0, pair.1]),
            ));
        }
        for (offset, pair) in [(1, 2), (13, 14), (23, 24), (33, 34), (43, 44)]
            .into_iter()
            .enumerate()
        {
            rules.push(Rule::new(
                20 + offset as i64,
                format!("함께 {offset}"),
                RuleDefinition::together(vec![pair.0, pair.1]),
            ));
        }
        let engine = Engine::new(&students, &rules);

        let greedy = engine
            .run_with_control(&request(7, Method::Greedy), &RunControl::new().with_seed(1))
            .unwrap();
        let genetic = engine
            .run_with_control(
                &request(7, Method::Genetic).with_iterations(100),
                &RunControl::new().with_seed(1),
            )
            .unwrap();
        assert!(genetic.assignment.total_score + 0.011 >= greedy.assignment.total_score);
    }
}
