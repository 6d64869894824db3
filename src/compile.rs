//! Rule compilation.
//!
//! Turns stored rule records into the executable form one run needs: boxed
//! scorers for the soft rules, pair constraints for the hard ones. Inactive
//! rules are skipped before any shape checking, so deactivating a rule
//! (malformed or not) never changes behavior. Validation fails fast on the
//! first offending rule; no partial rule set is ever produced.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use tracing::debug;

use crate::constraint::PairConstraint;
use crate::error::{EngineError, EngineResult};
use crate::model::{ConstraintKind, DistributionStrategy, Rule, RuleDefinition};
use crate::scoring::{
    BalanceScorer, CompiledScorer, ComplexScorer, DistributionScorer, FieldMatcher, MatchCriteria,
};

/// The executable output of rule compilation.
#[derive(Debug)]
pub struct CompiledRules {
    /// Soft-rule scorers, ordered by rule priority (highest first).
    pub scorers: Vec<CompiledScorer>,
    /// Hard pairwise requirements, expanded from constraint rules.
    pub constraints: Vec<PairConstraint>,
    /// Matchers of the active distribution rules, used by placement
    /// ordering heuristics.
    pub distribution_matchers: Vec<FieldMatcher>,
    /// Fields of the active balance rules in priority order, deduplicated.
    pub balance_fields: Vec<String>,
}

/// Compiles the active rules of a rule set.
pub fn compile_rules(rules: &[Rule]) -> EngineResult<CompiledRules> {
    let mut active: Vec<&Rule> = rules.iter().filter(|r| r.is_active).collect();
    active.sort_by_key(|r| (Reverse(r.priority), r.id));

    let mut scorers = Vec::new();
    let mut constraints = Vec::new();
    let mut distribution_matchers = Vec::new();
    let mut balance_fields: Vec<String> = Vec::new();

    for rule in active {
        validate_common(rule)?;
        match &rule.definition {
            RuleDefinition::Balance {
                field,
                target,
                tolerance,
            } => {
                if !tolerance.is_finite() || *tolerance < 0.0 {
                    return Err(fail(rule, "tolerance must be a non-negative finite number"));
                }
                scorers.push(CompiledScorer::new(
                    &rule.name,
                    rule.weight,
                    Box::new(BalanceScorer::new(field, *target, *tolerance)),
                ));
                if !balance_fields.contains(field) {
                    balance_fields.push(field.clone());
                }
            }
            RuleDefinition::Constraint {
                constraint_type,
                student_ids,
            } => {
                constraints.extend(expand_pairs(rule, *constraint_type, student_ids)?);
            }
            RuleDefinition::Distribution {
                field,
                value,
                range,
                strategy,
                max_per_class,
            } => {
                if let Some((min, max)) = range {
                    if min > max {
                        return Err(fail(rule, "range minimum exceeds its maximum"));
                    }
                }
                if *strategy == DistributionStrategy::Limit {
                    match max_per_class {
                        None => {
                            return Err(fail(rule, "limit strategy requires max_per_class"));
                        }
                        Some(0) => {
                            return Err(fail(rule, "max_per_class must be at least 1"));
                        }
                        Some(_) => {}
                    }
                }
                // an explicit value takes precedence over a range
                let criteria = match (value, range) {
                    (Some(v), _) => MatchCriteria::Equals(v.clone()),
                    (None, Some((min, max))) => MatchCriteria::Range(*min, *max),
                    (None, None) => MatchCriteria::Truthy,
                };
                let matcher = FieldMatcher::new(field, criteria);
                distribution_matchers.push(matcher.clone());
                scorers.push(CompiledScorer::new(
                    &rule.name,
                    rule.weight,
                    Box::new(DistributionScorer::new(matcher, *strategy, *max_per_class)),
                ));
            }
            RuleDefinition::Complex { conditions, action } => {
                if conditions.is_empty() {
                    return Err(fail(rule, "complex rule needs at least one condition"));
                }
                scorers.push(CompiledScorer::new(
                    &rule.name,
                    rule.weight,
                    Box::new(ComplexScorer::new(conditions.clone(), *action)),
                ));
            }
        }
    }

    debug!(
        scorers = scorers.len(),
        constraints = constraints.len(),
        "compiled rule set"
    );
    Ok(CompiledRules {
        scorers,
        constraints,
        distribution_matchers,
        balance_fields,
    })
}

fn fail(rule: &Rule, reason: impl Into<String>) -> EngineError {
    EngineError::RuleDefinition {
        rule_id: rule.id,
        reason: reason.into(),
    }
}

fn validate_common(rule: &Rule) -> EngineResult<()> {
    if rule.rule_type != rule.definition.rule_type() {
        return Err(fail(
            rule,
            format!(
                "declared type {:?} does not match the definition payload",
                rule.rule_type
            ),
        ));
    }
    if !rule.weight.is_finite() || rule.weight < 0.0 {
        return Err(fail(rule, "weight must be a non-negative finite number"));
    }
    if !(1..=10).contains(&rule.priority) {
        return Err(fail(rule, "priority must be between 1 and 10"));
    }
    Ok(())
}

/// All unordered pairs over the rule's distinct students.
fn expand_pairs(
    rule: &Rule,
    kind: ConstraintKind,
    student_ids: &[i64],
) -> EngineResult<Vec<PairConstraint>> {
    let distinct: BTreeSet<i64> = student_ids.iter().copied().collect();
    if distinct.len() < 2 {
        return Err(fail(rule, "constraint needs at least 2 distinct students"));
    }
    let ids: Vec<i64> = distinct.into_iter().collect();
    let mut pairs = Vec::with_capacity(ids.len() * (ids.len() - 1) / 2);
    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            pairs.push(PairConstraint {
                kind,
                student_a: a,
                student_b: b,
            });
        }
    }
    Ok(pairs)
}
