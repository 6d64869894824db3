//! Hard pairwise constraint graph.
//!
//! Separate and together requirements form an undirected graph over the
//! cohort. Together edges are collapsed into components with a union-find;
//! a separate edge inside one component is a contradiction and aborts the
//! run before any search starts. Feasibility during search reduces to
//! checking separate edges only, since collapsed units make together
//! violations structurally impossible.
//!
//! # Reference
//! Galler & Fischer (1964), "An improved equivalence algorithm";
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 21 (disjoint sets)

use std::collections::{BTreeSet, HashMap};

use tracing::warn;

use crate::error::{EngineError, EngineResult};
use crate::model::{ConstraintKind, Student};

/// One hard requirement between two students, by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairConstraint {
    pub kind: ConstraintKind,
    pub student_a: i64,
    pub student_b: i64,
}

impl PairConstraint {
    /// Creates a must-separate pair.
    pub fn separate(student_a: i64, student_b: i64) -> Self {
        Self {
            kind: ConstraintKind::Separate,
            student_a,
            student_b,
        }
    }

    /// Creates a must-together pair.
    pub fn together(student_a: i64, student_b: i64) -> Self {
        Self {
            kind: ConstraintKind::Together,
            student_a,
            student_b,
        }
    }
}

/// A hard-constraint violation in a concrete assignment, for audits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub kind: ConstraintKind,
    pub student_a: i64,
    pub student_b: i64,
}

/// Validated hard-constraint graph over student indices.
#[derive(Debug, Clone)]
pub struct ConstraintGraph {
    ids: Vec<i64>,
    /// Deduplicated separate edges, each `(a, b)` with `a < b`.
    separate: Vec<(usize, usize)>,
    /// Deduplicated together edges, each `(a, b)` with `a < b`.
    together: Vec<(usize, usize)>,
    /// Together-component root per student index.
    component: Vec<usize>,
}

impl ConstraintGraph {
    /// Builds and validates the graph.
    ///
    /// Together components are computed first; any separate edge whose
    /// endpoints fall into one component is reported as
    /// [`EngineError::ConstraintConflict`] naming the offending pair.
    /// Constraint ids not present in the snapshot are skipped with a
    /// warning, so a rule referencing a transferred-out student does not
    /// fail the run.
    pub fn build(students: &[Student], constraints: &[PairConstraint]) -> EngineResult<Self> {
        let mut index_of = HashMap::with_capacity(students.len());
        for (idx, student) in students.iter().enumerate() {
            if index_of.insert(student.id, idx).is_some() {
                return Err(EngineError::InvalidRequest {
                    reason: format!("duplicate student id {}", student.id),
                });
            }
        }

        let mut separate = BTreeSet::new();
        let mut together = BTreeSet::new();
        for pc in constraints {
            let (a, b) = match (index_of.get(&pc.student_a), index_of.get(&pc.student_b)) {
                (Some(&a), Some(&b)) => (a.min(b), a.max(b)),
                _ => {
                    warn!(
                        student_a = pc.student_a,
                        student_b = pc.student_b,
                        "constraint references a student outside the cohort, skipping"
                    );
                    continue;
                }
            };
            if a == b {
                continue;
            }
            match pc.kind {
                ConstraintKind::Separate => separate.insert((a, b)),
                ConstraintKind::Together => together.insert((a, b)),
            };
        }

        let mut uf = UnionFind::new(students.len());
        for &(a, b) in &together {
            uf.union(a, b);
        }

        let separate: Vec<(usize, usize)> = separate.into_iter().collect();
        for &(a, b) in &separate {
            if uf.find(a) == uf.find(b) {
                return Err(EngineError::ConstraintConflict {
                    student_a: students[a].id,
                    student_b: students[b].id,
                });
            }
        }

        let component = (0..students.len()).map(|i| uf.find(i)).collect();
        Ok(Self {
            ids: students.iter().map(|s| s.id).collect(),
            separate,
            together: together.into_iter().collect(),
            component,
        })
    }

    /// Number of students in the snapshot the graph was built over.
    pub fn student_count(&self) -> usize {
        self.ids.len()
    }

    /// Together-component root of a student index.
    pub fn component(&self, student: usize) -> usize {
        self.component[student]
    }

    /// Deduplicated separate edges over student indices.
    pub fn separate_edges(&self) -> &[(usize, usize)] {
        &self.separate
    }

    /// Together components as index groups, singletons included, ordered by
    /// their lowest member so downstream unit numbering is deterministic.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut by_root: HashMap<usize, Vec<usize>> = HashMap::new();
        for (idx, &root) in self.component.iter().enumerate() {
            by_root.entry(root).or_default().push(idx);
        }
        let mut groups: Vec<Vec<usize>> = by_root.into_values().collect();
        groups.sort_by_key(|g| g[0]);
        groups
    }

    /// Audits a complete per-student class assignment against every edge.
    pub fn violations(&self, class_of: &[u32]) -> Vec<Violation> {
        let mut found = Vec::new();
        for &(a, b) in &self.separate {
            if class_of[a] == class_of[b] {
                found.push(Violation {
                    kind: ConstraintKind::Separate,
                    student_a: self.ids[a],
                    student_b: self.ids[b],
                });
            }
        }
        for &(a, b) in &self.together {
            if class_of[a] != class_of[b] {
                found.push(Violation {
                    kind: ConstraintKind::Together,
                    student_a: self.ids[a],
                    student_b: self.ids[b],
                });
            }
        }
        found
    }
}

/// Disjoint-set forest with path compression and union by rank.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}
