//! Collapsed cohort view and partition working state.
//!
//! Every together-connected component becomes one unit (a "super-student")
//! that all strategies move atomically, so together requirements hold by
//! construction and only separate edges need checking during search.
//! Separate edges are projected onto unit pairs once, giving O(degree)
//! legality checks in the inner loops.

use std::collections::BTreeSet;

use crate::constraint::ConstraintGraph;
use crate::model::Student;

/// One atomically-moved group of students. Singletons are units too.
#[derive(Debug, Clone)]
pub struct Unit {
    /// Member student indices, ascending.
    pub members: Vec<usize>,
}

impl Unit {
    /// Member count, the unit's weight toward class sizes.
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// The collapsed view of a student snapshot under a validated graph.
#[derive(Debug)]
pub struct Cohort<'a> {
    students: &'a [Student],
    units: Vec<Unit>,
    unit_of: Vec<usize>,
    unit_separate: Vec<Vec<u32>>,
}

impl<'a> Cohort<'a> {
    /// Collapses together components into units and projects separate edges
    /// onto unit pairs. The graph guarantees no separate edge stays inside
    /// a unit.
    pub fn collapse(students: &'a [Student], graph: &ConstraintGraph) -> Self {
        let components = graph.components();
        let mut unit_of = vec![0usize; students.len()];
        let units: Vec<Unit> = components
            .into_iter()
            .enumerate()
            .map(|(u, members)| {
                for &m in &members {
                    unit_of[m] = u;
                }
                Unit { members }
            })
            .collect();

        let mut adjacency: Vec<BTreeSet<u32>> = vec![BTreeSet::new(); units.len()];
        for &(a, b) in graph.separate_edges() {
            let (ua, ub) = (unit_of[a], unit_of[b]);
            adjacency[ua].insert(ub as u32);
            adjacency[ub].insert(ua as u32);
        }

        Self {
            students,
            units,
            unit_of,
            unit_separate: adjacency
                .into_iter()
                .map(|set| set.into_iter().collect())
                .collect(),
        }
    }

    /// The student snapshot this cohort was built over.
    pub fn students(&self) -> &'a [Student] {
        self.students
    }

    pub fn student_count(&self) -> usize {
        self.students.len()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Unit holding the given student index.
    pub fn unit_of(&self, student: usize) -> usize {
        self.unit_of[student]
    }

    /// Units the given unit must never share a class with.
    pub fn separate_neighbors(&self, unit: usize) -> &[u32] {
        &self.unit_separate[unit]
    }

    /// Whether placing `unit` in `class` keeps every separate edge intact.
    /// Unassigned neighbors never conflict.
    pub fn is_legal(&self, partition: &Partition, unit: usize, class: u32) -> bool {
        self.unit_separate[unit]
            .iter()
            .all(|&nb| partition.class_of(nb as usize) != class)
    }

    /// Separate edges with both endpoints assigned to one class.
    pub fn separate_violations(&self, partition: &Partition) -> usize {
        let mut count = 0;
        for (unit, neighbors) in self.unit_separate.iter().enumerate() {
            let class = partition.class_of(unit);
            if class == Partition::UNASSIGNED {
                continue;
            }
            for &nb in neighbors {
                // count each pair once
                if (nb as usize) > unit && partition.class_of(nb as usize) == class {
                    count += 1;
                }
            }
        }
        count
    }

    /// Class sizes in students (unit weights), unassigned units excluded.
    pub fn class_sizes(&self, partition: &Partition) -> Vec<usize> {
        let mut sizes = vec![0usize; partition.num_classes() as usize];
        for (unit, members) in self.units.iter().map(|u| &u.members).enumerate() {
            let class = partition.class_of(unit);
            if class != Partition::UNASSIGNED {
                sizes[class as usize] += members.len();
            }
        }
        sizes
    }

    /// Expands a unit partition to a per-student class array.
    pub fn expand(&self, partition: &Partition) -> Vec<u32> {
        self.students
            .iter()
            .enumerate()
            .map(|(idx, _)| partition.class_of(self.unit_of[idx]))
            .collect()
    }
}

/// A class index per unit. The working state every strategy mutates.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    classes: Vec<u32>,
    num_classes: u32,
}

impl Partition {
    /// Sentinel for a unit not yet placed during greedy construction.
    pub const UNASSIGNED: u32 = u32::MAX;

    /// A partition with every unit unassigned.
    pub fn empty(unit_count: usize, num_classes: u32) -> Self {
        Self {
            classes: vec![Self::UNASSIGNED; unit_count],
            num_classes,
        }
    }

    /// Wraps an existing gene vector.
    pub fn from_classes(classes: Vec<u32>, num_classes: u32) -> Self {
        debug_assert!(classes
            .iter()
            .all(|&c| c == Self::UNASSIGNED || c < num_classes));
        Self {
            classes,
            num_classes,
        }
    }

    pub fn num_classes(&self) -> u32 {
        self.num_classes
    }

    pub fn unit_count(&self) -> usize {
        self.classes.len()
    }

    pub fn class_of(&self, unit: usize) -> u32 {
        self.classes[unit]
    }

    pub fn set(&mut self, unit: usize, class: u32) {
        debug_assert!(class < self.num_classes);
        self.classes[unit] = class;
    }

    /// Whether every unit has a class.
    pub fn is_complete(&self) -> bool {
        self.classes.iter().all(|&c| c != Self::UNASSIGNED)
    }

    /// The underlying gene vector.
    pub fn classes(&self) -> &[u32] {
        &self.classes
    }
}
