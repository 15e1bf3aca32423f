//! Derives no-good rows from the bound-change trail of a failed dive.
//!
//! Starting from the conflicting row, the trail is resolved backward through
//! the reason rows until exactly one literal of the conflict decision level
//! remains (first unique implication point). The resulting implication is
//! materialised as a linear row that every feasible solution satisfies and
//! the conflicting partial assignment violates. Only all-binary conflicts
//! are turned into rows; general-integer conflicts are skipped.

use log::debug;

use crate::num::Num;
use crate::probing::{BoundChange, NO_REASON};
use crate::problem::Problem;

/// A linear no-good `vals · x ≥ lhs` (the right-hand side is infinite).
#[derive(Clone, Debug)]
pub struct ConflictRow {
    cols: Vec<usize>,
    vals: Vec<f64>,
    lhs: f64,
}

impl ConflictRow {
    pub fn cols(&self) -> &[usize] {
        &self.cols
    }

    pub fn vals(&self) -> &[f64] {
        &self.vals
    }

    pub fn lhs(&self) -> f64 {
        self.lhs
    }

    pub fn len(&self) -> usize {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    pub fn is_violated_by(&self, solution: &[f64]) -> bool {
        let activity: f64 = self
            .cols
            .iter()
            .zip(&self.vals)
            .map(|(&col, &val)| val * solution[col])
            .sum();
        activity < self.lhs - 1e-9
    }
}

pub struct ConflictAnalysis {
    num: Num,
}

impl ConflictAnalysis {
    pub fn new(num: Num) -> ConflictAnalysis {
        ConflictAnalysis { num }
    }

    /// Analyses the trail of an infeasible probing view. Returns the number
    /// of rows appended to `out`.
    pub fn perform_conflict_analysis(
        &self,
        problem: &Problem,
        trail: &[BoundChange],
        conflict_row: Option<usize>,
        out: &mut Vec<ConflictRow>,
    ) -> usize {
        if trail.is_empty() {
            return 0;
        }
        let conflict_level = trail.last().map(|bc| bc.level).unwrap_or(0);
        if conflict_level == 0 {
            // infeasible without any decision: nothing to learn
            return 0;
        }

        // latest trail position per column
        let mut last_pos = vec![usize::MAX; problem.n_cols()];
        for (pos, bc) in trail.iter().enumerate() {
            last_pos[bc.col] = pos;
        }

        let seed_cols: Vec<usize> = match conflict_row {
            Some(row) => problem.matrix().row_entries(row).0.to_vec(),
            None => Vec::new(),
        };
        if seed_cols.iter().any(|&col| !problem.is_binary(col)) {
            debug!("skipping conflict with general integer variables");
            return 0;
        }

        if let Some(result) =
            self.resolve_to_uip(problem, trail, &last_pos, &seed_cols, conflict_level)
        {
            out.push(result);
            return 1;
        }

        // resolution bailed (non-binary literal on the way): fall back to
        // the no-good over the decision fixings alone
        match self.decision_no_good(problem, trail) {
            Some(result) => {
                out.push(result);
                1
            }
            None => 0,
        }
    }

    fn resolve_to_uip(
        &self,
        problem: &Problem,
        trail: &[BoundChange],
        last_pos: &[usize],
        seed_cols: &[usize],
        conflict_level: u32,
    ) -> Option<ConflictRow> {
        // literal set as trail positions, one per column
        let mut literals: Vec<usize> = Vec::new();
        for &col in seed_cols {
            if !problem.is_binary(col) {
                return None;
            }
            if last_pos[col] != usize::MAX && !literals.contains(&last_pos[col]) {
                literals.push(last_pos[col]);
            }
        }
        if literals.is_empty() {
            return None;
        }

        loop {
            let at_level: Vec<usize> = literals
                .iter()
                .copied()
                .filter(|&pos| trail[pos].level == conflict_level)
                .collect();
            if at_level.len() <= 1 {
                return self.materialise(trail, &literals);
            }

            // resolve the most recent literal of the conflict level
            let resolve_pos = *at_level.iter().max().unwrap();
            let reason = trail[resolve_pos].reason_row;
            if reason == NO_REASON {
                // a second decision at the same level cannot occur; bail to
                // the fallback rather than trusting a corrupt trail
                debug!("conflict resolution hit a decision with pending literals");
                return None;
            }
            literals.retain(|&pos| pos != resolve_pos);
            let (cols, _) = problem.matrix().row_entries(reason as usize);
            for &col in cols {
                if col == trail[resolve_pos].col {
                    continue;
                }
                if !problem.is_binary(col) {
                    return None;
                }
                let pos = last_pos[col];
                if pos != usize::MAX && pos < resolve_pos && !literals.contains(&pos) {
                    literals.push(pos);
                }
            }
        }
    }

    fn decision_no_good(&self, problem: &Problem, trail: &[BoundChange]) -> Option<ConflictRow> {
        let decisions: Vec<usize> = trail
            .iter()
            .enumerate()
            .filter(|(_, bc)| bc.reason_row == NO_REASON)
            .map(|(pos, _)| pos)
            .collect();
        if decisions.is_empty() {
            return None;
        }
        for &pos in &decisions {
            if !problem.is_binary(trail[pos].col) {
                return None;
            }
        }
        self.materialise(trail, &decisions)
    }

    /// Turns a set of binary literals into the linear form of their
    /// negated conjunction.
    fn materialise(&self, trail: &[BoundChange], literals: &[usize]) -> Option<ConflictRow> {
        let mut cols = Vec::with_capacity(literals.len());
        let mut vals = Vec::with_capacity(literals.len());
        let mut ones = 0usize;
        for &pos in literals {
            let bc = &trail[pos];
            let value = self.num.round(bc.value);
            if !self.num.is_feas_eq(value, bc.value) {
                return None;
            }
            cols.push(bc.col);
            if value >= 0.5 {
                vals.push(-1.0);
                ones += 1;
            } else {
                vals.push(1.0);
            }
        }
        if cols.is_empty() {
            return None;
        }
        Some(ConflictRow {
            cols,
            vals,
            lhs: 1.0 - ones as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probing::ProbingView;
    use crate::problem::ProblemBuilder;

    /// Five binaries with
    /// A1: x1 + x3 = 1, A2: x1 + x2 + x3 = 2,
    /// A3: x2 + x3 + x4 + x5 = 3, A4: x4 + x5 = 2.
    fn conflict_problem() -> Problem {
        let mut builder = ProblemBuilder::new("conflict");
        for _ in 0..5 {
            builder.add_col(Some(0.0), Some(1.0), true, 1.0);
        }
        builder.add_row(Some(1.0), Some(1.0), &[(0, 1.0), (2, 1.0)]);
        builder.add_row(Some(2.0), Some(2.0), &[(0, 1.0), (1, 1.0), (2, 1.0)]);
        builder.add_row(
            Some(3.0),
            Some(3.0),
            &[(1, 1.0), (2, 1.0), (3, 1.0), (4, 1.0)],
        );
        builder.add_row(Some(2.0), Some(2.0), &[(3, 1.0), (4, 1.0)]);
        builder.build()
    }

    #[test]
    fn depth_two_conflict_yields_single_uip_no_good() {
        let problem = conflict_problem();
        let num = Num::default();
        let mut view = ProbingView::new(&problem, num);

        // level 1: x3 := 1 implies x1 = 0 (A1) and x2 = 1 (A2)
        view.set_probing_column(&problem, 2, 1.0);
        view.propagate_domains(&problem);
        assert!(!view.is_infeasible());
        assert_eq!(view.probing_upper_bounds()[0], 0.0);
        assert_eq!(view.probing_lower_bounds()[1], 1.0);

        // level 2: x4 := 1 implies x5 = 0 (A3), then A4 is conflicting
        view.set_probing_column(&problem, 3, 1.0);
        view.propagate_domains(&problem);
        assert!(view.is_infeasible());

        let analysis = ConflictAnalysis::new(num);
        let mut rows = Vec::new();
        let added = analysis.perform_conflict_analysis(
            &problem,
            view.get_trail(),
            view.conflict_row(),
            &mut rows,
        );
        assert_eq!(added, 1);

        let no_good = &rows[0];
        // the learned row must cut off the conflicting assignment ...
        assert!(no_good.is_violated_by(&[0.0, 1.0, 1.0, 1.0, 0.0]));
        // ... contain the level-2 decision x4 ...
        assert!(no_good.cols().contains(&3));
        // ... and admit the flipped decision
        assert!(!no_good.is_violated_by(&[0.0, 1.0, 1.0, 0.0, 1.0]));
    }

    #[test]
    fn root_conflicts_produce_nothing() {
        let problem = conflict_problem();
        let num = Num::default();
        let analysis = ConflictAnalysis::new(num);
        let mut rows = Vec::new();
        assert_eq!(
            analysis.perform_conflict_analysis(&problem, &[], None, &mut rows),
            0
        );
        assert!(rows.is_empty());
    }

    #[test]
    fn general_integer_conflicts_are_skipped() {
        // x1 + x2 = 2 with x2 in [0, 3] general integer
        let mut builder = ProblemBuilder::new("general");
        builder.add_col(Some(0.0), Some(1.0), true, 1.0);
        builder.add_col(Some(0.0), Some(3.0), true, 1.0);
        builder.add_row(Some(5.0), None, &[(0, 1.0), (1, 1.0)]);
        let problem = builder.build();
        let num = Num::default();

        let mut view = ProbingView::new(&problem, num);
        view.set_probing_column(&problem, 0, 1.0);
        view.propagate_domains(&problem);
        assert!(view.is_infeasible());

        let analysis = ConflictAnalysis::new(num);
        let mut rows = Vec::new();
        assert_eq!(
            analysis.perform_conflict_analysis(
                &problem,
                view.get_trail(),
                view.conflict_row(),
                &mut rows
            ),
            0
        );
    }
}
