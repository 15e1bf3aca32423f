//! Rounding strategies for the fix-and-propagate dive.
//!
//! A strategy picks the next integer variable to fix and the integer value
//! to fix it to, given the continuous reference point and the current
//! probing state. All strategies round the reference value to one of its two
//! neighbouring integers (clamped into the current domain), which is what
//! makes the one-step flip of the backtracking scheme meaningful.

use ordered_float::OrderedFloat;
use rand::prelude::SliceRandom;
use rand::SeedableRng;

use crate::interval::Interval;
use crate::num::Num;
use crate::probing::{Fixing, ProbingView};
use crate::problem::{Problem, RowFlags};

pub trait RoundingStrategy: Send {
    /// Returns the next fixing, or `None` once every integer variable is
    /// fixed. The returned value always lies within the view's bounds for
    /// that column.
    fn select_rounding_variable(
        &mut self,
        x_ref: &[f64],
        view: &ProbingView,
        problem: &Problem,
    ) -> Option<Fixing>;
}

fn unfixed_integers<'a>(
    view: &'a ProbingView,
    problem: &'a Problem,
) -> impl Iterator<Item = usize> + 'a {
    (0..problem.n_cols()).filter(move |&col| view.is_integer_variable(col) && !view.is_fixed(col))
}

/// Rounds `x` to the neighbouring integer selected by `round_up`, clamped
/// into the view's current domain for `col`.
fn clamped_value(num: Num, view: &ProbingView, col: usize, x: f64, round_up: bool) -> f64 {
    let value = if round_up {
        num.feas_ceil(x)
    } else {
        num.feas_floor(x)
    };
    // the view stores infinite bounds as +-inf, so clamping is safe
    Interval(
        view.probing_lower_bounds()[col],
        view.probing_upper_bounds()[col],
    )
    .clamp(value)
}

/// Chooses the integer variable whose reference value is most fractional
/// and rounds it to the nearer integer. Fractionality ties break toward the
/// lowest column index, value ties toward the objective direction.
pub struct FractionalRounding {
    num: Num,
}

impl FractionalRounding {
    pub fn new(num: Num) -> FractionalRounding {
        FractionalRounding { num }
    }
}

impl RoundingStrategy for FractionalRounding {
    fn select_rounding_variable(
        &mut self,
        x_ref: &[f64],
        view: &ProbingView,
        problem: &Problem,
    ) -> Option<Fixing> {
        let num = self.num;
        let col = unfixed_integers(view, problem)
            .max_by_key(|&col| {
                let frac = (x_ref[col] - x_ref[col].round()).abs();
                // lowest index wins a fractionality tie
                (OrderedFloat(frac), std::cmp::Reverse(col))
            })?;

        let x = x_ref[col];
        let frac = x - x.floor();
        let round_up = if num.is_eq(frac, 0.5) {
            // exactly half-fractional: move against the objective
            num.is_lt(problem.objective()[col], 0.0)
        } else {
            frac > 0.5
        };
        Some(Fixing::new(col, clamped_value(num, view, col, x, round_up)))
    }
}

/// Scores unfixed integer variables by how much they load the rows that are
/// closest to infeasible, imitating a Farkas certificate built from row
/// pressure, and rounds toward the direction that relieves the tightest
/// side. The `scale_by_fractionality` flavour additionally prefers
/// variables whose reference value is fractional.
pub struct FarkasRounding {
    num: Num,
    scale_by_fractionality: bool,
}

impl FarkasRounding {
    pub fn new(num: Num, scale_by_fractionality: bool) -> FarkasRounding {
        FarkasRounding {
            num,
            scale_by_fractionality,
        }
    }
}

impl RoundingStrategy for FarkasRounding {
    fn select_rounding_variable(
        &mut self,
        x_ref: &[f64],
        view: &ProbingView,
        problem: &Problem,
    ) -> Option<Fixing> {
        let num = self.num;
        let mut best: Option<(f64, usize, bool)> = None;

        for col in unfixed_integers(view, problem) {
            let mut down_score = 0.0;
            let mut up_score = 0.0;
            let (rows, vals) = problem.matrix().col_entries(col);
            for (&row, &a) in rows.iter().zip(vals) {
                let flags = problem.matrix().row_flags()[row];
                if flags.test(RowFlags::REDUNDANT) {
                    continue;
                }
                let act = problem.row_activity(
                    row,
                    view.probing_lower_bounds(),
                    view.probing_upper_bounds(),
                    view.probing_flags(),
                );
                if !flags.test(RowFlags::RHS_INF) && act.ninf_min == 0 {
                    let slack = (problem.matrix().rhs()[row] - act.min).max(0.0);
                    let pressure = a.abs() / (1.0 + slack);
                    // a low value keeps the minimum activity small
                    if a > 0.0 {
                        down_score += pressure;
                    } else {
                        up_score += pressure;
                    }
                }
                if !flags.test(RowFlags::LHS_INF) && act.ninf_max == 0 {
                    let slack = (act.max - problem.matrix().lhs()[row]).max(0.0);
                    let pressure = a.abs() / (1.0 + slack);
                    if a > 0.0 {
                        up_score += pressure;
                    } else {
                        down_score += pressure;
                    }
                }
            }

            let mut score = down_score.max(up_score);
            if self.scale_by_fractionality {
                let frac = (x_ref[col] - x_ref[col].round()).abs();
                score *= 0.5 + frac;
            }
            let round_up = up_score > down_score;
            // first (lowest) column wins score ties
            if best.map_or(true, |(best_score, _, _)| num.is_gt(score, best_score)) {
                best = Some((score, col, round_up));
            }
        }

        let (_, col, round_up) = best?;
        Some(Fixing::new(
            col,
            clamped_value(num, view, col, x_ref[col], round_up),
        ))
    }
}

/// Picks a uniformly random unfixed integer variable and rounds it to the
/// nearer integer. Deterministic for a fixed seed.
pub struct RandomRounding {
    num: Num,
    rng: rand_xoshiro::SplitMix64,
}

impl RandomRounding {
    pub fn new(num: Num, seed: u64) -> RandomRounding {
        RandomRounding {
            num,
            rng: rand_xoshiro::SplitMix64::seed_from_u64(seed),
        }
    }
}

impl RoundingStrategy for RandomRounding {
    fn select_rounding_variable(
        &mut self,
        x_ref: &[f64],
        view: &ProbingView,
        problem: &Problem,
    ) -> Option<Fixing> {
        let candidates: Vec<usize> = unfixed_integers(view, problem).collect();
        let &col = candidates.choose(&mut self.rng)?;
        let x = x_ref[col];
        let round_up = x - x.floor() > 0.5;
        Some(Fixing::new(
            col,
            clamped_value(self.num, view, col, x, round_up),
        ))
    }
}
