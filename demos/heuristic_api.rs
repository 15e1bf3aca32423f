use volfix::heuristic::{FixAndPropagateOptions, Heuristic, OneOptMode};
use volfix::num::Num;
use volfix::params::AlgorithmParameter;
use volfix::problem::ProblemBuilder;

fn main() {
    // Simple 2-variable problem: minimize 3x - 5y subject to x + y >= 1,
    // x and y binary.
    let mut builder = ProblemBuilder::new("demo");
    let x = builder.add_col(Some(0.0), Some(1.0), true, 3.0);
    let y = builder.add_col(Some(0.0), Some(1.0), true, -5.0);
    builder.add_row(Some(1.0), None, &[(x, 1.0), (y, 1.0)]);
    let problem = builder.build();

    let mut parameter = AlgorithmParameter::default();
    parameter.time_limit = 5.0;
    parameter.threads = 4;

    let mut heuristic = Heuristic::new(problem, Num::default(), parameter, false);
    heuristic.setup();

    let mut best_obj = f64::INFINITY;
    let mut best_sol = Vec::new();

    // dive from the volume algorithm's fractional point when available
    let hint = heuristic
        .compute_fractional_hint(None)
        .unwrap_or_else(|| vec![0.5; heuristic.problem().n_cols()]);
    let found = heuristic.perform_fix_and_propagate(
        &hint,
        &mut best_obj,
        &mut best_sol,
        FixAndPropagateOptions {
            one_opt_mode: OneOptMode::WithRepair,
            ..FixAndPropagateOptions::default()
        },
    );

    if found {
        println!("objective value: {}", best_obj);
        println!("variable values: {:?}", best_sol);
    } else {
        println!("no feasible solution found");
    }
}
