use std::io::Write;
use std::path::PathBuf;

use log::info;
use structopt::StructOpt;

use volfix::convert::problem_from_instance;
use volfix::dive::{initial_reference_point, StartPoint};
use volfix::heuristic::{FixAndPropagateOptions, Heuristic, OneOptMode};
use volfix::num::Num;
use volfix::params::AlgorithmParameter;
use volfix::presolve::{trivial_presolve, PresolveStatus};
use volfix::util;

#[derive(Debug, StructOpt)]
#[structopt(name = "volfix", about = "Primal heuristic for mixed-integer programs")]
struct Opts {
    /// Instance file (.mps/.opb/.pbo, optionally .gz or .bz2)
    #[structopt(name = "INPUT")]
    input_file: PathBuf,

    /// Directory for solution files
    #[structopt(name = "OUTDIR")]
    output_dir: PathBuf,

    /// Wall-clock limit in seconds
    #[structopt(long)]
    time_limit: Option<f64>,

    /// Number of threads (0 = automatic)
    #[structopt(long)]
    threads: Option<usize>,

    /// Algorithm parameter overrides, e.g. -p vol.alpha=0.3
    #[structopt(short = "p", long = "param")]
    params: Vec<String>,
}

fn main() {
    pretty_env_logger::env_logger::Builder::from_env(
        pretty_env_logger::env_logger::Env::default().default_filter_or("info"),
    )
    .init();

    let opts = Opts::from_args();
    let code = run(opts);
    hprof::profiler().print_timing();
    std::process::exit(code);
}

fn run(opts: Opts) -> i32 {
    let _p = hprof::enter("solver");

    let mut parameter = AlgorithmParameter::default();
    for arg in &opts.params {
        if let Err(e) = parameter.set_from_arg(arg) {
            eprintln!("{}", e);
            return 1;
        }
    }
    if let Some(time_limit) = opts.time_limit {
        parameter.time_limit = time_limit;
    }
    if let Some(threads) = opts.threads {
        parameter.threads = threads;
    }

    let instance_name = opts
        .input_file
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    println!("instance:{}", instance_name);
    let instance = {
        let _p = hprof::enter("read and parse");
        match mipio::read_instance(&opts.input_file) {
            Ok(instance) => instance,
            Err(e) => {
                eprintln!("could not read {}: {}", opts.input_file.display(), e);
                return 1;
            }
        }
    };
    let t0 = std::time::Instant::now();

    let num = Num::default();
    let mut problem = problem_from_instance(&instance);
    util::check_domains(&problem);
    util::check_constraints(&problem);

    match trivial_presolve(&mut problem, num) {
        PresolveStatus::Infeasible | PresolveStatus::Unbounded => {
            println!("presolve detected infeasibility or unbounded-ness");
            return 2;
        }
        PresolveStatus::Unchanged | PresolveStatus::Reduced => {}
    }

    let mut heuristic = Heuristic::new(problem, num, parameter, false);
    heuristic.setup();

    let x_ref = {
        let _p = hprof::enter("volume algorithm");
        match heuristic.compute_fractional_hint(None) {
            Some(x_bar) => x_bar,
            None => {
                info!("volume skipped, falling back to domain midpoints");
                initial_reference_point(heuristic.problem(), num, StartPoint::Midpoint)
            }
        }
    };

    let mut best_obj = f64::INFINITY;
    let mut best_sol = Vec::new();
    let found = {
        let _p = hprof::enter("fix and propagate");
        heuristic.perform_fix_and_propagate(
            &x_ref,
            &mut best_obj,
            &mut best_sol,
            FixAndPropagateOptions {
                one_opt_mode: OneOptMode::WithRepair,
                apply_conflicts: true,
                ..FixAndPropagateOptions::default()
            },
        )
    };

    if !found {
        println!("no feasible solution found");
        return 0;
    }

    let full_obj = best_obj + heuristic.problem().obj_offset();
    println!("objective:{}", full_obj);
    info!(
        "successful backtracks: {}",
        heuristic.successful_backtracks()
    );

    let solution_filename = format!(
        "{:.2}_{}_{}.sol",
        t0.elapsed().as_secs_f64(),
        full_obj,
        instance_name
    );
    let solution_path = opts.output_dir.join(solution_filename);
    match std::fs::File::create(&solution_path) {
        Ok(mut file) => {
            for (var, value) in instance.variables.iter().zip(&best_sol) {
                if writeln!(file, "{} {}", var.name, value).is_err() {
                    eprintln!("could not write {}", solution_path.display());
                    return 1;
                }
            }
            info!("saved solution to {:?}", solution_path);
        }
        Err(e) => {
            eprintln!("could not create {}: {}", solution_path.display(), e);
            return 1;
        }
    }
    0
}
