use std::collections::HashMap;

use mipio::{check_values, parse_solution, DEFAULT_EQ_TOLERANCE, DEFAULT_INT_TOLERANCE, Number};

pub fn main() -> Result<(), &'static str> {
    let args = std::env::args().collect::<Vec<_>>();
    if args.len() != 3 {
        return Err("Usage: mipverify <INSTANCE> <SOLFILE>");
    }
    let instance_filename = std::path::Path::new(&args[1]);
    let sol_filename = std::path::Path::new(&args[2]);

    let instance = mipio::read_instance(instance_filename).map_err(|_| "Could not read instance.")?;
    let sol_contents =
        std::fs::read_to_string(sol_filename).map_err(|_| "Could not read SOL file.")?;
    let sol = parse_solution(&sol_contents)?
        .into_iter()
        .collect::<HashMap<_, _>>();

    let mut var_values = Vec::new();
    for (idx, v) in instance.variables.iter().enumerate() {
        if let Some(x) = sol.get(&v.name.as_str()) {
            var_values.push(*x);
        } else {
            println!("No value for variable idx={} name={}", idx, v.name);
            return Err("Incomplete solution file.");
        }
    }

    check_values(
        &instance,
        &var_values,
        DEFAULT_INT_TOLERANCE,
        DEFAULT_EQ_TOLERANCE,
    )?;
    let objective = match instance.objective() {
        Some((constant, obj)) => {
            let constant_term = constant.map(Number::as_f64).unwrap_or(0.);
            -constant_term
                + obj
                    .iter()
                    .map(|c| c.coeff.as_f64() * var_values[c.var])
                    .sum::<f64>()
        }
        None => 0.,
    };
    println!("Objective value: {}", objective);
    Ok(())
}
