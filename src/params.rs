//! Runtime-tunable algorithm parameters.
//!
//! Keys follow the `vol.*` naming of the original option set and can be set
//! from `key=value` strings passed on the command line or through the host.

use std::fmt;

#[derive(Clone, Debug)]
pub struct AlgorithmParameter {
    // overall parameters
    pub time_limit: f64,
    /// 0 = automatic
    pub threads: usize,

    // volume algorithm parameters
    pub threshold_hard_constraints: f64,
    pub alpha: f64,
    pub alpha_max: f64,
    pub f: f64,
    pub f_min: f64,
    pub f_max: f64,
    pub f_strong_incr_factor: f64,
    pub f_weak_incr_factor: f64,
    pub f_decr_factor: f64,
    pub obj_reltol: f64,
    pub obj_abstol: f64,
    pub con_abstol: f64,
    pub weak_improvement_iter_limit: u32,
    pub non_improvement_iter_limit: u32,
    pub max_iterations: u32,
    pub fixed_int_var_threshold: f64,
    pub num_iters_fixed_int_vars_check: u32,
}

impl Default for AlgorithmParameter {
    fn default() -> Self {
        AlgorithmParameter {
            time_limit: 10.0 * 60.0,
            threads: 8,
            threshold_hard_constraints: 1.0,
            alpha: 0.5,
            alpha_max: 0.1,
            f: 0.2,
            f_min: 0.0005,
            f_max: 2.0,
            f_strong_incr_factor: 2.0,
            f_weak_incr_factor: 1.1,
            f_decr_factor: 0.66,
            obj_reltol: 0.01,
            obj_abstol: 0.01,
            con_abstol: 0.02,
            weak_improvement_iter_limit: 2,
            non_improvement_iter_limit: 20,
            max_iterations: 500,
            fixed_int_var_threshold: 0.8,
            num_iters_fixed_int_vars_check: 5,
        }
    }
}

#[derive(Debug)]
pub enum ParameterError {
    UnknownKey(String),
    InvalidValue(String, String),
    MissingSeparator(String),
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterError::UnknownKey(key) => write!(f, "unknown parameter: {}", key),
            ParameterError::InvalidValue(key, value) => {
                write!(f, "invalid value for {}: {}", key, value)
            }
            ParameterError::MissingSeparator(arg) => {
                write!(f, "expected key=value, got: {}", arg)
            }
        }
    }
}

impl std::error::Error for ParameterError {}

impl AlgorithmParameter {
    /// Applies a `key=value` override.
    pub fn set_from_arg(&mut self, arg: &str) -> Result<(), ParameterError> {
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| ParameterError::MissingSeparator(arg.to_string()))?;
        self.set(key.trim(), value.trim())
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ParameterError> {
        macro_rules! parse {
            ($ty:ty) => {
                value
                    .parse::<$ty>()
                    .map_err(|_| ParameterError::InvalidValue(key.to_string(), value.to_string()))?
            };
        }
        match key {
            "time_limit" => self.time_limit = parse!(f64),
            "threads" => self.threads = parse!(usize),
            "vol.threshold_hard_constraints" => self.threshold_hard_constraints = parse!(f64),
            "vol.alpha" => self.alpha = parse!(f64),
            "vol.alpha_max" => self.alpha_max = parse!(f64),
            "vol.f" => self.f = parse!(f64),
            "vol.f_min" => self.f_min = parse!(f64),
            "vol.f_max" => self.f_max = parse!(f64),
            "vol.f_strong_incr_factor" => self.f_strong_incr_factor = parse!(f64),
            "vol.f_weak_incr_factor" => self.f_weak_incr_factor = parse!(f64),
            "vol.f_decr_factor" => self.f_decr_factor = parse!(f64),
            "vol.obj_reltol" => self.obj_reltol = parse!(f64),
            "vol.obj_abstol" => self.obj_abstol = parse!(f64),
            "vol.con_abstol" => self.con_abstol = parse!(f64),
            "vol.weak_improvement_iter_limit" => {
                self.weak_improvement_iter_limit = parse!(u32)
            }
            "vol.non_improvement_iter_limit" => self.non_improvement_iter_limit = parse!(u32),
            "vol.max_iterations" => self.max_iterations = parse!(u32),
            "vol.fixed_int_var_threshold" => self.fixed_int_var_threshold = parse!(f64),
            "vol.num_iters_fixed_int_vars_check" => {
                self.num_iters_fixed_int_vars_check = parse!(u32)
            }
            _ => return Err(ParameterError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}
