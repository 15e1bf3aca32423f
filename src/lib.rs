pub mod capi;
pub mod conflict;
pub mod convert;
pub mod dive;
pub mod heuristic;
pub mod interval;
pub mod linalg;
pub mod num;
pub mod params;
pub mod presolve;
pub mod probing;
pub mod problem;
pub mod rounding;
pub mod util;
pub mod volume;

/// Default zero tolerance for exact comparisons.
pub const DEFAULT_EPSILON: f64 = 1.0e-9;

/// Default feasibility tolerance for bound and activity comparisons.
pub const DEFAULT_FEASTOL: f64 = 1.0e-6;

/// Bounds with a magnitude beyond this are treated as infinite by the
/// readers.
pub const HUGE_BOUND: f64 = 1.0e30;
