pub mod opb;

use std::collections::BTreeMap;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::BufRead;
use std::path::Path;

/// A parsed MILP instance. Both the MPS and the OPB reader produce this
/// shape; the objective is kept as a `RowType::None` row like in MPS files.
pub struct Instance {
    pub name: String,
    pub variables: Vec<Variable>,
    pub constraints: Vec<Constraint>,
}

impl Instance {
    pub fn objective(&self) -> Option<(Option<Number>, &Vec<Cell>)> {
        let objective_row = self
            .constraints
            .iter()
            .find(|c| matches!(c.rowtype, RowType::None));
        objective_row.map(|c| (c.rhs, &c.cells))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowType {
    None,
    Equal,
    Lte,
    Gte,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(x) => x as f64,
            Number::Float(x) => x,
        }
    }
}

#[derive(Debug)]
pub struct Cell {
    pub var: usize,
    pub coeff: Number,
}

#[derive(Debug)]
pub struct Variable {
    pub name: String,
    pub var_type: VarType,
    pub lb: Option<Number>,
    pub ub: Option<Number>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VarType {
    Integer,
    Continuous,
}

#[derive(Debug)]
pub struct Constraint {
    pub rowtype: RowType,
    pub cells: Vec<Cell>,
    pub rhs: Option<Number>,
    /// MPS RANGES value; turns the row into a two-sided constraint.
    pub range: Option<Number>,
}

pub fn print_stats(problem: &Instance) {
    println!("instance {}", problem.name);
    println!("  rows {}", problem.constraints.len());
    let mut row_sizes: BTreeMap<usize, usize> = BTreeMap::new();
    for row in problem.constraints.iter() {
        *row_sizes.entry(row.cells.len()).or_default() += 1;
    }

    let mut ints = 0;
    let mut bins = 0;
    let mut cont = 0;
    for var in problem.variables.iter() {
        match var.var_type {
            VarType::Integer => {
                if var.lb == Some(Number::Int(0)) && var.ub == Some(Number::Int(1)) {
                    bins += 1;
                } else {
                    ints += 1;
                }
            }
            VarType::Continuous => {
                cont += 1;
            }
        }
    }

    println!("    cont {}  bin {}  int {}", cont, bins, ints);
    println!("    rowlens {:?}", row_sizes);
    println!("  vars {}", problem.variables.len());
}

#[derive(Debug)]
pub enum ParseError {
    Io(String),
    UnsupportedExtension(String),
    UnexpectedEnd,
    Unexpected(String),
    InvalidRowType(String),
    InvalidMarker(String),
    InvalidBoundsType(String),
    DuplicateRowName(String),
    DuplicateVarName(String),
    UnexpectedField(String),
    UninitializedRow(String),
    UninitializedVar(String),
    ParseNumberFailed(String),
    ExpectedLine,
    ExpectedField,
    ExpectedKeyword(String),
    NonUniqueRhsName(String),
    NonUniqueBoundsSets,
    InvalidRelation(String),
    InvalidTerm(String),
    MissingDegree,
    NonLinearTerm(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Io(e) => write!(f, "i/o error: {}", e),
            ParseError::UnsupportedExtension(e) => {
                write!(f, "unsupported file extension: {}", e)
            }
            ParseError::UnexpectedEnd => write!(f, "unexpected end of input"),
            ParseError::Unexpected(s) => write!(f, "unexpected input: {}", s),
            ParseError::InvalidRowType(s) => write!(f, "invalid row type: {}", s),
            ParseError::InvalidMarker(s) => write!(f, "invalid marker: {}", s),
            ParseError::InvalidBoundsType(s) => write!(f, "invalid bounds type: {}", s),
            ParseError::DuplicateRowName(s) => write!(f, "duplicate row name: {}", s),
            ParseError::DuplicateVarName(s) => write!(f, "duplicate variable name: {}", s),
            ParseError::UnexpectedField(s) => write!(f, "unexpected field: {}", s),
            ParseError::UninitializedRow(s) => write!(f, "unknown row name: {}", s),
            ParseError::UninitializedVar(s) => write!(f, "unknown variable name: {}", s),
            ParseError::ParseNumberFailed(s) => write!(f, "could not parse number: {}", s),
            ParseError::ExpectedLine => write!(f, "expected another line"),
            ParseError::ExpectedField => write!(f, "expected another field"),
            ParseError::ExpectedKeyword(s) => write!(f, "expected keyword: {}", s),
            ParseError::NonUniqueRhsName(s) => write!(f, "more than one RHS set: {}", s),
            ParseError::NonUniqueBoundsSets => write!(f, "more than one BOUNDS set"),
            ParseError::InvalidRelation(s) => write!(f, "invalid relation operator: {}", s),
            ParseError::InvalidTerm(s) => write!(f, "invalid term: {}", s),
            ParseError::MissingDegree => write!(f, "constraint is missing its degree"),
            ParseError::NonLinearTerm(s) => write!(f, "non-linear term not supported: {}", s),
        }
    }
}

impl std::error::Error for ParseError {}

/// Reads an instance from `path`, dispatching on the filename suffix:
/// `.mps`, `.opb`/`.pbo`, each optionally compressed as `.gz` or `.bz2`.
pub fn read_instance(path: &Path) -> Result<Instance, ParseError> {
    let filename = path.to_string_lossy().to_string();
    let file =
        std::fs::File::open(path).map_err(|e| ParseError::Io(format!("{}: {}", filename, e)))?;

    let stripped;
    let reader: Box<dyn std::io::Read> = if let Some(rest) = filename.strip_suffix(".gz") {
        stripped = rest.to_string();
        Box::new(flate2::read::GzDecoder::new(file))
    } else if let Some(rest) = filename.strip_suffix(".bz2") {
        stripped = rest.to_string();
        Box::new(bzip2::read::BzDecoder::new(file))
    } else {
        stripped = filename.clone();
        Box::new(file)
    };
    let buffered = std::io::BufReader::new(reader);

    if stripped.ends_with(".mps") {
        parse(buffered)
    } else if stripped.ends_with(".opb") || stripped.ends_with(".pbo") {
        opb::parse(buffered)
    } else {
        Err(ParseError::UnsupportedExtension(filename))
    }
}

pub fn parse(input_text: impl BufRead) -> Result<Instance, ParseError> {
    let mut lines = input_text
        .lines()
        .map(Result::unwrap)
        .filter(|l| l.split_ascii_whitespace().next().is_some() && !l.starts_with('*'))
        .peekable();

    macro_rules! expect_line {
        () => {
            lines.next().ok_or(ParseError::ExpectedLine)?
        };
    }

    macro_rules! expect_field {
        ($a:expr) => {
            $a.next().ok_or(ParseError::ExpectedField)?
        };
    }

    macro_rules! expect_keyword {
        ($a:expr,$b:expr) => {
            if expect_field!($a) != $b {
                return Err(ParseError::ExpectedKeyword($b.to_string()));
            }
        };
    }

    let name_line_str = expect_line!();
    let mut name_line = name_line_str.split_ascii_whitespace();
    expect_keyword!(name_line, "NAME");
    let name = name_line.next().unwrap_or("Unnamed problem");

    //
    // ROWS (TYPES AND NAMES)
    //

    let rows_line = expect_line!();
    expect_keyword!(rows_line.split_ascii_whitespace(), "ROWS");

    let mut rows = Vec::new();
    let mut row_names = HashMap::new();

    while lines.peek().map(|n| n.starts_with(' ')).unwrap_or(false) {
        let row_str = expect_line!();
        let mut row = row_str.split_ascii_whitespace();
        let row_idx = rows.len();
        rows.push(Constraint {
            rhs: None,
            range: None,
            rowtype: (match expect_field!(row) {
                "N" => RowType::None,
                "E" => RowType::Equal,
                "G" => RowType::Gte,
                "L" => RowType::Lte,
                x => {
                    return Err(ParseError::InvalidRowType(x.to_string()));
                }
            }),
            cells: Vec::new(),
        });
        let row_name = expect_field!(row);
        if row_names.insert(row_name.to_string(), row_idx).is_some() {
            return Err(ParseError::DuplicateRowName(row_name.to_string()));
        }
    }

    //
    // COLUMNS
    //

    let columns_keyword_line = expect_line!();
    expect_keyword!(columns_keyword_line.split_ascii_whitespace(), "COLUMNS");
    let mut var_type = VarType::Continuous;

    let mut vars: Vec<Variable> = Vec::new();
    let mut var_names = HashMap::new();

    while lines.peek().map(|n| n.starts_with(' ')).unwrap_or(false) {
        let col_line = expect_line!();
        let mut col = col_line.split_ascii_whitespace().peekable();
        let var_name = expect_field!(col);

        if col.peek() == Some(&"'MARKER'") {
            col.next();
            match expect_field!(col) {
                "'INTORG'" => var_type = VarType::Integer,
                "'INTEND'" => var_type = VarType::Continuous,
                x => {
                    return Err(ParseError::InvalidMarker(x.to_string()));
                }
            }
        } else {
            // Create variable
            let var_idx = *var_names.entry(var_name.to_string()).or_insert_with(|| {
                let idx = vars.len();
                vars.push(Variable {
                    name: var_name.to_string(),
                    var_type,
                    lb: Some(Number::Int(0)),
                    ub: None,
                });
                idx
            });

            // Create cells
            while col.peek().is_some() {
                let row = expect_field!(col);
                let coeff = expect_field!(col);

                let row_idx = *row_names
                    .get(row)
                    .ok_or_else(|| ParseError::UninitializedRow(row.to_string()))?;

                let num = parse_number(coeff)?;

                rows[row_idx].cells.push(Cell {
                    var: var_idx,
                    coeff: num,
                });
            }
        }
    }

    let rhs_keyword_line = expect_line!();
    expect_keyword!(rhs_keyword_line.split_ascii_whitespace(), "RHS");
    let mut rhs_name: Option<String> = None;

    while lines.peek().map(|n| n.starts_with(' ')).unwrap_or(false) {
        let rhs_line_str = expect_line!();
        let mut rhs_line = rhs_line_str.split_ascii_whitespace().peekable();
        let this_rhs_name = Some(expect_field!(rhs_line));

        if rhs_name.is_none() {
            rhs_name = this_rhs_name.map(str::to_string);
        } else if this_rhs_name != rhs_name.as_deref() {
            return Err(ParseError::NonUniqueRhsName(
                this_rhs_name.unwrap().to_string(),
            ));
        }

        while rhs_line.peek().is_some() {
            let row = expect_field!(rhs_line);
            let coeff = expect_field!(rhs_line);

            let row_idx = *row_names
                .get(row)
                .ok_or_else(|| ParseError::UninitializedRow(row.to_string()))?;

            let num = parse_number(coeff)?;

            rows[row_idx].rhs = Some(num);
        }
    }

    //
    // RANGES (optional)
    //

    if lines
        .peek()
        .map(|l| l.starts_with("RANGES"))
        .unwrap_or(false)
    {
        let ranges_keyword_line = expect_line!();
        expect_keyword!(ranges_keyword_line.split_ascii_whitespace(), "RANGES");
        while lines.peek().map(|n| n.starts_with(' ')).unwrap_or(false) {
            let range_line_str = expect_line!();
            let mut range_line = range_line_str.split_ascii_whitespace().peekable();
            // the set name plays the same role as the RHS set name
            let _set_name = expect_field!(range_line);

            while range_line.peek().is_some() {
                let row = expect_field!(range_line);
                let coeff = expect_field!(range_line);

                let row_idx = *row_names
                    .get(row)
                    .ok_or_else(|| ParseError::UninitializedRow(row.to_string()))?;

                rows[row_idx].range = Some(parse_number(coeff)?);
            }
        }
    }

    let mut bound_names = HashSet::new();

    if lines
        .peek()
        .map(|l| l.starts_with("BOUNDS"))
        .unwrap_or(false)
    {
        let bounds_keyword_line_str = expect_line!();
        expect_keyword!(bounds_keyword_line_str.split_ascii_whitespace(), "BOUNDS");
        while lines.peek().map(|n| n.starts_with(' ')).unwrap_or(false) {
            let bound_line_str = expect_line!();
            let mut bound = bound_line_str.split_ascii_whitespace().peekable();

            let bound_type_str = expect_field!(bound);
            let bound_name = expect_field!(bound);
            bound_names.insert(bound_name.to_string());

            let var = expect_field!(bound);
            let var_idx = *var_names
                .get(var)
                .ok_or_else(|| ParseError::UninitializedVar(var.to_string()))?;

            match bound_type_str {
                "FR" => {
                    vars[var_idx].lb = None;
                    vars[var_idx].ub = None;
                }
                "MI" => {
                    vars[var_idx].lb = None;
                }
                "PL" => {
                    vars[var_idx].ub = None;
                }
                "BV" => {
                    vars[var_idx].lb = Some(Number::Int(0));
                    vars[var_idx].ub = Some(Number::Int(1));
                    vars[var_idx].var_type = VarType::Integer;
                }
                "SC" => {
                    return Err(ParseError::InvalidBoundsType(
                        "SC (semi-continuous) is not supported".to_string(),
                    ))
                }
                "LO" | "UP" | "FX" | "LI" | "UI" => {
                    let coeff = expect_field!(bound);
                    let num = parse_number(coeff)?;

                    if bound_type_str == "LO" || bound_type_str == "FX" || bound_type_str == "LI" {
                        vars[var_idx].lb = Some(num);
                    }

                    if bound_type_str == "UP" || bound_type_str == "FX" || bound_type_str == "UI" {
                        vars[var_idx].ub = Some(num);
                    }

                    if bound_type_str == "LI" || bound_type_str == "UI" {
                        vars[var_idx].var_type = VarType::Integer;
                    }
                }
                bound => {
                    return Err(ParseError::InvalidBoundsType(bound.to_string()));
                }
            };

            if let Some(x) = bound.next() {
                return Err(ParseError::UnexpectedField(x.to_string()));
            }
        }
    }

    if bound_names.len() > 1 {
        return Err(ParseError::NonUniqueBoundsSets);
    }

    let endata_keyword_line = expect_line!();
    expect_keyword!(endata_keyword_line.split_ascii_whitespace(), "ENDATA");

    Ok(Instance {
        name: name.to_string(),
        constraints: rows,
        variables: vars,
    })
}

fn parse_number(coeff: &str) -> Result<Number, ParseError> {
    if let Ok(x) = coeff.parse::<i64>() {
        return Ok(Number::Int(x));
    }

    let float = coeff
        .parse::<f64>()
        .map_err(|_| ParseError::ParseNumberFailed(coeff.to_string()))?;

    if (float.round() - float).abs() < 1e-8 {
        return Ok(Number::Int(float.round() as i64));
    }

    Ok(Number::Float(float))
}

pub const DEFAULT_EQ_TOLERANCE: f64 = 1e-9;
pub const DEFAULT_INT_TOLERANCE: f64 = 1e-6;

pub fn check_values(
    instance: &Instance,
    var_values: &[f64],
    int_tolerance: f64,
    eq_tolerance: f64,
) -> Result<(), &'static str> {
    for (var_idx, var) in instance.variables.iter().enumerate() {
        if let VarType::Integer = var.var_type {
            let value = var_values[var_idx];
            let is_int = (value.round() - value).abs() < int_tolerance;
            if !is_int {
                return Err("Integrality tolerance failed.");
            }
        }
    }
    for row in instance.constraints.iter() {
        let lhs = row
            .cells
            .iter()
            .map(|c| c.coeff.as_f64() * var_values[c.var])
            .sum::<f64>();

        let rhs = row.rhs.map(Number::as_f64).unwrap_or(0.);

        match row.rowtype {
            RowType::None => {}
            RowType::Equal => {
                if (lhs - rhs).abs() > eq_tolerance {
                    return Err("Equality tolerance failed.");
                }
            }
            RowType::Lte => {
                if lhs > rhs + eq_tolerance {
                    return Err("Less-than constraint failed.");
                }
            }
            RowType::Gte => {
                if lhs < rhs - eq_tolerance {
                    return Err("Greater-than constraint failed.");
                }
            }
        }
    }
    Ok(())
}

pub fn parse_solution(solution: &str) -> Result<Vec<(&str, f64)>, &'static str> {
    solution
        .lines()
        .map(|l| {
            let mut fields = l.split_ascii_whitespace();
            let var_name = fields.next().ok_or("Expected variable name")?;
            let value_str = fields.next().ok_or("Expected value")?;
            let value = value_str
                .parse::<f64>()
                .map_err(|_| "Could not parse number")?;
            Ok((var_name, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_MPS: &str = "NAME          small
ROWS
 N  COST
 L  LIM1
 G  LIM2
 E  EQ1
COLUMNS
    MARKER                 'MARKER'                 'INTORG'
    X1        COST         1.0        LIM1         1.0
    X1        LIM2         1.0
    MARKER                 'MARKER'                 'INTEND'
    X2        COST         2.0        LIM1         1.0
    X2        EQ1          1.0
RHS
    RHS       LIM1         4.0        LIM2         1.0
    RHS       EQ1          2.0
RANGES
    RNG       LIM1         2.0
BOUNDS
 UP BND       X1           3.0
 MI BND       X2
ENDATA
";

    #[test]
    fn parses_small_mps() {
        let instance = parse(SMALL_MPS.as_bytes()).unwrap();
        assert_eq!(instance.name, "small");
        assert_eq!(instance.variables.len(), 2);
        assert_eq!(instance.variables[0].var_type, VarType::Integer);
        assert_eq!(instance.variables[1].var_type, VarType::Continuous);
        assert_eq!(instance.variables[1].lb, None);
        assert_eq!(instance.constraints.len(), 4);
        assert_eq!(instance.constraints[1].rowtype, RowType::Lte);
        assert_eq!(instance.constraints[1].range, Some(Number::Int(2)));
        let (offset, obj) = instance.objective().unwrap();
        assert!(offset.is_none());
        assert_eq!(obj.len(), 2);
    }

    #[test]
    fn rejects_semicontinuous_bounds() {
        let broken = SMALL_MPS.replace(" UP BND", " SC BND");
        assert!(matches!(
            parse(broken.as_bytes()),
            Err(ParseError::InvalidBoundsType(_))
        ));
    }

    #[test]
    fn rejects_unknown_row_in_columns() {
        let broken = SMALL_MPS.replace("X1        LIM2", "X1        NOPE");
        assert!(matches!(
            parse(broken.as_bytes()),
            Err(ParseError::UninitializedRow(_))
        ));
    }
}
