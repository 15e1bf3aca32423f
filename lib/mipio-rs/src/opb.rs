//! Reader for linear pseudo-Boolean instances (OPB/PBO).
//!
//! Only the linear subset is supported. A negated literal `~x` stands for
//! `1 - x`, so a term `w ~x` contributes `-w x` and shifts the degree (or the
//! objective constant) by `w`. Products of literals and maximisation
//! objectives are rejected with a descriptive error.

use std::collections::HashMap;
use std::io::BufRead;

use crate::{Cell, Constraint, Instance, Number, ParseError, RowType, VarType, Variable};

pub fn parse(input: impl BufRead) -> Result<Instance, ParseError> {
    let mut builder = OpbBuilder::default();

    let mut tokens: Vec<String> = Vec::new();
    for line in input.lines() {
        let line = line.map_err(|e| ParseError::Io(e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('*') {
            continue;
        }
        for raw in trimmed.split_ascii_whitespace() {
            // a statement terminator may be glued to the last token
            if let Some(stripped) = raw.strip_suffix(';') {
                if !stripped.is_empty() {
                    tokens.push(stripped.to_string());
                }
                tokens.push(";".to_string());
            } else {
                tokens.push(raw.to_string());
            }
        }
        while let Some(pos) = tokens.iter().position(|t| t == ";") {
            let statement: Vec<String> = tokens.drain(..=pos).collect();
            builder.statement(&statement[..statement.len() - 1])?;
        }
    }

    if !tokens.is_empty() {
        return Err(ParseError::UnexpectedEnd);
    }

    Ok(builder.finish())
}

#[derive(Default)]
struct OpbBuilder {
    vars: Vec<Variable>,
    var_names: HashMap<String, usize>,
    constraints: Vec<Constraint>,
    objective: Option<Constraint>,
}

impl OpbBuilder {
    fn statement(&mut self, tokens: &[String]) -> Result<(), ParseError> {
        if tokens.is_empty() {
            return Ok(());
        }
        if tokens[0] == "min:" {
            let (cells, shift) = self.terms(&tokens[1..])?;
            // objective constant `shift` is stored as a negated N-row rhs,
            // matching the MPS convention obj = c'x - rhs
            self.objective = Some(Constraint {
                rowtype: RowType::None,
                cells,
                rhs: as_number(-shift),
                range: None,
            });
            return Ok(());
        }
        if tokens[0] == "max:" {
            return Err(ParseError::Unexpected(
                "max: objectives are not supported".to_string(),
            ));
        }

        let relation_pos = tokens
            .iter()
            .position(|t| t == ">=" || t == "=" || t == "<=")
            .ok_or(ParseError::MissingDegree)?;
        let rowtype = match tokens[relation_pos].as_str() {
            ">=" => RowType::Gte,
            "<=" => RowType::Lte,
            "=" => RowType::Equal,
            other => return Err(ParseError::InvalidRelation(other.to_string())),
        };
        if relation_pos + 1 != tokens.len() - 1 {
            return Err(ParseError::MissingDegree);
        }
        let degree = parse_weight(&tokens[tokens.len() - 1])?;

        let (cells, shift) = self.terms(&tokens[..relation_pos])?;
        self.constraints.push(Constraint {
            rowtype,
            cells,
            rhs: as_number(degree - shift),
            range: None,
        });
        Ok(())
    }

    /// Parses an alternating weight/literal sequence. Returns the expanded
    /// cells and the constant shift produced by negated literals.
    fn terms(&mut self, tokens: &[String]) -> Result<(Vec<Cell>, f64), ParseError> {
        if tokens.len() % 2 != 0 {
            return Err(ParseError::InvalidTerm(
                tokens.last().cloned().unwrap_or_default(),
            ));
        }
        let mut cells = Vec::with_capacity(tokens.len() / 2);
        let mut shift = 0.0;
        for pair in tokens.chunks(2) {
            let weight = parse_weight(&pair[0])?;
            let literal = &pair[1];
            if parse_weight(literal).is_ok() {
                return Err(ParseError::InvalidTerm(literal.to_string()));
            }
            if literal.contains('~') && !literal.starts_with('~') {
                return Err(ParseError::NonLinearTerm(literal.to_string()));
            }
            let (coeff, var_name) = match literal.strip_prefix('~') {
                Some(plain) => {
                    shift += weight;
                    (-weight, plain)
                }
                None => (weight, literal.as_str()),
            };
            if var_name.is_empty() {
                return Err(ParseError::InvalidTerm(literal.to_string()));
            }
            let var = self.intern(var_name);
            cells.push(Cell {
                var,
                coeff: as_number(coeff).unwrap(),
            });
        }
        Ok((cells, shift))
    }

    fn intern(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.var_names.get(name) {
            return idx;
        }
        let idx = self.vars.len();
        self.vars.push(Variable {
            name: name.to_string(),
            var_type: VarType::Integer,
            lb: Some(Number::Int(0)),
            ub: Some(Number::Int(1)),
        });
        self.var_names.insert(name.to_string(), idx);
        idx
    }

    fn finish(self) -> Instance {
        let mut constraints = self.constraints;
        if let Some(objective) = self.objective {
            constraints.insert(0, objective);
        }
        Instance {
            name: "pbo".to_string(),
            variables: self.vars,
            constraints,
        }
    }
}

fn parse_weight(token: &str) -> Result<f64, ParseError> {
    token
        .parse::<f64>()
        .map_err(|_| ParseError::ParseNumberFailed(token.to_string()))
}

fn as_number(x: f64) -> Option<Number> {
    if (x.round() - x).abs() < 1e-9 {
        Some(Number::Int(x.round() as i64))
    } else {
        Some(Number::Float(x))
    }
}
