//! Reading of temporal problems from a line-based text format.
//!
//! Each line holds one directive and `#` starts a comment:
//!
//! ```text
//! tp a 0 100        # timepoint `a` with domain [0, 100]
//! edge a b 3        # b - a <= 3
//! cond x b a -6     # x  =>  a - b <= -6
//! cond !x a b 2     # !x =>  b - a <= 2
//! bound y a <= 10   # y <=> a <= 10
//! clause x !y z     # x | !y | z
//! ```
//!
//! Boolean variables are designated by name and created on first use.
//! The timepoint `origin` is always defined and fixed at 0.

use anyhow::{bail, ensure, Context, Result};
use std::collections::HashMap;
use tempo::core::{IntCst, Lit};
use tempo::sat::{Solution, Solver};
use tempo::stn::{BoundFact, StnTheory, Timepoint};

pub const ORIGIN_NAME: &str = "origin";

pub struct Problem {
    pub solver: Solver,
    /// User defined timepoints, in declaration order.
    timepoints: Vec<(String, Timepoint)>,
    timepoint_ids: HashMap<String, Timepoint>,
    variables: HashMap<String, Lit>,
}

impl Problem {
    fn new(theory: StnTheory) -> Problem {
        let mut timepoint_ids = HashMap::new();
        timepoint_ids.insert(ORIGIN_NAME.to_string(), Timepoint::ORIGIN);
        Problem {
            solver: Solver::new(theory),
            timepoints: Vec::new(),
            timepoint_ids,
            variables: HashMap::new(),
        }
    }

    /// Builds the problem described by `input` on top of the given theory.
    pub fn parse(input: &str, theory: StnTheory) -> Result<Problem> {
        let mut pb = Problem::new(theory);
        for (i, line) in input.lines().enumerate() {
            let content = line.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }
            pb.add_directive(content)
                .with_context(|| format!("line {}: `{}`", i + 1, content))?;
        }
        Ok(pb)
    }

    pub fn timepoints(&self) -> &[(String, Timepoint)] {
        &self.timepoints
    }

    pub fn timepoint(&self, name: &str) -> Option<Timepoint> {
        self.timepoint_ids.get(name).copied()
    }

    /// Literal designated by `name` (possibly negated with a leading `!`), if its variable was declared.
    pub fn literal(&self, name: &str) -> Option<Lit> {
        let (positive, var_name) = split_negation(name);
        self.variables.get(var_name).map(|&l| if positive { l } else { !l })
    }

    fn add_directive(&mut self, line: &str) -> Result<()> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            ["tp", name, lb, ub] => {
                ensure!(!self.timepoint_ids.contains_key(*name), "timepoint `{name}` is already defined");
                let tp = self.solver.theory.new_timepoint(parse_int(lb)?, parse_int(ub)?)?;
                self.timepoint_ids.insert(name.to_string(), tp);
                self.timepoints.push((name.to_string(), tp));
            }
            ["edge", src, tgt, w] => {
                let (src, tgt) = (self.get_timepoint(src)?, self.get_timepoint(tgt)?);
                self.solver.theory.add_permanent_edge(src, tgt, parse_int(w)?)?;
            }
            ["cond", lit, src, tgt, w] => {
                let (src, tgt) = (self.get_timepoint(src)?, self.get_timepoint(tgt)?);
                let guard = self.get_or_create_literal(lit)?;
                self.solver.theory.add_conditional_edge(src, tgt, parse_int(w)?, guard)?;
            }
            ["bound", lit, tp, op, value] => {
                let tp = self.get_timepoint(tp)?;
                let value = parse_int(value)?;
                let fact = match *op {
                    "<=" => BoundFact::Leq(tp, value),
                    ">=" => BoundFact::Geq(tp, value),
                    _ => bail!("unknown comparison `{op}`, expected `<=` or `>=`"),
                };
                let lit = self.get_or_create_literal(lit)?;
                self.solver.theory.bind_bound_literal(lit, fact)?;
            }
            ["clause", lits @ ..] => {
                let clause = lits
                    .iter()
                    .map(|l| self.get_or_create_literal(l))
                    .collect::<Result<Vec<_>>>()?;
                self.solver.add_clause(clause)?;
            }
            [directive, ..] => bail!("malformed directive `{directive}`"),
            [] => {}
        }
        Ok(())
    }

    fn get_timepoint(&self, name: &str) -> Result<Timepoint> {
        self.timepoint(name)
            .with_context(|| format!("unknown timepoint `{name}`"))
    }

    fn get_or_create_literal(&mut self, name: &str) -> Result<Lit> {
        let (positive, var_name) = split_negation(name);
        ensure!(
            !var_name.is_empty() && var_name.chars().all(|c| c.is_alphanumeric() || c == '_'),
            "invalid literal `{name}`"
        );
        let theory = &mut self.solver.theory;
        let lit = *self
            .variables
            .entry(var_name.to_string())
            .or_insert_with(|| theory.new_literal());
        Ok(if positive { lit } else { !lit })
    }

    /// Renders the solution with one `name value` line per user defined timepoint.
    pub fn format_solution(&self, solution: &Solution) -> String {
        self.timepoints
            .iter()
            .map(|(name, tp)| format!("{name} {}\n", solution.time(*tp)))
            .collect()
    }
}

fn split_negation(name: &str) -> (bool, &str) {
    match name.strip_prefix('!') {
        Some(rest) => (false, rest),
        None => (true, name),
    }
}

fn parse_int(token: &str) -> Result<IntCst> {
    token
        .parse::<IntCst>()
        .with_context(|| format!("invalid integer `{token}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo::sat::SolveResult;

    fn parse(input: &str) -> Result<Problem> {
        Problem::parse(input, StnTheory::new())
    }

    #[test]
    fn test_parse() {
        let pb = parse(
            "
            # two tasks that cannot overlap
            tp a 0 10
            tp b 0 10   # trailing comment
            edge origin a 8
            cond x a b -5
            cond !x b a -5
            bound y b <= 3
            clause x !y
            ",
        )
        .unwrap();
        assert_eq!(pb.timepoints().len(), 2);
        let a = pb.timepoint("a").unwrap();
        assert_eq!(pb.timepoint("origin"), Some(Timepoint::ORIGIN));
        assert_eq!(pb.solver.theory.upper_bound(a), 8);
        let x = pb.literal("x").unwrap();
        assert_eq!(pb.literal("!x"), Some(!x));
        assert!(pb.literal("z").is_none());
        assert_eq!(pb.solver.num_clauses(), 1);
        // 2 domain edges per timepoint, 1 permanent, 2 conditional and 2 for the bound literal
        assert_eq!(pb.solver.theory.num_edges(), 9);
    }

    #[test]
    fn test_malformed() {
        let err = |input: &str| parse(input).err().map(|e| format!("{e:#}"));
        assert!(err("tp a 0").unwrap().contains("line 1"));
        assert!(err("tp a 0 10\ntp a 0 5").unwrap().contains("already defined"));
        assert!(err("edge a b 3").unwrap().contains("unknown timepoint `a`"));
        assert!(err("tp a 0 x").unwrap().contains("invalid integer `x`"));
        assert!(err("tp a 10 0").unwrap().contains("empty domain"));
        assert!(err("tp a 0 10\nbound x a < 3").unwrap().contains("unknown comparison"));
        assert!(err("tp a 0 10\ncond !! a a 3").unwrap().contains("invalid literal"));
        assert!(err("wait a 3").unwrap().contains("malformed directive `wait`"));
        assert!(err("").is_none());
    }

    #[test]
    fn test_solve() {
        let mut pb = parse(
            "
            tp a 0 10
            tp b 0 10
            edge origin a 4
            cond x a b -5
            cond !x b a -5
            ",
        )
        .unwrap();
        let SolveResult::Sat(solution) = pb.solver.solve(None).unwrap() else {
            panic!("expected a solution")
        };
        // a <= 4 leaves no room for a to be after b
        let x = pb.literal("x").unwrap();
        assert!(solution.value(!x));
        assert_eq!(pb.format_solution(&solution), "a 0\nb 5\n");
    }
}
