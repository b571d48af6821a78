use env_param::EnvParam;
use std::str::FromStr;

pub static STN_THEORY_PROPAGATION: EnvParam<TheoryPropagationLevel> =
    EnvParam::new("TEMPO_STN_THEORY_PROPAGATION", "bounds");
pub static STN_SELF_CHECK: EnvParam<bool> = EnvParam::new("TEMPO_STN_SELF_CHECK", "false");

/// Inferences made on conditional edges that are not yet active.
///
/// Whatever the level, an edge whose activation would close a negative cycle is always detected
/// when its guard is set. Theory propagation detects some of these edges beforehand and sets the
/// negation of their guard.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TheoryPropagationLevel {
    None,
    /// On each bound change, checks the edges entering or leaving the node against its new bound.
    /// Cheap: only looks at the conditional edges of updated nodes.
    Bounds,
    /// On each edge activation, searches the shortest paths around the new edge for edges that
    /// would close a negative cycle with it. Requires two runs of Dijkstra per activation.
    Edges,
    /// Both `Bounds` and `Edges`.
    Full,
}

impl TheoryPropagationLevel {
    pub fn bounds(&self) -> bool {
        match self {
            TheoryPropagationLevel::None | TheoryPropagationLevel::Edges => false,
            TheoryPropagationLevel::Bounds | TheoryPropagationLevel::Full => true,
        }
    }

    pub fn edges(&self) -> bool {
        match self {
            TheoryPropagationLevel::None | TheoryPropagationLevel::Bounds => false,
            TheoryPropagationLevel::Edges | TheoryPropagationLevel::Full => true,
        }
    }
}

impl FromStr for TheoryPropagationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(TheoryPropagationLevel::None),
            "bounds" => Ok(TheoryPropagationLevel::Bounds),
            "edges" => Ok(TheoryPropagationLevel::Edges),
            "full" => Ok(TheoryPropagationLevel::Full),
            other => Err(format!("unknown propagation level `{other}` (expected none, bounds, edges or full)")),
        }
    }
}

/// Options of the [`StnTheory`](crate::stn::StnTheory).
///
/// The default value of all parameters can be set through environment variables.
#[derive(Clone, Debug)]
pub struct StnConfig {
    /// Which inferences are made on inactive edges that could not become active
    /// without creating a negative cycle.
    pub theory_propagation: TheoryPropagationLevel,
    /// If true, every conflict and implication is checked against the graph before being
    /// emitted, and potentials are checked after each propagation. Very expensive.
    pub self_check: bool,
}

impl Default for StnConfig {
    fn default() -> Self {
        StnConfig {
            theory_propagation: STN_THEORY_PROPAGATION.get(),
            self_check: cfg!(debug_assertions) && STN_SELF_CHECK.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_levels() {
        assert_eq!("full".parse(), Ok(TheoryPropagationLevel::Full));
        assert!("literals".parse::<TheoryPropagationLevel>().is_err());
        assert!(TheoryPropagationLevel::Full.bounds() && TheoryPropagationLevel::Full.edges());
        assert!(!TheoryPropagationLevel::None.bounds());
        assert!(TheoryPropagationLevel::Edges.edges() && !TheoryPropagationLevel::Edges.bounds());
    }
}
