use crate::collections::ref_store::RefVec;
use crate::core::{IntCst, Lit, MAX_MAGNITUDE};
use crate::error::SetupError;

crate::create_ref_type!(Timepoint);
crate::create_ref_type!(EdgeId);

impl Timepoint {
    /// The distinguished timepoint whose value is always 0.
    /// Upper and lower bounds of a timepoint are its distances from and to the origin.
    pub const ORIGIN: Timepoint = Timepoint::from_u32(0);
}

/// One of the two views of the distance graph.
///
/// In the forward view, an edge `(source, target, w)` goes from `source` to `target` and
/// distances from the origin are upper bounds. In the backward view the same edge goes from
/// `target` to `source` and distances from the origin are negated lower bounds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub const BOTH: [Direction; 2] = [Direction::Forward, Direction::Backward];

    pub(crate) fn index(self) -> usize {
        match self {
            Direction::Forward => 0,
            Direction::Backward => 1,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Always active.
    Permanent,
    /// Active exactly when the literal is true.
    Conditional(Lit),
    /// Active when the literal is true, but only part of one view: a forward edge only tightens
    /// the upper bound of its target and a backward edge the lower bound of its source.
    Directed(Lit, Direction),
}

/// A difference constraint `target - source <= weight`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Edge {
    pub source: Timepoint,
    pub target: Timepoint,
    pub weight: IntCst,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn guard(&self) -> Option<Lit> {
        match self.kind {
            EdgeKind::Permanent => None,
            EdgeKind::Conditional(l) | EdgeKind::Directed(l, _) => Some(l),
        }
    }

    /// True if the edge is part of both views.
    pub fn is_shared(&self) -> bool {
        !matches!(self.kind, EdgeKind::Directed(_, _))
    }

    pub fn propagates_in(&self, dir: Direction) -> bool {
        match self.kind {
            EdgeKind::Directed(_, d) => d == dir,
            _ => true,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    /// Returns the `(from, to)` endpoints of the edge in the given view.
    pub fn oriented(&self, dir: Direction) -> (Timepoint, Timepoint) {
        match dir {
            Direction::Forward => (self.source, self.target),
            Direction::Backward => (self.target, self.source),
        }
    }
}

/// Arena of timepoints and edges.
///
/// The store only records the problem: which edges are active and the current bounds are
/// maintained by the distance graph.
#[derive(Clone)]
pub(crate) struct Store {
    /// Initial domain of each timepoint, the origin included.
    domains: RefVec<Timepoint, (IntCst, IntCst)>,
    edges: RefVec<EdgeId, Edge>,
    /// Guarded edges leaving each timepoint.
    conditional_out: RefVec<Timepoint, Vec<EdgeId>>,
    /// Guarded edges entering each timepoint.
    conditional_in: RefVec<Timepoint, Vec<EdgeId>>,
}

impl Store {
    pub fn new() -> Store {
        let mut store = Store {
            domains: Default::default(),
            edges: Default::default(),
            conditional_out: Default::default(),
            conditional_in: Default::default(),
        };
        let origin = store.push_timepoint(0, 0);
        debug_assert_eq!(origin, Timepoint::ORIGIN);
        store
    }

    fn push_timepoint(&mut self, lb: IntCst, ub: IntCst) -> Timepoint {
        let tp = self.domains.push((lb, ub));
        self.conditional_out.push(Vec::new());
        self.conditional_in.push(Vec::new());
        tp
    }

    pub fn check_magnitude(value: IntCst) -> Result<(), SetupError> {
        if (-MAX_MAGNITUDE..=MAX_MAGNITUDE).contains(&value) {
            Ok(())
        } else {
            Err(SetupError::OutOfRange {
                value: value as i128,
                max: MAX_MAGNITUDE as i128,
            })
        }
    }

    pub fn check_timepoint(&self, tp: Timepoint) -> Result<(), SetupError> {
        if self.domains.contains(tp) {
            Ok(())
        } else {
            Err(SetupError::UnknownTimepoint(tp))
        }
    }

    pub fn add_timepoint(&mut self, lb: IntCst, ub: IntCst) -> Result<Timepoint, SetupError> {
        Self::check_magnitude(lb)?;
        Self::check_magnitude(ub)?;
        if lb > ub {
            return Err(SetupError::EmptyDomain {
                lb: lb as i128,
                ub: ub as i128,
            });
        }
        Ok(self.push_timepoint(lb, ub))
    }

    pub fn add_edge(
        &mut self,
        source: Timepoint,
        target: Timepoint,
        weight: IntCst,
        kind: EdgeKind,
    ) -> Result<EdgeId, SetupError> {
        self.check_timepoint(source)?;
        self.check_timepoint(target)?;
        Self::check_magnitude(weight)?;
        let id = self.edges.push(Edge {
            source,
            target,
            weight,
            kind,
        });
        if kind != EdgeKind::Permanent {
            self.conditional_out[source].push(id);
            self.conditional_in[target].push(id);
        }
        Ok(id)
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id]
    }

    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.edges.contains(id)
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.edges.entries()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_timepoints(&self) -> usize {
        self.domains.len()
    }

    pub fn timepoints(&self) -> impl Iterator<Item = Timepoint> {
        self.domains.keys()
    }

    pub fn initial_domain(&self, tp: Timepoint) -> (IntCst, IntCst) {
        self.domains[tp]
    }

    pub fn conditional_out(&self, tp: Timepoint) -> &[EdgeId] {
        &self.conditional_out[tp]
    }

    pub fn conditional_in(&self, tp: Timepoint) -> &[EdgeId] {
        &self.conditional_in[tp]
    }
}
