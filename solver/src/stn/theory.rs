use crate::backtrack::{Backtrack, DecLvl, ObsTrail, Trail};
use crate::collections::ref_store::RefVec;
use crate::core::{BVar, IntCst, Lit};
use crate::error::{InvariantViolation, SetupError};
use crate::stn::config::StnConfig;
use crate::stn::distances::DijkstraState;
use crate::stn::explain::{self, Conflict, Explanation, Implication};
use crate::stn::potential::{DistanceGraph, NegativeCycle};
use crate::stn::reif::{Binding, Bindings, BoundFact};
use crate::stn::store::{Direction, Edge, EdgeId, EdgeKind, Store, Timepoint};
use std::collections::VecDeque;
use std::fmt::{Display, Formatter};

#[derive(Copy, Clone, Debug)]
enum Event {
    LiteralSet(BVar),
    ConflictRecorded,
}

/// Work item of the propagation loop.
#[derive(Copy, Clone, Debug)]
enum Activation {
    /// The literal was just set to true: its guarded edges must be activated.
    Literal(Lit),
    /// A permanent edge that was added to the problem.
    Edge(EdgeId),
}

/// Reason for which [`StnTheory::assign`] rejected a literal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssignError {
    /// The literal activated edges closing a negative cycle.
    Conflict(Conflict),
    /// The literal is not from this theory. Nothing was changed.
    Invalid(InvariantViolation),
}

impl From<Conflict> for AssignError {
    fn from(conflict: Conflict) -> Self {
        AssignError::Conflict(conflict)
    }
}

impl From<InvariantViolation> for AssignError {
    fn from(err: InvariantViolation) -> Self {
        AssignError::Invalid(err)
    }
}

impl AssignError {
    /// The conflict, if the literal was rejected because of one.
    pub fn conflict(&self) -> Option<&Conflict> {
        match self {
            AssignError::Conflict(conflict) => Some(conflict),
            AssignError::Invalid(_) => None,
        }
    }
}

#[derive(Clone, Default, Debug)]
pub struct Stats {
    pub num_activations: u64,
    pub num_conflicts: u64,
    pub num_implications: u64,
    /// Number of edges found to be unactivable.
    pub num_edge_propagations: u64,
    pub num_distance_updates: u64,
}

impl Display for Stats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "# edge activations: {}", self.num_activations)?;
        writeln!(f, "# distance updates: {}", self.num_distance_updates)?;
        writeln!(f, "# conflicts: {}", self.num_conflicts)?;
        writeln!(f, "# implications: {}", self.num_implications)?;
        write!(f, "# unactivable edges: {}", self.num_edge_propagations)
    }
}

/// Incremental difference-logic theory.
///
/// Timepoints and (possibly conditional) difference constraints are added at the root level.
/// The boolean engine then sets literals with [`StnTheory::assign`], which activates the edges
/// they guard. Each activation incrementally maintains the bounds of all timepoints, or reports a
/// [`Conflict`] if it closes a negative cycle. Bound literals and guards of edges that can no longer
/// be activated are implied along the way and published in the [`StnTheory::implications`] queue.
///
/// All changes made after a checkpoint are undone when backtracking to it.
#[derive(Clone)]
pub struct StnTheory {
    pub config: StnConfig,
    store: Store,
    graph: DistanceGraph,
    bindings: Bindings,
    values: RefVec<BVar, Option<bool>>,
    /// Literals set to true, by the engine or by the theory.
    assignments: ObsTrail<Lit>,
    trail: Trail<Event>,
    pending: VecDeque<Activation>,
    implications: ObsTrail<Implication>,
    /// Set when the active graph has a negative cycle. Cleared on backtrack.
    conflict: Option<Conflict>,
    /// Scratch structures for shortest paths from the target and to the source of an edge.
    succs: DijkstraState,
    preds: DijkstraState,
    path_buffer: Vec<EdgeId>,
    stats: Stats,
}

impl Default for StnTheory {
    fn default() -> Self {
        Self::new()
    }
}

impl StnTheory {
    pub fn new() -> Self {
        Self::with_config(StnConfig::default())
    }

    pub fn with_config(config: StnConfig) -> Self {
        StnTheory {
            config,
            store: Store::new(),
            graph: DistanceGraph::new(),
            bindings: Default::default(),
            values: Default::default(),
            assignments: ObsTrail::new(),
            trail: Trail::new(),
            pending: Default::default(),
            implications: ObsTrail::new(),
            conflict: None,
            succs: Default::default(),
            preds: Default::default(),
            path_buffer: Vec::new(),
            stats: Default::default(),
        }
    }

    // ============ Problem setup ===============

    fn check_root(&self) -> Result<(), SetupError> {
        let lvl = self.current_decision_level();
        if lvl == DecLvl::ROOT {
            Ok(())
        } else {
            Err(SetupError::NotAtRoot(lvl))
        }
    }

    fn check_literal(&self, lit: Lit) -> Result<(), SetupError> {
        if self.values.contains(lit.variable()) {
            Ok(())
        } else {
            Err(SetupError::UnknownVariable(lit.variable()))
        }
    }

    /// Creates a new, unassigned, boolean variable.
    pub fn new_bvar(&mut self) -> BVar {
        self.values.push(None)
    }

    /// Creates a new boolean variable and returns its positive literal.
    pub fn new_literal(&mut self) -> Lit {
        self.new_bvar().true_lit()
    }

    pub fn num_variables(&self) -> usize {
        self.values.len()
    }

    pub fn variables(&self) -> impl Iterator<Item = BVar> {
        self.values.keys()
    }

    /// Creates a new timepoint with domain `[lb, ub]`.
    pub fn new_timepoint(&mut self, lb: IntCst, ub: IntCst) -> Result<Timepoint, SetupError> {
        self.check_root()?;
        let tp = self.store.add_timepoint(lb, ub)?;
        let ub_edge = self.store.add_edge(Timepoint::ORIGIN, tp, ub, EdgeKind::Permanent)?;
        let lb_edge = self.store.add_edge(tp, Timepoint::ORIGIN, -lb, EdgeKind::Permanent)?;
        self.graph.add_node(tp, (lb, ub), ub_edge, lb_edge);
        Ok(tp)
    }

    /// Adds the constraint `target - source <= weight`, active in all branches.
    ///
    /// If the constraint makes the problem inconsistent, the edge is still added
    /// and the inconsistency is reported by [`StnTheory::propagate`].
    pub fn add_permanent_edge(
        &mut self,
        source: Timepoint,
        target: Timepoint,
        weight: IntCst,
    ) -> Result<EdgeId, SetupError> {
        self.check_root()?;
        let id = self.store.add_edge(source, target, weight, EdgeKind::Permanent)?;
        self.pending.push_back(Activation::Edge(id));
        self.propagate_setup();
        Ok(id)
    }

    /// Adds the constraint `target - source <= weight`, that must hold whenever `guard` is true.
    pub fn add_conditional_edge(
        &mut self,
        source: Timepoint,
        target: Timepoint,
        weight: IntCst,
        guard: Lit,
    ) -> Result<EdgeId, SetupError> {
        self.add_guarded_edge(source, target, weight, EdgeKind::Conditional(guard))
    }

    /// Adds the constraint `target - source <= weight`, only used in one direction when `guard` is
    /// true: to tighten the upper bound of `target` ([`Direction::Forward`]) or the lower bound of
    /// `source` ([`Direction::Backward`]).
    pub fn add_directed_edge(
        &mut self,
        source: Timepoint,
        target: Timepoint,
        weight: IntCst,
        guard: Lit,
        dir: Direction,
    ) -> Result<EdgeId, SetupError> {
        self.add_guarded_edge(source, target, weight, EdgeKind::Directed(guard, dir))
    }

    /// Adds the constraint `target - source <= weight` between two optional timepoints.
    ///
    /// The constraint tightens the upper bound of `target` when `forward_prop` holds and the lower
    /// bound of `source` when `backward_prop` holds. Typically these are the presence literals of
    /// `target` and `source`: an absent timepoint never restricts a present one.
    /// Returns the forward and backward edges.
    pub fn add_optional_true_edge(
        &mut self,
        source: Timepoint,
        target: Timepoint,
        weight: IntCst,
        forward_prop: Lit,
        backward_prop: Lit,
    ) -> Result<[EdgeId; 2], SetupError> {
        self.check_root()?;
        self.check_literal(forward_prop)?;
        self.check_literal(backward_prop)?;
        self.store.check_timepoint(source)?;
        self.store.check_timepoint(target)?;
        Store::check_magnitude(weight)?;
        let forward = self.add_directed_edge(source, target, weight, forward_prop, Direction::Forward)?;
        let backward = self.add_directed_edge(source, target, weight, backward_prop, Direction::Backward)?;
        Ok([forward, backward])
    }

    fn add_guarded_edge(
        &mut self,
        source: Timepoint,
        target: Timepoint,
        weight: IntCst,
        kind: EdgeKind,
    ) -> Result<EdgeId, SetupError> {
        let (EdgeKind::Conditional(guard) | EdgeKind::Directed(guard, _)) = kind else {
            return self.add_permanent_edge(source, target, weight);
        };
        self.check_root()?;
        self.check_literal(guard)?;
        let id = self.store.add_edge(source, target, weight, kind)?;
        self.bindings.add(guard, Binding::Edge(id));
        match self.value(guard) {
            Some(true) => self.pending.push_back(Activation::Edge(id)),
            Some(false) => {}
            None => {
                if self.config.theory_propagation.bounds() {
                    self.check_edge_feasibility(id);
                }
            }
        }
        self.propagate_setup();
        Ok(id)
    }

    /// Adds the constraint `target - source <= weight`, conditioned by `guard` if any.
    pub fn add_constraint(
        &mut self,
        source: Timepoint,
        target: Timepoint,
        weight: IntCst,
        guard: Option<Lit>,
    ) -> Result<EdgeId, SetupError> {
        match guard {
            Some(guard) => self.add_conditional_edge(source, target, weight, guard),
            None => self.add_permanent_edge(source, target, weight),
        }
    }

    /// Enforces `to <= from + delay`
    pub fn add_max_delay(&mut self, from: Timepoint, to: Timepoint, delay: IntCst) -> Result<EdgeId, SetupError> {
        self.add_permanent_edge(from, to, delay)
    }

    /// Enforces `to >= from + delay`
    pub fn add_min_delay(&mut self, from: Timepoint, to: Timepoint, delay: IntCst) -> Result<EdgeId, SetupError> {
        self.add_permanent_edge(to, from, -delay)
    }

    /// Enforces `a <= b`
    pub fn add_before_eq(&mut self, a: Timepoint, b: Timepoint) -> Result<EdgeId, SetupError> {
        self.add_permanent_edge(b, a, 0)
    }

    /// Enforces `a < b`
    pub fn add_strictly_before(&mut self, a: Timepoint, b: Timepoint) -> Result<EdgeId, SetupError> {
        self.add_permanent_edge(b, a, -1)
    }

    /// Makes `lit` equivalent to the constraint `target - source <= weight`.
    ///
    /// `lit` guards the edge of the constraint and `!lit` guards the edge of its negation,
    /// `source - target <= -weight - 1`. Returns the edge guarded by `lit`.
    pub fn add_reified_edge(
        &mut self,
        lit: Lit,
        source: Timepoint,
        target: Timepoint,
        weight: IntCst,
    ) -> Result<EdgeId, SetupError> {
        self.check_root()?;
        self.check_literal(lit)?;
        self.store.check_timepoint(source)?;
        self.store.check_timepoint(target)?;
        Store::check_magnitude(weight)?;
        Store::check_magnitude(-weight - 1)?;
        let [edge, _] = self.add_equivalence(lit, [(source, target, weight), (target, source, -weight - 1)])?;
        let entailed = self.config.theory_propagation.bounds();
        self.on_equivalence_added(lit, entailed);
        Ok(edge)
    }

    /// Makes `lit` equivalent to the bound fact.
    ///
    /// Both polarities are realized as conditional edges from or to the origin: `lit` guards
    /// the edge enforcing `fact` and `!lit` guards the edge enforcing its negation.
    pub fn bind_bound_literal(&mut self, lit: Lit, fact: BoundFact) -> Result<(), SetupError> {
        self.check_root()?;
        self.check_literal(lit)?;
        self.store.check_timepoint(fact.timepoint())?;
        Store::check_magnitude(fact.value())?;
        let negation = fact.negation();
        Store::check_magnitude(negation.value())?;
        self.add_equivalence(lit, [fact.as_edge(), negation.as_edge()])?;
        self.bindings.add(lit, Binding::Bound(fact));
        self.bindings.add(!lit, Binding::Bound(negation));
        self.on_equivalence_added(lit, true);
        Ok(())
    }

    /// Adds the first edge guarded by `lit` and the second one by `!lit`. The arguments must have
    /// been validated.
    fn add_equivalence(
        &mut self,
        lit: Lit,
        edges: [(Timepoint, Timepoint, IntCst); 2],
    ) -> Result<[EdgeId; 2], SetupError> {
        let [(s, t, w), (neg_s, neg_t, neg_w)] = edges;
        let edge = self.store.add_edge(s, t, w, EdgeKind::Conditional(lit))?;
        let negation = self
            .store
            .add_edge(neg_s, neg_t, neg_w, EdgeKind::Conditional(!lit))?;
        self.bindings.add(lit, Binding::Edge(edge));
        self.bindings.add(!lit, Binding::Edge(negation));
        Ok([edge, negation])
    }

    /// Activates the edges of a literal that was just given a meaning, if it is already set.
    /// Otherwise, if `entailed` is set, sets it when the current bounds forbid one of its edges.
    fn on_equivalence_added(&mut self, lit: Lit, entailed: bool) {
        match self.value(lit) {
            Some(true) => self.pending.push_back(Activation::Literal(lit)),
            Some(false) => self.pending.push_back(Activation::Literal(!lit)),
            None if entailed => {
                for l in [lit, !lit] {
                    for i in 0..self.bindings.bindings(l).len() {
                        if let Binding::Edge(e) = self.bindings.bindings(l)[i] {
                            self.check_edge_feasibility(e);
                        }
                    }
                }
            }
            None => {}
        }
        self.propagate_setup();
    }

    /// Creates a new literal equivalent to the bound fact.
    pub fn new_bound_literal(&mut self, fact: BoundFact) -> Result<Lit, SetupError> {
        self.check_root()?;
        self.store.check_timepoint(fact.timepoint())?;
        Store::check_magnitude(fact.value())?;
        Store::check_magnitude(fact.negation().value())?;
        let lit = self.new_literal();
        self.bind_bound_literal(lit, fact)?;
        Ok(lit)
    }

    /// Creates a new literal equivalent to `tp <= value`.
    pub fn leq_literal(&mut self, tp: Timepoint, value: IntCst) -> Result<Lit, SetupError> {
        self.new_bound_literal(BoundFact::Leq(tp, value))
    }

    /// Creates a new literal equivalent to `tp >= value`.
    pub fn geq_literal(&mut self, tp: Timepoint, value: IntCst) -> Result<Lit, SetupError> {
        self.new_bound_literal(BoundFact::Geq(tp, value))
    }

    /// Propagates the consequences of a change to the problem.
    /// An inconsistency is recorded and reported on the next call to `propagate` or `assign`.
    fn propagate_setup(&mut self) {
        if let Err(conflict) = self.propagate() {
            tracing::debug!(clause = ?conflict.clause(), "inconsistent problem definition");
        }
    }

    // ============ Propagation ===============

    /// Notifies the theory that `literal` was set to true, and propagates its consequences.
    ///
    /// Setting a literal that is already true is a no-op. If the negation of `literal` holds,
    /// the call is ignored: the edges guarded by `literal` are disabled for the current branch.
    /// A literal whose variable was not created by this theory is rejected without any change.
    pub fn assign(&mut self, literal: Lit) -> Result<(), AssignError> {
        if !self.values.contains(literal.variable()) {
            return Err(InvariantViolation::UnknownVariable(literal.variable()).into());
        }
        if let Some(conflict) = &self.conflict {
            return Err(conflict.clone().into());
        }
        self.set_literal(literal);
        Ok(self.propagate()?)
    }

    /// Alias of [`StnTheory::assign`].
    pub fn on_literal_assigned(&mut self, literal: Lit) -> Result<(), AssignError> {
        self.assign(literal)
    }

    /// Returns true if the literal was not previously set. The variable must exist.
    fn set_literal(&mut self, literal: Lit) -> bool {
        let var = literal.variable();
        match self.values[var] {
            Some(v) if v == literal.polarity() => false,
            Some(_) => {
                tracing::debug!(?literal, "ignored, the negation of the literal holds");
                false
            }
            None => {
                self.values[var] = Some(literal.polarity());
                self.assignments.push(literal);
                self.trail.push(Event::LiteralSet(var));
                self.pending.push_back(Activation::Literal(literal));
                true
            }
        }
    }

    /// Processes all pending activations, until a fixed point or a conflict.
    ///
    /// While the theory is inconsistent, the same conflict is returned until backtracking
    /// past the level at which it occurred.
    pub fn propagate(&mut self) -> Result<(), Conflict> {
        if let Some(conflict) = &self.conflict {
            // nothing can be activated until the conflict is undone
            self.pending.clear();
            return Err(conflict.clone());
        }
        while let Some(activation) = self.pending.pop_front() {
            match activation {
                Activation::Literal(lit) => {
                    for i in 0..self.bindings.bindings(lit).len() {
                        if let Binding::Edge(e) = self.bindings.bindings(lit)[i] {
                            self.activate(e)?;
                        }
                    }
                }
                Activation::Edge(e) => self.activate(e)?,
            }
        }
        if self.config.self_check {
            self.check_potentials();
        }
        Ok(())
    }

    fn activate(&mut self, id: EdgeId) -> Result<(), Conflict> {
        let edge = *self.store.edge(id);
        if self.graph.is_active(id) {
            return Ok(());
        }
        if let Some(guard) = edge.guard() {
            if self.value(guard) != Some(true) {
                return Ok(());
            }
        }
        self.stats.num_activations += 1;
        let before = self.graph.num_updates;
        let result = self.graph.activate(&self.store, id);
        self.stats.num_distance_updates += self.graph.num_updates - before;
        match result {
            Ok(()) => {
                tracing::trace!(?id, ?edge, "activated");
                self.propagate_updates();
                if self.config.theory_propagation.edges() && edge.is_shared() {
                    self.theory_propagate_edge(id);
                }
                Ok(())
            }
            Err(cycle) => Err(self.record_conflict(cycle)),
        }
    }

    fn record_conflict(&mut self, cycle: NegativeCycle) -> Conflict {
        debug_assert!(explain::is_cycle(&self.store, &cycle.edges));
        debug_assert!(explain::total_weight(&self.store, &cycle.edges) < 0);
        let conflict = Conflict::new(&self.store, cycle.edges);
        if self.config.self_check {
            self.check_conflict(&conflict);
        }
        tracing::debug!(clause = ?conflict.clause(), lvl = ?self.current_decision_level(), "negative cycle");
        self.stats.num_conflicts += 1;
        self.pending.clear();
        self.conflict = Some(conflict.clone());
        self.trail.push(Event::ConflictRecorded);
        conflict
    }

    /// Derives the consequences of the potential updates of the last activation.
    fn propagate_updates(&mut self) {
        let bounds = self.config.theory_propagation.bounds();
        for i in 0..self.graph.updated().len() {
            let (dir, node) = self.graph.updated()[i];
            let value = self.graph.value(dir, node);
            for j in 0..self.bindings.watches(dir, node).len() {
                let watch = self.bindings.watches(dir, node)[j];
                if value <= watch.threshold && self.value(watch.literal).is_none() {
                    let mut explanation = Explanation::new();
                    self.explain_potential(dir, node, &mut explanation);
                    self.emit(watch.literal, explanation);
                }
            }
            if bounds {
                // an upper bound update constrains the edges leaving the node,
                // a lower bound update the edges entering it
                let num_candidates = match dir {
                    Direction::Forward => self.store.conditional_out(node).len(),
                    Direction::Backward => self.store.conditional_in(node).len(),
                };
                for j in 0..num_candidates {
                    let candidate = match dir {
                        Direction::Forward => self.store.conditional_out(node)[j],
                        Direction::Backward => self.store.conditional_in(node)[j],
                    };
                    self.check_edge_feasibility(candidate);
                }
            }
        }
    }

    /// If the guarded edge is not yet decided and `ub(source) + weight < lb(target)`, the edge
    /// can never become active and the negation of its guard is implied.
    ///
    /// This holds in both views: activating the edge would push the upper bound of `target` below
    /// its lower bound, or the lower bound of `source` above its upper bound.
    fn check_edge_feasibility(&mut self, id: EdgeId) {
        let edge = *self.store.edge(id);
        let Some(guard) = edge.guard() else {
            return;
        };
        if self.value(guard).is_some() {
            return;
        }
        let mut explanation = Explanation::new();
        if edge.is_self_loop() {
            if edge.weight < 0 {
                self.stats.num_edge_propagations += 1;
                self.emit(!guard, explanation);
            }
            return;
        }
        let ub_source = self.graph.value(Direction::Forward, edge.source);
        let neg_lb_target = self.graph.value(Direction::Backward, edge.target);
        if ub_source + edge.weight + neg_lb_target < 0 {
            self.explain_potential(Direction::Forward, edge.source, &mut explanation);
            self.explain_potential(Direction::Backward, edge.target, &mut explanation);
            self.stats.num_edge_propagations += 1;
            self.emit(!guard, explanation);
        }
    }

    /// Following the activation of `(s, t, w)`, finds all undecided edges `(x, y, w')` such that
    /// `dist(t, x) + w' + dist(y, s) + w < 0` and implies the negation of their guard.
    ///
    /// Only edges part of both views are considered: the cycle would then be negative in both.
    fn theory_propagate_edge(&mut self, id: EdgeId) {
        let edge = *self.store.edge(id);
        if edge.is_self_loop() {
            return;
        }
        self.graph
            .run_dijkstra(Direction::Forward, edge.target, &mut self.succs, true, |_| false);
        self.graph
            .run_dijkstra(Direction::Backward, edge.source, &mut self.preds, true, |_| false);

        let mut unactivable: Vec<(Timepoint, EdgeId)> = Vec::new();
        for (x, dist_tx) in self.succs.distances(&self.graph) {
            for &candidate_id in self.store.conditional_out(x) {
                let candidate = self.store.edge(candidate_id);
                if !candidate.is_shared() || candidate.guard().and_then(|g| self.value(g)).is_some() {
                    continue;
                }
                let Some(dist_ys) = self.preds.distance(&self.graph, candidate.target) else {
                    continue;
                };
                if dist_tx + candidate.weight + dist_ys + edge.weight < 0 {
                    unactivable.push((x, candidate_id));
                }
            }
        }

        for (x, candidate_id) in unactivable {
            let candidate = *self.store.edge(candidate_id);
            let Some(guard) = candidate.guard() else {
                continue;
            };
            if self.value(guard).is_some() {
                continue;
            }
            self.path_buffer.clear();
            self.path_buffer.push(id);
            self.succs.path_to(&self.store, x, &mut self.path_buffer);
            self.preds.path_to(&self.store, candidate.target, &mut self.path_buffer);
            let mut explanation = Explanation::new();
            explanation.add_guards(&self.store, self.path_buffer.iter().copied());
            self.stats.num_edge_propagations += 1;
            self.emit(!guard, explanation);
        }
    }

    /// Adds to `out` the guards of the shortest path that justifies the current potential of `node`.
    fn explain_potential(&mut self, dir: Direction, node: Timepoint, out: &mut Explanation) {
        self.path_buffer.clear();
        self.graph
            .predecessor_chain(&self.store, dir, node, &mut self.path_buffer);
        if self.config.self_check {
            let weight = explain::total_weight(&self.store, &self.path_buffer);
            assert!(weight <= self.graph.value(dir, node) as i128, "invalid predecessor chain");
        }
        out.add_guards(&self.store, self.path_buffer.iter().copied());
    }

    /// Sets a literal derived by the theory and publishes it in the implication queue.
    fn emit(&mut self, literal: Lit, explanation: Explanation) {
        if !self.set_literal(literal) {
            return;
        }
        let explanation = explanation.sorted();
        tracing::trace!(?literal, ?explanation, "implied");
        self.stats.num_implications += 1;
        self.implications.push(Implication { literal, explanation });
    }

    // ============ Checks ===============

    fn check_potentials(&self) {
        for tp in self.timepoints() {
            assert!(self.lower_bound(tp) <= self.upper_bound(tp), "empty domain for {tp:?}");
        }
        for (id, edge) in self.store.edges() {
            if self.graph.is_active(id) {
                for dir in Direction::BOTH.into_iter().filter(|&d| edge.propagates_in(d)) {
                    let (from, to) = edge.oriented(dir);
                    assert!(
                        self.graph.value(dir, to) <= self.graph.value(dir, from) + edge.weight,
                        "active edge {id:?} violated in the {dir:?} view"
                    );
                }
            }
        }
    }

    fn check_conflict(&self, conflict: &Conflict) {
        assert!(explain::is_cycle(&self.store, conflict.cycle()), "conflict is not a cycle");
        assert!(explain::total_weight(&self.store, conflict.cycle()) < 0, "cycle is not negative");
        for l in conflict.explanation().iter() {
            assert_eq!(self.value(l), Some(true), "literal of the explanation is not true");
        }
    }

    // ============ Queries ===============

    pub fn value(&self, literal: Lit) -> Option<bool> {
        self.values
            .get(literal.variable())
            .copied()
            .flatten()
            .map(|v| v == literal.polarity())
    }

    /// Returns false if the active graph has a negative cycle.
    pub fn is_consistent(&self) -> bool {
        self.conflict.is_none()
    }

    pub fn conflict(&self) -> Option<&Conflict> {
        self.conflict.as_ref()
    }

    /// Queue of all literals currently true, in the order they were set.
    /// Literals set after a checkpoint are removed when backtracking to it.
    pub fn assignments(&self) -> &ObsTrail<Lit> {
        &self.assignments
    }

    /// Queue of all literals implied by the theory, with their explanation.
    /// Implications made after a checkpoint are removed when backtracking to it.
    pub fn implications(&self) -> &ObsTrail<Implication> {
        &self.implications
    }

    pub fn upper_bound(&self, tp: Timepoint) -> IntCst {
        self.graph.upper_bound(tp)
    }

    pub fn lower_bound(&self, tp: Timepoint) -> IntCst {
        self.graph.lower_bound(tp)
    }

    pub fn bounds(&self, tp: Timepoint) -> (IntCst, IntCst) {
        (self.lower_bound(tp), self.upper_bound(tp))
    }

    /// The tightest upper bound on `b - a` implied by the active edges.
    pub fn distance(&self, a: Timepoint, b: Timepoint) -> IntCst {
        let mut state = DijkstraState::default();
        self.graph
            .shortest_distance(a, b, &mut state)
            .unwrap_or_else(|| self.upper_bound(b) - self.lower_bound(a))
    }

    /// Shortest distances from `a` to all timepoints.
    pub fn forward_distances(&self, a: Timepoint) -> Vec<(Timepoint, IntCst)> {
        self.distances(Direction::Forward, a)
    }

    /// Shortest distances from all timepoints to `a`.
    pub fn backward_distances(&self, a: Timepoint) -> Vec<(Timepoint, IntCst)> {
        self.distances(Direction::Backward, a)
    }

    fn distances(&self, dir: Direction, a: Timepoint) -> Vec<(Timepoint, IntCst)> {
        let mut state = DijkstraState::default();
        self.graph.run_dijkstra(dir, a, &mut state, false, |_| false);
        let mut distances: Vec<_> = state.distances(&self.graph).collect();
        distances.sort_unstable();
        distances
    }

    /// Raw potential of a view: upper bounds for the forward view and negated lower bounds for the backward one.
    pub fn potential(&self, dir: Direction) -> RefVec<Timepoint, IntCst> {
        self.timepoints().map(|tp| self.graph.value(dir, tp)).collect()
    }

    /// Assigns each timepoint to its lower bound.
    /// The assignment satisfies all active edges, except the ones only used for upper bounds.
    pub fn earliest_schedule(&self) -> RefVec<Timepoint, IntCst> {
        self.timepoints().map(|tp| self.lower_bound(tp)).collect()
    }

    /// Assigns each timepoint to its upper bound.
    /// The assignment satisfies all active edges, except the ones only used for lower bounds.
    pub fn latest_schedule(&self) -> RefVec<Timepoint, IntCst> {
        self.timepoints().map(|tp| self.upper_bound(tp)).collect()
    }

    /// Domain given to the timepoint when it was created.
    pub fn initial_bounds(&self, tp: Timepoint) -> (IntCst, IntCst) {
        self.store.initial_domain(tp)
    }

    /// All timepoints, starting with the origin.
    pub fn timepoints(&self) -> impl Iterator<Item = Timepoint> {
        self.store.timepoints()
    }

    pub fn num_timepoints(&self) -> usize {
        self.store.num_timepoints()
    }

    pub fn edge(&self, id: EdgeId) -> Result<&Edge, SetupError> {
        if self.store.contains_edge(id) {
            Ok(self.store.edge(id))
        } else {
            Err(SetupError::UnknownEdge(id))
        }
    }

    /// All edges, including the ones encoding the domains of timepoints and bound literals.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.store.edges()
    }

    pub fn num_edges(&self) -> usize {
        self.store.num_edges()
    }

    pub fn is_active(&self, id: EdgeId) -> bool {
        self.graph.is_active(id)
    }

    /// True if the edge's guard is false: the edge cannot be active in the current branch.
    pub fn is_disabled(&self, id: EdgeId) -> bool {
        self.store.contains_edge(id)
            && self
                .store
                .edge(id)
                .guard()
                .is_some_and(|g| self.value(g) == Some(false))
    }

    /// What the literal stands for.
    pub fn bindings(&self, literal: Lit) -> &[Binding] {
        self.bindings.bindings(literal)
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn print_stats(&self) {
        println!("# timepoints: {}", self.num_timepoints());
        println!("# edges: {}", self.num_edges());
        println!("{}", self.stats);
    }

    // ============ Checkpoints ===============

    /// Opens a new decision level and returns it.
    pub fn push_checkpoint(&mut self) -> DecLvl {
        self.save_state()
    }

    /// Undoes all events recorded at levels strictly above `level`.
    pub fn backtrack(&mut self, level: DecLvl) -> Result<(), InvariantViolation> {
        let current = self.current_decision_level();
        if level > current {
            return Err(InvariantViolation::UnknownLevel {
                requested: level,
                current,
            });
        }
        self.restore(level);
        Ok(())
    }

    /// Restores the state as it was right after the call to [`StnTheory::push_checkpoint`] that
    /// returned `level`. The checkpoint itself stays open. Popping to the root level undoes
    /// everything that happened above it.
    pub fn pop_to(&mut self, level: DecLvl) -> Result<(), InvariantViolation> {
        match level.parent() {
            None => self.backtrack(DecLvl::ROOT),
            Some(parent) => {
                self.backtrack(level)?;
                self.restore(parent);
                let reopened = self.save_state();
                debug_assert_eq!(reopened, level);
                Ok(())
            }
        }
    }
}

impl Backtrack for StnTheory {
    fn save_state(&mut self) -> DecLvl {
        debug_assert!(self.pending.is_empty(), "checkpoint with pending activations");
        let lvl = self.trail.save_state();
        self.graph.save_state();
        self.assignments.save_state();
        self.implications.save_state();
        lvl
    }

    fn num_saved(&self) -> u32 {
        self.trail.num_saved()
    }

    fn restore_last(&mut self) {
        self.pending.clear();
        self.trail.restore_last_with(|ev| match ev {
            Event::LiteralSet(var) => self.values[var] = None,
            Event::ConflictRecorded => self.conflict = None,
        });
        self.graph.restore_last();
        self.assignments.restore_last();
        self.implications.restore_last();
    }
}
