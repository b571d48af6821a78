//! Incremental consistency of the active distance graph.
//!
//! Each view (forward and backward) maintains a potential function: the shortest distance from
//! the origin to every node. Adding an edge only lowers potentials, which is done incrementally
//! with the algorithm of Cesta & Oddi (1996): the decrease is propagated along active edges, only
//! visiting nodes whose potential changes. If the propagation reaches back the source of the new
//! edge (or the origin), the new edge closes a negative cycle.
//!
//! Directed edges are only part of one view. Each view can then be free of negative cycles while
//! a node has its upper bound below its lower bound, which is checked after each activation.

use crate::backtrack::{Backtrack, DecLvl, Trail};
use crate::collections::ref_store::RefVec;
use crate::collections::set::RefSet;
use crate::core::IntCst;
use crate::stn::store::{Direction, Edge, EdgeId, Store, Timepoint};
use std::collections::VecDeque;

/// An edge of a view, as seen from its origin node.
#[derive(Copy, Clone, Debug)]
pub(crate) struct OutEdge {
    pub target: Timepoint,
    pub weight: IntCst,
    pub id: EdgeId,
    /// The edge is also part of the other view.
    pub shared: bool,
}

/// Value of a node in a view, together with the last edge that lowered it.
///
/// Following predecessors from any node leads back to the origin, along a path whose
/// length is at most the node's value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Potential {
    pub value: IntCst,
    pub predecessor: Option<EdgeId>,
}

#[derive(Clone, Default)]
struct View {
    potentials: RefVec<Timepoint, Potential>,
    /// Active edges leaving each node, in activation order.
    out: RefVec<Timepoint, Vec<OutEdge>>,
}

#[derive(Copy, Clone, Debug)]
enum Event {
    EdgeActivated {
        id: EdgeId,
        edge: Edge,
    },
    Updated {
        dir: Direction,
        node: Timepoint,
        previous: Potential,
    },
}

/// The set of edges whose activation closes a negative cycle, in path order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct NegativeCycle {
    pub edges: Vec<EdgeId>,
}

#[derive(Clone)]
pub(crate) struct DistanceGraph {
    views: [View; 2],
    active: RefVec<EdgeId, bool>,
    trail: Trail<Event>,
    /// Nodes whose potential was lowered by the last activation.
    updated: Vec<(Direction, Timepoint)>,
    queue: VecDeque<Timepoint>,
    in_queue: RefSet<Timepoint>,
    /// Total number of potential updates, for statistics.
    pub num_updates: u64,
}

fn undo_event(views: &mut [View; 2], active: &mut RefVec<EdgeId, bool>, ev: Event) {
    match ev {
        Event::EdgeActivated { id, edge } => {
            active[id] = false;
            for dir in Direction::BOTH {
                if edge.propagates_in(dir) {
                    let (from, _) = edge.oriented(dir);
                    let popped = views[dir.index()].out[from].pop();
                    debug_assert!(popped.is_some_and(|e| e.id == id));
                }
            }
        }
        Event::Updated { dir, node, previous } => {
            views[dir.index()].potentials[node] = previous;
        }
    }
}

impl DistanceGraph {
    pub fn new() -> DistanceGraph {
        let mut graph = DistanceGraph {
            views: Default::default(),
            active: Default::default(),
            trail: Trail::new(),
            updated: Vec::new(),
            queue: VecDeque::new(),
            in_queue: RefSet::new(),
            num_updates: 0,
        };
        for view in &mut graph.views {
            view.potentials.push(Potential {
                value: 0,
                predecessor: None,
            });
            view.out.push(Vec::new());
        }
        graph
    }

    fn view(&self, dir: Direction) -> &View {
        &self.views[dir.index()]
    }

    fn view_mut(&mut self, dir: Direction) -> &mut View {
        &mut self.views[dir.index()]
    }

    /// Adds a node with domain `[lb, ub]`, enforced by the permanent edges `ub_edge` (`origin -> tp`)
    /// and `lb_edge` (`tp -> origin`). Both edges are made active.
    ///
    /// Only meant to be called at the root level: the addition cannot be undone.
    pub fn add_node(&mut self, tp: Timepoint, (lb, ub): (IntCst, IntCst), ub_edge: EdgeId, lb_edge: EdgeId) {
        debug_assert_eq!(self.num_nodes(), usize::from(tp));
        debug_assert!(self.trail.num_saved() == 0);
        let fwd = self.view_mut(Direction::Forward);
        fwd.potentials.push(Potential {
            value: ub,
            predecessor: Some(ub_edge),
        });
        // the lower bound edge must be the first out-edge of the node:
        // any relaxation that lowers the node below its lower bound is detected before going further
        fwd.out.push(vec![OutEdge {
            target: Timepoint::ORIGIN,
            weight: -lb,
            id: lb_edge,
            shared: true,
        }]);
        fwd.out[Timepoint::ORIGIN].push(OutEdge {
            target: tp,
            weight: ub,
            id: ub_edge,
            shared: true,
        });

        let bwd = self.view_mut(Direction::Backward);
        bwd.potentials.push(Potential {
            value: -lb,
            predecessor: Some(lb_edge),
        });
        bwd.out.push(vec![OutEdge {
            target: Timepoint::ORIGIN,
            weight: ub,
            id: ub_edge,
            shared: true,
        }]);
        bwd.out[Timepoint::ORIGIN].push(OutEdge {
            target: tp,
            weight: -lb,
            id: lb_edge,
            shared: true,
        });

        for e in [ub_edge, lb_edge] {
            self.active.fill_with(e, || false);
            self.active[e] = true;
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.view(Direction::Forward).potentials.len()
    }

    pub fn is_active(&self, id: EdgeId) -> bool {
        self.active.get(id).copied().unwrap_or(false)
    }

    pub fn potential(&self, dir: Direction, tp: Timepoint) -> Potential {
        self.view(dir).potentials[tp]
    }

    pub fn value(&self, dir: Direction, tp: Timepoint) -> IntCst {
        self.view(dir).potentials[tp].value
    }

    pub fn upper_bound(&self, tp: Timepoint) -> IntCst {
        self.value(Direction::Forward, tp)
    }

    pub fn lower_bound(&self, tp: Timepoint) -> IntCst {
        -self.value(Direction::Backward, tp)
    }

    pub fn out_edges(&self, dir: Direction, tp: Timepoint) -> &[OutEdge] {
        &self.view(dir).out[tp]
    }

    /// Nodes whose potential was lowered by the last successful activation, in order of update.
    /// A node may appear several times.
    pub fn updated(&self) -> &[(Direction, Timepoint)] {
        &self.updated
    }

    /// Appends to `out` the edges of the predecessor chain of `node`, from `node` back to the origin.
    pub fn predecessor_chain(&self, store: &Store, dir: Direction, node: Timepoint, out: &mut Vec<EdgeId>) {
        let mut curr = node;
        for _ in 0..self.num_nodes() {
            match self.potential(dir, curr).predecessor {
                Some(e) => {
                    out.push(e);
                    curr = store.edge(e).oriented(dir).0;
                }
                None => break,
            }
        }
        debug_assert_eq!(curr, Timepoint::ORIGIN, "predecessor chain does not reach the origin");
    }

    /// Makes the edge active and updates the potentials of the views it is part of.
    ///
    /// If the edge closes a negative cycle or empties the domain of a node, the state is left
    /// untouched (the edge stays inactive) and the cycle responsible is returned.
    pub fn activate(&mut self, store: &Store, id: EdgeId) -> Result<(), NegativeCycle> {
        self.updated.clear();
        if self.is_active(id) {
            return Ok(());
        }
        let edge = *store.edge(id);
        if edge.is_self_loop() && edge.weight < 0 {
            return Err(NegativeCycle { edges: vec![id] });
        }
        let mark = self.trail.len();
        self.active.fill_with(id, || false);
        self.active[id] = true;
        for dir in Direction::BOTH {
            if edge.propagates_in(dir) {
                let (from, to) = edge.oriented(dir);
                self.view_mut(dir).out[from].push(OutEdge {
                    target: to,
                    weight: edge.weight,
                    id,
                    shared: edge.is_shared(),
                });
            }
        }
        self.trail.push(Event::EdgeActivated { id, edge });

        for dir in Direction::BOTH {
            if edge.propagates_in(dir) {
                if let Err(cycle) = self.relax(store, dir, &edge, id) {
                    self.undo_to(mark);
                    return Err(cycle);
                }
            }
        }
        if let Some(cycle) = self.find_empty_domain(store) {
            self.undo_to(mark);
            return Err(cycle);
        }
        Ok(())
    }

    fn undo_to(&mut self, mark: usize) {
        self.trail
            .undo_to_with(mark, |ev| undo_event(&mut self.views, &mut self.active, ev));
        self.updated.clear();
    }

    /// Looks for an updated node whose upper bound went below its lower bound.
    ///
    /// The returned cycle goes from the origin to the node along its forward predecessors, then
    /// back to the origin along its backward ones. Its weight is at most `ub - lb`.
    fn find_empty_domain(&self, store: &Store) -> Option<NegativeCycle> {
        let &(_, node) = self
            .updated
            .iter()
            .find(|&&(_, n)| self.value(Direction::Forward, n) + self.value(Direction::Backward, n) < 0)?;
        let mut edges = Vec::with_capacity(8);
        self.predecessor_chain(store, Direction::Forward, node, &mut edges);
        edges.reverse();
        self.predecessor_chain(store, Direction::Backward, node, &mut edges);
        Some(NegativeCycle { edges })
    }

    fn set_potential(&mut self, dir: Direction, node: Timepoint, value: IntCst, predecessor: EdgeId) {
        let slot = &mut self.views[dir.index()].potentials[node];
        let previous = *slot;
        debug_assert!(value < previous.value);
        *slot = Potential {
            value,
            predecessor: Some(predecessor),
        };
        self.trail.push(Event::Updated { dir, node, previous });
        self.updated.push((dir, node));
        self.num_updates += 1;
    }

    fn enqueue(&mut self, node: Timepoint) {
        if self.in_queue.insert(node) {
            self.queue.push_back(node);
        }
    }

    /// Propagates the activation of `edge` in the given view.
    fn relax(&mut self, store: &Store, dir: Direction, edge: &Edge, id: EdgeId) -> Result<(), NegativeCycle> {
        let (source, target) = edge.oriented(dir);
        let candidate = self.value(dir, source) + edge.weight;
        if candidate >= self.value(dir, target) {
            return Ok(());
        }
        if target == Timepoint::ORIGIN {
            return Err(self.extract_cycle(store, dir, source, Timepoint::ORIGIN, id));
        }
        self.set_potential(dir, target, candidate, id);
        self.enqueue(target);

        while let Some(curr) = self.queue.pop_front() {
            self.in_queue.remove(curr);
            let curr_value = self.value(dir, curr);
            for i in 0..self.view(dir).out[curr].len() {
                let out = self.view(dir).out[curr][i];
                let candidate = curr_value + out.weight;
                if candidate < self.value(dir, out.target) {
                    if out.target == source || out.target == Timepoint::ORIGIN {
                        // lowering this node would require going through the new edge again
                        self.queue.clear();
                        self.in_queue.clear();
                        return Err(self.extract_cycle(store, dir, source, out.target, out.id));
                    }
                    self.set_potential(dir, out.target, candidate, out.id);
                    self.enqueue(out.target);
                }
            }
        }
        Ok(())
    }

    /// Builds the cycle closed when `violated` would be lowered through edge `via`.
    /// The cycle is read from the predecessor links, starting from `start` (the source of the new edge)
    /// and pretending that the predecessor of `violated` is `via`.
    fn extract_cycle(
        &self,
        store: &Store,
        dir: Direction,
        start: Timepoint,
        violated: Timepoint,
        via: EdgeId,
    ) -> NegativeCycle {
        let mut edges = Vec::with_capacity(8);
        let mut curr = start;
        for _ in 0..=self.num_nodes() {
            let pred = if curr == violated {
                Some(via)
            } else {
                self.potential(dir, curr).predecessor
            };
            let Some(e) = pred else {
                break;
            };
            edges.push(e);
            curr = store.edge(e).oriented(dir).0;
            if curr == start {
                break;
            }
        }
        debug_assert_eq!(curr, start, "predecessor links do not form a cycle");
        if dir == Direction::Forward {
            // edges were collected backward, restore the orientation of the cycle
            edges.reverse();
        }
        NegativeCycle { edges }
    }
}

impl Backtrack for DistanceGraph {
    fn save_state(&mut self) -> DecLvl {
        self.updated.clear();
        self.trail.save_state()
    }

    fn num_saved(&self) -> u32 {
        self.trail.num_saved()
    }

    fn restore_last(&mut self) {
        self.updated.clear();
        self.trail
            .restore_last_with(|ev| undo_event(&mut self.views, &mut self.active, ev));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stn::store::EdgeKind;

    struct Net {
        store: Store,
        graph: DistanceGraph,
    }

    impl Net {
        fn new() -> Net {
            Net {
                store: Store::new(),
                graph: DistanceGraph::new(),
            }
        }

        fn tp(&mut self, lb: IntCst, ub: IntCst) -> Timepoint {
            let tp = self.store.add_timepoint(lb, ub).unwrap();
            let ub_edge = self.store.add_edge(Timepoint::ORIGIN, tp, ub, EdgeKind::Permanent).unwrap();
            let lb_edge = self.store.add_edge(tp, Timepoint::ORIGIN, -lb, EdgeKind::Permanent).unwrap();
            self.graph.add_node(tp, (lb, ub), ub_edge, lb_edge);
            tp
        }

        fn edge(&mut self, a: Timepoint, b: Timepoint, w: IntCst) -> Result<EdgeId, NegativeCycle> {
            let e = self.store.add_edge(a, b, w, EdgeKind::Permanent).unwrap();
            self.graph.activate(&self.store, e).map(|_| e)
        }

        fn directed(&mut self, a: Timepoint, b: Timepoint, w: IntCst, dir: Direction) -> Result<EdgeId, NegativeCycle> {
            let l = crate::core::BVar::from(0usize).true_lit();
            let e = self.store.add_edge(a, b, w, EdgeKind::Directed(l, dir)).unwrap();
            self.graph.activate(&self.store, e).map(|_| e)
        }

        fn bounds(&self, tp: Timepoint) -> (IntCst, IntCst) {
            (self.graph.lower_bound(tp), self.graph.upper_bound(tp))
        }
    }

    #[test]
    fn test_propagation() {
        let mut net = Net::new();
        let a = net.tp(0, 10);
        let b = net.tp(0, 10);
        assert_eq!(net.bounds(a), (0, 10));
        net.edge(a, b, -1).unwrap(); // b <= a - 1
        assert_eq!(net.bounds(a), (1, 10));
        assert_eq!(net.bounds(b), (0, 9));
        assert!(net.graph.updated().contains(&(Direction::Forward, b)));
        assert!(net.graph.updated().contains(&(Direction::Backward, a)));
        net.edge(b, a, 3).unwrap();
        assert_eq!(net.bounds(a), (1, 10));
        assert_eq!(net.graph.updated(), &[]);
    }

    #[test]
    fn test_cycle_detection() {
        let mut net = Net::new();
        let a = net.tp(0, 100);
        let b = net.tp(0, 100);
        let c = net.tp(0, 100);
        let ab = net.edge(a, b, 3).unwrap();
        let bc = net.edge(b, c, 2).unwrap();
        let before = (net.bounds(a), net.bounds(b), net.bounds(c));
        let ca = net.store.add_edge(c, a, -6, EdgeKind::Permanent).unwrap();
        let cycle = net.graph.activate(&net.store, ca).unwrap_err();
        let mut edges = cycle.edges.clone();
        edges.sort();
        assert_eq!(edges, vec![ab, bc, ca]);
        assert!(!net.graph.is_active(ca));
        assert_eq!(before, (net.bounds(a), net.bounds(b), net.bounds(c)));
    }

    #[test]
    fn test_domain_wipeout() {
        let mut net = Net::new();
        let a = net.tp(0, 10);
        let b = net.tp(5, 10);
        // b <= a - 11, impossible since a <= 10 and b >= 0
        let cycle = net.edge(a, b, -11).unwrap_err();
        assert!(cycle.edges.len() >= 3);
        let total: IntCst = cycle.edges.iter().map(|&e| net.store.edge(e).weight).sum();
        assert!(total < 0);
        assert_eq!(net.bounds(b), (5, 10));
    }

    #[test]
    fn test_self_loops() {
        let mut net = Net::new();
        let a = net.tp(0, 10);
        assert!(net.edge(a, a, 0).is_ok());
        let e = net.store.add_edge(a, a, -1, EdgeKind::Permanent).unwrap();
        assert_eq!(net.graph.activate(&net.store, e), Err(NegativeCycle { edges: vec![e] }));
    }

    #[test]
    fn test_backtracking() {
        let mut net = Net::new();
        let a = net.tp(0, 10);
        let b = net.tp(0, 10);
        let c = net.tp(0, 10);
        net.edge(a, b, 2).unwrap();
        net.graph.save_state();
        let e = net.edge(b, c, -5).unwrap();
        net.edge(c, a, 3).unwrap();
        assert_eq!(net.bounds(b), (5, 10));
        assert!(net.graph.is_active(e));
        net.graph.restore_last();
        assert!(!net.graph.is_active(e));
        for tp in [a, b, c] {
            assert_eq!(net.bounds(tp), (0, 10));
        }
        assert_eq!(net.graph.out_edges(Direction::Forward, b).len(), 1);
    }

    #[test]
    fn test_predecessor_chain() {
        let mut net = Net::new();
        let a = net.tp(0, 10);
        let b = net.tp(0, 10);
        let ab = net.edge(a, b, 1).unwrap();
        net.edge(b, a, 0).unwrap();
        // ub(b) = ub(a) + 1 = 10 via the domain edge. Tighten a.
        let e = net.store.add_edge(Timepoint::ORIGIN, a, 4, EdgeKind::Permanent).unwrap();
        net.graph.activate(&net.store, e).unwrap();
        assert_eq!(net.graph.upper_bound(b), 5);
        let mut chain = Vec::new();
        net.graph.predecessor_chain(&net.store, Direction::Forward, b, &mut chain);
        assert_eq!(chain, vec![ab, e]);
    }

    #[test]
    fn test_directed_edges() {
        let mut net = Net::new();
        let a = net.tp(0, 10);
        let b = net.tp(0, 10);
        let ub_a = net.graph.potential(Direction::Forward, a).predecessor.unwrap();
        // b <= a - 8, for upper bounds only
        let ab = net.directed(a, b, -8, Direction::Forward).unwrap();
        assert_eq!(net.bounds(a), (0, 10));
        assert_eq!(net.bounds(b), (0, 2));
        assert_eq!(net.graph.out_edges(Direction::Forward, a).len(), 2);
        assert_eq!(net.graph.out_edges(Direction::Backward, b).len(), 1);
        assert!(!net.graph.out_edges(Direction::Forward, a)[1].shared);

        // b >= 3, for lower bounds only: no cycle in either view but the domain of b is empty
        let before = (net.bounds(a), net.bounds(b));
        let b_geq_3 = net.store.add_edge(b, Timepoint::ORIGIN, -3, EdgeKind::Permanent).unwrap();
        let l = crate::core::BVar::from(0usize).true_lit();
        let e = net
            .store
            .add_edge(b, Timepoint::ORIGIN, -3, EdgeKind::Directed(l, Direction::Backward))
            .unwrap();
        let cycle = net.graph.activate(&net.store, e).unwrap_err();
        assert_eq!(cycle.edges, vec![ub_a, ab, e]);
        assert!(!net.graph.is_active(e));
        assert_eq!(before, (net.bounds(a), net.bounds(b)));

        // the same constraint in both views closes a cycle in the forward one
        let cycle = net.graph.activate(&net.store, b_geq_3).unwrap_err();
        assert_eq!(cycle.edges.len(), 3);
        assert!(cycle.edges.contains(&ab));

        net.graph.save_state();
        net.directed(b, a, -1, Direction::Backward).unwrap();
        assert_eq!(net.bounds(b), (1, 2));
        assert_eq!(net.bounds(a), (0, 10));
        net.graph.restore_last();
        assert_eq!(net.bounds(b), (0, 2));
        assert_eq!(net.graph.out_edges(Direction::Backward, a).len(), 1);
    }
}
