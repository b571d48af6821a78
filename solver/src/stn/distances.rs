//! Shortest paths in the active graph, computed with Dijkstra's algorithm on reduced costs.
//!
//! The potential of a view makes all reduced costs `w + π(u) - π(v)` non-negative, which
//! allows running Dijkstra even in the presence of negative edges.

use crate::collections::ref_store::RefMap;
use crate::core::IntCst;
use crate::stn::potential::DistanceGraph;
use crate::stn::store::{Direction, EdgeId, Store, Timepoint};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// An element is the heap: composed of a node and the reduced distance from the source to this
/// node.
/// We implement the Ord/PartialOrd trait so that a max-heap would return the element with the
/// smallest reduced distance first.
#[derive(Eq, PartialEq, Debug, Copy, Clone)]
struct HeapElem {
    dist: IntCst,
    node: Timepoint,
}

impl PartialOrd for HeapElem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapElem {
    fn cmp(&self, other: &Self) -> Ordering {
        Reverse(self.dist).cmp(&Reverse(other.dist))
    }
}

/// The mutable data of a run of Dijkstra's algorithm, reusable across runs.
#[derive(Clone, Default)]
pub(crate) struct DijkstraState {
    /// Source node and view of the last run.
    source: Option<(Direction, Timepoint)>,
    /// The latest reduced distance extracted from the queue.
    /// A node whose reduced distance is lower or equal is final.
    latest: IntCst,
    /// Reduced distance of each reached node and the last edge on the shortest path to it (none for the source).
    distances: RefMap<Timepoint, (IntCst, Option<EdgeId>)>,
    queue: BinaryHeap<HeapElem>,
}

impl DijkstraState {
    fn clear(&mut self) {
        self.source = None;
        self.latest = 0;
        self.distances.clear();
        self.queue.clear()
    }

    fn enqueue(&mut self, node: Timepoint, dist: IntCst, incoming_edge: Option<EdgeId>) {
        let improves = match self.distances.get(node) {
            None => true,
            Some((prev, _)) => dist < *prev,
        };
        if improves {
            self.distances.insert(node, (dist, incoming_edge));
            self.queue.push(HeapElem { dist, node });
        }
    }

    /// Removes the next node of the queue, by increasing reduced distance.
    /// Returns `None` for stale entries: a node is only extracted once.
    fn dequeue(&mut self) -> Option<Option<(Timepoint, IntCst)>> {
        let e = self.queue.pop()?;
        debug_assert!(self.latest <= e.dist);
        self.latest = e.dist;
        match self.distances.get(e.node) {
            Some((d, _)) if *d == e.dist => Some(Some((e.node, e.dist))),
            _ => Some(None),
        }
    }

    /// Shortest distance from the source to `node`, given the graph whose potential was used
    /// for the run. `None` if the node was not reached.
    pub fn distance(&self, graph: &DistanceGraph, node: Timepoint) -> Option<IntCst> {
        let (dir, source) = self.source?;
        let (reduced, _) = self.distances.get(node)?;
        // rdist(s, v) = dist(s, v) + π(s) - π(v)
        Some(reduced - graph.value(dir, source) + graph.value(dir, node))
    }

    /// Returns all reached nodes with their shortest distance from the source.
    pub fn distances<'a>(&'a self, graph: &'a DistanceGraph) -> impl Iterator<Item = (Timepoint, IntCst)> + 'a {
        self.distances
            .entries()
            .filter_map(move |(node, _)| self.distance(graph, node).map(|d| (node, d)))
    }

    /// Last edge on the shortest path to `node`, or `None` if it is the source (or was not reached).
    pub fn predecessor(&self, node: Timepoint) -> Option<EdgeId> {
        self.distances.get(node).and_then(|(_, pred)| *pred)
    }

    /// Appends to `out` the edges of the shortest path from the source to `node`, from `node` backward.
    pub fn path_to(&self, store: &Store, node: Timepoint, out: &mut Vec<EdgeId>) {
        let Some((dir, _)) = self.source else {
            return;
        };
        let mut curr = node;
        while let Some(e) = self.predecessor(curr) {
            out.push(e);
            curr = store.edge(e).oriented(dir).0;
        }
    }
}

impl DistanceGraph {
    /// Computes the shortest distances from `source` to all nodes in the given view.
    /// If `shared_only` is set, edges that are not part of both views are ignored.
    /// The search stops early once `stop(node)` returns true for an extracted node.
    pub(crate) fn run_dijkstra(
        &self,
        dir: Direction,
        source: Timepoint,
        state: &mut DijkstraState,
        shared_only: bool,
        stop: impl Fn(Timepoint) -> bool,
    ) {
        state.clear();
        state.source = Some((dir, source));
        state.enqueue(source, 0, None);

        while let Some(extracted) = state.dequeue() {
            let Some((curr, curr_rdist)) = extracted else {
                continue;
            };
            if stop(curr) {
                return;
            }
            let curr_value = self.value(dir, curr);
            for out in self.out_edges(dir, curr) {
                if shared_only && !out.shared {
                    continue;
                }
                if state.distances.get(out.target).is_some_and(|(d, _)| *d <= state.latest) {
                    // already final
                    continue;
                }
                // rcost(curr, tgt) = w + π(curr) - π(tgt)
                let reduced_cost = out.weight + curr_value - self.value(dir, out.target);
                debug_assert!(reduced_cost >= 0, "potential is not valid");
                state.enqueue(out.target, curr_rdist + reduced_cost, Some(out.id));
            }
        }
    }

    /// Length of the shortest path from `from` to `to` in the active graph (forward view).
    pub(crate) fn shortest_distance(&self, from: Timepoint, to: Timepoint, state: &mut DijkstraState) -> Option<IntCst> {
        self.run_dijkstra(Direction::Forward, from, state, false, |n| n == to);
        state.distance(self, to)
    }
}
