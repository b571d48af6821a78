use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use tempo::backtrack::{Backtrack, DecLvl};
use tempo::core::{IntCst, Lit};
use tempo::stn::*;

fn stn(level: TheoryPropagationLevel) -> StnTheory {
    StnTheory::with_config(StnConfig {
        theory_propagation: level,
        self_check: true,
    })
}

/// Constraints of the form `target - source <= weight`, as `(source, target, weight)`.
type Constraints = Vec<(usize, usize, i64)>;

/// Edges of the theory in the given view that hold when all literals of `true_lits` are true.
fn edges_under(stn: &StnTheory, true_lits: &HashSet<Lit>, dir: Direction) -> Constraints {
    stn.edges()
        .filter(|(_, e)| e.propagates_in(dir))
        .filter(|(_, e)| e.guard().map_or(true, |g| true_lits.contains(&g)))
        .map(|(_, e)| (usize::from(e.source), usize::from(e.target), e.weight as i64))
        .collect()
}

/// Shortest distances from `source`, or `None` if there is a negative cycle.
fn bellman_ford(num_nodes: usize, edges: &Constraints, source: usize) -> Option<Vec<i64>> {
    let inf = i64::MAX / 4;
    let mut dist = vec![inf; num_nodes];
    dist[source] = 0;
    for _ in 0..num_nodes {
        let mut changed = false;
        for &(s, t, w) in edges {
            if dist[s] < inf && dist[s] + w < dist[t] {
                dist[t] = dist[s] + w;
                changed = true;
            }
        }
        if !changed {
            return Some(dist);
        }
    }
    None
}

fn reversed(edges: &Constraints) -> Constraints {
    edges.iter().map(|&(s, t, w)| (t, s, w)).collect()
}

/// The `(lb, ub)` bounds of all timepoints entailed by the edges holding under `true_lits`: upper
/// bounds from the forward edges and lower bounds from the backward ones.
/// `None` if either view has a negative cycle or if a domain is empty.
fn entailed_bounds(stn: &StnTheory, true_lits: &HashSet<Lit>) -> Option<Vec<(i64, i64)>> {
    let n = stn.num_timepoints();
    // all nodes are reachable from the origin through their domain edges
    let ub = bellman_ford(n, &edges_under(stn, true_lits, Direction::Forward), 0)?;
    let neg_lb = bellman_ford(n, &reversed(&edges_under(stn, true_lits, Direction::Backward)), 0)?;
    let bounds: Vec<(i64, i64)> = neg_lb.iter().zip(&ub).map(|(&neg_lb, &ub)| (-neg_lb, ub)).collect();
    bounds.iter().all(|&(lb, ub)| lb <= ub).then_some(bounds)
}

fn is_inconsistent(stn: &StnTheory, true_lits: &HashSet<Lit>) -> bool {
    entailed_bounds(stn, true_lits).is_none()
}

#[test]
fn inconsistent_triangle() {
    let mut stn = stn(TheoryPropagationLevel::Bounds);
    let a = stn.new_timepoint(0, 100).unwrap();
    let b = stn.new_timepoint(0, 100).unwrap();
    let c = stn.new_timepoint(0, 100).unwrap();
    let l = stn.new_literal();
    stn.add_constraint(a, b, 3, None).unwrap();
    stn.add_constraint(b, c, 2, None).unwrap();
    stn.add_constraint(c, a, -6, Some(l)).unwrap();
    assert!(stn.is_consistent());
    assert_eq!(stn.distance(a, c), 5);

    stn.push_checkpoint();
    let Err(AssignError::Conflict(conflict)) = stn.assign(l) else {
        panic!("expected a conflict")
    };
    assert_eq!(conflict.explanation().literals(), &[l]);
    assert_eq!(conflict.clause().literals(), &[!l]);
    assert_eq!(conflict.cycle().len(), 3);
    let weight: i64 = conflict
        .cycle()
        .iter()
        .map(|&e| stn.edge(e).unwrap().weight as i64)
        .sum();
    assert!(weight < 0);

    stn.pop_to(DecLvl::new(1)).unwrap();
    assert!(stn.is_consistent());
    assert_eq!(stn.value(l), None);
    assert_eq!(stn.distance(a, c), 5);
}

#[test]
fn checkpoint_round_trip() {
    let mut stn = stn(TheoryPropagationLevel::Full);
    let tps: Vec<Timepoint> = (0..5).map(|i| stn.new_timepoint(0, 50 + i).unwrap()).collect();
    let mut lits = Vec::new();
    for i in 0..5 {
        for j in 0..5 {
            if i != j {
                let l = stn.new_literal();
                stn.add_conditional_edge(tps[i], tps[j], -(i as IntCst) - 2, l).unwrap();
                lits.push(l);
            }
        }
    }
    let snapshot = |stn: &StnTheory| {
        let bounds: Vec<_> = stn.timepoints().map(|tp| stn.bounds(tp)).collect();
        let active: Vec<_> = stn.edges().map(|(e, _)| stn.is_active(e)).collect();
        let values: Vec<_> = lits.iter().map(|&l| stn.value(l)).collect();
        (bounds, active, values, stn.implications().len())
    };

    let lvl = stn.push_checkpoint();
    let before = snapshot(&stn);
    for &l in lits.iter().step_by(3) {
        if stn.assign(l).is_err() {
            break;
        }
    }
    assert_ne!(snapshot(&stn), before);
    stn.pop_to(lvl).unwrap();
    assert_eq!(stn.current_decision_level(), lvl);
    assert_eq!(snapshot(&stn), before);

    let deeper = DecLvl::new(5);
    assert!(matches!(
        stn.pop_to(deeper),
        Err(tempo::error::InvariantViolation::UnknownLevel { .. })
    ));
}

#[test]
fn bound_literals_follow_bounds() {
    let mut stn = stn(TheoryPropagationLevel::Bounds);
    let a = stn.new_timepoint(0, 20).unwrap();
    let b = stn.new_timepoint(0, 20).unwrap();
    stn.add_min_delay(a, b, 5).unwrap();
    let b_leq: Vec<Lit> = (0..=20).map(|k| stn.leq_literal(b, k).unwrap()).collect();
    // b >= 5 and b <= 20 at the root
    for (k, &l) in b_leq.iter().enumerate() {
        let expected = match k {
            0..=4 => Some(false),
            20 => Some(true),
            _ => None,
        };
        assert_eq!(stn.value(l), expected, "b <= {k}");
    }
    let a_geq_8 = stn.geq_literal(a, 8).unwrap();
    stn.push_checkpoint();
    stn.assign(a_geq_8).unwrap();
    for (k, &l) in b_leq.iter().enumerate() {
        let expected = match k {
            0..=12 => Some(false),
            20 => Some(true),
            _ => None,
        };
        assert_eq!(stn.value(l), expected, "b <= {k}");
    }
    // every implication is justified by the bound literal (or nothing)
    for imp in stn.implications().current_level_events() {
        assert_eq!(imp.explanation.literals(), &[a_geq_8]);
    }
}

/// Random problems with random sequences of assignments and checkpoints, checked against Bellman-Ford.
#[test]
fn random_against_bellman_ford() {
    let mut rng = StdRng::seed_from_u64(2398248538438434234);
    for level in [
        TheoryPropagationLevel::None,
        TheoryPropagationLevel::Bounds,
        TheoryPropagationLevel::Edges,
        TheoryPropagationLevel::Full,
    ] {
        for _ in 0..30 {
            check_random_problem(&mut rng, level);
        }
    }
}

fn check_random_problem(rng: &mut StdRng, level: TheoryPropagationLevel) {
    let mut stn = stn(level);
    let num_tps = rng.random_range(2..8);
    let tps: Vec<Timepoint> = (0..num_tps)
        .map(|_| {
            let lb = rng.random_range(-20..20);
            let ub = lb + rng.random_range(0..40);
            stn.new_timepoint(lb, ub).unwrap()
        })
        .collect();
    let mut lits: Vec<Lit> = Vec::new();
    for _ in 0..rng.random_range(0..25) {
        let s = tps[rng.random_range(0..num_tps)];
        let t = tps[rng.random_range(0..num_tps)];
        let w = rng.random_range(-15..15);
        match rng.random_range(0..10) {
            0 | 1 => {
                stn.add_permanent_edge(s, t, w).unwrap();
            }
            2 => {
                let l = stn.new_literal();
                stn.add_reified_edge(l, s, t, w).unwrap();
                lits.push(l);
            }
            3 | 4 => {
                // guards are sometimes shared with other edges, as presence literals would be
                let mut guard = |stn: &mut StnTheory| {
                    if !lits.is_empty() && rng.random_bool(0.5) {
                        lits[rng.random_range(0..lits.len())]
                    } else {
                        let l = stn.new_literal();
                        lits.push(l);
                        l
                    }
                };
                let forward_prop = guard(&mut stn);
                let backward_prop = guard(&mut stn);
                stn.add_optional_true_edge(s, t, w, forward_prop, backward_prop).unwrap();
            }
            _ => {
                let l = stn.new_literal();
                stn.add_conditional_edge(s, t, w, l).unwrap();
                lits.push(l);
            }
        }
    }
    for _ in 0..rng.random_range(0..4) {
        let tp = tps[rng.random_range(0..num_tps)];
        let k = rng.random_range(-25..25);
        let l = if rng.random_bool(0.5) {
            stn.leq_literal(tp, k).unwrap()
        } else {
            stn.geq_literal(tp, k).unwrap()
        };
        lits.push(l);
    }
    if !stn.is_consistent() {
        let true_lits: HashSet<Lit> = lits
            .iter()
            .flat_map(|&l| [l, !l])
            .filter(|&l| stn.value(l) == Some(true))
            .collect();
        assert!(is_inconsistent(&stn, &true_lits));
        return;
    }

    if lits.is_empty() {
        return;
    }

    let mut previous_bounds: Vec<Vec<(IntCst, IntCst)>> = Vec::new();
    for _ in 0..rng.random_range(1..10) {
        let lit = lits[rng.random_range(0..lits.len())];
        let lit = if rng.random_bool(0.5) { lit } else { !lit };
        if rng.random_bool(0.7) {
            stn.push_checkpoint();
            previous_bounds.push(stn.timepoints().map(|tp| stn.bounds(tp)).collect());
        }
        let result = stn.assign(lit);
        check_state(&stn, &lits, result.as_ref().err().and_then(|e| e.conflict()));
        if result.is_err() || rng.random_bool(0.2) {
            if previous_bounds.is_empty() {
                return;
            }
            let lvl = stn.current_decision_level();
            let target = lvl.parent().unwrap_or(DecLvl::ROOT);
            stn.backtrack(target).unwrap();
            let restored = previous_bounds.pop().unwrap();
            let current: Vec<_> = stn.timepoints().map(|tp| stn.bounds(tp)).collect();
            assert_eq!(current, restored);
        } else if let Some(prev) = previous_bounds.last() {
            // bounds only tighten within a branch
            for (tp, &(lb, ub)) in stn.timepoints().zip(prev) {
                assert!(stn.lower_bound(tp) >= lb);
                assert!(stn.upper_bound(tp) <= ub);
            }
        }
    }
}

fn check_state(stn: &StnTheory, lits: &[Lit], conflict: Option<&Conflict>) {
    let true_lits: HashSet<Lit> = lits
        .iter()
        .flat_map(|&l| [l, !l])
        .filter(|&l| stn.value(l) == Some(true))
        .collect();
    if let Some(conflict) = conflict {
        assert!(!stn.is_consistent());
        // the guards of the cycle, all true, are inconsistent on their own
        let guards: HashSet<Lit> = conflict.explanation().iter().collect();
        assert!(guards.iter().all(|l| stn.value(*l) == Some(true)));
        assert!(is_inconsistent(stn, &guards));
        return;
    }
    assert!(stn.is_consistent());

    // bounds are exactly the distances from and to the origin, in their respective view
    let bounds = entailed_bounds(stn, &true_lits).expect("consistent state deemed inconsistent");
    for tp in stn.timepoints() {
        let (lb, ub) = bounds[usize::from(tp)];
        assert_eq!(stn.upper_bound(tp) as i64, ub, "ub of {tp:?}");
        assert_eq!(stn.lower_bound(tp) as i64, lb, "lb of {tp:?}");
    }

    // each extreme schedule satisfies the active edges of the view it comes from
    for (schedule, dir) in [
        (stn.earliest_schedule(), Direction::Backward),
        (stn.latest_schedule(), Direction::Forward),
    ] {
        for (id, e) in stn.edges() {
            if stn.is_active(id) && e.propagates_in(dir) {
                assert!(schedule[e.target] - schedule[e.source] <= e.weight, "{e:?}");
            }
        }
    }

    // the negation of an implied literal contradicts its explanation
    for imp in stn.implications().events() {
        assert_eq!(stn.value(imp.literal), Some(true));
        let mut hypothesis: HashSet<Lit> = imp.explanation.iter().collect();
        hypothesis.insert(!imp.literal);
        assert!(is_inconsistent(stn, &hypothesis), "{imp:?}");
    }
}
