use tempo::sat::SolveResult;
use tempo::stn::{StnConfig, StnTheory, TheoryPropagationLevel};
use tempo_apps::Problem;

const LEVELS: [TheoryPropagationLevel; 4] = [
    TheoryPropagationLevel::None,
    TheoryPropagationLevel::Bounds,
    TheoryPropagationLevel::Edges,
    TheoryPropagationLevel::Full,
];

fn solve(input: &str, level: TheoryPropagationLevel) -> (Problem, SolveResult) {
    let theory = StnTheory::with_config(StnConfig {
        theory_propagation: level,
        self_check: true,
    });
    let mut pb = Problem::parse(input, theory).unwrap();
    let result = pb.solver.solve(None).unwrap();
    (pb, result)
}

#[test]
fn disjunctive_sat() {
    let input = include_str!("../problems/disjunctive_sat.stn");
    for level in LEVELS {
        let (pb, result) = solve(input, level);
        let SolveResult::Sat(solution) = result else {
            panic!("no solution found with {level:?}")
        };
        let time = |name: &str| solution.time(pb.timepoint(name).unwrap());
        let tasks: Vec<_> = [("s1", "e1", 3), ("s2", "e2", 4), ("s3", "e3", 2)]
            .into_iter()
            .map(|(s, e, d)| (time(s), time(e), d))
            .collect();
        let schedule = pb.format_solution(&solution);
        for &(s, e, d) in &tasks {
            assert_eq!(e - s, d, "{level:?}:\n{schedule}");
            assert!(s >= 0 && e <= 9, "{level:?}:\n{schedule}");
        }
        for (i, &(s1, e1, _)) in tasks.iter().enumerate() {
            for &(s2, e2, _) in &tasks[i + 1..] {
                assert!(e1 <= s2 || e2 <= s1, "overlap with {level:?}:\n{schedule}");
            }
        }
        assert!(tasks[2].0 >= 2);
        assert!(solution.value(pb.literal("late3").unwrap()));
    }
}

#[test]
fn disjunctive_unsat() {
    let input = include_str!("../problems/disjunctive_unsat.stn");
    for level in LEVELS {
        let (_, result) = solve(input, level);
        assert!(matches!(result, SolveResult::Unsat), "{level:?}");
    }
}

#[test]
fn triangle_unsat() {
    let input = include_str!("../problems/triangle_unsat.stn");
    for level in LEVELS {
        let (pb, result) = solve(input, level);
        assert!(matches!(result, SolveResult::Unsat), "{level:?}");
        assert!(pb.solver.stats().num_conflicts >= 1);
    }
}
