use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tempo::sat::SolveResult;
use tempo::stn::{StnConfig, StnTheory, TheoryPropagationLevel};
use tempo_apps::Problem;

/// Searches for a schedule satisfying a set of (possibly conditional) difference constraints.
#[derive(Debug, Parser)]
#[command(name = "stn-solve")]
struct Opt {
    /// File containing the problem, one directive per line.
    file: PathBuf,

    /// Inferences made by the theory on inactive edges: "none", "bounds", "edges" or "full".
    /// Defaults to the value of the TEMPO_STN_THEORY_PROPAGATION environment variable.
    #[arg(long)]
    theory_propagation: Option<TheoryPropagationLevel>,

    /// Time limit for the search, in seconds.
    #[arg(long)]
    timeout: Option<f64>,

    /// Expected outcome. If the solver concludes otherwise, exits with a non-zero exit code.
    #[arg(long)]
    expect: Option<Expected>,

    /// Print the statistics of the solver upon termination.
    #[arg(long)]
    stats: bool,

    /// Logging level to use: one of "error", "warn", "info", "debug", "trace"
    #[arg(short, long, default_value = "info")]
    log_level: tracing::Level,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Expected {
    Sat,
    Unsat,
}

fn main() -> Result<()> {
    // Terminate the process if a thread panics.
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        std::process::exit(1);
    }));

    let opt = Opt::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::Uptime::from(Instant::now()))
        .with_writer(std::io::stderr)
        .with_max_level(opt.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let input = std::fs::read_to_string(&opt.file)
        .with_context(|| format!("Could not read problem file {}", opt.file.display()))?;

    let mut config = StnConfig::default();
    if let Some(level) = opt.theory_propagation {
        config.theory_propagation = level;
    }
    let mut problem = Problem::parse(&input, StnTheory::with_config(config))
        .with_context(|| format!("Invalid problem file {}", opt.file.display()))?;
    tracing::info!(
        timepoints = problem.solver.theory.num_timepoints(),
        edges = problem.solver.theory.num_edges(),
        variables = problem.solver.theory.num_variables(),
        clauses = problem.solver.num_clauses(),
        "problem loaded"
    );

    let deadline = match opt.timeout {
        Some(secs) => Some(Instant::now() + Duration::try_from_secs_f64(secs).context("Invalid timeout")?),
        None => None,
    };
    let start = Instant::now();
    let result = problem.solver.solve(deadline).context("solver internal error")?;
    tracing::info!(runtime = ?start.elapsed(), "search finished");

    if opt.stats {
        problem.solver.print_stats();
    }

    match result {
        SolveResult::Sat(solution) => {
            println!("SAT");
            print!("{}", problem.format_solution(&solution));
            anyhow::ensure!(opt.expect != Some(Expected::Unsat), "Solution found to an unsat problem.");
        }
        SolveResult::Unsat => {
            println!("UNSAT");
            anyhow::ensure!(opt.expect != Some(Expected::Sat), "No solution found to a solvable problem.");
        }
        SolveResult::Timeout => println!("TIMEOUT"),
    }
    Ok(())
}
