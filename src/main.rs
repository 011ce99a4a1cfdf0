use std::path::PathBuf;
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use hydrogrid::config::{Config, SolverKind};
use hydrogrid::error::{Error, Result};
use hydrogrid::problems::Problem;
use hydrogrid::solver::Solver;

/// Number of times a step is retried with half the time step after the
/// implicit solve fails to converge.
const MAX_RETRIES: usize = 4;




#[derive(Debug, Parser)]
#[clap(version, about = "Finite-volume solver for hyperbolic conservation laws")]
struct Opts {
    /// JSON configuration file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Solver kind, e.g. EulerRoe or MHDBurgers
    #[clap(long)]
    solver: Option<SolverKind>,

    #[clap(long)]
    dim: Option<usize>,

    /// Cells per axis, including ghost cells
    #[clap(long, multiple_values = true)]
    size: Vec<usize>,

    #[clap(short = 'n', long, default_value = "100")]
    steps: u64,

    /// Built-in initial condition; defaults to the solver's usual test
    #[clap(short, long)]
    problem: Option<String>,

    /// Directory for CBOR output
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Size of the global rayon pool
    #[clap(short = 't', long)]
    threads: Option<usize>,

    /// Save every N steps (0 saves only the final state)
    #[clap(long, default_value = "0")]
    save_every: u64,

    #[clap(short, long)]
    verbose: bool,
}




// ============================================================================
impl Opts {

    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(solver) = self.solver {
            config.solver = solver;
        }
        if let Some(dim) = self.dim {
            config.dim = dim;
        }
        if !self.size.is_empty() {
            if self.size.len() > 3 {
                return Err(Error::config("at most three sizes may be given"));
            }
            config.size = [1, 1, 1];
            config.size[..self.size.len()].copy_from_slice(&self.size);
        }
        if self.verbose {
            config.show_timestep = true;
        }
        Ok(config)
    }

    fn problem(&self, kind: SolverKind) -> Result<Problem> {
        match &self.problem {
            Some(name) => Problem::from_name(name),
            None => Ok(Problem::default_for(kind)),
        }
    }
}




/**
 * Take one step, halving the time step on each failure to converge.
 */
fn advance(solver: &mut Solver) -> Result<f64> {
    let mut dt = match solver.update() {
        Ok(dt) => return Ok(dt),
        Err(e) if e.is_recoverable() => {
            warn!("{}", e);
            solver.choose_timestep()
        }
        Err(e) => return Err(e),
    };
    let mut attempt = 0;

    loop {
        dt *= 0.5;
        attempt += 1;
        info!("retry {} with dt = {:e}", attempt, dt);

        match solver.step(dt) {
            Ok(()) => return Ok(dt),
            Err(e) if e.is_recoverable() && attempt < MAX_RETRIES => warn!("{}", e),
            Err(e) => return Err(e),
        }
    }
}

fn save(solver: &Solver, opts: &Opts) -> Result<()> {
    if let Some(dir) = &opts.output {
        let index = solver.save(dir)?;
        info!("saved {} at index {}", dir.display(), index);
    }
    Ok(())
}

fn run(opts: &Opts) -> Result<()> {
    if let Some(threads) = opts.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| Error::config(e.to_string()))?;
    }

    let config = opts.config()?;
    let problem = opts.problem(config.solver)?;
    let mut solver = Solver::new(config)?;

    solver.set_initial_condition(problem.initial_condition(solver.equation())?);
    solver.reset_state()?;
    info!("{} on {:?} cells", problem.name(), solver.grid().size());

    let start = std::time::Instant::now();

    while solver.iteration() < opts.steps {
        let dt = advance(&mut solver)?;

        if !opts.verbose && solver.iteration() % 10 == 0 {
            info!("[{:06}] t={:.6} dt={:.3e}", solver.iteration(), solver.time(), dt);
        }
        if opts.save_every > 0 && solver.iteration() % opts.save_every == 0 {
            save(&solver, opts)?;
        }
    }
    if opts.save_every == 0 || solver.iteration() % opts.save_every != 0 {
        save(&solver, opts)?;
    }

    let seconds = start.elapsed().as_secs_f64();
    let updates = solver.iteration() as f64 * solver.grid().volume() as f64;
    info!("{} steps in {:.3}s ({:.3e} cell updates per second)", solver.iteration(), seconds, updates / seconds);
    Ok(())
}

fn main() {
    let opts = Opts::parse();
    let level = if opts.verbose { LevelFilter::Debug } else { LevelFilter::Info };

    if let Err(e) = SimpleLogger::new().with_level(level).init() {
        eprintln!("{}", e);
    }

    if let Err(e) = run(&opts) {
        error!("{}", e);
        std::process::exit(1);
    }
}
