use std::path::Path;
use log::info;
use crate::boundary::BoundaryDispatcher;
use crate::config::{Config, SchemeKind};
use crate::device::{Buffer, Device};
use crate::divergence::DivergenceCleaning;
use crate::equation::Equation;
use crate::error::{Error, Result};
use crate::grid::{DispatchGeometry, GridDescriptor};
use crate::integrator::{self, ImplicitOptions, Integrator};
use crate::persistence;
use crate::program::{include, Program, ProgramSource};
use crate::reduce::TimestepReducer;
use crate::scheme::{Burgers, LaunchContext, Roe, Scheme, SlopeLimiter, StepContext};
use crate::self_gravity::SelfGravity;

/// Primitive values of one cell, as a function of the cell center.
pub type InitialCondition = Box<dyn Fn([f64; 3]) -> Vec<f64> + Send + Sync>;




/**
 * The solver: one equation, scheme, and integrator advancing a single state
 * buffer on a single grid. Constructing a solver builds the device program
 * and binds every kernel, so a solver that exists is ready to step.
 */
pub struct Solver {
    config: Config,
    device: Device,
    grid: GridDescriptor,
    geometry: DispatchGeometry,
    equation: Box<dyn Equation>,
    program: Program,
    boundary: BoundaryDispatcher,
    reducer: TimestepReducer,
    scheme: Box<dyn Scheme>,
    integrator: Box<dyn Integrator>,
    self_gravity: Option<SelfGravity>,
    divergence: Option<DivergenceCleaning>,
    state: Buffer,
    checkpoint: Option<Buffer>,
    initial_condition: Option<InitialCondition>,
    time: f64,
    iteration: u64,
}




// ============================================================================
impl Solver {

    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let grid = config.grid()?;
        let geometry = DispatchGeometry::new(&grid);
        let equation = config.solver.equation(config.gamma, config.boundary_methods);
        let n = equation.num_states();
        let layout = equation.fluid_layout();
        let magnetic = layout.map_or(false, |l| l.magnetic.is_some());

        if config.use_gravity && layout.is_none() {
            return Err(Error::config(format!("self-gravity requires a fluid equation, not {}", equation.name())));
        }

        let mut source = ProgramSource::new(&grid, n, &config.slope_limiter, config.gravitational_constant);
        source.push(include(match config.solver.scheme() {
            SchemeKind::Roe => "Roe.cl",
            SchemeKind::Burgers => "Burgers.cl",
        }));
        for fragment in equation.device_source_fragments() {
            source.push(fragment);
        }
        if config.use_gravity {
            source.push(include("SelfGravity.cl"));
        }
        if magnetic {
            source.push(include("DivFree.cl"));
        }
        let program = source.build()?;

        info!("global size {:?} local size {:?}", geometry.global_size.global(), geometry.global_size.local());

        if !program.build_log().is_empty() {
            info!("build log:\n{}", program.build_log());
        }

        let device = Device::new();
        let limiter = SlopeLimiter::from_program(&program)?;
        let boundary = BoundaryDispatcher::new(&program, &grid, &geometry)?;
        let reducer = TimestepReducer::new(&device, &program, grid.volume(), geometry.local_size_1d)?;

        let launch = LaunchContext { device: &device, grid: &grid, geometry: &geometry, equation: equation.as_ref() };
        let scheme: Box<dyn Scheme> = match config.solver.scheme() {
            SchemeKind::Roe => Box::new(Roe::new(&launch, &program, limiter)?),
            SchemeKind::Burgers => Box::new(Burgers::new(&launch, &program, limiter)?),
        };

        let options = ImplicitOptions {
            tolerance: config.implicit_tolerance,
            max_iterations: config.implicit_max_iterations,
        };
        let len = grid.volume() * n;
        let integrator = integrator::from_name(&config.integrator, &device, len, options)?;

        let self_gravity = if config.use_gravity {
            Some(SelfGravity::new(
                &device,
                &program,
                &grid,
                config.gravitational_constant,
                config.gauss_seidel_max_iter,
                config.periodic())?)
        } else {
            None
        };
        let divergence = if magnetic {
            Some(DivergenceCleaning::new(&device, &program, &grid, config.gauss_seidel_max_iter, config.periodic())?)
        } else {
            None
        };
        let checkpoint = integrator.is_implicit().then(|| device.alloc(len, "Solver::checkpoint"));
        let state = device.alloc(len, "Solver::state");

        info!("{} with {} and {:?}", config.solver.name(), integrator.name(), limiter);

        Ok(Self {
            config,
            device,
            grid,
            geometry,
            equation,
            program,
            boundary,
            reducer,
            scheme,
            integrator,
            self_gravity,
            divergence,
            state,
            checkpoint,
            initial_condition: None,
            time: 0.0,
            iteration: 0,
        })
    }

    pub fn set_initial_condition(&mut self, initial_condition: InitialCondition) {
        self.initial_condition = Some(initial_condition)
    }

    /**
     * Evaluate the initial condition at every cell center and upload the
     * resulting conserved state.
     */
    pub fn reset_state(&mut self) -> Result<()> {
        let initial_condition = self
            .initial_condition
            .as_ref()
            .ok_or_else(|| Error::config("no initial condition has been set"))?;

        let n = self.equation.num_states();
        let expected = self.equation.num_primitives();
        let mut cons = vec![0.0; self.state.len()];

        for (c, cell) in cons.chunks_mut(n).enumerate() {
            let x = self.grid.cell_center(self.grid.coords(c));
            let prim = initial_condition(x);

            if prim.len() != expected {
                return Err(Error::config(format!(
                    "initial condition returned {} values, {} expects {}",
                    prim.len(),
                    self.equation.name(),
                    expected)));
            }
            self.equation.read_state_cell(cell, &prim);
        }
        self.device.write_buffer(&mut self.state, &cons);
        self.time = 0.0;
        self.iteration = 0;

        if let (Some(gravity), Some(layout)) = (self.self_gravity.as_mut(), self.equation.fluid_layout()) {
            let launch = LaunchContext {
                device: &self.device,
                grid: &self.grid,
                geometry: &self.geometry,
                equation: self.equation.as_ref(),
            };
            gravity.relax(&launch, &layout, &self.state);
        }
        Ok(())
    }

    /**
     * Advance the state by one step. The time step is either the fixed one
     * from the configuration or the CFL-limited one. Returns the time step
     * taken.
     */
    pub fn update(&mut self) -> Result<f64> {
        self.boundary();
        self.scheme.init_step(&self.device);

        let dt = self.choose_timestep();

        if self.config.show_timestep {
            info!("dt {}", dt);
        }
        self.step(dt)?;
        Ok(dt)
    }

    /// The fixed time step if one is configured, otherwise the CFL-limited
    /// one.
    pub fn choose_timestep(&mut self) -> f64 {
        if self.config.use_fixed_dt {
            self.config.fixed_dt
        } else {
            self.calc_timestep()
        }
    }

    /**
     * Run the scheme over one step of size `dt`. Under an implicit
     * integrator the state is restored to its value before the call if the
     * step fails.
     */
    pub fn step(&mut self, dt: f64) -> Result<()> {
        let Self {
            device,
            grid,
            geometry,
            equation,
            boundary,
            scheme,
            integrator,
            self_gravity,
            divergence,
            state,
            checkpoint,
            ..
        } = self;

        if let Some(checkpoint) = checkpoint.as_mut() {
            checkpoint.copy_from_slice(state);
        }

        let ctx = StepContext {
            launch: LaunchContext { device, grid, geometry, equation: equation.as_ref() },
            boundary,
            integrator: integrator.as_mut(),
            self_gravity: self_gravity.as_mut(),
            divergence: divergence.as_mut(),
        };

        match scheme.step(ctx, state, dt) {
            Ok(()) => {
                self.time += dt;
                self.iteration += 1;
                Ok(())
            }
            Err(e) => {
                if let Some(checkpoint) = checkpoint.as_ref() {
                    state.copy_from_slice(checkpoint);
                }
                Err(e)
            }
        }
    }

    /// Fill the ghost cells of the state.
    pub fn boundary(&mut self) {
        self.boundary.apply(&self.device, &self.grid, self.equation.as_ref(), &mut self.state)
    }

    /**
     * The largest stable time step for the current state, scaled by the
     * CFL number.
     */
    pub fn calc_timestep(&mut self) -> f64 {
        let Self { device, grid, geometry, equation, reducer, scheme, state, config, .. } = self;
        let launch = LaunchContext { device, grid, geometry, equation: equation.as_ref() };

        scheme.calc_cfl(&launch, state, reducer.reset(device));
        reducer.calc_timestep(device, config.cfl)
    }

    pub fn state(&self) -> &[f64] {
        &self.state
    }

    pub fn state_names(&self) -> &[&'static str] {
        self.equation.state_names()
    }

    /// A planar copy of one state channel.
    pub fn channel(&self, i: usize) -> Vec<f64> {
        persistence::planar_channel(&self.state, self.equation.num_states(), i)
    }

    pub fn grid(&self) -> &GridDescriptor {
        &self.grid
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn equation(&self) -> &dyn Equation {
        self.equation.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /**
     * Write every channel at the next free save index under `dir`. Returns
     * the index used.
     */
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<usize> {
        self.device.finish();
        persistence::save(dir.as_ref(), self.equation.state_names(), &self.grid, &self.state)
    }

    pub fn dstate_dt_matrix(&self) -> Result<Vec<f64>> {
        self.scheme.dstate_dt_matrix()
    }

    pub fn apply_dstate_dt_matrix(&self, x: &[f64], result: &mut [f64]) -> Result<()> {
        self.scheme.apply_dstate_dt_matrix(x, result)
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::boundary::BoundaryMethod;
    use crate::config::SolverKind;
    use crate::grid::NUM_GHOST;

    fn sod(x: [f64; 3]) -> Vec<f64> {
        if x[0] < 0.0 {
            vec![1.0, 0.0, 0.0, 0.0, 1.0]
        } else {
            vec![0.125, 0.0, 0.0, 0.0, 0.1]
        }
    }

    fn sod_config(method: BoundaryMethod) -> Config {
        Config {
            size: [128, 1, 1],
            boundary_methods: [[method; 2]; 3],
            ..Config::default()
        }
    }

    fn sod_solver(config: Config) -> Solver {
        let mut solver = Solver::new(config).unwrap();
        solver.set_initial_condition(Box::new(sod));
        solver.reset_state().unwrap();
        solver
    }

    fn total_mass(solver: &Solver) -> f64 {
        let grid = solver.grid();
        grid.interior().iter().map(|i| solver.state()[grid.linear_index(i) * 5]).sum()
    }

    fn density_at(solver: &Solver, x: f64) -> f64 {
        let grid = solver.grid();
        let dx = grid.cell_spacing()[0];
        let i = ((x - grid.xmin()[0]) / dx) as usize;
        solver.state()[i * 5]
    }

    fn run_sod(method: BoundaryMethod) {
        let mut solver = sod_solver(sod_config(method));
        let mass = total_mass(&solver);

        for _ in 0..40 {
            let dt = solver.update().unwrap();
            assert!(dt > 0.0 && dt.is_finite());
        }
        assert!(solver.state().chunks(5).all(|q| q[0] > 0.0));
        assert!((total_mass(&solver) - mass).abs() < 1e-10 * mass);
        assert!(density_at(&solver, 0.05) > 0.2);
        assert!(density_at(&solver, -0.05) < 1.0);
        assert_eq!(solver.iteration(), 40);
        assert!(solver.time() > 0.0);
    }

    #[test]
    fn sod_shock_tube_with_free_flow_boundaries() {
        run_sod(BoundaryMethod::FreeFlow);
    }

    #[test]
    fn sod_shock_tube_with_periodic_boundaries() {
        run_sod(BoundaryMethod::Periodic);
    }

    fn assert_ghosts_filled(solver: &Solver, method: BoundaryMethod) {
        let n = solver.equation().num_states();
        let size = solver.grid().size()[0];
        let g = NUM_GHOST;
        let cell = |i: usize| &solver.state()[i * n..(i + 1) * n];

        for layer in 0..g {
            let (lo, hi) = match method {
                BoundaryMethod::FreeFlow => (g, size - g - 1),
                BoundaryMethod::Periodic => (size - 2 * g + layer, g + layer),
                _ => unreachable!(),
            };
            assert_eq!(cell(layer), cell(lo), "{:?} lower ghost {}", method, layer);
            assert_eq!(cell(size - g + layer), cell(hi), "{:?} upper ghost {}", method, layer);
        }
    }

    #[test]
    fn one_sod_update_leaves_the_ghost_cells_filled() {
        for kind in [SolverKind::EulerRoe, SolverKind::EulerBurgers] {
            for method in [BoundaryMethod::FreeFlow, BoundaryMethod::Periodic] {
                let config = Config {
                    solver: kind,
                    size: [100, 1, 1],
                    use_fixed_dt: true,
                    fixed_dt: 1e-4,
                    ..sod_config(method)
                };
                let mut solver = sod_solver(config);
                assert_eq!(solver.update().unwrap(), 1e-4);
                assert_ghosts_filled(&solver, method);
                assert!(solver.state().chunks(5).all(|q| q[0] > 0.0), "{}", kind.name());
            }
        }
    }

    #[test]
    fn magnetized_sod_keeps_its_normal_field_and_follows_the_gas() {
        fn run(kind: SolverKind, initial: InitialCondition) -> Solver {
            let config = Config {
                solver: kind,
                use_fixed_dt: true,
                fixed_dt: 5e-4,
                ..sod_config(BoundaryMethod::FreeFlow)
            };
            let mut solver = Solver::new(config).unwrap();
            solver.set_initial_condition(initial);
            solver.reset_state().unwrap();

            for _ in 0..40 {
                solver.update().unwrap();
            }
            solver
        }
        let magnetized = run(SolverKind::MHDBurgers, Box::new(|x| {
            let mut prim = sod(x);
            prim.extend([0.75, 0.0, 0.0]);
            prim
        }));
        let hydro = run(SolverKind::EulerBurgers, Box::new(sod));

        let bx = magnetized.channel(5);
        assert!(bx.iter().all(|b| (b - 0.75).abs() < 1e-14), "B_x drifted to {:?}", bx);
        assert!(magnetized.channel(6).iter().all(|b| b.abs() < 1e-14));

        let rho = magnetized.channel(0);
        let rho_hydro = hydro.channel(0);
        let mean_difference = rho.iter().zip(&rho_hydro).map(|(a, b)| (a - b).abs()).sum::<f64>() / rho.len() as f64;
        assert!(rho.iter().all(|&r| r > 0.1), "density fell to {:?}", rho.iter().cloned().fold(f64::MAX, f64::min));
        assert!(mean_difference < 1e-2, "mean density difference {}", mean_difference);
    }

    #[test]
    fn update_keeps_the_state_buffer_in_place() {
        let mut solver = sod_solver(sod_config(BoundaryMethod::FreeFlow));
        let ptr = solver.state().as_ptr();
        let len = solver.state().len();
        solver.update().unwrap();
        solver.update().unwrap();
        assert_eq!(solver.state().as_ptr(), ptr);
        assert_eq!(solver.state().len(), len);
    }

    #[test]
    fn reset_state_converts_every_cell() {
        let solver = sod_solver(sod_config(BoundaryMethod::FreeFlow));
        let euler = crate::equation::euler::Euler::new(1.4, [[BoundaryMethod::FreeFlow; 2]; 3]);
        let grid = solver.grid();
        let mut expected = [0.0; 5];

        for (c, q) in solver.state().chunks(5).enumerate() {
            euler.prim_to_cons(&sod(grid.cell_center(grid.coords(c))), &mut expected);
            assert_eq!(q, &expected[..]);
        }
    }

    #[test]
    fn zero_step_after_boundary_leaves_the_state_unchanged() {
        let mut solver = sod_solver(sod_config(BoundaryMethod::Periodic));
        solver.boundary();
        let before = solver.state().to_vec();
        solver.step(0.0).unwrap();
        assert_eq!(solver.state(), &before[..]);
    }

    #[test]
    fn channels_are_planar_copies() {
        let solver = sod_solver(sod_config(BoundaryMethod::FreeFlow));
        let density = solver.channel(0);
        assert_eq!(density.len(), 128);
        assert_eq!(density[0], 1.0);
        assert_eq!(density[127], 0.125);
        assert_eq!(solver.state_names()[0], "density");
    }

    #[test]
    fn reset_without_an_initial_condition_is_a_config_error() {
        let mut solver = Solver::new(sod_config(BoundaryMethod::FreeFlow)).unwrap();
        assert!(matches!(solver.reset_state(), Err(Error::Config(_))));
    }

    #[test]
    fn wrong_primitive_count_is_a_config_error() {
        let mut solver = Solver::new(sod_config(BoundaryMethod::FreeFlow)).unwrap();
        solver.set_initial_condition(Box::new(|_| vec![1.0, 0.0, 1.0]));
        assert!(matches!(solver.reset_state(), Err(Error::Config(_))));
    }

    #[test]
    fn unknown_integrator_is_a_config_error() {
        let config = Config { integrator: "LeapFrog".into(), ..sod_config(BoundaryMethod::FreeFlow) };
        assert!(matches!(Solver::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn unknown_limiter_is_a_build_error() {
        let config = Config { slope_limiter: "Bogus".into(), ..sod_config(BoundaryMethod::FreeFlow) };
        assert!(matches!(Solver::new(config), Err(Error::Build { .. })));
    }

    #[test]
    fn gravity_on_a_non_fluid_equation_is_a_config_error() {
        let config = Config { solver: SolverKind::MaxwellRoe, use_gravity: true, ..sod_config(BoundaryMethod::FreeFlow) };
        assert!(matches!(Solver::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn failed_implicit_step_restores_the_state() {
        let config = Config {
            integrator: "BackwardEulerConjugateGradient".into(),
            implicit_max_iterations: 0,
            ..sod_config(BoundaryMethod::FreeFlow)
        };
        let mut solver = sod_solver(config);
        solver.boundary();
        let before = solver.state().to_vec();

        let error = solver.step(1e-3).unwrap_err();
        assert!(matches!(error, Error::Convergence { .. }));
        assert!(error.is_recoverable());
        assert_eq!(solver.state(), &before[..]);
        assert_eq!(solver.iteration(), 0);
    }

    #[test]
    fn roe_does_not_linearize_its_update() {
        let solver = Solver::new(sod_config(BoundaryMethod::FreeFlow)).unwrap();
        assert!(matches!(solver.dstate_dt_matrix(), Err(Error::UnsupportedOperation(_))));
    }

    #[test]
    fn every_solver_kind_builds_and_steps() {
        for kind in SolverKind::ALL {
            let config = Config {
                solver: kind,
                size: [32, 1, 1],
                boundary_methods: [[BoundaryMethod::Periodic; 2]; 3],
                use_fixed_dt: true,
                fixed_dt: 1e-4,
                ..Config::default()
            };
            let mut solver = Solver::new(config).unwrap();
            let problem = crate::problems::Problem::default_for(kind);
            solver.set_initial_condition(problem.initial_condition(solver.equation()).unwrap());
            solver.reset_state().unwrap();
            solver.update().unwrap();
            assert!(solver.state().iter().all(|x| x.is_finite()), "{}", kind.name());
        }
    }
}
