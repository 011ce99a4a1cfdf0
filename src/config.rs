use std::path::Path;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::boundary::BoundaryMethod;
use crate::equation::adm3d::Adm3d;
use crate::equation::euler::Euler;
use crate::equation::maxwell::Maxwell;
use crate::equation::mhd::Mhd;
use crate::equation::srhd::Srhd;
use crate::equation::Equation;
use crate::error::{Error, Result};
use crate::grid::{GridDescriptor, NUM_GHOST};




/**
 * The numerical scheme family of a solver
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemeKind {
    Roe,
    Burgers,
}




/**
 * The pairing of equation and scheme a solver runs
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverKind {
    EulerBurgers,
    MHDBurgers,
    EulerRoe,
    MHDRoe,
    SRHDRoe,
    MaxwellRoe,
    ADM3DRoe,
}




// ============================================================================
impl SolverKind {

    pub const ALL: [SolverKind; 7] = [
        SolverKind::EulerBurgers,
        SolverKind::MHDBurgers,
        SolverKind::EulerRoe,
        SolverKind::MHDRoe,
        SolverKind::SRHDRoe,
        SolverKind::MaxwellRoe,
        SolverKind::ADM3DRoe,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SolverKind::EulerBurgers => "EulerBurgers",
            SolverKind::MHDBurgers => "MHDBurgers",
            SolverKind::EulerRoe => "EulerRoe",
            SolverKind::MHDRoe => "MHDRoe",
            SolverKind::SRHDRoe => "SRHDRoe",
            SolverKind::MaxwellRoe => "MaxwellRoe",
            SolverKind::ADM3DRoe => "ADM3DRoe",
        }
    }

    pub fn scheme(self) -> SchemeKind {
        match self {
            SolverKind::EulerBurgers | SolverKind::MHDBurgers => SchemeKind::Burgers,
            _ => SchemeKind::Roe,
        }
    }

    /**
     * Build the equation this solver kind advances.
     */
    pub fn equation(self, gamma: f64, boundary_methods: [[BoundaryMethod; 2]; 3]) -> Box<dyn Equation> {
        match self {
            SolverKind::EulerBurgers | SolverKind::EulerRoe => Box::new(Euler::new(gamma, boundary_methods)),
            SolverKind::MHDBurgers | SolverKind::MHDRoe => Box::new(Mhd::new(gamma, boundary_methods)),
            SolverKind::SRHDRoe => Box::new(Srhd::new(gamma, boundary_methods)),
            SolverKind::MaxwellRoe => Box::new(Maxwell::new(boundary_methods)),
            SolverKind::ADM3DRoe => Box::new(Adm3d::new(boundary_methods)),
        }
    }
}

impl FromStr for SolverKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| Error::config(format!("unknown solver {}", s)))
    }
}




/**
 * Solver configuration. Every field has a default, so a configuration file
 * need only name what it changes.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub solver: SolverKind,
    pub dim: usize,
    pub size: [usize; 3],
    pub xmin: [f64; 3],
    pub xmax: [f64; 3],
    pub use_fixed_dt: bool,
    pub fixed_dt: f64,
    pub cfl: f64,
    pub slope_limiter: String,
    pub integrator: String,
    pub gravitational_constant: f64,
    pub use_gravity: bool,
    pub gauss_seidel_max_iter: usize,
    pub boundary_methods: [[BoundaryMethod; 2]; 3],
    pub gamma: f64,
    pub show_timestep: bool,
    pub implicit_tolerance: f64,
    pub implicit_max_iterations: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            solver: SolverKind::EulerRoe,
            dim: 1,
            size: [256, 256, 256],
            xmin: [-0.5; 3],
            xmax: [0.5; 3],
            use_fixed_dt: false,
            fixed_dt: 1e-3,
            cfl: 0.5,
            slope_limiter: "Superbee".to_string(),
            integrator: "ForwardEuler".to_string(),
            gravitational_constant: 1.0,
            use_gravity: false,
            gauss_seidel_max_iter: 20,
            boundary_methods: [[BoundaryMethod::FreeFlow; 2]; 3],
            gamma: 1.4,
            show_timestep: false,
            implicit_tolerance: 1e-7,
            implicit_max_iterations: 100,
        }
    }
}




// ============================================================================
impl Config {

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Persistence(format!("bad configuration: {}", e)))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Persistence(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=3).contains(&self.dim) {
            return Err(Error::config(format!("dim must be 1, 2, or 3 (got {})", self.dim)));
        }
        if !(self.cfl > 0.0 && self.cfl <= 1.0) {
            return Err(Error::config(format!("cfl must be in (0, 1] (got {})", self.cfl)));
        }
        for n in 0..self.dim {
            if self.size[n] < 2 * NUM_GHOST + 1 {
                return Err(Error::config(format!("size[{}] = {} is too small", n, self.size[n])));
            }
            if !(self.xmax[n] > self.xmin[n]) {
                return Err(Error::config(format!("empty extent on axis {}", n)));
            }
        }
        if self.use_fixed_dt && !(self.fixed_dt > 0.0 && self.fixed_dt.is_finite()) {
            return Err(Error::config(format!("fixed_dt must be positive (got {})", self.fixed_dt)));
        }
        if !(self.gamma > 1.0) && self.solver != SolverKind::MaxwellRoe && self.solver != SolverKind::ADM3DRoe {
            return Err(Error::config(format!("gamma must exceed 1 (got {})", self.gamma)));
        }
        Ok(())
    }

    pub fn grid(&self) -> Result<GridDescriptor> {
        GridDescriptor::new(self.dim, self.size, self.xmin, self.xmax)
    }

    /// Axes periodic on both sides, for the Poisson solvers.
    pub fn periodic(&self) -> [bool; 3] {
        self.boundary_methods.map(|sides| sides.iter().all(|&m| m == BoundaryMethod::Periodic))
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn defaults_fill_in_missing_fields() {
        let config = Config::from_json(r#"{ "dim": 2, "size": [64, 32, 1], "solver": "MHDRoe" }"#).unwrap();
        assert_eq!(config.solver, SolverKind::MHDRoe);
        assert_eq!(config.cfl, 0.5);
        assert_eq!(config.slope_limiter, "Superbee");
        assert_eq!(config.integrator, "ForwardEuler");
        assert_eq!(config.gauss_seidel_max_iter, 20);
        assert_eq!(config.xmin, [-0.5; 3]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn boundary_methods_deserialize_by_name() {
        let config = Config::from_json(r#"{ "boundary_methods": [["Periodic", "Periodic"], ["Mirror", "FreeFlow"], ["Reflect", "Reflect"]] }"#).unwrap();
        assert_eq!(config.boundary_methods[1][0], BoundaryMethod::Mirror);
        assert_eq!(config.periodic(), [true, false, false]);
    }

    #[test]
    fn an_axis_is_periodic_only_if_both_sides_are() {
        let config = Config::from_json(r#"{ "boundary_methods": [["Periodic", "FreeFlow"], ["Mirror", "Periodic"], ["Periodic", "Periodic"]] }"#).unwrap();
        assert_eq!(config.periodic(), [false, false, true]);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let bad = [
            Config { cfl: 0.0, ..Config::default() },
            Config { cfl: 1.5, ..Config::default() },
            Config { dim: 4, ..Config::default() },
            Config { size: [3, 1, 1], ..Config::default() },
            Config { use_fixed_dt: true, fixed_dt: -1.0, ..Config::default() },
            Config { xmin: [1.0; 3], xmax: [0.0; 3], ..Config::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(Error::Config(_))), "{:?}", config);
        }
    }

    #[test]
    fn malformed_json_is_a_persistence_error() {
        assert!(matches!(Config::from_json("{ dim: "), Err(Error::Persistence(_))));
    }

    #[test]
    fn solver_kinds_parse_by_name() {
        for kind in SolverKind::ALL {
            assert_eq!(kind.name().parse::<SolverKind>().unwrap(), kind);
        }
        assert!("HydroRoe".parse::<SolverKind>().is_err());
        assert_eq!(SolverKind::MHDBurgers.scheme(), SchemeKind::Burgers);
        assert_eq!(SolverKind::ADM3DRoe.equation(1.4, [[BoundaryMethod::Periodic; 2]; 3]).num_states(), 37);
    }
}
