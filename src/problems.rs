use std::f64::consts::PI;
use crate::config::SolverKind;
use crate::equation::Equation;
use crate::error::{Error, Result};
use crate::solver::InitialCondition;




/**
 * Built-in initial conditions. Each is a one-dimensional problem along the
 * x axis, on the default domain [-0.5, 0.5].
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Problem {
    /// Sod's shock tube for the Euler equations
    Sod,
    /// The Brio & Wu MHD shock tube
    BrioWu,
    /// A relativistic blast wave: a hot dense gas released into a cold one
    RelativisticBlast,
    /// A Gaussian plane electromagnetic wave moving in the +x direction
    MaxwellPulse,
    /// The gauge wave test of numerical relativity, on flat space
    GaugeWave,
}




// ============================================================================
impl Problem {

    pub const ALL: [Problem; 5] = [
        Problem::Sod,
        Problem::BrioWu,
        Problem::RelativisticBlast,
        Problem::MaxwellPulse,
        Problem::GaugeWave,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Problem::Sod => "sod",
            Problem::BrioWu => "brio-wu",
            Problem::RelativisticBlast => "relativistic-blast",
            Problem::MaxwellPulse => "maxwell-pulse",
            Problem::GaugeWave => "gauge-wave",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| Error::config(format!("unknown problem {}", name)))
    }

    /// The problem a solver kind runs when none is named.
    pub fn default_for(kind: SolverKind) -> Self {
        match kind {
            SolverKind::EulerBurgers | SolverKind::EulerRoe => Problem::Sod,
            SolverKind::MHDBurgers | SolverKind::MHDRoe => Problem::BrioWu,
            SolverKind::SRHDRoe => Problem::RelativisticBlast,
            SolverKind::MaxwellRoe => Problem::MaxwellPulse,
            SolverKind::ADM3DRoe => Problem::GaugeWave,
        }
    }

    /// Name of the equation this problem is posed for.
    pub fn equation_name(self) -> &'static str {
        match self {
            Problem::Sod => "Euler",
            Problem::BrioWu => "MHD",
            Problem::RelativisticBlast => "SRHD",
            Problem::MaxwellPulse => "Maxwell",
            Problem::GaugeWave => "ADM3D",
        }
    }

    /**
     * The initial condition of this problem, as primitive values for the
     * given equation. Fails if the equation is not the one the problem is
     * posed for.
     */
    pub fn initial_condition(self, equation: &dyn Equation) -> Result<InitialCondition> {
        if equation.name() != self.equation_name() {
            return Err(Error::config(format!(
                "problem {} is posed for {}, not {}",
                self.name(),
                self.equation_name(),
                equation.name())));
        }

        Ok(match self {
            Problem::Sod => Box::new(|x| {
                if x[0] < 0.0 {
                    vec![1.0, 0.0, 0.0, 0.0, 1.0]
                } else {
                    vec![0.125, 0.0, 0.0, 0.0, 0.1]
                }
            }),
            Problem::BrioWu => Box::new(|x| {
                if x[0] < 0.0 {
                    vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.75, 1.0, 0.0]
                } else {
                    vec![0.125, 0.0, 0.0, 0.0, 0.1, 0.75, -1.0, 0.0]
                }
            }),
            Problem::RelativisticBlast => Box::new(|x| {
                if x[0] < 0.0 {
                    vec![10.0, 0.0, 0.0, 0.0, 13.33]
                } else {
                    vec![1.0, 0.0, 0.0, 0.0, 0.01]
                }
            }),
            Problem::MaxwellPulse => Box::new(|x| {
                let e = (-(x[0] / 0.05).powi(2)).exp();
                vec![0.0, 0.0, e, 0.0, -e, 0.0, 1.0, 1.0, 0.0]
            }),
            Problem::GaugeWave => gauge_wave(equation, 0.1)?,
        })
    }
}




/**
 * Flat space in a coordinate system whose metric oscillates along x:
 * gamma_xx = 1 - A sin(2 pi x), with harmonic lapse alpha = sqrt(gamma_xx).
 */
fn gauge_wave(equation: &dyn Equation, amplitude: f64) -> Result<InitialCondition> {
    let names = equation.state_names();
    let index = |name: &str| {
        names
            .iter()
            .position(|n| *n == name)
            .ok_or_else(|| Error::config(format!("{} has no channel {}", equation.name(), name)))
    };
    let alpha = index("alpha")?;
    let gamma_xx = index("gamma_xx")?;
    let gamma_yy = index("gamma_yy")?;
    let gamma_zz = index("gamma_zz")?;
    let a_x = index("A_x")?;
    let d_xxx = index("D_xxx")?;
    let k_xx = index("K_xx")?;
    let len = equation.num_primitives();

    Ok(Box::new(move |x| {
        let phase = 2.0 * PI * x[0];
        let g = 1.0 - amplitude * phase.sin();
        let dg = -PI * amplitude * phase.cos();
        let mut prim = vec![0.0; len];

        prim[alpha] = g.sqrt();
        prim[gamma_xx] = g;
        prim[gamma_yy] = 1.0;
        prim[gamma_zz] = 1.0;
        prim[a_x] = dg / g;
        prim[d_xxx] = dg;
        prim[k_xx] = dg / g.sqrt();
        prim
    }))
}
