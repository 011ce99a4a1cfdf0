use thiserror::Error;

/// Result type used throughout the solver.
pub type Result<T> = std::result::Result<T, Error>;




/**
 * Errors raised while building, configuring, or advancing a solver.
 */
#[derive(Error, Debug)]
pub enum Error {
    /// The device program failed to build. Fatal at startup.
    #[error("failed to build program executable!\n{log}")]
    Build { log: String },

    /// Missing or unrecognized configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// The implicit solve did not converge. The caller may retry with a
    /// smaller time step.
    #[error("implicit solve failed to converge after {iterations} iterations (residual {residual:e})")]
    Convergence { iterations: usize, residual: f64 },

    /// A capability the active scheme does not provide.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    #[error("negative mass density: {0}")]
    NegativeMassDensity(f64),

    #[error("negative gas pressure: {0}")]
    NegativeGasPressure(f64),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("persistence error: {0}")]
    Persistence(String),
}

impl Error {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Whether the error leaves the solver usable (the caller may retry).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Convergence { .. })
    }
}
