use crate::error::{Error, Result};
use crate::program::Program;




/**
 * Flux limiter functions phi(r), where r is the ratio of the upwind jump to
 * the local jump of a characteristic variable
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlopeLimiter {
    DonorCell,
    LaxWendroff,
    BeamWarming,
    Fromm,
    Charm,
    Hcus,
    Hquick,
    Koren,
    MinMod,
    Oshker,
    Ospre,
    Smart,
    Sweby,
    Umist,
    VanAlbada1,
    VanAlbada2,
    VanLeer,
    MonotizedCentral,
    Superbee,
    BarthJespersen,
}




// ============================================================================
impl SlopeLimiter {

    pub fn from_name(name: &str) -> Option<Self> {
        use SlopeLimiter::*;
        Some(match name {
            "DonorCell"        => DonorCell,
            "LaxWendroff"      => LaxWendroff,
            "BeamWarming"      => BeamWarming,
            "Fromm"            => Fromm,
            "CHARM"            => Charm,
            "HCUS"             => Hcus,
            "HQUICK"           => Hquick,
            "Koren"            => Koren,
            "MinMod"           => MinMod,
            "Oshker"           => Oshker,
            "Ospre"            => Ospre,
            "Smart"            => Smart,
            "Sweby"            => Sweby,
            "UMIST"            => Umist,
            "VanAlbada1"       => VanAlbada1,
            "VanAlbada2"       => VanAlbada2,
            "VanLeer"          => VanLeer,
            "MonotizedCentral" => MonotizedCentral,
            "Superbee"         => Superbee,
            "BarthJespersen"   => BarthJespersen,
            _ => return None,
        })
    }

    /**
     * The limiter selected by a built program.
     */
    pub fn from_program(program: &Program) -> Result<Self> {
        let name = program.define("SLOPE_LIMITER_SELECTED").unwrap_or("");
        Self::from_name(name).ok_or_else(|| Error::Build {
            log: format!("program selected unknown slope limiter '{}'", name),
        })
    }

    pub fn phi(self, r: f64) -> f64 {
        use SlopeLimiter::*;
        match self {
            DonorCell => 0.0,
            LaxWendroff => 1.0,
            BeamWarming => r,
            Fromm => 0.5 * (1.0 + r),
            Charm => if r > 0.0 { r * (3.0 * r + 1.0) / ((r + 1.0) * (r + 1.0)) } else { 0.0 },
            Hcus => 1.5 * (r + r.abs()) / (r + 2.0),
            Hquick => 2.0 * (r + r.abs()) / (r + 3.0),
            Koren => (2.0 * r).min((1.0 + 2.0 * r) / 3.0).min(2.0).max(0.0),
            MinMod => r.min(1.0).max(0.0),
            Oshker => r.min(1.5).max(0.0),
            Ospre => 1.5 * (r * r + r) / (r * r + r + 1.0),
            Smart => (2.0 * r).min(0.25 + 0.75 * r).min(4.0).max(0.0),
            Sweby => (1.5 * r).min(1.0).max(r.min(1.5)).max(0.0),
            Umist => (2.0 * r).min(0.25 + 0.75 * r).min(0.75 + 0.25 * r).min(2.0).max(0.0),
            VanAlbada1 => (r * r + r) / (r * r + 1.0),
            VanAlbada2 => 2.0 * r / (r * r + 1.0),
            VanLeer => (r + r.abs()) / (1.0 + r.abs()),
            MonotizedCentral => (2.0 * r).min(0.5 * (1.0 + r)).min(2.0).max(0.0),
            Superbee => (2.0 * r).min(1.0).max(r.min(2.0)).max(0.0),
            BarthJespersen => {
                if r > 0.0 {
                    0.5 * (r + 1.0) * (4.0 * r / (r + 1.0)).min(1.0).min((4.0 / (r + 1.0)).min(1.0))
                } else {
                    0.0
                }
            }
        }
    }
}




/**
 * The ratio of an upwind jump to the local jump, zero where the local jump
 * vanishes.
 */
pub fn jump_ratio(upwind: f64, local: f64) -> f64 {
    if local.abs() > f64::EPSILON * f64::EPSILON {
        upwind / local
    } else {
        0.0
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::SlopeLimiter;

    #[test]
    fn tvd_limiters_are_second_order_for_smooth_data() {
        for limiter in [SlopeLimiter::MinMod, SlopeLimiter::VanLeer, SlopeLimiter::Superbee, SlopeLimiter::MonotizedCentral] {
            assert!((limiter.phi(1.0) - 1.0).abs() < 1e-12, "{:?}", limiter);
            assert_eq!(limiter.phi(-1.0), 0.0);
        }
    }

    #[test]
    fn superbee_saturates_at_two() {
        assert_eq!(SlopeLimiter::Superbee.phi(5.0), 2.0);
        assert_eq!(SlopeLimiter::Superbee.phi(0.25), 0.5);
        assert_eq!(SlopeLimiter::Superbee.phi(1.5), 1.5);
    }

    #[test]
    fn names_match_the_program_macros() {
        assert_eq!(SlopeLimiter::from_name("CHARM"), Some(SlopeLimiter::Charm));
        assert_eq!(SlopeLimiter::from_name("Superbee"), Some(SlopeLimiter::Superbee));
        assert_eq!(SlopeLimiter::from_name("superbee"), None);
    }
}
