//! Propagation medium. Positions in air are `nu_air = nu_vac * n(nu_vac)`
//! with the Edlen (1966) dispersion of standard air (15 C, 101325 Pa).

use crate::domain::Medium;

pub fn air_refractive_index(vacuum_wavenumber: f64) -> f64 {
    // sigma in um-1
    let sigma = vacuum_wavenumber * 1.0e-4;
    let sigma2 = sigma * sigma;
    1.0 + 1.0e-8 * (8_342.13 + 2_406_030.0 / (130.0 - sigma2) + 15_997.0 / (38.9 - sigma2))
}

pub fn vacuum_to_air_wavenumber(vacuum_wavenumber: f64) -> f64 {
    vacuum_wavenumber * air_refractive_index(vacuum_wavenumber)
}

/// Inverse of [`vacuum_to_air_wavenumber`] by fixed-point iteration; the
/// index varies slowly enough that four passes reach machine precision.
pub fn air_to_vacuum_wavenumber(air_wavenumber: f64) -> f64 {
    let mut vacuum = air_wavenumber;
    for _ in 0..4 {
        vacuum = air_wavenumber / air_refractive_index(vacuum);
    }
    vacuum
}

pub fn to_medium(vacuum_wavenumber: f64, medium: Medium) -> f64 {
    match medium {
        Medium::Vacuum => vacuum_wavenumber,
        Medium::Air => vacuum_to_air_wavenumber(vacuum_wavenumber),
    }
}

pub fn to_vacuum(medium_wavenumber: f64, medium: Medium) -> f64 {
    match medium {
        Medium::Vacuum => medium_wavenumber,
        Medium::Air => air_to_vacuum_wavenumber(medium_wavenumber),
    }
}

#[cfg(test)]
mod tests {
    use super::{air_refractive_index, air_to_vacuum_wavenumber, vacuum_to_air_wavenumber};

    #[test]
    fn edlen_index_reproduces_mid_infrared_wavelength_shift() {
        let vacuum_nm = 4_600.0;
        let n = air_refractive_index(1.0e7 / vacuum_nm);
        let air_nm = vacuum_nm / n;
        assert!((vacuum_nm - air_nm - 1.254_0).abs() < 5.0e-4, "shift {}", vacuum_nm - air_nm);
    }

    #[test]
    fn visible_index_matches_tabulated_value() {
        // Standard air at 589.3 nm (Na D): n = 1.000277.
        let n = air_refractive_index(1.0e7 / 589.3);
        assert!((n - 1.0 - 2.771_3e-4).abs() < 2.0e-7);
    }

    #[test]
    fn air_to_vacuum_inverts_the_forward_map() {
        for vacuum in [500.0, 2_143.0, 15_000.0] {
            let air = vacuum_to_air_wavenumber(vacuum);
            assert!(air > vacuum);
            assert!((air_to_vacuum_wavenumber(air) - vacuum).abs() < 1.0e-9);
        }
    }
}
