//! Isotopologue parameters (natural abundance, molar mass) in HITRAN
//! numbering, used to normalize line intensities and size Doppler widths.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsotopologueParameters {
    pub molecule: &'static str,
    pub isotope: u8,
    pub formula: &'static str,
    pub abundance: f64,
    /// Molar mass in g/mol.
    pub molar_mass: f64,
}

const fn iso(
    molecule: &'static str,
    isotope: u8,
    formula: &'static str,
    abundance: f64,
    molar_mass: f64,
) -> IsotopologueParameters {
    IsotopologueParameters {
        molecule,
        isotope,
        formula,
        abundance,
        molar_mass,
    }
}

const ISOTOPOLOGUES: [IsotopologueParameters; 20] = [
    iso("H2O", 1, "H216O", 0.997_317, 18.010_565),
    iso("H2O", 2, "H218O", 0.002_000, 20.014_811),
    iso("H2O", 3, "H217O", 3.718_84e-4, 19.014_780),
    iso("CO2", 1, "12C16O2", 0.984_204, 43.989_830),
    iso("CO2", 2, "13C16O2", 0.011_057, 44.993_185),
    iso("CO2", 3, "16O12C18O", 0.003_947, 45.994_076),
    iso("CO2", 4, "16O12C17O", 7.339_89e-4, 44.994_045),
    iso("N2O", 1, "14N216O", 0.990_333, 44.001_062),
    iso("N2O", 2, "14N15N16O", 0.003_641, 44.998_096),
    iso("CO", 1, "12C16O", 0.986_544, 27.994_915),
    iso("CO", 2, "13C16O", 0.011_084, 28.998_270),
    iso("CO", 3, "12C18O", 0.001_978, 29.999_161),
    iso("CO", 4, "12C17O", 3.678_67e-4, 28.999_130),
    iso("CH4", 1, "12CH4", 0.988_274, 16.031_300),
    iso("CH4", 2, "13CH4", 0.011_103, 17.034_655),
    iso("NO", 1, "14N16O", 0.993_974, 29.997_989),
    iso("NO", 2, "15N16O", 0.003_654, 30.995_023),
    iso("OH", 1, "16OH", 0.997_473, 17.002_740),
    iso("OH", 2, "18OH", 0.002_000, 19.006_986),
    iso("OH", 3, "16OD", 1.553_71e-4, 18.008_915),
];

pub fn isotopologue_parameters(molecule: &str, isotope: u8) -> Option<IsotopologueParameters> {
    let molecule = molecule.trim();
    ISOTOPOLOGUES
        .iter()
        .find(|entry| entry.isotope == isotope && entry.molecule.eq_ignore_ascii_case(molecule))
        .copied()
}

pub fn known_isotopes(molecule: &str) -> Vec<u8> {
    let molecule = molecule.trim();
    ISOTOPOLOGUES
        .iter()
        .filter(|entry| entry.molecule.eq_ignore_ascii_case(molecule))
        .map(|entry| entry.isotope)
        .collect()
}

/// Mass of one molecule in kg.
pub fn molecular_mass_kg(molar_mass: f64) -> f64 {
    molar_mass * 1.0e-3 / super::constants::AVOGADRO
}
