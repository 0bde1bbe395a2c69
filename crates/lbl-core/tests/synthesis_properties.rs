use lbl_core::common::config::{PseudoContinuumConfig, StrategyConfig};
use lbl_core::levels::RovibrationalLadder;
use lbl_core::numerics::{argmax, stable_sum};
use lbl_core::partition::LevelCache;
use lbl_core::{ExecutionMode, SpectrumFactory, SynthesisConfig, ThermalConditions};

fn co_factory(config: SynthesisConfig) -> SpectrumFactory {
    let file = RovibrationalLadder::databank("CO", &[1], "co-ladder")
        .expect("built-in CO ladder should generate");
    SpectrumFactory::from_databank(config, file, &LevelCache::new())
        .expect("factory should build from the ladder databank")
}

fn base_config() -> SynthesisConfig {
    SynthesisConfig::default()
        .with_wavenumber_range(2_050.0, 2_250.0)
        .with_wstep(0.005)
        .with_broadening_max_width(10.0)
        .with_cutoff(0.0)
}

fn peak(values: &[f64]) -> f64 {
    argmax(values).map(|(_, value)| value).unwrap_or(0.0)
}

#[test]
fn direct_and_pooled_strategies_agree_within_tolerance() {
    let conditions = ThermalConditions::equilibrium(1_000.0).with_path_length(5.0);
    let direct = co_factory(base_config())
        .eq_spectrum(&conditions)
        .expect("direct synthesis");
    let pooled = co_factory(base_config().with_strategy(StrategyConfig::pooled()))
        .eq_spectrum(&conditions)
        .expect("pooled synthesis");

    assert_eq!(direct.wavenumbers(), pooled.wavenumbers());
    let direct_peak = peak(direct.abscoeff());
    let pooled_peak = peak(pooled.abscoeff());
    assert!(direct_peak > 0.0);
    assert!(
        (pooled_peak / direct_peak - 1.0).abs() < 0.01,
        "peak direct={direct_peak:e} pooled={pooled_peak:e}"
    );

    let direct_power = direct.power();
    let pooled_power = pooled.power();
    assert!(
        (pooled_power / direct_power - 1.0).abs() < 0.005,
        "power direct={direct_power:e} pooled={pooled_power:e}"
    );
    assert!(pooled.diagnostics().superposition.strategy.pooled_nodes > 1);
}

#[test]
fn optically_thin_power_matches_the_integrated_spectrum() {
    let factory = co_factory(
        base_config()
            .with_wavenumber_range(1_700.0, 2_400.0)
            .with_wstep(0.01),
    );
    let conditions = ThermalConditions::non_equilibrium(600.0, 600.0)
        .with_pressure(0.1)
        .with_mole_fraction(0.2)
        .with_path_length(10.0)
        .with_self_absorption(false);

    let spectrum = factory.non_eq_spectrum(&conditions).expect("spectrum");
    let analytic = factory
        .optically_thin_power(&conditions)
        .expect("analytic power");
    let integrated = spectrum.power();

    assert!(analytic > 0.0);
    assert!(
        (integrated / analytic - 1.0).abs() < 0.005,
        "integrated={integrated:e} analytic={analytic:e}"
    );
}

#[test]
fn equal_vibrational_and_rotational_temperatures_reproduce_equilibrium() {
    let factory = co_factory(base_config());
    let equilibrium = factory
        .eq_spectrum(&ThermalConditions::equilibrium(800.0))
        .expect("equilibrium");
    let collapsed = factory
        .non_eq_spectrum(&ThermalConditions::non_equilibrium(800.0, 800.0))
        .expect("non-equilibrium");

    let scale = peak(equilibrium.abscoeff());
    for (lhs, rhs) in equilibrium.abscoeff().iter().zip(collapsed.abscoeff()) {
        assert!((lhs - rhs).abs() <= 1.0e-9 * scale);
    }

    // Kirchhoff's law on the grid against per-line emission: equal up to the
    // variation of the Planck function across each profile.
    let eq_radiance = equilibrium.power();
    let neq_radiance = collapsed.power();
    assert!((neq_radiance / eq_radiance - 1.0).abs() < 0.01);
}

#[test]
fn path_length_rescaling_is_a_pure_function_of_the_stored_coefficients() {
    let factory = co_factory(base_config());
    let conditions = ThermalConditions::equilibrium(500.0).with_path_length(1.0);
    let spectrum = factory.eq_spectrum(&conditions).expect("spectrum");

    let via_intermediate = spectrum
        .rescale_path_length(7.0)
        .and_then(|rescaled| rescaled.rescale_path_length(30.0))
        .expect("rescale twice");
    let direct = spectrum.rescale_path_length(30.0).expect("rescale once");
    let rerun = factory
        .eq_spectrum(&conditions.clone().with_path_length(30.0))
        .expect("rerun at 30 cm");

    assert_eq!(via_intermediate.transmittance_noslit(), direct.transmittance_noslit());
    assert_eq!(via_intermediate.radiance_noslit(), direct.radiance_noslit());
    for (lhs, rhs) in direct.transmittance_noslit().iter().zip(rerun.transmittance_noslit()) {
        assert!((lhs - rhs).abs() < 1.0e-12);
    }
}

#[test]
fn lowering_the_cutoff_never_loses_lines_or_peak_height() {
    let conditions = ThermalConditions::equilibrium(1_500.0);
    let mut previous: Option<(usize, f64)> = None;
    for cutoff in [1.0e-19, 1.0e-21, 1.0e-23, 1.0e-25, 0.0] {
        let spectrum = co_factory(base_config().with_cutoff(cutoff))
            .eq_spectrum(&conditions)
            .expect("spectrum");
        let retained = spectrum.diagnostics().superposition.cutoff.lines_after;
        let height = peak(spectrum.abscoeff());
        if let Some((lines, peak_height)) = previous {
            assert!(retained >= lines, "cutoff {cutoff:e}: {retained} < {lines}");
            assert!(height >= peak_height * (1.0 - 1.0e-12), "cutoff {cutoff:e}");
        }
        previous = Some((retained, height));
    }
}

#[test]
fn parallel_runs_are_reproducible() {
    let conditions = ThermalConditions::non_equilibrium(2_000.0, 400.0);
    for strategy in [StrategyConfig::Direct, StrategyConfig::pooled()] {
        let parallel = base_config()
            .with_strategy(strategy)
            .with_execution(ExecutionMode::Parallel { chunk_size: 64 });
        let first = co_factory(parallel.clone())
            .non_eq_spectrum(&conditions)
            .expect("first");
        let second = co_factory(parallel)
            .non_eq_spectrum(&conditions)
            .expect("second");
        let serial = co_factory(base_config().with_strategy(strategy))
            .non_eq_spectrum(&conditions)
            .expect("serial");

        assert_eq!(first.abscoeff(), second.abscoeff());
        assert_eq!(first.emisscoeff(), second.emisscoeff());
        let scale = peak(serial.abscoeff());
        for (lhs, rhs) in serial.abscoeff().iter().zip(first.abscoeff()) {
            assert!((lhs - rhs).abs() <= 1.0e-12 * scale);
        }
    }
}

#[test]
fn pseudo_continuum_preserves_integrated_absorption() {
    let conditions = ThermalConditions::equilibrium(2_500.0);
    let plain = co_factory(base_config())
        .eq_spectrum(&conditions)
        .expect("plain");
    let mut config = base_config();
    config.pseudo_continuum = PseudoContinuumConfig {
        threshold: 1.0e-3,
        coarse_resolution: 1.0,
    };
    let continuum = co_factory(config).eq_spectrum(&conditions).expect("continuum");

    let moved = continuum.diagnostics().superposition.continuum.lines;
    assert!(moved > 0, "hot bands should feed the pseudo-continuum");
    let plain_area = stable_sum(plain.abscoeff());
    let continuum_area = stable_sum(continuum.abscoeff());
    assert!((continuum_area / plain_area - 1.0).abs() < 0.005);
    assert!((peak(continuum.abscoeff()) / peak(plain.abscoeff()) - 1.0).abs() < 0.01);
}
