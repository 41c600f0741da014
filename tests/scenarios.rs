use approx::assert_relative_eq;
use chrono::{DateTime, Duration, TimeZone, Utc};

use substance_tracker::config::{EngineConfig, Sex, UserProfile};
use substance_tracker::dosing::{save_doses, load_doses, load_doses_with_weight, DoseRecord, Substance};
use substance_tracker::pharmacodynamics::PharmacodynamicModel;
use substance_tracker::simulation::{CombinedCalculator, SubstanceEngine, ThresholdPredictor};
use substance_tracker::EffectLevel;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 10, 7, 30, 0).unwrap()
}

fn engine(substance: Substance) -> SubstanceEngine {
    SubstanceEngine::new(substance, &EngineConfig::default(), &UserProfile::default()).unwrap()
}

fn caffeine_closed_form(amount: f64, hours: f64) -> f64 {
    if hours < 0.0 {
        return 0.0;
    }
    let ka = std::f64::consts::LN_2 / 0.75;
    let ke = std::f64::consts::LN_2 / 5.0;
    let volume = 72.0 * 0.65;
    amount * ka / (volume * (ka - ke)) * ((-ke * hours).exp() - (-ka * hours).exp())
}

#[test]
fn caffeine_single_dose_rises_and_clears() {
    let caffeine = engine(Substance::Caffeine);
    let doses = vec![DoseRecord::new(t0(), 80.0, 72.0, "caffeine").unwrap()];

    let chart = caffeine.chart(&doses, t0(), t0() + Duration::hours(48), 48 * 60).unwrap();
    let peak = chart.iter().map(|p| p.concentration).fold(0.0, f64::max);
    assert!(peak > 0.0);

    let early = caffeine.total_concentration(&doses, t0() + Duration::minutes(45));
    assert!(early >= 0.5 * peak);

    let after_five_half_lives = caffeine.total_concentration(&doses, t0() + Duration::hours(25));
    assert!(after_five_half_lives < 0.06 * peak);
    let much_later = caffeine.total_concentration(&doses, t0() + Duration::hours(40));
    assert!(much_later < 0.01 * peak);

    assert_eq!(caffeine.total_concentration(&doses, t0() - Duration::minutes(1)), 0.0);
}

#[test]
fn two_caffeine_doses_superpose() {
    let caffeine = engine(Substance::Caffeine);
    let doses = vec![
        DoseRecord::new(t0(), 80.0, 72.0, "caffeine").unwrap(),
        DoseRecord::new(t0() + Duration::hours(4), 80.0, 72.0, "caffeine").unwrap(),
    ];

    for hours in [1.0, 3.5, 4.0, 6.25, 12.0] {
        let at = t0() + Duration::minutes((hours * 60.0) as i64);
        let expected = caffeine_closed_form(80.0, hours) + caffeine_closed_form(80.0, hours - 4.0);
        assert_relative_eq!(caffeine.total_concentration(&doses, at), expected, epsilon = 1e-9);
    }
}

#[test]
fn pain_relief_reference_pair_reaches_full_scale() {
    let calculator = CombinedCalculator::new(&EngineConfig::default(), &UserProfile::default()).unwrap();
    let doses = vec![
        DoseRecord::new(t0(), 1000.0, 72.0, "paracetamol").unwrap(),
        DoseRecord::new(t0(), 400.0, 72.0, "ibuprofen").unwrap(),
    ];

    let series = calculator.effect_series(&doses, t0(), t0() + Duration::hours(6), 120).unwrap();
    let peak = series.iter().map(|p| p.combined_effect).fold(0.0, f64::max);
    assert!(peak > 97.0 && peak < 100.5, "peak {}", peak);

    assert!(calculator.strong_percent() > calculator.moderate_percent());
    assert!(calculator.moderate_percent() > calculator.light_percent());
}

#[test]
fn chart_is_deterministic_over_the_tracking_window() {
    let paracetamol = engine(Substance::Paracetamol);
    let doses = vec![
        DoseRecord::new(t0() - Duration::days(2), 1000.0, 72.0, "paracetamol").unwrap(),
        DoseRecord::new(t0() - Duration::hours(3), 500.0, 72.0, "paracetamol").unwrap(),
    ];
    let start = t0() - Duration::days(7);
    let end = t0() + Duration::days(3);

    let first = paracetamol.chart(&doses, start, end, 480).unwrap();
    let second = paracetamol.chart(&doses, start, end, 480).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 481);
    assert_eq!(first[0].time, start);
    assert_eq!(first[480].time, end);
    assert_eq!(first[0].concentration, 0.0);

    assert!(paracetamol.chart(&doses, start, end, 0).is_err());
    assert!(paracetamol.chart(&doses, end, start, 10).is_err());
}

#[test]
fn chart_points_match_direct_queries() {
    let start = t0() - Duration::days(7);
    let end = t0() + Duration::days(3);

    let paracetamol = engine(Substance::Paracetamol);
    let paracetamol_doses = vec![
        DoseRecord::new(t0() - Duration::days(1), 1000.0, 72.0, "paracetamol").unwrap(),
        DoseRecord::new(t0() + Duration::minutes(20), 500.0, 72.0, "paracetamol").unwrap(),
    ];

    let profile = UserProfile { weight_kg: 65.0, sex: Sex::Female, beverage: "wine".to_string() };
    let alcohol = SubstanceEngine::new(Substance::Alcohol, &EngineConfig::default(), &profile).unwrap();
    let alcohol_doses = vec![
        DoseRecord::new(t0() - Duration::days(3), 3.0, 65.0, "alcohol").unwrap(),
        DoseRecord::new(t0() - Duration::minutes(40), 2.0, 65.0, "alcohol").unwrap(),
    ];

    for (engine, doses) in [(&paracetamol, &paracetamol_doses), (&alcohol, &alcohol_doses)] {
        let chart = engine.chart(doses, start, end, 240).unwrap();
        assert!(chart.iter().any(|p| p.concentration > 0.0));
        for point in &chart {
            assert_eq!(point.concentration, engine.total_concentration(doses, point.time));
        }
    }
}

#[test]
fn profile_weight_applies_to_doses_stored_without_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doses.json");
    std::fs::write(&path, r#"[{"takenAt": "2024-06-10T07:30:00Z", "amount": 160.0, "substanceKey": "caffeine"}]"#).unwrap();

    let caffeine = engine(Substance::Caffeine);
    let at = t0() + Duration::hours(2);
    let light = load_doses_with_weight(&path, 55.0).unwrap();
    let heavy = load_doses_with_weight(&path, 110.0).unwrap();

    let light_conc = caffeine.total_concentration(&light, at);
    let heavy_conc = caffeine.total_concentration(&heavy, at);
    assert_relative_eq!(light_conc, 2.0 * heavy_conc, epsilon = 1e-9);
    assert!(light_conc > caffeine.total_concentration(&load_doses(&path).unwrap(), at));
}

#[test]
fn predictor_edge_cases() {
    let caffeine = engine(Substance::Caffeine);
    assert_eq!(caffeine.predict_effect_end(&[], t0()), Some(t0()));

    let predictor = ThresholdPredictor::new(Duration::minutes(15), Duration::hours(24));
    let doses = vec![DoseRecord::new(t0(), 80.0, 72.0, "caffeine").unwrap()];
    assert_eq!(predictor.predict_crossing(&doses, t0(), |_| false), None);

    let now = t0() + Duration::hours(1);
    let end = caffeine.predict_effect_end(&doses, now).unwrap();
    assert!(end > now);
    assert!(caffeine.total_concentration(&doses, end) < 0.3);
    assert!(caffeine.total_concentration(&doses, end - Duration::minutes(15)) >= 0.3);
}

#[test]
fn effect_is_half_at_ec50() {
    let pd = PharmacodynamicModel::new(3.0).unwrap();
    assert_relative_eq!(pd.effect_percent(3.0), 50.0, epsilon = 1e-12);
    assert_eq!(pd.effect_percent(0.0), 0.0);
    assert!(PharmacodynamicModel::new(0.0).is_err());
}

#[test]
fn alcohol_evening_sobers_up() {
    let profile = UserProfile { weight_kg: 80.0, sex: Sex::Male, beverage: "beer".to_string() };
    let alcohol = SubstanceEngine::new(Substance::Alcohol, &EngineConfig::default(), &profile).unwrap();
    let doses = vec![DoseRecord::new(t0(), 4.0, 80.0, "alcohol").unwrap()];

    let status = alcohol.status(&doses, t0() + Duration::hours(1));
    assert!(status.concentration > 0.3);
    assert!(status.level >= EffectLevel::Light);
    assert_eq!(status.concentration_unit, "g/L");

    let sober = status.effect_end.unwrap();
    assert!(sober > status.at);
    assert!(alcohol.total_concentration(&doses, sober) < 0.2);
    assert_eq!(alcohol.total_concentration(&doses, t0() + Duration::hours(24)), 0.0);
}

#[test]
fn stored_history_drives_the_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doses.json");
    let doses = vec![
        DoseRecord::new(t0(), 400.0, 72.0, "ibuprofen").unwrap(),
        DoseRecord::new(t0() + Duration::hours(6), 400.0, 72.0, "ibuprofen").unwrap(),
    ];
    save_doses(&doses, &path).unwrap();

    let loaded = load_doses(&path).unwrap();
    let ibuprofen = engine(Substance::Ibuprofen);
    let at = t0() + Duration::hours(7);
    assert_eq!(
        ibuprofen.total_concentration(&loaded, at),
        ibuprofen.total_concentration(&doses, at)
    );
}
