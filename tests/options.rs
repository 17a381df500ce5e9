use leabra::prelude::*;

#[test]
fn unknown_names_fail_fast() {
    for name in ["gi", "tau", "act_thresh", ""] {
        assert!(matches!(
            UnitSpec::from_options([(name, 1.0)]),
            Err(LeabraError::UnknownOption { spec: "UnitSpec", .. })
        ));
        assert!(matches!(
            LayerSpec::from_options([(name, 1.0)]),
            Err(LeabraError::UnknownOption { spec: "LayerSpec", .. })
        ));
    }
}

#[test]
fn every_unit_option_round_trips() {
    let defaults = UnitSpec::default();
    let options: Vec<(&str, OptionValue)> = defaults.options();
    assert_eq!(options.len(), UnitSpec::OPTION_NAMES.len());

    let rebuilt = UnitSpec::from_options(options.iter().copied()).unwrap();
    for (name, value) in &options {
        assert_eq!(rebuilt.get_option(name), Some(*value), "{name}");
    }
}

#[test]
fn every_layer_option_round_trips() {
    let spec = LayerSpec::from_options([
        ("g_i", OptionValue::Number(0.4)),
        ("fb", OptionValue::Number(0.5)),
        ("lay_inhib", OptionValue::Flag(false)),
        ("trial_decay", OptionValue::Number(0.25)),
    ])
    .unwrap();
    assert_eq!(spec.get_option("g_i"), Some(OptionValue::Number(0.4)));
    assert_eq!(spec.get_option("fb"), Some(OptionValue::Number(0.5)));
    assert_eq!(spec.get_option("lay_inhib"), Some(OptionValue::Flag(false)));
    assert_eq!(spec.get_option("trial_decay"), Some(OptionValue::Number(0.25)));
    assert_eq!(spec.options().len(), LayerSpec::OPTION_NAMES.len());
}

#[test]
fn out_of_range_values_are_rejected() {
    assert!(matches!(
        UnitSpec::from_options([("tau_v_m", -1.0)]),
        Err(LeabraError::InvalidOption { name: "tau_v_m", .. })
    ));
    assert!(LayerSpec::from_options([("trial_decay", 1.5)]).is_err());
    assert!(LayerSpec::from_options([("fb_dt", f64::INFINITY)]).is_err());
    assert!(matches!(
        LayerSpec::from_options([("lay_inhib", 1.0)]),
        Err(LeabraError::OptionType { .. })
    ));
}

#[test]
fn failed_update_leaves_shared_spec_untouched() {
    let handle = SharedUnitSpec::default();
    let unit = Unit::new(handle.clone(), Genre::Hidden);

    assert!(handle.set_option("tau_net", 0.0).is_err());
    assert!(handle.set_option("no_such_option", 1.0).is_err());
    assert_eq!(handle.version(), 0);
    assert_eq!(unit.spec().read().tau_net, 1.4);

    handle.set_option("act_gain", 40.0).unwrap();
    assert_eq!(handle.version(), 1);
    assert_eq!(unit.spec().read().act_gain, 40.0);
}

#[test]
fn table_follows_parameter_changes() {
    let handle = SharedUnitSpec::default();
    let before = handle.read().activation_table().len();
    assert_eq!(handle.read().activation_table().act_sd(), 0.01);

    handle.set_option("act_sd", 0.02).unwrap();
    let spec = handle.read();
    let table = spec.activation_table();
    assert_eq!(table.act_sd(), 0.02);
    // a wider noise range widens the sampled domain
    assert!(table.len() > before);
}

#[cfg(feature = "serde")]
mod json {
    use super::*;

    #[test]
    fn options_from_json() {
        let spec = UnitSpec::from_json(r#"{"act_gain": 40, "adapt_on": true, "g_bar_l": 0.3}"#)
            .unwrap();
        assert_eq!(spec.act_gain, 40.0);
        assert!(spec.adapt_on);
        assert_eq!(spec.g_bar_l, 0.3);

        assert!(matches!(
            LayerSpec::from_json(r#"{"gi": 0.4}"#),
            Err(LeabraError::UnknownOption { .. })
        ));
        assert!(matches!(
            LayerSpec::from_json("not json"),
            Err(LeabraError::Config(_))
        ));
    }

    #[test]
    fn specs_deserialize_with_defaults() {
        let spec: LayerSpec = serde_json::from_str(r#"{"g_i": 0.4, "ff": 1.0}"#).unwrap();
        assert_eq!(spec.g_i, 0.4);
        assert_eq!(spec.ff0, 0.1);
        assert!(serde_json::from_str::<LayerSpec>(r#"{"gi": 0.4}"#).is_err());

        let unit: UnitSpec = serde_json::from_str(r#"{"threshold_mode": "Neuromodulated"}"#).unwrap();
        assert_eq!(unit.threshold_mode, ThresholdMode::Neuromodulated);
        assert_eq!(unit.act_thr, 0.5);
    }
}
