use leabra::prelude::*;

#[test]
fn layer_inputs() {
    let mut layer = Layer::with_defaults(3);
    layer.spec().set_option("g_i", 0.0).unwrap();

    for _ in 0..20 {
        layer.add_excitatory(&[0.0, 0.5, 1.0]).unwrap();
        layer.cycle(Phase::Minus);
    }

    for _ in 0..100 {
        layer.add_excitatory(&[0.0, 0.5, 1.0]).unwrap();
        layer.cycle(Phase::Minus);
        let acts = layer.activities();
        assert_eq!(acts[0], 0.0);
        assert!(acts[1] > 0.4 && acts[1] < 1.0, "acts[1] = {}", acts[1]);
        assert!(acts[2] >= acts[1]);
        assert!(acts[2] < 1.0);
    }
    assert_eq!(layer.gc_i, 0.0);
}

#[test]
fn layer_forced() {
    let pattern = [0.0, 0.25, 0.50, 0.75, 1.0];
    let mut layer = Layer::with_defaults(5);
    layer.force_activity(&pattern).unwrap();

    for _ in 0..100 {
        layer.cycle(Phase::Minus);
        assert_eq!(layer.activities(), pattern.to_vec());
    }
    assert_eq!(layer.avg_act, 0.5);
}

#[test]
fn fan_out_must_match_unit_count() {
    let mut layer = Layer::with_defaults(4);
    assert_eq!(
        layer.add_excitatory(&[1.0; 3]),
        Err(LeabraError::LengthMismatch {
            expected: 4,
            actual: 3
        })
    );
    assert_eq!(
        layer.force_activity(&[1.0; 5]),
        Err(LeabraError::LengthMismatch {
            expected: 4,
            actual: 5
        })
    );
    assert!(layer.units().iter().all(|u| u.pending_inputs().is_empty()));
}

#[test]
fn forcing_and_queued_input_exclude_each_other() {
    let mut layer = Layer::with_defaults(2);
    layer.add_excitatory(&[0.5, 0.5]).unwrap();
    assert!(matches!(
        layer.force_activity(&[1.0, 1.0]),
        Err(LeabraError::PendingInputs { pending: 1 })
    ));
    assert!(layer.units().iter().all(|u| !u.is_forced()));

    layer.cycle(Phase::Minus);
    layer.force_activity(&[1.0, 1.0]).unwrap();
    assert_eq!(
        layer.add_excitatory(&[0.5, 0.5]),
        Err(LeabraError::ForcedUnitInput)
    );

    layer.release_activity();
    layer.add_excitatory(&[0.5, 0.5]).unwrap();
}

#[test]
fn trial_init_replays_the_same_trajectory() {
    let spec = LayerSpec::from_options([("lay_inhib", OptionValue::Flag(false))]).unwrap();
    let mut layer = Layer::new(
        4,
        SharedLayerSpec::new(spec),
        SharedUnitSpec::default(),
        Genre::Hidden,
    );
    layer.attach_unit_traces(&UnitField::DEFAULT);

    let drive = |layer: &mut Layer| -> Vec<Vec<f64>> {
        (0..80)
            .map(|t| {
                let x = if t < 40 { 0.6 } else { 0.0 };
                layer.add_excitatory(&[0.0, x, 2.0 * x, 0.3]).unwrap();
                layer.cycle(Phase::Minus);
                layer.activities()
            })
            .collect()
    };

    let first = drive(&mut layer);
    let avg_m: Vec<f64> = layer.units().iter().map(|u| u.avg_m).collect();
    layer.trial_init();

    // transient state is back to construction values, averages are kept
    assert!(layer.units().iter().all(|u| u.act == 0.0 && u.v_m == 0.4));
    assert!(layer.units().iter().all(|u| u.trace().is_some_and(|t| t.is_empty())));
    let kept: Vec<f64> = layer.units().iter().map(|u| u.avg_m).collect();
    assert_eq!(kept, avg_m);

    assert_eq!(drive(&mut layer), first);
    assert_eq!(layer.units()[1].trace().map(|t| t.len()), Some(80));
}

#[test]
fn shared_unit_spec_update_reaches_every_layer() {
    let unit_spec = SharedUnitSpec::default();
    let layer_spec = SharedLayerSpec::default();
    let a = Layer::new(3, layer_spec.clone(), unit_spec.clone(), Genre::Hidden);
    let b = Layer::new(5, layer_spec, unit_spec.clone(), Genre::Output);

    let before = unit_spec.version();
    unit_spec
        .update(|s| {
            s.threshold_mode = ThresholdMode::Neuromodulated;
            s.set_d1(0.5);
            s.set_a1(0.25);
        })
        .unwrap();
    assert_eq!(unit_spec.version(), before + 1);

    for layer in [&a, &b] {
        let spec = layer.unit_spec().read();
        assert_eq!(spec.r_d1, 0.5);
        assert_eq!(spec.effective_act_thr(), leabra::unit::logistic(-0.25));
    }
    assert_eq!(b.units()[0].genre, Genre::Output);
}

#[test]
fn layer_trace_records_inhibition() {
    let mut layer = Layer::with_defaults(3).with_name("hidden");
    layer.attach_trace(&[LayerField::GcI, LayerField::AvgAct]);
    for _ in 0..10 {
        layer.add_excitatory(&[1.0, 1.0, 0.0]).unwrap();
        layer.cycle(Phase::Minus);
    }
    let trace = layer.trace().unwrap();
    assert_eq!(trace.len(), 10);
    let gc_i = trace.by_name("gc_i").unwrap();
    assert_eq!(gc_i[9], layer.gc_i);
    assert!(gc_i.iter().all(|g| g.is_finite() && *g >= 0.0));

    let snap = LayerAdapter::new(&layer).snapshot();
    assert_eq!(snap.name.as_deref(), Some("hidden"));
    assert_eq!(snap.cycle_count, 10);
}

#[test]
fn plus_phase_average_feeds_projection_scale() {
    let spec = LayerSpec::from_options([("avg_act_use_first", OptionValue::Flag(true))]).unwrap();
    let mut src = Layer::new(
        10,
        SharedLayerSpec::new(spec),
        SharedUnitSpec::default(),
        Genre::Input,
    );
    let mut dst = Layer::with_defaults(2);
    let proj = Projection::connect(
        ConnectionId(3),
        &mut src,
        &mut dst,
        ProjectionSpec {
            pattern: Pattern::Full,
            ..ProjectionSpec::default()
        },
    )
    .unwrap();
    assert_eq!(proj.netin_scale(&src), 0.5);

    src.force_activity(&[1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])
        .unwrap();
    src.cycle(Phase::Plus);
    src.end_plus_phase();
    assert!((src.avg_act_p_eff - 0.4).abs() < 1e-12);
    assert_eq!(proj.netin_scale(&src), 0.25);
}

#[test]
fn traced_cycles_progress_while_the_spec_is_updated() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    let unit_spec = SharedUnitSpec::default();
    let mut layer = Layer::new(64, SharedLayerSpec::default(), unit_spec.clone(), Genre::Hidden);
    layer.attach_unit_traces(&UnitField::DEFAULT);

    let done = Arc::new(AtomicBool::new(false));
    let writer = {
        let (handle, done) = (unit_spec.clone(), Arc::clone(&done));
        std::thread::spawn(move || {
            let mut updates = 0u64;
            while !done.load(Ordering::Relaxed) {
                let bias = if updates % 2 == 0 { 0.01 } else { 0.0 };
                handle.update(|s| s.bias = bias).unwrap();
                updates += 1;
                std::thread::yield_now();
            }
            updates
        })
    };

    let inputs = vec![0.5; 64];
    for _ in 0..300 {
        layer.add_excitatory(&inputs).unwrap();
        layer.cycle(Phase::Minus);
    }
    done.store(true, Ordering::Relaxed);
    let updates = writer.join().unwrap();

    assert!(updates > 0);
    assert_eq!(unit_spec.version(), updates);
    for unit in layer.units() {
        let trace = unit.trace().unwrap();
        assert_eq!(trace.len(), 300);
        assert!(trace.by_name("net").unwrap().iter().all(|n| n.is_finite()));
    }
}
