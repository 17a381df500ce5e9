use leabra::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let result = match args.get(1).map(String::as_str) {
        None | Some("fffb") => run_fffb(),
        Some("unit") => run_unit(),
        Some("config") => {
            show_config();
            Ok(())
        }
        Some("--help" | "-h" | "help") => {
            print_help();
            Ok(())
        }
        Some(other) => {
            eprintln!("Unknown command: {other}");
            print_help();
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn print_help() {
    println!("leabra (rate-coded Leabra units and layers)");
    println!("usage:");
    println!("  cargo run               two-layer FFFB scenario");
    println!("  cargo run -- unit       single unit driven by a step input");
    println!("  cargo run -- config     default parameters");
    println!("  cargo run -- --help");
    println!("set RUST_LOG=leabra=debug for diagnostics");
}

// Clamp [1, 0] x 5 on a source layer for cycles 10..160 and watch the
// destination layer settle under FFFB inhibition.
fn run_fffb() -> Result<(), LeabraError> {
    let mut scenario = Scenario::new(ScenarioConfig::default())?;
    let total = scenario.config().cycles;

    while scenario.cycle_index() < total {
        let t = scenario.cycle_index();
        scenario.step()?;
        if t % 20 == 0 || t + 1 == total {
            let dst = &scenario.dst;
            let on = dst.units()[0].act;
            let off = dst.units()[1].act;
            println!(
                "t={t:3} gc_i={:.4} avg_act={:.4} act[on]={on:.4} act[off]={off:.4} adapt[on]={:.4}",
                dst.gc_i,
                dst.avg_act,
                dst.units()[0].adapt,
            );
        }
    }

    println!();
    print!("{}", scenario.dst);
    Ok(())
}

fn run_unit() -> Result<(), LeabraError> {
    let spec = UnitSpec::from_options([("adapt_on", OptionValue::Flag(true))])?;
    let mut unit = Unit::new(SharedUnitSpec::new(spec), Genre::Hidden);

    for t in 0..200 {
        let input = if (10..160).contains(&t) { 0.3 } else { 0.0 };
        unit.add_excitatory(input)?;
        unit.calculate_net_in();
        unit.cycle(Phase::Minus, 0.0, 1.0);
        if t % 20 == 0 {
            println!(
                "t={t:3} net={:.4} v_m={:.4} v_m_eq={:.4} act={:.4} adapt={:.4}",
                unit.net(),
                unit.v_m,
                unit.v_m_eq,
                unit.act,
                unit.adapt,
            );
        }
    }
    unit.update_avg_l();
    println!("avg_l={:.4} avg_l_lrn={:.6}", unit.avg_l, unit.avg_l_lrn());
    Ok(())
}

fn show_config() {
    println!("UnitSpec");
    print!("{}", UnitSpec::default());
    println!("LayerSpec");
    print!("{}", LayerSpec::default());
}
