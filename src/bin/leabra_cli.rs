//! JSON-driven runner for the two-layer scenario.
//!
//! Examples:
//!   leabra-cli                          default scenario, summary
//!   leabra-cli run scenario.json        scenario from a config file
//!   leabra-cli trace scenario.json      destination unit traces as JSON
//!   leabra-cli snapshot                 final state of both layers as JSON
//!   leabra-cli defaults                 default scenario config as JSON
//!
//! A config file holds any subset of the scenario fields, e.g.
//! `{"cycles": 100, "unit": {"act_gain": 60}, "layer": {"g_i": 1.0}}`.

use std::fs;
use std::process;

use leabra::error::LeabraError;
use leabra::observer::{NamedSeries, UnitSnapshot};
use leabra::scenario::{Scenario, ScenarioConfig};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize)]
struct Summary {
    cycles: usize,
    dst_gc_i: f64,
    dst_avg_act: f64,
    dst_activities: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct UnitTraceOut {
    unit: usize,
    trace: NamedSeries,
}

fn usage() -> ! {
    eprintln!("leabra-cli (two-layer FFFB scenario runner)");
    eprintln!("Usage: leabra-cli <command> [config.json]\n");
    eprintln!("Commands:");
    eprintln!("  run [file]        Run and print a summary (default)");
    eprintln!("  trace [file]      Run and print destination unit traces");
    eprintln!("  snapshot [file]   Run and print both layers' final state");
    eprintln!("  defaults          Print the default scenario config");
    process::exit(1);
}

fn load_config(path: Option<&String>) -> Result<ScenarioConfig, LeabraError> {
    match path {
        None => Ok(ScenarioConfig::default()),
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| LeabraError::Config(format!("{path}: {e}")))?;
            ScenarioConfig::from_json(&text)
        }
    }
}

fn run(config: ScenarioConfig) -> Result<Scenario, LeabraError> {
    let mut scenario = Scenario::new(config)?;
    scenario.run()?;
    Ok(scenario)
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("serialize: {e}");
            process::exit(1);
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cmd = args.first().map(String::as_str).unwrap_or("run");

    let outcome = match cmd {
        "defaults" => {
            print_json(&ScenarioConfig::default());
            Ok(())
        }
        "run" => load_config(args.get(1)).and_then(run).map(|s| {
            print_json(&Summary {
                cycles: s.cycle_index(),
                dst_gc_i: s.dst.gc_i,
                dst_avg_act: s.dst.avg_act,
                dst_activities: s.dst.activities(),
            })
        }),
        "trace" => load_config(args.get(1)).and_then(run).map(|s| {
            let traces: Vec<UnitTraceOut> = s
                .snapshot()
                .dst
                .units
                .into_iter()
                .enumerate()
                .filter_map(|(unit, snap): (usize, UnitSnapshot)| {
                    snap.trace.map(|trace| UnitTraceOut { unit, trace })
                })
                .collect();
            print_json(&traces)
        }),
        "snapshot" => load_config(args.get(1))
            .and_then(run)
            .map(|s| print_json(&s.snapshot())),
        "--help" | "-h" | "help" => usage(),
        _ => usage(),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
