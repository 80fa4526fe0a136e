// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Runs a random sparse network for a fixed number of steps and reports
//! engine statistics.
//!
//! Usage: `step_bench --neurons 10000 --fan-in 8 --steps 200 --workers 4`

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use neurostep::config::{load_config, validate_config, ConfigError, NeurostepConfig};
use neurostep::neural::{
    InputFeed, MemoryRecorder, Network, NodeId, SynapseRule, UpdatableNode, UpdateRule,
};
use neurostep::observability::{init_logging, parse_debug_flags, ObservabilityConfig};
use neurostep::update_engine::create_engine;

/// Neurostep step benchmark
#[derive(Parser, Debug)]
#[command(name = "step_bench", version, long_about = None)]
struct Args {
    /// Path to neurostep_configuration.toml (searched for if omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of free neurons
    #[arg(long, default_value_t = 10_000)]
    neurons: u32,

    /// Afferent synapses per neuron
    #[arg(long, default_value_t = 8)]
    fan_in: u32,

    /// Steps to run
    #[arg(long, default_value_t = 100)]
    steps: u64,

    /// Override update_engine.worker_count
    #[arg(long)]
    workers: Option<usize>,

    /// Size of the driven input group (0 = none)
    #[arg(long, default_value_t = 16)]
    input_size: usize,

    /// RNG seed for wiring and input rows
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Crates to log at debug level (comma-separated, or "all")
    #[arg(long, value_delimiter = ',')]
    debug: Vec<String>,
}

fn load(args: &Args) -> Result<NeurostepConfig> {
    let mut overrides = HashMap::new();
    if let Some(workers) = args.workers {
        overrides.insert("worker_count".to_string(), workers.to_string());
    }

    let config = match load_config(args.config.as_deref(), Some(&overrides)) {
        Ok(config) => config,
        Err(ConfigError::FileNotFound(_)) if args.config.is_none() => {
            let mut config = NeurostepConfig::default();
            neurostep::config::apply_environment_overrides(&mut config)?;
            neurostep::config::apply_cli_overrides(&mut config, &overrides)?;
            config
        }
        Err(e) => return Err(e).context("Failed to load configuration"),
    };
    validate_config(&config)?;
    Ok(config)
}

fn build_network(args: &Args, config: &NeurostepConfig, rng: &mut StdRng) -> Result<Arc<Network>> {
    let network = Arc::new(Network::new(config.network.time_step));
    for _ in 0..args.neurons {
        network.add_neuron(UpdateRule::Threshold {
            threshold: 0.5,
            high: 1.0,
            low: 0.0,
        });
    }

    let total = network.neuron_count() as u32;
    for target in 0..total {
        for _ in 0..args.fan_in {
            let source = rng.gen_range(0..total);
            let weight = rng.gen_range(-0.5..1.0);
            network.connect(NodeId(source), NodeId(target), weight, SynapseRule::Static)?;
        }
    }
    Ok(network)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load(&args)?;

    let mut debug_flags = parse_debug_flags();
    for crate_name in &args.debug {
        if crate_name == "all" {
            debug_flags.enable_all();
        } else {
            debug_flags.enable(crate_name);
        }
    }
    let _logging = init_logging(&debug_flags, &ObservabilityConfig::from_config(&config))?;

    let mut rng = StdRng::seed_from_u64(args.seed);
    let network = build_network(&args, &config, &mut rng)?;

    if args.input_size > 0 {
        let rows: Vec<Vec<f64>> = (0..8)
            .map(|_| (0..args.input_size).map(|_| rng.gen_range(0.0..1.0)).collect())
            .collect();
        let inputs = network.add_group("inputs", args.input_size, UpdateRule::Increment { delta: 0.0 });
        inputs.set_input_feed(InputFeed::new(rows)?)?;
        network.fire_group_changed(inputs.id())?;

        let total = network.neuron_count() as u32;
        for neuron in inputs.neurons() {
            let target = rng.gen_range(0..total);
            network.connect(neuron.id(), NodeId(target), 1.0, SynapseRule::Static)?;
        }
    }

    let outputs = network.add_group("outputs", 4, UpdateRule::Linear { slope: 1.0, bias: 0.0 });
    let recorder = MemoryRecorder::new();
    let frames = recorder.frames();
    outputs.set_recorder(Box::new(recorder));
    network.fire_group_changed(outputs.id())?;

    let engine = create_engine(&network, &config.update_engine)?;
    info!(
        "Network ready: {} neurons, {} synapses",
        network.neuron_count(),
        network.synapse_count()
    );

    let started = Instant::now();
    for _ in 0..args.steps {
        if let Err(e) = engine.invoke() {
            warn!("Step failed: {}", e);
            if engine.is_dead() {
                break;
            }
        }
    }
    let elapsed = started.elapsed();

    engine.shutdown();
    if !engine.is_dead() {
        let last = engine.invoke()?;
        info!("Final step {} complete", last.step);
    }

    let stats = engine.stats();
    println!("{}", engine);
    println!(
        "steps: {} ok / {} failed in {:.2?} ({:.1} steps/s)",
        stats.total_steps,
        stats.failed_steps,
        elapsed,
        args.steps as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    println!(
        "avg nodes/step: {:.0}, avg edges/node: {:.2}, avg step time: {:.0}us",
        stats.avg_nodes_per_step(),
        stats.avg_edges_per_node(),
        stats.avg_processing_time_us()
    );
    println!("output frames recorded: {}", frames.lock().len());
    println!("engine phase: {:?}", engine.phase());
    Ok(())
}
