use std::sync::atomic::Ordering;

use log::info;
use neat_engine::neat::common::Settings;
use neat_engine::neat::error::{NeatError, TaskError};
use neat_engine::neat::evolution::Evolution;
use neat_engine::neat::factory::DefaultGenomeFactory;
use neat_engine::neat::network::Network;

const MAX_GENERATIONS: usize = 300;
const SOLVED: f64 = 3.9;

// third input is a constant bias
const XOR_CASES: [([f64; 3], f64); 4] = [
    ([0.0, 0.0, 1.0], 0.0),
    ([0.0, 1.0, 1.0], 1.0),
    ([1.0, 0.0, 1.0], 1.0),
    ([1.0, 1.0, 1.0], 0.0),
];

fn xor_fitness(network: &Network<'_>) -> Result<f64, TaskError> {
    let mut acc = 0.0;
    for (inputs, expected) in XOR_CASES.iter() {
        let output = network.activate(inputs)?;
        acc += (output[0] - expected).powi(2);
    }
    Ok(4.0 - acc)
}

fn main() -> Result<(), NeatError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings {
        population: 150,
        ..Settings::standard(3, 1)
    };
    let activation = settings.activation;
    let mut evolution = Evolution::new(settings, xor_fitness, &DefaultGenomeFactory)?;
    let stop = evolution.stop_handle();
    let mut generation = 0;

    let champion = evolution.run(|network| {
        generation += 1;
        let fitness = network.genome().fitness().unwrap_or(f64::NEG_INFINITY);
        if fitness >= SOLVED || generation >= MAX_GENERATIONS {
            stop.store(false, Ordering::SeqCst);
        }
    })?;

    if let Some(champion) = champion {
        info!("best genome: {}", champion);
        for (inputs, expected) in XOR_CASES.iter() {
            let output = champion.calculate(inputs, activation)?;
            info!("{:?} -> {:.3} (expected {})", &inputs[..2], output[0], expected);
        }
    }
    Ok(())
}

