use rand::RngCore;
use rand_distr::{Distribution, Uniform};

use super::common::Settings;
use super::error::Result;
use super::genome::{Gene, GeneKey, Genome, NodeId};
use super::innovation::InnovationContext;

/// Builds the genome every run starts from.
pub trait GenomeFactory: Sync {
    fn create(&self, settings: &Settings, innovations: &InnovationContext, rng: &mut dyn RngCore) -> Result<Genome>;
}

/// Every input wired straight to every output, no hidden nodes.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultGenomeFactory;

impl GenomeFactory for DefaultGenomeFactory {
    fn create(&self, settings: &Settings, innovations: &InnovationContext, rng: &mut dyn RngCore) -> Result<Genome> {
        let between = Uniform::from(-settings.weight_range..settings.weight_range);
        let n_inputs = settings.n_inputs;
        let n_outputs = settings.n_outputs;

        let mut genes = Vec::with_capacity(n_inputs * n_outputs);
        for in_node in 0..n_inputs {
            for out_node in n_inputs..n_inputs + n_outputs {
                let key = GeneKey::new(NodeId(in_node), NodeId(out_node));
                genes.push(Gene::new(innovations.get_innovation_number(key), key, between.sample(rng), true));
            }
        }

        Genome::create(genes, n_inputs, n_outputs)
    }
}
