use log::trace;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Uniform};

use super::common::Settings;
use super::error::Result;
use super::genome::{Gene, GeneKey, Genome, NodeId};
use super::graph::creates_cycle;
use super::innovation::InnovationContext;

pub const MAX_CONNECTION_ATTEMPTS: usize = 40;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutation {
    AddNode,
    AddConnection,
    ModifyWeight,
}

impl Mutation {
    pub const ALL: [Mutation; 3] = [Mutation::AddNode, Mutation::AddConnection, Mutation::ModifyWeight];

    pub fn rate(self, settings: &Settings) -> f64 {
        match self {
            Mutation::AddNode => settings.mutate_add_node_rate,
            Mutation::AddConnection => settings.mutate_add_connection_rate,
            Mutation::ModifyWeight => settings.mutate_weight_rate,
        }
    }

    pub fn apply<R: Rng>(self, genome: &mut Genome, rng: &mut R, settings: &Settings, innovations: &InnovationContext) -> Result<()> {
        match self {
            Mutation::AddNode => add_node(genome, rng, innovations),
            Mutation::AddConnection => add_connection(genome, rng, settings, innovations),
            Mutation::ModifyWeight => modify_weight(genome, rng, settings),
        }
    }
}

/// Runs each operator once, in order, gated by its own rate.
pub fn mutate<R: Rng>(genome: &mut Genome, rng: &mut R, settings: &Settings, innovations: &InnovationContext) -> Result<()> {
    genome.ensure_mutable("mutate")?;
    let between = Uniform::from(0.0..1.0);
    for mutation in Mutation::ALL {
        if between.sample(rng) < mutation.rate(settings) {
            mutation.apply(genome, rng, settings, innovations)?;
        }
    }
    Ok(())
}

/// Splits a random enabled connection `a -> b` into `a -> new -> b`. The old gene stays, disabled.
pub fn add_node<R: Rng>(genome: &mut Genome, rng: &mut R, innovations: &InnovationContext) -> Result<()> {
    genome.ensure_mutable("add_node")?;
    let enabled = genome.iter().filter(|gene| gene.enabled).map(Gene::innovation).collect::<Vec<_>>();
    let Some(&split) = enabled.choose(rng) else {
        return Ok(());
    };

    let new_node = genome.highest_node().inc();
    let (key, weight) = match genome.gene_mut(split) {
        Some(gene) => {
            gene.enabled = false;
            (gene.key(), gene.weight)
        }
        None => return Ok(()),
    };

    let in_key = GeneKey::new(key.in_node_id, new_node);
    let out_key = GeneKey::new(new_node, key.out_node_id);
    genome.add_gene(Gene::new(innovations.get_innovation_number(in_key), in_key, 1.0, true))?;
    genome.add_gene(Gene::new(innovations.get_innovation_number(out_key), out_key, weight, true))?;
    Ok(())
}

/// Tries up to `MAX_CONNECTION_ATTEMPTS` random pairs and adds the first one that is new and
/// keeps the network acyclic.
pub fn add_connection<R: Rng>(genome: &mut Genome, rng: &mut R, settings: &Settings, innovations: &InnovationContext) -> Result<()> {
    genome.ensure_mutable("add_connection")?;
    let hidden = genome.hidden_nodes();
    let sources: Vec<NodeId> = genome.input_nodes().iter().chain(hidden.iter()).copied().collect();
    let targets: Vec<NodeId> = hidden.iter().chain(genome.output_nodes().iter()).copied().collect();

    for _ in 0..MAX_CONNECTION_ATTEMPTS {
        let Some((from, to)) = sample_pair(&sources, &targets, rng) else {
            continue;
        };
        let key = GeneKey::new(from, to);
        if genome.has_connection(key) || creates_cycle(genome, from, to) {
            continue;
        }

        let weight = rng.gen_range(-settings.weight_range..settings.weight_range);
        return genome.add_gene(Gene::new(innovations.get_innovation_number(key), key, weight, true));
    }

    trace!("no new connection found after {} attempts", MAX_CONNECTION_ATTEMPTS);
    Ok(())
}

/// Random `from` among `sources`, then a random `to` among the `targets` other than `from`.
fn sample_pair<R: Rng>(sources: &[NodeId], targets: &[NodeId], rng: &mut R) -> Option<(NodeId, NodeId)> {
    let &from = sources.choose(rng)?;
    let candidates: Vec<NodeId> = targets.iter().copied().filter(|&to| to != from).collect();
    let &to = candidates.choose(rng)?;
    Some((from, to))
}

pub fn modify_weight<R: Rng>(genome: &mut Genome, rng: &mut R, settings: &Settings) -> Result<()> {
    if rng.gen_bool(settings.mutate_weight_random_rate) {
        randomize_weights(genome, rng, settings.weight_range)
    } else {
        genome.ensure_mutable("modify_weight")?;
        let disturbance = settings.mutate_weight_disturbance;
        if disturbance > 0.0 {
            let delta = Uniform::new_inclusive(-disturbance, disturbance);
            for gene in genome.genes_mut() {
                gene.weight += delta.sample(rng);
            }
        }
        Ok(())
    }
}

/// Replaces every weight with a fresh draw from `-range..range`.
pub fn randomize_weights<R: Rng>(genome: &mut Genome, rng: &mut R, range: f64) -> Result<()> {
    genome.ensure_mutable("randomize_weights")?;
    let between = Uniform::from(-range..range);
    for gene in genome.genes_mut() {
        gene.weight = between.sample(rng);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neat::graph::Graph;
    use crate::neat::innovation::InnovationNumber;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn fully_connected(n_inputs: usize, n_outputs: usize, innovations: &InnovationContext) -> Genome {
        let mut genes = Vec::new();
        for out in n_inputs..n_inputs + n_outputs {
            for input in 0..n_inputs {
                let key = GeneKey::new(NodeId(input), NodeId(out));
                genes.push(Gene::new(innovations.get_innovation_number(key), key, 0.5, true));
            }
        }
        Genome::create(genes, n_inputs, n_outputs).unwrap()
    }

    #[test]
    fn test_add_node() {
        let innovations = InnovationContext::default();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let mut genome = fully_connected(2, 1, &innovations);
        let n_genes = genome.len();
        let n_nodes = genome.nodes().len();

        add_node(&mut genome, &mut rng, &innovations).unwrap();

        assert_eq!(genome.len(), n_genes + 2);
        assert_eq!(genome.nodes().len(), n_nodes + 1);
        assert_eq!(genome.hidden_nodes(), vec![NodeId(3)]);

        let disabled = genome.iter().filter(|g| !g.enabled).collect::<Vec<_>>();
        assert_eq!(disabled.len(), 1);
        let split = disabled[0];
        let into = genome.iter().find(|g| g.key() == GeneKey::new(split.in_node_id(), NodeId(3))).unwrap();
        let out_of = genome.iter().find(|g| g.key() == GeneKey::new(NodeId(3), split.out_node_id())).unwrap();
        assert_eq!(into.weight, 1.0);
        assert_eq!(out_of.weight, split.weight);
        assert!(into.innovation() > InnovationNumber(2));
        assert!(out_of.innovation() > InnovationNumber(2));
    }

    #[test]
    fn test_add_node_without_enabled_gene() {
        let innovations = InnovationContext::default();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let mut genome = Genome::create(vec![Gene::create(1, 0, 1, 1.0, false)], 1, 1).unwrap();
        add_node(&mut genome, &mut rng, &innovations).unwrap();
        assert_eq!(genome.len(), 1);
    }

    #[test]
    fn test_add_connection_stays_acyclic() {
        let innovations = InnovationContext::default();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(17);
        let mut genome = fully_connected(2, 1, &innovations);

        for round in 0..200 {
            if round % 3 == 0 {
                add_node(&mut genome, &mut rng, &innovations).unwrap();
            }
            add_connection(&mut genome, &mut rng, &Settings::standard(2, 1), &innovations).unwrap();

            assert!(genome.iter().all(|g| g.in_node_id() != g.out_node_id()));
            assert!(!Graph::from_genome(&genome).has_cycle_from(genome.nodes()));
            let mut keys = genome.iter().map(|g| g.key()).collect::<Vec<_>>();
            let n = keys.len();
            keys.sort();
            keys.dedup();
            assert_eq!(keys.len(), n);
        }
        // the network must still be evaluable
        genome.calculate(&[1.0, 1.0], Settings::standard(2, 1).activation).unwrap();
    }

    #[test]
    fn test_add_connection_exhausted() {
        let innovations = InnovationContext::default();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let mut genome = fully_connected(2, 1, &innovations);
        let before = genome.clone();

        add_connection(&mut genome, &mut rng, &Settings::standard(2, 1), &innovations).unwrap();
        assert!(genome.iter().eq(before.iter()));
    }

    #[test]
    fn test_random_weights_in_range() {
        let settings = Settings {
            mutate_weight_random_rate: 1.0,
            weight_range: 0.5,
            ..Settings::standard(3, 2)
        };
        let innovations = InnovationContext::default();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(9);
        let mut genome = fully_connected(3, 2, &innovations);
        for gene in genome.genes_mut() {
            gene.weight = 100.0;
        }

        modify_weight(&mut genome, &mut rng, &settings).unwrap();
        assert!(genome.iter().all(|g| g.weight.abs() <= 0.5));
    }

    #[test]
    fn test_perturbed_weights_bounded() {
        let settings = Settings {
            mutate_weight_random_rate: 0.0,
            mutate_weight_disturbance: 0.1,
            ..Settings::standard(3, 2)
        };
        let innovations = InnovationContext::default();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(9);
        let mut genome = fully_connected(3, 2, &innovations);

        modify_weight(&mut genome, &mut rng, &settings).unwrap();
        assert!(genome.iter().all(|g| (g.weight - 0.5).abs() <= 0.1 + 1e-12));
    }

    #[test]
    fn test_mutate_rates_zero() {
        let settings = Settings {
            mutate_add_node_rate: 0.0,
            mutate_add_connection_rate: 0.0,
            mutate_weight_rate: 0.0,
            ..Settings::standard(2, 1)
        };
        let innovations = InnovationContext::default();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        let mut genome = fully_connected(2, 1, &innovations);
        let before = genome.clone();
        mutate(&mut genome, &mut rng, &settings, &innovations).unwrap();
        assert!(genome.iter().eq(before.iter()));
    }

    #[test]
    fn test_same_split_same_innovation() {
        let innovations = InnovationContext::default();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
        let mut a = fully_connected(1, 1, &innovations);
        let mut b = a.clone();
        add_node(&mut a, &mut rng, &innovations).unwrap();
        add_node(&mut b, &mut rng, &innovations).unwrap();
        let numbers = |g: &Genome| g.iter().map(|gene| gene.innovation()).collect::<Vec<_>>();
        assert_eq!(numbers(&a), numbers(&b));
    }

    #[test]
    fn test_sample_pair_skips_source() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(8);
        let sources = [NodeId(2)];
        let targets = [NodeId(2), NodeId(1)];
        for _ in 0..200 {
            assert_eq!(sample_pair(&sources, &targets, &mut rng), Some((NodeId(2), NodeId(1))));
        }
        assert_eq!(sample_pair(&sources, &[NodeId(2)], &mut rng), None);
        assert_eq!(sample_pair(&[], &targets, &mut rng), None);
    }

    #[test]
    fn test_add_connection_from_hidden_node() {
        // 0 -> 2 -> 1 with hidden node 2; the one free connection is 0 -> 1
        let mut genome = Genome::create(vec![
            Gene::create(1, 0, 2, 1.0, true),
            Gene::create(2, 2, 1, 1.0, true),
        ], 1, 1).unwrap();
        let innovations = InnovationContext::default();
        innovations.get_innovation_number(GeneKey::new(NodeId(0), NodeId(2)));
        innovations.get_innovation_number(GeneKey::new(NodeId(2), NodeId(1)));
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(12);

        add_connection(&mut genome, &mut rng, &Settings::standard(1, 1), &innovations).unwrap();
        assert_eq!(genome.len(), 3);
        assert!(genome.has_connection(GeneKey::new(NodeId(0), NodeId(1))));
        assert!(genome.iter().all(|g| g.in_node_id() != g.out_node_id()));
    }
}
