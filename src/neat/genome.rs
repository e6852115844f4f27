use std::fmt;

use itertools::Itertools;
use rand::Rng;
use rustc_hash::{FxBuildHasher, FxHashSet};

use super::common::{Activation, Settings};
use super::error::{NeatError, Result};
use super::innovation::{InnovationContext, InnovationNumber};
use super::mutation;
use super::network::Network;
use super::population::FitnessTask;
use super::vector::{align_sorted, AlignedPair, FxIndexMap};

#[derive(PartialEq, PartialOrd, Ord, Clone, Copy, Eq, Hash, Debug)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn inc(self) -> NodeId {
        NodeId(self.0 + 1)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(PartialEq, PartialOrd, Ord, Clone, Copy, Eq, Hash, Debug)]
pub struct SpeciesId(pub usize);

#[derive(Hash, Eq, PartialEq, PartialOrd, Ord, Clone, Copy, Debug)]
pub struct GeneKey {
    pub in_node_id: NodeId,
    pub out_node_id: NodeId,
}

impl GeneKey {
    pub fn new(in_node_id: NodeId, out_node_id: NodeId) -> GeneKey {
        GeneKey {
            in_node_id,
            out_node_id,
        }
    }
}

/// A single connection. The innovation number and the endpoints never change once created.
#[derive(Clone, Debug, PartialEq)]
pub struct Gene {
    innovation: InnovationNumber,
    key: GeneKey,
    pub weight: f64,
    pub enabled: bool,
}

impl Gene {
    pub fn new(innovation: InnovationNumber, key: GeneKey, weight: f64, enabled: bool) -> Gene {
        Gene {
            innovation,
            key,
            weight,
            enabled,
        }
    }

    pub fn create(innovation: usize, in_node_id: usize, out_node_id: usize, weight: f64, enabled: bool) -> Gene {
        Gene::new(
            InnovationNumber(innovation),
            GeneKey::new(NodeId(in_node_id), NodeId(out_node_id)),
            weight,
            enabled,
        )
    }

    pub fn innovation(&self) -> InnovationNumber {
        self.innovation
    }

    pub fn key(&self) -> GeneKey {
        self.key
    }

    pub fn in_node_id(&self) -> NodeId {
        self.key.in_node_id
    }

    pub fn out_node_id(&self) -> NodeId {
        self.key.out_node_id
    }
}

/// An individual: connection genes ordered by innovation number plus the fixed input and
/// output nodes. Reading the fitness freezes the genome.
#[derive(Clone, Debug)]
pub struct Genome {
    genes: FxIndexMap<InnovationNumber, Gene>,
    input_nodes: Vec<NodeId>,
    output_nodes: Vec<NodeId>,
    species: Option<SpeciesId>,
    fitness: Option<f64>,
}

impl Genome {
    pub fn new(input_nodes: Vec<NodeId>, output_nodes: Vec<NodeId>) -> Result<Genome> {
        let mut seen = FxHashSet::default();
        for &node in input_nodes.iter().chain(output_nodes.iter()) {
            if !seen.insert(node) {
                return Err(NeatError::DuplicateNode(node));
            }
        }

        Ok(Genome {
            genes: FxIndexMap::default(),
            input_nodes,
            output_nodes,
            species: None,
            fitness: None,
        })
    }

    /// Inputs are numbered `0..n_inputs`, outputs follow directly after.
    pub fn create(genes: Vec<Gene>, n_inputs: usize, n_outputs: usize) -> Result<Genome> {
        let input_nodes = (0..n_inputs).map(NodeId).collect_vec();
        let output_nodes = (n_inputs..n_inputs + n_outputs).map(NodeId).collect_vec();
        let mut genome = Genome::new(input_nodes, output_nodes)?;
        for gene in genes {
            genome.add_gene(gene)?;
        }
        Ok(genome)
    }

    pub fn iter(&self) -> indexmap::map::Values<'_, InnovationNumber, Gene> {
        self.genes.values()
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn get(&self, innovation: InnovationNumber) -> Option<&Gene> {
        self.genes.get(&innovation)
    }

    pub fn has_gene(&self, innovation: InnovationNumber) -> bool {
        self.genes.contains_key(&innovation)
    }

    pub fn has_connection(&self, key: GeneKey) -> bool {
        self.genes.values().any(|gene| gene.key == key)
    }

    pub fn input_nodes(&self) -> &[NodeId] {
        &self.input_nodes
    }

    pub fn output_nodes(&self) -> &[NodeId] {
        &self.output_nodes
    }

    pub fn is_input_node(&self, node: NodeId) -> bool {
        self.input_nodes.contains(&node)
    }

    pub fn is_output_node(&self, node: NodeId) -> bool {
        self.output_nodes.contains(&node)
    }

    pub fn is_hidden_node(&self, node: NodeId) -> bool {
        !self.is_input_node(node) && !self.is_output_node(node)
    }

    /// Every node mentioned by a gene, ascending.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.genes
            .values()
            .flat_map(|gene| [gene.in_node_id(), gene.out_node_id()])
            .sorted()
            .dedup()
            .collect()
    }

    pub fn hidden_nodes(&self) -> Vec<NodeId> {
        self.nodes().into_iter().filter(|&node| self.is_hidden_node(node)).collect()
    }

    pub fn highest_node(&self) -> NodeId {
        self.genes
            .values()
            .flat_map(|gene| [gene.in_node_id(), gene.out_node_id()])
            .chain(self.input_nodes.iter().copied())
            .chain(self.output_nodes.iter().copied())
            .max()
            .unwrap_or(NodeId(0))
    }

    pub fn highest_innovation(&self) -> Result<InnovationNumber> {
        self.genes.keys().last().copied().ok_or(NeatError::EmptyGenome)
    }

    pub fn enabled_connections(&self) -> usize {
        self.genes.values().filter(|gene| gene.enabled).count()
    }

    pub fn species(&self) -> Option<SpeciesId> {
        self.species
    }

    pub fn set_species(&mut self, species: SpeciesId) -> Result<()> {
        self.ensure_mutable("set_species")?;
        self.species = Some(species);
        Ok(())
    }

    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    pub fn is_frozen(&self) -> bool {
        self.fitness.is_some()
    }

    pub(crate) fn ensure_mutable(&self, operation: &'static str) -> Result<()> {
        if self.is_frozen() {
            Err(NeatError::GenomeFrozen { operation })
        } else {
            Ok(())
        }
    }

    /// Runs the fitness task once and caches the result; later calls return the cached value.
    pub fn evaluate<T: FitnessTask + ?Sized>(&mut self, task: &T, activation: Activation) -> Result<f64> {
        if let Some(fitness) = self.fitness {
            return Ok(fitness);
        }
        let fitness = task.evaluate(&self.network(activation)).map_err(NeatError::Task)?;
        self.fitness = Some(fitness);
        Ok(fitness)
    }

    pub fn network(&self, activation: Activation) -> Network<'_> {
        Network::new(self, activation)
    }

    pub fn calculate(&self, inputs: &[f64], activation: Activation) -> Result<Vec<f64>> {
        self.network(activation).activate(inputs)
    }

    pub fn add_gene(&mut self, gene: Gene) -> Result<()> {
        self.ensure_mutable("add_gene")?;
        if self.genes.contains_key(&gene.innovation) {
            return Err(NeatError::DuplicateInnovation(gene.innovation));
        }

        let out_of_order = self.genes.keys().last().is_some_and(|&last| last > gene.innovation);
        self.genes.insert(gene.innovation, gene);
        if out_of_order {
            self.genes.sort_keys();
        }
        Ok(())
    }

    /// Adds a copy of a gene taken from one of two parents. When the parents disagree on
    /// whether the gene is enabled, the copy is disabled with `gene_disable_chance`.
    pub fn add_inherited_gene<R: Rng>(&mut self, gene: &Gene, parents: (&Genome, &Genome), rng: &mut R, settings: &Settings) -> Result<()> {
        let mut gene = gene.clone();
        let (parent_1, parent_2) = parents;
        if let (Some(gene_1), Some(gene_2)) = (parent_1.get(gene.innovation), parent_2.get(gene.innovation)) {
            if gene_1.enabled != gene_2.enabled {
                gene.enabled = !rng.gen_bool(settings.gene_disable_chance);
            }
        }
        self.add_gene(gene)
    }

    pub(crate) fn gene_mut(&mut self, innovation: InnovationNumber) -> Option<&mut Gene> {
        self.genes.get_mut(&innovation)
    }

    pub(crate) fn genes_mut(&mut self) -> indexmap::map::ValuesMut<'_, InnovationNumber, Gene> {
        self.genes.values_mut()
    }

    /// Deep copy that keeps species and node lists but not the cached fitness, so the copy
    /// can be mutated.
    pub fn offspring(&self) -> Genome {
        Genome {
            fitness: None,
            ..self.clone()
        }
    }

    pub fn mutate<R: Rng>(&mut self, rng: &mut R, settings: &Settings, innovations: &InnovationContext) -> Result<()> {
        mutation::mutate(self, rng, settings, innovations)
    }

    pub fn distance(&self, other: &Genome, settings: &Settings) -> Result<f64> {
        let self_len = self.highest_innovation()?;
        let other_len = other.highest_innovation()?;
        let longest = if self_len > other_len { self } else { other };
        let shortest_len = std::cmp::min(self_len, other_len);

        let mut excess_count = 0;
        let mut disjoint_count = 0;
        let mut matching_count = 0;
        let mut total_weight_diff = 0.;

        align_sorted(&self.genes, &other.genes, |&innovation, pair| match pair {
            AlignedPair::HasBoth(left, right) => {
                matching_count += 1;
                total_weight_diff += (left.weight - right.weight).abs();
            }
            AlignedPair::HasLeft(_) | AlignedPair::HasRight(_) => {
                if innovation <= shortest_len {
                    disjoint_count += 1;
                } else {
                    excess_count += 1;
                }
            }
        });

        let avg_weight_diff = if matching_count == 0 {
            0.
        } else {
            total_weight_diff / matching_count as f64
        };
        let n = longest.len() as f64;
        let excess_term = settings.excess_coefficient * excess_count as f64 / n;
        let disjoint_term = settings.disjoint_coefficient * disjoint_count as f64 / n;
        let weight_term = settings.weight_coefficient * avg_weight_diff;
        Ok(excess_term + disjoint_term + weight_term)
    }

    /// Crosses two evaluated genomes of the same species; the fitter one dominates.
    pub fn cross<R: Rng>(a: &Genome, b: &Genome, rng: &mut R, settings: &Settings, innovations: &InnovationContext) -> Result<Genome> {
        let a_fitness = a.fitness.ok_or(NeatError::NotEvaluated)?;
        let b_fitness = b.fitness.ok_or(NeatError::NotEvaluated)?;
        if a_fitness > b_fitness {
            Genome::cross_dominant(a, b, rng, settings, innovations)
        } else {
            Genome::cross_dominant(b, a, rng, settings, innovations)
        }
    }

    /// The child carries exactly the dominant parent's innovation numbers; shared genes take
    /// either parent's allele. The child is mutated and has no species yet.
    pub fn cross_dominant<R: Rng>(dominant: &Genome, other: &Genome, rng: &mut R, settings: &Settings, innovations: &InnovationContext) -> Result<Genome> {
        if dominant.species.is_none() || dominant.species != other.species {
            return Err(NeatError::SpeciesMismatch);
        }
        if dominant.is_empty() || other.is_empty() {
            return Err(NeatError::EmptyGenome);
        }

        let mut child = Genome {
            genes: FxIndexMap::with_capacity_and_hasher(dominant.len(), FxBuildHasher),
            input_nodes: dominant.input_nodes.clone(),
            output_nodes: dominant.output_nodes.clone(),
            species: None,
            fitness: None,
        };

        for gene in dominant.iter() {
            match other.get(gene.innovation) {
                Some(other_gene) => {
                    let chosen = if rng.gen_bool(0.5) { gene } else { other_gene };
                    child.add_inherited_gene(chosen, (dominant, other), rng, settings)?;
                }
                None => child.add_gene(gene.clone())?,
            }
        }

        child.mutate(rng, settings, innovations)?;
        Ok(child)
    }
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for gene in self.genes.values() {
            write!(
                f,
                "[ {} , {} , {} , {:.4} {} ] ",
                gene.innovation, gene.key.in_node_id, gene.key.out_node_id, gene.weight, gene.enabled
            )?;
        }
        Ok(())
    }
}
