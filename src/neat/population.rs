use rand::Rng;
use rayon::prelude::*;

use super::common::{Activation, Settings};
use super::error::{Result, TaskError};
use super::genome::{Genome, SpeciesId};
use super::innovation::InnovationContext;
use super::network::Network;
use super::species::Species;

/// Scores a network. Called from many threads at once, one genome per call.
pub trait FitnessTask: Sync {
    fn evaluate(&self, network: &Network<'_>) -> std::result::Result<f64, TaskError>;
}

impl<F> FitnessTask for F
where
    F: Fn(&Network<'_>) -> std::result::Result<f64, TaskError> + Sync,
{
    fn evaluate(&self, network: &Network<'_>) -> std::result::Result<f64, TaskError> {
        self(network)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Population {
    species: Vec<Species>,
    next_species_id: usize,
}

impl Population {
    pub fn new() -> Population {
        Population::default()
    }

    pub fn species(&self) -> &[Species] {
        &self.species
    }

    pub(crate) fn species_mut(&mut self) -> &mut Vec<Species> {
        &mut self.species
    }

    /// Total number of genomes over all species.
    pub fn len(&self) -> usize {
        self.species.iter().map(Species::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.species.iter().all(Species::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Genome> {
        self.species.iter().flat_map(|s| s.members().iter())
    }

    /// First-fit: the genome joins the first species, in creation order, whose representative is
    /// close enough. Otherwise it founds a new species and becomes its representative.
    pub fn add_genome(&mut self, genome: Genome, settings: &Settings) -> Result<SpeciesId> {
        for species in self.species.iter_mut() {
            if species.is_compatible(&genome, settings)? {
                species.add(genome)?;
                return Ok(species.id());
            }
        }

        let id = SpeciesId(self.next_species_id);
        self.next_species_id += 1;
        let mut genome = genome;
        genome.set_species(id)?;
        let mut species = Species::new(id, genome.clone());
        species.add(genome)?;
        self.species.push(species);
        Ok(id)
    }

    /// The fittest evaluated genome. On a tie the one found first wins.
    pub fn best_performing(&self) -> Option<&Genome> {
        let mut best: Option<(&Genome, f64)> = None;
        for genome in self.iter() {
            if let Some(fitness) = genome.fitness() {
                if best.map_or(true, |(_, best_fitness)| fitness > best_fitness) {
                    best = Some((genome, fitness));
                }
            }
        }
        best.map(|(genome, _)| genome)
    }

    pub fn cross_and_add<R: Rng>(&mut self, a: &Genome, b: &Genome, rng: &mut R, settings: &Settings, innovations: &InnovationContext) -> Result<SpeciesId> {
        let child = Genome::cross(a, b, rng, settings, innovations)?;
        self.add_genome(child, settings)
    }

    /// Evaluates every genome that has no fitness yet, in parallel, then updates each species'
    /// best-ever fitness. Returns once all evaluations are done.
    pub fn evaluate<T: FitnessTask + ?Sized>(&mut self, task: &T, activation: Activation) -> Result<()> {
        self.species
            .par_iter_mut()
            .flat_map(|species| species.members_mut().par_iter_mut())
            .try_for_each(|genome| genome.evaluate(task, activation).map(|_| ()))?;

        for species in self.species.iter_mut() {
            species.record_fitness();
        }
        Ok(())
    }
}
