use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::Rng;

use super::common::Settings;
use super::error::Result;
use super::genome::{Genome, SpeciesId};

fn by_fitness_desc(a: &Genome, b: &Genome) -> std::cmp::Ordering {
    let a = a.fitness().unwrap_or(f64::NEG_INFINITY);
    let b = b.fitness().unwrap_or(f64::NEG_INFINITY);
    b.total_cmp(&a)
}

/// A cluster of compatible genomes, compared against a single representative.
#[derive(Clone, Debug)]
pub struct Species {
    id: SpeciesId,
    representative: Genome,
    members: Vec<Genome>,
    highest_fitness: f64,
    stagnation: usize,
}

impl Species {
    pub fn new(id: SpeciesId, representative: Genome) -> Species {
        Species {
            id,
            representative,
            members: Vec::new(),
            highest_fitness: f64::NEG_INFINITY,
            stagnation: 0,
        }
    }

    pub fn id(&self) -> SpeciesId {
        self.id
    }

    pub fn representative(&self) -> &Genome {
        &self.representative
    }

    pub fn members(&self) -> &[Genome] {
        &self.members
    }

    pub(crate) fn members_mut(&mut self) -> &mut Vec<Genome> {
        &mut self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Best fitness any member has ever reached.
    pub fn highest_fitness(&self) -> f64 {
        self.highest_fitness
    }

    /// Generations since `highest_fitness` last improved.
    pub fn stagnation(&self) -> usize {
        self.stagnation
    }

    pub fn is_compatible(&self, genome: &Genome, settings: &Settings) -> Result<bool> {
        Ok(self.representative.distance(genome, settings)? <= settings.compatibility_threshold)
    }

    /// Adds a genome, tagging it with this species if it is not tagged yet.
    pub fn add(&mut self, mut genome: Genome) -> Result<()> {
        if genome.species() != Some(self.id) {
            genome.set_species(self.id)?;
        }
        self.members.push(genome);
        Ok(())
    }

    /// Members from best to worst. Unevaluated members sort last, ties keep insertion order.
    pub fn ranked(&self) -> Vec<&Genome> {
        self.members.iter().sorted_by(|a, b| by_fitness_desc(a, b)).collect()
    }

    pub fn best(&self) -> Option<&Genome> {
        self.ranked().into_iter().next()
    }

    /// `None` for an empty species or while any member is unevaluated.
    pub fn average_fitness(&self) -> Option<f64> {
        if self.members.is_empty() {
            return None;
        }
        let total = self.members.iter().map(Genome::fitness).sum::<Option<f64>>()?;
        Some(total / self.members.len() as f64)
    }

    pub fn record_fitness(&mut self) {
        let best = self.members.iter().filter_map(Genome::fitness).fold(f64::NEG_INFINITY, f64::max);
        if best > self.highest_fitness {
            self.highest_fitness = best;
            self.stagnation = 0;
        }
    }

    pub(crate) fn tick_stagnation(&mut self) -> usize {
        self.stagnation += 1;
        self.stagnation
    }

    /// Drops the worst `ceil(len * fraction)` members, then gives one back, never going below one.
    pub(crate) fn eliminate(&mut self, fraction: f64) {
        self.members.sort_by(by_fitness_desc);
        let len = self.members.len();
        let cutoff = (len as f64 * fraction).ceil() as usize;
        let keep = (len.saturating_sub(cutoff) + 1).clamp(1, len.max(1));
        self.members.truncate(keep);
    }

    pub(crate) fn take_members(&mut self) -> Vec<Genome> {
        std::mem::take(&mut self.members)
    }

    /// Picks a new random representative among the current members.
    pub fn update<R: Rng>(&mut self, rng: &mut R) {
        if let Some(genome) = self.members.choose(rng) {
            self.representative = genome.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neat::common::Activation;
    use crate::neat::error::TaskError;
    use crate::neat::genome::Gene;
    use crate::neat::network::Network;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn evaluated(weight: f64, fitness: f64) -> Genome {
        let mut genome = Genome::create(vec![Gene::create(1, 0, 1, weight, true)], 1, 1).unwrap();
        let task = move |_: &Network<'_>| -> std::result::Result<f64, TaskError> { Ok(fitness) };
        genome.evaluate(&task, Activation::Identity).unwrap();
        genome
    }

    fn member(weight: f64, fitness: f64) -> Genome {
        let mut genome = Genome::create(vec![Gene::create(1, 0, 1, weight, true)], 1, 1).unwrap();
        genome.set_species(SpeciesId(0)).unwrap();
        let task = move |_: &Network<'_>| -> std::result::Result<f64, TaskError> { Ok(fitness) };
        genome.evaluate(&task, Activation::Identity).unwrap();
        genome
    }

    fn species_with(fitnesses: &[f64]) -> Species {
        let mut species = Species::new(SpeciesId(0), evaluated(0.0, 0.0));
        for (i, &f) in fitnesses.iter().enumerate() {
            species.add(member(i as f64, f)).unwrap();
        }
        species
    }

    #[test]
    fn test_ranked() {
        let species = species_with(&[1.0, 3.0, 2.0, 3.0]);
        let ranked = species.ranked().iter().map(|g| g.fitness().unwrap()).collect_vec();
        assert_eq!(ranked, vec![3.0, 3.0, 2.0, 1.0]);
        // tie keeps the earlier member first
        assert_approx_eq!(species.best().unwrap().get(crate::neat::innovation::InnovationNumber(1)).unwrap().weight, 1.0);
    }

    #[test]
    fn test_average_fitness() {
        assert_approx_eq!(species_with(&[1.0, 2.0, 6.0]).average_fitness().unwrap(), 3.0);
        assert_eq!(species_with(&[]).average_fitness(), None);
    }

    #[test]
    fn test_eliminate() {
        // ceil(10 * 0.9) = 9 removed, one given back -> 2 stay
        let mut species = species_with(&[0., 1., 2., 3., 4., 5., 6., 7., 8., 9.]);
        species.eliminate(0.9);
        let left = species.members().iter().map(|g| g.fitness().unwrap()).collect_vec();
        assert_eq!(left, vec![9., 8.]);

        let mut single = species_with(&[4.0]);
        single.eliminate(0.9);
        assert_eq!(single.len(), 1);

        let mut all = species_with(&[1.0, 2.0, 3.0]);
        all.eliminate(1.0);
        assert_eq!(all.len(), 1);
        assert_eq!(all.members()[0].fitness(), Some(3.0));
    }

    #[test]
    fn test_stagnation() {
        let mut species = species_with(&[1.0]);
        species.record_fitness();
        assert_eq!(species.highest_fitness(), 1.0);
        assert_eq!(species.tick_stagnation(), 1);
        species.record_fitness();
        assert_eq!(species.tick_stagnation(), 2);

        species.add(member(0.5, 2.0)).unwrap();
        species.record_fitness();
        assert_eq!(species.stagnation(), 0);
        assert_eq!(species.highest_fitness(), 2.0);
    }

    #[test]
    fn test_update_picks_member() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let mut species = species_with(&[1.0, 2.0]);
        species.update(&mut rng);
        let weight = species.representative().get(crate::neat::innovation::InnovationNumber(1)).unwrap().weight;
        assert!(weight == 0.0 || weight == 1.0);

        let mut empty = species_with(&[]);
        empty.update(&mut rng);
        assert_eq!(empty.representative().fitness(), Some(0.0));
    }

    #[test]
    fn test_is_compatible() {
        let settings = Settings::standard(1, 1);
        let species = Species::new(SpeciesId(0), evaluated(0.0, 0.0));
        // only the weight term differs: 0.4 * |w|
        assert!(species.is_compatible(&evaluated(1.0, 0.0), &settings).unwrap());
        assert!(!species.is_compatible(&evaluated(3.0, 0.0), &settings).unwrap());
    }
}
