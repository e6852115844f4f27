use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

use super::common::Settings;
use super::error::{NeatError, Result};
use super::factory::GenomeFactory;
use super::genome::{Genome, SpeciesId};
use super::innovation::InnovationContext;
use super::mutation;
use super::network::Network;
use super::population::{FitnessTask, Population};
use super::species::Species;

enum Breed {
    Cross(usize, usize),
    Clone(usize),
}

/// One refill slot: which species to breed from, how, and the seed for the worker's rng.
struct BreedPlan {
    species_index: usize,
    breed: Breed,
    seed: u64,
}

/// Owns the population and advances it one generation at a time.
pub struct Evolution<T: FitnessTask> {
    settings: Settings,
    task: T,
    innovations: InnovationContext,
    population: Population,
    generation: usize,
    champion: Option<Genome>,
    rng: Xoshiro256PlusPlus,
    active: Arc<AtomicBool>,
}

impl<T: FitnessTask> Evolution<T> {
    /// Seeds the population with `settings.population` copies of the factory genome, each with
    /// freshly drawn weights.
    pub fn new(settings: Settings, task: T, factory: &dyn GenomeFactory) -> Result<Evolution<T>> {
        settings.validate()?;
        let mut rng = match settings.seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::seed_from_u64(rand::thread_rng().gen()),
        };
        let innovations = InnovationContext::default();

        let template = factory.create(&settings, &innovations, &mut rng)?;
        let mut population = Population::new();
        for _ in 0..settings.population {
            let mut genome = template.offspring();
            mutation::randomize_weights(&mut genome, &mut rng, settings.weight_range)?;
            population.add_genome(genome, &settings)?;
        }
        info!(
            "seeded {} genomes into {} species",
            population.len(),
            population.species().len()
        );

        Ok(Evolution {
            settings,
            task,
            innovations,
            population,
            generation: 0,
            champion: None,
            rng,
            active: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Number of generations bred so far.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Best genome of the last completed generation.
    pub fn champion(&self) -> Option<&Genome> {
        self.champion.as_ref()
    }

    /// Clearing the flag stops `run` after the generation in progress.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.active)
    }

    /// Evaluates everything, then calls `report` with the champion after each generation until
    /// the stop flag is cleared.
    pub fn run<F>(&mut self, mut report: F) -> Result<Option<&Genome>>
    where
        F: FnMut(&Network<'_>),
    {
        while self.active.load(Ordering::SeqCst) {
            self.next_generation()?;
            if let Some(champion) = &self.champion {
                report(&champion.network(self.settings.activation));
                info!(
                    "generation {}: champion fitness {:.4}, {} hidden units, {} enabled connections",
                    self.generation,
                    champion.fitness().unwrap_or(f64::NAN),
                    champion.hidden_nodes().len(),
                    champion.enabled_connections()
                );
            }
        }
        Ok(self.champion.as_ref())
    }

    /// Runs one full generation and returns its champion.
    ///
    /// The generation counter advances once the population has been rebuilt. A task error while
    /// evaluating the new genomes names that generation, and the next call evaluates whatever was
    /// left over as part of the generation after it.
    pub fn next_generation(&mut self) -> Result<&Genome> {
        let generation = self.generation + 1;
        self.breed(generation).map_err(|e| in_generation(e, generation))?;
        self.generation = generation;

        self.population
            .evaluate(&self.task, self.settings.activation)
            .map_err(|e| in_generation(e, generation))?;
        let champion = self
            .population
            .best_performing()
            .cloned()
            .ok_or(NeatError::Extinction { generation })?;

        info!(
            "generation {}: {} species, {} genomes, champion fitness {:.4} in species {}",
            generation,
            self.population.species().len(),
            self.population.len(),
            champion.fitness().unwrap_or(f64::NAN),
            champion.species().map_or(0, |s| s.0)
        );
        Ok(&*self.champion.insert(champion))
    }

    /// Evaluates the current population, culls it and refills every surviving species with
    /// unevaluated offspring.
    fn breed(&mut self, generation: usize) -> Result<()> {
        self.innovations.new_generation();
        self.population.evaluate(&self.task, self.settings.activation)?;

        let averages = self
            .population
            .species()
            .iter()
            .map(|s| s.average_fitness().ok_or(NeatError::NotEvaluated))
            .collect::<Result<Vec<f64>>>()?;
        let sum_avg: f64 = averages.iter().sum();
        let champion_species = self.population.best_performing().and_then(Genome::species);

        let survivors = self.cull(averages, sum_avg, champion_species);
        if survivors.is_empty() {
            error!("generation {}: every species died out", generation);
            return Err(NeatError::Extinction { generation });
        }

        let old_members = self.reset_rosters(survivors)?;
        self.refill(&old_members)?;

        let species = self.population.species_mut();
        species.retain(|s| !s.is_empty());
        for s in species.iter_mut() {
            s.update(&mut self.rng);
        }
        Ok(())
    }

    /// Shrinks every species to its best members and drops the ones that stagnated or earned no
    /// offspring. The species holding the population champion is kept when elitism is on.
    fn cull(&mut self, averages: Vec<f64>, sum_avg: f64, champion_species: Option<SpeciesId>) -> Vec<Species> {
        let settings = &self.settings;
        let species = std::mem::take(self.population.species_mut());
        let n_species = species.len();
        let target = settings.population as f64;
        let mut survivors = Vec::with_capacity(n_species);

        for (mut s, avg) in species.into_iter().zip(averages) {
            s.eliminate(settings.elimination_fraction);
            let stagnation = s.tick_stagnation();
            let protected = settings.elitism && Some(s.id()) == champion_species;

            if stagnation > settings.stagnation_limit && !protected {
                if s.len() > 1 {
                    warn!("species {} dropped after {} generations without improvement", s.id().0, stagnation);
                } else {
                    survivors.push(s);
                }
                continue;
            }

            let quota = if sum_avg > 0.0 {
                (avg / sum_avg * target).floor() - 1.0
            } else {
                (target / n_species as f64).floor() - 1.0
            };
            debug!("species {}: average fitness {:.4}, breeding quota {}", s.id().0, avg, quota);
            if quota < 1.0 && !protected {
                debug!("species {} dropped, no offspring allowed", s.id().0);
                continue;
            }
            survivors.push(s);
        }
        survivors
    }

    /// Puts the survivors back with empty rosters (plus their elite) and returns what each one
    /// held before, best first.
    fn reset_rosters(&mut self, survivors: Vec<Species>) -> Result<Vec<Vec<Genome>>> {
        let mut old_members = Vec::with_capacity(survivors.len());
        let species = self.population.species_mut();
        for mut s in survivors {
            let old = s.take_members();
            if self.settings.elitism {
                if let Some(elite) = old.first() {
                    s.add(elite.clone())?;
                }
            }
            old_members.push(old);
            species.push(s);
        }
        Ok(old_members)
    }

    fn refill(&mut self, old_members: &[Vec<Genome>]) -> Result<()> {
        let settings = &self.settings;
        let rng = &mut self.rng;

        let mut plans = Vec::new();
        let mut size = self.population.len();
        while size < settings.population {
            let species_index = rng.gen_range(0..old_members.len());
            let old = &old_members[species_index];
            let breed = if rng.gen_bool(settings.breed_cross_chance) {
                Breed::Cross(rng.gen_range(0..old.len()), rng.gen_range(0..old.len()))
            } else {
                Breed::Clone(rng.gen_range(0..old.len()))
            };
            plans.push(BreedPlan {
                species_index,
                breed,
                seed: rng.gen(),
            });
            size += 1;
        }

        let innovations = &self.innovations;
        let children = plans
            .par_iter()
            .map(|plan| {
                let mut local_rng = Xoshiro256PlusPlus::seed_from_u64(plan.seed);
                let old = &old_members[plan.species_index];
                match plan.breed {
                    Breed::Cross(a, b) => Genome::cross(&old[a], &old[b], &mut local_rng, settings, innovations),
                    Breed::Clone(a) => {
                        let mut child = old[a].offspring();
                        child.mutate(&mut local_rng, settings, innovations)?;
                        Ok(child)
                    }
                }
            })
            .collect::<Result<Vec<Genome>>>()?;

        for (plan, child) in plans.iter().zip(children) {
            match plan.breed {
                Breed::Cross(..) => {
                    self.population.add_genome(child, settings)?;
                }
                Breed::Clone(_) => {
                    self.population.species_mut()[plan.species_index].add(child)?;
                }
            }
        }
        Ok(())
    }
}

fn in_generation(e: NeatError, generation: usize) -> NeatError {
    match e {
        NeatError::Task(_) => NeatError::Generation {
            generation,
            source: Box::new(e),
        },
        e => e,
    }
}
