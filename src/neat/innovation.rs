use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rustc_hash::FxHashMap;

use super::genome::GeneKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InnovationNumber(pub usize);

impl fmt::Display for InnovationNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic source of innovation numbers, starting at 1. Safe to share between threads.
#[derive(Debug)]
pub struct InnovationCounter(AtomicUsize);

impl InnovationCounter {
    pub fn new() -> InnovationCounter {
        InnovationCounter(AtomicUsize::new(1))
    }

    pub fn next(&self) -> InnovationNumber {
        InnovationNumber(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for InnovationCounter {
    fn default() -> Self {
        InnovationCounter::new()
    }
}

/// Shared counter plus a registry of the connections created during the current generation,
/// so the same structural mutation made by two genomes gets the same innovation number.
#[derive(Debug)]
pub struct InnovationContext {
    counter: Arc<InnovationCounter>,
    innovation_map: Mutex<FxHashMap<GeneKey, InnovationNumber>>,
}

impl InnovationContext {
    pub fn new(counter: Arc<InnovationCounter>) -> InnovationContext {
        InnovationContext {
            counter,
            innovation_map: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn counter(&self) -> &Arc<InnovationCounter> {
        &self.counter
    }

    pub fn get_innovation_number(&self, gene_key: GeneKey) -> InnovationNumber {
        let mut map = self.innovation_map.lock().unwrap_or_else(PoisonError::into_inner);
        *map.entry(gene_key).or_insert_with(|| self.counter.next())
    }

    /// Forget the connections registered so far. The counter keeps counting.
    pub fn new_generation(&self) {
        self.innovation_map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for InnovationContext {
    fn default() -> Self {
        InnovationContext::new(Arc::new(InnovationCounter::new()))
    }
}
