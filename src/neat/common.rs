use super::error::{NeatError, Result};

/// Activation function shared by every hidden and output node.
#[derive(Clone, Copy, Debug, Default)]
pub enum Activation {
    #[default]
    Sigmoid,
    Tanh,
    Relu,
    Identity,
    Custom(fn(f64) -> f64),
}

impl Activation {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::Relu => {
                if x > 0.0 {
                    x
                } else {
                    0.0
                }
            }
            Activation::Identity => x,
            Activation::Custom(f) => f(x),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub n_inputs: usize,
    pub n_outputs: usize,
    /// Target number of genomes per generation.
    pub population: usize,
    pub activation: Activation,

    pub excess_coefficient: f64,
    pub disjoint_coefficient: f64,
    pub weight_coefficient: f64,
    pub compatibility_threshold: f64,

    /// Chance that a refill slot is bred by crossover instead of clone-and-mutate.
    pub breed_cross_chance: f64,
    /// Chance that a gene enabled in only one parent ends up disabled in the child.
    pub gene_disable_chance: f64,
    pub elimination_fraction: f64,
    pub stagnation_limit: usize,
    /// Carry the best member of every surviving species into the next generation unchanged.
    pub elitism: bool,

    pub mutate_add_node_rate: f64,
    pub mutate_add_connection_rate: f64,
    pub mutate_weight_rate: f64,
    /// Chance that a weight mutation re-rolls every weight instead of nudging it.
    pub mutate_weight_random_rate: f64,
    pub mutate_weight_disturbance: f64,
    /// Fresh weights are drawn from `-weight_range..weight_range`.
    pub weight_range: f64,

    pub seed: Option<u64>,
}

impl Settings {
    pub fn standard(n_inputs: usize, n_outputs: usize) -> Settings {
        Settings {
            n_inputs,
            n_outputs,
            population: 100,
            activation: Activation::Sigmoid,
            excess_coefficient: 1.0,
            disjoint_coefficient: 1.0,
            weight_coefficient: 0.4,
            compatibility_threshold: 0.8,
            breed_cross_chance: 0.75,
            gene_disable_chance: 0.75,
            elimination_fraction: 0.9,
            stagnation_limit: 15,
            elitism: true,
            mutate_add_node_rate: 0.03,
            mutate_add_connection_rate: 0.05,
            mutate_weight_rate: 0.8,
            mutate_weight_random_rate: 0.1,
            mutate_weight_disturbance: 0.25,
            weight_range: 5.0,
            seed: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: String) -> Result<()> {
            Err(NeatError::InvalidSettings(msg))
        }

        if self.n_inputs == 0 || self.n_outputs == 0 {
            return invalid("a genome needs at least one input and one output node".to_string());
        }
        if self.population == 0 {
            return invalid("population must not be empty".to_string());
        }

        let probabilities = [
            ("breed_cross_chance", self.breed_cross_chance),
            ("gene_disable_chance", self.gene_disable_chance),
            ("elimination_fraction", self.elimination_fraction),
            ("mutate_add_node_rate", self.mutate_add_node_rate),
            ("mutate_add_connection_rate", self.mutate_add_connection_rate),
            ("mutate_weight_rate", self.mutate_weight_rate),
            ("mutate_weight_random_rate", self.mutate_weight_random_rate),
        ];
        for (name, p) in probabilities {
            if !(0.0..=1.0).contains(&p) {
                return invalid(format!("{name} must lie in [0, 1], got {p}"));
            }
        }

        let non_negative = [
            ("excess_coefficient", self.excess_coefficient),
            ("disjoint_coefficient", self.disjoint_coefficient),
            ("weight_coefficient", self.weight_coefficient),
            ("compatibility_threshold", self.compatibility_threshold),
            ("mutate_weight_disturbance", self.mutate_weight_disturbance),
        ];
        for (name, v) in non_negative {
            if !(v >= 0.0 && v.is_finite()) {
                return invalid(format!("{name} must be a non-negative number, got {v}"));
            }
        }

        if !(self.weight_range > 0.0 && self.weight_range.is_finite()) {
            return invalid(format!("weight_range must be positive, got {}", self.weight_range));
        }
        Ok(())
    }
}
