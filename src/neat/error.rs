use thiserror::Error;

use super::genome::NodeId;
use super::innovation::InnovationNumber;

/// Error produced by a user supplied fitness task.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum NeatError {
    #[error("genome already has gene with innovation number {0}")]
    DuplicateInnovation(InnovationNumber),

    #[error("{operation}() must be called before the fitness of the genome is evaluated")]
    GenomeFrozen { operation: &'static str },

    #[error("species must match when crossing")]
    SpeciesMismatch,

    #[error("genes may not be empty")]
    EmptyGenome,

    #[error("input size {actual} must be equal to the number of input nodes ({expected})")]
    InputLength { expected: usize, actual: usize },

    #[error("node {0} is declared more than once among the input and output nodes")]
    DuplicateNode(NodeId),

    #[error("fitness of the genome has not been evaluated")]
    NotEvaluated,

    #[error("network contains a cycle through node {0}")]
    CyclicNetwork(NodeId),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("fitness task failed: {0}")]
    Task(#[source] TaskError),

    #[error("generation {generation} failed")]
    Generation {
        generation: usize,
        #[source]
        source: Box<NeatError>,
    },

    #[error("all species died in generation {generation}")]
    Extinction { generation: usize },
}

pub type Result<T> = std::result::Result<T, NeatError>;
