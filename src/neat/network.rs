use rustc_hash::FxHashMap;

use super::common::Activation;
use super::error::{NeatError, Result};
use super::genome::{Gene, Genome, NodeId};

#[derive(Clone, Copy, PartialEq)]
enum NodeValue {
    InProgress,
    Ready(f64),
}

/// Read-only view of a genome as a feed-forward network. This is what fitness tasks get to see.
#[derive(Clone, Copy)]
pub struct Network<'a> {
    genome: &'a Genome,
    activation: Activation,
}

impl<'a> Network<'a> {
    pub fn new(genome: &'a Genome, activation: Activation) -> Network<'a> {
        Network { genome, activation }
    }

    pub fn genome(&self) -> &'a Genome {
        self.genome
    }

    pub fn n_inputs(&self) -> usize {
        self.genome.input_nodes().len()
    }

    pub fn n_outputs(&self) -> usize {
        self.genome.output_nodes().len()
    }

    /// One value per output node, in output order. Input nodes take their value straight from
    /// `inputs`; every other node is the activation of the weighted sum over its enabled
    /// incoming genes.
    pub fn activate(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        let input_nodes = self.genome.input_nodes();
        if inputs.len() != input_nodes.len() {
            return Err(NeatError::InputLength {
                expected: input_nodes.len(),
                actual: inputs.len(),
            });
        }

        let mut incoming: FxHashMap<NodeId, Vec<&Gene>> = FxHashMap::default();
        for gene in self.genome.iter().filter(|gene| gene.enabled) {
            incoming.entry(gene.out_node_id()).or_default().push(gene);
        }

        let mut values: FxHashMap<NodeId, NodeValue> = FxHashMap::default();
        for (&node, &input) in input_nodes.iter().zip(inputs) {
            values.insert(node, NodeValue::Ready(input));
        }

        self.genome
            .output_nodes()
            .iter()
            .map(|&output| self.node_value(output, &incoming, &mut values))
            .collect()
    }

    // post-order walk with an explicit stack, so deep networks cannot overflow
    fn node_value(&self, target: NodeId, incoming: &FxHashMap<NodeId, Vec<&Gene>>, values: &mut FxHashMap<NodeId, NodeValue>) -> Result<f64> {
        let mut stack = vec![target];

        while let Some(&node) = stack.last() {
            if let Some(NodeValue::Ready(_)) = values.get(&node) {
                stack.pop();
                continue;
            }
            values.insert(node, NodeValue::InProgress);

            let genes = incoming.get(&node).map(Vec::as_slice).unwrap_or(&[]);
            let mut pending = None;
            for gene in genes {
                match values.get(&gene.in_node_id()) {
                    Some(NodeValue::Ready(_)) => {}
                    Some(NodeValue::InProgress) => return Err(NeatError::CyclicNetwork(gene.in_node_id())),
                    None => {
                        pending = Some(gene.in_node_id());
                        break;
                    }
                }
            }

            match pending {
                Some(dependency) => stack.push(dependency),
                None => {
                    let sum = genes.iter().fold(0., |acc, gene| match values.get(&gene.in_node_id()) {
                        Some(NodeValue::Ready(value)) => acc + gene.weight * value,
                        _ => acc,
                    });
                    values.insert(node, NodeValue::Ready(self.activation.apply(sum)));
                    stack.pop();
                }
            }
        }

        match values.get(&target) {
            Some(NodeValue::Ready(value)) => Ok(*value),
            _ => Err(NeatError::CyclicNetwork(target)),
        }
    }
}
