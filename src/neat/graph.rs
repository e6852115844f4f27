use rustc_hash::FxHashMap;

use super::genome::{Genome, NodeId};

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Open,
    Done,
}

/// Forward adjacency over every gene of a genome, disabled genes included since
/// crossover may switch them back on.
pub struct Graph {
    adj_list: FxHashMap<NodeId, Vec<NodeId>>,
}

impl Graph {
    pub fn from_genome(genome: &Genome) -> Graph {
        let mut graph = Graph {
            adj_list: FxHashMap::default(),
        };
        for gene in genome.iter() {
            graph.add_edge(gene.in_node_id(), gene.out_node_id());
        }
        graph
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        self.adj_list.entry(from).or_default().push(to);
    }

    fn successors(&self, node: NodeId) -> &[NodeId] {
        self.adj_list.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Depth-first search from each start node; true as soon as a back edge is found.
    pub fn has_cycle_from<I>(&self, starts: I) -> bool
    where
        I: IntoIterator<Item = NodeId>,
    {
        let mut marks: FxHashMap<NodeId, Mark> = FxHashMap::default();
        let mut stack: Vec<(NodeId, usize)> = Vec::new();

        for start in starts {
            if marks.contains_key(&start) {
                continue;
            }
            marks.insert(start, Mark::Open);
            stack.push((start, 0));

            while let Some((node, next_child)) = stack.pop() {
                let successors = self.successors(node);
                if next_child < successors.len() {
                    stack.push((node, next_child + 1));
                    let child = successors[next_child];
                    match marks.get(&child) {
                        Some(Mark::Open) => return true,
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(child, Mark::Open);
                            stack.push((child, 0));
                        }
                    }
                } else {
                    marks.insert(node, Mark::Done);
                }
            }
        }
        false
    }
}

/// Would adding `from -> to` to the genome close a loop through one of its hidden nodes?
pub fn creates_cycle(genome: &Genome, from: NodeId, to: NodeId) -> bool {
    let mut graph = Graph::from_genome(genome);
    graph.add_edge(from, to);
    let mut starts = genome.hidden_nodes();
    // a brand new connection may touch nodes no gene mentions yet
    starts.extend([from, to].into_iter().filter(|&n| genome.is_hidden_node(n)));
    graph.has_cycle_from(starts)
}
