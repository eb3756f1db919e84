//! Phylogenetic tree as an arena of nodes with integer handles
//!
//! Leaves hold the condensed input genomes and never change. Internal nodes
//! start without a genome; the labeling optimizer assigns and refines them.
//! Edge weights are never stored, they are recomputed from node genomes.

use crate::distance::DistanceOracle;
use crate::error::{PhyloError, Result};
use crate::genome::Genome;
use crate::newick::Topology;
use indexmap::IndexMap;
use rayon::prelude::*;

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Internal,
}

#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    pub kind: NodeKind,
    genome: Option<Genome>,
    neighbors: Vec<NodeId>,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn genome(&self) -> Option<&Genome> {
        self.genome.as_ref()
    }

    pub fn neighbors(&self) -> &[NodeId] {
        &self.neighbors
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    start: NodeId,
    leaves: IndexMap<String, NodeId>,
}

impl Tree {
    /// Build the tree from a topology and the genomes of its leaves, bound by
    /// organism name. A root of degree two is suppressed so that every
    /// internal node has exactly three neighbours. With an outgroup, the
    /// starting node is the outgroup's neighbour.
    pub fn from_topology(
        topology: &Topology,
        genomes: &IndexMap<String, Genome>,
        outgroup: Option<&str>,
    ) -> Result<Tree> {
        let mut tree = Tree {
            nodes: Vec::new(),
            start: 0,
            leaves: IndexMap::new(),
        };

        match topology {
            Topology::Internal { children, label } if children.len() == 2 => {
                let a = tree.add_subtree(&children[0], genomes)?;
                let b = tree.add_subtree(&children[1], genomes)?;
                tree.link(a, b);
                if let Some(label) = label {
                    log::debug!("Suppressed degree-two root {label}");
                }
            }
            Topology::Internal { children, .. } if children.len() >= 3 => {
                tree.add_subtree(topology, genomes)?;
            }
            _ => {
                return Err(PhyloError::Format(
                    "topology must have at least three leaves".into(),
                ))
            }
        }

        for name in genomes.keys() {
            if !tree.leaves.contains_key(name) {
                return Err(PhyloError::Format(format!(
                    "organism {name} does not appear in the topology"
                )));
            }
        }
        for node in &tree.nodes {
            if node.kind == NodeKind::Internal && node.neighbors.len() != 3 {
                return Err(PhyloError::Format(format!(
                    "internal node {} has {} neighbours; only binary topologies are supported",
                    node.name,
                    node.neighbors.len()
                )));
            }
        }

        tree.start = match outgroup {
            Some(name) => {
                let leaf = *tree.leaves.get(name).ok_or_else(|| {
                    PhyloError::Format(format!("outgroup {name} is not a leaf of the topology"))
                })?;
                tree.nodes[leaf].neighbors[0]
            }
            None => tree
                .internal_nodes()
                .next()
                .ok_or_else(|| PhyloError::Format("topology has no internal node".into()))?,
        };

        Ok(tree)
    }

    fn add_subtree(&mut self, topology: &Topology, genomes: &IndexMap<String, Genome>) -> Result<NodeId> {
        match topology {
            Topology::Leaf(name) => {
                let genome = genomes.get(name).ok_or_else(|| {
                    PhyloError::Format(format!("leaf {name} has no genome in the dataset"))
                })?;
                if self.leaves.contains_key(name) {
                    return Err(PhyloError::Format(format!(
                        "leaf {name} appears twice in the topology"
                    )));
                }
                let id = self.push(name.clone(), NodeKind::Leaf, Some(genome.clone()));
                self.leaves.insert(name.clone(), id);
                Ok(id)
            }
            Topology::Internal { label, children } => {
                let internal_count = self.internal_nodes().count();
                let name = label
                    .clone()
                    .unwrap_or_else(|| format!("anc{}", internal_count + 1));
                let id = self.push(name, NodeKind::Internal, None);
                for child in children {
                    let child = self.add_subtree(child, genomes)?;
                    self.link(id, child);
                }
                Ok(id)
            }
        }
    }

    fn push(&mut self, name: String, kind: NodeKind, genome: Option<Genome>) -> NodeId {
        self.nodes.push(Node {
            name,
            kind,
            genome,
            neighbors: Vec::new(),
        });
        self.nodes.len() - 1
    }

    fn link(&mut self, a: NodeId, b: NodeId) {
        self.nodes[a].neighbors.push(b);
        self.nodes[b].neighbors.push(a);
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate()
    }

    pub fn leaf(&self, name: &str) -> Option<NodeId> {
        self.leaves.get(name).copied()
    }

    pub fn internal_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.kind == NodeKind::Internal)
            .map(|(id, _)| id)
    }

    pub fn neighbors(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].neighbors
    }

    /// Neighbours of `id` other than `parent`, in ascending order
    pub fn children(&self, id: NodeId, parent: Option<NodeId>) -> Vec<NodeId> {
        let mut children: Vec<NodeId> = self.nodes[id]
            .neighbors
            .iter()
            .copied()
            .filter(|&n| Some(n) != parent)
            .collect();
        children.sort_unstable();
        children
    }

    /// Undirected edges as `(a, b)` with `a < b`
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.nodes
            .iter()
            .enumerate()
            .flat_map(|(a, node)| {
                node.neighbors
                    .iter()
                    .filter(move |&&b| a < b)
                    .map(move |&b| (a, b))
            })
            .collect()
    }

    /// Internal nodes in post-order from the starting node, with their parent
    pub fn post_order(&self) -> Vec<(NodeId, Option<NodeId>)> {
        let mut order = Vec::new();
        let mut stack = vec![(self.start, None, false)];
        while let Some((node, parent, expanded)) = stack.pop() {
            if expanded {
                order.push((node, parent));
                continue;
            }
            stack.push((node, parent, true));
            for child in self.children(node, parent).into_iter().rev() {
                if !self.nodes[child].is_leaf() {
                    stack.push((child, Some(node), false));
                }
            }
        }
        order
    }

    pub fn genome(&self, id: NodeId) -> Result<&Genome> {
        self.nodes[id].genome.as_ref().ok_or_else(|| {
            PhyloError::InvariantViolation(format!("node {} has no genome", self.nodes[id].name))
        })
    }

    /// Label an internal node. Leaf genomes are immutable.
    pub fn set_genome(&mut self, id: NodeId, genome: Genome) -> Result<()> {
        let node = &mut self.nodes[id];
        if node.is_leaf() {
            return Err(PhyloError::InvariantViolation(format!(
                "attempt to relabel leaf {}",
                node.name
            )));
        }
        node.genome = Some(genome.with_name(node.name.clone()));
        Ok(())
    }

    /// Sum of costs between `genome` and the genomes of the neighbours of `id`
    pub fn local_cost(&self, id: NodeId, genome: &Genome, oracle: &dyn DistanceOracle) -> Result<u32> {
        let mut total = 0;
        for &neighbor in self.neighbors(id) {
            total += oracle.cost(genome, self.genome(neighbor)?)?;
        }
        Ok(total)
    }

    /// Total tree score: sum of edge costs
    pub fn score(&self, oracle: &dyn DistanceOracle) -> Result<u32> {
        let costs = self
            .edges()
            .par_iter()
            .map(|&(a, b)| oracle.cost(self.genome(a)?, self.genome(b)?))
            .collect::<Result<Vec<u32>>>()?;
        Ok(costs.into_iter().sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PenaltyPolicy;
    use crate::distance::DcjDistance;
    use crate::newick::parse_newick;

    fn genomes() -> IndexMap<String, Genome> {
        let mut genomes = IndexMap::new();
        genomes.insert("A".to_string(), Genome::linear(vec![1, 2, 3]).with_name("A"));
        genomes.insert("B".to_string(), Genome::linear(vec![1, -2, 3]).with_name("B"));
        genomes.insert("C".to_string(), Genome::linear(vec![2, 1, 3]).with_name("C"));
        genomes.insert("D".to_string(), Genome::linear(vec![3, 2, 1]).with_name("D"));
        genomes
    }

    #[test]
    fn test_rooted_topology_is_unrooted() {
        let topology = parse_newick("((A,B),(C,D));").unwrap();
        let tree = Tree::from_topology(&topology, &genomes(), None).unwrap();
        assert_eq!(tree.len(), 6);
        assert_eq!(tree.internal_nodes().count(), 2);
        assert_eq!(tree.edges().len(), 5);
        for id in tree.internal_nodes() {
            assert_eq!(tree.neighbors(id).len(), 3);
        }
    }

    #[test]
    fn test_post_order_visits_children_first() {
        let topology = parse_newick("(A,(B,(C,D)),X);").unwrap();
        let mut all = genomes();
        all.insert("X".to_string(), Genome::linear(vec![1, 3, 2]).with_name("X"));
        let tree = Tree::from_topology(&topology, &all, Some("A")).unwrap();
        let order: Vec<NodeId> = tree.post_order().into_iter().map(|(n, _)| n).collect();
        assert_eq!(order.len(), 3);
        assert_eq!(*order.last().unwrap(), tree.start());
        assert!(tree.neighbors(tree.start()).contains(&tree.leaf("A").unwrap()));
    }

    #[test]
    fn test_missing_and_multifurcating_topologies_fail() {
        let topology = parse_newick("((A,B),(C,E));").unwrap();
        assert!(Tree::from_topology(&topology, &genomes(), None).is_err());

        let topology = parse_newick("(A,B,C,D);").unwrap();
        assert!(Tree::from_topology(&topology, &genomes(), None).is_err());

        let topology = parse_newick("((A,B),C);").unwrap();
        assert!(Tree::from_topology(&topology, &genomes(), None).is_err());
    }

    #[test]
    fn test_score_and_leaf_immutability() {
        let topology = parse_newick("((A,B),(C,D));").unwrap();
        let mut tree = Tree::from_topology(&topology, &genomes(), None).unwrap();
        let oracle = DcjDistance::new(PenaltyPolicy::None);
        assert!(tree.score(&oracle).is_err());

        let internals: Vec<NodeId> = tree.internal_nodes().collect();
        for id in internals {
            tree.set_genome(id, Genome::linear(vec![1, 2, 3])).unwrap();
        }
        let leaf = tree.leaf("A").unwrap();
        assert!(tree.set_genome(leaf, Genome::linear(vec![3, 2, 1])).is_err());
        // A:0, B:1, C:2, D:2 and 0 between the two ancestors
        assert_eq!(tree.score(&oracle).unwrap(), 5);
    }
}
