//! Grid nodes and the set they live in.

use crate::GridNode;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// A background-grid node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Grid node ID
    pub id: usize,
    /// Lumped nodal mass transferred from particles this step
    pub mass: f64,
    /// Nodal velocity
    pub velocity: Vector3<f64>,
}

impl Node {
    /// Create a node at rest
    pub fn new(id: usize, mass: f64) -> Self {
        Self {
            id,
            mass,
            velocity: Vector3::zeros(),
        }
    }

    /// Create a node with an initial velocity
    pub fn with_velocity(id: usize, mass: f64, velocity: Vector3<f64>) -> Self {
        Self { id, mass, velocity }
    }

    /// A node takes part in the solve when it carries mass.
    pub fn is_active(&self) -> bool {
        self.mass > 0.0
    }
}

impl GridNode for Node {
    fn velocity(&self) -> Vector3<f64> {
        self.velocity
    }

    fn set_velocity(&mut self, velocity: Vector3<f64>) {
        self.velocity = velocity;
    }
}

/// All grid nodes of a simulation, in insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSet {
    nodes: Vec<Node>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Number of nodes that carry mass.
    pub fn active_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_active()).count()
    }

    /// Mutable handles to the active nodes, in set order.
    ///
    /// The position of a handle in the returned vector is the node's solver
    /// index for the current timestep.
    pub fn active_mut(&mut self) -> Vec<&mut Node> {
        self.nodes.iter_mut().filter(|n| n.is_active()).collect()
    }

    /// Set IDs of the active nodes, in solver-index order.
    pub fn active_ids(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .filter(|n| n.is_active())
            .map(|n| n.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_grid() -> NodeSet {
        let mut set = NodeSet::new();
        set.add_node(Node::new(10, 1.0));
        set.add_node(Node::new(11, 0.0));
        set.add_node(Node::with_velocity(12, 2.0, Vector3::new(1.0, 0.0, 0.0)));
        set
    }

    #[test]
    fn active_nodes_skip_massless() {
        let mut set = make_grid();
        assert_eq!(set.len(), 3);
        assert_eq!(set.active_count(), 2);
        assert_eq!(set.active_ids(), vec![10, 12]);

        let active = set.active_mut();
        assert_eq!(active.len(), 2);
        assert_eq!(active[1].velocity().x, 1.0);
    }

    #[test]
    fn writes_through_active_handles_reach_the_set() {
        let mut set = make_grid();
        for node in set.active_mut() {
            node.set_velocity(Vector3::new(0.0, 3.0, 0.0));
        }
        assert_eq!(set.get(0).unwrap().velocity.y, 3.0);
        assert_eq!(set.get(1).unwrap().velocity.y, 0.0);
        assert_eq!(set.get(2).unwrap().velocity.y, 3.0);
    }
}
