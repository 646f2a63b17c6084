//! Grid-node model shared between the MPM stepping loop and the implicit solver.
//!
//! The solver never owns nodes. It sees the active nodes of a timestep as an
//! ordered slice of [`GridNode`] handles; a node's position in that slice is
//! its index into every solver buffer for the step.

pub mod node;

pub use node::{Node, NodeSet};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Spatial dimension of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Two,
    Three,
}

impl Dimension {
    /// Number of velocity components per node.
    pub fn components(&self) -> usize {
        match self {
            Dimension::Two => 2,
            Dimension::Three => 3,
        }
    }

    /// Build from a component count, `None` for anything but 2 or 3.
    pub fn from_components(n: usize) -> Option<Self> {
        match n {
            2 => Some(Dimension::Two),
            3 => Some(Dimension::Three),
            _ => None,
        }
    }

    /// Drop the components this dimension does not carry.
    pub fn truncate(&self, v: Vector3<f64>) -> Vector3<f64> {
        match self {
            Dimension::Two => Vector3::new(v.x, v.y, 0.0),
            Dimension::Three => v,
        }
    }
}

/// Velocity access the implicit solve needs from a grid node.
///
/// In 2D the z component is ignored on read and written as zero.
pub trait GridNode {
    fn velocity(&self) -> Vector3<f64>;

    fn set_velocity(&mut self, velocity: Vector3<f64>);
}

impl<T: GridNode + ?Sized> GridNode for &mut T {
    fn velocity(&self) -> Vector3<f64> {
        (**self).velocity()
    }

    fn set_velocity(&mut self, velocity: Vector3<f64>) {
        (**self).set_velocity(velocity)
    }
}

impl<T: GridNode + ?Sized> GridNode for Box<T> {
    fn velocity(&self) -> Vector3<f64> {
        (**self).velocity()
    }

    fn set_velocity(&mut self, velocity: Vector3<f64>) {
        (**self).set_velocity(velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_component_counts() {
        assert_eq!(Dimension::Two.components(), 2);
        assert_eq!(Dimension::Three.components(), 3);
        assert_eq!(Dimension::from_components(3), Some(Dimension::Three));
        assert_eq!(Dimension::from_components(1), None);
    }

    #[test]
    fn truncate_zeroes_z_in_2d() {
        let v = Vector3::new(1.0, 2.0, 3.0);
        assert_eq!(Dimension::Two.truncate(v), Vector3::new(1.0, 2.0, 0.0));
        assert_eq!(Dimension::Three.truncate(v), v);
    }

    fn push_along_x<N: GridNode>(mut node: N) {
        let v = node.velocity();
        node.set_velocity(v + Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn handles_forward_to_node() {
        let mut node = Node::new(7, 1.0);
        push_along_x(&mut node);
        assert_eq!(node.velocity, Vector3::new(1.0, 0.0, 0.0));

        let boxed: Box<Node> = Box::new(node);
        let mut handles = vec![boxed];
        push_along_x(&mut handles[0]);
        assert_eq!(handles[0].velocity, Vector3::new(2.0, 0.0, 0.0));
    }
}
