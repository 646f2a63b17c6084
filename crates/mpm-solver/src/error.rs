//! Error types for mpm-solver
//!
//! Only precondition violations are errors. A solve that runs out of
//! iterations or breaks down numerically still returns a
//! [`SolveReport`](crate::SolveReport) whose status says so.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SolverError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("workspace is sized for {expected} active nodes but {found} were supplied")]
    NodeCountMismatch { expected: usize, found: usize },

    #[error("entry {entry} couples nodes ({row}, {col}) but only {node_count} nodes are active")]
    EntryOutOfBounds {
        entry: usize,
        row: usize,
        col: usize,
        node_count: usize,
    },

    #[error("coefficient channel `{channel}` has {found} entries, pattern has {expected}")]
    ChannelLengthMismatch {
        channel: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("invalid solver configuration: {name} = {value} (expected {expected})")]
    InvalidConfig {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}
