//! Node-to-entry index over the coordinate-list pattern.
//!
//! The operator product for node `r` needs every entry with `row == r` and,
//! for the stored triangle to act symmetrically, every off-diagonal entry
//! with `col == r`. Scanning the whole pattern for each node costs O(E) per
//! node; this index groups those entries per node once per solve so a node
//! product costs O(degree).

use crate::operator::OperatorStore;

/// One operator entry touching a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    /// Entry index into the operator channels
    pub entry: usize,
    /// The node on the other side of the entry (the node itself for self entries)
    pub neighbour: usize,
}

/// CSR-style grouping of [`Link`]s by node
#[derive(Debug, Clone, Default)]
pub struct NodeAdjacency {
    offsets: Vec<usize>,
    links: Vec<Link>,
    cursor: Vec<usize>,
}

impl NodeAdjacency {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from `store` for `node_count` nodes, reusing the buffers.
    ///
    /// Links of a node keep pattern order: row occurrences and column
    /// occurrences interleaved as they appear in the store.
    ///
    /// # Panics
    /// If an entry refers to a node `>= node_count`. Callers validate the
    /// store first.
    pub fn rebuild(&mut self, store: &OperatorStore, node_count: usize) {
        let rows = store.row_index();
        let cols = store.col_index();

        self.offsets.clear();
        self.offsets.resize(node_count + 1, 0);
        for (&r, &c) in rows.iter().zip(cols) {
            self.offsets[r + 1] += 1;
            if r != c {
                self.offsets[c + 1] += 1;
            }
        }
        for i in 0..node_count {
            self.offsets[i + 1] += self.offsets[i];
        }

        let total = self.offsets[node_count];
        self.links.clear();
        self.links.resize(
            total,
            Link {
                entry: 0,
                neighbour: 0,
            },
        );

        // Fill cursor per node, starting from its offset.
        self.cursor.clear();
        self.cursor.extend_from_slice(&self.offsets[..node_count]);
        for (entry, (&r, &c)) in rows.iter().zip(cols).enumerate() {
            self.links[self.cursor[r]] = Link {
                entry,
                neighbour: c,
            };
            self.cursor[r] += 1;
            if r != c {
                self.links[self.cursor[c]] = Link {
                    entry,
                    neighbour: r,
                };
                self.cursor[c] += 1;
            }
        }
    }

    /// Number of nodes indexed.
    pub fn node_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Links touching `node`.
    #[inline]
    pub fn links(&self, node: usize) -> &[Link] {
        &self.links[self.offsets[node]..self.offsets[node + 1]]
    }

    /// Number of entries touching `node`.
    pub fn degree(&self, node: usize) -> usize {
        self.offsets[node + 1] - self.offsets[node]
    }
}
