/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;

/// An iterator over the nodes of a graph and their successors.
///
/// Nodes are returned in strictly ascending id order; each successor list
/// is strictly ascending. This is a plain alias for the underlying
/// iterator shape, blanket-implemented for every conforming iterator.
pub trait NodeIterator: Iterator<Item = (usize, Vec<usize>)> {}

impl<I: Iterator<Item = (usize, Vec<usize>)>> NodeIterator for I {}

/// A graph that can be scanned node by node.
///
/// This is the minimal contract: everything that can enumerate its
/// adjacency lists in node order implements it, whether or not random
/// access is possible.
pub trait SequentialGraph {
    /// The node iterator type.
    type Iter<'a>: NodeIterator + 'a
    where
        Self: 'a;

    /// Number of nodes in the graph.
    fn num_nodes(&self) -> usize;

    /// Number of arcs, if known without a full scan.
    fn num_arcs_hint(&self) -> Option<u64> {
        None
    }

    /// Iterates over the nodes of `[from, until)` and their successors.
    ///
    /// # Panics
    /// If the range is not contained in `[0, num_nodes()]`.
    fn iter_range(&self, from: usize, until: usize) -> Self::Iter<'_>;

    /// Iterates from `from` to the last node.
    fn iter_from(&self, from: usize) -> Self::Iter<'_> {
        self.iter_range(from, self.num_nodes())
    }

    /// Iterates over the whole graph.
    fn iter(&self) -> Self::Iter<'_> {
        self.iter_range(0, self.num_nodes())
    }

    /// Whether this graph also supports random access.
    ///
    /// Callers holding a type-erased graph should check this before
    /// assuming per-node operations are available.
    fn random_access(&self) -> bool {
        false
    }

    /// Whether node iterators can be duplicated mid-stream.
    fn has_copiable_iterators(&self) -> bool {
        false
    }

    /// Splits the nodes into `how_many` disjoint iterators covering
    /// `[0, num_nodes())` in order. Trailing iterators may be empty.
    ///
    /// The default implementation balances node counts; graphs that know
    /// their outdegrees override this to balance arc counts instead.
    ///
    /// # Panics
    /// If `how_many` is zero.
    fn split_node_iters(&self, how_many: usize) -> Vec<Self::Iter<'_>> {
        assert!(how_many > 0, "cannot split into zero iterators");
        let n = self.num_nodes();
        let per_iter = n.div_ceil(how_many);
        (0..how_many)
            .map(|i| {
                let from = (i * per_iter).min(n);
                let until = ((i + 1) * per_iter).min(n);
                self.iter_range(from, until)
            })
            .collect()
    }
}

/// A graph whose outdegrees and successor lists can be accessed by node id.
///
/// `Clone` is part of the contract, and it is required to be a flyweight:
/// clones share all backing storage and carry only private decode state,
/// so one clone per thread gives safe concurrent traversal.
pub trait RandomAccessGraph: SequentialGraph + Clone {
    /// The lazy successor iterator type.
    type Successors<'a>: Iterator<Item = usize> + 'a
    where
        Self: 'a;

    /// Number of arcs in the graph.
    fn num_arcs(&self) -> u64;

    /// Outdegree of `node`.
    ///
    /// # Panics
    /// If `node` is out of range.
    fn outdegree(&self, node: usize) -> Result<usize>;

    /// The successors of `node`, in strictly ascending order.
    ///
    /// # Panics
    /// If `node` is out of range.
    fn successors(&self, node: usize) -> Result<Self::Successors<'_>>;
}
