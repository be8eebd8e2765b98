/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::traits::{RandomAccessGraph, SequentialGraph};
use anyhow::Result;

/// A mutable in-memory graph keeping one sorted successor vector per node.
///
/// This is the workhorse of the test suite and the simplest bridge between
/// arbitrary arc sources and the compressor: arcs can be added in any
/// order, and the graph then serves both access contracts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VecGraph {
    succ: Vec<Vec<usize>>,
    num_arcs: u64,
}

impl VecGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a graph with `n` nodes and no arcs.
    pub fn empty(n: usize) -> Self {
        Self {
            succ: vec![vec![]; n],
            num_arcs: 0,
        }
    }

    /// Makes sure `node` exists, extending the graph if needed.
    /// Returns whether the graph grew.
    pub fn add_node(&mut self, node: usize) -> bool {
        if node < self.succ.len() {
            return false;
        }
        self.succ.resize_with(node + 1, Vec::new);
        true
    }

    /// Adds the arc `(src, dst)`, growing the graph to fit its endpoints.
    /// Returns `false` if the arc was already present.
    pub fn add_arc(&mut self, src: usize, dst: usize) -> bool {
        self.add_node(src.max(dst));
        let succ = &mut self.succ[src];
        match succ.binary_search(&dst) {
            Ok(_) => false,
            Err(pos) => {
                succ.insert(pos, dst);
                self.num_arcs += 1;
                true
            }
        }
    }

    pub fn from_arcs(arcs: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut graph = Self::new();
        for (src, dst) in arcs {
            graph.add_arc(src, dst);
        }
        graph
    }

    /// Collects any node iterator into an in-memory graph.
    pub fn from_node_iter(nodes: impl IntoIterator<Item = (usize, Vec<usize>)>) -> Self {
        let mut graph = Self::new();
        for (node, successors) in nodes {
            graph.add_node(node);
            graph.num_arcs += successors.len() as u64;
            graph.succ[node] = successors;
        }
        graph
    }
}

#[derive(Debug, Clone)]
pub struct VecGraphIter<'a> {
    graph: &'a VecGraph,
    next: usize,
    until: usize,
}

impl<'a> VecGraphIter<'a> {
    /// Returns an independent iterator over `[current, upper_bound)`.
    pub fn copy(&self, upper_bound: usize) -> Self {
        Self {
            graph: self.graph,
            next: self.next,
            until: upper_bound.min(self.graph.num_nodes()),
        }
    }
}

impl<'a> Iterator for VecGraphIter<'a> {
    type Item = (usize, Vec<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.until {
            return None;
        }
        let node = self.next;
        self.next += 1;
        Some((node, self.graph.succ[node].clone()))
    }
}

impl SequentialGraph for VecGraph {
    type Iter<'a>
        = VecGraphIter<'a>
    where
        Self: 'a;

    fn num_nodes(&self) -> usize {
        self.succ.len()
    }

    fn num_arcs_hint(&self) -> Option<u64> {
        Some(self.num_arcs)
    }

    fn iter_range(&self, from: usize, until: usize) -> Self::Iter<'_> {
        assert!(from <= until && until <= self.succ.len());
        VecGraphIter {
            graph: self,
            next: from,
            until,
        }
    }

    fn random_access(&self) -> bool {
        true
    }

    fn has_copiable_iterators(&self) -> bool {
        true
    }
}

impl RandomAccessGraph for VecGraph {
    type Successors<'a>
        = std::iter::Copied<std::slice::Iter<'a, usize>>
    where
        Self: 'a;

    fn num_arcs(&self) -> u64 {
        self.num_arcs
    }

    fn outdegree(&self, node: usize) -> Result<usize> {
        Ok(self.succ[node].len())
    }

    fn successors(&self, node: usize) -> Result<Self::Successors<'_>> {
        Ok(self.succ[node].iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_dedup() {
        let mut g = VecGraph::new();
        assert!(g.add_arc(1, 3));
        assert!(g.add_arc(1, 0));
        assert!(!g.add_arc(1, 3));
        assert!(g.add_arc(1, 2));
        assert_eq!(g.num_nodes(), 4);
        assert_eq!(g.num_arcs(), 3);
        assert_eq!(g.successors(1).unwrap().collect::<Vec<_>>(), vec![0, 2, 3]);
        assert_eq!(g.outdegree(0).unwrap(), 0);
    }

    #[test]
    fn test_iter_and_split() {
        let g = VecGraph::from_arcs([(0, 1), (1, 2), (2, 0), (2, 1), (4, 0)]);
        let all: Vec<_> = g.iter().collect();
        assert_eq!(all.len(), 5);
        assert_eq!(all[2], (2, vec![0, 1]));
        assert_eq!(all[3], (3, vec![]));

        let parts = g.split_node_iters(3);
        let rejoined: Vec<_> = parts.into_iter().flatten().collect();
        assert_eq!(rejoined, all);

        let mut iter = g.iter();
        iter.next();
        let copy = iter.copy(3);
        assert_eq!(copy.map(|(x, _)| x).collect::<Vec<_>>(), vec![1, 2]);
    }
}
