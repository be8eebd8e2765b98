/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;
use bvgraph::graphs::{BvGraph, ErdosRenyi, VecGraph};
use bvgraph::succinct::CumulativeOutdegreeList;
use bvgraph::traits::SequentialGraph;

/// Reference answer: the smallest j ≥ 1 with C[j] ≥ bound and
/// (j & mask) == 0, saturating at n.
fn reference_skip(cumulative: &[u64], bound: u64, mask: u64) -> (usize, u64) {
    let n = cumulative.len() - 1;
    let mut j = cumulative.partition_point(|&c| c < bound).max(1);
    while j < n && (j as u64 & mask) != 0 {
        j += 1;
    }
    let j = j.min(n);
    (j, cumulative[j])
}

fn prefix_sums<G: SequentialGraph>(graph: &G) -> Vec<u64> {
    let mut cumulative = vec![0u64];
    for (_, successors) in graph.iter() {
        cumulative.push(cumulative.last().unwrap() + successors.len() as u64);
    }
    cumulative
}

#[test]
fn test_skip_to_on_erdos_renyi() -> Result<()> {
    let graph = VecGraph::from_node_iter(ErdosRenyi::new(10000, 0.001, 0).iter());
    let cumulative = prefix_sums(&graph);
    let m = *cumulative.last().unwrap();
    assert!(m > 0);

    for mask in [0u64, 1, 3] {
        let mut list = CumulativeOutdegreeList::from_graph(&graph, mask)?;
        assert_eq!(list.current_index(), -1);
        for bound in 1..=m {
            let value = list.skip_to(bound);
            let (j, c) = reference_skip(&cumulative, bound, mask);
            assert_eq!(list.current_index(), j as isize, "bound {bound}, mask {mask}");
            assert_eq!(value, c, "bound {bound}, mask {mask}");
            assert_eq!((list.current_index() as u64) & mask, 0);
            assert_eq!(list.current_value(), Some(c));
        }
    }
    Ok(())
}

#[test]
fn test_skip_to_is_not_trapped_at_the_sentinel() -> Result<()> {
    let graph = VecGraph::from_node_iter(ErdosRenyi::new(1000, 0.005, 4).iter());
    let cumulative = prefix_sums(&graph);
    let m = *cumulative.last().unwrap();
    let mut list = CumulativeOutdegreeList::from_graph(&graph, 0)?;

    // drive the cursor to the end, then restart from small bounds
    assert_eq!(list.skip_to(m), m);
    for bound in [1, m / 2, 2, m, 1] {
        let (j, c) = reference_skip(&cumulative, bound, 0);
        assert_eq!(list.skip_to(bound), c);
        assert_eq!(list.current_index(), j as isize);
    }
    Ok(())
}

#[test]
fn test_exact_boundaries_with_zero_mask() -> Result<()> {
    let graph = VecGraph::from_node_iter(ErdosRenyi::new(500, 0.01, 2).iter());
    let cumulative = prefix_sums(&graph);
    let n = graph.num_nodes();
    let mut list = CumulativeOutdegreeList::from_graph(&graph, 0)?;

    // skipping exactly to C[i] (when it grows) must stop at index i
    for i in 1..n {
        if cumulative[i] > cumulative[i - 1] {
            list.skip_to(cumulative[i]);
            assert_eq!(list.current_index(), i as isize);
        }
    }
    Ok(())
}

#[test]
fn test_empty_graph() -> Result<()> {
    let graph = VecGraph::new();
    let list = CumulativeOutdegreeList::from_graph(&graph, 0)?;
    assert_eq!(list.current_index(), -1);
    Ok(())
}

#[test]
fn test_bvgraph_cumulative_agrees_with_scan() -> Result<()> {
    let graph = VecGraph::from_node_iter(ErdosRenyi::new(2000, 0.002, 6).iter());
    let dir = tempfile::tempdir()?;
    let basename = dir.path().join("cumulative");
    BvGraph::store(&graph, &basename, &Default::default())?;
    let loaded = BvGraph::load(&basename)?;

    let cumulative = prefix_sums(&graph);
    let m = *cumulative.last().unwrap();
    for mask in [0u64, 3] {
        let mut list = loaded.cumulative_outdegrees(mask)?;
        let mut bound = 1;
        while bound <= m {
            let value = list.skip_to(bound);
            let (j, c) = reference_skip(&cumulative, bound, mask);
            assert_eq!(list.current_index(), j as isize);
            assert_eq!(value, c);
            bound = c + 1;
        }
    }
    Ok(())
}
