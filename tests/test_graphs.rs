/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;
use bvgraph::graphs::{BvGraph, ErdosRenyi, VecGraph};
use bvgraph::traits::{RandomAccessGraph, SequentialGraph};
use itertools::Itertools;

fn stored_graph(dir: &std::path::Path, n: usize, p: f64, seed: u64) -> Result<(VecGraph, BvGraph)> {
    let graph = VecGraph::from_node_iter(ErdosRenyi::new(n, p, seed).iter());
    let basename = dir.join("graph");
    BvGraph::store(&graph, &basename, &Default::default())?;
    Ok((graph, BvGraph::load(&basename)?))
}

#[test]
fn test_split_coverage() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (graph, loaded) = stored_graph(dir.path(), 1000, 0.005, 31)?;
    for how_many in [1, 2, 3, 7, 16, 1500] {
        let parts = loaded.split_node_iters(how_many);
        assert_eq!(parts.len(), how_many);
        // the concatenation is exactly the sequential scan, in order
        let rejoined = parts.into_iter().flatten().collect_vec();
        assert!(rejoined.into_iter().eq(graph.iter()), "split {}", how_many);
    }
    Ok(())
}

#[test]
fn test_split_balances_arcs() -> Result<()> {
    // a very skewed graph: arc-balanced splitting must not cut by nodes
    let n = 1000;
    let mut graph = VecGraph::empty(n);
    for target in 0..n / 2 {
        graph.add_arc(0, target);
    }
    for node in 1..n {
        graph.add_arc(node, (node + 1) % n);
    }
    let dir = tempfile::tempdir()?;
    let basename = dir.path().join("skewed");
    BvGraph::store(&graph, &basename, &Default::default())?;
    let loaded = BvGraph::load(&basename)?;

    let parts = loaded.split_node_iters(2);
    let sizes: Vec<u64> = parts
        .into_iter()
        .map(|part| part.map(|(_, succ)| succ.len() as u64).sum())
        .collect();
    assert_eq!(sizes.iter().sum::<u64>(), graph.num_arcs());
    // the first part holds the huge node and little else
    assert!(sizes[0] >= graph.num_arcs() / 2);
    assert!(sizes[0] <= graph.num_arcs() / 2 + graph.num_arcs() / 10);
    Ok(())
}

#[test]
fn test_split_node_iters_on_vec_graph() {
    let graph = VecGraph::from_node_iter(ErdosRenyi::new(123, 0.05, 5).iter());
    for how_many in [1, 2, 5, 123, 200] {
        let parts = graph.split_node_iters(how_many);
        assert_eq!(parts.len(), how_many);
        let rejoined = parts.into_iter().flatten().collect_vec();
        assert!(rejoined.into_iter().eq(graph.iter()));
    }
}

#[test]
fn test_flyweight_concurrent_traversal() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (graph, loaded) = stored_graph(dir.path(), 500, 0.01, 77)?;
    let expected: Vec<(usize, Vec<usize>)> = graph.iter().collect();

    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for _ in 0..4 {
            let copy = loaded.clone();
            let expected = &expected;
            handles.push(scope.spawn(move || {
                // sequential scan plus interleaved random access
                for (node, successors) in copy.iter() {
                    assert_eq!(&successors, &expected[node].1);
                    assert_eq!(
                        copy.successors(node).unwrap().collect_vec(),
                        expected[node].1
                    );
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    });
    Ok(())
}

#[test]
fn test_iterator_equivalence() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (graph, loaded) = stored_graph(dir.path(), 800, 0.005, 41)?;
    for from in [0, 1, 399, 799, 800] {
        let via_iter: Vec<_> = loaded.iter_from(from).collect();
        let via_random: Vec<_> = (from..graph.num_nodes())
            .map(|node| (node, loaded.successors(node).unwrap().collect_vec()))
            .collect();
        assert_eq!(via_iter, via_random, "from {}", from);
    }
    Ok(())
}

#[test]
fn test_copiable_iterators() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (graph, loaded) = stored_graph(dir.path(), 300, 0.02, 55)?;
    assert!(loaded.has_copiable_iterators());

    let mut iter = loaded.iter();
    for _ in 0..100 {
        iter.next();
    }
    let copy = iter.copy(200);
    // the copy sees [100, 200), the original is unaffected
    assert!(copy.eq(graph.iter_range(100, 200)));
    assert!(iter.eq(graph.iter_from(100)));
    Ok(())
}

#[test]
fn test_outdegrees_and_capabilities() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (graph, loaded) = stored_graph(dir.path(), 200, 0.03, 63)?;
    assert!(loaded.random_access());
    assert_eq!(loaded.num_arcs_hint(), Some(graph.num_arcs()));
    let total: usize = (0..loaded.num_nodes())
        .map(|node| loaded.outdegree(node).unwrap())
        .sum();
    assert_eq!(total as u64, loaded.num_arcs());
    Ok(())
}

#[test]
#[should_panic(expected = "out of range")]
fn test_out_of_range_node_panics() {
    let graph = VecGraph::from_arcs([(0, 1)]);
    let dir = tempfile::tempdir().unwrap();
    let basename = dir.path().join("small");
    BvGraph::store(&graph, &basename, &Default::default()).unwrap();
    let loaded = BvGraph::load(&basename).unwrap();
    let _ = loaded.successors(2);
}

#[test]
fn test_er_iterator_copy() {
    let er = ErdosRenyi::new(60, 0.1, 3);
    let mut iter = er.iter();
    for _ in 0..20 {
        iter.next();
    }
    let copy = iter.copy(40);
    assert!(copy.eq(er.iter_range(20, 40)));
    // the original continues to the end
    assert_eq!(iter.count(), 40);
}
