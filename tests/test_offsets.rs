/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;
use bvgraph::bits::{BitRead, BitReader};
use bvgraph::graphs::bvgraph::build_offsets_big_list;
use bvgraph::graphs::{BvGraph, ErdosRenyi, VecGraph};
use bvgraph::traits::{RandomAccessGraph, SequentialGraph};

fn test_graph() -> VecGraph {
    VecGraph::from_node_iter(ErdosRenyi::new(500, 0.01, 9).iter())
}

/// Decodes the γ-coded offsets stream: n + 1 partial sums.
fn read_offsets(basename: &std::path::Path, num_nodes: usize) -> Result<Vec<u64>> {
    let data = std::fs::read(basename.with_extension("offsets"))?;
    let mut reader = BitReader::new(data.as_slice());
    let mut offsets = Vec::with_capacity(num_nodes + 1);
    let mut offset = 0;
    for _ in 0..num_nodes + 1 {
        offset += reader.read_gamma()?;
        offsets.push(offset);
    }
    Ok(offsets)
}

#[test]
fn test_offsets_match_block_positions() -> Result<()> {
    let graph = test_graph();
    let dir = tempfile::tempdir()?;
    let basename = dir.path().join("offsets");
    let stats = BvGraph::store(&graph, &basename, &Default::default())?;

    let offsets = read_offsets(&basename, graph.num_nodes())?;
    assert_eq!(offsets.len(), graph.num_nodes() + 1);
    assert_eq!(offsets[0], 0);
    // the sentinel is the bit length of the graph stream
    assert_eq!(*offsets.last().unwrap(), stats.written_bits);
    assert!(offsets.windows(2).all(|w| w[0] <= w[1]));

    // each offset is the bit position where the block actually starts
    let loaded = BvGraph::load(&basename)?;
    let positions: Vec<u64> = loaded.offset_deg_iter()?.map(|(offset, _)| offset).collect();
    assert_eq!(&offsets[..graph.num_nodes()], positions.as_slice());

    // and the degrees seen while skipping blocks are the true outdegrees
    let degrees: Vec<usize> = loaded.offset_deg_iter()?.map(|(_, degree)| degree).collect();
    for (node, &degree) in degrees.iter().enumerate() {
        assert_eq!(degree, graph.outdegree(node)?);
    }
    Ok(())
}

#[test]
fn test_offsets_big_list_cache() -> Result<()> {
    let graph = test_graph();
    let dir = tempfile::tempdir()?;
    let basename = dir.path().join("cached");
    BvGraph::store(&graph, &basename, &Default::default())?;

    build_offsets_big_list(&basename)?;
    assert!(basename.with_extension("obl").exists());

    // the cache must produce exactly the same graph
    let loaded = BvGraph::load(&basename)?;
    assert!(loaded.iter().eq(graph.iter()));
    Ok(())
}

#[test]
fn test_unreadable_cache_falls_back() -> Result<()> {
    let graph = test_graph();
    let dir = tempfile::tempdir()?;
    let basename = dir.path().join("badcache");
    BvGraph::store(&graph, &basename, &Default::default())?;

    // a cache from a different version of the structure
    std::fs::write(basename.with_extension("obl"), b"not an offsets list")?;
    let loaded = BvGraph::load(&basename)?;
    assert!(loaded.iter().eq(graph.iter()));
    Ok(())
}
