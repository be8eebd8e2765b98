/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;
use bvgraph::graphs::{BvGraph, ErdosRenyi, VecGraph};
use bvgraph::labels::{
    build_label_offsets_big_list, store_labels, BitStreamLabelledGraph, FixedWidthIntLabel,
    GammaCodedIntLabel,
};
use bvgraph::traits::{RandomAccessGraph, SequentialGraph};
use itertools::Itertools;

/// The label every arc is expected to carry.
fn arc_label(src: usize, dst: usize) -> u64 {
    ((src * 31 + dst * 7) % 60000) as u64
}

/// Stores a graph and a labelling over it, in one directory.
fn store_labelled(dir: &std::path::Path, graph: &VecGraph) -> Result<std::path::PathBuf> {
    let graph_basename = dir.join("underlying");
    BvGraph::store(graph, &graph_basename, &Default::default())?;

    let labels_basename = dir.join("labelled");
    store_labels(
        graph,
        &labels_basename,
        // relative on purpose: resolved against the property file
        "underlying",
        FixedWidthIntLabel::new("weight", 16),
        |src, dst, label| label.value = arc_label(src, dst),
    )?;
    Ok(labels_basename)
}

fn check_random_access(
    labelled: &BitStreamLabelledGraph<BvGraph>,
    graph: &VecGraph,
) -> Result<()> {
    assert_eq!(labelled.num_nodes(), graph.num_nodes());
    assert_eq!(labelled.num_arcs(), graph.num_arcs());
    for node in 0..graph.num_nodes() {
        assert_eq!(labelled.outdegree(node)?, graph.outdegree(node)?);
        let mut iter = labelled.successors(node)?;
        let mut seen = Vec::new();
        while let Some(successor) = iter.next() {
            let label = iter
                .label()
                .as_any()
                .downcast_ref::<FixedWidthIntLabel>()
                .expect("the prototype is a fixed-width label");
            assert_eq!(label.value, arc_label(node, successor));
            seen.push(successor);
        }
        assert_eq!(seen, graph.successors(node)?.collect_vec());
    }
    Ok(())
}

#[test]
fn test_labelled_round_trip() -> Result<()> {
    let graph = VecGraph::from_node_iter(ErdosRenyi::new(400, 0.01, 21).iter());
    let dir = tempfile::tempdir()?;
    let basename = store_labelled(dir.path(), &graph)?;

    let labelled = BitStreamLabelledGraph::load(&basename)?;
    check_random_access(&labelled, &graph)?;

    let mapped = BitStreamLabelledGraph::load_mapped(&basename)?;
    check_random_access(&mapped, &graph)?;
    Ok(())
}

#[test]
fn test_labelled_sequential_iteration() -> Result<()> {
    let graph = VecGraph::from_node_iter(ErdosRenyi::new(300, 0.01, 13).iter());
    let dir = tempfile::tempdir()?;
    let basename = store_labelled(dir.path(), &graph)?;

    // in-memory sequential traversal
    let labelled = BitStreamLabelledGraph::load(&basename)?;
    let mut iter = labelled.iter()?;
    let mut expected = graph.iter();
    while let Some((node, successors, labels)) = iter.next_node()? {
        let (expected_node, expected_successors) = expected.next().unwrap();
        assert_eq!(node, expected_node);
        assert_eq!(successors, expected_successors.as_slice());
        for (&successor, label) in successors.iter().zip(labels) {
            let label = label
                .as_any()
                .downcast_ref::<FixedWidthIntLabel>()
                .unwrap();
            assert_eq!(label.value, arc_label(node, successor));
        }
    }
    assert!(expected.next().is_none());

    // offline: both the graph and the labels are streamed from disk
    let offline = BitStreamLabelledGraph::load_offline(&basename)?;
    assert_eq!(offline.num_nodes(), graph.num_nodes());
    let mut iter = offline.iter()?;
    let mut count = 0u64;
    while let Some((node, successors, labels)) = iter.next_node()? {
        for (&successor, label) in successors.iter().zip(labels) {
            let label = label
                .as_any()
                .downcast_ref::<FixedWidthIntLabel>()
                .unwrap();
            assert_eq!(label.value, arc_label(node, successor));
            count += 1;
        }
    }
    assert_eq!(count, graph.num_arcs());
    Ok(())
}

#[test]
fn test_label_object_is_reused() -> Result<()> {
    let graph = VecGraph::from_arcs([(0, 1), (0, 2), (0, 5)]);
    let dir = tempfile::tempdir()?;
    let basename = store_labelled(dir.path(), &graph)?;
    let labelled = BitStreamLabelledGraph::load(&basename)?;

    let mut iter = labelled.successors(0)?;
    let mut previous: Option<u64> = None;
    while let Some(successor) = iter.next() {
        let value = iter
            .label()
            .as_any()
            .downcast_ref::<FixedWidthIntLabel>()
            .unwrap()
            .value;
        // the iterator hands back the same object with a new value, so a
        // caller that wants history has to copy
        assert_eq!(value, arc_label(0, successor));
        if let Some(previous) = previous {
            assert_ne!(value, previous);
        }
        previous = Some(value);
    }
    Ok(())
}

#[test]
fn test_gamma_coded_labels() -> Result<()> {
    let graph = VecGraph::from_node_iter(ErdosRenyi::new(200, 0.02, 17).iter());
    let dir = tempfile::tempdir()?;
    let graph_basename = dir.path().join("underlying");
    BvGraph::store(&graph, &graph_basename, &Default::default())?;

    let basename = dir.path().join("gammalabels");
    store_labels(
        &graph,
        &basename,
        "underlying",
        GammaCodedIntLabel::new("delay"),
        |src, dst, label| label.value = arc_label(src, dst) * 3,
    )?;

    let labelled = BitStreamLabelledGraph::load(&basename)?;
    for node in 0..graph.num_nodes() {
        let mut iter = labelled.successors(node)?;
        while let Some(successor) = iter.next() {
            let label = iter
                .label()
                .as_any()
                .downcast_ref::<GammaCodedIntLabel>()
                .unwrap();
            assert_eq!(label.value, arc_label(node, successor) * 3);
        }
    }
    Ok(())
}

#[test]
fn test_label_offsets_cache() -> Result<()> {
    let graph = VecGraph::from_node_iter(ErdosRenyi::new(250, 0.01, 19).iter());
    let dir = tempfile::tempdir()?;
    let basename = store_labelled(dir.path(), &graph)?;

    build_label_offsets_big_list(&basename)?;
    assert!(basename.with_extension("labelobl").exists());
    let labelled = BitStreamLabelledGraph::load(&basename)?;
    check_random_access(&labelled, &graph)?;

    // an unreadable cache is only worth a warning
    std::fs::write(basename.with_extension("labelobl"), b"garbage")?;
    let labelled = BitStreamLabelledGraph::load(&basename)?;
    check_random_access(&labelled, &graph)?;
    Ok(())
}

#[test]
fn test_labelled_properties_content() -> Result<()> {
    let graph = VecGraph::from_arcs([(0, 1), (1, 2)]);
    let dir = tempfile::tempdir()?;
    let basename = store_labelled(dir.path(), &graph)?;
    let contents = std::fs::read_to_string(basename.with_extension("properties"))?;
    assert!(contents.contains("graphclass=BitStreamLabelledGraph"));
    assert!(contents.contains("underlyinggraph=underlying"));
    assert!(contents.contains("labelspec=FixedWidthIntLabel(weight,16)"));
    Ok(())
}

#[test]
fn test_flyweight_labelled_copy() -> Result<()> {
    let graph = VecGraph::from_node_iter(ErdosRenyi::new(150, 0.03, 23).iter());
    let dir = tempfile::tempdir()?;
    let basename = store_labelled(dir.path(), &graph)?;
    let labelled = BitStreamLabelledGraph::load(&basename)?;
    let copy = labelled.clone();

    // interleave two traversals of the same node: the copies do not share
    // decode state
    let mut a = labelled.successors(0)?;
    let mut b = copy.successors(0)?;
    loop {
        let x = a.next();
        let y = b.next();
        assert_eq!(x, y);
        if x.is_none() {
            break;
        }
    }
    Ok(())
}
