/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::{label_from_spec, Label};
use crate::bits::{BitRead, BitReader, BitWrite, BitWriter, StreamBitReader};
use crate::graphs::bvgraph::{
    load_offsets_table, parse_properties, resolve_graph_class, GraphClass, GraphData,
    LABELLED_GRAPH_CLASS, LABELS_EXTENSION, LABEL_OFFSETS_BIG_LIST_EXTENSION,
    LABEL_OFFSETS_EXTENSION, PROPERTIES_EXTENSION,
};
use crate::graphs::bvgraph::{build_big_list, BvGraph, BvGraphSeq};
use crate::succinct::OffsetsTable;
use crate::traits::{RandomAccessGraph, SequentialGraph};
use crate::utils::MmapHelper;
use anyhow::{bail, Context, Result};
use mmap_rs::MmapFlags;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A labelled graph storing its labels as a parallel bit stream.
///
/// Wraps an underlying graph and a stream that concatenates, in the order
/// of a full sequential traversal, the serialization of each arc's label.
/// A γ-coded offset stream (`.labeloffsets`) gives the starting bit of
/// each node's labels, so random access composes with any random-access
/// underlying graph.
///
/// Cloning is a flyweight operation when the underlying graph's is.
#[derive(Debug)]
pub struct BitStreamLabelledGraph<G> {
    graph: G,
    basename: PathBuf,
    /// The label bytes; `None` when loaded offline.
    data: Option<GraphData>,
    /// The label offsets; `None` when loaded for sequential access only.
    offsets: Option<Arc<OffsetsTable>>,
    prototype: Box<dyn Label>,
}

impl<G: Clone> Clone for BitStreamLabelledGraph<G> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            basename: self.basename.clone(),
            data: self.data.clone(),
            offsets: self.offsets.clone(),
            prototype: self.prototype.clone(),
        }
    }
}

/// What the labelled property file declares.
struct LabelProperties {
    underlying: PathBuf,
    prototype: Box<dyn Label>,
}

fn read_label_properties(basename: &Path) -> Result<LabelProperties> {
    let path = basename.with_extension(PROPERTIES_EXTENSION);
    let file = std::fs::File::open(&path)
        .with_context(|| format!("Cannot open property file {}", path.display()))?;
    let map = java_properties::read(BufReader::new(file))
        .with_context(|| format!("Cannot parse {} as a properties file", path.display()))?;

    let class = map
        .get("graphclass")
        .with_context(|| format!("Missing 'graphclass' property in {}", path.display()))?;
    if resolve_graph_class(class)? != GraphClass::BitStreamLabelled {
        bail!("{} is not a bit-stream labelled graph", path.display());
    }

    let underlying = map
        .get("underlyinggraph")
        .with_context(|| format!("Missing 'underlyinggraph' property in {}", path.display()))?;
    let underlying = PathBuf::from(underlying);
    // relative names resolve against the directory of the property file
    let underlying = if underlying.is_absolute() {
        underlying
    } else {
        match basename.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(underlying),
            _ => underlying,
        }
    };

    let spec = map
        .get("labelspec")
        .with_context(|| format!("Missing 'labelspec' property in {}", path.display()))?;
    let prototype = label_from_spec(spec)?;

    Ok(LabelProperties {
        underlying,
        prototype,
    })
}

fn load_label_offsets(basename: &Path, num_nodes: usize) -> Result<Arc<OffsetsTable>> {
    let labels_path = basename.with_extension(LABELS_EXTENSION);
    let upper_bound = labels_path
        .metadata()
        .with_context(|| format!("Cannot stat {}", labels_path.display()))?
        .len()
        * 8
        + 1;
    Ok(Arc::new(load_offsets_table(
        &basename.with_extension(LABEL_OFFSETS_EXTENSION),
        &basename.with_extension(LABEL_OFFSETS_BIG_LIST_EXTENSION),
        num_nodes + 1,
        upper_bound,
    )?))
}

/// Builds the serialized Elias–Fano label offsets cache (`.labelobl`).
pub fn build_label_offsets_big_list(basename: impl AsRef<Path>) -> Result<()> {
    let basename = basename.as_ref();
    let properties = read_label_properties(basename)?;
    let (num_nodes, _, _, _) =
        parse_properties(properties.underlying.with_extension(PROPERTIES_EXTENSION))?;
    let labels_path = basename.with_extension(LABELS_EXTENSION);
    let upper_bound = labels_path.metadata()?.len() * 8 + 1;
    build_big_list(
        &basename.with_extension(LABEL_OFFSETS_EXTENSION),
        &basename.with_extension(LABEL_OFFSETS_BIG_LIST_EXTENSION),
        num_nodes + 1,
        upper_bound,
    )
}

impl BitStreamLabelledGraph<BvGraph> {
    /// Loads the overlay and its underlying graph fully in memory
    /// (the STANDARD mode).
    pub fn load(basename: impl AsRef<Path>) -> Result<Self> {
        let basename = basename.as_ref();
        let properties = read_label_properties(basename)?;
        let graph = BvGraph::load(&properties.underlying)?;
        let labels_path = basename.with_extension(LABELS_EXTENSION);
        let bytes = std::fs::read(&labels_path)
            .with_context(|| format!("Cannot read labels file {}", labels_path.display()))?;
        let offsets = load_label_offsets(basename, graph.num_nodes())?;
        Ok(Self {
            graph,
            basename: basename.to_owned(),
            data: Some(GraphData::Memory(bytes.into())),
            offsets: Some(offsets),
            prototype: properties.prototype,
        })
    }

    /// Loads the overlay and its underlying graph memory-mapped
    /// (the MAPPED mode).
    pub fn load_mapped(basename: impl AsRef<Path>) -> Result<Self> {
        let basename = basename.as_ref();
        let properties = read_label_properties(basename)?;
        let graph = BvGraph::load_mapped(&properties.underlying)?;
        let labels_path = basename.with_extension(LABELS_EXTENSION);
        let mmap = MmapHelper::mmap(&labels_path, MmapFlags::RANDOM_ACCESS)?;
        let offsets = load_label_offsets(basename, graph.num_nodes())?;
        Ok(Self {
            graph,
            basename: basename.to_owned(),
            data: Some(GraphData::Mapped(Arc::new(mmap))),
            offsets: Some(offsets),
            prototype: properties.prototype,
        })
    }
}

impl BitStreamLabelledGraph<BvGraphSeq> {
    /// Loads the overlay for offline sequential access: neither the
    /// underlying graph nor the labels are preloaded.
    pub fn load_offline(basename: impl AsRef<Path>) -> Result<Self> {
        let basename = basename.as_ref();
        let properties = read_label_properties(basename)?;
        let graph = BvGraphSeq::load_offline(&properties.underlying)?;
        Ok(Self {
            graph,
            basename: basename.to_owned(),
            data: None,
            offsets: None,
            prototype: properties.prototype,
        })
    }
}

impl<G: SequentialGraph> BitStreamLabelledGraph<G> {
    pub fn num_nodes(&self) -> usize {
        self.graph.num_nodes()
    }

    pub fn num_arcs_hint(&self) -> Option<u64> {
        self.graph.num_arcs_hint()
    }

    /// The prototype label this overlay deserializes into.
    pub fn prototype(&self) -> &dyn Label {
        &*self.prototype
    }

    pub fn underlying(&self) -> &G {
        &self.graph
    }

    /// Iterates over nodes, successor lists and their labels, in order.
    pub fn iter(&self) -> Result<LabelledIter<G::Iter<'_>>> {
        let reader: Box<dyn BitRead> = match &self.data {
            Some(data) => Box::new(BitReader::new(data.clone())),
            None => {
                let labels_path = self.basename.with_extension(LABELS_EXTENSION);
                Box::new(StreamBitReader::new(BufReader::new(
                    std::fs::File::open(&labels_path).with_context(|| {
                        format!("Cannot open labels file {}", labels_path.display())
                    })?,
                )))
            }
        };
        Ok(LabelledIter {
            underlying: self.graph.iter(),
            reader,
            prototype: self.prototype.clone(),
            labels: vec![],
            successors: vec![],
        })
    }
}

impl<G: RandomAccessGraph> BitStreamLabelledGraph<G> {
    pub fn num_arcs(&self) -> u64 {
        self.graph.num_arcs()
    }

    pub fn outdegree(&self, node: usize) -> Result<usize> {
        self.graph.outdegree(node)
    }

    /// Returns a labelled successor iterator: each step yields the next
    /// target and deserializes the matching label.
    ///
    /// The label object is reused between steps; callers that want to
    /// keep one must clone it.
    pub fn successors(&self, node: usize) -> Result<LabelledSuccessors<G::Successors<'_>>> {
        let data = self
            .data
            .as_ref()
            .context("the labels of this graph are not loaded")?;
        let offsets = self
            .offsets
            .as_ref()
            .context("the label offsets of this graph are not loaded")?;
        let mut reader = BitReader::new(data.clone());
        reader.set_position(offsets.get(node))?;
        Ok(LabelledSuccessors {
            underlying: self.graph.successors(node)?,
            reader: Box::new(reader),
            label: self.prototype.clone(),
            source: node,
        })
    }
}

/// The random-access labelled successor iterator.
pub struct LabelledSuccessors<S> {
    underlying: S,
    reader: Box<dyn BitRead>,
    label: Box<dyn Label>,
    source: usize,
}

impl<S> LabelledSuccessors<S> {
    /// The label of the arc returned by the last `next`.
    ///
    /// The same object is overwritten at every step.
    pub fn label(&self) -> &dyn Label {
        &*self.label
    }
}

impl<S: Iterator<Item = usize>> Iterator for LabelledSuccessors<S> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let successor = self.underlying.next()?;
        self.label
            .read(&mut *self.reader, self.source)
            .expect("error decoding a label");
        Some(successor)
    }
}

/// The sequential labelled iterator: decodes each node's labels in
/// traversal order, reusing one buffer of label objects.
pub struct LabelledIter<I> {
    underlying: I,
    reader: Box<dyn BitRead>,
    prototype: Box<dyn Label>,
    labels: Vec<Box<dyn Label>>,
    successors: Vec<usize>,
}

impl<I: Iterator<Item = (usize, Vec<usize>)>> LabelledIter<I> {
    /// Advances to the next node, returning its successors and labels.
    ///
    /// The returned slices borrow buffers that the following call
    /// overwrites.
    #[allow(clippy::type_complexity)]
    pub fn next_node(&mut self) -> Result<Option<(usize, &[usize], &[Box<dyn Label>])>> {
        let Some((node, successors)) = self.underlying.next() else {
            return Ok(None);
        };
        while self.labels.len() < successors.len() {
            self.labels.push(self.prototype.clone());
        }
        for i in 0..successors.len() {
            self.labels[i]
                .read(&mut *self.reader, node)
                .with_context(|| format!("Cannot decode a label of node {}", node))?;
        }
        self.successors = successors;
        Ok(Some((
            node,
            &self.successors,
            &self.labels[..self.successors.len()],
        )))
    }
}

/// Stores the labels of `graph` under `basename`, producing the
/// `.labels`, `.labeloffsets` and `.properties` artifacts.
///
/// The labels come from `fill`, which is handed each arc in traversal
/// order together with the prototype to overwrite. `underlying` is the
/// basename recorded for the underlying graph, resolved at load time
/// relative to the property file unless absolute.
///
/// Writes are temp-then-rename, as for graphs.
pub fn store_labels<G, L, F>(
    graph: &G,
    basename: impl AsRef<Path>,
    underlying: &str,
    mut prototype: L,
    mut fill: F,
) -> Result<()>
where
    G: SequentialGraph,
    L: Label,
    F: FnMut(usize, usize, &mut L),
{
    let basename = basename.as_ref();
    let dir = match basename.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let labels_tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Cannot create a temporary file in {}", dir.display()))?;
    let offsets_tmp = tempfile::NamedTempFile::new_in(dir)?;
    let properties_tmp = tempfile::NamedTempFile::new_in(dir)?;

    {
        let mut labels_writer =
            BitWriter::new(std::io::BufWriter::new(labels_tmp.as_file().try_clone()?));
        let mut offsets_writer =
            BitWriter::new(std::io::BufWriter::new(offsets_tmp.as_file().try_clone()?));
        offsets_writer.write_gamma(0)?;
        for (node, successors) in graph.iter() {
            let mut bits = 0u64;
            for successor in successors {
                fill(node, successor, &mut prototype);
                bits += prototype.write(&mut labels_writer, node)? as u64;
            }
            offsets_writer.write_gamma(bits)?;
        }
        labels_writer.flush()?;
        offsets_writer.flush()?;
    }

    let properties = format!(
        "graphclass={}\nunderlyinggraph={}\nlabelspec={}\n",
        LABELLED_GRAPH_CLASS,
        underlying,
        prototype.to_spec()
    );
    std::fs::write(properties_tmp.path(), properties)?;

    labels_tmp.as_file().sync_all()?;
    offsets_tmp.as_file().sync_all()?;
    properties_tmp.as_file().sync_all()?;

    labels_tmp
        .persist(basename.with_extension(LABELS_EXTENSION))
        .context("Cannot persist the labels file")?;
    offsets_tmp
        .persist(basename.with_extension(LABEL_OFFSETS_EXTENSION))
        .context("Cannot persist the label offsets file")?;
    properties_tmp
        .persist(basename.with_extension(PROPERTIES_EXTENSION))
        .context("Cannot persist the properties file")?;
    Ok(())
}
