/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::flags::{CompFlags, PropertiesError};
use super::random_access::BvGraph;
use super::sequential::{BvGraphSeq, SeqSource};
use crate::bits::{BitRead, BitReader, StreamBitReader};
use crate::succinct::{EliasFano, EliasFanoBuilder, OffsetsTable};
use crate::utils::MmapHelper;
use anyhow::{bail, Context, Result};
use epserde::prelude::*;
use mmap_rs::MmapFlags;
use std::cell::RefCell;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

pub const GRAPH_EXTENSION: &str = "graph";
pub const OFFSETS_EXTENSION: &str = "offsets";
pub const PROPERTIES_EXTENSION: &str = "properties";
pub const OFFSETS_BIG_LIST_EXTENSION: &str = "obl";
pub const LABELS_EXTENSION: &str = "labels";
pub const LABEL_OFFSETS_EXTENSION: &str = "labeloffsets";
pub const LABEL_OFFSETS_BIG_LIST_EXTENSION: &str = "labelobl";

/// The graph class name written in the `.properties` of compressed graphs.
pub(crate) const GRAPH_CLASS: &str = "BvGraph";
/// The graph class name of the labelled overlay.
pub(crate) const LABELLED_GRAPH_CLASS: &str = "BitStreamLabelledGraph";

/// The implementations the on-disk `graphclass` can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphClass {
    BvGraph,
    BitStreamLabelled,
}

/// Maps a `graphclass` property to a known implementation.
///
/// Stands in for the class loading of the original format: the Java class
/// names are recognized, a stray `class ` prefix is stripped, and package
/// prefixes are ignored, so property files written by either library
/// resolve. Unknown names are a format error.
pub fn resolve_graph_class(name: &str) -> Result<GraphClass, PropertiesError> {
    let name = name.trim();
    let name = name.strip_prefix("class ").unwrap_or(name);
    let simple = name.rsplit('.').next().unwrap_or(name);
    match simple {
        "BvGraph" | "BVGraph" => Ok(GraphClass::BvGraph),
        "BitStreamLabelledGraph" | "BitStreamArcLabelledImmutableGraph" => {
            Ok(GraphClass::BitStreamLabelled)
        }
        _ => Err(PropertiesError::UnknownGraphClass(name.to_owned())),
    }
}

/// The shared read-only backing of a graph bit stream.
///
/// Flyweight copies of a graph clone this handle: the bytes (or mapped
/// pages) are shared, the bit cursors are not.
#[derive(Debug, Clone)]
pub enum GraphData {
    Memory(Arc<[u8]>),
    Mapped(Arc<MmapHelper>),
}

impl AsRef<[u8]> for GraphData {
    #[inline(always)]
    fn as_ref(&self) -> &[u8] {
        match self {
            GraphData::Memory(bytes) => bytes,
            GraphData::Mapped(mmap) => mmap.as_ref().as_ref(),
        }
    }
}

/// Reads a `.properties` file, returning nodes, arcs, flags and the raw
/// `graphclass` string.
pub fn parse_properties(path: impl AsRef<Path>) -> Result<(usize, u64, CompFlags, String)> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Cannot open property file {}", path.display()))?;
    let map = java_properties::read(BufReader::new(file))
        .with_context(|| format!("Cannot parse {} as a properties file", path.display()))?;

    let graph_class = map
        .get("graphclass")
        .ok_or(PropertiesError::MissingProperty {
            property: "graphclass",
        })?
        .clone();
    let num_nodes = map
        .get("nodes")
        .ok_or(PropertiesError::MissingProperty { property: "nodes" })?
        .trim()
        .parse::<usize>()
        .with_context(|| format!("Cannot parse 'nodes' in {}", path.display()))?;
    let num_arcs = map
        .get("arcs")
        .ok_or(PropertiesError::MissingProperty { property: "arcs" })?
        .trim()
        .parse::<u64>()
        .with_context(|| format!("Cannot parse 'arcs' in {}", path.display()))?;
    let flags = CompFlags::from_properties(&map)
        .with_context(|| format!("Cannot parse compression flags in {}", path.display()))?;
    Ok((num_nodes, num_arcs, flags, graph_class))
}

/// Loads an offsets table from its γ-coded stream, preferring a
/// serialized Elias–Fano cache when one is present and sound.
///
/// A cache that fails to deserialize or has the wrong number of entries
/// is reported with a warning and ignored; loading then falls back to
/// decoding the stream, which is slower but always available.
/// `upper_bound` must exceed every offset (the bit length of the file the
/// offsets point into is enough).
pub(crate) fn load_offsets_table(
    offsets_path: &Path,
    obl_path: &Path,
    count: usize,
    upper_bound: u64,
) -> Result<OffsetsTable> {
    if obl_path.exists() {
        match EliasFano::load_full(obl_path) {
            Ok(ef) if ef.len() == count => return Ok(OffsetsTable::from(ef)),
            Ok(ef) => log::warn!(
                "cached offset list {} has {} entries instead of {}, rebuilding",
                obl_path.display(),
                ef.len(),
                count
            ),
            Err(e) => log::warn!(
                "cannot deserialize cached offset list {}: {}, rebuilding",
                obl_path.display(),
                e
            ),
        }
    }
    let data = std::fs::read(offsets_path)
        .with_context(|| format!("Cannot read offsets file {}", offsets_path.display()))?;
    let mut reader = BitReader::new(data.as_slice());
    let mut offset = 0u64;
    OffsetsTable::build(
        count,
        upper_bound,
        (0..count).map(move |_| {
            let delta = reader.read_gamma()?;
            offset += delta;
            Ok(offset)
        }),
    )
    .with_context(|| format!("Cannot decode offsets from {}", offsets_path.display()))
}

/// Serializes the Elias–Fano form of a γ-coded offsets stream.
pub(crate) fn build_big_list(
    offsets_path: &Path,
    obl_path: &Path,
    count: usize,
    upper_bound: u64,
) -> Result<()> {
    let data = std::fs::read(offsets_path)
        .with_context(|| format!("Cannot read offsets file {}", offsets_path.display()))?;
    let mut reader = BitReader::new(data.as_slice());
    let mut builder = EliasFanoBuilder::new(count, upper_bound);
    let mut offset = 0u64;
    for _ in 0..count {
        offset += reader.read_gamma()?;
        builder.push(offset)?;
    }
    builder
        .build()
        .store(obl_path)
        .with_context(|| format!("Cannot serialize offsets to {}", obl_path.display()))?;
    Ok(())
}

fn graph_bit_bound(graph_path: &Path) -> Result<u64> {
    Ok(graph_path
        .metadata()
        .with_context(|| format!("Cannot stat {}", graph_path.display()))?
        .len()
        * 8
        + 1)
}

fn load_offsets(basename: &Path, num_nodes: usize, graph_path: &Path) -> Result<OffsetsTable> {
    load_offsets_table(
        &basename.with_extension(OFFSETS_EXTENSION),
        &basename.with_extension(OFFSETS_BIG_LIST_EXTENSION),
        num_nodes + 1,
        graph_bit_bound(graph_path)?,
    )
}

/// Builds the serialized Elias–Fano offsets cache (`.obl`), which later
/// loads will pick up instead of γ-decoding the offsets stream.
pub fn build_offsets_big_list(basename: impl AsRef<Path>) -> Result<()> {
    let basename = basename.as_ref();
    let (num_nodes, _, _, _) = parse_properties(basename.with_extension(PROPERTIES_EXTENSION))?;
    let graph_path = basename.with_extension(GRAPH_EXTENSION);
    build_big_list(
        &basename.with_extension(OFFSETS_EXTENSION),
        &basename.with_extension(OFFSETS_BIG_LIST_EXTENSION),
        num_nodes + 1,
        graph_bit_bound(&graph_path)?,
    )
}

fn check_class(graph_class: &str) -> Result<()> {
    match resolve_graph_class(graph_class)? {
        GraphClass::BvGraph => Ok(()),
        other => bail!(
            "graph class {} ({:?}) is not a plain compressed graph",
            graph_class,
            other
        ),
    }
}

impl BvGraph {
    /// Loads a graph for random access, with the graph bytes and the
    /// offsets in memory (the STANDARD mode).
    pub fn load(basename: impl AsRef<Path>) -> Result<Self> {
        let basename = basename.as_ref();
        let (num_nodes, num_arcs, flags, graph_class) =
            parse_properties(basename.with_extension(PROPERTIES_EXTENSION))?;
        check_class(&graph_class)?;
        let graph_path = basename.with_extension(GRAPH_EXTENSION);
        let bytes = std::fs::read(&graph_path)
            .with_context(|| format!("Cannot read graph file {}", graph_path.display()))?;
        let offsets = load_offsets(basename, num_nodes, &graph_path)?;
        Ok(BvGraph::new(
            GraphData::Memory(bytes.into()),
            Arc::new(offsets),
            flags,
            num_nodes,
            num_arcs,
        ))
    }

    /// Loads a graph for random access with the graph memory-mapped
    /// read-only and the offsets in memory (the MAPPED mode).
    pub fn load_mapped(basename: impl AsRef<Path>) -> Result<Self> {
        let basename = basename.as_ref();
        let (num_nodes, num_arcs, flags, graph_class) =
            parse_properties(basename.with_extension(PROPERTIES_EXTENSION))?;
        check_class(&graph_class)?;
        let graph_path = basename.with_extension(GRAPH_EXTENSION);
        let mmap = MmapHelper::mmap(&graph_path, MmapFlags::RANDOM_ACCESS)?;
        let offsets = load_offsets(basename, num_nodes, &graph_path)?;
        Ok(BvGraph::new(
            GraphData::Mapped(Arc::new(mmap)),
            Arc::new(offsets),
            flags,
            num_nodes,
            num_arcs,
        ))
    }
}

impl BvGraphSeq {
    /// Loads a graph for sequential access with the graph bytes in
    /// memory but no offsets.
    pub fn load(basename: impl AsRef<Path>) -> Result<Self> {
        let basename = basename.as_ref();
        let (num_nodes, num_arcs, flags, graph_class) =
            parse_properties(basename.with_extension(PROPERTIES_EXTENSION))?;
        check_class(&graph_class)?;
        let graph_path = basename.with_extension(GRAPH_EXTENSION);
        let bytes = std::fs::read(&graph_path)
            .with_context(|| format!("Cannot read graph file {}", graph_path.display()))?;
        Ok(BvGraphSeq::new(
            SeqSource::Bytes(GraphData::Memory(bytes.into())),
            flags,
            num_nodes,
            Some(num_arcs),
        ))
    }

    /// Loads a graph for offline access: nothing is preloaded, every
    /// traversal streams the graph file (the OFFLINE mode).
    pub fn load_offline(basename: impl AsRef<Path>) -> Result<Self> {
        let basename = basename.as_ref();
        let (num_nodes, num_arcs, flags, graph_class) =
            parse_properties(basename.with_extension(PROPERTIES_EXTENSION))?;
        check_class(&graph_class)?;
        Ok(BvGraphSeq::new(
            SeqSource::File(basename.with_extension(GRAPH_EXTENSION)),
            flags,
            num_nodes,
            Some(num_arcs),
        ))
    }

    /// Wraps an already-open graph bit stream for a single sequential
    /// traversal (the ONCE mode). A second traversal fails.
    ///
    /// The stream must carry the `.graph` bits; the parameters that would
    /// normally come from the property file are taken from the caller.
    pub fn load_once(
        reader: impl std::io::Read + 'static,
        flags: CompFlags,
        num_nodes: usize,
        num_arcs: Option<u64>,
    ) -> Self {
        let reader: Box<dyn BitRead> = Box::new(StreamBitReader::new(reader));
        BvGraphSeq::new(
            SeqSource::Once(RefCell::new(Some(reader))),
            flags,
            num_nodes,
            num_arcs,
        )
    }
}
