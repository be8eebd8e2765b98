/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::codecs::{DynEncoder, DynEstimator, Encode};
use super::flags::CompFlags;
use super::load::{GRAPH_CLASS, GRAPH_EXTENSION, OFFSETS_EXTENSION, PROPERTIES_EXTENSION};
use super::random_access::BvGraph;
use crate::bits::{BitWrite, BitWriter};
use crate::traits::SequentialGraph;
use crate::utils::{int2nat, CircularBuffer};
use anyhow::{ensure, Context, Result};
use std::io::BufWriter;
use std::path::Path;

/// The decomposition of one successor list against one candidate
/// reference: copy blocks, intervals and residuals.
///
/// A struct rather than a function so the compressor can keep one per
/// window slot and recycle the allocations.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Compressor {
    outdegree: usize,
    blocks: Vec<usize>,
    extra_nodes: Vec<usize>,
    left_interval: Vec<usize>,
    len_interval: Vec<usize>,
    residuals: Vec<usize>,
}

impl Compressor {
    /// With this minimum interval length no intervalization is performed.
    const NO_INTERVALS: usize = 0;

    fn new() -> Self {
        Compressor {
            outdegree: 0,
            blocks: Vec::with_capacity(1024),
            extra_nodes: Vec::with_capacity(1024),
            left_interval: Vec::with_capacity(1024),
            len_interval: Vec::with_capacity(1024),
            residuals: Vec::with_capacity(1024),
        }
    }

    fn clear(&mut self) {
        self.outdegree = 0;
        self.blocks.clear();
        self.extra_nodes.clear();
        self.left_interval.clear();
        self.len_interval.clear();
        self.residuals.clear();
    }

    /// Fills the buffers for `curr_list`, differentially against
    /// `ref_list` if one is given.
    fn compress(
        &mut self,
        curr_list: &[usize],
        ref_list: Option<&[usize]>,
        min_interval_length: usize,
    ) {
        self.clear();
        self.outdegree = curr_list.len();
        if self.outdegree == 0 {
            return;
        }
        if let Some(ref_list) = ref_list {
            self.diff_comp(curr_list, ref_list);
        } else {
            self.extra_nodes.extend_from_slice(curr_list);
        }
        if !self.extra_nodes.is_empty() {
            if min_interval_length != Self::NO_INTERVALS {
                self.intervalize(min_interval_length);
            } else {
                self.residuals.extend_from_slice(&self.extra_nodes);
            }
        }
        debug_assert_eq!(self.left_interval.len(), self.len_interval.len());
    }

    /// Extracts from the extra nodes the maximal runs of consecutive
    /// integers at least `min_interval_length` long; the rest become
    /// residuals.
    fn intervalize(&mut self, min_interval_length: usize) {
        let total = self.extra_nodes.len();
        let mut i = 0;
        while i < total {
            let mut run = 0;
            if i < total - 1 && self.extra_nodes[i] + 1 == self.extra_nodes[i + 1] {
                run += 1;
                while i + run < total - 1 && self.extra_nodes[i + run] + 1 == self.extra_nodes[i + run + 1]
                {
                    run += 1;
                }
                run += 1;
                // run is now the length of the run starting at i
                if run >= min_interval_length {
                    self.left_interval.push(self.extra_nodes[i]);
                    self.len_interval.push(run);
                    i += run - 1;
                }
            }
            if run < min_interval_length {
                self.residuals.push(self.extra_nodes[i]);
            }
            i += 1;
        }
    }

    /// Computes the alternating copy/skip runs over the reference list.
    ///
    /// The first run is a copy run (possibly empty) and the last is not
    /// recorded unless copying stopped before the end of the reference.
    fn diff_comp(&mut self, curr_list: &[usize], ref_list: &[usize]) {
        let mut j = 0; // next successor of the current node
        let mut k = 0; // next successor of the reference node
        let mut curr_block_len = 0;
        let mut copying = true;

        while j < curr_list.len() && k < ref_list.len() {
            if copying {
                match curr_list[j].cmp(&ref_list[k]) {
                    core::cmp::Ordering::Greater => {
                        // we trespassed the reference: the copy run ends
                        self.blocks.push(curr_block_len);
                        copying = false;
                        curr_block_len = 0;
                    }
                    core::cmp::Ordering::Less => {
                        self.extra_nodes.push(curr_list[j]);
                        j += 1;
                    }
                    core::cmp::Ordering::Equal => {
                        j += 1;
                        k += 1;
                        curr_block_len += 1;
                    }
                }
            } else {
                match curr_list[j].cmp(&ref_list[k]) {
                    core::cmp::Ordering::Greater => {
                        k += 1;
                        curr_block_len += 1;
                    }
                    core::cmp::Ordering::Less => {
                        self.extra_nodes.push(curr_list[j]);
                        j += 1;
                    }
                    core::cmp::Ordering::Equal => {
                        self.blocks.push(curr_block_len);
                        copying = true;
                        curr_block_len = 0;
                    }
                }
            }
        }
        if copying && k < ref_list.len() {
            self.blocks.push(curr_block_len);
        }
        while j < curr_list.len() {
            self.extra_nodes.push(curr_list[j]);
            j += 1;
        }
        // the first run length is written as-is, the others shifted by one
        if !self.blocks.is_empty() {
            self.blocks[0] += 1;
        }
    }

    /// Writes the buffered decomposition and returns the number of bits.
    ///
    /// `reference_offset` is `None` when the graph is compressed without a
    /// window (no reference stream at all).
    fn write<E: Encode>(
        &self,
        encoder: &mut E,
        curr_node: usize,
        reference_offset: Option<usize>,
        min_interval_length: usize,
    ) -> Result<u64> {
        let mut written: u64 = 0;
        written += encoder.write_outdegree(self.outdegree as u64)? as u64;
        if self.outdegree == 0 {
            return Ok(written);
        }
        if let Some(reference_offset) = reference_offset {
            written += encoder.write_reference_offset(reference_offset as u64)? as u64;
            if reference_offset != 0 {
                written += encoder.write_block_count(self.blocks.len() as u64)? as u64;
                for &block in &self.blocks {
                    written += encoder.write_block(block as u64 - 1)? as u64;
                }
            }
        }
        if !self.extra_nodes.is_empty() && min_interval_length != Self::NO_INTERVALS {
            written += encoder.write_interval_count(self.left_interval.len() as u64)? as u64;
            if !self.left_interval.is_empty() {
                written += encoder.write_interval_start(int2nat(
                    self.left_interval[0] as i64 - curr_node as i64,
                ))? as u64;
                written += encoder
                    .write_interval_len((self.len_interval[0] - min_interval_length) as u64)?
                    as u64;
                let mut prev = self.left_interval[0] + self.len_interval[0];
                for i in 1..self.left_interval.len() {
                    written += encoder
                        .write_interval_start((self.left_interval[i] - prev - 1) as u64)?
                        as u64;
                    written += encoder
                        .write_interval_len((self.len_interval[i] - min_interval_length) as u64)?
                        as u64;
                    prev = self.left_interval[i] + self.len_interval[i];
                }
            }
        }
        if !self.residuals.is_empty() {
            written += encoder
                .write_first_residual(int2nat(self.residuals[0] as i64 - curr_node as i64))?
                as u64;
            for i in 1..self.residuals.len() {
                written += encoder
                    .write_residual((self.residuals[i] - self.residuals[i - 1] - 1) as u64)?
                    as u64;
            }
        }
        Ok(written)
    }
}

/// The graph compressor: pushes successor lists in node order, choosing
/// for each node the reference in the window that minimizes the exact bit
/// cost, under the reference-chain budget.
pub struct BvComp<E: Encode> {
    /// The last `compression_window` successor lists.
    backrefs: CircularBuffer<Vec<usize>>,
    /// Length of the reference chain each window slot would impose.
    ref_counts: CircularBuffer<usize>,
    encoder: E,
    estimator: DynEstimator,
    /// One decomposition per candidate reference, to reuse allocations.
    compressors: Vec<Compressor>,
    compression_window: usize,
    max_ref_count: usize,
    min_interval_length: usize,
    curr_node: usize,
    start_node: usize,
    /// Arcs compressed so far.
    pub arcs: u64,
}

impl<E: Encode> BvComp<E> {
    /// With this minimum interval length no intervalization is performed.
    pub const NO_INTERVALS: usize = Compressor::NO_INTERVALS;

    pub fn new(
        encoder: E,
        estimator: DynEstimator,
        compression_window: usize,
        max_ref_count: usize,
        min_interval_length: usize,
        start_node: usize,
    ) -> Self {
        BvComp {
            backrefs: CircularBuffer::new(compression_window + 1),
            ref_counts: CircularBuffer::new(compression_window + 1),
            encoder,
            estimator,
            compressors: (0..compression_window + 1).map(|_| Compressor::new()).collect(),
            compression_window,
            max_ref_count,
            min_interval_length,
            curr_node: start_node,
            start_node,
            arcs: 0,
        }
    }

    /// Compresses the successor list of the next node and returns the
    /// number of bits it took.
    ///
    /// Lists must be pushed for every node in order, empty ones included.
    pub fn push(&mut self, successors: impl IntoIterator<Item = usize>) -> Result<u64> {
        // park the list in its window slot, recycling the allocation
        {
            let mut list = self.backrefs.take(self.curr_node);
            list.clear();
            list.extend(successors);
            self.backrefs.replace(self.curr_node, list);
        }
        let curr_list = &self.backrefs[self.curr_node];
        self.arcs += curr_list.len() as u64;

        // the no-reference decomposition is always a candidate
        let compressor = &mut self.compressors[0];
        compressor.compress(curr_list, None, self.min_interval_length);

        if self.compression_window == 0 {
            let written =
                compressor.write(&mut self.encoder, self.curr_node, None, self.min_interval_length)?;
            self.curr_node += 1;
            return Ok(written);
        }

        let mut best_delta = 0;
        let mut best_bits = compressor.write(
            &mut self.estimator,
            self.curr_node,
            Some(0),
            self.min_interval_length,
        )?;
        let mut best_chain = 0;

        let candidates = 1 + self
            .compression_window
            .min(self.curr_node - self.start_node);
        for delta in 1..candidates {
            let ref_node = self.curr_node - delta;
            // referencing this node would make its chain too long
            let chain = self.ref_counts[ref_node];
            if chain >= self.max_ref_count {
                continue;
            }
            let ref_list = &self.backrefs[ref_node];
            if ref_list.is_empty() {
                continue;
            }
            let compressor = &mut self.compressors[delta];
            compressor.compress(curr_list, Some(ref_list), self.min_interval_length);
            let bits = compressor.write(
                &mut self.estimator,
                self.curr_node,
                Some(delta),
                self.min_interval_length,
            )?;
            // strict comparison keeps the nearest among equal candidates
            if bits < best_bits {
                best_bits = bits;
                best_delta = delta;
                best_chain = chain + 1;
            }
        }

        let compressor = &mut self.compressors[best_delta];
        let written = compressor.write(
            &mut self.encoder,
            self.curr_node,
            Some(best_delta),
            self.min_interval_length,
        )?;
        self.ref_counts[self.curr_node] = best_chain;
        debug_assert_eq!(written, best_bits, "estimator and encoder disagree");
        self.curr_node += 1;
        Ok(written)
    }

    /// Pushes every list of a node iterator; returns the bits written.
    pub fn extend(&mut self, nodes: impl IntoIterator<Item = (usize, Vec<usize>)>) -> Result<u64> {
        let mut written = 0;
        for (_, successors) in nodes {
            written += self.push(successors)?;
        }
        Ok(written)
    }

    /// Flushes the underlying encoder and hands it back.
    pub fn into_encoder(mut self) -> Result<E> {
        self.encoder.flush()?;
        Ok(self.encoder)
    }
}

/// Summary of a compression run.
#[derive(Debug, Clone, Copy)]
pub struct CompStats {
    pub num_nodes: usize,
    pub num_arcs: u64,
    pub written_bits: u64,
    pub bits_per_link: f64,
    pub avg_gap: f64,
}

impl BvGraph {
    /// Compresses `graph` under `basename`, producing the `.graph`,
    /// `.offsets` and `.properties` artifacts.
    ///
    /// Each artifact is written to a temporary file in the destination
    /// directory, fsynced and atomically renamed, so a failed store leaves
    /// no partial artifacts behind.
    pub fn store<G: SequentialGraph>(
        graph: &G,
        basename: impl AsRef<Path>,
        flags: &CompFlags,
    ) -> Result<CompStats> {
        let basename = basename.as_ref();
        let dir = match basename.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let graph_tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Cannot create a temporary file in {}", dir.display()))?;
        let offsets_tmp = tempfile::NamedTempFile::new_in(dir)?;
        let properties_tmp = tempfile::NamedTempFile::new_in(dir)?;

        let num_nodes = graph.num_nodes();
        let mut written_bits = 0u64;
        let mut gap_sum = 0u128;
        let mut gap_count = 0u64;
        {
            let graph_writer = BitWriter::new(BufWriter::new(graph_tmp.as_file().try_clone()?));
            let encoder = DynEncoder::new(graph_writer, flags)?;
            let estimator = DynEstimator::new(flags)?;
            let mut offsets_writer =
                BitWriter::new(BufWriter::new(offsets_tmp.as_file().try_clone()?));
            let mut bvcomp = BvComp::new(
                encoder,
                estimator,
                flags.compression_window,
                flags.max_ref_count,
                flags.min_interval_length,
                0,
            );

            offsets_writer.write_gamma(0)?;
            let mut nodes_seen = 0usize;
            for (node, successors) in graph.iter() {
                debug_assert_eq!(node, nodes_seen);
                for pair in successors.windows(2) {
                    gap_sum += (pair[1] - pair[0]) as u128;
                    gap_count += 1;
                }
                let node_bits = bvcomp.push(successors)?;
                offsets_writer.write_gamma(node_bits)?;
                written_bits += node_bits;
                nodes_seen += 1;
            }
            ensure!(
                nodes_seen == num_nodes,
                "the node iterator produced {} nodes instead of {}",
                nodes_seen,
                num_nodes
            );

            let num_arcs = bvcomp.arcs;
            let mut graph_writer = bvcomp.into_encoder()?.into_inner();
            debug_assert_eq!(graph_writer.written_bits(), written_bits);
            graph_writer.flush()?;
            offsets_writer.flush()?;
            drop(graph_writer);
            drop(offsets_writer);

            let bits_per_link = if num_arcs == 0 {
                0.0
            } else {
                written_bits as f64 / num_arcs as f64
            };
            let avg_gap = if gap_count == 0 {
                0.0
            } else {
                gap_sum as f64 / gap_count as f64
            };
            let properties = flags.to_properties(
                GRAPH_CLASS,
                num_nodes,
                num_arcs,
                avg_gap,
                bits_per_link,
            )?;
            std::fs::write(properties_tmp.path(), properties)?;

            graph_tmp.as_file().sync_all()?;
            offsets_tmp.as_file().sync_all()?;
            properties_tmp.as_file().sync_all()?;

            graph_tmp
                .persist(basename.with_extension(GRAPH_EXTENSION))
                .context("Cannot persist the graph file")?;
            offsets_tmp
                .persist(basename.with_extension(OFFSETS_EXTENSION))
                .context("Cannot persist the offsets file")?;
            properties_tmp
                .persist(basename.with_extension(PROPERTIES_EXTENSION))
                .context("Cannot persist the properties file")?;

            log::info!(
                "stored {} nodes, {} arcs in {} bits ({:.3} bits/link)",
                num_nodes,
                num_arcs,
                written_bits,
                bits_per_link
            );

            Ok(CompStats {
                num_nodes,
                num_arcs,
                written_bits,
                bits_per_link,
                avg_gap,
            })
        }
    }
}
