/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::codecs::{Decode, DynDecoder};
use super::flags::CompFlags;
use super::load::GraphData;
use super::masked_iterator::MaskedIterator;
use super::offset_deg_iter::OffsetDegIter;
use super::sequential;
use crate::bits::{BitRead, BitReader};
use crate::succinct::{CumulativeOutdegreeList, OffsetsTable};
use crate::traits::{RandomAccessGraph, SequentialGraph};
use crate::utils::{nat2int, CircularBuffer};
use anyhow::{bail, Context, Result};
use std::sync::Arc;

type Decoder = DynDecoder<BitReader<GraphData>>;

/// A compressed graph with both random and sequential access.
///
/// Cloning is a flyweight operation: the graph bytes, the offsets table
/// and the parameters are shared, and each clone decodes independently.
#[derive(Debug, Clone)]
pub struct BvGraph {
    data: GraphData,
    offsets: Arc<OffsetsTable>,
    flags: CompFlags,
    number_of_nodes: usize,
    number_of_arcs: u64,
}

impl BvGraph {
    pub(crate) fn new(
        data: GraphData,
        offsets: Arc<OffsetsTable>,
        flags: CompFlags,
        number_of_nodes: usize,
        number_of_arcs: u64,
    ) -> Self {
        debug_assert_eq!(offsets.len(), number_of_nodes + 1);
        Self {
            data,
            offsets,
            flags,
            number_of_nodes,
            number_of_arcs,
        }
    }

    /// The compression parameters this graph was stored with.
    pub fn flags(&self) -> &CompFlags {
        &self.flags
    }

    /// A decoder positioned at the first bit of the block of `node`.
    fn decoder_at(&self, node: usize) -> Result<Decoder> {
        let mut reader = BitReader::new(self.data.clone());
        reader.set_position(self.offsets.get(node))?;
        Ok(DynDecoder::new(reader, &self.flags)?)
    }

    /// Iterates over (bit offset, outdegree) pairs without materializing
    /// successor lists.
    pub fn offset_deg_iter(&self) -> Result<OffsetDegIter<Decoder>> {
        Ok(OffsetDegIter::new(
            self.decoder_at(0)?,
            self.number_of_nodes,
            self.flags.compression_window,
            self.flags.min_interval_length,
        ))
    }

    /// Builds the cumulative outdegree list of this graph, with answers
    /// restricted to node indices aligned to `mask` (a power of two
    /// minus one).
    pub fn cumulative_outdegrees(&self, mask: u64) -> Result<CumulativeOutdegreeList> {
        CumulativeOutdegreeList::new(
            self.offset_deg_iter()?.map(|(_, degree)| degree),
            self.number_of_nodes,
            self.number_of_arcs,
            mask,
        )
    }
}

/// One link of a reference chain, read up to its copy blocks.
struct Frame {
    node: usize,
    degree: usize,
    has_reference: bool,
    blocks: Vec<usize>,
    decoder: Decoder,
}

impl BvGraph {
    /// Reads the headers of the whole reference chain of `node`, innermost
    /// last.
    ///
    /// The chain is materialized on an explicit stack rather than by
    /// recursive calls, so a corrupt file with an absurd chain cannot
    /// overflow the call stack.
    fn reference_chain(&self, node: usize) -> Result<Vec<Frame>> {
        let mut frames = Vec::new();
        let mut current = node;
        loop {
            let mut decoder = self.decoder_at(current)?;
            let degree = decoder
                .read_outdegree()
                .with_context(|| format!("Cannot read the outdegree of node {}", current))?
                as usize;
            let mut reference_offset = 0;
            if degree != 0 && self.flags.compression_window != 0 {
                reference_offset = decoder.read_reference_offset()? as usize;
            }
            let mut blocks = Vec::new();
            if reference_offset != 0 {
                let number_of_blocks = decoder.read_block_count()? as usize;
                blocks = Vec::with_capacity(number_of_blocks + 1);
                if number_of_blocks != 0 {
                    // the first run may be empty, the following cannot
                    blocks.push(decoder.read_block()? as usize);
                    for _ in 1..number_of_blocks {
                        blocks.push(decoder.read_block()? as usize + 1);
                    }
                }
            }
            frames.push(Frame {
                node: current,
                degree,
                has_reference: reference_offset != 0,
                blocks,
                decoder,
            });
            if reference_offset == 0 {
                return Ok(frames);
            }
            let Some(referenced) = current.checked_sub(reference_offset) else {
                bail!(
                    "reference offset {} points before node {}",
                    reference_offset,
                    current
                );
            };
            current = referenced;
        }
    }

    /// Completes the decoding of one frame, merging in the already-built
    /// iterator of its referenced node.
    fn expand_frame(&self, frame: Frame, parent: Option<Succ>) -> Result<Succ> {
        let Frame {
            node,
            degree,
            has_reference,
            blocks,
            decoder,
        } = frame;
        let mut result = Succ::empty(decoder);
        if degree == 0 {
            return Ok(result);
        }
        result.size = degree;
        let mut left_to_decode = degree;

        if has_reference {
            let parent = parent.expect("a reference frame always has a parent");
            let copied = MaskedIterator::new(parent, blocks);
            left_to_decode = left_to_decode
                .checked_sub(copied.len())
                .with_context(|| format!("copy list of node {} exceeds its outdegree", node))?;
            result.copied = Some(copied);
        }

        if left_to_decode != 0 && self.flags.min_interval_length != 0 {
            let number_of_intervals = result.reader.read_interval_count()? as usize;
            if number_of_intervals != 0 {
                result.intervals = Vec::with_capacity(number_of_intervals + 1);
                let gap = nat2int(result.reader.read_interval_start()?);
                let mut start = usize::try_from(node as i64 + gap)
                    .map_err(|_| anyhow::anyhow!("interval of node {} starts below zero", node))?;
                let mut len =
                    self.flags.min_interval_length + result.reader.read_interval_len()? as usize;
                result.intervals.push((start, len));
                start += len;
                left_to_decode = left_to_decode
                    .checked_sub(len)
                    .context("intervals exceed the outdegree")?;
                for _ in 1..number_of_intervals {
                    start += 1 + result.reader.read_interval_start()? as usize;
                    len = self.flags.min_interval_length
                        + result.reader.read_interval_len()? as usize;
                    result.intervals.push((start, len));
                    start += len;
                    left_to_decode = left_to_decode
                        .checked_sub(len)
                        .context("intervals exceed the outdegree")?;
                }
                // sentinel, so next() never indexes past the end
                result.intervals.push((usize::MAX - 1, 1));
            }
        }

        if left_to_decode != 0 {
            let gap = nat2int(result.reader.read_first_residual()?);
            result.next_residual = usize::try_from(node as i64 + gap)
                .map_err(|_| anyhow::anyhow!("residual of node {} is below zero", node))?;
            result.residuals_to_go = left_to_decode - 1;
        }

        // prime the interval cursor
        if !result.intervals.is_empty() {
            let (start, len) = &mut result.intervals[0];
            *len -= 1;
            result.next_interval = *start;
            *start += 1;
            result.intervals_idx += (*len == 0) as usize;
        }
        // prime the copied cursor
        result.next_copied = result
            .copied
            .as_mut()
            .and_then(|it| it.next())
            .unwrap_or(usize::MAX);

        Ok(result)
    }
}

impl SequentialGraph for BvGraph {
    type Iter<'a>
        = sequential::Iter<Decoder>
    where
        Self: 'a;

    fn num_nodes(&self) -> usize {
        self.number_of_nodes
    }

    fn num_arcs_hint(&self) -> Option<u64> {
        Some(self.number_of_arcs)
    }

    fn iter_range(&self, from: usize, until: usize) -> Self::Iter<'_> {
        assert!(from <= until && until <= self.number_of_nodes);
        let decoder = self
            .decoder_at(from)
            .expect("cannot position a decoder at the first node of the range");
        let window = self.flags.compression_window;
        // seed the window with the lists the range may reference
        let mut backrefs = CircularBuffer::new(window + 1);
        for node in from.saturating_sub(window)..from {
            let successors = self
                .successors(node)
                .expect("cannot decode a window list")
                .collect();
            backrefs.replace(node, successors);
        }
        sequential::Iter {
            decoder,
            backrefs,
            compression_window: window,
            min_interval_length: self.flags.min_interval_length,
            until,
            current_node: from,
        }
    }

    fn random_access(&self) -> bool {
        true
    }

    fn has_copiable_iterators(&self) -> bool {
        true
    }

    /// Splits by arc count rather than node count, cutting at the node
    /// boundaries located by the cumulative outdegree list.
    fn split_node_iters(&self, how_many: usize) -> Vec<Self::Iter<'_>> {
        assert!(how_many > 0, "cannot split into zero iterators");
        let n = self.number_of_nodes;
        let m = self.number_of_arcs;
        let mut bounds = Vec::with_capacity(how_many + 1);
        bounds.push(0);
        if m == 0 || n == 0 || how_many == 1 {
            let per_iter = n.div_ceil(how_many);
            for i in 1..how_many {
                bounds.push((i * per_iter).min(n));
            }
        } else {
            let mut cumulative = self
                .cumulative_outdegrees(0)
                .expect("cannot build the cumulative outdegree list");
            for k in 1..how_many {
                let target = (m as u128 * k as u128 / how_many as u128) as u64;
                cumulative.skip_to(target.max(1));
                bounds.push((cumulative.current_index() as usize).min(n));
            }
        }
        bounds.push(n);
        // skip_to is monotone, but make the invariant local
        for i in 1..bounds.len() {
            bounds[i] = bounds[i].max(bounds[i - 1]);
        }
        bounds
            .windows(2)
            .map(|pair| self.iter_range(pair[0], pair[1]))
            .collect()
    }
}

impl RandomAccessGraph for BvGraph {
    type Successors<'a>
        = Succ
    where
        Self: 'a;

    fn num_arcs(&self) -> u64 {
        self.number_of_arcs
    }

    fn outdegree(&self, node: usize) -> Result<usize> {
        assert!(
            node < self.number_of_nodes,
            "node id {} out of range [0, {})",
            node,
            self.number_of_nodes
        );
        let mut decoder = self.decoder_at(node)?;
        Ok(decoder.read_outdegree()? as usize)
    }

    fn successors(&self, node: usize) -> Result<Succ> {
        assert!(
            node < self.number_of_nodes,
            "node id {} out of range [0, {})",
            node,
            self.number_of_nodes
        );
        let mut frames = self.reference_chain(node)?;
        let mut result: Option<Succ> = None;
        while let Some(frame) = frames.pop() {
            result = Some(self.expand_frame(frame, result)?);
        }
        Ok(result.expect("the chain contains at least the node itself"))
    }
}

/// The lazy successor iterator of a [`BvGraph`]: merges the copied
/// targets, the intervals and the gap-coded residuals into one strictly
/// ascending sequence, decoding residuals on demand.
#[derive(Debug)]
pub struct Succ {
    reader: Decoder,
    /// Values still to be returned.
    size: usize,
    copied: Option<MaskedIterator<Succ>>,
    intervals: Vec<(usize, usize)>,
    intervals_idx: usize,
    residuals_to_go: usize,
    next_residual: usize,
    next_copied: usize,
    next_interval: usize,
}

impl Succ {
    fn empty(reader: Decoder) -> Self {
        Self {
            reader,
            size: 0,
            copied: None,
            intervals: vec![],
            intervals_idx: 0,
            residuals_to_go: 0,
            next_residual: usize::MAX,
            next_copied: usize::MAX,
            next_interval: usize::MAX,
        }
    }
}

impl ExactSizeIterator for Succ {
    #[inline(always)]
    fn len(&self) -> usize {
        self.size
    }
}

impl Iterator for Succ {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        if self.size == 0 {
            return None;
        }
        self.size -= 1;
        debug_assert!(
            self.next_copied != usize::MAX
                || self.next_residual != usize::MAX
                || self.next_interval != usize::MAX,
            "an exhausted iterator still claims a nonzero size"
        );

        let min = self.next_residual.min(self.next_interval);
        if min >= self.next_copied {
            let result = self.next_copied;
            self.next_copied = self
                .copied
                .as_mut()
                .and_then(|it| it.next())
                .unwrap_or(usize::MAX);
            return Some(result);
        }
        if min == self.next_residual {
            if self.residuals_to_go == 0 {
                self.next_residual = usize::MAX;
            } else {
                self.residuals_to_go -= 1;
                // a decode failure here invalidates the iterator
                self.next_residual += 1 + self
                    .reader
                    .read_residual()
                    .expect("error decoding a residual")
                    as usize;
            }
        } else {
            let (start, len) = &mut self.intervals[self.intervals_idx];
            debug_assert_ne!(*len, 0, "empty interval in the decode queue");
            *len -= 1;
            self.next_interval = *start;
            *start += 1;
            self.intervals_idx += (*len == 0) as usize;
        }
        Some(min)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.size, Some(self.size))
    }
}
