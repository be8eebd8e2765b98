/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::codecs::{Decode, DynDecoder};
use super::flags::CompFlags;
use super::load::GraphData;
use crate::bits::{BitRead, BitReader, StreamBitReader};
use crate::traits::SequentialGraph;
use crate::utils::{nat2int, CircularBuffer};
use anyhow::{bail, Context, Result};
use std::cell::RefCell;
use std::io::BufReader;
use std::path::PathBuf;

/// Where a sequential-only graph takes its bits from.
pub(crate) enum SeqSource {
    /// In-memory or mapped bytes; iterators can be created at will.
    Bytes(GraphData),
    /// Offline: every iterator streams the file from the start.
    File(PathBuf),
    /// A single already-open stream; only one traversal is possible.
    Once(RefCell<Option<Box<dyn BitRead>>>),
}

impl core::fmt::Debug for SeqSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SeqSource::Bytes(data) => f.debug_tuple("Bytes").field(data).finish(),
            SeqSource::File(path) => f.debug_tuple("File").field(path).finish(),
            SeqSource::Once(slot) => {
                let consumed = slot.try_borrow().map(|s| s.is_none()).unwrap_or(true);
                f.debug_struct("Once").field("consumed", &consumed).finish()
            }
        }
    }
}

/// A compressed graph accessible only sequentially: no offsets are loaded,
/// so blocks can only be decoded in node order against the window.
///
/// This is what offline and stream-once loading produce. Random access
/// needs [`BvGraph`](super::BvGraph).
#[derive(Debug)]
pub struct BvGraphSeq {
    source: SeqSource,
    flags: CompFlags,
    number_of_nodes: usize,
    number_of_arcs: Option<u64>,
}

impl BvGraphSeq {
    pub(crate) fn new(
        source: SeqSource,
        flags: CompFlags,
        number_of_nodes: usize,
        number_of_arcs: Option<u64>,
    ) -> Self {
        Self {
            source,
            flags,
            number_of_nodes,
            number_of_arcs,
        }
    }

    /// The compression parameters this graph was stored with.
    pub fn flags(&self) -> &CompFlags {
        &self.flags
    }

    fn new_decoder(&self) -> Result<DynDecoder<Box<dyn BitRead>>> {
        let reader: Box<dyn BitRead> = match &self.source {
            SeqSource::Bytes(data) => Box::new(BitReader::new(data.clone())),
            SeqSource::File(path) => Box::new(StreamBitReader::new(BufReader::new(
                std::fs::File::open(path)
                    .with_context(|| format!("Cannot open graph file {}", path.display()))?,
            ))),
            SeqSource::Once(slot) => match slot.borrow_mut().take() {
                Some(reader) => reader,
                None => bail!("a stream-once graph can be traversed only once"),
            },
        };
        Ok(DynDecoder::new(reader, &self.flags)?)
    }

    /// Fallible counterpart of [`SequentialGraph::iter`]: the only way to
    /// traverse a stream-once graph twice is to get the error.
    pub fn try_iter(&self) -> Result<Iter<DynDecoder<Box<dyn BitRead>>>> {
        Ok(Iter::new(
            self.new_decoder()?,
            self.number_of_nodes,
            self.flags.compression_window,
            self.flags.min_interval_length,
        ))
    }
}

impl SequentialGraph for BvGraphSeq {
    type Iter<'a>
        = Iter<DynDecoder<Box<dyn BitRead>>>
    where
        Self: 'a;

    fn num_nodes(&self) -> usize {
        self.number_of_nodes
    }

    fn num_arcs_hint(&self) -> Option<u64> {
        self.number_of_arcs
    }

    fn iter_range(&self, from: usize, until: usize) -> Self::Iter<'_> {
        assert!(from <= until && until <= self.number_of_nodes);
        let mut iter = self
            .try_iter()
            .expect("cannot create a sequential iterator");
        iter.until = until;
        // without offsets the only way to reach `from` is to decode up to it
        for _ in 0..from {
            iter.next();
        }
        iter
    }
}

/// The sequential decoder: reads blocks in node order, resolving
/// references against a window of the last `compression_window` lists.
#[derive(Debug, Clone)]
pub struct Iter<D: Decode> {
    pub(crate) decoder: D,
    pub(crate) backrefs: CircularBuffer<Vec<usize>>,
    pub(crate) compression_window: usize,
    pub(crate) min_interval_length: usize,
    pub(crate) until: usize,
    pub(crate) current_node: usize,
}

impl<D: Decode> Iter<D> {
    pub fn new(
        decoder: D,
        number_of_nodes: usize,
        compression_window: usize,
        min_interval_length: usize,
    ) -> Self {
        Self {
            decoder,
            backrefs: CircularBuffer::new(compression_window + 1),
            compression_window,
            min_interval_length,
            until: number_of_nodes,
            current_node: 0,
        }
    }

    /// Decodes the next list and returns a borrow of it, keeping the
    /// allocation inside the window. This is the zero-copy path; the
    /// `Iterator` implementation clones the list instead.
    pub fn next_successors(&mut self) -> Result<&[usize]> {
        let mut successors = self.backrefs.take(self.current_node);
        successors.clear();
        self.decode_list(self.current_node, &mut successors)?;
        let successors = self.backrefs.replace(self.current_node, successors);
        self.current_node += 1;
        Ok(successors)
    }

    fn decode_list(&mut self, node: usize, results: &mut Vec<usize>) -> Result<()> {
        let degree = self
            .decoder
            .read_outdegree()
            .with_context(|| format!("Cannot read the outdegree of node {}", node))?
            as usize;
        if degree == 0 {
            return Ok(());
        }
        results.reserve(degree.saturating_sub(results.capacity()));

        let reference_offset = if self.compression_window != 0 {
            self.decoder.read_reference_offset()? as usize
        } else {
            0
        };
        if reference_offset != 0 {
            if reference_offset > self.compression_window {
                bail!(
                    "reference offset {} of node {} exceeds the window",
                    reference_offset,
                    node
                );
            }
            let Some(reference_node) = node.checked_sub(reference_offset) else {
                bail!(
                    "reference offset {} points before node {}",
                    reference_offset,
                    node
                );
            };
            let reference = &self.backrefs[reference_node];
            let number_of_blocks = self.decoder.read_block_count()? as usize;
            if number_of_blocks == 0 {
                results.extend_from_slice(reference);
            } else {
                // runs of even index are copied; the first may be empty
                let mut idx = self.decoder.read_block()? as usize;
                if idx > reference.len() {
                    bail!("copy list of node {} overruns its reference", node);
                }
                results.extend_from_slice(&reference[..idx]);
                for block_id in 1..number_of_blocks {
                    let block = self.decoder.read_block()? as usize + 1;
                    let end = idx + block;
                    if end > reference.len() {
                        bail!("copy list of node {} overruns its reference", node);
                    }
                    if block_id % 2 == 0 {
                        results.extend_from_slice(&reference[idx..end]);
                    }
                    idx = end;
                }
                if number_of_blocks % 2 == 0 {
                    results.extend_from_slice(&reference[idx..]);
                }
            }
        }

        if results.len() > degree {
            bail!("copy list of node {} exceeds its outdegree", node);
        }
        let mut left_to_decode = degree - results.len();

        if left_to_decode != 0 && self.min_interval_length != 0 {
            let number_of_intervals = self.decoder.read_interval_count()? as usize;
            if number_of_intervals != 0 {
                let gap = nat2int(self.decoder.read_interval_start()?);
                let mut start = usize::try_from(node as i64 + gap)
                    .map_err(|_| anyhow::anyhow!("interval of node {} starts below zero", node))?;
                let mut len = self.min_interval_length + self.decoder.read_interval_len()? as usize;
                results.extend(start..start + len);
                start += len;
                left_to_decode = left_to_decode
                    .checked_sub(len)
                    .context("intervals exceed the outdegree")?;
                for _ in 1..number_of_intervals {
                    start += 1 + self.decoder.read_interval_start()? as usize;
                    len = self.min_interval_length + self.decoder.read_interval_len()? as usize;
                    results.extend(start..start + len);
                    start += len;
                    left_to_decode = left_to_decode
                        .checked_sub(len)
                        .context("intervals exceed the outdegree")?;
                }
            }
        }

        if left_to_decode != 0 {
            let gap = nat2int(self.decoder.read_first_residual()?);
            let mut residual = usize::try_from(node as i64 + gap)
                .map_err(|_| anyhow::anyhow!("residual of node {} is below zero", node))?;
            results.push(residual);
            for _ in 1..left_to_decode {
                residual += 1 + self.decoder.read_residual()? as usize;
                results.push(residual);
            }
        }

        results.sort_unstable();
        Ok(())
    }
}

impl<D: Decode + Clone> Iter<D> {
    /// Returns an independent iterator over `[current, upper_bound)`,
    /// with its own decoder cursor and window.
    pub fn copy(&self, upper_bound: usize) -> Self {
        let mut copy = self.clone();
        copy.until = upper_bound.min(self.until);
        copy
    }
}

impl<D: Decode> Iterator for Iter<D> {
    type Item = (usize, Vec<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_node >= self.until {
            return None;
        }
        let node = self.current_node;
        let successors = self
            .next_successors()
            .expect("error decoding a graph block")
            .to_vec();
        Some((node, successors))
    }
}

impl<D: Decode> ExactSizeIterator for Iter<D> {
    fn len(&self) -> usize {
        self.until - self.current_node
    }
}
