/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::codecs::{Decode, DynDecoder};
use crate::bits::BitRead;
use anyhow::{bail, Context, Result};

/// Iterates over the bit offsets and outdegrees of a compressed graph
/// without reconstructing successor lists.
///
/// Faster than a full scan: copy blocks, intervals and residuals are
/// skipped, only the information needed to know where the next block
/// starts is decoded. Used to rebuild offsets and to feed the cumulative
/// outdegree list.
#[derive(Debug, Clone)]
pub struct OffsetDegIter<D> {
    decoder: D,
    number_of_nodes: usize,
    compression_window: usize,
    min_interval_length: usize,
    node_id: usize,
    /// Outdegrees of the last `compression_window` nodes, for resolving
    /// reference lengths.
    window_degrees: Vec<usize>,
}

impl<R: BitRead> OffsetDegIter<DynDecoder<R>> {
    /// The bit position of the next block.
    pub fn position(&self) -> u64 {
        self.decoder.position()
    }
}

impl<D: Decode> OffsetDegIter<D> {
    pub fn new(
        decoder: D,
        number_of_nodes: usize,
        compression_window: usize,
        min_interval_length: usize,
    ) -> Self {
        Self {
            decoder,
            number_of_nodes,
            compression_window,
            min_interval_length,
            node_id: 0,
            window_degrees: vec![0; compression_window.max(1)],
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.number_of_nodes
    }

    /// Decodes the next block far enough to know its outdegree and skip it.
    pub fn next_degree(&mut self) -> Result<usize> {
        let degree = self
            .decoder
            .read_outdegree()
            .with_context(|| format!("Cannot read the outdegree of node {}", self.node_id))?
            as usize;
        if degree == 0 {
            self.push_degree(degree);
            return Ok(degree);
        }

        let mut left_to_decode = degree;
        let reference_offset = if self.compression_window != 0 {
            self.decoder.read_reference_offset()? as usize
        } else {
            0
        };
        if reference_offset != 0 {
            if reference_offset > self.node_id || reference_offset > self.compression_window {
                bail!(
                    "reference offset {} of node {} is out of the window",
                    reference_offset,
                    self.node_id
                );
            }
            let reference_degree =
                self.window_degrees[(self.node_id - reference_offset) % self.compression_window];
            let number_of_blocks = self.decoder.read_block_count()? as usize;
            let copied = if number_of_blocks == 0 {
                reference_degree
            } else {
                let mut copied = 0;
                let mut idx = self.decoder.read_block()? as usize;
                copied += idx;
                for block_id in 1..number_of_blocks {
                    let block = self.decoder.read_block()? as usize + 1;
                    if block_id % 2 == 0 {
                        copied += block;
                    }
                    idx += block;
                }
                if number_of_blocks % 2 == 0 {
                    copied += reference_degree
                        .checked_sub(idx)
                        .context("copy list overruns its reference")?;
                }
                copied
            };
            left_to_decode = left_to_decode
                .checked_sub(copied)
                .context("copy list exceeds the outdegree")?;
        }

        if left_to_decode != 0 && self.min_interval_length != 0 {
            let number_of_intervals = self.decoder.read_interval_count()? as usize;
            for _ in 0..number_of_intervals {
                self.decoder.read_interval_start()?;
                let len = self.min_interval_length + self.decoder.read_interval_len()? as usize;
                left_to_decode = left_to_decode
                    .checked_sub(len)
                    .context("intervals exceed the outdegree")?;
            }
        }

        if left_to_decode != 0 {
            self.decoder.read_first_residual()?;
            for _ in 1..left_to_decode {
                self.decoder.read_residual()?;
            }
        }

        self.push_degree(degree);
        Ok(degree)
    }

    fn push_degree(&mut self, degree: usize) {
        if self.compression_window != 0 {
            self.window_degrees[self.node_id % self.compression_window] = degree;
        }
        self.node_id += 1;
    }
}

impl<R: BitRead> Iterator for OffsetDegIter<DynDecoder<R>> {
    type Item = (u64, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.node_id >= self.number_of_nodes {
            return None;
        }
        let offset = self.decoder.position();
        Some((
            offset,
            self.next_degree().expect("error decoding a graph block"),
        ))
    }
}

impl<R: BitRead> ExactSizeIterator for OffsetDegIter<DynDecoder<R>> {
    fn len(&self) -> usize {
        self.number_of_nodes - self.node_id
    }
}
