/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::{EliasFano, EliasFanoBuilder};
use anyhow::Result;

/// The table mapping node ids to bit positions in the graph stream.
///
/// There are `n + 1` entries; the last one is the total bit length of the
/// stream. Small tables are kept as a plain array, large ones in
/// succinct Elias–Fano form; both give constant-time access.
#[derive(Debug, Clone)]
pub enum OffsetsTable {
    Array(Vec<u64>),
    EliasFano(EliasFano),
}

impl OffsetsTable {
    /// Number of entries above which the succinct form is used.
    pub const PLAIN_LIMIT: usize = 1 << 20;

    /// Builds a table from a fallible stream of offsets, choosing the
    /// representation by `count`; `upper_bound` must exceed every offset.
    pub fn build(
        count: usize,
        upper_bound: u64,
        offsets: impl IntoIterator<Item = Result<u64>>,
    ) -> Result<Self> {
        if count <= Self::PLAIN_LIMIT {
            let mut values = Vec::with_capacity(count);
            for offset in offsets {
                values.push(offset?);
            }
            anyhow::ensure!(
                values.len() == count,
                "expected {} offsets, found {}",
                count,
                values.len()
            );
            Ok(Self::Array(values))
        } else {
            let mut builder = EliasFanoBuilder::new(count, upper_bound);
            for offset in offsets {
                builder.push(offset?)?;
            }
            Ok(Self::EliasFano(builder.build()))
        }
    }

    #[inline(always)]
    pub fn get(&self, i: usize) -> u64 {
        match self {
            Self::Array(values) => values[i],
            Self::EliasFano(ef) => ef.get(i),
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        match self {
            Self::Array(values) => values.len(),
            Self::EliasFano(ef) => ef.len(),
        }
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = u64> + '_> {
        match self {
            Self::Array(values) => Box::new(values.iter().copied()),
            Self::EliasFano(ef) => Box::new(ef.iter()),
        }
    }
}

impl From<EliasFano> for OffsetsTable {
    fn from(ef: EliasFano) -> Self {
        Self::EliasFano(ef)
    }
}

impl From<Vec<u64>> for OffsetsTable {
    fn from(values: Vec<u64>) -> Self {
        Self::Array(values)
    }
}
