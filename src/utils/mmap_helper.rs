/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2024 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::{Context, Result};
use mmap_rs::{Mmap, MmapFlags, MmapOptions};
use std::path::Path;

/// A read-only memory mapping of a file, exposed as a byte slice.
///
/// The mapping is shared among flyweight copies of a graph by wrapping the
/// helper in an [`Arc`](std::sync::Arc); each copy keeps its own bit cursor
/// while the pages are shared.
pub struct MmapHelper {
    mmap: Mmap,
    /// The length of the file in bytes; the mapping may be longer.
    len: usize,
}

impl core::fmt::Debug for MmapHelper {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MmapHelper")
            .field("addr", &self.mmap.as_ptr())
            .field("len", &self.len)
            .finish()
    }
}

impl MmapHelper {
    /// Maps the given file read-only.
    pub fn mmap(path: impl AsRef<Path>, flags: MmapFlags) -> Result<Self> {
        let path = path.as_ref();
        let len: usize = path
            .metadata()
            .with_context(|| format!("Cannot stat {}", path.display()))?
            .len()
            .try_into()
            .context("Cannot convert file length to usize")?;
        let file = std::fs::File::open(path)
            .with_context(|| format!("Cannot open {} for memory mapping", path.display()))?;

        // A mapping of length zero is not permitted.
        let mmap = unsafe {
            MmapOptions::new(len.max(1))
                .with_context(|| format!("Cannot initialize mmap of size {}", len.max(1)))?
                .with_flags(flags)
                .with_file(&file, 0)
                .map()
                .with_context(|| format!("Cannot map {}", path.display()))?
        };

        Ok(Self { mmap, len })
    }

    /// Returns the length of the mapped file in bytes.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the mapped file is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for MmapHelper {
    #[inline(always)]
    fn as_ref(&self) -> &[u8] {
        &self.mmap.as_slice()[..self.len]
    }
}
