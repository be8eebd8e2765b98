/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Succinct monotone lists: the Elias–Fano encoding backing the offset
//! tables and the cumulative outdegree list.

mod elias_fano;
pub use elias_fano::{EliasFano, EliasFanoBuilder};

mod offsets;
pub use offsets::OffsetsTable;

mod cumulative;
pub use cumulative::CumulativeOutdegreeList;
