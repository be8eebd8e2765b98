/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The access contracts all graph implementations and algorithms share.

mod graph;
pub use graph::{NodeIterator, RandomAccessGraph, SequentialGraph};
