/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Graph implementations: the compressed format, the in-memory graph and
//! the random generators.

pub mod bvgraph;
pub use bvgraph::{BvComp, BvGraph, BvGraphSeq, CompFlags};

mod vec_graph;
pub use vec_graph::VecGraph;

mod random;
pub use random::ErdosRenyi;
