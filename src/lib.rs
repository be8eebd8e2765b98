/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

#![doc = include_str!("../README.md")]
#![deny(trivial_casts)]
#![deny(unconditional_recursion)]
#![deny(unreachable_code)]
#![deny(unreachable_patterns)]
#![deny(unused_macro_rules)]
#![deny(unused_doc_comments)]
#![allow(clippy::type_complexity)]

pub mod bits;
pub mod graphs;
pub mod labels;
pub mod succinct;
pub mod traits;
pub mod utils;

/// Prelude module to import everything relevant from this crate.
pub mod prelude {
    pub use crate::bits::*;
    pub use crate::graphs::bvgraph::*;
    pub use crate::graphs::*;
    pub use crate::labels::*;
    pub use crate::succinct::*;
    pub use crate::traits::*;
    pub use crate::utils::{int2nat, nat2int, MmapHelper};
}
