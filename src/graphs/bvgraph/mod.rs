/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The compressed graph format: referential compression against a sliding
//! window, intervals and gap-coded residuals, with random-access and
//! sequential decoders and the matching compressor.

mod flags;
pub use flags::{Code, CompFlags, PropertiesError};

mod codecs;
pub use codecs::{Decode, DynDecoder, DynEncoder, DynEstimator, Encode};

mod masked_iterator;
pub use masked_iterator::MaskedIterator;

pub mod sequential;
pub use sequential::BvGraphSeq;

mod random_access;
pub use random_access::{BvGraph, Succ};

mod offset_deg_iter;
pub use offset_deg_iter::OffsetDegIter;

mod comp;
pub use comp::{BvComp, CompStats};

mod load;
pub use load::{
    build_offsets_big_list, parse_properties, resolve_graph_class, GraphClass, GraphData,
    GRAPH_EXTENSION, LABELS_EXTENSION, LABEL_OFFSETS_BIG_LIST_EXTENSION, LABEL_OFFSETS_EXTENSION,
    OFFSETS_BIG_LIST_EXTENSION, OFFSETS_EXTENSION, PROPERTIES_EXTENSION,
};
pub(crate) use load::{build_big_list, load_offsets_table, LABELLED_GRAPH_CLASS};
