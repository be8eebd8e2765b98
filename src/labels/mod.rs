/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Arc labels and the bit-stream overlay that stores them.
//!
//! The core does not care what a label is, only that it can serialize
//! itself to and from a bit stream; the [`Label`] trait captures exactly
//! that. Two integer label types are provided, enough to store weights or
//! timestamps on arcs; richer hierarchies can implement the trait.

mod bit_stream;
pub use bit_stream::{
    build_label_offsets_big_list, store_labels, BitStreamLabelledGraph, LabelledIter,
    LabelledSuccessors,
};

use crate::bits::{self, BitRead, BitWrite, BitsError};

/// A per-arc payload that can serialize itself to a bit stream.
///
/// Implementations are used as prototypes: one instance is created from
/// the `labelspec` property and then repeatedly overwritten by
/// [`read`](Label::read) while iterating. `source` is the source node of
/// the arc being read or written, for label types whose serialization
/// depends on it.
pub trait Label: std::fmt::Debug {
    /// The spec string this label can be reconstructed from.
    fn to_spec(&self) -> String;

    /// Writes this label, returning the number of bits produced.
    fn write(&self, writer: &mut dyn BitWrite, source: usize) -> bits::Result<usize>;

    /// Overwrites this label from the stream, returning the bits consumed.
    fn read(&mut self, reader: &mut dyn BitRead, source: usize) -> bits::Result<usize>;

    fn boxed_clone(&self) -> Box<dyn Label>;

    /// Concrete-type access, mostly for tests and adapters.
    fn as_any(&self) -> &dyn std::any::Any;
}

impl Clone for Box<dyn Label> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// An integer label stored in a fixed number of bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedWidthIntLabel {
    pub name: String,
    pub width: u32,
    pub value: u64,
}

impl FixedWidthIntLabel {
    /// # Panics
    /// If `width` is zero or larger than 64.
    pub fn new(name: impl Into<String>, width: u32) -> Self {
        assert!((1..=64).contains(&width), "width must be in [1, 64]");
        Self {
            name: name.into(),
            width,
            value: 0,
        }
    }

    pub fn with_value(mut self, value: u64) -> Self {
        self.value = value;
        self
    }
}

impl Label for FixedWidthIntLabel {
    fn to_spec(&self) -> String {
        format!("FixedWidthIntLabel({},{})", self.name, self.width)
    }

    fn write(&self, writer: &mut dyn BitWrite, _source: usize) -> bits::Result<usize> {
        if self.width < 64 && self.value >> self.width != 0 {
            return Err(BitsError::ValueTooLarge {
                code: "fixed-width",
                value: self.value,
            });
        }
        writer.write_bits(self.value, self.width)
    }

    fn read(&mut self, reader: &mut dyn BitRead, _source: usize) -> bits::Result<usize> {
        self.value = reader.read_bits(self.width)?;
        Ok(self.width as usize)
    }

    fn boxed_clone(&self) -> Box<dyn Label> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// An integer label stored in γ code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GammaCodedIntLabel {
    pub name: String,
    pub value: u64,
}

impl GammaCodedIntLabel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: 0,
        }
    }

    pub fn with_value(mut self, value: u64) -> Self {
        self.value = value;
        self
    }
}

impl Label for GammaCodedIntLabel {
    fn to_spec(&self) -> String {
        format!("GammaCodedIntLabel({})", self.name)
    }

    fn write(&self, writer: &mut dyn BitWrite, _source: usize) -> bits::Result<usize> {
        writer.write_gamma(self.value)
    }

    fn read(&mut self, reader: &mut dyn BitRead, _source: usize) -> bits::Result<usize> {
        let before = reader.position();
        self.value = reader.read_gamma()?;
        Ok((reader.position() - before) as usize)
    }

    fn boxed_clone(&self) -> Box<dyn Label> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Errors raised while resolving a `labelspec` string.
#[derive(thiserror::Error, Debug)]
pub enum LabelSpecError {
    #[error("malformed label spec '{0}'")]
    Malformed(String),
    #[error("unknown label class '{0}'")]
    UnknownClass(String),
    #[error("invalid arguments in label spec '{0}'")]
    InvalidArguments(String),
}

/// Builds a prototype label from a `labelspec` string such as
/// `FixedWidthIntLabel(weight,10)`.
///
/// As with graph classes, a stray `class ` prefix is stripped and package
/// prefixes are ignored, so specs written by the original library
/// resolve to the equivalent types here.
pub fn label_from_spec(spec: &str) -> Result<Box<dyn Label>, LabelSpecError> {
    let trimmed = spec.trim();
    let trimmed = trimmed.strip_prefix("class ").unwrap_or(trimmed);
    let (name, rest) = trimmed
        .split_once('(')
        .ok_or_else(|| LabelSpecError::Malformed(spec.to_owned()))?;
    let args = rest
        .strip_suffix(')')
        .ok_or_else(|| LabelSpecError::Malformed(spec.to_owned()))?;
    let args: Vec<&str> = if args.trim().is_empty() {
        vec![]
    } else {
        args.split(',').map(str::trim).collect()
    };
    let simple = name.trim().rsplit('.').next().unwrap_or(name);
    match simple {
        "FixedWidthIntLabel" => {
            if args.len() != 2 {
                return Err(LabelSpecError::InvalidArguments(spec.to_owned()));
            }
            let width = args[1]
                .parse::<u32>()
                .map_err(|_| LabelSpecError::InvalidArguments(spec.to_owned()))?;
            if !(1..=64).contains(&width) {
                return Err(LabelSpecError::InvalidArguments(spec.to_owned()));
            }
            Ok(Box::new(FixedWidthIntLabel::new(args[0], width)))
        }
        "GammaCodedIntLabel" => {
            if args.len() != 1 {
                return Err(LabelSpecError::InvalidArguments(spec.to_owned()));
            }
            Ok(Box::new(GammaCodedIntLabel::new(args[0])))
        }
        _ => Err(LabelSpecError::UnknownClass(name.to_owned())),
    }
}
