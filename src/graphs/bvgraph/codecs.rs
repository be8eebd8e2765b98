/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::flags::{Code, CompFlags, PropertiesError};
use crate::bits::{self, BitRead, BitWrite};
use crate::bits::{len_delta, len_gamma, len_nibble, len_unary, len_zeta};

/// Decoding of the components of a compressed graph block.
///
/// One method per stream position, so implementations can bind a
/// different code to each.
pub trait Decode {
    fn read_outdegree(&mut self) -> bits::Result<u64>;
    fn read_reference_offset(&mut self) -> bits::Result<u64>;
    fn read_block_count(&mut self) -> bits::Result<u64>;
    fn read_block(&mut self) -> bits::Result<u64>;
    fn read_interval_count(&mut self) -> bits::Result<u64>;
    fn read_interval_start(&mut self) -> bits::Result<u64>;
    fn read_interval_len(&mut self) -> bits::Result<u64>;
    fn read_first_residual(&mut self) -> bits::Result<u64>;
    fn read_residual(&mut self) -> bits::Result<u64>;
}

/// Encoding of the components of a compressed graph block.
///
/// Every method returns the number of bits written, so the compressor can
/// account for the exact cost of each candidate encoding.
pub trait Encode {
    fn write_outdegree(&mut self, value: u64) -> bits::Result<usize>;
    fn write_reference_offset(&mut self, value: u64) -> bits::Result<usize>;
    fn write_block_count(&mut self, value: u64) -> bits::Result<usize>;
    fn write_block(&mut self, value: u64) -> bits::Result<usize>;
    fn write_interval_count(&mut self, value: u64) -> bits::Result<usize>;
    fn write_interval_start(&mut self, value: u64) -> bits::Result<usize>;
    fn write_interval_len(&mut self, value: u64) -> bits::Result<usize>;
    fn write_first_residual(&mut self, value: u64) -> bits::Result<usize>;
    fn write_residual(&mut self, value: u64) -> bits::Result<usize>;
    fn flush(&mut self) -> bits::Result<()>;
}

macro_rules! select_reader {
    ($code:expr, $position:literal) => {
        match $code {
            Code::Unary => |r: &mut R| r.read_unary(),
            Code::Gamma | Code::Zeta { k: 1 } => |r: &mut R| r.read_gamma(),
            Code::Delta => |r: &mut R| r.read_delta(),
            Code::Zeta { k: 2 } => |r: &mut R| r.read_zeta(2),
            Code::Zeta { k: 3 } => |r: &mut R| r.read_zeta(3),
            Code::Zeta { k: 4 } => |r: &mut R| r.read_zeta(4),
            Code::Zeta { k: 5 } => |r: &mut R| r.read_zeta(5),
            Code::Zeta { k: 6 } => |r: &mut R| r.read_zeta(6),
            Code::Zeta { k: 7 } => |r: &mut R| r.read_zeta(7),
            Code::Nibble => |r: &mut R| r.read_nibble(),
            code => {
                return Err(PropertiesError::UnsupportedCode {
                    code,
                    position: $position,
                })
            }
        }
    };
}

/// A [`Decode`] implementation binding the codes named by a [`CompFlags`]
/// to a bit reader through per-position function pointers.
#[derive(Debug, Clone)]
pub struct DynDecoder<R: BitRead> {
    reader: R,
    read_outdegree: fn(&mut R) -> bits::Result<u64>,
    read_reference_offset: fn(&mut R) -> bits::Result<u64>,
    read_block_count: fn(&mut R) -> bits::Result<u64>,
    read_block: fn(&mut R) -> bits::Result<u64>,
    read_interval_count: fn(&mut R) -> bits::Result<u64>,
    read_interval_start: fn(&mut R) -> bits::Result<u64>,
    read_interval_len: fn(&mut R) -> bits::Result<u64>,
    read_first_residual: fn(&mut R) -> bits::Result<u64>,
    read_residual: fn(&mut R) -> bits::Result<u64>,
}

impl<R: BitRead> DynDecoder<R> {
    pub fn new(reader: R, flags: &CompFlags) -> Result<Self, PropertiesError> {
        Ok(Self {
            reader,
            read_outdegree: select_reader!(flags.outdegrees, "outdegrees"),
            read_reference_offset: select_reader!(flags.references, "references"),
            read_block_count: select_reader!(flags.blocks, "blocks"),
            read_block: select_reader!(flags.blocks, "blocks"),
            read_interval_count: select_reader!(flags.intervals, "intervals"),
            read_interval_start: select_reader!(flags.intervals, "intervals"),
            read_interval_len: select_reader!(flags.intervals, "intervals"),
            read_first_residual: select_reader!(flags.residuals, "residuals"),
            read_residual: select_reader!(flags.residuals, "residuals"),
        })
    }

    /// Current position of the underlying reader, in bits.
    #[inline(always)]
    pub fn position(&self) -> u64 {
        self.reader.position()
    }

    /// Repositions the underlying reader.
    #[inline(always)]
    pub fn set_position(&mut self, bit_position: u64) -> bits::Result<()> {
        self.reader.set_position(bit_position)
    }
}

impl<R: BitRead> Decode for DynDecoder<R> {
    #[inline(always)]
    fn read_outdegree(&mut self) -> bits::Result<u64> {
        (self.read_outdegree)(&mut self.reader)
    }

    #[inline(always)]
    fn read_reference_offset(&mut self) -> bits::Result<u64> {
        (self.read_reference_offset)(&mut self.reader)
    }

    #[inline(always)]
    fn read_block_count(&mut self) -> bits::Result<u64> {
        (self.read_block_count)(&mut self.reader)
    }

    #[inline(always)]
    fn read_block(&mut self) -> bits::Result<u64> {
        (self.read_block)(&mut self.reader)
    }

    #[inline(always)]
    fn read_interval_count(&mut self) -> bits::Result<u64> {
        (self.read_interval_count)(&mut self.reader)
    }

    #[inline(always)]
    fn read_interval_start(&mut self) -> bits::Result<u64> {
        (self.read_interval_start)(&mut self.reader)
    }

    #[inline(always)]
    fn read_interval_len(&mut self) -> bits::Result<u64> {
        (self.read_interval_len)(&mut self.reader)
    }

    #[inline(always)]
    fn read_first_residual(&mut self) -> bits::Result<u64> {
        (self.read_first_residual)(&mut self.reader)
    }

    #[inline(always)]
    fn read_residual(&mut self) -> bits::Result<u64> {
        (self.read_residual)(&mut self.reader)
    }
}

macro_rules! select_writer {
    ($code:expr, $position:literal) => {
        match $code {
            Code::Unary => |w: &mut W, v| w.write_unary(v),
            Code::Gamma | Code::Zeta { k: 1 } => |w: &mut W, v| w.write_gamma(v),
            Code::Delta => |w: &mut W, v| w.write_delta(v),
            Code::Zeta { k: 2 } => |w: &mut W, v| w.write_zeta(v, 2),
            Code::Zeta { k: 3 } => |w: &mut W, v| w.write_zeta(v, 3),
            Code::Zeta { k: 4 } => |w: &mut W, v| w.write_zeta(v, 4),
            Code::Zeta { k: 5 } => |w: &mut W, v| w.write_zeta(v, 5),
            Code::Zeta { k: 6 } => |w: &mut W, v| w.write_zeta(v, 6),
            Code::Zeta { k: 7 } => |w: &mut W, v| w.write_zeta(v, 7),
            Code::Nibble => |w: &mut W, v| w.write_nibble(v),
            code => {
                return Err(PropertiesError::UnsupportedCode {
                    code,
                    position: $position,
                })
            }
        }
    };
}

macro_rules! select_len {
    ($code:expr, $position:literal) => {
        match $code {
            Code::Unary => len_unary,
            Code::Gamma | Code::Zeta { k: 1 } => len_gamma,
            Code::Delta => len_delta,
            Code::Zeta { k: 2 } => |v| len_zeta(v, 2),
            Code::Zeta { k: 3 } => |v| len_zeta(v, 3),
            Code::Zeta { k: 4 } => |v| len_zeta(v, 4),
            Code::Zeta { k: 5 } => |v| len_zeta(v, 5),
            Code::Zeta { k: 6 } => |v| len_zeta(v, 6),
            Code::Zeta { k: 7 } => |v| len_zeta(v, 7),
            Code::Nibble => len_nibble,
            code => {
                return Err(PropertiesError::UnsupportedCode {
                    code,
                    position: $position,
                })
            }
        }
    };
}

/// An [`Encode`] implementation binding the codes named by a [`CompFlags`]
/// to a bit writer.
#[derive(Debug)]
pub struct DynEncoder<W: BitWrite> {
    writer: W,
    flags: CompFlags,
    write_outdegree: fn(&mut W, u64) -> bits::Result<usize>,
    write_reference_offset: fn(&mut W, u64) -> bits::Result<usize>,
    write_block_count: fn(&mut W, u64) -> bits::Result<usize>,
    write_block: fn(&mut W, u64) -> bits::Result<usize>,
    write_interval_count: fn(&mut W, u64) -> bits::Result<usize>,
    write_interval_start: fn(&mut W, u64) -> bits::Result<usize>,
    write_interval_len: fn(&mut W, u64) -> bits::Result<usize>,
    write_first_residual: fn(&mut W, u64) -> bits::Result<usize>,
    write_residual: fn(&mut W, u64) -> bits::Result<usize>,
}

impl<W: BitWrite> DynEncoder<W> {
    pub fn new(writer: W, flags: &CompFlags) -> Result<Self, PropertiesError> {
        Ok(Self {
            writer,
            flags: *flags,
            write_outdegree: select_writer!(flags.outdegrees, "outdegrees"),
            write_reference_offset: select_writer!(flags.references, "references"),
            write_block_count: select_writer!(flags.blocks, "blocks"),
            write_block: select_writer!(flags.blocks, "blocks"),
            write_interval_count: select_writer!(flags.intervals, "intervals"),
            write_interval_start: select_writer!(flags.intervals, "intervals"),
            write_interval_len: select_writer!(flags.intervals, "intervals"),
            write_first_residual: select_writer!(flags.residuals, "residuals"),
            write_residual: select_writer!(flags.residuals, "residuals"),
        })
    }

    /// A cost estimator for the same codes, used to pick references.
    pub fn estimator(&self) -> Result<DynEstimator, PropertiesError> {
        DynEstimator::new(&self.flags)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: BitWrite> Encode for DynEncoder<W> {
    #[inline(always)]
    fn write_outdegree(&mut self, value: u64) -> bits::Result<usize> {
        (self.write_outdegree)(&mut self.writer, value)
    }

    #[inline(always)]
    fn write_reference_offset(&mut self, value: u64) -> bits::Result<usize> {
        (self.write_reference_offset)(&mut self.writer, value)
    }

    #[inline(always)]
    fn write_block_count(&mut self, value: u64) -> bits::Result<usize> {
        (self.write_block_count)(&mut self.writer, value)
    }

    #[inline(always)]
    fn write_block(&mut self, value: u64) -> bits::Result<usize> {
        (self.write_block)(&mut self.writer, value)
    }

    #[inline(always)]
    fn write_interval_count(&mut self, value: u64) -> bits::Result<usize> {
        (self.write_interval_count)(&mut self.writer, value)
    }

    #[inline(always)]
    fn write_interval_start(&mut self, value: u64) -> bits::Result<usize> {
        (self.write_interval_start)(&mut self.writer, value)
    }

    #[inline(always)]
    fn write_interval_len(&mut self, value: u64) -> bits::Result<usize> {
        (self.write_interval_len)(&mut self.writer, value)
    }

    #[inline(always)]
    fn write_first_residual(&mut self, value: u64) -> bits::Result<usize> {
        (self.write_first_residual)(&mut self.writer, value)
    }

    #[inline(always)]
    fn write_residual(&mut self, value: u64) -> bits::Result<usize> {
        (self.write_residual)(&mut self.writer, value)
    }

    #[inline(always)]
    fn flush(&mut self) -> bits::Result<()> {
        self.writer.flush()
    }
}

/// An [`Encode`] implementation that writes nothing and returns the exact
/// length each code would take.
#[derive(Debug, Clone)]
pub struct DynEstimator {
    len_outdegree: fn(u64) -> usize,
    len_reference_offset: fn(u64) -> usize,
    len_block: fn(u64) -> usize,
    len_interval: fn(u64) -> usize,
    len_residual: fn(u64) -> usize,
}

impl DynEstimator {
    pub fn new(flags: &CompFlags) -> Result<Self, PropertiesError> {
        Ok(Self {
            len_outdegree: select_len!(flags.outdegrees, "outdegrees"),
            len_reference_offset: select_len!(flags.references, "references"),
            len_block: select_len!(flags.blocks, "blocks"),
            len_interval: select_len!(flags.intervals, "intervals"),
            len_residual: select_len!(flags.residuals, "residuals"),
        })
    }
}

impl Encode for DynEstimator {
    #[inline(always)]
    fn write_outdegree(&mut self, value: u64) -> bits::Result<usize> {
        Ok((self.len_outdegree)(value))
    }

    #[inline(always)]
    fn write_reference_offset(&mut self, value: u64) -> bits::Result<usize> {
        Ok((self.len_reference_offset)(value))
    }

    #[inline(always)]
    fn write_block_count(&mut self, value: u64) -> bits::Result<usize> {
        Ok((self.len_block)(value))
    }

    #[inline(always)]
    fn write_block(&mut self, value: u64) -> bits::Result<usize> {
        Ok((self.len_block)(value))
    }

    #[inline(always)]
    fn write_interval_count(&mut self, value: u64) -> bits::Result<usize> {
        Ok((self.len_interval)(value))
    }

    #[inline(always)]
    fn write_interval_start(&mut self, value: u64) -> bits::Result<usize> {
        Ok((self.len_interval)(value))
    }

    #[inline(always)]
    fn write_interval_len(&mut self, value: u64) -> bits::Result<usize> {
        Ok((self.len_interval)(value))
    }

    #[inline(always)]
    fn write_first_residual(&mut self, value: u64) -> bits::Result<usize> {
        Ok((self.len_residual)(value))
    }

    #[inline(always)]
    fn write_residual(&mut self, value: u64) -> bits::Result<usize> {
        Ok((self.len_residual)(value))
    }

    #[inline(always)]
    fn flush(&mut self) -> bits::Result<()> {
        Ok(())
    }
}
