/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Bit-level streams and the instantaneous codes of the graph format.
//!
//! Streams are MSB-first: bit 0 of the stream is the most significant bit
//! of the first byte. This is the order of the on-disk format, and it lets
//! unary codes be read by counting leading zeros.
//!
//! All codes come in reader/writer pairs that are exact: reading a value
//! consumes precisely the bits its writer produced, and the `len_*`
//! functions return the same count without touching a stream.

mod reader;
pub use reader::{BitReader, StreamBitReader};

mod writer;
pub use writer::BitWriter;

/// Errors raised by bit streams and codes.
#[derive(thiserror::Error, Debug)]
pub enum BitsError {
    #[error("I/O error in bit stream")]
    Io(#[from] std::io::Error),
    #[error("unexpected end of bit stream at bit {position}")]
    UnexpectedEof { position: u64 },
    #[error("cannot transfer {n} bits at once")]
    TooManyBits { n: u32 },
    #[error("invalid {code} code word")]
    InvalidCodeWord { code: &'static str },
    #[error("value {value} cannot be encoded with the {code} code")]
    ValueTooLarge { code: &'static str, value: u64 },
    #[error("bit position {position} is out of bounds ({len} bits)")]
    PositionOutOfBounds { position: u64, len: u64 },
    #[error("this bit stream does not support repositioning")]
    NotSeekable,
}

pub type Result<T> = std::result::Result<T, BitsError>;

/// Reads `n` bits even when `n` exceeds a word; the excess high bits must
/// be zero or the code word does not denote a representable value.
fn read_wide<R: BitRead + ?Sized>(reader: &mut R, n: u32, code: &'static str) -> Result<u64> {
    if n <= 64 {
        return reader.read_bits(n);
    }
    if reader.read_bits(n - 64)? != 0 {
        return Err(BitsError::InvalidCodeWord { code });
    }
    reader.read_bits(64)
}

fn write_wide<W: BitWrite + ?Sized>(writer: &mut W, value: u64, n: u32) -> Result<usize> {
    if n <= 64 {
        return writer.write_bits(value, n);
    }
    Ok(writer.write_bits(0, n - 64)? + writer.write_bits(value, 64)?)
}

/// A source of bits.
///
/// Implementations provide [`read_bits`](BitRead::read_bits) and
/// [`read_unary`](BitRead::read_unary); every other code is built on top of
/// those and comes for free. The trait is object-safe, so prototypes that
/// deserialize themselves (labels) can work against `&mut dyn BitRead`.
pub trait BitRead {
    /// Reads `n` ≤ 64 bits and returns them as the lowest bits of the result.
    fn read_bits(&mut self, n: u32) -> Result<u64>;

    /// Reads a unary code: the number of zeros preceding a one.
    fn read_unary(&mut self) -> Result<u64>;

    /// Returns the current position in bits from the start of the stream.
    fn position(&self) -> u64;

    /// Moves the stream to an absolute bit position.
    ///
    /// Fails with [`BitsError::NotSeekable`] on forward-only streams.
    fn set_position(&mut self, bit_position: u64) -> Result<()>;

    /// Skips `n` bits.
    fn skip(&mut self, n: u64) -> Result<()> {
        let mut left = n;
        while left > 0 {
            let chunk = left.min(64) as u32;
            self.read_bits(chunk)?;
            left -= chunk as u64;
        }
        Ok(())
    }

    /// Reads a γ code.
    fn read_gamma(&mut self) -> Result<u64> {
        let msb = self.read_unary()?;
        if msb > 63 {
            return Err(BitsError::InvalidCodeWord { code: "gamma" });
        }
        Ok(((1 << msb) | self.read_bits(msb as u32)?) - 1)
    }

    /// Reads a δ code.
    fn read_delta(&mut self) -> Result<u64> {
        let msb = self.read_gamma()?;
        if msb > 63 {
            return Err(BitsError::InvalidCodeWord { code: "delta" });
        }
        Ok(((1 << msb) | self.read_bits(msb as u32)?) - 1)
    }

    /// Reads a ζ_k code.
    fn read_zeta(&mut self, k: u32) -> Result<u64> {
        debug_assert!(k >= 1);
        let h = self.read_unary()?;
        if h.checked_mul(k as u64).map_or(true, |hk| hk > 63) {
            return Err(BitsError::InvalidCodeWord { code: "zeta" });
        }
        let hk = h as u32 * k;
        let left = 1u64 << hk;
        let m = read_wide(self, hk + k - 1, "zeta")?;
        if m < left {
            Ok(m + left - 1)
        } else {
            if m >= 1 << 63 {
                return Err(BitsError::InvalidCodeWord { code: "zeta" });
            }
            Ok((m << 1) + self.read_bits(1)? - 1)
        }
    }

    /// Reads a variable-length nibble code: 3-bit groups, most significant
    /// first, each preceded by a bit that is one on the last group.
    fn read_nibble(&mut self) -> Result<u64> {
        let mut value = 0u64;
        loop {
            let stop = self.read_bits(1)?;
            if value >> 61 != 0 {
                return Err(BitsError::InvalidCodeWord { code: "nibble" });
            }
            value = (value << 3) | self.read_bits(3)?;
            if stop == 1 {
                return Ok(value);
            }
        }
    }

    /// Reads a minimal binary code with bound `b`: a value in `[0, b)`.
    fn read_minimal_binary(&mut self, b: u64) -> Result<u64> {
        debug_assert!(b > 0);
        let s = 63 - b.leading_zeros();
        let m = ((1u128 << (s + 1)) - b as u128) as u64;
        let x = self.read_bits(s)?;
        if x < m {
            Ok(x)
        } else {
            Ok(((x << 1) | self.read_bits(1)?) - m)
        }
    }

    /// Reads a Golomb code with modulus `b`.
    fn read_golomb(&mut self, b: u64) -> Result<u64> {
        debug_assert!(b > 0);
        let q = self.read_unary()?;
        let r = self.read_minimal_binary(b)?;
        q.checked_mul(b)
            .and_then(|qb| qb.checked_add(r))
            .ok_or(BitsError::InvalidCodeWord { code: "golomb" })
    }

    /// Reads a skewed Golomb code with modulus `b`.
    fn read_skewed_golomb(&mut self, b: u64) -> Result<u64> {
        debug_assert!(b > 0);
        let i = self.read_unary()?;
        if i > 63 {
            return Err(BitsError::InvalidCodeWord { code: "skewed golomb" });
        }
        let cap = ((1u128 << (i + 1)) - 1) * b as u128;
        let base = (cap / (2 * b as u128)) * b as u128;
        let range = cap - base;
        if range > u64::MAX as u128 {
            return Err(BitsError::InvalidCodeWord { code: "skewed golomb" });
        }
        Ok(base as u64 + self.read_minimal_binary(range as u64)?)
    }
}

impl<T: BitRead + ?Sized> BitRead for Box<T> {
    #[inline(always)]
    fn read_bits(&mut self, n: u32) -> Result<u64> {
        (**self).read_bits(n)
    }

    #[inline(always)]
    fn read_unary(&mut self) -> Result<u64> {
        (**self).read_unary()
    }

    #[inline(always)]
    fn position(&self) -> u64 {
        (**self).position()
    }

    #[inline(always)]
    fn set_position(&mut self, bit_position: u64) -> Result<()> {
        (**self).set_position(bit_position)
    }

    #[inline(always)]
    fn skip(&mut self, n: u64) -> Result<()> {
        (**self).skip(n)
    }
}

/// A sink of bits.
///
/// Every method returns the number of bits written, so callers can track
/// offsets without querying the stream. Bits of `value` above the requested
/// width are ignored.
pub trait BitWrite {
    /// Writes the lowest `n` ≤ 64 bits of `value`.
    fn write_bits(&mut self, value: u64, n: u32) -> Result<usize>;

    /// Flushes any buffered bits, padding the last byte with zeros.
    fn flush(&mut self) -> Result<()>;

    /// Writes a unary code: `value` zeros followed by a one.
    fn write_unary(&mut self, value: u64) -> Result<usize> {
        let mut left = value;
        let mut written = 0;
        while left >= 64 {
            written += self.write_bits(0, 64)?;
            left -= 64;
        }
        written += self.write_bits(1, left as u32 + 1)?;
        Ok(written)
    }

    /// Writes a γ code.
    fn write_gamma(&mut self, value: u64) -> Result<usize> {
        if value == u64::MAX {
            return Err(BitsError::ValueTooLarge {
                code: "gamma",
                value,
            });
        }
        let v = value + 1;
        let msb = 63 - v.leading_zeros();
        Ok(self.write_unary(msb as u64)? + self.write_bits(v, msb)?)
    }

    /// Writes a δ code.
    fn write_delta(&mut self, value: u64) -> Result<usize> {
        if value == u64::MAX {
            return Err(BitsError::ValueTooLarge {
                code: "delta",
                value,
            });
        }
        let v = value + 1;
        let msb = 63 - v.leading_zeros();
        Ok(self.write_gamma(msb as u64)? + self.write_bits(v, msb)?)
    }

    /// Writes a ζ_k code.
    fn write_zeta(&mut self, value: u64, k: u32) -> Result<usize> {
        debug_assert!(k >= 1);
        if value == u64::MAX {
            return Err(BitsError::ValueTooLarge { code: "zeta", value });
        }
        let v = value + 1;
        let msb = 63 - v.leading_zeros();
        let h = msb / k;
        let hk = h * k;
        let left = 1u64 << hk;
        let mut written = self.write_unary(h as u64)?;
        written += if v - left < left {
            write_wide(self, v - left, hk + k - 1)?
        } else {
            write_wide(self, v, hk + k)?
        };
        Ok(written)
    }

    /// Writes a variable-length nibble code.
    fn write_nibble(&mut self, value: u64) -> Result<usize> {
        let msb = 63 - value.max(1).leading_zeros();
        let mut h = (msb / 3) as i64;
        let mut written = 0;
        while h >= 0 {
            written += self.write_bits((h == 0) as u64, 1)?;
            written += self.write_bits((value >> (h * 3)) & 7, 3)?;
            h -= 1;
        }
        Ok(written)
    }

    /// Writes `value` ∈ `[0, b)` in minimal binary.
    fn write_minimal_binary(&mut self, value: u64, b: u64) -> Result<usize> {
        debug_assert!(b > 0);
        debug_assert!(value < b);
        let s = 63 - b.leading_zeros();
        let m = ((1u128 << (s + 1)) - b as u128) as u64;
        if value < m {
            self.write_bits(value, s)
        } else {
            self.write_bits(value + m, s + 1)
        }
    }

    /// Writes a Golomb code with modulus `b`.
    fn write_golomb(&mut self, value: u64, b: u64) -> Result<usize> {
        debug_assert!(b > 0);
        Ok(self.write_unary(value / b)? + self.write_minimal_binary(value % b, b)?)
    }

    /// Writes a skewed Golomb code with modulus `b`.
    fn write_skewed_golomb(&mut self, value: u64, b: u64) -> Result<usize> {
        debug_assert!(b > 0);
        let i = 63 - (value / b + 1).leading_zeros();
        let cap = ((1u128 << (i + 1)) - 1) * b as u128;
        let base = (cap / (2 * b as u128)) * b as u128;
        let range = cap - base;
        if range > u64::MAX as u128 {
            return Err(BitsError::ValueTooLarge {
                code: "skewed golomb",
                value,
            });
        }
        Ok(self.write_unary(i as u64)?
            + self.write_minimal_binary(value - base as u64, range as u64)?)
    }
}

impl<T: BitWrite + ?Sized> BitWrite for Box<T> {
    #[inline(always)]
    fn write_bits(&mut self, value: u64, n: u32) -> Result<usize> {
        (**self).write_bits(value, n)
    }

    #[inline(always)]
    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Length of the unary code for `value`.
pub fn len_unary(value: u64) -> usize {
    value as usize + 1
}

/// Length of the γ code for `value`.
pub fn len_gamma(value: u64) -> usize {
    debug_assert!(value != u64::MAX);
    let msb = 63 - (value + 1).leading_zeros();
    2 * msb as usize + 1
}

/// Length of the δ code for `value`.
pub fn len_delta(value: u64) -> usize {
    debug_assert!(value != u64::MAX);
    let msb = 63 - (value + 1).leading_zeros();
    len_gamma(msb as u64) + msb as usize
}

/// Length of the ζ_k code for `value`.
pub fn len_zeta(value: u64, k: u32) -> usize {
    debug_assert!(value != u64::MAX);
    let v = value + 1;
    let msb = 63 - v.leading_zeros();
    let h = msb / k;
    let hk = h * k;
    let left = 1u64 << hk;
    h as usize
        + 1
        + if v - left < left {
            (hk + k - 1) as usize
        } else {
            (hk + k) as usize
        }
}

/// Length of the nibble code for `value`.
pub fn len_nibble(value: u64) -> usize {
    let msb = 63 - value.max(1).leading_zeros();
    (msb as usize / 3 + 1) * 4
}

/// Length of the minimal binary code for `value` with bound `b`.
pub fn len_minimal_binary(value: u64, b: u64) -> usize {
    debug_assert!(b > 0);
    let s = 63 - b.leading_zeros();
    let m = ((1u128 << (s + 1)) - b as u128) as u64;
    if value < m {
        s as usize
    } else {
        s as usize + 1
    }
}

/// Length of the Golomb code for `value` with modulus `b`.
pub fn len_golomb(value: u64, b: u64) -> usize {
    (value / b) as usize + 1 + len_minimal_binary(value % b, b)
}

/// Length of the skewed Golomb code for `value` with modulus `b`.
pub fn len_skewed_golomb(value: u64, b: u64) -> usize {
    let i = 63 - (value / b + 1).leading_zeros();
    let cap = ((1u128 << (i + 1)) - 1) * b as u128;
    let base = (cap / (2 * b as u128)) * b as u128;
    i as usize + 1 + len_minimal_binary(value - base as u64, (cap - base) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn test_values() -> Vec<u64> {
        let mut values: Vec<u64> = (0..=130).collect();
        for shift in 3..62 {
            values.push((1 << shift) - 1);
            values.push(1 << shift);
            values.push((1 << shift) + 1);
        }
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        for _ in 0..500 {
            values.push(rng.gen_range(0..1 << 40));
        }
        values
    }

    /// Writes with `write`, reads back with `read`, and checks that values,
    /// lengths and positions all agree.
    fn check_code(
        write: impl Fn(&mut BitWriter<Vec<u8>>, u64) -> Result<usize>,
        read: impl Fn(&mut BitReader<Vec<u8>>) -> Result<u64>,
        len: impl Fn(u64) -> usize,
    ) {
        let values = test_values();
        let mut writer = BitWriter::new(Vec::new());
        let mut lens = Vec::new();
        for &v in &values {
            let written = write(&mut writer, v).unwrap();
            assert_eq!(written, len(v), "length mismatch for {}", v);
            lens.push(written);
        }
        let total = writer.written_bits();
        let buffer = writer.into_inner().unwrap();

        let mut reader = BitReader::new(buffer);
        for (&v, &l) in values.iter().zip(&lens) {
            let before = reader.position();
            assert_eq!(read(&mut reader).unwrap(), v);
            assert_eq!(reader.position() - before, l as u64);
        }
        assert_eq!(reader.position(), total);
    }

    #[test]
    fn test_unary() {
        check_code(
            |w, v| w.write_unary(v),
            |r| r.read_unary(),
            |v| len_unary(v),
        );
    }

    #[test]
    fn test_gamma() {
        check_code(
            |w, v| w.write_gamma(v),
            |r| r.read_gamma(),
            |v| len_gamma(v),
        );
    }

    #[test]
    fn test_delta() {
        check_code(
            |w, v| w.write_delta(v),
            |r| r.read_delta(),
            |v| len_delta(v),
        );
    }

    #[test]
    fn test_zeta() {
        for k in 1..=7 {
            check_code(
                |w, v| w.write_zeta(v, k),
                |r| r.read_zeta(k),
                |v| len_zeta(v, k),
            );
        }
    }

    #[test]
    fn test_zeta1_is_gamma() {
        let mut buffer = Vec::new();
        let mut writer = BitWriter::new(&mut buffer);
        for v in 0..1000 {
            writer.write_zeta(v, 1).unwrap();
        }
        writer.flush().unwrap();
        drop(writer);
        let mut reader = BitReader::new(buffer.as_slice());
        for v in 0..1000 {
            assert_eq!(reader.read_gamma().unwrap(), v);
        }
    }

    #[test]
    fn test_nibble() {
        check_code(
            |w, v| w.write_nibble(v),
            |r| r.read_nibble(),
            |v| len_nibble(v),
        );
    }

    #[test]
    fn test_golomb() {
        for b in [1, 2, 3, 4, 7, 64, 1000] {
            check_code(
                |w, v| w.write_golomb(v, b),
                |r| r.read_golomb(b),
                |v| len_golomb(v, b),
            );
        }
    }

    #[test]
    fn test_skewed_golomb() {
        for b in [1, 2, 3, 7, 100] {
            check_code(
                |w, v| w.write_skewed_golomb(v, b),
                |r| r.read_skewed_golomb(b),
                |v| len_skewed_golomb(v, b),
            );
        }
    }

    #[test]
    fn test_minimal_binary() {
        for b in [1u64, 2, 3, 5, 8, 100, 1 << 33] {
            let mut buffer = Vec::new();
            let mut writer = BitWriter::new(&mut buffer);
            let values: Vec<u64> = (0..b.min(300)).chain([b - 1]).collect();
            for &v in &values {
                let written = writer.write_minimal_binary(v, b).unwrap();
                assert_eq!(written, len_minimal_binary(v, b));
            }
            writer.flush().unwrap();
            drop(writer);
            let mut reader = BitReader::new(buffer.as_slice());
            for &v in &values {
                assert_eq!(reader.read_minimal_binary(b).unwrap(), v);
            }
        }
    }

    #[test]
    fn test_bit_layout() {
        // pin the MSB-first layout: γ(0) = "1", unary(2) = "001"
        let mut buffer = Vec::new();
        let mut writer = BitWriter::new(&mut buffer);
        writer.write_gamma(0).unwrap();
        writer.write_unary(2).unwrap();
        writer.flush().unwrap();
        drop(writer);
        assert_eq!(buffer, vec![0b1001_0000]);
    }

    #[test]
    fn test_truncated_stream() {
        let buffer = vec![0u8; 2];
        let mut reader = BitReader::new(buffer.as_slice());
        // 16 zero bits and no terminating one
        assert!(matches!(
            reader.read_unary(),
            Err(BitsError::UnexpectedEof { .. })
        ));
        let mut reader = BitReader::new(buffer.as_slice());
        assert!(reader.read_bits(16).is_ok());
        assert!(reader.read_bits(1).is_err());
    }

    #[test]
    fn test_positioning() {
        let mut buffer = Vec::new();
        let mut writer = BitWriter::new(&mut buffer);
        for v in 0..100u64 {
            writer.write_gamma(v).unwrap();
        }
        writer.flush().unwrap();
        drop(writer);

        // skip the first 50 codes, then read the rest
        let mut reader = BitReader::new(buffer.as_slice());
        let mut pos = 0;
        for v in 0..50u64 {
            pos += len_gamma(v) as u64;
        }
        reader.set_position(pos).unwrap();
        for v in 50..100 {
            assert_eq!(reader.read_gamma().unwrap(), v);
        }

        // and again, with skip
        let mut reader = BitReader::new(buffer.as_slice());
        reader.skip(pos).unwrap();
        assert_eq!(reader.position(), pos);
        assert_eq!(reader.read_gamma().unwrap(), 50);
    }

    #[test]
    fn test_stream_reader_matches_slice_reader() {
        let mut buffer = Vec::new();
        let mut writer = BitWriter::new(&mut buffer);
        for v in 0..1000u64 {
            writer.write_delta(v).unwrap();
        }
        writer.flush().unwrap();
        drop(writer);

        let mut slice_reader = BitReader::new(buffer.as_slice());
        let mut stream_reader = StreamBitReader::new(std::io::Cursor::new(buffer.clone()));
        for _ in 0..1000 {
            assert_eq!(
                slice_reader.read_delta().unwrap(),
                stream_reader.read_delta().unwrap()
            );
            assert_eq!(slice_reader.position(), stream_reader.position());
        }
        assert!(matches!(
            stream_reader.set_position(0),
            Err(BitsError::NotSeekable)
        ));
    }
}
