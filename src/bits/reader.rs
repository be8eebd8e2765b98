/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::{BitRead, BitsError, Result};

#[inline(always)]
fn mask(n: u32) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}

/// A bit reader over an in-memory byte backing: a heap buffer, a slice, or
/// a memory-mapped region.
///
/// The reader keeps up to 64 pending bits in a refill buffer; the next bit
/// to be returned is bit `fill - 1` of the buffer. Bits above `fill` are
/// kept at zero.
///
/// Cloning a reader is cheap when the backing is (`Arc`-shared graph data,
/// for instance); each clone gets an independent cursor over the same
/// bytes.
#[derive(Debug, Clone)]
pub struct BitReader<B> {
    data: B,
    /// Index of the next byte to pull into the buffer.
    byte_pos: usize,
    buffer: u64,
    /// Number of valid bits in the buffer.
    fill: u32,
}

impl<B: AsRef<[u8]>> BitReader<B> {
    pub fn new(data: B) -> Self {
        Self {
            data,
            byte_pos: 0,
            buffer: 0,
            fill: 0,
        }
    }

    /// Returns the backing storage.
    pub fn into_inner(self) -> B {
        self.data
    }

    /// Pulls whole bytes into the buffer until it holds at least 57 bits
    /// or the data is exhausted.
    #[inline(always)]
    fn refill(&mut self) {
        let data = self.data.as_ref();
        while self.fill <= 56 && self.byte_pos < data.len() {
            self.buffer = (self.buffer << 8) | data[self.byte_pos] as u64;
            self.byte_pos += 1;
            self.fill += 8;
        }
    }
}

impl<B: AsRef<[u8]>> BitRead for BitReader<B> {
    fn read_bits(&mut self, n: u32) -> Result<u64> {
        if n == 0 {
            return Ok(0);
        }
        if n > 64 {
            return Err(BitsError::TooManyBits { n });
        }
        if n > self.fill {
            self.refill();
        }
        if n <= self.fill {
            self.fill -= n;
            let result = (self.buffer >> self.fill) & mask(n);
            self.buffer &= mask(self.fill);
            return Ok(result);
        }
        // Fewer bits buffered than requested even after a refill: either we
        // are at the very end of the data, or n is close to 64 and the
        // refill stopped short of a full byte. Take what we have and pull
        // the rest.
        let have = self.fill;
        let high = self.buffer;
        self.buffer = 0;
        self.fill = 0;
        self.refill();
        let need = n - have;
        if need > self.fill {
            return Err(BitsError::UnexpectedEof {
                position: self.position(),
            });
        }
        self.fill -= need;
        let low = (self.buffer >> self.fill) & mask(need);
        self.buffer &= mask(self.fill);
        Ok(if need == 64 { low } else { (high << need) | low })
    }

    fn read_unary(&mut self) -> Result<u64> {
        let mut result = 0u64;
        loop {
            if self.fill == 0 {
                self.refill();
                if self.fill == 0 {
                    return Err(BitsError::UnexpectedEof {
                        position: self.position(),
                    });
                }
            }
            let zeros = (self.buffer << (64 - self.fill)).leading_zeros();
            if zeros < self.fill {
                result += zeros as u64;
                self.fill -= zeros + 1;
                self.buffer &= mask(self.fill);
                return Ok(result);
            }
            // the whole buffer is zeros
            result += self.fill as u64;
            self.fill = 0;
            self.buffer = 0;
        }
    }

    #[inline(always)]
    fn position(&self) -> u64 {
        self.byte_pos as u64 * 8 - self.fill as u64
    }

    fn set_position(&mut self, bit_position: u64) -> Result<()> {
        let len = self.data.as_ref().len() as u64 * 8;
        if bit_position > len {
            return Err(BitsError::PositionOutOfBounds {
                position: bit_position,
                len,
            });
        }
        self.byte_pos = (bit_position / 8) as usize;
        self.buffer = 0;
        self.fill = 0;
        self.skip(bit_position % 8)
    }

    fn skip(&mut self, n: u64) -> Result<()> {
        if n <= self.fill as u64 {
            self.fill -= n as u32;
            self.buffer &= mask(self.fill);
            return Ok(());
        }
        let mut left = n - self.fill as u64;
        self.fill = 0;
        self.buffer = 0;
        let bytes = (left / 8) as usize;
        if self.byte_pos + bytes > self.data.as_ref().len() {
            return Err(BitsError::PositionOutOfBounds {
                position: self.position() + n,
                len: self.data.as_ref().len() as u64 * 8,
            });
        }
        self.byte_pos += bytes;
        left %= 8;
        if left > 0 {
            self.read_bits(left as u32)?;
        }
        Ok(())
    }
}

/// A forward-only bit reader over any [`io::Read`](std::io::Read), used for
/// offline and stream-once access, where the graph bytes are never loaded.
///
/// [`set_position`](BitRead::set_position) fails with
/// [`BitsError::NotSeekable`].
#[derive(Debug)]
pub struct StreamBitReader<R> {
    reader: R,
    buffer: u64,
    fill: u32,
    /// Total bits pulled from the underlying reader.
    pulled: u64,
    eof: bool,
}

impl<R: std::io::Read> StreamBitReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: 0,
            fill: 0,
            pulled: 0,
            eof: false,
        }
    }

    fn refill(&mut self) -> Result<()> {
        let mut byte = [0u8; 1];
        while self.fill <= 56 && !self.eof {
            match self.reader.read(&mut byte) {
                Ok(0) => self.eof = true,
                Ok(_) => {
                    self.buffer = (self.buffer << 8) | byte[0] as u64;
                    self.fill += 8;
                    self.pulled += 8;
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl<R: std::io::Read> BitRead for StreamBitReader<R> {
    fn read_bits(&mut self, n: u32) -> Result<u64> {
        if n == 0 {
            return Ok(0);
        }
        if n > 64 {
            return Err(BitsError::TooManyBits { n });
        }
        if n > self.fill {
            self.refill()?;
        }
        if n <= self.fill {
            self.fill -= n;
            let result = (self.buffer >> self.fill) & mask(n);
            self.buffer &= mask(self.fill);
            return Ok(result);
        }
        let have = self.fill;
        let high = self.buffer;
        self.buffer = 0;
        self.fill = 0;
        self.refill()?;
        let need = n - have;
        if need > self.fill {
            return Err(BitsError::UnexpectedEof {
                position: self.position(),
            });
        }
        self.fill -= need;
        let low = (self.buffer >> self.fill) & mask(need);
        self.buffer &= mask(self.fill);
        Ok(if need == 64 { low } else { (high << need) | low })
    }

    fn read_unary(&mut self) -> Result<u64> {
        let mut result = 0u64;
        loop {
            if self.fill == 0 {
                self.refill()?;
                if self.fill == 0 {
                    return Err(BitsError::UnexpectedEof {
                        position: self.position(),
                    });
                }
            }
            let zeros = (self.buffer << (64 - self.fill)).leading_zeros();
            if zeros < self.fill {
                result += zeros as u64;
                self.fill -= zeros + 1;
                self.buffer &= mask(self.fill);
                return Ok(result);
            }
            result += self.fill as u64;
            self.fill = 0;
            self.buffer = 0;
        }
    }

    #[inline(always)]
    fn position(&self) -> u64 {
        self.pulled - self.fill as u64
    }

    fn set_position(&mut self, _bit_position: u64) -> Result<()> {
        Err(BitsError::NotSeekable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bits_across_words() {
        // 16 bytes of a fixed pattern
        let data: Vec<u8> = (0..16).map(|i| (i * 37 + 11) as u8).collect();
        // read the same stream with different chunk sizes and compare
        for chunk in [1u32, 3, 7, 8, 13, 31, 57, 63, 64] {
            let mut reader = BitReader::new(data.as_slice());
            let mut bits = Vec::new();
            let mut left = data.len() as u64 * 8;
            while left >= chunk as u64 {
                let v = reader.read_bits(chunk).unwrap();
                for i in (0..chunk).rev() {
                    bits.push((v >> i) & 1);
                }
                left -= chunk as u64;
            }
            let expected: Vec<u64> = data
                .iter()
                .flat_map(|b| (0..8).rev().map(move |i| ((b >> i) & 1) as u64))
                .take(bits.len())
                .collect();
            assert_eq!(bits, expected, "chunk size {}", chunk);
        }
    }

    #[test]
    fn test_set_position_mid_byte() {
        let data = [0b1011_0110u8, 0b0101_1100];
        let mut reader = BitReader::new(data.as_slice());
        reader.set_position(3).unwrap();
        assert_eq!(reader.position(), 3);
        assert_eq!(reader.read_bits(5).unwrap(), 0b10110);
        assert_eq!(reader.read_bits(4).unwrap(), 0b0101);
        reader.set_position(0).unwrap();
        assert_eq!(reader.read_bits(8).unwrap(), 0b1011_0110);
        assert!(reader.set_position(17).is_err());
    }
}
