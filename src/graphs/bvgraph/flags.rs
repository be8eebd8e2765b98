/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use std::collections::HashMap;

/// Errors raised while interpreting a `.properties` file.
#[derive(thiserror::Error, Debug)]
pub enum PropertiesError {
    #[error("missing '{property}' property")]
    MissingProperty { property: &'static str },
    #[error("cannot parse '{property}' property as {expected}: got '{value}'")]
    InvalidPropertyValue {
        property: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("unknown compression flag '{0}'")]
    UnknownCompressionFlag(String),
    #[error("unknown code '{0}'")]
    UnknownCode(String),
    #[error("only ζ₁–ζ₇ are supported, got k = {0}")]
    UnsupportedZeta(usize),
    #[error("the {code:?} code cannot be used for the {position} stream")]
    UnsupportedCode { code: Code, position: &'static str },
    #[error("only γ is supported for the offsets stream")]
    OffsetsCode,
    #[error("only one ζ exponent is supported per graph")]
    MixedZetaK,
    #[error("unknown graph class '{0}'")]
    UnknownGraphClass(String),
}

/// An instantaneous code usable in a compressed graph stream.
///
/// Golomb and skewed Golomb carry a stable identifier for compatibility
/// with the on-disk flag tags, but they need a modulus the flag syntax
/// cannot express, so selecting them for a stream is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Unary,
    Gamma,
    Delta,
    Zeta { k: u32 },
    Nibble,
    Golomb,
    SkewedGolomb,
}

impl Code {
    /// The stable integer tag of this code in the on-disk format.
    pub const fn tag(self) -> u32 {
        match self {
            Code::Delta => 1,
            Code::Gamma => 2,
            Code::Golomb => 3,
            Code::SkewedGolomb => 4,
            Code::Unary => 5,
            Code::Zeta { .. } => 6,
            Code::Nibble => 7,
        }
    }

    /// The inverse of [`tag`](Code::tag); ζ gets the exponent `k`.
    pub const fn from_tag(tag: u32, k: u32) -> Option<Self> {
        Some(match tag {
            1 => Code::Delta,
            2 => Code::Gamma,
            3 => Code::Golomb,
            4 => Code::SkewedGolomb,
            5 => Code::Unary,
            6 => Code::Zeta { k },
            7 => Code::Nibble,
            _ => return None,
        })
    }
}

/// The parameters governing a compressed graph: the code of each stream
/// position and the window, reference-chain and interval knobs.
#[derive(Debug, Clone, Copy)]
pub struct CompFlags {
    /// Code of the outdegrees.
    pub outdegrees: Code,
    /// Code of the reference offsets.
    pub references: Code,
    /// Code of the block counts and block lengths of copy lists.
    pub blocks: Code,
    /// Code of the interval counts, left extremes and lengths.
    pub intervals: Code,
    /// Code of the first and following residual gaps.
    pub residuals: Code,
    /// Minimum length of an interval compressed as (left, length).
    pub min_interval_length: usize,
    /// Number of previous nodes candidate for referencing.
    pub compression_window: usize,
    /// Maximum length of a reference chain; bounds decoding depth.
    pub max_ref_count: usize,
}

impl core::default::Default for CompFlags {
    fn default() -> Self {
        CompFlags {
            outdegrees: Code::Gamma,
            references: Code::Gamma,
            blocks: Code::Gamma,
            intervals: Code::Gamma,
            residuals: Code::Zeta { k: 3 },
            min_interval_length: 4,
            compression_window: 7,
            max_ref_count: 3,
        }
    }
}

impl CompFlags {
    /// Parses a code name from a `compressionflags` entry.
    pub fn code_from_str(s: &str, k: u32) -> Option<Code> {
        match s.to_uppercase().as_str() {
            "UNARY" => Some(Code::Unary),
            "GAMMA" => Some(Code::Gamma),
            "DELTA" => Some(Code::Delta),
            "ZETA" => Some(Code::Zeta { k }),
            "NIBBLE" => Some(Code::Nibble),
            "GOLOMB" => Some(Code::Golomb),
            "SKEWED_GOLOMB" => Some(Code::SkewedGolomb),
            _ => None,
        }
    }

    pub fn code_to_str(c: Code) -> &'static str {
        match c {
            Code::Unary => "UNARY",
            Code::Gamma => "GAMMA",
            Code::Delta => "DELTA",
            Code::Zeta { .. } => "ZETA",
            Code::Nibble => "NIBBLE",
            Code::Golomb => "GOLOMB",
            Code::SkewedGolomb => "SKEWED_GOLOMB",
        }
    }

    /// The ζ exponent shared by all streams, checking consistency.
    pub fn zeta_k(&self) -> Result<u32, PropertiesError> {
        let mut k = None;
        for code in [
            self.outdegrees,
            self.references,
            self.blocks,
            self.intervals,
            self.residuals,
        ] {
            if let Code::Zeta { k: new_k } = code {
                match k {
                    Some(old_k) if old_k != new_k => return Err(PropertiesError::MixedZetaK),
                    _ => k = Some(new_k),
                }
            }
        }
        Ok(k.unwrap_or(3))
    }

    /// Renders the `.properties` contents for a graph with these flags.
    ///
    /// Positions using their default code (γ everywhere, ζ_k for the
    /// residuals) are left out of `compressionflags`.
    pub fn to_properties(
        &self,
        graph_class: &str,
        num_nodes: usize,
        num_arcs: u64,
        avg_gap: f64,
        bits_per_link: f64,
    ) -> Result<String, PropertiesError> {
        let mut flags = Vec::new();
        if self.outdegrees != Code::Gamma {
            flags.push(format!("OUTDEGREES_{}", Self::code_to_str(self.outdegrees)));
        }
        if self.references != Code::Gamma {
            flags.push(format!("REFERENCES_{}", Self::code_to_str(self.references)));
        }
        if self.blocks != Code::Gamma {
            flags.push(format!("BLOCKS_{}", Self::code_to_str(self.blocks)));
        }
        if self.intervals != Code::Gamma {
            flags.push(format!("INTERVALS_{}", Self::code_to_str(self.intervals)));
        }
        if !matches!(self.residuals, Code::Zeta { .. }) {
            flags.push(format!("RESIDUALS_{}", Self::code_to_str(self.residuals)));
        }
        let k = self.zeta_k()?;

        let mut s = String::new();
        s.push_str("#BVGraph properties\n");
        s.push_str(&format!("graphclass={}\n", graph_class));
        s.push_str("version=0\n");
        s.push_str(&format!("nodes={}\n", num_nodes));
        s.push_str(&format!("arcs={}\n", num_arcs));
        s.push_str(&format!("windowsize={}\n", self.compression_window));
        s.push_str(&format!("maxrefcount={}\n", self.max_ref_count));
        s.push_str(&format!("minintervallength={}\n", self.min_interval_length));
        s.push_str(&format!("zetak={}\n", k));
        s.push_str(&format!("compressionflags={}\n", flags.join(",")));
        s.push_str(&format!("avggap={:.3}\n", avg_gap));
        s.push_str(&format!("bitsperlink={:.3}\n", bits_per_link));
        Ok(s)
    }

    fn required<'a>(
        map: &'a HashMap<String, String>,
        property: &'static str,
    ) -> Result<&'a str, PropertiesError> {
        map.get(property)
            .map(String::as_str)
            .ok_or(PropertiesError::MissingProperty { property })
    }

    fn required_usize(
        map: &HashMap<String, String>,
        property: &'static str,
    ) -> Result<usize, PropertiesError> {
        let value = Self::required(map, property)?;
        value
            .trim()
            .parse()
            .map_err(|_| PropertiesError::InvalidPropertyValue {
                property,
                expected: "usize",
                value: value.to_owned(),
            })
    }

    /// Reconstructs the flags from a parsed `.properties` map.
    pub fn from_properties(map: &HashMap<String, String>) -> Result<Self, PropertiesError> {
        let mut cf = CompFlags::default();

        let k = Self::required_usize(map, "zetak")?;
        if !(1..=7).contains(&k) {
            return Err(PropertiesError::UnsupportedZeta(k));
        }
        let k = k as u32;
        cf.residuals = Code::Zeta { k };

        let comp_flags = Self::required(map, "compressionflags")?;
        if !comp_flags.trim().is_empty() {
            // entries are comma-separated; legacy files use '|'
            for flag in comp_flags.trim().split([',', '|']) {
                let mut parts = flag.splitn(2, '_');
                let position = parts.next().unwrap_or_default();
                let code = parts
                    .next()
                    .ok_or_else(|| PropertiesError::UnknownCompressionFlag(flag.to_owned()))?;
                let code = Self::code_from_str(code, k)
                    .ok_or_else(|| PropertiesError::UnknownCode(code.to_owned()))?;
                match position {
                    "OUTDEGREES" => cf.outdegrees = code,
                    "REFERENCES" => cf.references = code,
                    "BLOCKS" => cf.blocks = code,
                    "INTERVALS" => cf.intervals = code,
                    "RESIDUALS" => cf.residuals = code,
                    "OFFSETS" => {
                        if code != Code::Gamma {
                            return Err(PropertiesError::OffsetsCode);
                        }
                    }
                    _ => return Err(PropertiesError::UnknownCompressionFlag(flag.to_owned())),
                }
            }
        }

        cf.compression_window = Self::required_usize(map, "windowsize")?;
        cf.max_ref_count = Self::required_usize(map, "maxrefcount")?;
        cf.min_interval_length = Self::required_usize(map, "minintervallength")?;
        Ok(cf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> HashMap<String, String> {
        s.lines()
            .filter(|l| !l.starts_with('#') && l.contains('='))
            .map(|l| {
                let (k, v) = l.split_once('=').unwrap();
                (k.to_owned(), v.to_owned())
            })
            .collect()
    }

    #[test]
    fn test_round_trip() {
        let mut cf = CompFlags {
            outdegrees: Code::Delta,
            references: Code::Unary,
            residuals: Code::Zeta { k: 5 },
            ..Default::default()
        };
        cf.compression_window = 9;
        let props = cf
            .to_properties("BvGraph", 10, 20, 1.0, 2.0)
            .unwrap();
        let back = CompFlags::from_properties(&parse(&props)).unwrap();
        assert_eq!(back.outdegrees, Code::Delta);
        assert_eq!(back.references, Code::Unary);
        assert_eq!(back.blocks, Code::Gamma);
        assert_eq!(back.residuals, Code::Zeta { k: 5 });
        assert_eq!(back.compression_window, 9);
        assert_eq!(back.max_ref_count, cf.max_ref_count);
        assert_eq!(back.min_interval_length, cf.min_interval_length);
    }

    #[test]
    fn test_legacy_separator() {
        let props = parse(
            "zetak=3\nwindowsize=7\nmaxrefcount=3\nminintervallength=4\n\
             compressionflags=OUTDEGREES_DELTA|RESIDUALS_GAMMA",
        );
        let cf = CompFlags::from_properties(&props).unwrap();
        assert_eq!(cf.outdegrees, Code::Delta);
        assert_eq!(cf.residuals, Code::Gamma);
    }

    #[test]
    fn test_missing_key() {
        let props = parse("zetak=3\nwindowsize=7\nmaxrefcount=3\ncompressionflags=");
        assert!(matches!(
            CompFlags::from_properties(&props),
            Err(PropertiesError::MissingProperty {
                property: "minintervallength"
            })
        ));
    }

    #[test]
    fn test_code_tags_are_stable() {
        assert_eq!(Code::Delta.tag(), 1);
        assert_eq!(Code::Gamma.tag(), 2);
        assert_eq!(Code::Golomb.tag(), 3);
        assert_eq!(Code::SkewedGolomb.tag(), 4);
        assert_eq!(Code::Unary.tag(), 5);
        assert_eq!(Code::Zeta { k: 3 }.tag(), 6);
        assert_eq!(Code::Nibble.tag(), 7);
        for tag in 1..=7 {
            assert_eq!(Code::from_tag(tag, 3).unwrap().tag(), tag);
        }
        assert_eq!(Code::from_tag(8, 3), None);
    }

    #[test]
    fn test_skewed_golomb_flag_parses() {
        // the name contains the entry separator's sibling '_'
        let props = parse(
            "zetak=3\nwindowsize=7\nmaxrefcount=3\nminintervallength=4\n\
             compressionflags=BLOCKS_SKEWED_GOLOMB",
        );
        let cf = CompFlags::from_properties(&props).unwrap();
        assert_eq!(cf.blocks, Code::SkewedGolomb);
    }
}
