//! Text encodings understood at the native boundary.
//!
//! Every text value that crosses into or out of the engine is tagged with one
//! of the four encodings below. Anything else is treated as opaque bytes.

use crate::Result;
use crate::error::{Error, TypeError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A canonical text encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    #[serde(rename = "UTF-8")]
    Utf8,
    #[serde(rename = "US-ASCII")]
    UsAscii,
    #[serde(rename = "UTF-16LE")]
    Utf16Le,
    #[serde(rename = "UTF-16BE")]
    Utf16Be,
}

impl Encoding {
    /// Resolve a charset name.
    ///
    /// The generic `"UTF-16"` resolves to the host's native byte order.
    /// Explicit byte orders are returned as requested; use
    /// [`Encoding::find_native`] where only the native order is acceptable.
    pub fn find(name: &str) -> Result<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "us-ascii" | "ascii" | "ansi-x3.4-1968" => Ok(Encoding::UsAscii),
            "utf-16" | "utf16" => Ok(Self::utf16_native()),
            "utf-16le" | "utf16le" => Ok(Encoding::Utf16Le),
            "utf-16be" | "utf16be" => Ok(Encoding::Utf16Be),
            _ => Err(Error::config(format!("unsupported encoding '{name}'"))),
        }
    }

    /// Resolve a charset name for a connection, rejecting a UTF-16 byte
    /// order other than the host's.
    pub fn find_native(name: &str) -> Result<Self> {
        let encoding = Self::find(name)?;
        if encoding.is_utf16() && encoding != Self::utf16_native() {
            return Err(Error::config(format!(
                "requested to use byte order different than native ({} on a {} host)",
                encoding,
                Self::utf16_native()
            )));
        }
        Ok(encoding)
    }

    /// UTF-16 in the host's native byte order.
    pub const fn utf16_native() -> Self {
        if cfg!(target_endian = "little") {
            Encoding::Utf16Le
        } else {
            Encoding::Utf16Be
        }
    }

    pub const fn is_utf16(self) -> bool {
        matches!(self, Encoding::Utf16Le | Encoding::Utf16Be)
    }

    /// Canonical charset name.
    pub const fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::UsAscii => "US-ASCII",
            Encoding::Utf16Le => "UTF-16LE",
            Encoding::Utf16Be => "UTF-16BE",
        }
    }

    /// Encode a string into this encoding's byte representation.
    ///
    /// US-ASCII shares UTF-8's byte layout; characters outside the ASCII
    /// range are kept as their UTF-8 sequences.
    pub fn encode(self, s: &str) -> Vec<u8> {
        match self {
            Encoding::Utf8 | Encoding::UsAscii => s.as_bytes().to_vec(),
            Encoding::Utf16Le => s.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Encoding::Utf16Be => s.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        }
    }

    /// Decode bytes in this encoding, failing on malformed input.
    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            Encoding::Utf8 | Encoding::UsAscii => String::from_utf8(bytes.to_vec())
                .map_err(|e| malformed(self, &e.to_string())),
            Encoding::Utf16Le | Encoding::Utf16Be => {
                let units = self.code_units(bytes)?;
                String::from_utf16(&units).map_err(|e| malformed(self, &e.to_string()))
            }
        }
    }

    /// Decode bytes, replacing malformed sequences with U+FFFD.
    pub fn decode_lossy(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 | Encoding::UsAscii => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Utf16Le | Encoding::Utf16Be => {
                let units: Vec<u16> = bytes
                    .chunks(2)
                    .map(|pair| match *pair {
                        [a, b] => self.unit([a, b]),
                        _ => 0xFFFD,
                    })
                    .collect();
                String::from_utf16_lossy(&units)
            }
        }
    }

    fn code_units(self, bytes: &[u8]) -> Result<Vec<u16>> {
        if bytes.len() % 2 != 0 {
            return Err(malformed(self, "odd number of bytes"));
        }
        Ok(bytes
            .chunks_exact(2)
            .map(|pair| self.unit([pair[0], pair[1]]))
            .collect())
    }

    fn unit(self, pair: [u8; 2]) -> u16 {
        if self == Encoding::Utf16Be {
            u16::from_be_bytes(pair)
        } else {
            u16::from_le_bytes(pair)
        }
    }
}

fn malformed(encoding: Encoding, detail: &str) -> Error {
    Error::Type(TypeError {
        expected: "well-formed text",
        actual: format!("malformed {encoding}: {detail}"),
        column: None,
    })
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::find(s)
    }
}
