//! LoRaWAN identifiers as they appear on the wire.
//!
//! Both identifiers render as lowercase hex and parse case-insensitively.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexIdError {
    #[error("expected {expected} hex characters, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("invalid hex character in '{0}'")]
    InvalidChar(String),
}

fn parse_hex<const N: usize>(s: &str) -> Result<[u8; N], HexIdError> {
    if s.len() != N * 2 {
        return Err(HexIdError::Length {
            expected: N * 2,
            actual: s.len(),
        });
    }

    if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(HexIdError::InvalidChar(s.to_string()));
    }

    let mut out = [0u8; N];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
            .map_err(|_| HexIdError::InvalidChar(s.to_string()))?;
    }
    Ok(out)
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for b in bytes {
        write!(f, "{:02x}", b)?;
    }
    Ok(())
}

macro_rules! hex_identifier {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(pub [u8; $len]);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write_hex(f, &self.0)
            }
        }

        impl FromStr for $name {
            type Err = HexIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_hex::<$len>(s).map($name)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                $name(bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_identifier!(
    /// 64-bit extended unique identifier (DevEUI, gateway MAC).
    Eui64,
    8
);

hex_identifier!(
    /// 32-bit device address assigned at join.
    DevAddr,
    4
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eui64_renders_lowercase_hex() {
        let eui = Eui64([1, 1, 1, 1, 1, 1, 1, 1]);
        assert_eq!(eui.to_string(), "0101010101010101");

        let eui = Eui64([0xAB, 0xCD, 0xEF, 0, 0, 0, 0, 0xFF]);
        assert_eq!(eui.to_string(), "abcdef00000000ff");
    }

    #[test]
    fn test_eui64_parses_mixed_case() {
        let eui: Eui64 = "ABCDEF00000000ff".parse().unwrap();
        assert_eq!(eui, Eui64([0xAB, 0xCD, 0xEF, 0, 0, 0, 0, 0xFF]));
    }

    #[test]
    fn test_eui64_rejects_bad_input() {
        assert_eq!(
            "0101".parse::<Eui64>(),
            Err(HexIdError::Length {
                expected: 16,
                actual: 4
            })
        );
        assert!(matches!(
            "zz01010101010101".parse::<Eui64>(),
            Err(HexIdError::InvalidChar(_))
        ));
    }

    #[test]
    fn test_dev_addr_json() {
        let addr = DevAddr([0x01, 0x02, 0x03, 0x0a]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0102030a\"");

        let back: DevAddr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
