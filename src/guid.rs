//! Capability identifiers - 128-bit type tags
//!
//! Layout mirrors the classic `{Data1, Data2, Data3, Data4}` GUID so that
//! identifiers written as `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` round-trip
//! byte for byte. Literals are parsed at compile time through [`Guid::parse`].

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 16-byte capability identifier (4 + 2 + 2 + 8 byte fields)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(C)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    /// The all-zero identifier
    pub const NULL: Guid = Guid::from_fields(0, 0, 0, [0; 8]);

    #[inline]
    pub const fn from_fields(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self { data1, data2, data3, data4 }
    }

    /// Build from the big-endian integer spelled by the textual form
    #[inline]
    pub const fn from_u128(value: u128) -> Self {
        Self {
            data1: (value >> 96) as u32,
            data2: (value >> 80) as u16,
            data3: (value >> 64) as u16,
            data4: (value as u64).to_be_bytes(),
        }
    }

    #[inline]
    pub const fn to_u128(self) -> u128 {
        ((self.data1 as u128) << 96)
            | ((self.data2 as u128) << 80)
            | ((self.data3 as u128) << 64)
            | (u64::from_be_bytes(self.data4) as u128)
    }

    /// Parse a literal at compile time.
    ///
    /// # Panics
    /// Panics (a compile error in const context) on malformed input.
    pub const fn parse(text: &str) -> Self {
        match decode(text) {
            Ok(value) => Self::from_u128(value),
            Err(_) => panic!("malformed GUID literal"),
        }
    }

    /// Parse at runtime, reporting where the text is malformed
    pub fn try_parse(text: &str) -> Result<Self, GuidParseError> {
        decode(text).map(Self::from_u128)
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        self.to_u128() == 0
    }
}

/// Declare a [`Guid`] from its textual form, usable in `const` items
#[macro_export]
macro_rules! guid {
    ($text:expr) => {
        $crate::guid::Guid::parse($text)
    };
}

/// Reason a textual GUID was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuidParseError {
    InvalidLength(usize),
    MissingSeparator(usize),
    InvalidCharacter { index: usize, found: char },
}

impl fmt::Display for GuidParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength(len) => {
                write!(f, "expected 36 characters, found {}", len)
            }
            Self::MissingSeparator(index) => {
                write!(f, "expected '-' at position {}", index)
            }
            Self::InvalidCharacter { index, found } => {
                write!(f, "invalid hex digit {:?} at position {}", found, index)
            }
        }
    }
}

impl std::error::Error for GuidParseError {}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

const fn decode(text: &str) -> Result<u128, GuidParseError> {
    let bytes = text.as_bytes();

    // Optional surrounding braces
    let (start, end) = if bytes.len() == 38 && bytes[0] == b'{' && bytes[37] == b'}' {
        (1, 37)
    } else {
        (0, bytes.len())
    };

    if end - start != 36 {
        return Err(GuidParseError::InvalidLength(end - start));
    }

    let mut value: u128 = 0;
    let mut i = start;
    while i < end {
        let index = i - start;
        let byte = bytes[i];
        if index == 8 || index == 13 || index == 18 || index == 23 {
            if byte != b'-' {
                return Err(GuidParseError::MissingSeparator(index));
            }
        } else {
            match hex_value(byte) {
                Some(digit) => value = (value << 4) | digit as u128,
                None => {
                    return Err(GuidParseError::InvalidCharacter { index, found: byte as char })
                }
            }
        }
        i += 1;
    }

    Ok(value)
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

impl FromStr for Guid {
    type Err = GuidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_parse(s)
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Guid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Guid::try_parse(&text).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOB: Guid = guid!("f578ff0d-abd2-4514-9d32-7cb454d4a73b");

    #[test]
    fn const_literal_splits_fields() {
        assert_eq!(BLOB.data1, 0xf578ff0d);
        assert_eq!(BLOB.data2, 0xabd2);
        assert_eq!(BLOB.data3, 0x4514);
        assert_eq!(BLOB.data4, [0x9d, 0x32, 0x7c, 0xb4, 0x54, 0xd4, 0xa7, 0x3b]);
    }

    #[test]
    fn display_is_uppercase_canonical() {
        assert_eq!(BLOB.to_string(), "F578FF0D-ABD2-4514-9D32-7CB454D4A73B");
        let reparsed: Guid = BLOB.to_string().parse().expect("display output parses");
        assert_eq!(reparsed, BLOB);
    }

    #[test]
    fn braces_are_accepted() {
        let braced = Guid::try_parse("{F578FF0D-ABD2-4514-9D32-7CB454D4A73B}").expect("braced");
        assert_eq!(braced, BLOB);
    }

    #[test]
    fn malformed_text_reports_position() {
        assert_eq!(Guid::try_parse("1234"), Err(GuidParseError::InvalidLength(4)));
        assert_eq!(
            Guid::try_parse("f578ff0d_abd2-4514-9d32-7cb454d4a73b"),
            Err(GuidParseError::MissingSeparator(8))
        );
        assert_eq!(
            Guid::try_parse("f578ff0d-abd2-4514-9d32-7cb454d4a7zb"),
            Err(GuidParseError::InvalidCharacter { index: 34, found: 'z' })
        );
    }

    #[test]
    fn null_guid_is_all_zero() {
        assert!(Guid::NULL.is_null());
        assert!(guid!("00000000-0000-0000-0000-000000000000").is_null());
        assert!(!BLOB.is_null());
        assert_eq!(Guid::from_u128(BLOB.to_u128()), BLOB);
    }

    #[test]
    fn serde_uses_textual_form() {
        #[derive(Serialize, Deserialize)]
        struct Holder {
            id: Guid,
        }

        let text = toml::to_string(&Holder { id: BLOB }).expect("serialize");
        assert!(text.contains("F578FF0D-ABD2-4514-9D32-7CB454D4A73B"));
        let back: Holder = toml::from_str(&text).expect("deserialize");
        assert_eq!(back.id, BLOB);
    }
}
