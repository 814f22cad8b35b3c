//! Text encodings used for request bodies and credentials.

use bytes::Bytes;

use crate::error::{NetworkError, Result};

/// Character encoding applied when turning text into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextEncoding {
    /// UTF-8 (default). Every string is representable.
    #[default]
    Utf8,
    /// 7-bit ASCII.
    Ascii,
    /// ISO-8859-1. Code points above U+00FF are rejected.
    IsoLatin1,
    /// UTF-16, big-endian, no byte order mark.
    Utf16BigEndian,
    /// UTF-16, little-endian, no byte order mark.
    Utf16LittleEndian,
}

impl TextEncoding {
    /// Encode `text`, returning `None` if it contains characters the encoding
    /// cannot represent.
    pub fn encode(self, text: &str) -> Option<Vec<u8>> {
        match self {
            Self::Utf8 => Some(text.as_bytes().to_vec()),
            Self::Ascii => text.is_ascii().then(|| text.as_bytes().to_vec()),
            Self::IsoLatin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).ok())
                .collect(),
            Self::Utf16BigEndian => Some(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            Self::Utf16LittleEndian => {
                Some(text.encode_utf16().flat_map(u16::to_le_bytes).collect())
            }
        }
    }

    /// Like [`encode`](Self::encode), failing with [`NetworkError::Encoding`].
    pub fn encode_bytes(self, text: &str) -> Result<Bytes> {
        self.encode(text)
            .map(Bytes::from)
            .ok_or(NetworkError::Encoding { encoding: self })
    }

    /// The IANA charset label for this encoding.
    pub fn charset(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Ascii => "us-ascii",
            Self::IsoLatin1 => "iso-8859-1",
            Self::Utf16BigEndian => "utf-16be",
            Self::Utf16LittleEndian => "utf-16le",
        }
    }
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.charset())
    }
}
