use std::fmt;

use anyhow::{Result, bail};
use encoding_rs::WINDOWS_1251;

/// Encodings a save may be stored in, in detection priority order.
///
/// The game writes UTF-8 on modern installs and Windows-1251 on older
/// localized ones; nothing else is attempted, and a file needing a third
/// encoding is rejected outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveEncoding {
    Utf8,
    Windows1251,
}

impl SaveEncoding {
    pub fn label(self) -> &'static str {
        match self {
            SaveEncoding::Utf8 => "utf-8",
            SaveEncoding::Windows1251 => "windows-1251",
        }
    }
}

impl fmt::Display for SaveEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Save text paired with the encoding that produced it.
///
/// The encoding travels with the text so the rewrite step re-encodes under
/// the exact same one; untouched bytes must survive the round trip.
#[derive(Debug, Clone)]
pub struct DecodedSave {
    pub text: String,
    pub encoding: SaveEncoding,
}

/// Decodes raw save bytes, strictly: a candidate is accepted only when every
/// byte decodes, never on a best-effort basis.
pub fn decode(raw: &[u8]) -> Result<DecodedSave> {
    if let Ok(text) = std::str::from_utf8(raw) {
        return Ok(DecodedSave {
            text: text.to_string(),
            encoding: SaveEncoding::Utf8,
        });
    }

    let (text, had_errors) = WINDOWS_1251.decode_without_bom_handling(raw);
    if !had_errors {
        return Ok(DecodedSave {
            text: text.into_owned(),
            encoding: SaveEncoding::Windows1251,
        });
    }

    bail!("not valid UTF-8 or Windows-1251 text");
}

/// Encodes text for writing back under the encoding detected at read time.
/// Refuses to write lossy replacement bytes.
pub fn encode(text: &str, encoding: SaveEncoding) -> Result<Vec<u8>> {
    match encoding {
        SaveEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
        SaveEncoding::Windows1251 => {
            let (bytes, _, had_errors) = WINDOWS_1251.encode(text);
            if had_errors {
                bail!("text contains characters not representable in windows-1251");
            }
            Ok(bytes.into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_decodes_as_utf8() {
        let decoded = decode(b"BEGIN Construction\nEND\n").expect("decodes");
        assert_eq!(decoded.encoding, SaveEncoding::Utf8);
        assert_eq!(decoded.text, "BEGIN Construction\nEND\n");
    }

    #[test]
    fn cyrillic_1251_bytes_fall_through_to_legacy_encoding() {
        // "При" in Windows-1251; 0xCF 0xF0 is not a valid UTF-8 sequence.
        let raw = [0xCF, 0xF0, 0xE8, b'\n'];
        let decoded = decode(&raw).expect("decodes");
        assert_eq!(decoded.encoding, SaveEncoding::Windows1251);
        assert_eq!(decoded.text, "При\n");
    }

    #[test]
    fn utf8_cyrillic_stays_utf8() {
        let raw = "Тюрьма\n".as_bytes();
        let decoded = decode(raw).expect("decodes");
        assert_eq!(decoded.encoding, SaveEncoding::Utf8);
    }

    #[test]
    fn undecodable_bytes_are_rejected() {
        // 0x98 is the one hole in Windows-1251, and 0xFF 0x98 is not UTF-8.
        assert!(decode(&[0xFF, 0x98]).is_err());
    }

    #[test]
    fn legacy_round_trip_is_byte_exact() {
        let raw: Vec<u8> = (0x20u8..=0xFF).filter(|&b| b != 0x98).chain([b'\n']).collect();
        let decoded = decode(&raw).expect("decodes");
        assert_eq!(decoded.encoding, SaveEncoding::Windows1251);
        let encoded = encode(&decoded.text, decoded.encoding).expect("encodes");
        assert_eq!(encoded, raw);
    }

    #[test]
    fn encode_refuses_unmappable_text() {
        assert!(encode("日本語", SaveEncoding::Windows1251).is_err());
    }
}
