use super::Color;
use std::borrow::Cow;

/// A `#`-prefixed hex color literal. Invalid literals keep their raw text and
/// resolve to no color.
pub struct HexColor<'a> {
    raw: Cow<'a, str>,
    value: Option<[u8; 4]>,
}

impl<'a> HexColor<'a> {
    pub fn new(hex: impl Into<Cow<'a, str>>) -> Self {
        let raw = hex.into();
        let bytes = raw.as_bytes();
        let value = if Self::validate(bytes) {
            Some(match bytes.len() {
                4 => [
                    hex_1_to_u8(bytes[1]) * 17,
                    hex_1_to_u8(bytes[2]) * 17,
                    hex_1_to_u8(bytes[3]) * 17,
                    255,
                ],
                5 => [
                    hex_1_to_u8(bytes[1]) * 17,
                    hex_1_to_u8(bytes[2]) * 17,
                    hex_1_to_u8(bytes[3]) * 17,
                    hex_1_to_u8(bytes[4]) * 17,
                ],
                7 => [
                    hex_2_to_u8(bytes[1], bytes[2]),
                    hex_2_to_u8(bytes[3], bytes[4]),
                    hex_2_to_u8(bytes[5], bytes[6]),
                    255,
                ],
                _ => [
                    hex_2_to_u8(bytes[1], bytes[2]),
                    hex_2_to_u8(bytes[3], bytes[4]),
                    hex_2_to_u8(bytes[5], bytes[6]),
                    hex_2_to_u8(bytes[7], bytes[8]),
                ],
            })
        } else {
            None
        };

        HexColor { raw, value }
    }

    fn validate(bytes: &[u8]) -> bool {
        let length = bytes.len();

        if length == 0 || bytes[0] != b'#' {
            return false;
        }

        if length != 4 && length != 5 && length != 7 && length != 9 {
            return false;
        }

        bytes[1..].iter().all(u8::is_ascii_hexdigit)
    }

    pub fn get_raw(&self) -> &str {
        &self.raw
    }

    pub fn color(&self) -> Option<Color> {
        self.value.map(|[r, g, b, a]| Color::rgba(r, g, b, a))
    }
}

fn hex_1_to_u8(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}

fn hex_2_to_u8(c1: u8, c2: u8) -> u8 {
    (hex_1_to_u8(c1) << 4) | hex_1_to_u8(c2)
}
