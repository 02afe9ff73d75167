//! Embedded 8x8 glyph masks for the handful of characters a badge can carry.
//! One bit per pixel, most significant bit leftmost.

const GLYPH_A: [u8; 8] = [
    0b0011_1100,
    0b0110_0110,
    0b0110_0110,
    0b0111_1110,
    0b0110_0110,
    0b0110_0110,
    0b0110_0110,
    0b0000_0000,
];

const GLYPH_C: [u8; 8] = [
    0b0011_1100,
    0b0110_0110,
    0b0110_0000,
    0b0110_0000,
    0b0110_0000,
    0b0110_0110,
    0b0011_1100,
    0b0000_0000,
];

const GLYPH_E: [u8; 8] = [
    0b0111_1110,
    0b0110_0000,
    0b0110_0000,
    0b0111_1100,
    0b0110_0000,
    0b0110_0000,
    0b0111_1110,
    0b0000_0000,
];

// Approximation of the ideograph "zhong": a box with a vertical stroke
// through its middle.
const GLYPH_ZHONG: [u8; 8] = [
    0b0001_1000,
    0b0001_1000,
    0b0111_1110,
    0b0101_1010,
    0b0111_1110,
    0b0001_1000,
    0b0001_1000,
    0b0001_1000,
];

pub fn glyph_mask(glyph: char) -> Option<&'static [u8; 8]> {
    match glyph {
        'A' => Some(&GLYPH_A),
        'C' => Some(&GLYPH_C),
        'E' => Some(&GLYPH_E),
        '中' => Some(&GLYPH_ZHONG),
        _ => None,
    }
}
