//! DCPU-16 (1.7) encoding constants and the embedded grammar table.

/// Grammar records loaded by [`crate::grammar::Grammar::dcpu16`].
pub const TABLE: &str = include_str!("dcpu16.tbl");

pub const INDIRECT_LITERAL: u8 = 0x1E; // [next word]
pub const LITERAL: u8 = 0x1F; // next word
pub const SHORT_MINUS_ONE: u8 = 0x20; // inline 0xFFFF
pub const SHORT_BASE: u8 = 0x21; // inline 0..=30
pub const SHORT_MAX: u16 = 30;

#[inline]
pub fn encode_basic(opcode: u8, b: u8, a: u8) -> u16 {
    (opcode as u16 & 0x1F) | ((b as u16 & 0x1F) << 5) | ((a as u16 & 0x3F) << 10)
}

#[inline]
pub fn encode_nonbasic(opcode: u8, a: u8) -> u16 {
    ((opcode as u16 & 0x1F) << 5) | ((a as u16 & 0x3F) << 10)
}

/// Inline operand-A code for `value`, when it fits in the instruction word.
pub fn short_literal(value: u16) -> Option<u8> {
    match value {
        0xFFFF => Some(SHORT_MINUS_ONE),
        v if v <= SHORT_MAX => Some(SHORT_BASE + v as u8),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_fields() {
        assert_eq!(encode_basic(0x01, 0x00, short_literal(5).unwrap()), 0x9801);
        assert_eq!(encode_basic(0x01, 0x00, LITERAL), 0x7C01);
        assert_eq!(encode_nonbasic(0x01, LITERAL), 0x7C20);
    }

    #[test]
    fn short_range_edges() {
        assert_eq!(short_literal(30), Some(0x3F));
        assert_eq!(short_literal(31), None);
        assert_eq!(short_literal(0xFFFF), Some(0x20));
        assert_eq!(short_literal(0xFFFE), None);
    }
}
