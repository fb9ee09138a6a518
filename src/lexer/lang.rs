//! Character classes of the language.

#[inline]
pub fn is_blank(c: u8) -> bool {
    c == b' ' || c == b'\t' || c == b'\r'
}

#[inline]
pub fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

#[inline]
pub fn is_hex_digit(c: u8) -> bool {
    c.is_ascii_hexdigit()
}

#[inline]
pub fn is_letter(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

#[inline]
pub fn is_ident_start(c: u8) -> bool {
    is_letter(c)
}

#[inline]
pub fn is_ident_cont(c: u8) -> bool {
    is_letter(c) || is_digit(c)
}

#[inline]
pub fn is_number_sep(c: u8) -> bool {
    c == b'_'
}

/// Characters allowed in a `swc-option` word.
#[inline]
pub fn is_option(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-'
}

pub const VERIFY_COMMENT_EXPECTED: &str = "expected-";
pub const VERIFY_COMMENT_OPTION: &str = "swc-option";
