//! `<stdlib.h>` emulation
//!
//! The heart of this module is the `strtod`/`strtol` family: a permissive,
//! C-shaped number-from-string parser operating on strings decoded out of
//! guest memory, reporting how many characters it consumed so the end
//! pointer can be written back. Also here: the deterministic splitmix32
//! PRNG behind `rand`/`srand`, integer `abs`, and the multibyte-character
//! family (`mblen`/`mbtowc`/`wctomb`/`mbstowcs`/`wcstombs`) over a fixed
//! UTF-8 locale with a 4-byte `wchar_t`.
//!
//! Parsing never signals errors. A string matching no grammar yields 0 (or
//! NaN for a bare `nan` literal) with nothing consumed, mirroring relaxed
//! `atoi` semantics.

use crate::context::CrtContext;
use crate::error::CrtResult;
use crate::math::{nan_with_payload, nan_with_payload_f32};

/// C `RAND_MAX`
pub const RAND_MAX: i32 = i32::MAX;

const WHITESPACE: &[u8] = b" \t\n\r\x0b";

/// Result of one string-to-number parse: the value plus how many input
/// characters were consumed (drives the `strtod` end pointer)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parsed {
    pub value: f64,
    pub consumed: usize,
}

impl Parsed {
    fn new(value: f64, consumed: usize) -> Self {
        Self { value, consumed }
    }
}

/// Float width selector for `strtod` vs `strtof` NaN payload packing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatWidth {
    Single,
    Double,
}

// =============================================================================
// Pure parsers
// =============================================================================

fn skip_whitespace(s: &[u8], mut i: usize) -> usize {
    while i < s.len() && WHITESPACE.contains(&s[i]) {
        i += 1;
    }
    i
}

fn is_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

fn next_is_num(s: &[u8], i: usize) -> bool {
    if i >= s.len() {
        return false;
    }
    is_digit(s[i]) || (s[i] == b'-' && i + 1 < s.len() && is_digit(s[i + 1]))
}

fn next_is_nan(s: &[u8], i: usize) -> bool {
    let first = match s.get(i) {
        Some(b) => *b,
        None => return false,
    };
    first.eq_ignore_ascii_case(&b'n')
        || (first == b'-' && matches!(s.get(i + 1), Some(b) if b.eq_ignore_ascii_case(&b'n')))
}

fn next_is_inf(s: &[u8], i: usize) -> bool {
    let first = match s.get(i) {
        Some(b) => *b,
        None => return false,
    };
    first.eq_ignore_ascii_case(&b'i')
        || (first == b'-' && matches!(s.get(i + 1), Some(b) if b.eq_ignore_ascii_case(&b'i')))
}

/// `[-]digits[.digits][eE[+-]digits]` with one-shot dot/exponent flags.
/// The caller guarantees the span starts like a number (see [`next_is_num`]).
fn parse_num(s: &[u8], start: usize) -> Parsed {
    let mut i = start;
    if s.get(i) == Some(&b'-') {
        i += 1;
    }
    while i < s.len() && is_digit(s[i]) {
        i += 1;
    }

    // at most one decimal point
    if s.get(i) == Some(&b'.') {
        i += 1;
        while i < s.len() && is_digit(s[i]) {
            i += 1;
        }
    }

    // at most one exponent marker, kept only if digits follow
    if matches!(s.get(i), Some(b'e') | Some(b'E')) {
        let mark = i;
        i += 1;
        if matches!(s.get(i), Some(b'+') | Some(b'-')) {
            i += 1;
        }
        if i < s.len() && is_digit(s[i]) {
            while i < s.len() && is_digit(s[i]) {
                i += 1;
            }
        } else {
            i = mark;
        }
    }

    let span = std::str::from_utf8(&s[start..i]).unwrap_or("");
    Parsed::new(span.parse::<f64>().unwrap_or(0.0), i - start)
}

/// `[-]nan` or `[-]nan(digits)`, case-insensitive. A malformed parenthesized
/// payload backtracks to the start and consumes nothing; a bad `an` tail
/// after the leading `n` consumes only the sign.
fn parse_nan(s: &[u8], start: usize, width: FloatWidth) -> Parsed {
    let mut i = start;
    let negative = s.get(i) == Some(&b'-');
    if negative {
        i += 1;
    }

    let sign_len = i - start;
    i += 1; // the 'n' that got us here
    let valid2 = matches!(s.get(i), Some(b) if b.eq_ignore_ascii_case(&b'a'));
    i += 1;
    let valid3 = matches!(s.get(i), Some(b) if b.eq_ignore_ascii_case(&b'n'));
    i += 1;
    if !valid2 || !valid3 {
        return Parsed::new(0.0, sign_len);
    }

    let bare = |consumed: usize| {
        let v = if negative { -f64::NAN } else { f64::NAN };
        Parsed::new(v, consumed)
    };

    if s.get(i) != Some(&b'(') {
        return bare(i - start);
    }
    i += 1;

    let payload = parse_int_prefix(std::str::from_utf8(&s[i..]).unwrap_or(""));
    while i < s.len() && is_digit(s[i]) {
        i += 1;
    }
    if s.get(i) != Some(&b')') {
        // malformed payload: backtrack the whole literal
        return Parsed::new(0.0, 0);
    }
    i += 1;

    match payload {
        Some(n) if n > 0 && n <= 0xFFFF_FFFF => {
            let v = match width {
                FloatWidth::Double => nan_with_payload(n as u32),
                // widened; the f32 payload survives the later narrowing
                FloatWidth::Single => nan_with_payload_f32(n as u32) as f64,
            };
            Parsed::new(if negative { -v } else { v }, i - start)
        }
        _ => bare(i - start),
    }
}

/// `[-]inf` with 3 to 8 matching characters of "infinity" accepted,
/// case-insensitive. 4–7 matched characters rewind to the bare `inf`.
fn parse_inf(s: &[u8], start: usize) -> Parsed {
    let mut i = start;
    let negative = s.get(i) == Some(&b'-');
    if negative {
        i += 1;
    }

    const FIND: &[u8] = b"infinity";
    let mut j = 0;
    while i < s.len() && j < FIND.len() && s[i].eq_ignore_ascii_case(&FIND[j]) {
        i += 1;
        j += 1;
    }

    let value = if negative {
        f64::NEG_INFINITY
    } else {
        f64::INFINITY
    };
    let sign_len = if negative { 1 } else { 0 };
    match j {
        3..=7 => Parsed::new(value, sign_len + 3),
        8 => Parsed::new(value, sign_len + 8),
        _ => Parsed::new(0.0, 0),
    }
}

/// The `strtod` grammar over a plain string: whitespace, then (in priority
/// order) a numeric literal, a `nan` literal, an `inf` literal, else zero.
pub fn parse_c_float(s: &str, width: FloatWidth) -> Parsed {
    let bytes = s.as_bytes();
    let i = skip_whitespace(bytes, 0);

    let inner = if i >= bytes.len() {
        Parsed::new(0.0, 0)
    } else if next_is_num(bytes, i) {
        parse_num(bytes, i)
    } else if next_is_nan(bytes, i) {
        parse_nan(bytes, i, width)
    } else if next_is_inf(bytes, i) {
        parse_inf(bytes, i)
    } else {
        return Parsed::new(0.0, 0);
    };

    if inner.consumed == 0 {
        return Parsed::new(inner.value, 0);
    }
    Parsed::new(inner.value, i + inner.consumed)
}

/// The `strtol` grammar: whitespace, optional sign, base-aware digits.
///
/// Base 0 auto-detects only a leading `0x`/`0X` (base 16); octal
/// auto-detection is not supported. A hex prefix is consumed at most once
/// so its `x` is never double counted.
pub fn parse_c_int(s: &str, base: u32) -> Parsed {
    let bytes = s.as_bytes();
    let start = skip_whitespace(bytes, 0);
    let mut i = start;

    let negative = match bytes.get(i) {
        Some(b'-') => {
            i += 1;
            true
        }
        Some(b'+') => {
            i += 1;
            false
        }
        _ => false,
    };

    let has_hex_prefix = bytes.get(i) == Some(&b'0')
        && matches!(bytes.get(i + 1), Some(b'x') | Some(b'X'));
    let effective_base = match base {
        0 => {
            if has_hex_prefix {
                16
            } else {
                10
            }
        }
        b => b,
    };
    if effective_base == 16 && has_hex_prefix {
        i += 2;
    }
    let radix = effective_base.clamp(2, 36);

    let digits_start = i;
    let mut value: i64 = 0;
    while i < bytes.len() {
        let digit = match (bytes[i] as char).to_digit(radix) {
            Some(d) => d,
            None => break,
        };
        value = value
            .saturating_mul(radix as i64)
            .saturating_add(digit as i64);
        i += 1;
    }

    if i == digits_start {
        // no digits at all: nothing consumed, not even sign or prefix
        return Parsed::new(0.0, 0);
    }

    let value = if negative { -value } else { value };
    Parsed::new(value as f64, i)
}

/// `parseInt`-style prefix parse of an unsigned decimal (leading whitespace
/// and `+` tolerated), saturating on overflow
pub fn parse_int_prefix(s: &str) -> Option<i64> {
    let bytes = s.as_bytes();
    let mut i = skip_whitespace(bytes, 0);
    let negative = match bytes.get(i) {
        Some(b'-') => {
            i += 1;
            true
        }
        Some(b'+') => {
            i += 1;
            false
        }
        _ => false,
    };

    let start = i;
    let mut value: i64 = 0;
    while i < bytes.len() && is_digit(bytes[i]) {
        value = value
            .saturating_mul(10)
            .saturating_add((bytes[i] - b'0') as i64);
        i += 1;
    }
    if i == start {
        return None;
    }
    Some(if negative { -value } else { value })
}

// =============================================================================
// PRNG
// =============================================================================

/// splitmix32, the deterministic generator behind rand()/srand()
#[derive(Debug, Clone)]
pub struct SplitMix32 {
    state: u32,
}

impl SplitMix32 {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next value in [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x9e37_79b9);
        let mut t = self.state ^ (self.state >> 16);
        t = t.wrapping_mul(0x21f0_aaad);
        t ^= t >> 15;
        t = t.wrapping_mul(0x735a_2d97);
        t ^= t >> 15;
        t as f64 / 4_294_967_296.0
    }
}

// =============================================================================
// Context-coupled operations (pointer arguments)
// =============================================================================

impl CrtContext {
    /// `atof`: best effort, 0.0 on total failure, no error signaling
    pub fn atof(&self, str_ptr: u32) -> CrtResult<f64> {
        let s = self.memory().read_cstr(str_ptr)?;
        Ok(parse_c_float(&s, FloatWidth::Double).value)
    }

    /// `atoi`/`atol`/`atoll`
    pub fn atoi(&self, str_ptr: u32) -> CrtResult<i64> {
        let s = self.memory().read_cstr(str_ptr)?;
        Ok(parse_c_int(&s, 10).value as i64)
    }

    /// `strtod`: parse and write the end pointer (first unconsumed char)
    /// through `end_ptr` when it is non-null
    pub fn strtod(&self, str_ptr: u32, end_ptr: u32) -> CrtResult<f64> {
        let s = self.memory().read_cstr(str_ptr)?;
        let parsed = parse_c_float(&s, FloatWidth::Double);
        if end_ptr != 0 {
            self.memory()
                .write_u32(end_ptr, str_ptr + parsed.consumed as u32)?;
        }
        Ok(parsed.value)
    }

    /// `strtof`: as `strtod`, NaN payloads packed into the f32 layout
    pub fn strtof(&self, str_ptr: u32, end_ptr: u32) -> CrtResult<f32> {
        let s = self.memory().read_cstr(str_ptr)?;
        let parsed = parse_c_float(&s, FloatWidth::Single);
        if end_ptr != 0 {
            self.memory()
                .write_u32(end_ptr, str_ptr + parsed.consumed as u32)?;
        }
        Ok(parsed.value as f32)
    }

    /// `strtol`/`strtoll`/`strtoul`/`strtoull`
    pub fn strtol(&self, str_ptr: u32, end_ptr: u32, base: i32) -> CrtResult<i64> {
        let s = self.memory().read_cstr(str_ptr)?;
        let parsed = parse_c_int(&s, base.max(0) as u32);
        if end_ptr != 0 {
            self.memory()
                .write_u32(end_ptr, str_ptr + parsed.consumed as u32)?;
        }
        Ok(parsed.value as i64)
    }

    /// `rand`: next deterministic pseudo-random int in [0, RAND_MAX]
    pub fn rand(&mut self) -> i32 {
        (self.rng_mut().next_f64() * RAND_MAX as f64) as i32
    }

    /// `srand`: reseed the generator
    pub fn srand(&mut self, seed: u32) {
        self.reseed(seed);
    }

    // =========================================================================
    // Multibyte characters (UTF-8 locale, 4-byte wchar_t)
    // =========================================================================

    /// At most `max` bytes starting at `ptr`, capped at the longest UTF-8
    /// sequence and at the end of memory
    fn mb_window(&self, ptr: u32, max: u32) -> CrtResult<Vec<u8>> {
        let span = max.min(4).min(self.memory().len().saturating_sub(ptr));
        self.memory().read_bytes(ptr, span)
    }

    /// `mblen`: byte length of the first multibyte character, 0 for NUL,
    /// -1 for an invalid or incomplete sequence. A null pointer answers 0
    /// (the encoding is stateless).
    pub fn mblen(&self, mbc_ptr: u32, max: u32) -> CrtResult<i32> {
        if mbc_ptr == 0 {
            return Ok(0);
        }
        let bytes = self.mb_window(mbc_ptr, max)?;
        Ok(match utf8_first(&bytes) {
            Some(('\0', _)) => 0,
            Some((_, len)) => len as i32,
            None => -1,
        })
    }

    /// `mbtowc`: decode the first multibyte character, store its code point
    /// through `wc_ptr` when non-null, return the byte length consumed
    pub fn mbtowc(&self, wc_ptr: u32, mbc_ptr: u32, max: u32) -> CrtResult<i32> {
        if mbc_ptr == 0 {
            return Ok(0);
        }
        let bytes = self.mb_window(mbc_ptr, max)?;
        match utf8_first(&bytes) {
            Some((ch, len)) => {
                if wc_ptr != 0 {
                    self.memory().write_u32(wc_ptr, ch as u32)?;
                }
                Ok(if ch == '\0' { 0 } else { len as i32 })
            }
            None => Ok(-1),
        }
    }

    /// `wctomb`: encode one code point as UTF-8 at `mbc_ptr`, return the
    /// byte length, -1 for a value outside the scalar range
    pub fn wctomb(&self, mbc_ptr: u32, wc: u32) -> CrtResult<i32> {
        if mbc_ptr == 0 {
            return Ok(0);
        }
        let ch = match char::from_u32(wc) {
            Some(ch) => ch,
            None => return Ok(-1),
        };
        let mut buf = [0u8; 4];
        let encoded = ch.encode_utf8(&mut buf);
        self.memory().write_bytes(mbc_ptr, encoded.as_bytes())?;
        Ok(encoded.len() as i32)
    }

    /// `mbstowcs`: decode a NUL-terminated multibyte string into at most
    /// `max` 4-byte wide characters. Returns the count written (without the
    /// terminator), -1 on an invalid sequence. The terminating zero is
    /// stored only when it fits.
    pub fn mbstowcs(&self, dest_ptr: u32, src_ptr: u32, max: u32) -> CrtResult<i32> {
        let mut cursor = src_ptr;
        let mut written = 0u32;
        while written < max {
            let bytes = self.mb_window(cursor, 4)?;
            match utf8_first(&bytes) {
                Some(('\0', _)) => {
                    self.memory().write_u32(dest_ptr + written * 4, 0)?;
                    return Ok(written as i32);
                }
                Some((ch, len)) => {
                    self.memory().write_u32(dest_ptr + written * 4, ch as u32)?;
                    cursor += len as u32;
                    written += 1;
                }
                None => return Ok(-1),
            }
        }
        Ok(written as i32)
    }

    /// `wcstombs`: encode a zero-terminated wide string into at most `max`
    /// bytes of UTF-8. Returns the byte count written (without the
    /// terminator), -1 on a value outside the scalar range; stops before a
    /// character that would overflow the budget.
    pub fn wcstombs(&self, dest_ptr: u32, src_ptr: u32, max: u32) -> CrtResult<i32> {
        let mut written = 0u32;
        let mut index = 0u32;
        loop {
            let wc = self.memory().read_u32(src_ptr + index * 4)?;
            if wc == 0 {
                if written < max {
                    self.memory().write_u8(dest_ptr + written, 0)?;
                }
                return Ok(written as i32);
            }
            let ch = match char::from_u32(wc) {
                Some(ch) => ch,
                None => return Ok(-1),
            };
            let mut buf = [0u8; 4];
            let encoded = ch.encode_utf8(&mut buf);
            if written + encoded.len() as u32 > max {
                return Ok(written as i32);
            }
            self.memory().write_bytes(dest_ptr + written, encoded.as_bytes())?;
            written += encoded.len() as u32;
            index += 1;
        }
    }
}

/// Leading UTF-8 scalar of `bytes` with its encoded length; `None` when the
/// bytes do not start a complete valid sequence
fn utf8_first(bytes: &[u8]) -> Option<(char, usize)> {
    let lead = *bytes.first()?;
    let len = match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return None,
    };
    let seq = std::str::from_utf8(bytes.get(..len)?).ok()?;
    seq.chars().next().map(|ch| (ch, len))
}

/// `abs`/`labs`/`llabs`
pub fn abs(x: i64) -> i64 {
    x.wrapping_abs()
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    fn parse(s: &str) -> Parsed {
        parse_c_float(s, FloatWidth::Double)
    }

    #[test]
    fn test_parse_plain_numbers() {
        assert_eq!(parse("42"), Parsed::new(42.0, 2));
        assert_eq!(parse("-3.5"), Parsed::new(-3.5, 4));
        assert_eq!(parse("  -3.5e2xyz"), Parsed::new(-350.0, 8));
        assert_eq!(parse("1e-3"), Parsed::new(0.001, 4));
    }

    #[test]
    fn test_parse_one_shot_flags() {
        // second dot terminates the literal
        assert_eq!(parse("1.2.3"), Parsed::new(1.2, 3));
        // second exponent marker terminates it
        assert_eq!(parse("1e2e3"), Parsed::new(100.0, 3));
        // exponent without digits is not consumed
        assert_eq!(parse("5e+"), Parsed::new(5.0, 1));
    }

    #[test]
    fn test_parse_inf_literals() {
        assert_eq!(parse("inf"), Parsed::new(f64::INFINITY, 3));
        assert_eq!(parse("INFINITY"), Parsed::new(f64::INFINITY, 8));
        assert_eq!(parse("-Inf"), Parsed::new(f64::NEG_INFINITY, 4));
        // partial tail rewinds to the bare "inf"
        assert_eq!(parse("infinite"), Parsed::new(f64::INFINITY, 3));
        // fewer than 3 matching chars is no match
        assert_eq!(parse("in"), Parsed::new(0.0, 0));
    }

    #[test]
    fn test_parse_nan_literals() {
        let p = parse("nan");
        assert!(p.value.is_nan());
        assert_eq!(p.consumed, 3);

        let p = parse("-NaN");
        assert!(p.value.is_nan());
        assert!(p.value.is_sign_negative());
        assert_eq!(p.consumed, 4);

        // 'n' not followed by "an": nothing but the sign consumed
        let p = parse("nope");
        assert_eq!(p, Parsed::new(0.0, 0));
    }

    #[test]
    fn test_parse_nan_payload() {
        let p = parse("nan(5)");
        assert_eq!(p.consumed, 6);
        assert_eq!(p.value.to_bits(), 0x7FF8_0000_0000_0005);

        let p = parse("nan(0)");
        assert_eq!(p.consumed, 6);
        assert!(p.value.is_nan());
        assert_eq!(p.value.to_bits() as u32, 0, "oversized/zero payload is bare NaN");

        // unterminated payload backtracks completely
        let p = parse("nan(5");
        assert_eq!(p, Parsed::new(0.0, 0));
    }

    #[test]
    fn test_parse_nan_payload_f32() {
        let p = parse_c_float("nan(5)", FloatWidth::Single);
        let narrowed = p.value as f32;
        assert_eq!(narrowed.to_bits(), 0x7FC0_0005);
    }

    #[test]
    fn test_parse_c_int_bases() {
        assert_eq!(parse_c_int("42", 10), Parsed::new(42.0, 2));
        assert_eq!(parse_c_int("  -17", 10), Parsed::new(-17.0, 5));
        assert_eq!(parse_c_int("0x1A", 16), Parsed::new(26.0, 4));
        assert_eq!(parse_c_int("1A", 16), Parsed::new(26.0, 2));
        assert_eq!(parse_c_int("777", 8), Parsed::new(511.0, 3));
        assert_eq!(parse_c_int("z", 10), Parsed::new(0.0, 0));
    }

    #[test]
    fn test_parse_c_int_base_zero_autodetect() {
        assert_eq!(parse_c_int("0x10", 0), Parsed::new(16.0, 4));
        assert_eq!(parse_c_int("10", 0), Parsed::new(10.0, 2));
        // octal auto-detection deliberately absent: "010" is decimal 10
        assert_eq!(parse_c_int("010", 0), Parsed::new(10.0, 3));
    }

    #[test]
    fn test_hex_prefix_not_double_counted() {
        // x consumed exactly once as part of the prefix
        assert_eq!(parse_c_int("0x0x5", 16), Parsed::new(0.0, 3));
    }

    #[test]
    fn test_parse_int_prefix() {
        assert_eq!(parse_int_prefix("5"), Some(5));
        assert_eq!(parse_int_prefix("5abc"), Some(5));
        assert_eq!(parse_int_prefix(" +12"), Some(12));
        assert_eq!(parse_int_prefix("-3"), Some(-3));
        assert_eq!(parse_int_prefix("abc"), None);
        assert_eq!(parse_int_prefix(""), None);
    }

    #[test]
    fn test_strtod_end_pointer() {
        let ctx = crate::context::CrtContext::for_tests();
        let str_ptr = 64u32;
        let end_ptr = 256u32;
        ctx.memory().write_cstr(str_ptr, "  -3.5e2xyz").unwrap();

        let v = ctx.strtod(str_ptr, end_ptr).unwrap();
        assert_eq!(v, -350.0);
        // end pointer lands on the 'x'
        assert_eq!(ctx.memory().read_u32(end_ptr).unwrap(), str_ptr + 8);

        // null end pointer is simply not written
        assert_eq!(ctx.strtod(str_ptr, 0).unwrap(), -350.0);
    }

    #[test]
    fn test_strtod_nan_payload_consumes_literal() {
        let ctx = crate::context::CrtContext::for_tests();
        ctx.memory().write_cstr(64, "nan(5)").unwrap();
        let v = ctx.strtod(64, 256).unwrap();
        assert_eq!(v.to_bits(), 0x7FF8_0000_0000_0005);
        assert_eq!(ctx.memory().read_u32(256).unwrap(), 64 + 6);
    }

    #[test]
    fn test_atoi_permissive() {
        let ctx = crate::context::CrtContext::for_tests();
        ctx.memory().write_cstr(64, "12abc").unwrap();
        assert_eq!(ctx.atoi(64).unwrap(), 12);
        ctx.memory().write_cstr(64, "garbage").unwrap();
        assert_eq!(ctx.atoi(64).unwrap(), 0);
    }

    #[test]
    fn test_mblen_first_character() {
        let ctx = crate::context::CrtContext::for_tests();
        ctx.memory().write_cstr(64, "aé日").unwrap();
        assert_eq!(ctx.mblen(64, 4).unwrap(), 1); // 'a'
        assert_eq!(ctx.mblen(65, 4).unwrap(), 2); // 'é'
        assert_eq!(ctx.mblen(67, 4).unwrap(), 3); // '日'
        // NUL terminator, null pointer, truncated sequence
        assert_eq!(ctx.mblen(70, 4).unwrap(), 0);
        assert_eq!(ctx.mblen(0, 4).unwrap(), 0);
        assert_eq!(ctx.mblen(67, 2).unwrap(), -1);
        // a bare continuation byte is not a character start
        assert_eq!(ctx.mblen(68, 4).unwrap(), -1);
    }

    #[test]
    fn test_mbtowc_stores_code_point() {
        let ctx = crate::context::CrtContext::for_tests();
        ctx.memory().write_cstr(64, "日x").unwrap();
        let wc_ptr = 256u32;
        assert_eq!(ctx.mbtowc(wc_ptr, 64, 4).unwrap(), 3);
        assert_eq!(ctx.memory().read_u32(wc_ptr).unwrap(), '日' as u32);
        // null destination still reports the length
        assert_eq!(ctx.mbtowc(0, 64, 4).unwrap(), 3);
        // null source answers 0: the encoding carries no shift state
        assert_eq!(ctx.mbtowc(wc_ptr, 0, 4).unwrap(), 0);
    }

    #[test]
    fn test_wctomb_encodes_utf8() {
        let ctx = crate::context::CrtContext::for_tests();
        assert_eq!(ctx.wctomb(64, 'A' as u32).unwrap(), 1);
        assert_eq!(ctx.wctomb(64, '日' as u32).unwrap(), 3);
        assert_eq!(ctx.memory().read_bytes(64, 3).unwrap(), "日".as_bytes());
        // surrogate range is not a scalar value
        assert_eq!(ctx.wctomb(64, 0xD800).unwrap(), -1);
        assert_eq!(ctx.wctomb(0, 'A' as u32).unwrap(), 0);
    }

    #[test]
    fn test_mbstowcs_wcstombs_round_trip() {
        let ctx = crate::context::CrtContext::for_tests();
        ctx.memory().write_cstr(64, "héllo").unwrap();

        let wide = 256u32;
        assert_eq!(ctx.mbstowcs(wide, 64, 16).unwrap(), 5);
        assert_eq!(ctx.memory().read_u32(wide).unwrap(), 'h' as u32);
        assert_eq!(ctx.memory().read_u32(wide + 4).unwrap(), 'é' as u32);
        assert_eq!(ctx.memory().read_u32(wide + 5 * 4).unwrap(), 0);

        let narrow = 512u32;
        assert_eq!(ctx.wcstombs(narrow, wide, 16).unwrap(), 6);
        assert_eq!(ctx.memory().read_cstr(narrow).unwrap(), "héllo");
    }

    #[test]
    fn test_mbstowcs_caps_at_max() {
        let ctx = crate::context::CrtContext::for_tests();
        ctx.memory().write_cstr(64, "abc").unwrap();
        // budget exhausted before the NUL: no terminator stored
        assert_eq!(ctx.mbstowcs(256, 64, 2).unwrap(), 2);
        assert_eq!(ctx.memory().read_u32(256 + 4).unwrap(), 'b' as u32);
    }

    #[test]
    fn test_wcstombs_stops_before_overflow() {
        let ctx = crate::context::CrtContext::for_tests();
        // "日a" as wide chars
        ctx.memory().write_u32(256, '日' as u32).unwrap();
        ctx.memory().write_u32(260, 'a' as u32).unwrap();
        ctx.memory().write_u32(264, 0).unwrap();
        // two bytes cannot hold the three-byte first character
        assert_eq!(ctx.wcstombs(512, 256, 2).unwrap(), 0);
        assert_eq!(ctx.wcstombs(512, 256, 8).unwrap(), 4);
    }

    #[test]
    fn test_splitmix_deterministic() {
        let mut a = SplitMix32::new(1);
        let mut b = SplitMix32::new(1);
        for _ in 0..16 {
            let x = a.next_f64();
            assert_eq!(x, b.next_f64());
            assert!((0.0..1.0).contains(&x));
        }
        // different seed, different stream
        let mut c = SplitMix32::new(2);
        assert_ne!(SplitMix32::new(1).next_f64(), c.next_f64());
    }

    #[test]
    fn test_rand_reseed() {
        let mut ctx = crate::context::CrtContext::for_tests();
        let first = ctx.rand();
        ctx.srand(1);
        assert_eq!(ctx.rand(), first, "srand(1) restores the default stream");
        assert!(first >= 0);
    }

    #[test]
    fn test_abs() {
        assert_eq!(abs(-5), 5);
        assert_eq!(abs(5), 5);
        assert_eq!(abs(0), 0);
    }
}
