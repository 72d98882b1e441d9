//! `printf`-family format-string interpreter
//!
//! One left-to-right pass over the format string. Literal characters copy
//! through; a `%` opens a specifier, whose flag/width/precision/length
//! characters accumulate into a fresh [`SpecFlags`] value, and whose
//! conversion character consumes bytes from the packed variadic region via
//! a [`VarArgs`] cursor: 4 bytes for 32-bit integer/char/pointer
//! specifiers, 8 bytes (after aligning the cursor up to an 8-byte boundary)
//! for `l`-modified integers and all floats.
//!
//! Guest binaries embed literal C format strings, so the flag precedence
//! here is a wire contract: `+` beats the space flag, an explicit precision
//! or left-justification downgrades zero-padding to spaces, `#` applies its
//! `0`/`0x` prefix before width padding.
//!
//! Unknown conversions (`a A n p`) and the `j z t L` length modifiers pass
//! `%` plus the offending character through literally instead of erroring:
//! a partially unsupported format string must not kill the frame loop.

use crate::context::CrtContext;
use crate::error::CrtResult;
use crate::memory::GuestMemory;

/// Default precision for all floating conversions
const DEFAULT_FLOAT_PRECISION: usize = 6;

/// Per-specifier parse state, constructed fresh at each `%`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecFlags {
    /// Operand width: 32 or 64; each `l` toggles it
    pub bit_size: u8,
    pub pad_width: usize,
    pub precision: usize,
    /// A `.` was seen, so `precision` is explicit
    pub precise: bool,
    pub pad_with_zero: bool,
    pub pad_with_space: bool,
    pub justify_right: bool,
    /// `+`: decorate positive numbers with a plus sign
    pub plus_sign: bool,
    /// space flag: decorate positive numbers with a space (loses to `+`)
    pub space_sign: bool,
    /// `#`: `0` prefix for octal, `0x` for hex
    pub alternate_form: bool,
}

impl Default for SpecFlags {
    fn default() -> Self {
        Self {
            bit_size: 32,
            pad_width: 0,
            precision: 0,
            precise: false,
            pad_with_zero: false,
            pad_with_space: false,
            justify_right: true,
            plus_sign: false,
            space_sign: false,
            alternate_form: false,
        }
    }
}

impl SpecFlags {
    /// Width padding character under the precedence rules: explicit
    /// precision or left-justification suppresses zero-padding
    fn width_pad_char(&self) -> char {
        if self.pad_with_zero && !self.precise && self.justify_right {
            '0'
        } else {
            ' '
        }
    }

    /// Pad `s` to the field width
    fn pad(&self, s: &str) -> String {
        if s.len() >= self.pad_width {
            return s.to_string();
        }
        let fill: String = std::iter::repeat(self.width_pad_char())
            .take(self.pad_width - s.len())
            .collect();
        if self.justify_right {
            format!("{}{}", fill, s)
        } else {
            format!("{}{}", s, fill)
        }
    }

    /// Sign decoration for a positive numeric value; `+` beats space
    fn sign_prefix(&self, positive: bool) -> &'static str {
        if positive && self.plus_sign {
            "+"
        } else if positive && self.space_sign {
            " "
        } else {
            ""
        }
    }
}

/// Cursor over the guest's packed variadic byte region
///
/// Positions are absolute memory offsets; alignment is computed relative to
/// the start of the region, matching the guest compiler's varargs layout.
pub struct VarArgs<'a> {
    mem: &'a GuestMemory,
    base: u32,
    pos: u32,
}

impl<'a> VarArgs<'a> {
    pub fn new(mem: &'a GuestMemory, base: u32) -> Self {
        Self {
            mem,
            base,
            pos: base,
        }
    }

    fn align8(&mut self) {
        let rel = self.pos - self.base;
        self.pos = self.base + ((rel + 7) & !7);
    }

    pub fn next_u32(&mut self) -> CrtResult<u32> {
        let v = self.mem.read_u32(self.pos)?;
        self.pos += 4;
        Ok(v)
    }

    pub fn next_i32(&mut self) -> CrtResult<i32> {
        let v = self.mem.read_i32(self.pos)?;
        self.pos += 4;
        Ok(v)
    }

    pub fn next_u64(&mut self) -> CrtResult<u64> {
        self.align8();
        let v = self.mem.read_u64(self.pos)?;
        self.pos += 8;
        Ok(v)
    }

    pub fn next_i64(&mut self) -> CrtResult<i64> {
        self.align8();
        let v = self.mem.read_i64(self.pos)?;
        self.pos += 8;
        Ok(v)
    }

    pub fn next_f64(&mut self) -> CrtResult<f64> {
        self.align8();
        let v = self.mem.read_f64(self.pos)?;
        self.pos += 8;
        Ok(v)
    }
}

/// Interpret `fmt` against the variadic region behind `args`
pub fn format_with(mem: &GuestMemory, fmt: &str, mut args: VarArgs) -> CrtResult<String> {
    let chars: Vec<char> = fmt.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '%' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        let mut flags = SpecFlags::default();
        let mut j = i + 1;
        loop {
            let c = match chars.get(j) {
                Some(c) => *c,
                None => {
                    // dangling '%' at end of string: dropped
                    j += 1;
                    break;
                }
            };
            match c {
                '%' => {
                    out.push('%');
                    j += 1;
                    break;
                }
                '+' => {
                    flags.plus_sign = true;
                    j += 1;
                }
                '-' => {
                    flags.justify_right = false;
                    j += 1;
                }
                ' ' => {
                    flags.space_sign = !flags.plus_sign;
                    j += 1;
                }
                '.' => {
                    flags.precise = true;
                    j += 1;
                }
                '#' => {
                    flags.alternate_form = true;
                    j += 1;
                }
                '0'..='9' => {
                    let (num, next) = scan_number(&chars, j);
                    if flags.precise {
                        flags.precision = num;
                    } else {
                        if c == '0' {
                            flags.pad_with_zero = true;
                        } else {
                            flags.pad_with_space = true;
                        }
                        flags.pad_width = num;
                    }
                    j = next;
                }
                'l' => {
                    flags.bit_size = if flags.bit_size == 32 { 64 } else { 32 };
                    j += 1;
                }
                // narrow ints arrive widened to 32 bits at the ABI; nothing
                // to do for h/hh
                'h' => {
                    j += 1;
                }
                'c' => {
                    let code = args.next_u32()?;
                    let s = char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER);
                    out.push_str(&flags.pad(&s.to_string()));
                    j += 1;
                    break;
                }
                's' => {
                    let ptr = args.next_u32()?;
                    let mut s = mem.read_cstr(ptr)?;
                    if flags.precise {
                        // by character, not byte: guest strings may be
                        // multibyte and a byte cut lands mid-sequence
                        s = s.chars().take(flags.precision).collect();
                    }
                    out.push_str(&flags.pad(&s));
                    j += 1;
                    break;
                }
                'o' | 'x' | 'X' | 'u' => {
                    let value = if flags.bit_size == 32 {
                        args.next_u32()? as u64
                    } else {
                        args.next_u64()?
                    };
                    let radix = if c == 'o' { 8 } else if c == 'u' { 10 } else { 16 };
                    out.push_str(&format_unsigned(value, radix, c == 'X', &flags));
                    j += 1;
                    break;
                }
                'd' | 'i' => {
                    let value = if flags.bit_size == 32 {
                        args.next_i32()? as i64
                    } else {
                        args.next_i64()?
                    };
                    out.push_str(&format_signed(value, &flags));
                    j += 1;
                    break;
                }
                'e' | 'E' => {
                    let value = args.next_f64()?;
                    out.push_str(&format_float(value, Notation::Exponential, c == 'E', &flags));
                    j += 1;
                    break;
                }
                'f' | 'F' | 'g' | 'G' => {
                    let value = args.next_f64()?;
                    let caps = c.is_ascii_uppercase();
                    out.push_str(&format_float(value, Notation::Fixed, caps, &flags));
                    j += 1;
                    break;
                }
                // a A n p, the j z t L modifiers, '*' width: pass through
                other => {
                    out.push('%');
                    out.push(other);
                    j += 1;
                    break;
                }
            }
        }
        i = j;
    }

    Ok(out)
}

fn scan_number(chars: &[char], start: usize) -> (usize, usize) {
    let mut end = start;
    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }
    let num: usize = chars[start..end]
        .iter()
        .collect::<String>()
        .parse()
        .unwrap_or(0);
    (num, end)
}

fn to_radix_string(mut value: u64, radix: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let digits = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut buf = Vec::new();
    while value > 0 {
        buf.push(char::from(digits[(value % radix) as usize]));
        value /= radix;
    }
    buf.iter().rev().collect()
}

fn format_unsigned(value: u64, radix: u64, capitalize: bool, flags: &SpecFlags) -> String {
    let mut digits = to_radix_string(value, radix);
    if flags.precise && digits.len() < flags.precision {
        digits = format!("{:0>width$}", digits, width = flags.precision);
    }

    let prefix = if flags.alternate_form && radix == 8 {
        "0"
    } else if flags.alternate_form && radix == 16 {
        "0x"
    } else {
        ""
    };

    let mut token = flags.pad(&format!("{}{}", prefix, digits));
    if capitalize {
        token = token.to_uppercase();
    }
    token
}

fn format_signed(value: i64, flags: &SpecFlags) -> String {
    let mut digits = value.to_string();
    if flags.precise && digits.len() < flags.precision {
        digits = format!("{:0>width$}", digits, width = flags.precision);
    }
    let sign = flags.sign_prefix(value > 0);
    flags.pad(&format!("{}{}", sign, digits))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Notation {
    Fixed,
    Exponential,
}

fn format_float(value: f64, notation: Notation, capitalize: bool, flags: &SpecFlags) -> String {
    let precision = if flags.precise {
        flags.precision
    } else {
        DEFAULT_FLOAT_PRECISION
    };

    let digits = if !value.is_finite() {
        if value.is_nan() {
            "nan".to_string()
        } else if value > 0.0 {
            "inf".to_string()
        } else {
            "-inf".to_string()
        }
    } else {
        match notation {
            Notation::Fixed => format!("{:.*}", precision, value),
            Notation::Exponential => exponential_string(value, precision),
        }
    };

    let sign = flags.sign_prefix(value > 0.0);
    let mut token = flags.pad(&format!("{}{}", sign, digits));
    if capitalize {
        token = token.to_uppercase();
    }
    token
}

/// C-style exponential notation: `d.dddddde±XX`, exponent sign always
/// present, at least two exponent digits
fn exponential_string(value: f64, precision: usize) -> String {
    let raw = format!("{:.*e}", precision, value);
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => raw,
    }
}

impl CrtContext {
    /// Interpret a guest format string against its packed variadic region
    pub fn format_args(&self, fmt_ptr: u32, args_ptr: u32) -> CrtResult<String> {
        let fmt = self.memory().read_cstr(fmt_ptr)?;
        format_with(self.memory(), &fmt, VarArgs::new(self.memory(), args_ptr))
    }

    /// `printf`: format, capture, return the character count
    pub fn printf(&mut self, fmt_ptr: u32, args_ptr: u32) -> CrtResult<i32> {
        let s = self.format_args(fmt_ptr, args_ptr)?;
        let len = s.len() as i32;
        self.write_stdout(&s);
        Ok(len)
    }

    /// `puts`-style bare string output
    pub fn print_string(&mut self, str_ptr: u32) -> CrtResult<i32> {
        let s = self.memory().read_cstr(str_ptr)?;
        let len = s.len() as i32;
        self.write_stdout(&s);
        Ok(len)
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::context::CrtContext;

    const ARGS: u32 = 1024;

    /// Write a packed varargs region and run one format pass
    fn fmt(ctx: &CrtContext, fmt_str: &str, args: &[u8]) -> String {
        ctx.memory().write_bytes(ARGS, args).unwrap();
        format_with(
            ctx.memory(),
            fmt_str,
            VarArgs::new(ctx.memory(), ARGS),
        )
        .unwrap()
    }

    fn le32(v: i32) -> [u8; 4] {
        v.to_le_bytes()
    }

    fn le64f(v: f64) -> [u8; 8] {
        v.to_le_bytes()
    }

    #[test]
    fn test_literal_passthrough() {
        let ctx = CrtContext::for_tests();
        assert_eq!(fmt(&ctx, "hello world", &[]), "hello world");
        assert_eq!(fmt(&ctx, "100%%", &[]), "100%");
    }

    #[test]
    fn test_width_justification() {
        let ctx = CrtContext::for_tests();
        assert_eq!(fmt(&ctx, "%5d", &le32(42)), "   42");
        assert_eq!(fmt(&ctx, "%-5d", &le32(42)), "42   ");
        assert_eq!(fmt(&ctx, "%05d", &le32(42)), "00042");
    }

    #[test]
    fn test_precision_suppresses_zero_pad() {
        let ctx = CrtContext::for_tests();
        // zero flag present, but explicit precision downgrades it to spaces
        assert_eq!(fmt(&ctx, "%05.2f", &le64f(3.14159)), " 3.14");
        assert_eq!(fmt(&ctx, "%09.2f", &le64f(3.14159)), "     3.14");
        // no precision: zero padding applies at the default six digits
        assert_eq!(fmt(&ctx, "%010f", &le64f(3.14159)), "003.141590");
    }

    #[test]
    fn test_left_justify_suppresses_zero_pad() {
        let ctx = CrtContext::for_tests();
        assert_eq!(fmt(&ctx, "%-05d", &le32(7)), "7    ");
    }

    #[test]
    fn test_sign_flags() {
        let ctx = CrtContext::for_tests();
        assert_eq!(fmt(&ctx, "%+d", &le32(42)), "+42");
        assert_eq!(fmt(&ctx, "% d", &le32(42)), " 42");
        // plus beats space
        assert_eq!(fmt(&ctx, "%+ d", &le32(42)), "+42");
        assert_eq!(fmt(&ctx, "% +d", &le32(42)), "+42");
        // negatives carry their own sign
        assert_eq!(fmt(&ctx, "%+d", &le32(-42)), "-42");
    }

    #[test]
    fn test_radix_conversions() {
        let ctx = CrtContext::for_tests();
        assert_eq!(fmt(&ctx, "%o", &le32(8)), "10");
        assert_eq!(fmt(&ctx, "%x", &le32(255)), "ff");
        assert_eq!(fmt(&ctx, "%X", &le32(255)), "FF");
        assert_eq!(fmt(&ctx, "%u", &le32(-1)), "4294967295");
    }

    #[test]
    fn test_alternate_form() {
        let ctx = CrtContext::for_tests();
        assert_eq!(fmt(&ctx, "%#o", &le32(8)), "010");
        assert_eq!(fmt(&ctx, "%#x", &le32(255)), "0xff");
        // capitalization covers the prefix too
        assert_eq!(fmt(&ctx, "%#X", &le32(255)), "0XFF");
        // prefix applied before width padding
        assert_eq!(fmt(&ctx, "%#6x", &le32(255)), "  0xff");
    }

    #[test]
    fn test_integer_precision() {
        let ctx = CrtContext::for_tests();
        assert_eq!(fmt(&ctx, "%.5d", &le32(42)), "00042");
        assert_eq!(fmt(&ctx, "%8.5d", &le32(42)), "   00042");
    }

    #[test]
    fn test_long_modifier_toggles_width() {
        let ctx = CrtContext::for_tests();
        let mut args = Vec::new();
        args.extend_from_slice(&(-5_000_000_000i64).to_le_bytes());
        assert_eq!(fmt(&ctx, "%ld", &args), "-5000000000");
        // "ll" toggles back to 32 bits, matching the observed runtime
        let args32 = le32(7);
        assert_eq!(fmt(&ctx, "%lld", &args32), "7");
    }

    #[test]
    fn test_char_and_string() {
        let ctx = CrtContext::for_tests();
        assert_eq!(fmt(&ctx, "%c", &le32('A' as i32)), "A");

        let s_ptr = 4096u32;
        ctx.memory().write_cstr(s_ptr, "guest").unwrap();
        assert_eq!(fmt(&ctx, "[%8s]", &le32(s_ptr as i32)), "[   guest]");
        assert_eq!(fmt(&ctx, "[%-8s]", &le32(s_ptr as i32)), "[guest   ]");
        assert_eq!(fmt(&ctx, "%.3s", &le32(s_ptr as i32)), "gue");
    }

    #[test]
    fn test_string_precision_counts_characters() {
        let ctx = CrtContext::for_tests();
        let s_ptr = 4096u32;
        ctx.memory().write_cstr(s_ptr, "日本語").unwrap();
        // cut lands between characters, never inside a multibyte sequence
        assert_eq!(fmt(&ctx, "%.2s", &le32(s_ptr as i32)), "日本");
        assert_eq!(fmt(&ctx, "%.5s", &le32(s_ptr as i32)), "日本語");
        // precision applies before width padding (width counts bytes)
        assert_eq!(fmt(&ctx, "[%5.1s]", &le32(s_ptr as i32)), "[  日]");
    }

    #[test]
    fn test_float_fixed_default_precision() {
        let ctx = CrtContext::for_tests();
        assert_eq!(fmt(&ctx, "%f", &le64f(3.5)), "3.500000");
        assert_eq!(fmt(&ctx, "%.2f", &le64f(3.14159)), "3.14");
        assert_eq!(fmt(&ctx, "%.0f", &le64f(2.5)), "2");
    }

    #[test]
    fn test_float_exponential() {
        let ctx = CrtContext::for_tests();
        assert_eq!(fmt(&ctx, "%.2e", &le64f(314.159)), "3.14e+02");
        assert_eq!(fmt(&ctx, "%.2E", &le64f(0.0314)), "3.14E-02");
        assert_eq!(fmt(&ctx, "%e", &le64f(1.0)), "1.000000e+00");
    }

    #[test]
    fn test_float_specials() {
        let ctx = CrtContext::for_tests();
        assert_eq!(fmt(&ctx, "%f", &le64f(f64::NAN)), "nan");
        assert_eq!(fmt(&ctx, "%F", &le64f(f64::INFINITY)), "INF");
        assert_eq!(fmt(&ctx, "%f", &le64f(f64::NEG_INFINITY)), "-inf");
    }

    #[test]
    fn test_float_args_align_to_eight() {
        let ctx = CrtContext::for_tests();
        // int consumes 4 bytes, then 4 padding bytes precede the double
        let mut args = Vec::new();
        args.extend_from_slice(&le32(7));
        args.extend_from_slice(&[0u8; 4]); // alignment padding
        args.extend_from_slice(&le64f(2.5));
        assert_eq!(fmt(&ctx, "%d %.1f", &args), "7 2.5");
    }

    #[test]
    fn test_mixed_specifiers_reset_state() {
        let ctx = CrtContext::for_tests();
        let mut args = Vec::new();
        args.extend_from_slice(&le32(1));
        args.extend_from_slice(&le32(2));
        // the %5d width must not leak into the following %d
        assert_eq!(fmt(&ctx, "%5d%d", &args), "    12");
    }

    #[test]
    fn test_unknown_conversions_pass_through() {
        let ctx = CrtContext::for_tests();
        assert_eq!(fmt(&ctx, "%p", &[]), "%p");
        assert_eq!(fmt(&ctx, "%a", &[]), "%a");
        assert_eq!(fmt(&ctx, "ratio %q!", &[]), "ratio %q!");
    }

    #[test]
    fn test_printf_captures_stdout() {
        let mut ctx = CrtContext::for_tests();
        let fmt_ptr = 512u32;
        ctx.memory().write_cstr(fmt_ptr, "score: %d").unwrap();
        ctx.memory().write_bytes(ARGS, &le32(99)).unwrap();
        let n = ctx.printf(fmt_ptr, ARGS).unwrap();
        assert_eq!(n, 9);
        assert_eq!(ctx.stdout(), b"score: 99\n");
    }
}
