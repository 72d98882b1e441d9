//! `<math.h>` emulation
//!
//! Elementary functions delegate to the host's `f64` runtime; what this
//! module adds is the C-standard edge-case policy (domain errors raising
//! sticky flags), rounding-mode-aware rounding, and the bit-level float
//! decomposition (`frexp`, `ldexp`, `nextafter`, NaN payloads) that must be
//! reproduced exactly.
//!
//! Pointer-output functions live as methods on [`CrtContext`] so the flag
//! register and linear memory are always reached through the explicit
//! per-instantiation context. Pure helpers are free functions, testable in
//! isolation.
//!
//! Single-precision (`…f`) and long-double (`…l`) entry points alias the
//! double implementations; no extended precision exists on this host. The
//! alias folding happens in [`crate::registry`].

use crate::context::CrtContext;
use crate::error::{CrtError, CrtResult};
use crate::fenv::{ExceptFlags, RoundingMode};

/// `ilogb(0)` result, matching glibc's `FP_ILOGB0`
pub const FP_ILOGB0: i32 = i32::MIN;
/// `ilogb(NaN)` result, matching glibc's `FP_ILOGBNAN`
pub const FP_ILOGBNAN: i32 = i32::MIN;

/// Smallest positive denormal double, 0x0000000000000001
const SMALLEST_DENORM: f64 = 4.9406564584124654e-324;

// =============================================================================
// Pure bit-level helpers
// =============================================================================

/// Decompose `x` into `(mantissa, exponent)` with `x = mantissa * 2^exponent`
/// and `0.5 <= |mantissa| < 1` for finite non-zero `x`.
///
/// Denormals are pre-scaled by 2^64 so the exponent field is populated, then
/// corrected. `frexp_parts(0) == (0, 0)`; non-finite input passes through
/// with exponent 0.
pub fn frexp_parts(x: f64) -> (f64, i32) {
    if x == 0.0 || !x.is_finite() {
        return (x, 0);
    }

    let mut biased = ((x.to_bits() >> 52) & 0x7ff) as i32;
    if biased == 0 {
        // denormal: no exponent bits of its own
        let scaled = x * 2f64.powi(64);
        biased = (((scaled.to_bits() >> 52) & 0x7ff) as i32) - 64;
    }

    let exponent = biased - 1022;
    (ldexp_parts(x, -exponent), exponent)
}

/// Multiply `mantissa` by `2^exponent` without letting a single huge power
/// collapse to infinity or zero: the exponent is applied in at most three
/// steps of at most 1023 each.
pub fn ldexp_parts(mantissa: f64, exponent: i32) -> f64 {
    let steps = ((exponent.abs() + 1022) / 1023).min(3);
    let mut result = mantissa;
    for i in 0..steps {
        result *= 2f64.powi((exponent + i).div_euclid(steps));
    }
    result
}

/// Quiet NaN carrying `payload` in the low mantissa word: high word
/// `0x7FF80000`, low word the payload, sign positive.
pub fn nan_with_payload(payload: u32) -> f64 {
    f64::from_bits(0x7FF8_0000_0000_0000 | payload as u64)
}

/// Single-precision payload NaN: `0x7FC00000 | (payload & 0x3FFFFF)`
pub fn nan_with_payload_f32(payload: u32) -> f32 {
    f32::from_bits(0x7FC0_0000 | (payload & 0x003F_FFFF))
}

/// Recover a payload stashed by [`nan_with_payload`] (low 32 mantissa bits)
pub fn nan_payload(x: f64) -> u32 {
    x.to_bits() as u32
}

/// The representable double adjacent to `from` in the direction of `to`
pub fn nextafter_parts(from: f64, to: f64) -> f64 {
    if from.is_nan() || to.is_nan() {
        return f64::NAN;
    }
    if from == to {
        return from;
    }
    if from == 0.0 {
        return if to < 0.0 {
            -SMALLEST_DENORM
        } else {
            SMALLEST_DENORM
        };
    }

    // Ordered doubles of one sign are ordered as integers in their bit
    // representation; step the representation by one unit.
    let bits = from.to_bits();
    let stepped = if (to > from) == (from > 0.0) {
        bits + 1
    } else {
        bits - 1
    };
    f64::from_bits(stepped)
}

/// Round half toward positive infinity (the observed `round` behavior of
/// the runtime this shim reproduces; C's `round` ties away from zero)
pub fn round_half_up(x: f64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    if x.floor() + 0.5 <= x {
        x.ceil()
    } else {
        x.floor()
    }
}

/// Error function, fixed-coefficient approximation with max absolute error
/// around 1.5e-7 (Numerical Recipes 6.2)
pub fn erf(x: f64) -> f64 {
    const C: [f64; 10] = [
        1.26551223, 1.00002368, 0.37409196, 0.09678418, 0.18628806, 0.27886807, 1.13520398,
        1.48851587, 0.82215223, 0.17087277,
    ];

    let tau = |x: f64| -> f64 {
        let t = 1.0 / (1.0 + 0.5 * x.abs());
        let mut inner = -C[0];
        let mut t_mul = t;
        inner += C[1] * t_mul;
        t_mul *= t;
        inner += C[2] * t_mul;
        t_mul *= t;
        inner += C[3] * t_mul;
        t_mul *= t;
        inner += -C[4] * t_mul;
        t_mul *= t;
        inner += C[5] * t_mul;
        t_mul *= t;
        inner += -C[6] * t_mul;
        t_mul *= t;
        inner += C[7] * t_mul;
        t_mul *= t;
        inner += -C[8] * t_mul;
        t_mul *= t;
        inner += C[9] * t_mul;

        t * (-(x * x) + inner).exp()
    };

    if x >= 0.0 {
        1.0 - tau(x)
    } else {
        tau(-x) - 1.0
    }
}

/// Complementary error function
pub fn erfc(x: f64) -> f64 {
    1.0 - erf(x)
}

/// Exponent of |x| as a float, with the C special-value policy
pub fn logb(x: f64) -> f64 {
    if x == 0.0 {
        f64::NEG_INFINITY
    } else if x.is_nan() {
        f64::NAN
    } else if x.is_infinite() {
        f64::INFINITY
    } else {
        ilogb(x) as f64
    }
}

/// Exponent extraction as an int, with the C sentinel values. Taken from
/// the exponent bits rather than a log ratio so powers of two are exact.
pub fn ilogb(x: f64) -> i32 {
    if x == 0.0 {
        FP_ILOGB0
    } else if x.is_nan() {
        FP_ILOGBNAN
    } else if x.is_infinite() {
        i32::MAX
    } else {
        let (_, exponent) = frexp_parts(x);
        exponent - 1
    }
}

// =============================================================================
// Context-coupled operations (flags and pointer outputs)
// =============================================================================

impl CrtContext {
    /// `sqrt` with the C domain-error policy: negative input raises
    /// `FE_INVALID`, the result is the host sqrt (NaN for negatives)
    pub fn sqrt(&mut self, x: f64) -> f64 {
        if x < 0.0 {
            self.raise(ExceptFlags::INVALID);
        }
        x.sqrt()
    }

    /// IEEE remainder with C flag policy. NaN operands yield NaN silently;
    /// a non-finite numerator or zero divisor is a domain error.
    pub fn remainder(&mut self, x: f64, y: f64) -> f64 {
        if x.is_nan() || y.is_nan() {
            return f64::NAN;
        }
        if !x.is_finite() {
            self.raise(ExceptFlags::INVALID);
            return f64::NAN;
        }
        if y == 0.0 {
            self.raise(ExceptFlags::INVALID.union(ExceptFlags::DIVBYZERO));
            return f64::NAN;
        }
        x % y
    }

    /// `remquo`: remainder plus the low quotient bits written through
    /// `quo_ptr` as a signed 32-bit value
    pub fn remquo(&mut self, x: f64, y: f64, quo_ptr: u32) -> CrtResult<f64> {
        let rem = self.remainder(x, y);
        if rem.is_nan() {
            return Ok(rem);
        }

        let sign: i64 = if rem == 0.0 {
            if x.is_sign_negative() {
                -1
            } else {
                1
            }
        } else if rem < 0.0 {
            -1
        } else {
            1
        };

        let quo = ((x / y).floor() as i64).unsigned_abs() & 0x7fff_ffff;
        self.memory().write_i32(quo_ptr, (sign * quo as i64) as i32)?;
        Ok(rem)
    }

    /// `nan(tagp)`: parse a decimal payload from the guest string and pack
    /// it into a quiet NaN. Zero, unparsable or >32-bit payloads produce a
    /// plain quiet NaN.
    pub fn nan(&mut self, tag_ptr: u32) -> CrtResult<f64> {
        let tag = self.memory().read_cstr(tag_ptr)?;
        Ok(match crate::stdlib::parse_int_prefix(&tag) {
            Some(n) if n > 0 && n <= 0xFFFF_FFFF => nan_with_payload(n as u32),
            _ => f64::NAN,
        })
    }

    /// Single-precision `nanf(tagp)`
    pub fn nanf(&mut self, tag_ptr: u32) -> CrtResult<f32> {
        let tag = self.memory().read_cstr(tag_ptr)?;
        Ok(match crate::stdlib::parse_int_prefix(&tag) {
            Some(n) if n > 0 && n <= 0xFFFF_FFFF => nan_with_payload_f32(n as u32),
            _ => f32::NAN,
        })
    }

    /// `frexp` with the exponent written through `exp_ptr` as i32
    pub fn frexp(&mut self, x: f64, exp_ptr: u32) -> CrtResult<f64> {
        let (mantissa, exponent) = frexp_parts(x);
        self.memory().write_i32(exp_ptr, exponent)?;
        Ok(mantissa)
    }

    /// `modf`: fractional part returned, integral part (truncated toward
    /// zero) written through `int_ptr` as f64.
    ///
    /// Raises `FE_INEXACT` unconditionally, even for exact truncations —
    /// a documented divergence from strict C, preserved from the runtime
    /// this shim reproduces.
    pub fn modf(&mut self, x: f64, int_ptr: u32) -> CrtResult<f64> {
        let int_part = x.trunc();
        self.memory().write_f64(int_ptr, int_part)?;
        self.raise(ExceptFlags::INEXACT);
        Ok(x - int_part)
    }

    /// `rint`: round according to the current rounding mode
    pub fn rint(&mut self, x: f64) -> f64 {
        match self.fenv().rounding_mode() {
            RoundingMode::Downward => x.floor(),
            RoundingMode::Upward => x.ceil(),
            RoundingMode::TowardZero => x.trunc(),
            RoundingMode::ToNearest => {
                if x.floor() + 0.5 <= x {
                    x.ceil()
                } else {
                    x.floor()
                }
            }
        }
    }

    /// `nearbyint`: round to nearest regardless of the current mode, which
    /// is restored afterwards and never observably changed
    pub fn nearbyint(&mut self, x: f64) -> f64 {
        let saved = self.fenv().rounding_mode();
        self.fenv_mut().set_rounding_mode(RoundingMode::ToNearest);
        let result = self.rint(x);
        self.fenv_mut().set_rounding_mode(saved);
        result
    }

    /// `lround`/`llround`: non-finite input is a domain error and the
    /// input's shape (inf or NaN) is returned instead of a rounded integer —
    /// a deliberately permissive policy, looser than strict C.
    pub fn lround(&mut self, x: f64) -> f64 {
        if !x.is_finite() {
            self.raise(ExceptFlags::INVALID);
            return x;
        }
        round_half_up(x)
    }

    /// `lgamma`/`tgamma` are not provided; calls fail fast
    pub fn gamma_unimplemented(&self, name: &'static str) -> CrtResult<f64> {
        Err(CrtError::Unimplemented { name })
    }
}
