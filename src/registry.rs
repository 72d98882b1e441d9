//! Host operation registry
//!
//! Every import a guest module may request is one variant of [`HostOp`], a
//! closed set. [`resolve`] maps import names to variants, folding the
//! single-precision and extended-precision aliases (`sqrtf`, `sqrtl`) onto
//! their double-precision op the way the guest toolchain's libc headers
//! do. [`HostOp::signature`] gives the wasm-level shape of each import so
//! the instantiation layer can build one trampoline per shape, and
//! [`CrtContext::invoke`] is the single dispatch point that executes an op
//! against a context.
//!
//! An unresolvable name is an [`UnknownImport`] at instantiation time, not
//! a runtime trap. `lgamma` and `tgamma` resolve (the guest may hold a
//! pointer to them) but fail with `Unimplemented` when called.

use crate::context::CrtContext;
use crate::error::{CrtError, CrtResult};
use crate::fenv::ExceptFlags;
use crate::math;
use crate::memory::PAGE_SIZE;
use crate::stdlib;
use crate::time;

/// Wasm-level shape of a host import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sig {
    F64ToF64,
    F64F64ToF64,
    F64F64F64ToF64,
    F64I32ToF64,
    F64F64I32ToF64,
    F64ToI32,
    F64ToI64,
    I32ToF64,
    I32I32ToF64,
    I32I32I32ToI32,
    I32ToI32,
    I32I32ToI32,
    I32ToNone,
    I32ToI64,
    I64ToI32,
    I64ToI64,
    NoneToF64,
    NoneToI32,
    NoneToI64,
    NoneToNone,
}

/// A wasm scalar crossing the host boundary
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F64(f64),
}

impl Value {
    fn as_i32(self, op: &'static str) -> CrtResult<i32> {
        match self {
            Value::I32(v) => Ok(v),
            _ => Err(CrtError::BadArguments { op, expected: "i32" }),
        }
    }

    fn as_i64(self, op: &'static str) -> CrtResult<i64> {
        match self {
            Value::I64(v) => Ok(v),
            _ => Err(CrtError::BadArguments { op, expected: "i64" }),
        }
    }

    fn as_f64(self, op: &'static str) -> CrtResult<f64> {
        match self {
            Value::F64(v) => Ok(v),
            _ => Err(CrtError::BadArguments { op, expected: "f64" }),
        }
    }

    fn as_u32(self, op: &'static str) -> CrtResult<u32> {
        Ok(self.as_i32(op)? as u32)
    }
}

/// The closed set of host operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOp {
    // math: plain float passthroughs
    Fabs,
    Fmod,
    Fma,
    Fmax,
    Fmin,
    Fdim,
    Copysign,
    Exp,
    Exp2,
    Expm1,
    Log,
    Log2,
    Log10,
    Log1p,
    Pow,
    Sqrt,
    Cbrt,
    Hypot,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
    Erf,
    Erfc,
    Lgamma,
    Tgamma,
    // math: rounding and integer conversion
    Ceil,
    Floor,
    Trunc,
    Round,
    Lround,
    Llround,
    Rint,
    Lrint,
    Llrint,
    Nearbyint,
    // math: representation
    Remainder,
    Remquo,
    Frexp,
    Ldexp,
    Modf,
    Logb,
    Ilogb,
    Nextafter,
    Nan,
    Nanf,
    Infinity,
    // fenv
    Fegetround,
    Fesetround,
    Feraiseexcept,
    Fetestexcept,
    Feclearexcept,
    // stdlib
    Atof,
    Atoi,
    Strtod,
    Strtof,
    Strtol,
    Rand,
    Srand,
    Abs,
    Llabs,
    Exit,
    QuickExit,
    Abort,
    Atexit,
    AtQuickExit,
    Mblen,
    Mbtowc,
    Wctomb,
    Mbstowcs,
    Wcstombs,
    HeapStart,
    GrowMemory,
    // stdio
    PrintString,
    Printf,
    // time
    Clock,
    Time,
    Year,
    Month,
    Day,
    DayOfMonth,
    DaysSinceYear,
    Hours,
    Minutes,
    Seconds,
    LocalYear,
    LocalMonth,
    LocalDay,
    LocalDayOfMonth,
    LocalDaysSinceYear,
    LocalHours,
    LocalMinutes,
    LocalSeconds,
    WeeksInYear,
    TimezoneOffset,
}

/// Map an import name to its operation, folding `f`/`l` precision aliases
pub fn resolve(name: &str) -> Option<HostOp> {
    use HostOp::*;
    let op = match name {
        "fabs" | "fabsf" | "fabsl" => Fabs,
        "fmod" | "fmodf" | "fmodl" => Fmod,
        "fma" | "fmaf" | "fmal" => Fma,
        "fmax" | "fmaxf" | "fmaxl" => Fmax,
        "fmin" | "fminf" | "fminl" => Fmin,
        "fdim" | "fdimf" | "fdiml" => Fdim,
        "copysign" | "copysignf" | "copysignl" => Copysign,
        "exp" | "expf" | "expl" => Exp,
        "exp2" | "exp2f" | "exp2l" => Exp2,
        "expm1" | "expm1f" | "expm1l" => Expm1,
        "log" | "logf" | "logl" => Log,
        "log2" | "log2f" | "log2l" => Log2,
        "log10" | "log10f" | "log10l" => Log10,
        "log1p" | "log1pf" | "log1pl" => Log1p,
        "pow" | "powf" | "powl" => Pow,
        "sqrt" | "sqrtf" | "sqrtl" => Sqrt,
        "cbrt" | "cbrtf" | "cbrtl" => Cbrt,
        "hypot" | "hypotf" | "hypotl" => Hypot,
        "sin" | "sinf" | "sinl" => Sin,
        "cos" | "cosf" | "cosl" => Cos,
        "tan" | "tanf" | "tanl" => Tan,
        "asin" | "asinf" | "asinl" => Asin,
        "acos" | "acosf" | "acosl" => Acos,
        "atan" | "atanf" | "atanl" => Atan,
        "atan2" | "atan2f" | "atan2l" => Atan2,
        "sinh" | "sinhf" | "sinhl" => Sinh,
        "cosh" | "coshf" | "coshl" => Cosh,
        "tanh" | "tanhf" | "tanhl" => Tanh,
        "asinh" | "asinhf" | "asinhl" => Asinh,
        "acosh" | "acoshf" | "acoshl" => Acosh,
        "atanh" | "atanhf" | "atanhl" => Atanh,
        "erf" | "erff" | "erfl" => Erf,
        "erfc" | "erfcf" | "erfcl" => Erfc,
        "lgamma" | "lgammaf" | "lgammal" => Lgamma,
        "tgamma" | "tgammaf" | "tgammal" => Tgamma,
        "ceil" | "ceilf" | "ceill" => Ceil,
        "floor" | "floorf" | "floorl" => Floor,
        "trunc" | "truncf" | "truncl" => Trunc,
        "round" | "roundf" | "roundl" => Round,
        "lround" | "lroundf" | "lroundl" => Lround,
        "llround" | "llroundf" | "llroundl" => Llround,
        "rint" | "rintf" | "rintl" => Rint,
        "lrint" | "lrintf" | "lrintl" => Lrint,
        "llrint" | "llrintf" | "llrintl" => Llrint,
        "nearbyint" | "nearbyintf" | "nearbyintl" => Nearbyint,
        "remainder" | "remainderf" | "remainderl" => Remainder,
        "remquo" | "remquof" | "remquol" => Remquo,
        "frexp" | "frexpf" | "frexpl" => Frexp,
        "ldexp" | "ldexpf" | "ldexpl" => Ldexp,
        "scalbn" | "scalbnf" | "scalbnl" => Ldexp,
        "scalbln" | "scalblnf" | "scalblnl" => Ldexp,
        "modf" | "modff" | "modfl" => Modf,
        "logb" | "logbf" | "logbl" => Logb,
        "ilogb" | "ilogbf" | "ilogbl" => Ilogb,
        "nextafter" | "nextafterf" | "nextafterl" => Nextafter,
        "nexttoward" | "nexttowardf" | "nexttowardl" => Nextafter,
        "nan" | "nanl" => Nan,
        "nanf" => Nanf,
        "infinity" | "infinityf" | "infinityl" => Infinity,
        "fegetround" => Fegetround,
        "fesetround" => Fesetround,
        "feraiseexcept" => Feraiseexcept,
        "fetestexcept" => Fetestexcept,
        "feclearexcept" => Feclearexcept,
        "atof" => Atof,
        "atoi" | "atol" | "atoll" => Atoi,
        "strtod" | "strtold" => Strtod,
        "strtof" => Strtof,
        "strtol" | "strtoll" | "strtoul" | "strtoull" => Strtol,
        "rand" => Rand,
        "srand" => Srand,
        "abs" | "labs" => Abs,
        "llabs" => Llabs,
        "exit" => Exit,
        "quick_exit" => QuickExit,
        "abort" => Abort,
        "atexit" => Atexit,
        "at_quick_exit" => AtQuickExit,
        "mblen" => Mblen,
        "mbtowc" => Mbtowc,
        "wctomb" => Wctomb,
        "mbstowcs" => Mbstowcs,
        "wcstombs" => Wcstombs,
        "_heap_start" => HeapStart,
        "_grow_memory" => GrowMemory,
        "_print_string" | "puts" => PrintString,
        "printf" => Printf,
        "clock" => Clock,
        "time" => Time,
        "_get_year" => Year,
        "_get_month" => Month,
        "_get_day" => Day,
        "_get_day_of_month" => DayOfMonth,
        "_get_days_since_year" => DaysSinceYear,
        "_get_hours" => Hours,
        "_get_minutes" => Minutes,
        "_get_seconds" => Seconds,
        "_get_local_year" => LocalYear,
        "_get_local_month" => LocalMonth,
        "_get_local_day" => LocalDay,
        "_get_local_day_of_month" => LocalDayOfMonth,
        "_get_local_days_since_year" => LocalDaysSinceYear,
        "_get_local_hours" => LocalHours,
        "_get_local_minutes" => LocalMinutes,
        "_get_local_seconds" => LocalSeconds,
        "_get_weeks_in_year" => WeeksInYear,
        "_get_timezone_offset" => TimezoneOffset,
        _ => return None,
    };
    Some(op)
}

impl HostOp {
    pub fn name(self) -> &'static str {
        use HostOp::*;
        match self {
            Fabs => "fabs",
            Fmod => "fmod",
            Fma => "fma",
            Fmax => "fmax",
            Fmin => "fmin",
            Fdim => "fdim",
            Copysign => "copysign",
            Exp => "exp",
            Exp2 => "exp2",
            Expm1 => "expm1",
            Log => "log",
            Log2 => "log2",
            Log10 => "log10",
            Log1p => "log1p",
            Pow => "pow",
            Sqrt => "sqrt",
            Cbrt => "cbrt",
            Hypot => "hypot",
            Sin => "sin",
            Cos => "cos",
            Tan => "tan",
            Asin => "asin",
            Acos => "acos",
            Atan => "atan",
            Atan2 => "atan2",
            Sinh => "sinh",
            Cosh => "cosh",
            Tanh => "tanh",
            Asinh => "asinh",
            Acosh => "acosh",
            Atanh => "atanh",
            Erf => "erf",
            Erfc => "erfc",
            Lgamma => "lgamma",
            Tgamma => "tgamma",
            Ceil => "ceil",
            Floor => "floor",
            Trunc => "trunc",
            Round => "round",
            Lround => "lround",
            Llround => "llround",
            Rint => "rint",
            Lrint => "lrint",
            Llrint => "llrint",
            Nearbyint => "nearbyint",
            Remainder => "remainder",
            Remquo => "remquo",
            Frexp => "frexp",
            Ldexp => "ldexp",
            Modf => "modf",
            Logb => "logb",
            Ilogb => "ilogb",
            Nextafter => "nextafter",
            Nan => "nan",
            Nanf => "nanf",
            Infinity => "infinity",
            Fegetround => "fegetround",
            Fesetround => "fesetround",
            Feraiseexcept => "feraiseexcept",
            Fetestexcept => "fetestexcept",
            Feclearexcept => "feclearexcept",
            Atof => "atof",
            Atoi => "atoi",
            Strtod => "strtod",
            Strtof => "strtof",
            Strtol => "strtol",
            Rand => "rand",
            Srand => "srand",
            Abs => "abs",
            Llabs => "llabs",
            Exit => "exit",
            QuickExit => "quick_exit",
            Abort => "abort",
            Atexit => "atexit",
            AtQuickExit => "at_quick_exit",
            Mblen => "mblen",
            Mbtowc => "mbtowc",
            Wctomb => "wctomb",
            Mbstowcs => "mbstowcs",
            Wcstombs => "wcstombs",
            HeapStart => "_heap_start",
            GrowMemory => "_grow_memory",
            PrintString => "_print_string",
            Printf => "printf",
            Clock => "clock",
            Time => "time",
            Year => "_get_year",
            Month => "_get_month",
            Day => "_get_day",
            DayOfMonth => "_get_day_of_month",
            DaysSinceYear => "_get_days_since_year",
            Hours => "_get_hours",
            Minutes => "_get_minutes",
            Seconds => "_get_seconds",
            LocalYear => "_get_local_year",
            LocalMonth => "_get_local_month",
            LocalDay => "_get_local_day",
            LocalDayOfMonth => "_get_local_day_of_month",
            LocalDaysSinceYear => "_get_local_days_since_year",
            LocalHours => "_get_local_hours",
            LocalMinutes => "_get_local_minutes",
            LocalSeconds => "_get_local_seconds",
            WeeksInYear => "_get_weeks_in_year",
            TimezoneOffset => "_get_timezone_offset",
        }
    }

    /// Wasm signature of the import trampoline for this op
    pub fn signature(self) -> Sig {
        use HostOp::*;
        match self {
            Fabs | Exp | Exp2 | Expm1 | Log | Log2 | Log10 | Log1p | Sqrt | Cbrt | Sin | Cos
            | Tan | Asin | Acos | Atan | Sinh | Cosh | Tanh | Asinh | Acosh | Atanh | Erf
            | Erfc | Lgamma | Tgamma | Ceil | Floor | Trunc | Round | Rint | Nearbyint
            | Logb => Sig::F64ToF64,
            Fmod | Fmax | Fmin | Fdim | Copysign | Pow | Atan2 | Hypot | Remainder
            | Nextafter => Sig::F64F64ToF64,
            Fma => Sig::F64F64F64ToF64,
            Frexp | Ldexp | Modf => Sig::F64I32ToF64,
            Remquo => Sig::F64F64I32ToF64,
            Lround | Lrint | Ilogb => Sig::F64ToI32,
            Llround | Llrint => Sig::F64ToI64,
            Nan | Nanf | Atof => Sig::I32ToF64,
            Infinity => Sig::NoneToF64,
            Fegetround | Rand => Sig::NoneToI32,
            Fesetround | Feraiseexcept | Fetestexcept | Feclearexcept | Atoi | Abs | Atexit
            | AtQuickExit | GrowMemory | PrintString | WeeksInYear => Sig::I32ToI32,
            Llabs => Sig::I64ToI64,
            Srand | Exit | QuickExit => Sig::I32ToNone,
            Abort => Sig::NoneToNone,
            HeapStart => Sig::NoneToI32,
            Strtod | Strtof => Sig::I32I32ToF64,
            Strtol | Mbtowc | Mbstowcs | Wcstombs => Sig::I32I32I32ToI32,
            Printf | Mblen | Wctomb => Sig::I32I32ToI32,
            Clock => Sig::NoneToI64,
            Time => Sig::I32ToI64,
            Year | Month | Day | DayOfMonth | DaysSinceYear | Hours | Minutes | Seconds
            | LocalYear | LocalMonth | LocalDay | LocalDayOfMonth | LocalDaysSinceYear
            | LocalHours | LocalMinutes | LocalSeconds | TimezoneOffset => Sig::I64ToI32,
        }
    }
}

fn arg(args: &[Value], idx: usize, op: &'static str) -> CrtResult<Value> {
    args.get(idx)
        .copied()
        .ok_or(CrtError::BadArguments { op, expected: "missing argument" })
}

impl CrtContext {
    /// Execute one host operation; the only dispatch point
    pub fn invoke(&mut self, op: HostOp, args: &[Value]) -> CrtResult<Option<Value>> {
        use HostOp::*;
        let name = op.name();
        let f = |i: usize| -> CrtResult<f64> { arg(args, i, name)?.as_f64(name) };
        let i = |x: usize| -> CrtResult<i32> { arg(args, x, name)?.as_i32(name) };
        let u = |x: usize| -> CrtResult<u32> { arg(args, x, name)?.as_u32(name) };
        let l = |x: usize| -> CrtResult<i64> { arg(args, x, name)?.as_i64(name) };

        let out = match op {
            // plain float passthroughs
            Fabs => Value::F64(f(0)?.abs()),
            Fmod => Value::F64(f(0)? % f(1)?),
            Fma => Value::F64(f(0)?.mul_add(f(1)?, f(2)?)),
            Fmax => Value::F64(f(0)?.max(f(1)?)),
            Fmin => Value::F64(f(0)?.min(f(1)?)),
            Fdim => {
                let (x, y) = (f(0)?, f(1)?);
                Value::F64(if x > y { x - y } else { 0.0 })
            }
            Copysign => Value::F64(f(0)?.copysign(f(1)?)),
            Exp => Value::F64(f(0)?.exp()),
            Exp2 => Value::F64(f(0)?.exp2()),
            Expm1 => Value::F64(f(0)?.exp_m1()),
            Log => Value::F64(f(0)?.ln()),
            Log2 => Value::F64(f(0)?.log2()),
            Log10 => Value::F64(f(0)?.log10()),
            Log1p => Value::F64(f(0)?.ln_1p()),
            Pow => Value::F64(f(0)?.powf(f(1)?)),
            Sqrt => Value::F64(self.sqrt(f(0)?)),
            Cbrt => Value::F64(f(0)?.cbrt()),
            Hypot => Value::F64(f(0)?.hypot(f(1)?)),
            Sin => Value::F64(f(0)?.sin()),
            Cos => Value::F64(f(0)?.cos()),
            Tan => Value::F64(f(0)?.tan()),
            Asin => Value::F64(f(0)?.asin()),
            Acos => Value::F64(f(0)?.acos()),
            Atan => Value::F64(f(0)?.atan()),
            Atan2 => Value::F64(f(0)?.atan2(f(1)?)),
            Sinh => Value::F64(f(0)?.sinh()),
            Cosh => Value::F64(f(0)?.cosh()),
            Tanh => Value::F64(f(0)?.tanh()),
            Asinh => Value::F64(f(0)?.asinh()),
            Acosh => Value::F64(f(0)?.acosh()),
            Atanh => Value::F64(f(0)?.atanh()),
            Erf => Value::F64(math::erf(f(0)?)),
            Erfc => Value::F64(math::erfc(f(0)?)),
            Lgamma | Tgamma => {
                return self.gamma_unimplemented(name).map(|v| Some(Value::F64(v)))
            }
            // rounding and integer conversion
            Ceil => Value::F64(f(0)?.ceil()),
            Floor => Value::F64(f(0)?.floor()),
            Trunc => Value::F64(f(0)?.trunc()),
            Round => Value::F64(math::round_half_up(f(0)?)),
            Lround => Value::I32(self.lround(f(0)?) as i32),
            Llround => Value::I64(self.lround(f(0)?) as i64),
            Rint => Value::F64(self.rint(f(0)?)),
            Lrint => Value::I32(self.rint(f(0)?) as i32),
            Llrint => Value::I64(self.rint(f(0)?) as i64),
            Nearbyint => Value::F64(self.nearbyint(f(0)?)),
            // representation
            Remainder => Value::F64(self.remainder(f(0)?, f(1)?)),
            Remquo => Value::F64(self.remquo(f(0)?, f(1)?, u(2)?)?),
            Frexp => Value::F64(self.frexp(f(0)?, u(1)?)?),
            Ldexp => Value::F64(math::ldexp_parts(f(0)?, i(1)?)),
            Modf => Value::F64(self.modf(f(0)?, u(1)?)?),
            Logb => Value::F64(math::logb(f(0)?)),
            Ilogb => Value::I32(math::ilogb(f(0)?)),
            Nextafter => Value::F64(math::nextafter_parts(f(0)?, f(1)?)),
            Nan => Value::F64(self.nan(u(0)?)?),
            Nanf => Value::F64(self.nanf(u(0)?)? as f64),
            Infinity => Value::F64(f64::INFINITY),
            // fenv
            Fegetround => Value::I32(self.fenv().rounding_mode().to_raw()),
            Fesetround => {
                let raw = i(0)?;
                match crate::fenv::RoundingMode::from_raw(raw) {
                    Some(mode) => {
                        self.fenv_mut().set_rounding_mode(mode);
                        Value::I32(0)
                    }
                    None => Value::I32(1),
                }
            }
            Feraiseexcept => {
                self.fenv_mut().raise(ExceptFlags(u(0)?));
                Value::I32(0)
            }
            Fetestexcept => Value::I32(self.fenv().test(ExceptFlags(u(0)?)).0 as i32),
            Feclearexcept => {
                self.fenv_mut().clear(ExceptFlags(u(0)?));
                Value::I32(0)
            }
            // stdlib
            Atof => Value::F64(self.atof(u(0)?)?),
            Atoi => Value::I32(self.atoi(u(0)?)? as i32),
            Strtod => Value::F64(self.strtod(u(0)?, u(1)?)?),
            Strtof => Value::F64(self.strtof(u(0)?, u(1)?)? as f64),
            Strtol => Value::I32(self.strtol(u(0)?, u(1)?, i(2)?)? as i32),
            Rand => Value::I32(self.rand()),
            Srand => {
                self.reseed(u(0)?);
                return Ok(None);
            }
            Abs => Value::I32(stdlib::abs(i(0)? as i64) as i32),
            Llabs => Value::I64(stdlib::abs(l(0)?)),
            Exit => {
                let code = i(0)?;
                self.exit(code);
                return Err(CrtError::GuestExit { code });
            }
            QuickExit => {
                let code = i(0)?;
                self.quick_exit(code);
                return Err(CrtError::GuestExit { code });
            }
            Abort => {
                self.abort();
                return Err(CrtError::GuestExit { code: 134 });
            }
            Atexit => Value::I32(self.register_atexit(u(0)?)),
            AtQuickExit => Value::I32(self.register_at_quick_exit(u(0)?)),
            Mblen => Value::I32(self.mblen(u(0)?, u(1)?)?),
            Mbtowc => Value::I32(self.mbtowc(u(0)?, u(1)?, u(2)?)?),
            Wctomb => Value::I32(self.wctomb(u(0)?, u(1)?)?),
            Mbstowcs => Value::I32(self.mbstowcs(u(0)?, u(1)?, u(2)?)?),
            Wcstombs => Value::I32(self.wcstombs(u(0)?, u(1)?, u(2)?)?),
            HeapStart => Value::I32(self.heap_start() as i32),
            GrowMemory => {
                let pages = u(0)?;
                Value::I32(self.memory().grow(pages * PAGE_SIZE) as i32)
            }
            // stdio
            PrintString => Value::I32(self.print_string(u(0)?)?),
            Printf => Value::I32(self.printf(u(0)?, u(1)?)?),
            // time
            Clock => Value::I64(self.clock()),
            Time => Value::I64(self.time(u(0)?)?),
            Year => Value::I32(self.utc_fields(l(0)?).year),
            Month => Value::I32(self.utc_fields(l(0)?).month as i32),
            Day => Value::I32(self.utc_fields(l(0)?).weekday as i32),
            DayOfMonth => Value::I32(self.utc_fields(l(0)?).day_of_month as i32),
            DaysSinceYear => Value::I32(self.utc_fields(l(0)?).day_of_year as i32),
            Hours => Value::I32(self.utc_fields(l(0)?).hours as i32),
            Minutes => Value::I32(self.utc_fields(l(0)?).minutes as i32),
            Seconds => Value::I32(self.utc_fields(l(0)?).seconds as i32),
            LocalYear => Value::I32(self.local_fields(l(0)?).year),
            LocalMonth => Value::I32(self.local_fields(l(0)?).month as i32),
            LocalDay => Value::I32(self.local_fields(l(0)?).weekday as i32),
            LocalDayOfMonth => Value::I32(self.local_fields(l(0)?).day_of_month as i32),
            LocalDaysSinceYear => Value::I32(self.local_fields(l(0)?).day_of_year as i32),
            LocalHours => Value::I32(self.local_fields(l(0)?).hours as i32),
            LocalMinutes => Value::I32(self.local_fields(l(0)?).minutes as i32),
            LocalSeconds => Value::I32(self.local_fields(l(0)?).seconds as i32),
            WeeksInYear => Value::I32(time::weeks_in_year(i(0)?) as i32),
            TimezoneOffset => Value::I32(time::tz_offset_minutes(l(0)?)),
        };
        Ok(Some(out))
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::context::CrtContext;

    #[test]
    fn test_resolve_folds_precision_aliases() {
        assert_eq!(resolve("sqrt"), Some(HostOp::Sqrt));
        assert_eq!(resolve("sqrtf"), Some(HostOp::Sqrt));
        assert_eq!(resolve("sqrtl"), Some(HostOp::Sqrt));
        assert_eq!(resolve("scalbn"), Some(HostOp::Ldexp));
        assert_eq!(resolve("nanf"), Some(HostOp::Nanf));
        assert_eq!(resolve("strtoull"), Some(HostOp::Strtol));
    }

    #[test]
    fn test_resolve_rejects_unknown_names() {
        assert_eq!(resolve("gettimeofday"), None);
        assert_eq!(resolve(""), None);
        assert_eq!(resolve("sqrtx"), None);
    }

    #[test]
    fn test_invoke_passthrough_math() {
        let mut ctx = CrtContext::for_tests();
        let out = ctx.invoke(HostOp::Fabs, &[Value::F64(-3.0)]).unwrap();
        assert_eq!(out, Some(Value::F64(3.0)));
        let out = ctx
            .invoke(HostOp::Fmod, &[Value::F64(7.5), Value::F64(2.0)])
            .unwrap();
        assert_eq!(out, Some(Value::F64(1.5)));
    }

    #[test]
    fn test_invoke_sqrt_raises_invalid() {
        let mut ctx = CrtContext::for_tests();
        let out = ctx.invoke(HostOp::Sqrt, &[Value::F64(-1.0)]).unwrap();
        match out {
            Some(Value::F64(v)) => assert!(v.is_nan()),
            other => panic!("unexpected result {:?}", other),
        }
        assert!(!ctx.fenv().test(ExceptFlags::INVALID).is_empty());
    }

    #[test]
    fn test_invoke_bad_argument_type() {
        let mut ctx = CrtContext::for_tests();
        let err = ctx.invoke(HostOp::Sqrt, &[Value::I32(4)]).unwrap_err();
        assert!(matches!(err, CrtError::BadArguments { .. }));
        let err = ctx.invoke(HostOp::Pow, &[Value::F64(2.0)]).unwrap_err();
        assert!(matches!(err, CrtError::BadArguments { .. }));
    }

    #[test]
    fn test_invoke_gamma_unimplemented() {
        let mut ctx = CrtContext::for_tests();
        let err = ctx.invoke(HostOp::Lgamma, &[Value::F64(1.0)]).unwrap_err();
        assert!(matches!(err, CrtError::Unimplemented { .. }));
    }

    #[test]
    fn test_invoke_exit_reports_code() {
        let mut ctx = CrtContext::for_tests();
        let err = ctx.invoke(HostOp::Exit, &[Value::I32(3)]).unwrap_err();
        assert!(matches!(err, CrtError::GuestExit { code: 3 }));
        assert_eq!(ctx.exit_code(), Some(3));
    }

    #[test]
    fn test_invoke_quick_exit_keeps_lists_apart() {
        let mut ctx = CrtContext::for_tests();
        ctx.invoke(HostOp::Atexit, &[Value::I32(3)]).unwrap();
        ctx.invoke(HostOp::AtQuickExit, &[Value::I32(5)]).unwrap();

        let err = ctx
            .invoke(HostOp::QuickExit, &[Value::I32(1)])
            .unwrap_err();
        assert!(matches!(err, CrtError::GuestExit { code: 1 }));
        // quick_exit runs only the at_quick_exit registrations
        assert_eq!(ctx.take_exit_handlers(), vec![5]);
        assert_eq!(ctx.take_atexit_fns(), vec![3]);
    }

    #[test]
    fn test_invoke_multibyte_ops() {
        let mut ctx = CrtContext::for_tests();
        ctx.memory().write_cstr(64, "é").unwrap();
        let out = ctx
            .invoke(HostOp::Mblen, &[Value::I32(64), Value::I32(4)])
            .unwrap();
        assert_eq!(out, Some(Value::I32(2)));
        let out = ctx
            .invoke(
                HostOp::Mbtowc,
                &[Value::I32(256), Value::I32(64), Value::I32(4)],
            )
            .unwrap();
        assert_eq!(out, Some(Value::I32(2)));
        assert_eq!(ctx.memory().read_u32(256).unwrap(), 'é' as u32);
    }

    #[test]
    fn test_invoke_fenv_round_trip() {
        let mut ctx = CrtContext::for_tests();
        let out = ctx.invoke(HostOp::Fesetround, &[Value::I32(2)]).unwrap();
        assert_eq!(out, Some(Value::I32(0)));
        let out = ctx.invoke(HostOp::Fegetround, &[]).unwrap();
        assert_eq!(out, Some(Value::I32(2)));
        // invalid mode is rejected and leaves the mode alone
        let out = ctx.invoke(HostOp::Fesetround, &[Value::I32(9)]).unwrap();
        assert_eq!(out, Some(Value::I32(1)));
        let out = ctx.invoke(HostOp::Fegetround, &[]).unwrap();
        assert_eq!(out, Some(Value::I32(2)));
    }

    #[test]
    fn test_invoke_srand_returns_nothing() {
        let mut ctx = CrtContext::for_tests();
        let out = ctx.invoke(HostOp::Srand, &[Value::I32(7)]).unwrap();
        assert_eq!(out, None);
    }

    #[test]
    fn test_every_op_has_a_resolvable_name() {
        use HostOp::*;
        let ops = [
            Fabs, Fmod, Fma, Sqrt, Remquo, Frexp, Modf, Nan, Nanf, Infinity, Fegetround,
            Feclearexcept, Atof, Strtol, Rand, Srand, Abs, Llabs, Exit, QuickExit, Abort,
            Atexit, AtQuickExit, Mblen, Mbtowc, Wctomb, Mbstowcs, Wcstombs, GrowMemory,
            PrintString, Printf, Clock, Time, Year, LocalSeconds, WeeksInYear,
            TimezoneOffset,
        ];
        for op in ops {
            assert_eq!(resolve(op.name()), Some(op), "name {}", op.name());
        }
    }
}
