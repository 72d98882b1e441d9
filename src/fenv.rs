//! Floating-point environment
//!
//! A rounding-mode register plus a sticky exception-flag register, matching
//! the C `<fenv.h>` model: operations raise flags, nothing ever clears them
//! implicitly. One [`FloatEnv`] lives inside each guest context for the
//! lifetime of the instantiation.

/// Rounding modes, raw values matching the C `FE_*` constants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum RoundingMode {
    #[default]
    ToNearest = 0,
    Downward = 1,
    Upward = 2,
    TowardZero = 3,
}

impl RoundingMode {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::ToNearest),
            1 => Some(Self::Downward),
            2 => Some(Self::Upward),
            3 => Some(Self::TowardZero),
            _ => None,
        }
    }

    pub fn to_raw(self) -> i32 {
        self as i32
    }
}

/// Sticky exception flag set (`FE_DIVBYZERO` and friends)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExceptFlags(pub u32);

impl ExceptFlags {
    pub const NONE: ExceptFlags = ExceptFlags(0);
    /// Pole error: division by zero or other asymptotically infinite result
    pub const DIVBYZERO: ExceptFlags = ExceptFlags(0x01);
    /// The result is not exact
    pub const INEXACT: ExceptFlags = ExceptFlags(0x02);
    /// Domain error: an argument outside the function's domain
    pub const INVALID: ExceptFlags = ExceptFlags(0x04);
    /// Result too large in magnitude for the return type
    pub const OVERFLOW: ExceptFlags = ExceptFlags(0x08);
    /// Result too small in magnitude for the return type
    pub const UNDERFLOW: ExceptFlags = ExceptFlags(0x10);
    /// Every exception the implementation supports
    pub const ALL: ExceptFlags = ExceptFlags(0x1f);

    pub fn contains(self, other: ExceptFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: ExceptFlags) -> ExceptFlags {
        ExceptFlags(self.0 | other.0)
    }

    pub fn intersect(self, other: ExceptFlags) -> ExceptFlags {
        ExceptFlags(self.0 & other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Per-instantiation floating-point state
#[derive(Debug, Clone, Default)]
pub struct FloatEnv {
    rounding: RoundingMode,
    flags: ExceptFlags,
}

impl FloatEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rounding_mode(&self) -> RoundingMode {
        self.rounding
    }

    pub fn set_rounding_mode(&mut self, mode: RoundingMode) {
        self.rounding = mode;
    }

    /// Set one or more exception bits. Sticky: never cleared by later
    /// successful operations, only by an explicit [`FloatEnv::clear`].
    pub fn raise(&mut self, flags: ExceptFlags) {
        self.flags = self.flags.union(flags);
    }

    /// The currently raised subset of `mask`
    pub fn test(&self, mask: ExceptFlags) -> ExceptFlags {
        self.flags.intersect(mask)
    }

    /// Clear the flags in `mask` (`feclearexcept`)
    pub fn clear(&mut self, mask: ExceptFlags) {
        self.flags = ExceptFlags(self.flags.0 & !mask.0);
    }
}
