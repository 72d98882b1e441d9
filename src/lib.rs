//! cshim - host-side C runtime emulation for WASM guest modules
//!
//! A guest module compiled from C imports its libc from the host: slices of
//! `<math.h>`, `<stdlib.h>`, `<stdio.h>`, `<time.h>` and `<fenv.h>`, plus a
//! `printf`-family format interpreter. Every "pointer" the guest passes is a
//! byte offset into its own linear memory; the host reads and writes that
//! memory directly.
//!
//! Layout:
//! - `memory`: typed, bounds-checked views over the guest's linear memory
//! - `fenv`: rounding-mode register and sticky exception flags
//! - `math`: IEEE-754 math primitives with C edge-case policy
//! - `stdlib`: string-to-number parsing, PRNG, exit bookkeeping
//! - `fmt`: the `printf` format-string interpreter
//! - `time`: calendar decomposition over epoch milliseconds
//! - `context` / `registry`: per-instantiation state and import dispatch
//!
//! All calls are synchronous and strictly sequential; the only shared state
//! is the linear memory and the float environment, both owned by one
//! [`context::CrtContext`] per guest instantiation.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod context;
pub mod error;
pub mod fenv;
pub mod fmt;
pub mod math;
pub mod memory;
pub mod registry;
pub mod stdlib;
pub mod time;

#[cfg(target_arch = "wasm32")]
pub mod guest;

pub use context::CrtContext;
pub use error::{CrtError, CrtResult};

/// Initialize panic hook for better error messages in browser console
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Console logging helper
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    pub fn log(s: &str);
}

/// Log to browser console (WASM)
#[cfg(target_arch = "wasm32")]
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => {
        $crate::log(&format!($($t)*))
    };
}

/// Log to stderr (native)
#[cfg(not(target_arch = "wasm32"))]
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => {
        eprintln!($($t)*)
    };
}
