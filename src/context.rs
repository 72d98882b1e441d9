//! Per-instantiation runtime context
//!
//! Each guest module instantiation gets exactly one [`CrtContext`]. It owns
//! everything the host-function implementations touch: the linear-memory
//! handle, the floating-point environment, the stdlib PRNG, captured stdout
//! and the exit/atexit bookkeeping. Operations take the context explicitly;
//! there is no process-wide state, so a host may run several guest instances
//! side by side.
//!
//! Calls are strictly sequential by construction of the calling convention;
//! nothing here is locked and nothing may be re-entered.

use crate::fenv::{ExceptFlags, FloatEnv};
use crate::memory::GuestMemory;
use crate::stdlib::SplitMix32;

/// How the guest terminated, selecting which handler list runs afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitKind {
    /// exit() or a plain return from main: the atexit handlers run
    #[default]
    Normal,
    /// quick_exit(): only the at_quick_exit handlers run
    Quick,
    /// abort(): no handlers run
    Abort,
}

/// Runtime state for one guest module instantiation
pub struct CrtContext {
    memory: GuestMemory,
    fenv: FloatEnv,
    rng: SplitMix32,

    /// Captured stdout (printf/puts output)
    stdout: Vec<u8>,

    /// Exit code once the guest has called exit()/quick_exit()/abort()
    exit_code: Option<i32>,
    exit_kind: ExitKind,

    /// Indirect-call-table indices registered via atexit(), in registration
    /// order; at_quick_exit keeps its own list
    atexit_fns: Vec<u32>,
    at_quick_exit_fns: Vec<u32>,

    /// Guest `__heap_base`, recorded at instantiation; 0 until then
    heap_base: u32,
}

impl CrtContext {
    /// Create a context over the guest's linear memory
    pub fn new(memory: GuestMemory) -> Self {
        Self {
            memory,
            fenv: FloatEnv::new(),
            rng: SplitMix32::new(1),
            stdout: Vec::new(),
            exit_code: None,
            exit_kind: ExitKind::Normal,
            atexit_fns: Vec::new(),
            at_quick_exit_fns: Vec::new(),
            heap_base: 0,
        }
    }

    /// First free heap address inside the guest's data segment
    pub fn heap_start(&self) -> u32 {
        self.heap_base
    }

    /// Record the guest's `__heap_base` export after instantiation
    pub fn set_heap_start(&mut self, heap_base: u32) {
        self.heap_base = heap_base;
    }

    pub fn memory(&self) -> &GuestMemory {
        &self.memory
    }

    pub fn fenv(&self) -> &FloatEnv {
        &self.fenv
    }

    pub fn fenv_mut(&mut self) -> &mut FloatEnv {
        &mut self.fenv
    }

    pub(crate) fn rng_mut(&mut self) -> &mut SplitMix32 {
        &mut self.rng
    }

    pub(crate) fn reseed(&mut self, seed: u32) {
        self.rng = SplitMix32::new(seed);
    }

    /// Shorthand used throughout the math layer
    pub(crate) fn raise(&mut self, flags: ExceptFlags) {
        self.fenv.raise(flags);
    }

    // =========================================================================
    // stdout capture
    // =========================================================================

    /// Append a line of guest output (also mirrored to the console)
    pub fn write_stdout(&mut self, s: &str) {
        crate::console_log!("{}", s);
        self.stdout.extend_from_slice(s.as_bytes());
        self.stdout.push(b'\n');
    }

    /// Captured stdout so far
    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    /// Take ownership of stdout (clears internal buffer)
    pub fn take_stdout(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.stdout)
    }

    // =========================================================================
    // Exit bookkeeping
    // =========================================================================

    pub fn has_exited(&self) -> bool {
        self.exit_code.is_some()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Record the guest's exit status. The harness unwinds the guest call
    /// and runs the atexit handlers; this only records.
    pub fn exit(&mut self, code: i32) {
        self.exit_code = Some(code);
        self.exit_kind = ExitKind::Normal;
    }

    /// Record a quick_exit(): the atexit list is bypassed, only the
    /// at_quick_exit handlers run
    pub fn quick_exit(&mut self, code: i32) {
        self.exit_code = Some(code);
        self.exit_kind = ExitKind::Quick;
    }

    /// Record an abort(): no handlers run at all
    pub fn abort(&mut self) {
        self.exit_code = Some(134);
        self.exit_kind = ExitKind::Abort;
    }

    pub fn exit_kind(&self) -> ExitKind {
        self.exit_kind
    }

    /// Register an indirect-call-table index to run at exit. Returns 0 on
    /// success, matching the C contract.
    pub fn register_atexit(&mut self, table_index: u32) -> i32 {
        self.atexit_fns.push(table_index);
        0
    }

    /// Register an index to run at quick_exit; a separate list from atexit
    pub fn register_at_quick_exit(&mut self, table_index: u32) -> i32 {
        self.at_quick_exit_fns.push(table_index);
        0
    }

    /// Drain the atexit handlers in reverse registration order
    pub fn take_atexit_fns(&mut self) -> Vec<u32> {
        let mut fns = std::mem::take(&mut self.atexit_fns);
        fns.reverse();
        fns
    }

    /// Drain the at_quick_exit handlers in reverse registration order
    pub fn take_at_quick_exit_fns(&mut self) -> Vec<u32> {
        let mut fns = std::mem::take(&mut self.at_quick_exit_fns);
        fns.reverse();
        fns
    }

    /// Drain whichever handler list the recorded exit kind calls for
    pub fn take_exit_handlers(&mut self) -> Vec<u32> {
        match self.exit_kind {
            ExitKind::Normal => self.take_atexit_fns(),
            ExitKind::Quick => self.take_at_quick_exit_fns(),
            ExitKind::Abort => Vec::new(),
        }
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
impl CrtContext {
    /// A context over a one-page test memory
    pub fn for_tests() -> Self {
        Self::new(GuestMemory::with_size(crate::memory::PAGE_SIZE))
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn test_exit_bookkeeping() {
        let mut ctx = CrtContext::for_tests();
        assert!(!ctx.has_exited());
        ctx.exit(42);
        assert!(ctx.has_exited());
        assert_eq!(ctx.exit_code(), Some(42));
    }

    #[test]
    fn test_atexit_reverse_order() {
        let mut ctx = CrtContext::for_tests();
        assert_eq!(ctx.register_atexit(3), 0);
        assert_eq!(ctx.register_atexit(7), 0);
        assert_eq!(ctx.register_atexit(9), 0);
        assert_eq!(ctx.take_atexit_fns(), vec![9, 7, 3]);
        assert!(ctx.take_atexit_fns().is_empty());
    }

    #[test]
    fn test_quick_exit_selects_its_own_handlers() {
        let mut ctx = CrtContext::for_tests();
        ctx.register_atexit(3);
        ctx.register_at_quick_exit(5);
        ctx.register_at_quick_exit(8);

        ctx.quick_exit(1);
        assert_eq!(ctx.exit_kind(), ExitKind::Quick);
        // only the quick list runs, reversed; the atexit list is bypassed
        assert_eq!(ctx.take_exit_handlers(), vec![8, 5]);
        assert_eq!(ctx.take_atexit_fns(), vec![3]);
    }

    #[test]
    fn test_abort_runs_no_handlers() {
        let mut ctx = CrtContext::for_tests();
        ctx.register_atexit(3);
        ctx.register_at_quick_exit(5);
        ctx.abort();
        assert_eq!(ctx.exit_code(), Some(134));
        assert!(ctx.take_exit_handlers().is_empty());
    }

    #[test]
    fn test_normal_exit_runs_atexit_list() {
        let mut ctx = CrtContext::for_tests();
        ctx.register_atexit(2);
        ctx.register_at_quick_exit(4);
        ctx.exit(0);
        assert_eq!(ctx.take_exit_handlers(), vec![2]);
    }

    #[test]
    fn test_stdout_capture() {
        let mut ctx = CrtContext::for_tests();
        ctx.write_stdout("hello");
        ctx.write_stdout("world");
        assert_eq!(ctx.stdout(), b"hello\nworld\n");
        assert_eq!(ctx.take_stdout(), b"hello\nworld\n");
        assert!(ctx.stdout().is_empty());
    }
}
