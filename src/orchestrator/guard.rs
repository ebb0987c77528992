//! One-shot latches used by the orchestrator.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Boolean latch that at most one caller can acquire at a time.
///
/// Acquisition is a single compare-and-swap, so a caller that acquires it
/// before its first await excludes every concurrent caller.
#[derive(Debug, Default)]
pub struct AutoCreateGuard {
    set: AtomicBool,
}

impl AutoCreateGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the latch. False if it was already set.
    pub fn try_acquire(&self) -> bool {
        self.set
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Clear the latch so a later attempt may run.
    pub fn release(&self) {
        self.set.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::SeqCst)
    }
}

/// Counter behind the "switching" flag. Each in-flight switch holds a
/// [`SwitchingScope`]; the flag reads true while any scope is alive.
#[derive(Debug, Default)]
pub struct SwitchingFlag {
    active: AtomicUsize,
}

impl SwitchingFlag {
    pub fn enter(&self) -> SwitchingScope<'_> {
        self.active.fetch_add(1, Ordering::SeqCst);
        SwitchingScope { flag: self }
    }

    pub fn is_set(&self) -> bool {
        self.active.load(Ordering::SeqCst) > 0
    }
}

/// Clears its share of the switching flag when dropped.
#[derive(Debug)]
pub struct SwitchingScope<'a> {
    flag: &'a SwitchingFlag,
}

impl Drop for SwitchingScope<'_> {
    fn drop(&mut self) {
        self.flag.active.fetch_sub(1, Ordering::SeqCst);
    }
}
