//! Stack growth for the recursive interpreter.
//!
//! Macro calls, includes and nested expressions all recurse through
//! `execute` and `eval`, and an unoptimized build spends several kilobytes of
//! stack per level. Both entry points run inside [`ensure_sufficient_stack`]
//! so that `max_call_depth`, not the thread's stack size, bounds recursion.

/// If less than this remains, grow the stack.
const RED_ZONE: usize = 128 * 1024;

/// Size of each new stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_recursion_grows_the_stack() {
        fn depth(n: u64) -> u64 {
            ensure_sufficient_stack(|| if n == 0 { 0 } else { depth(n - 1) + 1 })
        }
        assert_eq!(depth(100_000), 100_000);
    }
}
