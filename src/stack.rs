//! Host stack growth for the recursive parser and evaluator.

/// Stack left free before growing the host stack.
const RED_ZONE: usize = 100 * 1024;

/// Size of each newly allocated host stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, first growing the host stack if less than `RED_ZONE` remains.
///
/// Wrap every function that recurses on user input: deeply nested expressions, blocks and calls
/// then only cost heap memory.
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(n: usize) -> usize {
        ensure_sufficient_stack(|| if n == 0 { 0 } else { 1 + depth(n - 1) })
    }

    #[test]
    fn deep_recursion_does_not_overflow() {
        assert_eq!(depth(200_000), 200_000);
    }
}
