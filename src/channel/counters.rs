#[cfg(any(test, feature = "mutants"))]
use std::cell::Cell;
#[cfg(any(test, feature = "mutants"))]
use std::time::{Duration, Instant};

#[cfg(any(test, feature = "mutants"))]
thread_local! {
    static WRITE_CHUNK_LIMIT: Cell<usize> = const { Cell::new(usize::MAX) };
    static WRITE_SYSCALL_COUNT: Cell<usize> = const { Cell::new(0) };
}

/// Cap each `write` call at `limit` bytes on this thread to exercise short-write handling.
#[cfg(any(test, feature = "mutants"))]
#[allow(dead_code)]
pub(crate) fn set_write_chunk_limit(limit: Option<usize>) {
    WRITE_CHUNK_LIMIT.with(|value| value.set(limit.unwrap_or(usize::MAX)));
    WRITE_SYSCALL_COUNT.with(|count| count.set(0));
}

#[cfg(any(test, feature = "mutants"))]
#[allow(dead_code)]
pub(crate) fn write_syscall_count() -> usize {
    WRITE_SYSCALL_COUNT.with(|count| count.get())
}

pub(super) fn write_chunk_limit(len: usize) -> usize {
    #[cfg(any(test, feature = "mutants"))]
    {
        WRITE_SYSCALL_COUNT.with(|count| count.set(count.get().saturating_add(1)));
        WRITE_CHUNK_LIMIT.with(|limit| len.min(limit.get()))
    }
    #[cfg(not(any(test, feature = "mutants")))]
    {
        len
    }
}

#[cfg(any(test, feature = "mutants"))]
pub(super) fn guard_loop(start: Instant, iterations: usize, limit: usize, label: &str) {
    if start.elapsed() > Duration::from_secs(5) || iterations > limit {
        panic!("{label} loop guard exceeded");
    }
}
