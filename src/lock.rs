use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the inner value if a writer panicked while holding it.
pub(crate) fn lock_or_recover<'a, T>(lock: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            crate::log_debug(&format!("{context}: lock poisoned by a panicking writer, recovering"));
            poisoned.into_inner()
        }
    }
}
