//! Sweep run-state and its scoped guard

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SweepState {
    Idle = 0,
    Running = 1,
}

impl From<u8> for SweepState {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Running,
            _ => Self::Idle,
        }
    }
}

/// At most one sweep holds the lock at any time
#[derive(Debug)]
pub struct SweepLock {
    state: AtomicU8,
}

impl Default for SweepLock {
    fn default() -> Self {
        Self::new()
    }
}

impl SweepLock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(SweepState::Idle as u8),
        }
    }

    #[must_use]
    pub fn state(&self) -> SweepState {
        self.state.load(Ordering::Acquire).into()
    }

    /// Moves `Idle` to `Running`. `None` when a sweep is already running.
    ///
    /// The state returns to `Idle` when the guard is dropped, including during
    /// panic unwinding.
    pub fn try_acquire(&self) -> Option<SweepGuard<'_>> {
        self.state
            .compare_exchange(
                SweepState::Idle as u8,
                SweepState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()
            .map(|_| SweepGuard { lock: self })
    }
}

#[must_use = "the sweep lock is released as soon as the guard is dropped"]
pub struct SweepGuard<'a> {
    lock: &'a SweepLock,
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.lock
            .state
            .store(SweepState::Idle as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let lock = SweepLock::new();
        let guard = lock.try_acquire();
        assert!(guard.is_some());
        assert_eq!(lock.state(), SweepState::Running);
        assert!(lock.try_acquire().is_none());

        drop(guard);
        assert_eq!(lock.state(), SweepState::Idle);
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn test_released_on_panic() {
        let lock = SweepLock::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = lock.try_acquire().unwrap();
            panic!("sweep blew up");
        }));
        assert!(result.is_err());
        assert_eq!(lock.state(), SweepState::Idle);
    }
}
