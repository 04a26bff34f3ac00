//! Latch used to wake threads waiting on a task queue.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::time::Duration;

#[derive(Debug, Default)]
struct State {
    pending: usize,
    closed: bool,
}

/// Auto-resetting latch.
///
/// Every [`Event::set`] releases one [`Event::wait`], whether the waiter arrives before
/// or after the signal. Once closed, the latch stays open and never blocks again.
#[derive(Debug, Default)]
pub struct Event {
    state: Mutex<State>,
    condvar: Condvar,
}

impl Event {
    pub fn new() -> Event {
        Event::default()
    }

    /// Signal one waiter
    pub fn set(&self) {
        let mut state = self.state.lock();
        state.pending += 1;
        self.condvar.notify_one();
    }

    /// Block until signalled or closed, consuming the signal
    pub fn wait(&self) {
        let mut state = self.state.lock();
        while state.pending == 0 && !state.closed {
            self.condvar.wait(&mut state);
        }
        state.pending = state.pending.saturating_sub(1);
    }

    /// Like [`Event::wait`], giving up after `timeout`. Returns whether it was released.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        while state.pending == 0 && !state.closed {
            if self.condvar.wait_for(&mut state, timeout).timed_out() {
                return false;
            }
        }
        state.pending = state.pending.saturating_sub(1);
        true
    }

    /// Release every waiter, now and later
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.condvar.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl Drop for Event {
    fn drop(&mut self) {
        self.close();
    }
}

/// Guard over a queue that signals the queue's [`Event`] once released
pub struct Lock<'a, T> {
    guard: MutexGuard<'a, T>,
    event: &'a Event,
}

impl<'a, T> Lock<'a, T> {
    pub fn new(mutex: &'a Mutex<T>, event: &'a Event) -> Lock<'a, T> {
        Lock {
            guard: mutex.lock(),
            event,
        }
    }
}

impl<T> Deref for Lock<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for Lock<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for Lock<'_, T> {
    fn drop(&mut self) {
        self.event.set();
    }
}
