//! The sampler holds the gate for exactly one poll iteration at a time, and between iterations
//! only takes it while the state is [`EngineState::Sampling`].

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Idle,
    Sampling,
    /// The last window is closed and the buffer is frozen.
    Stopped,
}

#[derive(Debug)]
struct Guarded<T> {
    state: EngineState,
    value: T,
}

#[derive(Debug)]
pub(crate) struct Gate<T> {
    guarded: Mutex<Guarded<T>>,
    resumed: Condvar,
    halted: AtomicBool,
}

impl<T> Gate<T> {
    pub fn new(value: T) -> Gate<T> {
        Gate {
            guarded: Mutex::new(Guarded { state: EngineState::Idle, value }),
            resumed: Condvar::new(),
            halted: AtomicBool::new(false),
        }
    }

    pub fn lock(&self) -> GateGuard<'_, T> {
        let guard = self.guarded.lock().unwrap_or_else(PoisonError::into_inner);
        GateGuard { gate: self, guard }
    }

    /// Acquire the gate once the state becomes [`EngineState::Sampling`].
    /// Returns `None` once the gate is halted.
    pub fn wait_sampling(&self) -> Option<GateGuard<'_, T>> {
        let guard = self.guarded.lock().unwrap_or_else(PoisonError::into_inner);
        let guard = self.resumed
            .wait_while(guard, |guarded|
                guarded.state != EngineState::Sampling && !self.is_halted())
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_halted() {
            return None
        }
        Some(GateGuard { gate: self, guard })
    }

    /// Wake up every waiter and make [`Gate::wait_sampling`] return `None` from now on.
    /// Must not be called while holding the gate.
    pub fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
        // taking the lock orders the store before any waiter's predicate check
        drop(self.guarded.lock().unwrap_or_else(PoisonError::into_inner));
        self.resumed.notify_all();
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }
}

pub(crate) struct GateGuard<'a, T> {
    gate: &'a Gate<T>,
    guard: MutexGuard<'a, Guarded<T>>,
}

impl<'a, T> GateGuard<'a, T> {
    pub fn state(&self) -> EngineState {
        self.guard.state
    }

    pub fn set_state(&mut self, state: EngineState) {
        if self.guard.state != state {
            log::trace!("gate: {:?} -> {:?}", self.guard.state, state);
            self.guard.state = state;
            if state == EngineState::Sampling {
                self.gate.resumed.notify_all();
            }
        }
    }
}

impl<'a, T> Deref for GateGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard.value
    }
}

impl<'a, T> DerefMut for GateGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard.value
    }
}
