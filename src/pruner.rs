//! The pruner latch: a single-flight, probabilistic trigger for
//! compaction, living on the request path.
//!
//! spec §4.5 / §9: the reference set the in-flight flag and never cleared
//! it, so compaction could run at most once per process lifetime. That
//! ambiguity is resolved here (see DESIGN.md "Open Questions") by
//! clearing the flag when the compaction task finishes, success or
//! failure, restoring triggerability.

use std::sync::Mutex;

use rand::Rng;

struct LatchState {
    counter: u64,
    in_flight: bool,
}

/// Mutex-protected counter + flag gating rare, single-flight compaction
/// runs. The counter and flag are locked together; the compaction run
/// itself proceeds without holding the mutex.
pub struct Pruner {
    state: Mutex<LatchState>,
}

impl Default for Pruner {
    fn default() -> Self {
        Self::new()
    }
}

impl Pruner {
    pub fn new() -> Self {
        Pruner {
            state: Mutex::new(LatchState {
                counter: 0,
                in_flight: false,
            }),
        }
    }

    /// Call on every request. Returns `true` at most once per compaction
    /// run: when the counter is divisible by 7, a fresh uniform 63-bit
    /// integer is divisible by 14, and no compaction is already running.
    /// Marks the latch in-flight before returning `true`.
    pub fn tick(&self) -> bool {
        let mut state = self.state.lock().expect("pruner mutex poisoned");
        state.counter += 1;

        if state.in_flight {
            return false;
        }

        if state.counter % 7 != 0 {
            return false;
        }

        let draw: u64 = rand::thread_rng().gen_range(0..(1u64 << 63));
        if draw % 14 != 0 {
            return false;
        }

        state.in_flight = true;
        true
    }

    /// Clears the in-flight flag, restoring triggerability. Must be
    /// called when a compaction run finishes, whether it succeeded or
    /// failed.
    pub fn release(&self) {
        let mut state = self.state.lock().expect("pruner mutex poisoned");
        state.in_flight = false;
    }

    #[cfg(test)]
    pub fn is_in_flight(&self) -> bool {
        self.state.lock().expect("pruner mutex poisoned").in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn never_fires_before_the_seventh_tick() {
        let pruner = Pruner::new();
        for _ in 0..6 {
            // Can't fire regardless of the random draw: counter isn't
            // divisible by 7 yet.
            assert!(!pruner.tick());
        }
        assert!(!pruner.is_in_flight());
    }

    #[test]
    fn release_clears_in_flight() {
        let pruner = Pruner::new();
        {
            let mut state = pruner.state.lock().unwrap();
            state.in_flight = true;
        }
        assert!(pruner.is_in_flight());
        pruner.release();
        assert!(!pruner.is_in_flight());
    }

    #[test]
    fn concurrent_ticks_never_observe_two_in_flight_latches_without_a_release() {
        let pruner = Arc::new(Pruner::new());
        let mut handles = Vec::new();

        for _ in 0..16 {
            let p = Arc::clone(&pruner);
            handles.push(thread::spawn(move || {
                let mut fired = 0;
                for _ in 0..50 {
                    if p.tick() {
                        fired += 1;
                    }
                }
                fired
            }));
        }

        let total_fires: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        // Without ever releasing, at most one tick across all threads can
        // observe `in_flight == false` and flip it.
        assert!(total_fires <= 1);
    }
}
