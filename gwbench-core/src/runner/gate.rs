use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Run-termination gate shared by all virtual users.
///
/// Every VU must win `next()` before starting an iteration. In iteration mode
/// the slot index is claimed atomically before execution, so the aggregate
/// iteration count is exact regardless of concurrency. In duration mode the
/// deadline is checked at the top of each iteration. `stop()` closes the gate
/// for an explicit abort; in-flight work is unaffected.
#[derive(Debug)]
pub struct IterationGate {
    counter: AtomicU64,
    iterations: Option<u64>,
    duration: Option<Duration>,
    deadline: OnceLock<Instant>,
    stopped: AtomicBool,
}

impl IterationGate {
    pub fn new(iterations: Option<u64>, duration: Option<Duration>) -> Self {
        Self {
            counter: AtomicU64::new(0),
            iterations,
            duration,
            deadline: OnceLock::new(),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn start_at(&self, started: Instant) {
        if self.deadline.get().is_some() {
            return;
        }

        if let Some(duration) = self.duration {
            let _ = self.deadline.set(started + duration);
        }
    }

    pub fn start(&self) {
        self.start_at(Instant::now());
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// True once an iteration budget has been fully claimed. Always false in
    /// duration mode.
    pub fn is_exhausted(&self) -> bool {
        self.iterations
            .is_some_and(|total| self.counter.load(Ordering::Relaxed) >= total)
    }

    /// Claim the next iteration slot. Returns false once the run is over.
    pub fn next(&self) -> bool {
        if self.stopped.load(Ordering::Acquire) {
            return false;
        }

        // Hot path: avoid timekeeping entirely unless we're in duration mode.
        if self.duration.is_some() {
            let now = Instant::now();

            // If the runner didn't explicitly set a start time, lazily
            // initialize the deadline from the first observed iteration.
            if self.deadline.get().is_none() {
                self.start_at(now);
            }

            if let Some(deadline) = self.deadline.get()
                && now >= *deadline
            {
                return false;
            }
        }

        if let Some(total) = self.iterations {
            let idx = self.counter.fetch_add(1, Ordering::Relaxed);
            if idx >= total {
                return false;
            }
        } else if self.duration.is_none() {
            // Neither iterations nor duration => run once.
            let idx = self.counter.fetch_add(1, Ordering::Relaxed);
            if idx > 0 {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn iteration_gate_hands_out_exactly_total() {
        let gate = IterationGate::new(Some(100), None);
        let mut granted = 0;
        while gate.next() {
            granted += 1;
        }
        assert_eq!(granted, 100);
        // Further calls stay closed.
        assert!(!gate.next());
    }

    #[test]
    fn iteration_gate_is_exact_under_contention() {
        let gate = Arc::new(IterationGate::new(Some(10_000), None));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let gate = gate.clone();
            handles.push(std::thread::spawn(move || {
                let mut granted = 0u64;
                while gate.next() {
                    granted += 1;
                }
                granted
            }));
        }

        let total: u64 = handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|_| panic!("thread panicked")))
            .sum();
        assert_eq!(total, 10_000);
    }

    #[test]
    fn duration_gate_closes_at_deadline() {
        let gate = IterationGate::new(None, Some(Duration::from_millis(20)));
        gate.start();
        assert!(gate.next());

        std::thread::sleep(Duration::from_millis(30));
        assert!(!gate.next());
    }

    #[test]
    fn stop_closes_the_gate_immediately() {
        let gate = IterationGate::new(Some(1_000_000), None);
        assert!(gate.next());
        gate.stop();
        assert!(!gate.next());
        assert!(gate.is_stopped());
    }
}
