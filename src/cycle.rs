//! Per-cycle shared state between the echo interrupt, the timeout alarm and
//! the control loop.
//!
//! `CycleFlags` is the only state touched from more than one context. The
//! interrupt writes a timestamp first (Relaxed) and then publishes it by
//! storing the matching flag with Release; the control loop loads the flag
//! with Acquire before it reads the timestamp. That pair is the only ordering
//! the cell relies on.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Monotonic tick rate; one tick is one microsecond.
pub const TICK_HZ: u32 = 1_000_000;

pub type Instant = fugit::TimerInstantU32<TICK_HZ>;
pub type Duration = fugit::TimerDurationU32<TICK_HZ>;

/// Outcome of one trigger/measure cycle.
#[derive(Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum Outcome {
    /// Echo pulse width from rising to falling edge.
    Success(Duration),
    /// No echo confirmed within the deadline.
    Timeout,
    /// Falling edge without a valid preceding rising edge, or edges out of
    /// chronological order. A logic/race condition rather than a normal miss.
    Inconsistent,
}

impl Outcome {
    /// Distance in hundredths of a centimeter, `None` for failed cycles.
    ///
    /// distance_cm = pulse_us * 0.0343 / 2, i.e. centi-cm = us * 343 / 200,
    /// rounded half-up. Nominal speed of sound, no temperature compensation.
    pub fn centi_cm(&self) -> Option<u32> {
        match self {
            Outcome::Success(width) => {
                Some(((width.ticks() as u64 * 343 + 100) / 200) as u32)
            }
            _ => None,
        }
    }
}

/// Edge and timeout records for the cycle in flight.
///
/// Written by the GPIOTE handler and the timeout alarm, read and reset by the
/// coordinator. Timestamps are raw monotonic ticks; they are meaningful only
/// once the corresponding `*_seen` flag is observed.
pub struct CycleFlags {
    rising_seen: AtomicBool,
    falling_seen: AtomicBool,
    timeout_fired: AtomicBool,
    t_rise: AtomicU32,
    t_fall: AtomicU32,
}

impl CycleFlags {
    pub const fn new() -> Self {
        CycleFlags {
            rising_seen: AtomicBool::new(false),
            falling_seen: AtomicBool::new(false),
            timeout_fired: AtomicBool::new(false),
            t_rise: AtomicU32::new(0),
            t_fall: AtomicU32::new(0),
        }
    }

    /// Clears all records. Only the coordinator calls this, before the
    /// trigger pulse goes out, while no edges can be pending.
    pub fn reset(&self) {
        self.rising_seen.store(false, Ordering::Release);
        self.falling_seen.store(false, Ordering::Release);
        self.timeout_fired.store(false, Ordering::Release);
        self.t_rise.store(0, Ordering::Relaxed);
        self.t_fall.store(0, Ordering::Relaxed);
    }

    /// Called from interrupt context on the echo rising edge.
    pub fn record_rising(&self, at: Instant) {
        self.t_rise.store(at.ticks(), Ordering::Relaxed);
        self.rising_seen.store(true, Ordering::Release);
    }

    /// Called from interrupt context on the echo falling edge.
    pub fn record_falling(&self, at: Instant) {
        self.t_fall.store(at.ticks(), Ordering::Relaxed);
        self.falling_seen.store(true, Ordering::Release);
    }

    /// Called by the timeout alarm when it fires.
    ///
    /// Re-checks `rising_seen` at fire time: a rising edge may have cancelled
    /// this alarm too late for the cancellation to take. In that case the
    /// fire is stale and must be a no-op. Returns whether the timeout was
    /// actually registered.
    pub fn fire_deadline(&self) -> bool {
        if self.rising_seen.load(Ordering::Acquire) {
            return false;
        }
        self.timeout_fired.store(true, Ordering::Release);
        true
    }

    /// Resolves the cycle if either signal source has concluded it.
    ///
    /// A registered timeout wins over edges that arrived after the deadline,
    /// so a late echo can never overwrite a timeout report.
    pub fn poll(&self) -> Option<Outcome> {
        if self.timeout_fired.load(Ordering::Acquire) {
            return Some(Outcome::Timeout);
        }
        if !self.falling_seen.load(Ordering::Acquire) {
            return None;
        }
        if !self.rising_seen.load(Ordering::Acquire) {
            return Some(Outcome::Inconsistent);
        }
        let t0 = Instant::from_ticks(self.t_rise.load(Ordering::Relaxed));
        let t1 = Instant::from_ticks(self.t_fall.load(Ordering::Relaxed));
        match t1.checked_duration_since(t0) {
            Some(width) => Some(Outcome::Success(width)),
            // The device guarantees fall-after-rise; anything else is a race
            // we refuse to report as a distance.
            None => Some(Outcome::Inconsistent),
        }
    }
}
