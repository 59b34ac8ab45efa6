//! Single-threaded state machine driving one trigger/measure cycle at a time.

use crate::cycle::{CycleFlags, Duration, Instant, Outcome};

/// Longest round-trip time for the sensor's maximum usable range; exceeding
/// it means no echo will arrive.
pub const ECHO_DEADLINE: Duration = Duration::millis(50);

/// Upper bound on the whole wait, deadline plus scheduling slack. Covers the
/// case where the rising edge cancelled the alarm but the echo never falls,
/// so the resolve poll can never spin unbounded.
pub const ECHO_HARD_CAP: Duration = Duration::millis(60);

/// Interval at which the control loop re-polls an unresolved cycle.
pub const RESOLVE_POLL: Duration = Duration::millis(1);

/// Console commands.
#[derive(Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum Command {
    Start,
    Pause,
}

impl Command {
    pub fn parse(byte: u8) -> Option<Command> {
        match byte {
            b's' => Some(Command::Start),
            b'p' => Some(Command::Pause),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum CycleState {
    Idle,
    Triggered,
    AwaitingEcho,
    Resolved(Outcome),
}

pub struct Coordinator {
    enabled: bool,
    state: CycleState,
    started_at: Option<Instant>,
}

impl Coordinator {
    pub const fn new() -> Self {
        Coordinator {
            enabled: false,
            state: CycleState::Idle,
            started_at: None,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Applies a console command. Returns whether the enabled flag actually
    /// changed, so repeated commands stay silent. Pausing never aborts a
    /// cycle in flight; it only suppresses future triggers.
    pub fn handle_command(&mut self, cmd: Command) -> bool {
        let enable = cmd == Command::Start;
        let changed = self.enabled != enable;
        self.enabled = enable;
        changed
    }

    /// Starts a new cycle if one may start: measuring enabled and no prior
    /// cycle unresolved. Resets the shared flags (single writer at this
    /// point) and enters `Triggered`; the caller then pulses the trigger
    /// line and arms the timeout.
    pub fn begin_cycle(&mut self, flags: &CycleFlags, now: Instant) -> bool {
        if !self.enabled || self.state != CycleState::Idle {
            return false;
        }
        flags.reset();
        self.started_at = Some(now);
        self.state = CycleState::Triggered;
        true
    }

    /// `Triggered` -> `AwaitingEcho`, once the pulse is out and the alarm
    /// armed.
    pub fn await_echo(&mut self) {
        if self.state == CycleState::Triggered {
            self.state = CycleState::AwaitingEcho;
        }
    }

    /// One bounded poll of the cycle in flight.
    ///
    /// Resolves from the shared flags, or from the hard cap when neither
    /// signal source concluded the cycle in time. Returns `None` while the
    /// wait should continue.
    pub fn try_resolve(&mut self, flags: &CycleFlags, now: Instant) -> Option<Outcome> {
        if self.state != CycleState::AwaitingEcho {
            return None;
        }
        let outcome = flags.poll().or_else(|| {
            let expired = match self.started_at {
                Some(t0) => now
                    .checked_duration_since(t0)
                    .map_or(false, |waited| waited > ECHO_HARD_CAP),
                None => false,
            };
            if expired {
                Some(Outcome::Timeout)
            } else {
                None
            }
        })?;
        self.state = CycleState::Resolved(outcome);
        Some(outcome)
    }

    /// `Resolved` -> `Idle`, after the result has been reported and any
    /// pending alarm cancelled.
    pub fn complete(&mut self) {
        if let CycleState::Resolved(_) = self.state {
            self.state = CycleState::Idle;
            self.started_at = None;
        }
    }
}
