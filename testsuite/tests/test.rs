#![no_std]
#![no_main]

use echo_ranger::coordinator::{Command, Coordinator};
use echo_ranger::cycle::Instant;
use testsuite as _;

fn at(us: u32) -> Instant {
    Instant::from_ticks(us)
}

fn enabled_coordinator() -> Coordinator {
    let mut c = Coordinator::new();
    c.handle_command(Command::Start);
    c
}

#[defmt_test::tests]
mod tests {
    use defmt::{assert, assert_eq};
    use echo_ranger::{
        coordinator::{Command, Coordinator, CycleState, ECHO_HARD_CAP},
        cycle::{CycleFlags, Outcome},
        wallclock::{TimeOfDay, WallClock},
    };
    use fugit::ExtU32;

    use super::{at, enabled_coordinator};

    #[test]
    fn echo_pair_resolves_to_pulse_width() {
        let flags = CycleFlags::new();
        flags.record_rising(at(1_000));
        flags.record_falling(at(1_200));
        assert_eq!(flags.poll(), Some(Outcome::Success(200.micros())));
    }

    #[test]
    fn distance_is_half_round_trip() {
        // 200 us * 0.0343 / 2 = 3.43 cm exactly
        assert_eq!(Outcome::Success(200.micros()).centi_cm(), Some(343));
        // 581 us -> 9.964... cm, reported as 9.96
        assert_eq!(Outcome::Success(581.micros()).centi_cm(), Some(996));
        assert_eq!(Outcome::Timeout.centi_cm(), None);
        assert_eq!(Outcome::Inconsistent.centi_cm(), None);
    }

    #[test]
    fn timeout_beats_late_edges() {
        let flags = CycleFlags::new();
        assert!(flags.fire_deadline());
        // edges arriving after the deadline fired must not turn the cycle
        // into a success
        flags.record_rising(at(60_000));
        flags.record_falling(at(60_400));
        assert_eq!(flags.poll(), Some(Outcome::Timeout));
    }

    #[test]
    fn stale_alarm_fire_is_noop() {
        let flags = CycleFlags::new();
        flags.record_rising(at(100));
        // the alarm lost the race against its own cancellation
        assert!(!flags.fire_deadline());
        assert_eq!(flags.poll(), None);
        flags.record_falling(at(300));
        assert_eq!(flags.poll(), Some(Outcome::Success(200.micros())));
    }

    #[test]
    fn falling_without_rising_is_inconsistent() {
        let flags = CycleFlags::new();
        flags.record_falling(at(500));
        assert_eq!(flags.poll(), Some(Outcome::Inconsistent));
    }

    #[test]
    fn reversed_edges_are_inconsistent() {
        let flags = CycleFlags::new();
        flags.record_rising(at(1_000));
        flags.record_falling(at(900));
        assert_eq!(flags.poll(), Some(Outcome::Inconsistent));
    }

    #[test]
    fn reset_clears_previous_cycle() {
        let flags = CycleFlags::new();
        flags.record_rising(at(10));
        flags.record_falling(at(20));
        assert!(flags.poll().is_some());
        flags.reset();
        assert_eq!(flags.poll(), None);
    }

    #[test]
    fn commands_are_idempotent() {
        let mut c = Coordinator::new();
        assert!(!c.enabled());
        assert!(c.handle_command(Command::Start));
        assert!(c.enabled());
        assert!(!c.handle_command(Command::Start));
        assert!(c.handle_command(Command::Pause));
        assert!(!c.handle_command(Command::Pause));
        assert!(!c.enabled());
    }

    #[test]
    fn cycle_needs_enable_and_idle() {
        let flags = CycleFlags::new();
        let mut c = Coordinator::new();
        assert!(!c.begin_cycle(&flags, at(0)));

        c.handle_command(Command::Start);
        assert!(c.begin_cycle(&flags, at(0)));
        // prior cycle unresolved, no new trigger pulse
        assert!(!c.begin_cycle(&flags, at(10)));
        c.await_echo();
        assert!(!c.begin_cycle(&flags, at(20)));
    }

    #[test]
    fn full_cycle_resolves_and_restarts() {
        let flags = CycleFlags::new();
        let mut c = enabled_coordinator();

        assert!(c.begin_cycle(&flags, at(0)));
        c.await_echo();
        assert_eq!(c.try_resolve(&flags, at(1_000)), None);

        flags.record_rising(at(1_100));
        flags.record_falling(at(1_681));
        let outcome = c.try_resolve(&flags, at(2_000));
        assert_eq!(outcome, Some(Outcome::Success(581.micros())));
        assert_eq!(c.state(), CycleState::Resolved(Outcome::Success(581.micros())));

        c.complete();
        assert_eq!(c.state(), CycleState::Idle);
        assert!(c.begin_cycle(&flags, at(1_000_000)));
    }

    #[test]
    fn pause_lets_inflight_cycle_resolve() {
        let flags = CycleFlags::new();
        let mut c = enabled_coordinator();

        assert!(c.begin_cycle(&flags, at(0)));
        c.await_echo();
        c.handle_command(Command::Pause);

        flags.record_rising(at(100));
        flags.record_falling(at(300));
        assert_eq!(c.try_resolve(&flags, at(400)), Some(Outcome::Success(200.micros())));
        c.complete();

        // but no further trigger while paused
        assert!(!c.begin_cycle(&flags, at(1_000_000)));
    }

    #[test]
    fn hard_cap_bounds_stuck_echo() {
        let flags = CycleFlags::new();
        let mut c = enabled_coordinator();

        assert!(c.begin_cycle(&flags, at(0)));
        c.await_echo();
        // rising edge cancelled the alarm, falling edge never comes
        flags.record_rising(at(49_000));
        assert_eq!(c.try_resolve(&flags, at(55_000)), None);
        assert_eq!(
            c.try_resolve(&flags, at(0) + ECHO_HARD_CAP + 1.millis()),
            Some(Outcome::Timeout)
        );
    }

    #[test]
    fn reenable_starts_clean() {
        let flags = CycleFlags::new();
        let mut c = enabled_coordinator();

        assert!(c.begin_cycle(&flags, at(0)));
        c.await_echo();
        flags.record_falling(at(100)); // stray edge capture
        assert_eq!(c.try_resolve(&flags, at(200)), Some(Outcome::Inconsistent));
        c.complete();
        c.handle_command(Command::Pause);

        c.handle_command(Command::Start);
        assert!(c.begin_cycle(&flags, at(2_000_000)));
        // no residual flags leak into the new cycle
        assert_eq!(flags.poll(), None);
    }

    #[test]
    fn wallclock_rolls_over() {
        let mut clock = WallClock::new(9, 59, 59);
        clock.advance_second();
        assert_eq!(
            clock.time(),
            TimeOfDay {
                hour: 10,
                minute: 0,
                second: 0
            }
        );

        let mut midnight = WallClock::new(23, 59, 59);
        midnight.advance_second();
        assert_eq!(
            midnight.time(),
            TimeOfDay {
                hour: 0,
                minute: 0,
                second: 0
            }
        );
    }
}
