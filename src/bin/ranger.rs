#![no_main]
#![no_std]

use echo_ranger as _; // global logger + panicking-behavior + memory layout

#[rtic::app(device = nrf52840_hal::pac, dispatchers = [UARTE1, SWI0_EGU0])]
mod app {
    use echo_ranger::{
        coordinator::{Command, Coordinator, ECHO_DEADLINE, RESOLVE_POLL},
        cycle::{CycleFlags, Duration, Outcome},
        mono::MonoTimer,
        report::Report,
        wallclock::WallClock,
    };
    use nrf52840_hal::{
        clocks::Clocks,
        gpio::{p0::Parts, Level, Output, Pin, PushPull},
        gpiote::Gpiote,
        pac::{TIMER0, TIMER1, UARTE0},
        prelude::*,
        timer::Timer,
        uarte::{Baudrate, Parity, Pins as UartePins, Uarte},
    };

    /// Trigger/command cadence, matching the original 1 Hz report rate.
    const TICK_PERIOD: Duration = Duration::secs(1);
    /// HC-SR04 wants a >= 10 us trigger pulse; 640 cycles at 64 MHz.
    const TRIG_PULSE_CYCLES: u32 = 640;
    /// Console read timeout per poll, in 1 MHz timer ticks.
    const CMD_POLL_US: u32 = 500;

    #[monotonic(binds = TIMER0, default = true)]
    type MyMono = MonoTimer<TIMER0>;

    #[shared]
    struct Shared {
        flags: CycleFlags,
        deadline: Option<echo_timeout::MyMono::SpawnHandle>,
        coordinator: Coordinator,
        wallclock: WallClock,
    }

    #[local]
    struct Local {
        gpiote: Gpiote,
        trig_pin: Pin<Output<PushPull>>,
        uarte: Uarte<UARTE0>,
        uart_timer: Timer<TIMER1>,
    }

    #[init]
    fn init(ctx: init::Context) -> (Shared, Local, init::Monotonics) {
        let _clocks = Clocks::new(ctx.device.CLOCK).enable_ext_hfosc();

        let mono = MonoTimer::new(ctx.device.TIMER0);

        let p0 = Parts::new(ctx.device.P0);
        let echo_pin = p0.p0_04.into_pulldown_input().degrade();
        let trig_pin = p0.p0_03.into_push_pull_output(Level::Low).degrade();

        // One channel per edge so the handler never has to race the pin
        // level to tell rise from fall.
        let gpiote = Gpiote::new(ctx.device.GPIOTE);
        gpiote
            .channel0()
            .input_pin(&echo_pin)
            .lo_to_hi()
            .enable_interrupt();
        gpiote
            .channel1()
            .input_pin(&echo_pin)
            .hi_to_lo()
            .enable_interrupt();

        let uarte = Uarte::new(
            ctx.device.UARTE0,
            UartePins {
                rxd: p0.p0_08.into_floating_input().degrade(),
                txd: p0.p0_06.into_push_pull_output(Level::High).degrade(),
                cts: None,
                rts: None,
            },
            Parity::EXCLUDED,
            Baudrate::BAUD115200,
        );
        let uart_timer = Timer::new(ctx.device.TIMER1);

        defmt::info!("send 's' to start and 'p' to pause measuring");
        tick::spawn_after(TICK_PERIOD).ok();

        (
            Shared {
                flags: CycleFlags::new(),
                deadline: None,
                coordinator: Coordinator::new(),
                wallclock: WallClock::new(0, 0, 0),
            },
            Local {
                gpiote,
                trig_pin,
                uarte,
                uart_timer,
            },
            init::Monotonics(mono),
        )
    }

    #[idle]
    fn idle(_: idle::Context) -> ! {
        loop {
            cortex_m::asm::nop();
        }
    }

    /// Echo edge capture. Runs at the highest priority and does nothing but
    /// timestamp the transition and publish it; on a rising edge it also
    /// pulls the timeout alarm. A cancellation that loses against the alarm
    /// firing is harmless, the alarm re-checks the flags itself.
    #[task(binds = GPIOTE, priority = 3, shared = [&flags, deadline], local = [gpiote])]
    fn on_gpiote(mut ctx: on_gpiote::Context) {
        let flags = ctx.shared.flags;
        let now = monotonics::now();
        let gpiote = ctx.local.gpiote;

        if gpiote.channel0().is_event_triggered() {
            gpiote.channel0().reset_events();
            flags.record_rising(now);
            ctx.shared.deadline.lock(|slot| {
                if let Some(handle) = slot.take() {
                    handle.cancel().ok();
                }
            });
        }
        if gpiote.channel1().is_event_triggered() {
            gpiote.channel1().reset_events();
            flags.record_falling(now);
        }
    }

    /// Timeout alarm. Only registers the failure if no rising edge made it
    /// in before the deadline; a stale fire that raced its own cancellation
    /// is a no-op.
    #[task(priority = 2, shared = [&flags])]
    fn echo_timeout(ctx: echo_timeout::Context) {
        if ctx.shared.flags.fire_deadline() {
            defmt::debug!("no echo within deadline");
        }
    }

    /// 1 s control tick: advance the wall clock, poll the console for a
    /// command, and kick off the next cycle when measuring is enabled.
    #[task(shared = [&flags, deadline, coordinator, wallclock], local = [trig_pin, uarte, uart_timer])]
    fn tick(mut ctx: tick::Context) {
        let flags = ctx.shared.flags;

        ctx.shared.wallclock.lock(|clock| clock.advance_second());

        let mut buf = [0u8; 1];
        let cmd = match ctx
            .local
            .uarte
            .read_timeout(&mut buf, ctx.local.uart_timer, CMD_POLL_US)
        {
            Ok(()) => Command::parse(buf[0]),
            Err(_) => None,
        };
        if let Some(cmd) = cmd {
            if ctx.shared.coordinator.lock(|c| c.handle_command(cmd)) {
                match cmd {
                    Command::Start => defmt::info!("measuring enabled"),
                    Command::Pause => defmt::info!("measuring paused"),
                }
            }
        }

        let now = monotonics::now();
        if ctx.shared.coordinator.lock(|c| c.begin_cycle(flags, now)) {
            let trig = ctx.local.trig_pin;
            trig.set_high().ok();
            cortex_m::asm::delay(TRIG_PULSE_CYCLES);
            trig.set_low().ok();

            if let Ok(handle) = echo_timeout::spawn_after(ECHO_DEADLINE) {
                ctx.shared.deadline.lock(|slot| {
                    // at most one alarm is ever pending
                    if let Some(stale) = slot.replace(handle) {
                        stale.cancel().ok();
                    }
                });
            }
            ctx.shared.coordinator.lock(|c| c.await_echo());
            resolve::spawn_after(RESOLVE_POLL).ok();
        }

        tick::spawn_after(TICK_PERIOD).ok();
    }

    /// Bounded wait for the cycle in flight: re-poll at a short fixed
    /// interval until an edge pair, the alarm or the hard cap resolves it,
    /// then report and go back to idle.
    #[task(shared = [&flags, deadline, coordinator, wallclock])]
    fn resolve(mut ctx: resolve::Context) {
        let flags = ctx.shared.flags;
        let now = monotonics::now();

        match ctx.shared.coordinator.lock(|c| c.try_resolve(flags, now)) {
            None => {
                resolve::spawn_after(RESOLVE_POLL).ok();
            }
            Some(outcome) => {
                ctx.shared.deadline.lock(|slot| {
                    if let Some(handle) = slot.take() {
                        handle.cancel().ok();
                    }
                });
                if outcome == Outcome::Inconsistent {
                    defmt::debug!("edge capture out of order");
                }
                let stamp = ctx.shared.wallclock.lock(|clock| clock.time());
                defmt::info!("{}", Report { stamp, outcome });
                ctx.shared.coordinator.lock(|c| c.complete());
            }
        }
    }
}
