//! Time-of-day tracking for stamping output lines.
//!
//! The nRF52840 has no calendar RTC, so this is a seconds-of-day counter
//! advanced by the 1 s control tick, seeded at boot. Display only; never
//! used for interval measurement.

const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl defmt::Format for TimeOfDay {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "{=u8:02}:{=u8:02}:{=u8:02}",
            self.hour,
            self.minute,
            self.second
        );
    }
}

pub struct WallClock {
    seconds: u32,
}

impl WallClock {
    pub const fn new(hour: u8, minute: u8, second: u8) -> Self {
        WallClock {
            seconds: hour as u32 * 3600 + minute as u32 * 60 + second as u32,
        }
    }

    pub fn advance_second(&mut self) {
        self.seconds = (self.seconds + 1) % SECONDS_PER_DAY;
    }

    pub fn time(&self) -> TimeOfDay {
        TimeOfDay {
            hour: (self.seconds / 3600) as u8,
            minute: (self.seconds / 60 % 60) as u8,
            second: (self.seconds % 60) as u8,
        }
    }
}
