//! One output line per resolved cycle.
//!
//! `HH:MM:SS - D.DD cm` on success, `HH:MM:SS - Failure` otherwise. Timeout
//! and inconsistent cycles read the same at this boundary; the distinction
//! stays internal.

use crate::cycle::Outcome;
use crate::wallclock::TimeOfDay;

pub struct Report {
    pub stamp: TimeOfDay,
    pub outcome: Outcome,
}

impl defmt::Format for Report {
    fn format(&self, fmt: defmt::Formatter) {
        match self.outcome.centi_cm() {
            Some(centi) => defmt::write!(
                fmt,
                "{} - {=u32}.{=u32:02} cm",
                self.stamp,
                centi / 100,
                centi % 100
            ),
            None => defmt::write!(fmt, "{} - Failure", self.stamp),
        }
    }
}
