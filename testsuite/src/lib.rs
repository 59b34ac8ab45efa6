#![no_std]

use defmt_rtt as _; // global logger
use echo_ranger as _; // memory layout + panicking-behavior
use panic_probe as _;
