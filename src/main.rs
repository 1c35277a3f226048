//! # PetFeeder Firmware
//!
//! TM4C123GH6PM board image. Brings up the clock tree and peripherals,
//! restores the persisted schedule, then serves console commands while the
//! two interrupt handlers run the feeding cycle:
//!
//! | Handler | Source | Action |
//! |---------|--------|--------|
//! | `HIBERNATE` | RTC match 0 | start the auger for slot 0 |
//! | `WTIMER2A` | feed timer expiry | stop, retire, sort, re-arm |
//!
//! The feeder lives in a critical-section cell; a console command runs to
//! completion before either handler can observe the table.

#![no_std]
#![no_main]

use core::fmt::Write;

use cortex_m_rt::entry;
use tm4c123x::interrupt;
use {defmt_rtt as _, panic_halt as _};

use petfeeder::arch::tm4c123::{
    self, AugerPwm, Eeprom, FeedTimer, HibernationRtc, Uart0Console,
};
use petfeeder::clock::SharedClockPeripheral;
use petfeeder::command::Command;
use petfeeder::sync::Shared;
use petfeeder::Feeder;

type BoardFeeder = Feeder<'static, Eeprom, HibernationRtc, AugerPwm, FeedTimer>;

const LINE_CAPACITY: usize = 64;

static CLOCK: SharedClockPeripheral<HibernationRtc> =
    SharedClockPeripheral::new(HibernationRtc::new());

static FEEDER: Shared<Option<BoardFeeder>> = Shared::new(None);

// ---------------------------------------------------------------------------
// Interrupt handlers
// ---------------------------------------------------------------------------

#[interrupt]
fn HIBERNATE() {
    FEEDER.lock(|feeder| {
        let Some(feeder) = feeder.as_mut() else {
            CLOCK.acknowledge_alarm();
            return;
        };
        match feeder.on_alarm() {
            Ok(fired) => defmt::debug!("alarm: {}", fired),
            Err(e) => defmt::error!("alarm dispatch failed: {}", e),
        }
    });
}

#[interrupt]
fn WTIMER2A() {
    FEEDER.lock(|feeder| {
        if let Some(feeder) = feeder.as_mut() {
            match feeder.on_timeout() {
                Ok(status) => defmt::debug!("rearmed: {}", status),
                Err(e) => defmt::error!("feeding conclusion failed: {}", e),
            }
        }
    });
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Firmware entry point. Brings up the board, restores the schedule and
/// serves the console. Does not return.
#[entry]
fn main() -> ! {
    let p = tm4c123x::Peripherals::take().expect("peripherals already taken");

    tm4c123::init_system_clock(&p.SYSCTL);
    CLOCK.with_registers(|rtc| rtc.enable(&p.SYSCTL));

    let mut console = Uart0Console::new(p.UART0, &p.GPIO_PORTA, &p.SYSCTL);
    let eeprom = match Eeprom::new(p.EEPROM, &p.SYSCTL) {
        Ok(eeprom) => eeprom,
        Err(e) => {
            defmt::error!("EEPROM unusable: {}", e);
            let _ = writeln!(console, "EEPROM unusable, halting.");
            loop {
                cortex_m::asm::wfi();
            }
        }
    };
    let auger = AugerPwm::new(p.PWM0, &p.GPIO_PORTB, &p.SYSCTL);
    let timer = FeedTimer::new(p.WTIMER2, &p.SYSCTL);

    let mut feeder = Feeder::new(eeprom, &CLOCK, auger, timer);
    match feeder.start() {
        Ok(status) => {
            defmt::info!("feeder up: {}", status);
            let _ = writeln!(console, "{}", status);
        }
        Err(e) => {
            defmt::error!("schedule restore failed: {}", e);
            let _ = writeln!(console, "Error: {}", e);
        }
    }
    FEEDER.lock(|slot| *slot = Some(feeder));

    // SAFETY: both handlers are installed and FEEDER is populated.
    unsafe { tm4c123::enable_interrupts() };

    let mut line = [0u8; LINE_CAPACITY];
    loop {
        let _ = write!(console, "> ");
        let input = console.read_line(&mut line);
        if input.trim().is_empty() {
            continue;
        }

        let outcome = Command::parse(input).and_then(|command| {
            defmt::debug!("command: {}", command);
            FEEDER.lock(|feeder| match feeder.as_mut() {
                Some(feeder) => command.execute(feeder),
                None => Err(petfeeder::FeederError::StorageUnavailable.into()),
            })
        });
        let _ = match outcome {
            Ok(reply) => write!(console, "{}", reply),
            Err(e) => writeln!(console, "{}", e),
        };
    }
}
